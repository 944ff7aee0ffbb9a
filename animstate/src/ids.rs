/// Handle returned by the request API.
///
/// Two values are reserved: [`RequestId::INVALID`] for "no request" and
/// [`RequestId::QUEUE_FULL`] for a request rejected because the pending queue was full.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u32);

impl RequestId {
    pub const INVALID: Self = Self(0x00FF_FFFF);
    pub const QUEUE_FULL: Self = Self(0x00FF_FFFE);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID && self != Self::QUEUE_FULL
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub const INVALID: Self = Self(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RequestIdGen {
    next: u32,
}

impl RequestIdGen {
    pub(crate) fn next_id(&mut self) -> RequestId {
        let id = RequestId(self.next);
        self.next += 1;
        if self.next >= RequestId::QUEUE_FULL.0 {
            self.next = 0;
        }
        id
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct InstanceIdGen {
    last: u32,
}

impl InstanceIdGen {
    pub(crate) fn next_id(&mut self) -> InstanceId {
        self.last = self.last.wrapping_add(1);
        if self.last == InstanceId::INVALID.0 {
            self.last = self.last.wrapping_add(1);
        }
        InstanceId(self.last)
    }

    #[cfg(test)]
    pub(crate) fn after(last: u32) -> Self {
        Self { last }
    }
}
