use crate::{BlendCurve, InstanceId, NewInstanceBehavior, RequestId};

pub const MAX_REQUESTS_IN_FLIGHT: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RequestStatus {
    Pending,
    Taken,
    Failed,
    Invalid,
    QueueFull,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RequestType {
    DirectFade,
    Transition,
}

/// Caller supplied parameters for [`crate::AnimStateLayer::fade_to_state`] and the
/// transition request calls. `None` means "use the state, transition or table default".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FadeToStateParams {
    pub anim_fade_time: Option<f32>,
    pub motion_fade_time: Option<f32>,
    pub curve: Option<BlendCurve>,
    /// Ignored by transitions unless within `[0, 1]`.
    pub start_phase: Option<f32>,
    pub new_instance_behavior: NewInstanceBehavior,
    pub phase_sync: bool,
    pub freeze_src_state: bool,
    pub freeze_dest_state: bool,
    pub prevent_blend_overrun: bool,
    pub skip_first_frame_update: bool,
    /// Direct fades only: keep pending transitions and jump the queue.
    pub dont_clear_transitions: bool,
}

impl FadeToStateParams {
    pub fn with_fade(fade_time: f32) -> Self {
        Self {
            anim_fade_time: Some(fade_time),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateChangeRequest {
    pub id: RequestId,
    pub kind: RequestType,
    pub status: RequestStatus,
    /// Survives `remove_all_pending_transitions`.
    pub persistent: bool,
    /// State name for direct fades, transition name otherwise.
    pub target: String,
    pub params: FadeToStateParams,
    pub request_time: f64,
    /// Current state when the request was made, refreshed when it is resolved.
    pub src_state: Option<String>,
}

/// Outcome of a resolved request, kept in a small ring for status queries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessedRequest {
    pub id: RequestId,
    pub status: Option<RequestStatus>,
    pub kind: Option<RequestType>,
    pub instance: InstanceId,
    pub request_time: f64,
    pub src_state: Option<String>,
    pub dst_state: Option<String>,
    pub transition: Option<String>,
}
