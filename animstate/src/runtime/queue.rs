use super::request::{
    FadeToStateParams, MAX_REQUESTS_IN_FLIGHT, ProcessedRequest, RequestStatus, RequestType,
    StateChangeRequest,
};
use super::{AnimStateLayer, PendingChangeKind, StateInstance};
use crate::{InstanceId, NewInstanceBehavior, RequestId};

impl AnimStateLayer {
    /// Queues a direct fade to `state`.
    ///
    /// Pending named transitions are purged as `Failed` unless
    /// `params.dont_clear_transitions` is set, in which case the fade jumps to the front of
    /// the queue. When the queue is full the oldest request is evicted. Unknown states are
    /// only detected when the request is resolved.
    pub fn fade_to_state(&mut self, state: &str, params: FadeToStateParams) -> RequestId {
        let id = self.request_ids.next_id();
        let params = normalize_fade_params(params);
        let request = StateChangeRequest {
            id,
            kind: RequestType::DirectFade,
            status: RequestStatus::Pending,
            persistent: false,
            target: state.to_string(),
            params,
            request_time: self.time,
            src_state: self.current_state_id().map(str::to_string),
        };

        if request.params.dont_clear_transitions {
            if self.pending.len() >= MAX_REQUESTS_IN_FLIGHT {
                self.remove_change_request(0, RequestStatus::Failed, None);
            }
            self.pending.insert(0, request);
        } else {
            let mut index = 0;
            while index < self.pending.len() {
                if self.pending[index].kind == RequestType::DirectFade {
                    index += 1;
                } else {
                    self.remove_change_request(index, RequestStatus::Failed, None);
                }
            }
            if self.pending.len() >= MAX_REQUESTS_IN_FLIGHT {
                self.remove_change_request(0, RequestStatus::Failed, None);
            }
            self.pending.push(request);
        }

        tracing::debug!(layer = %self.params.name, request = id.0, state, "accepted fade request");
        self.hooks
            .on_pending_change(id, state, PendingChangeKind::FadeToState);
        id
    }

    /// Queues a named transition. Returns [`RequestId::QUEUE_FULL`] without touching the
    /// queue when it already holds the maximum number of requests.
    pub fn request_transition(&mut self, transition: &str, params: FadeToStateParams) -> RequestId {
        let id = self.push_transition_request(transition, params, false);
        self.hooks
            .on_pending_change(id, transition, PendingChangeKind::Transition);
        id
    }

    /// Like [`Self::request_transition`], but the request survives
    /// [`Self::remove_all_pending_transitions`].
    pub fn request_persistent_transition(
        &mut self,
        transition: &str,
        params: FadeToStateParams,
    ) -> RequestId {
        self.push_transition_request(transition, params, true)
    }

    fn push_transition_request(
        &mut self,
        transition: &str,
        params: FadeToStateParams,
        persistent: bool,
    ) -> RequestId {
        if self.pending.len() >= MAX_REQUESTS_IN_FLIGHT {
            tracing::warn!(
                layer = %self.params.name,
                transition,
                "too many transition requests, dropping new request"
            );
            return RequestId::QUEUE_FULL;
        }

        let id = self.request_ids.next_id();
        let src_state = self.current_state_id().map(str::to_string);
        self.pending.push(StateChangeRequest {
            id,
            kind: RequestType::Transition,
            status: RequestStatus::Pending,
            persistent,
            target: transition.to_string(),
            params,
            request_time: self.time,
            src_state,
        });
        tracing::debug!(layer = %self.params.name, request = id.0, transition, persistent, "accepted transition request");
        id
    }

    /// Requests whichever currently active transition of the current state leads to
    /// `state`. Returns [`RequestId::INVALID`] when there is none or `state` is already
    /// current.
    pub fn request_transition_by_final_state(
        &mut self,
        state: &str,
        params: FadeToStateParams,
    ) -> RequestId {
        let Some(current) = self.current_state_id() else {
            return RequestId::INVALID;
        };
        if current == state {
            return RequestId::INVALID;
        }
        let Some(transition) = self.active_transition_by_state_name(state) else {
            return RequestId::INVALID;
        };
        let transition = transition.to_string();
        self.request_transition(&transition, params)
    }

    /// Removes every non-persistent pending request whose type is in `kinds`, marking it
    /// `Failed`.
    pub fn remove_all_pending_transitions(&mut self, kinds: &[RequestType]) {
        let mut index = 0;
        while index < self.pending.len() {
            let request = &self.pending[index];
            if kinds.contains(&request.kind) && !request.persistent {
                self.remove_change_request(index, RequestStatus::Failed, None);
            } else {
                index += 1;
            }
        }
    }

    pub fn are_transitions_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn num_pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_change_request(&self, index: usize) -> Option<&StateChangeRequest> {
        self.pending.get(index)
    }

    pub fn processed_requests(&self) -> impl Iterator<Item = &ProcessedRequest> {
        self.processed.iter().filter(|r| r.status.is_some())
    }

    pub fn transition_status(&self, id: RequestId) -> RequestStatus {
        if id == RequestId::QUEUE_FULL {
            return RequestStatus::QueueFull;
        }
        if id == RequestId::INVALID {
            return RequestStatus::Invalid;
        }
        if let Some(request) = self.pending.iter().find(|r| r.id == id) {
            return request.status;
        }
        self.processed
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.status)
            .unwrap_or(RequestStatus::Invalid)
    }

    /// Live instance created by a taken request, if it still exists.
    pub fn transition_dest_instance(&self, id: RequestId) -> Option<&StateInstance> {
        if !id.is_valid() {
            return None;
        }
        let record = self
            .processed
            .iter()
            .find(|r| r.id == id && r.status == Some(RequestStatus::Taken))?;
        self.find_instance_by_id(record.instance)
    }

    /// Moves the pending request at `index` into the processed ring with `status`.
    pub(crate) fn remove_change_request(
        &mut self,
        index: usize,
        status: RequestStatus,
        dest: Option<usize>,
    ) {
        if index >= self.pending.len() {
            return;
        }
        let request = self.pending.remove(index);
        let instance = dest.map_or(InstanceId::INVALID, |slot| self.instances[slot].id);

        match status {
            RequestStatus::Taken => {
                tracing::debug!(layer = %self.params.name, request = request.id.0, target = %request.target, instance = instance.0, "request taken");
            }
            _ => {
                tracing::warn!(layer = %self.params.name, request = request.id.0, target = %request.target, ?status, "request removed");
            }
        }

        let src_state = request.src_state;
        let (dst_state, transition) = match request.kind {
            RequestType::DirectFade => (Some(request.target), None),
            RequestType::Transition => (
                dest.map(|slot| self.instances[slot].state_name.clone()),
                Some(request.target),
            ),
        };
        let write = self.processed_write % MAX_REQUESTS_IN_FLIGHT;
        self.processed[write] = ProcessedRequest {
            id: request.id,
            status: Some(status),
            kind: Some(request.kind),
            instance,
            request_time: request.request_time,
            src_state,
            dst_state,
            transition,
        };
        self.processed_write = (write + 1) % MAX_REQUESTS_IN_FLIGHT;
    }
}

/// Clamps negative fades and picks a placement for instant fades. Unset fades stay unset
/// so the blend override table can still supply them at resolution time.
fn normalize_fade_params(mut params: FadeToStateParams) -> FadeToStateParams {
    if let Some(fade) = &mut params.anim_fade_time {
        *fade = fade.max(0.0);
    }
    if params.motion_fade_time.is_some_and(|t| t < 0.0) {
        params.motion_fade_time = None;
    }
    let anim_fade = params.anim_fade_time.unwrap_or(0.0);
    let motion_fade = params.motion_fade_time.unwrap_or(anim_fade);
    if anim_fade == 0.0
        && motion_fade == 0.0
        && params.new_instance_behavior == NewInstanceBehavior::Unspecified
    {
        params.new_instance_behavior = NewInstanceBehavior::SpawnNewTrack;
    }
    params
}
