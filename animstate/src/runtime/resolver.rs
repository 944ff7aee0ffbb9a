use super::instance::PrevInstanceInfo;
use super::request::{FadeToStateParams, RequestStatus, RequestType};
use super::{AnimInfo, AnimStateLayer, BlendOverrideFlags, SetStateParams};
use crate::curve::clamp01;
use crate::{
    AUTO_TRANSITION, BlendCurve, BlendOverride, ConditionSource, Error, InstanceId,
    NewInstanceBehavior, RequestId, TransitionDef,
};
use std::sync::Arc;

const MAX_RESOLVE_ITERATIONS: usize = 1024;

/// Runtime values a transition's guard is evaluated against.
pub(crate) struct TransitionQuery<'a> {
    pub(crate) phase: f32,
    pub(crate) phase_rate: f32,
    pub(crate) state_fade: f32,
    pub(crate) info: &'a AnimInfo,
    pub(crate) is_top_instance: bool,
    pub(crate) has_free_instance: bool,
}

pub(crate) fn transition_passes(transition: &TransitionDef, query: &TransitionQuery<'_>) -> bool {
    let flags = transition.flags;
    if flags.valid_on_top_instance_only && !query.is_top_instance {
        return false;
    }
    if flags.valid_if_has_free_instance && !query.has_free_instance {
        return false;
    }

    for condition in &transition.conditions {
        if condition.require_switch && !query.info.transition_switch {
            return false;
        }
        let value = match &condition.source {
            ConditionSource::Phase => {
                let early = transition.fade_time * query.phase_rate;
                let mut phase = query.phase;
                if flags.start_blend_early {
                    phase += early;
                }
                if flags.start_blend_early_reverse {
                    phase -= early;
                }
                phase
            }
            ConditionSource::StateFade => query.state_fade,
            ConditionSource::Info(key) => match query.info.get(key) {
                Some(value) => value,
                None => return false,
            },
        };
        if !condition.in_range(value) {
            return false;
        }
    }
    true
}

struct ResolvedBlend {
    anim_fade: f32,
    motion_fade: f32,
    curve: BlendCurve,
    overrides: BlendOverrideFlags,
}

/// Request overrides beat table entries, which beat the transition's own values.
fn resolve_blend(
    anim_fade: f32,
    motion_fade: Option<f32>,
    curve: BlendCurve,
    table: Option<&BlendOverride>,
    request: Option<&FadeToStateParams>,
) -> ResolvedBlend {
    let mut resolved_anim = anim_fade;
    let mut resolved_motion = motion_fade;
    let mut resolved_curve = curve;
    let mut overrides = BlendOverrideFlags::default();

    if let Some(entry) = table {
        if let Some(fade) = entry.fade_time {
            resolved_anim = fade;
            overrides.anim_fade = true;
        }
        if let Some(fade) = entry.motion_fade_time {
            resolved_motion = Some(fade);
            overrides.motion_fade = true;
        }
        if let Some(c) = entry.curve {
            resolved_curve = c;
            overrides.curve = true;
        }
    }

    if let Some(params) = request {
        if let Some(fade) = params.anim_fade_time {
            resolved_anim = fade;
            overrides.anim_fade = true;
        }
        if let Some(fade) = params.motion_fade_time {
            resolved_motion = Some(fade);
            overrides.motion_fade = true;
        }
        if let Some(c) = params.curve {
            resolved_curve = c;
            overrides.curve = true;
        }
    }

    let anim_fade = resolved_anim.max(0.0);
    ResolvedBlend {
        anim_fade,
        motion_fade: resolved_motion.unwrap_or(anim_fade).max(0.0),
        curve: resolved_curve,
        overrides,
    }
}

impl AnimStateLayer {
    pub(crate) fn transition_query(&self, slot: usize) -> TransitionQuery<'_> {
        let instance = &self.instances[slot];
        let is_current = self.current_slot() == Some(slot);
        let info = if is_current || !self.params.cache_top_info {
            &self.info
        } else {
            &instance.info
        };
        TransitionQuery {
            phase: instance.phase,
            phase_rate: instance.phase_rate,
            state_fade: instance.master_fade(),
            info,
            is_top_instance: is_current,
            has_free_instance: self.has_free_instance(),
        }
    }

    /// First transition called `name` on the instance's state whose guard passes.
    pub(crate) fn active_transition(&self, slot: usize, name: &str) -> Option<TransitionDef> {
        let state = self.graph.state_at(self.instances[slot].state)?;
        let query = self.transition_query(slot);
        state
            .transitions_named(name)
            .find(|t| transition_passes(t, &query))
            .cloned()
    }

    /// Whether the current state has a transition called `name`, active or not.
    pub fn is_transition_valid(&self, name: &str) -> bool {
        self.current_state().is_some_and(|state| state.has_transition(name))
    }

    pub fn can_transition_be_taken_this_frame(&self, name: &str) -> bool {
        let Some(slot) = self.current_slot() else {
            return false;
        };
        self.is_transition_valid(name) && self.active_transition(slot, name).is_some()
    }

    /// Name of the first active transition of the current state that leads to `state`.
    pub fn active_transition_by_state_name(&self, state: &str) -> Option<&str> {
        let slot = self.current_slot()?;
        let def = self.graph.state_at(self.instances[slot].state)?;
        let query = self.transition_query(slot);
        def.transitions
            .iter()
            .find(|t| t.dest_state == state && transition_passes(t, &query))
            .map(|t| t.name.as_str())
    }

    /// Fades to `state` right away, bypassing the request queue. The current instance is
    /// the one being replaced.
    pub fn set_state(&mut self, state: &str, params: SetStateParams) -> Result<InstanceId, Error> {
        let Some(index) = self.graph.state_index(state) else {
            return Err(Error::UnknownState {
                name: state.to_string(),
            });
        };
        let mut params = params;
        params.prev_instance = self.current_slot();
        params.track = None;
        let slot = self.set_state_internal(index, params);
        Ok(self.instances[slot].id)
    }

    pub(crate) fn can_loop_instance(
        &self,
        slot: usize,
        state_index: usize,
        params: &SetStateParams,
    ) -> bool {
        if !self.instance_used[slot] || !params.allow_state_looping {
            return false;
        }
        let instance = &self.instances[slot];
        let Some(dest) = self.graph.state_at(state_index) else {
            return false;
        };
        if instance.state != state_index || dest.flags.never_loop {
            return false;
        }
        let ended = instance.phase == 1.0
            || (instance.phase == 0.0
                && instance.phase < instance.prev_phase
                && params.start_phase > 0.99);
        ended && params.anim_fade_time == 0.0 && params.motion_fade_time == 0.0
    }

    /// Creates (or loops) an instance of `state_index` and returns its slot.
    pub(crate) fn set_state_internal(
        &mut self,
        state_index: usize,
        mut params: SetStateParams,
    ) -> usize {
        let graph = Arc::clone(&self.graph);
        let state = &graph.states()[state_index];

        if state.flags.disable_prev_insts_auto_trans {
            let live: Vec<usize> = self.slots_new_to_old().collect();
            for slot in live {
                self.instances[slot].auto_transitions_disabled = true;
            }
        }

        if let Some(prev) = params.prev_instance {
            if self.can_loop_instance(prev, state_index, &params) {
                tracing::debug!(layer = %self.params.name, state = %state.name, "looping state");
                self.instances[prev].loop_state(params.start_phase);
                return prev;
            }
        }

        params.anim_fade_time = params.anim_fade_time.max(0.0);
        params.motion_fade_time = params.motion_fade_time.max(0.0);
        params.curve.get_or_insert(BlendCurve::Linear);

        if params.new_instance_behavior == NewInstanceBehavior::Unspecified {
            params.new_instance_behavior = state.flags.placement();
        }
        if params.new_instance_behavior == NewInstanceBehavior::Unspecified {
            params.new_instance_behavior = self.params.default_behavior;
        }
        let spawn_new_track = params.new_instance_behavior == NewInstanceBehavior::SpawnNewTrack
            || self.track_stack.is_empty();

        let prev_info = params
            .prev_instance
            .filter(|&slot| self.instance_used[slot])
            .map(|slot| {
                let prev = &self.instances[slot];
                PrevInstanceInfo {
                    id: prev.id,
                    phase: prev.phase,
                    phase_rate: prev.phase_rate,
                    channel_delta: prev.channel_delta,
                }
            });

        let track = if spawn_new_track {
            self.disable_top_update = false;
            let track = self.allocate_track();
            self.track_stack.insert(0, track);
            track
        } else {
            let track = params
                .track
                .filter(|&t| self.track_used[t])
                .or_else(|| self.track_stack.first().copied())
                .unwrap_or_default();
            if self.tracks[track].len() >= self.params.max_instances {
                if let Some(oldest) = self.tracks[track].instances.pop() {
                    self.release_instance(oldest);
                }
            }
            track
        };

        let slot = self.allocate_instance(track);
        self.hooks.prepare(state, &mut params);

        if params.prevent_blend_overrun {
            if let Some(prev) = prev_info.as_ref().filter(|p| p.phase_rate > 0.0) {
                let remaining = clamp01(1.0 - prev.phase) / prev.phase_rate;
                params.anim_fade_time = params.anim_fade_time.min(remaining);
                params.motion_fade_time = params.motion_fade_time.min(remaining);
            }
        }

        if self.is_top_track(track) && !self.disable_top_update {
            if let Some(overlay) = self.tracks[track].overlay.as_mut() {
                overlay.copy_from(&self.overlay);
            }
        }
        let pose = match self.tracks[track].overlay.as_mut() {
            Some(overlay) => self.compiler.compile(state, overlay),
            None => self.compiler.compile(state, &mut self.overlay),
        };

        let id = self.instance_ids.next_id();
        self.instances[slot].init(id, state_index, state, track, &params, prev_info.as_ref(), pose);
        if self.params.cache_top_info {
            self.instances[slot].info = self.info.clone();
        }
        self.tracks[track].instances.insert(0, slot);

        tracing::debug!(
            layer = %self.params.name,
            state = %state.name,
            instance = id.0,
            track,
            new_track = spawn_new_track,
            fade = params.anim_fade_time,
            "state instance created"
        );
        self.hooks.on_create(&self.instances[slot]);
        slot
    }

    /// Applies `transition` from the instance at `slot` on `track`.
    ///
    /// Returns the resulting instance slot: a new instance, the looped instance, or `None`
    /// for transitions that produce no instance and for placements the instance may not
    /// make.
    pub(crate) fn apply_transition(
        &mut self,
        track: usize,
        slot: usize,
        transition: &TransitionDef,
        request: Option<&FadeToStateParams>,
        request_id: RequestId,
        count_completed: bool,
    ) -> Option<usize> {
        let flags = transition.flags;
        if flags.fade_out_layer {
            self.fade_layer(0.0, transition.fade_time, transition.curve);
            self.disable_transitions();
            return None;
        }
        if flags.no_reset {
            return None;
        }

        let graph = Arc::clone(&self.graph);
        let dest_index = graph.state_index(&transition.dest_state)?;
        let dest = &graph.states()[dest_index];
        let instance = &self.instances[slot];

        let phase_sync = flags.phase_sync || request.is_some_and(|r| r.phase_sync);
        let mut start_phase = transition.start_phase;
        if let Some(phase) = request.and_then(|r| r.start_phase) {
            if (0.0..=1.0).contains(&phase) {
                start_phase = phase;
            }
        }
        if phase_sync {
            start_phase += instance.phase;
            if start_phase > 1.0 {
                start_phase -= 1.0;
            }
        } else if start_phase >= 1.0 {
            start_phase -= 1.0;
        }

        let table = self
            .blend_overrides
            .lookup(&instance.state_name, &dest.name)
            .filter(|entry| entry.allow_auto_transition || transition.name != AUTO_TRANSITION);
        let blend = resolve_blend(
            transition.fade_time,
            transition.motion_fade_time,
            transition.curve,
            table,
            request,
        );

        let mut behavior = flags.placement();
        if behavior == NewInstanceBehavior::Unspecified {
            behavior = dest.flags.placement();
        }
        if behavior == NewInstanceBehavior::Unspecified {
            behavior = self.params.default_behavior;
        }

        let params = SetStateParams {
            anim_fade_time: blend.anim_fade,
            motion_fade_time: blend.motion_fade,
            curve: Some(blend.curve),
            start_phase: clamp01(start_phase),
            new_instance_behavior: behavior,
            allow_state_looping: true,
            freeze_src_state: flags.freeze_src_state,
            freeze_dest_state: flags.freeze_dest_state,
            prevent_blend_overrun: flags.limit_blend_time,
            skip_first_frame_update: false,
            overrides: blend.overrides,
            prev_instance: Some(slot),
            track: Some(track),
            request_id,
        };

        let spawns_track = behavior == NewInstanceBehavior::SpawnNewTrack;
        if !self.is_top_of_track(slot) || (spawns_track && !self.is_top_track(track)) {
            if self.can_loop_instance(slot, dest_index, &params) {
                self.instances[slot].loop_state(params.start_phase);
                return Some(slot);
            }
            return None;
        }

        tracing::debug!(
            layer = %self.params.name,
            transition = %transition.name,
            from = %self.instances[slot].state_name,
            to = %dest.name,
            "applying transition"
        );
        let new_slot = self.set_state_internal(dest_index, params);
        if transition.fade_time <= 0.0 && count_completed {
            self.states_completed_last_update += 1;
        }
        Some(new_slot)
    }

    /// Drains the request queue from the front. Stops at the first named transition whose
    /// guard does not pass yet. Returns whether a request produced an instance.
    pub(crate) fn take_transitions(&mut self) -> bool {
        let mut taken = false;
        let mut iterations = 0;

        while !self.pending.is_empty() && self.transitions_enabled {
            iterations += 1;
            assert!(
                iterations < MAX_RESOLVE_ITERATIONS,
                "animation layer '{}': degenerate loop resolving transition requests",
                self.params.name
            );

            let current = self.current_slot();
            let src_state = current.map(|slot| self.instances[slot].state_name.clone());
            self.pending[0].src_state = src_state.clone();
            let request = self.pending[0].clone();

            match request.kind {
                RequestType::DirectFade => {
                    let Some(state_index) = self.graph.state_index(&request.target) else {
                        tracing::warn!(layer = %self.params.name, state = %request.target, "fade to unknown state");
                        self.remove_change_request(0, RequestStatus::Invalid, None);
                        self.transitions_taken_last_update += 1;
                        continue;
                    };

                    let table = src_state
                        .as_deref()
                        .and_then(|src| self.blend_overrides.lookup(src, &request.target));
                    let blend = resolve_blend(0.0, None, BlendCurve::Linear, table, Some(&request.params));
                    let p = &request.params;
                    let params = SetStateParams {
                        anim_fade_time: blend.anim_fade,
                        motion_fade_time: blend.motion_fade,
                        curve: Some(blend.curve),
                        start_phase: p.start_phase.unwrap_or(0.0),
                        new_instance_behavior: p.new_instance_behavior,
                        allow_state_looping: true,
                        freeze_src_state: p.freeze_src_state,
                        freeze_dest_state: p.freeze_dest_state,
                        prevent_blend_overrun: p.prevent_blend_overrun,
                        skip_first_frame_update: p.skip_first_frame_update,
                        overrides: blend.overrides,
                        prev_instance: current,
                        track: None,
                        request_id: request.id,
                    };

                    let slot = self.set_state_internal(state_index, params);
                    self.states_completed_last_update += 1;
                    self.remove_change_request(0, RequestStatus::Taken, Some(slot));
                    self.transitions_taken_last_update += 1;
                    taken = true;
                }
                RequestType::Transition => {
                    let Some(slot) = current else {
                        tracing::warn!(layer = %self.params.name, transition = %request.target, "no active state to transition from");
                        self.remove_change_request(0, RequestStatus::Invalid, None);
                        continue;
                    };
                    if !self.is_transition_valid(&request.target) {
                        tracing::warn!(
                            layer = %self.params.name,
                            transition = %request.target,
                            state = src_state.as_deref().unwrap_or_default(),
                            "transition does not exist on current state"
                        );
                        self.remove_change_request(0, RequestStatus::Invalid, None);
                        continue;
                    }
                    let Some(transition) = self.active_transition(slot, &request.target) else {
                        break;
                    };

                    let track = self.instances[slot].track;
                    let new_slot = self.apply_transition(
                        track,
                        slot,
                        &transition,
                        Some(&request.params),
                        request.id,
                        true,
                    );
                    self.remove_change_request(0, RequestStatus::Taken, new_slot);
                    self.transitions_taken_last_update += 1;
                    taken = new_slot.is_some();
                }
            }
        }
        taken
    }

    /// Takes the `auto` transition of the instance at `slot` if it is active.
    pub(crate) fn take_auto_transition(&mut self, track: usize, slot: usize) -> Option<usize> {
        let instance = &self.instances[slot];
        if instance.auto_transitions_disabled {
            return None;
        }
        let state = self.graph.state_at(instance.state)?;
        if !state.has_transition(AUTO_TRANSITION) {
            return None;
        }
        let transition = self.active_transition(slot, AUTO_TRANSITION)?;
        if transition.flags.inactive_while_blending && self.num_total_instances() > 1 {
            return None;
        }

        let result = self.apply_transition(track, slot, &transition, None, RequestId::INVALID, false);
        if result.is_some() {
            self.transitions_taken_last_update += 1;
        }
        result
    }

    /// Tries the `auto` transition on every live instance. The set of candidates is fixed
    /// before any transition is applied.
    pub(crate) fn take_auto_transitions(&mut self, skip_current: bool) -> bool {
        let current = self.current_slot();
        let candidates: Vec<(usize, usize, InstanceId)> = self
            .track_stack
            .iter()
            .flat_map(|&t| {
                self.tracks[t]
                    .instances
                    .iter()
                    .map(move |&slot| (t, slot))
            })
            .filter(|&(_, slot)| !(skip_current && Some(slot) == current))
            .map(|(t, slot)| (t, slot, self.instances[slot].id))
            .collect();

        let mut taken = false;
        for (track, slot, id) in candidates {
            if !self.is_live(slot, id) || self.instances[slot].track != track {
                continue;
            }
            if self.take_auto_transition(track, slot).is_some() {
                taken = true;
            }
        }
        taken
    }
}
