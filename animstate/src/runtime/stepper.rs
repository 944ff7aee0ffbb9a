use super::effects::remove_effects_with_lowest_blend;
use super::{AnimStateLayer, TriggeredEffect};
use crate::InstanceId;
use crate::curve::clamp01;
use std::sync::Arc;

impl AnimStateLayer {
    /// Advances the layer by `dt` seconds: resolves queued and automatic transitions,
    /// updates fades and phases, follows up on completed instances, and garbage collects
    /// instances and tracks that no longer contribute.
    #[tracing::instrument(level = "trace", skip(self), fields(layer = %self.params.name))]
    pub fn begin_step(&mut self, dt: f32) {
        self.time += f64::from(dt);
        self.transitions_taken_last_update = 0;
        self.states_completed_last_update = 0;

        self.delete_non_contributing();
        self.reset_channel_deltas();

        if self.transitions_enabled {
            let took = self.take_transitions();
            self.take_auto_transitions(took);
        }

        if !self.disable_top_update {
            self.copy_info_to_current();
        }

        self.update_instance_fade_effects(dt);
        self.update_phases(dt);
        self.follow_up_completed_instances();
        remove_effects_with_lowest_blend(&mut self.triggered_effects);

        self.delete_non_contributing();
        self.sync_overlays();

        self.fade.step(dt);
        if self.fade.current == 0.0 && self.fade.desired == 0.0 && !self.track_stack.is_empty() {
            tracing::debug!(layer = %self.params.name, "layer faded out, releasing all tracks");
            let stack = self.track_stack.clone();
            for track in stack {
                self.release_track(track);
            }
        }

        tracing::trace!(
            tracks = self.track_stack.len(),
            instances = self.num_total_instances(),
            pending = self.pending.len(),
            taken = self.transitions_taken_last_update,
            completed = self.states_completed_last_update,
            "step"
        );
    }

    /// Hands the effects triggered since the last call to the caller.
    pub fn finish_step(&mut self, dt: f32, effects: &mut Vec<TriggeredEffect>) {
        tracing::trace!(layer = %self.params.name, dt, effects = self.triggered_effects.len(), "finish step");
        effects.append(&mut self.triggered_effects);
    }

    pub(crate) fn reset_channel_deltas(&mut self) {
        for i in 0..self.track_stack.len() {
            let t = self.track_stack[i];
            for j in 0..self.tracks[t].instances.len() {
                let slot = self.tracks[t].instances[j];
                self.instances[slot].reset_channel_delta();
            }
        }
    }

    fn copy_info_to_current(&mut self) {
        if !self.params.cache_top_info {
            return;
        }
        if let Some(slot) = self.current_slot() {
            self.instances[slot].info.clone_from(&self.info);
        }
    }

    /// Steps every fade, propagating freezes from newer to older instances, then splits
    /// the layer fade over the tracks newest first.
    pub(crate) fn update_instance_fade_effects(&mut self, dt: f32) {
        let mut freeze = false;
        let mut remaining = self.fade.current;
        for i in 0..self.track_stack.len() {
            let t = self.track_stack[i];
            for j in 0..self.tracks[t].instances.len() {
                let slot = self.tracks[t].instances[j];
                freeze = self.instances[slot].fade_update(dt, freeze);
            }
            let track_fade = self.tracks[t].anim_fade(&self.instances);
            self.tracks[t].update_effective_fade(remaining * track_fade, &mut self.instances);
            remaining *= clamp01(1.0 - track_fade);
        }
    }

    fn update_phases(&mut self, dt: f32) {
        let graph = Arc::clone(&self.graph);
        let mut top_state = true;
        for i in 0..self.track_stack.len() {
            let t = self.track_stack[i];
            for j in 0..self.tracks[t].instances.len() {
                let slot = self.tracks[t].instances[j];
                let instance = &mut self.instances[slot];
                if instance.extrapolate_align && instance.phase >= 1.0 {
                    continue;
                }
                let Some(state) = graph.state_at(instance.state) else {
                    continue;
                };
                instance.phase_update(dt, state, i == 0 && top_state, &mut self.triggered_effects);
                if i == 0 {
                    top_state = false;
                }
            }
        }
    }

    /// Instances that reached the end of their state this frame get a chance to take a
    /// queued (current instance only) or automatic transition. A new instance is advanced
    /// by the time left over from the completed one.
    fn follow_up_completed_instances(&mut self) {
        let graph = Arc::clone(&self.graph);
        let snapshot: Vec<(usize, InstanceId)> = self
            .slots_new_to_old()
            .map(|slot| (slot, self.instances[slot].id))
            .collect();

        for (slot, id) in snapshot {
            if !self.is_live(slot, id) || self.instances[slot].phase < 1.0 {
                continue;
            }
            let is_current = self.current_slot() == Some(slot);
            if is_current {
                self.states_completed_last_update += 1;
            }
            if !self.transitions_enabled {
                continue;
            }

            let remainder = self.instances[slot].remainder_time;
            let mut next = None;
            if is_current && self.take_transitions() {
                next = self.current_slot();
            }
            if next.is_none() && self.is_live(slot, id) {
                let track = self.instances[slot].track;
                next = self.take_auto_transition(track, slot);
            }

            let Some(next) = next else {
                continue;
            };
            let next_is_current = self.current_slot() == Some(next);
            if next_is_current && !self.disable_top_update {
                self.copy_info_to_current();
            }
            let instance = &mut self.instances[next];
            if let Some(state) = graph.state_at(instance.state) {
                instance.phase_update(remainder, state, next_is_current, &mut self.triggered_effects);
            }
        }
    }

    /// Carries variant counters advanced on the top track back to the layer snapshot, then
    /// refreshes the top track from the layer snapshot.
    fn sync_overlays(&mut self) {
        let Some(&top) = self.track_stack.first() else {
            return;
        };
        if let Some(overlay) = self.tracks[top].overlay.as_ref() {
            self.overlay.update_variants_from(overlay);
        }
        if !self.disable_top_update {
            if let Some(overlay) = self.tracks[top].overlay.as_mut() {
                overlay.copy_from(&self.overlay);
            }
        }
    }
}
