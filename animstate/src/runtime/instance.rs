use super::{AnimInfo, PoseNode, TriggeredEffect};
use crate::curve::clamp01;
use crate::{BlendCurve, InstanceId, NewInstanceBehavior, RequestId, StateDef};

/// Which blend parameters came from an override rather than the transition defaults.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BlendOverrideFlags {
    pub anim_fade: bool,
    pub motion_fade: bool,
    pub curve: bool,
}

/// Fully resolved parameters for creating (or looping) a state instance.
#[derive(Clone, Debug, PartialEq)]
pub struct SetStateParams {
    pub anim_fade_time: f32,
    pub motion_fade_time: f32,
    pub curve: Option<BlendCurve>,
    pub start_phase: f32,
    pub new_instance_behavior: NewInstanceBehavior,
    pub allow_state_looping: bool,
    pub freeze_src_state: bool,
    pub freeze_dest_state: bool,
    pub prevent_blend_overrun: bool,
    pub skip_first_frame_update: bool,
    pub overrides: BlendOverrideFlags,
    pub(crate) prev_instance: Option<usize>,
    pub(crate) track: Option<usize>,
    pub(crate) request_id: RequestId,
}

impl Default for SetStateParams {
    fn default() -> Self {
        Self {
            anim_fade_time: 0.0,
            motion_fade_time: 0.0,
            curve: None,
            start_phase: 0.0,
            new_instance_behavior: NewInstanceBehavior::Unspecified,
            allow_state_looping: false,
            freeze_src_state: false,
            freeze_dest_state: false,
            prevent_blend_overrun: false,
            skip_first_frame_update: false,
            overrides: BlendOverrideFlags::default(),
            prev_instance: None,
            track: None,
            request_id: RequestId::INVALID,
        }
    }
}

impl SetStateParams {
    pub fn with_fade(fade_time: f32) -> Self {
        Self {
            anim_fade_time: fade_time,
            motion_fade_time: fade_time,
            ..Self::default()
        }
    }
}

/// Snapshot of the instance being replaced, taken before pool reclamation can free it.
#[derive(Clone, Debug)]
pub(crate) struct PrevInstanceInfo {
    pub(crate) id: InstanceId,
    pub(crate) phase: f32,
    pub(crate) phase_rate: f32,
    pub(crate) channel_delta: f32,
}

/// One playing copy of a state.
#[derive(Clone, Debug)]
pub struct StateInstance {
    pub(crate) id: InstanceId,
    pub(crate) state: usize,
    pub(crate) state_name: String,
    pub(crate) track: usize,
    pub(crate) request_id: RequestId,
    pub(crate) prev_instance: InstanceId,

    pub(crate) phase: f32,
    pub(crate) prev_phase: f32,
    pub(crate) start_phase: f32,
    pub(crate) phase_rate: f32,
    pub(crate) remainder_time: f32,

    pub(crate) curve: BlendCurve,
    pub(crate) anim_fade: f32,
    pub(crate) motion_fade: f32,
    pub(crate) effective_fade: f32,
    pub(crate) anim_fade_total: f32,
    pub(crate) anim_fade_left: f32,
    pub(crate) motion_fade_total: f32,
    pub(crate) motion_fade_left: f32,
    pub(crate) overrides: BlendOverrideFlags,

    pub(crate) auto_transitions_disabled: bool,
    pub(crate) allow_state_looping: bool,
    pub(crate) phase_frozen: bool,
    pub(crate) freeze_requested: bool,
    pub(crate) frozen_during_fade_in: bool,
    pub(crate) freeze_fading_out_states: bool,
    pub(crate) skip_first_frame_update: bool,
    pub(crate) extrapolate_align: bool,
    pub(crate) exclusive_effects: bool,

    pub(crate) channel_delta: f32,
    pub(crate) info: AnimInfo,
    pub(crate) pose: Option<PoseNode>,
}

impl Default for StateInstance {
    fn default() -> Self {
        Self {
            id: InstanceId::INVALID,
            state: usize::MAX,
            state_name: String::new(),
            track: usize::MAX,
            request_id: RequestId::INVALID,
            prev_instance: InstanceId::INVALID,
            phase: 0.0,
            prev_phase: 0.0,
            start_phase: 0.0,
            phase_rate: 0.0,
            remainder_time: 0.0,
            curve: BlendCurve::Linear,
            anim_fade: 0.0,
            motion_fade: 0.0,
            effective_fade: 0.0,
            anim_fade_total: 0.0,
            anim_fade_left: 0.0,
            motion_fade_total: 0.0,
            motion_fade_left: 0.0,
            overrides: BlendOverrideFlags::default(),
            auto_transitions_disabled: false,
            allow_state_looping: false,
            phase_frozen: false,
            freeze_requested: false,
            frozen_during_fade_in: false,
            freeze_fading_out_states: false,
            skip_first_frame_update: false,
            extrapolate_align: false,
            exclusive_effects: false,
            channel_delta: 0.0,
            info: AnimInfo::default(),
            pose: None,
        }
    }
}

impl StateInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    /// Index of the state in the layer's [`crate::StateGraph`].
    pub fn state_index(&self) -> usize {
        self.state
    }

    pub fn track_index(&self) -> usize {
        self.track
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn prev_instance_id(&self) -> InstanceId {
        self.prev_instance
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn prev_phase(&self) -> f32 {
        self.prev_phase
    }

    pub fn phase_rate(&self) -> f32 {
        self.phase_rate
    }

    pub fn remainder_time(&self) -> f32 {
        self.remainder_time
    }

    pub fn anim_fade(&self) -> f32 {
        self.anim_fade
    }

    pub fn motion_fade(&self) -> f32 {
        self.motion_fade
    }

    pub fn master_fade(&self) -> f32 {
        self.anim_fade.min(self.motion_fade)
    }

    pub fn effective_fade(&self) -> f32 {
        self.effective_fade
    }

    pub fn anim_fade_time(&self) -> f32 {
        self.anim_fade_total
    }

    pub fn motion_fade_time(&self) -> f32 {
        self.motion_fade_total
    }

    pub fn curve(&self) -> BlendCurve {
        self.curve
    }

    pub fn blend_overrides(&self) -> BlendOverrideFlags {
        self.overrides
    }

    pub fn is_fading_in(&self) -> bool {
        self.anim_fade_left > 0.0 || self.motion_fade_left > 0.0
    }

    pub fn is_phase_frozen(&self) -> bool {
        self.phase_frozen
    }

    pub fn are_auto_transitions_disabled(&self) -> bool {
        self.auto_transitions_disabled
    }

    pub fn channel_delta(&self) -> f32 {
        self.channel_delta
    }

    /// Blackboard copied from the layer while this was the current instance.
    pub fn info(&self) -> &AnimInfo {
        &self.info
    }

    pub fn pose(&self) -> Option<&PoseNode> {
        self.pose.as_ref()
    }

    pub(crate) fn init(
        &mut self,
        id: InstanceId,
        state_index: usize,
        state: &StateDef,
        track: usize,
        params: &SetStateParams,
        prev: Option<&PrevInstanceInfo>,
        pose: PoseNode,
    ) {
        *self = Self {
            id,
            state: state_index,
            state_name: state.name.clone(),
            track,
            request_id: params.request_id,
            prev_instance: prev.map_or(InstanceId::INVALID, |p| p.id),
            phase: clamp01(params.start_phase),
            start_phase: params.start_phase,
            phase_rate: state.phase_rate(),
            curve: params.curve.unwrap_or_default(),
            anim_fade_total: params.anim_fade_time,
            anim_fade_left: params.anim_fade_time,
            motion_fade_total: params.motion_fade_time,
            motion_fade_left: params.motion_fade_time,
            overrides: params.overrides,
            allow_state_looping: params.allow_state_looping,
            phase_frozen: params.freeze_dest_state,
            frozen_during_fade_in: params.freeze_dest_state,
            freeze_fading_out_states: params.freeze_src_state,
            skip_first_frame_update: params.skip_first_frame_update,
            extrapolate_align: state.flags.extrapolate_align,
            exclusive_effects: state.flags.exclusive_effects,
            channel_delta: prev.map_or(0.0, |p| p.channel_delta),
            pose: Some(pose),
            ..Self::default()
        };
        self.prev_phase = self.phase;
        self.update_fades(0.0);
    }

    fn update_fades(&mut self, dt: f32) {
        self.anim_fade = step_fade(&mut self.anim_fade_left, self.anim_fade_total, dt, self.curve);
        self.motion_fade =
            step_fade(&mut self.motion_fade_left, self.motion_fade_total, dt, self.curve);
    }

    /// Advances both fades and recomputes the freeze state. Returns whether older
    /// instances should be frozen.
    pub(crate) fn fade_update(&mut self, dt: f32, freeze: bool) -> bool {
        self.update_fades(dt);
        let fading_in = self.is_fading_in();
        self.phase_frozen =
            freeze || self.freeze_requested || (self.frozen_during_fade_in && fading_in);
        (self.freeze_fading_out_states && fading_in) || freeze
    }

    /// Advances the phase by `dt` seconds, clamping to `[0, 1]` and keeping the overshoot
    /// as `remainder_time`. Effects keyed inside the crossed window are appended to
    /// `effects`.
    pub(crate) fn phase_update(
        &mut self,
        dt: f32,
        state: &StateDef,
        top_state: bool,
        effects: &mut Vec<TriggeredEffect>,
    ) {
        let rate = self.phase_rate;
        let old_phase = self.phase;
        self.prev_phase = old_phase;

        let mut new_phase = old_phase;
        if !self.phase_frozen && !self.skip_first_frame_update {
            new_phase += rate * dt;
        }

        let mut remainder = 0.0;
        if new_phase > 1.0 {
            remainder = new_phase - 1.0;
            new_phase = 1.0;
        } else if new_phase < 0.0 {
            remainder = -new_phase;
            new_phase = 0.0;
        }

        self.remainder_time = if rate != 0.0 { remainder / rate.abs() } else { 0.0 };
        self.phase = new_phase;
        self.skip_first_frame_update = false;
        self.channel_delta += new_phase - old_phase;

        if new_phase == old_phase {
            return;
        }
        for effect in &state.effects {
            if crossed(old_phase, new_phase, effect.phase) {
                effects.push(TriggeredEffect {
                    name: effect.name.clone(),
                    state: state.name.clone(),
                    instance: self.id,
                    phase: effect.phase,
                    anim_blend: self.effective_fade,
                    top_state,
                    exclusive: self.exclusive_effects,
                });
            }
        }
    }

    /// Restarts the instance in place.
    pub(crate) fn loop_state(&mut self, start_phase: f32) {
        self.prev_phase = self.phase;
        self.phase = clamp01(start_phase);
        self.start_phase = start_phase;
        self.remainder_time = 0.0;
        self.auto_transitions_disabled = false;
        self.phase_frozen = false;
        self.frozen_during_fade_in = false;
    }

    pub(crate) fn reset_channel_delta(&mut self) {
        if self.extrapolate_align && self.phase >= 1.0 {
            return;
        }
        self.channel_delta = 0.0;
    }
}

fn step_fade(left: &mut f32, total: f32, dt: f32, curve: BlendCurve) -> f32 {
    if *left <= 0.0 {
        return 1.0;
    }
    *left -= dt;
    let t = if total > 0.0 {
        clamp01((total - *left) / total)
    } else {
        1.0
    };
    curve.evaluate(t)
}

/// Whether `key` lies in the window travelled from `from` to `to`. The window excludes its
/// start so a key is reported once, except for keys at phase 0 when starting from 0.
fn crossed(from: f32, to: f32, key: f32) -> bool {
    if to > from {
        (key > from || (from <= 0.0 && key <= 0.0)) && key <= to
    } else {
        (key < from || (from >= 1.0 && key >= 1.0)) && key >= to
    }
}
