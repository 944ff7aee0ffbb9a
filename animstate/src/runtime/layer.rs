use super::request::{MAX_REQUESTS_IN_FLIGHT, ProcessedRequest, StateChangeRequest};
use super::{
    AnimInfo, LayerBlendMode, LayerHooks, NoHooks, OverlayPoseCompiler, PoseTreeCompiler,
    StateInstance, Track, TriggeredEffect,
};
use crate::curve::clamp01;
use crate::ids::{InstanceIdGen, RequestIdGen};
use crate::{
    BlendCurve, BlendOverrideTable, Error, InstanceId, NewInstanceBehavior, OverlaySnapshot,
    StateDef, StateGraph,
};
use std::sync::Arc;

/// Construction-time configuration of a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerParams {
    pub name: String,
    pub max_tracks: usize,
    /// Also the per-track instance capacity.
    pub max_instances: usize,
    /// Placement used when neither the transition nor the destination state decides.
    pub default_behavior: NewInstanceBehavior,
    pub cache_overlays: bool,
    pub cache_top_info: bool,
    pub blend_mode: LayerBlendMode,
    pub feather_blend_index: Option<u32>,
    pub initial_fade: f32,
}

impl Default for LayerParams {
    fn default() -> Self {
        Self {
            name: "base".to_string(),
            max_tracks: 2,
            max_instances: 4,
            default_behavior: NewInstanceBehavior::SpawnNewTrack,
            cache_overlays: true,
            cache_top_info: true,
            blend_mode: LayerBlendMode::Interpolate,
            feather_blend_index: None,
            initial_fade: 1.0,
        }
    }
}

impl LayerParams {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_tracks == 0 || self.max_instances == 0 {
            return Err(Error::InvalidValue {
                message: format!(
                    "layer '{}' needs at least one track and one instance (got {} / {})",
                    self.name, self.max_tracks, self.max_instances
                ),
            });
        }
        if self.default_behavior == NewInstanceBehavior::Unspecified {
            return Err(Error::InvalidValue {
                message: format!("layer '{}' has no default placement policy", self.name),
            });
        }
        if !(0.0..=1.0).contains(&self.initial_fade) {
            return Err(Error::InvalidValue {
                message: format!(
                    "layer '{}' initial fade {} is outside [0, 1]",
                    self.name, self.initial_fade
                ),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct LayerFade {
    pub(crate) current: f32,
    pub(crate) desired: f32,
    pub(crate) start: f32,
    pub(crate) total: f32,
    pub(crate) left: f32,
    pub(crate) curve: BlendCurve,
}

impl LayerFade {
    fn settled(value: f32) -> Self {
        Self {
            current: value,
            desired: value,
            start: value,
            total: 0.0,
            left: 0.0,
            curve: BlendCurve::Linear,
        }
    }

    pub(crate) fn step(&mut self, dt: f32) {
        if self.left <= 0.0 {
            self.current = self.desired;
            return;
        }
        self.left -= dt;
        if self.left <= 0.0 || self.total <= 0.0 {
            self.left = 0.0;
            self.current = self.desired;
            return;
        }
        let t = clamp01((self.total - self.left) / self.total);
        let weight = self.curve.evaluate(t);
        self.current = self.start + (self.desired - self.start) * weight;
    }
}

/// A stack of state instances driven by a bounded transition request queue.
///
/// Requests are only recorded by the request calls and resolved by
/// [`AnimStateLayer::begin_step`]. Pools are fixed at construction.
pub struct AnimStateLayer {
    pub(crate) params: LayerParams,
    pub(crate) graph: Arc<StateGraph>,
    pub(crate) blend_overrides: Arc<BlendOverrideTable>,

    pub(crate) instances: Vec<StateInstance>,
    pub(crate) instance_used: Vec<bool>,
    pub(crate) tracks: Vec<Track>,
    pub(crate) track_used: Vec<bool>,
    /// Track indices, newest first.
    pub(crate) track_stack: Vec<usize>,

    pub(crate) pending: Vec<StateChangeRequest>,
    pub(crate) processed: [ProcessedRequest; MAX_REQUESTS_IN_FLIGHT],
    pub(crate) processed_write: usize,
    pub(crate) request_ids: RequestIdGen,
    pub(crate) instance_ids: InstanceIdGen,

    pub(crate) transitions_enabled: bool,
    pub(crate) disable_top_update: bool,
    pub(crate) fade: LayerFade,
    pub(crate) info: AnimInfo,
    pub(crate) overlay: OverlaySnapshot,
    pub(crate) hooks: Box<dyn LayerHooks + Send>,
    pub(crate) compiler: Box<dyn PoseTreeCompiler + Send>,
    pub(crate) triggered_effects: Vec<TriggeredEffect>,

    pub(crate) transitions_taken_last_update: u32,
    pub(crate) states_completed_last_update: u32,
    pub(crate) time: f64,
}

impl std::fmt::Debug for AnimStateLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimStateLayer")
            .field("name", &self.params.name)
            .field("tracks", &self.track_stack)
            .field("instances", &self.num_total_instances())
            .field("pending", &self.pending.len())
            .field("fade", &self.fade.current)
            .finish_non_exhaustive()
    }
}

impl AnimStateLayer {
    pub fn new(graph: Arc<StateGraph>, params: LayerParams) -> Result<Self, Error> {
        params.validate()?;
        let tracks = (0..params.max_tracks)
            .map(|_| Track::new(params.cache_overlays))
            .collect();
        Ok(Self {
            instances: vec![StateInstance::default(); params.max_instances],
            instance_used: vec![false; params.max_instances],
            tracks,
            track_used: vec![false; params.max_tracks],
            track_stack: Vec::with_capacity(params.max_tracks),
            pending: Vec::with_capacity(MAX_REQUESTS_IN_FLIGHT),
            processed: Default::default(),
            processed_write: 0,
            request_ids: RequestIdGen::default(),
            instance_ids: InstanceIdGen::default(),
            transitions_enabled: true,
            disable_top_update: false,
            fade: LayerFade::settled(params.initial_fade),
            info: AnimInfo::default(),
            overlay: OverlaySnapshot::default(),
            hooks: Box::new(NoHooks),
            compiler: Box::new(OverlayPoseCompiler),
            triggered_effects: Vec::new(),
            transitions_taken_last_update: 0,
            states_completed_last_update: 0,
            time: 0.0,
            graph,
            blend_overrides: Arc::new(BlendOverrideTable::default()),
            params,
        })
    }

    pub fn set_blend_overrides(&mut self, table: Arc<BlendOverrideTable>) -> Result<(), Error> {
        table.validate(&self.graph)?;
        self.blend_overrides = table;
        Ok(())
    }

    pub fn set_hooks<H: LayerHooks + Send + 'static>(&mut self, hooks: H) {
        self.hooks = Box::new(hooks);
    }

    pub fn set_pose_compiler<C: PoseTreeCompiler + Send + 'static>(&mut self, compiler: C) {
        self.compiler = Box::new(compiler);
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn params(&self) -> &LayerParams {
        &self.params
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }

    pub fn info(&self) -> &AnimInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut AnimInfo {
        &mut self.info
    }

    pub fn overlay(&self) -> &OverlaySnapshot {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlaySnapshot {
        &mut self.overlay
    }

    /// Seconds accumulated over every `begin_step`.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn current_fade(&self) -> f32 {
        self.fade.current
    }

    pub fn desired_fade(&self) -> f32 {
        self.fade.desired
    }

    /// Fades the whole layer towards `target` over `fade_time` seconds.
    pub fn fade_layer(&mut self, target: f32, fade_time: f32, curve: BlendCurve) {
        let target = clamp01(target);
        self.fade.start = self.fade.current;
        self.fade.desired = target;
        self.fade.curve = curve;
        if fade_time > 0.0 {
            self.fade.total = fade_time;
            self.fade.left = fade_time;
        } else {
            self.fade.total = 0.0;
            self.fade.left = 0.0;
            self.fade.current = target;
        }
    }

    pub fn enable_transitions(&mut self) {
        self.transitions_enabled = true;
    }

    pub fn disable_transitions(&mut self) {
        self.transitions_enabled = false;
    }

    pub fn are_transitions_enabled(&self) -> bool {
        self.transitions_enabled
    }

    /// Stops the per-frame copy of the global overlay and blackboard into the top track
    /// and current instance. Cleared again when a new track is spawned.
    pub fn disable_top_update_overlay_and_info(&mut self) {
        self.disable_top_update = true;
    }

    pub fn is_top_update_disabled(&self) -> bool {
        self.disable_top_update
    }

    pub fn states_completed_last_update(&self) -> u32 {
        self.states_completed_last_update
    }

    pub fn transitions_taken_last_update(&self) -> u32 {
        self.transitions_taken_last_update
    }

    /// Releases every instance and track and drops all pending requests.
    pub fn reset(&mut self) {
        for slot in 0..self.instances.len() {
            self.release_instance(slot);
        }
        for track in &mut self.tracks {
            track.clear();
        }
        self.track_used.fill(false);
        self.track_stack.clear();
        self.pending.clear();
        self.processed = Default::default();
        self.processed_write = 0;
        self.triggered_effects.clear();
        self.transitions_taken_last_update = 0;
        self.states_completed_last_update = 0;
        self.transitions_enabled = true;
        self.disable_top_update = false;
    }

    pub fn num_used_tracks(&self) -> usize {
        self.track_stack.len()
    }

    /// Track at `index` in the stack, 0 being the newest.
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.track_stack.get(index).map(|&t| &self.tracks[t])
    }

    pub fn has_free_instance(&self) -> bool {
        self.instance_used.iter().any(|used| !*used)
    }

    pub fn has_free_track(&self) -> bool {
        self.track_used.iter().any(|used| !*used)
    }

    pub fn num_total_instances(&self) -> usize {
        self.track_stack.iter().map(|&t| self.tracks[t].len()).sum()
    }

    pub fn num_fades_in_progress(&self) -> usize {
        self.num_total_instances().saturating_sub(1)
    }

    pub(crate) fn current_slot(&self) -> Option<usize> {
        let &top = self.track_stack.first()?;
        self.tracks[top].top()
    }

    pub fn current_state_instance(&self) -> Option<&StateInstance> {
        self.current_slot().map(|slot| &self.instances[slot])
    }

    pub fn current_instance_id(&self) -> InstanceId {
        self.current_state_instance()
            .map_or(InstanceId::INVALID, StateInstance::id)
    }

    pub fn current_state(&self) -> Option<&StateDef> {
        let instance = self.current_state_instance()?;
        self.graph.state_at(instance.state)
    }

    /// Name of the current state.
    pub fn current_state_id(&self) -> Option<&str> {
        self.current_state_instance().map(StateInstance::state_name)
    }

    pub fn is_in_non_transitional_state(&self) -> bool {
        self.current_state()
            .is_some_and(|state| !state.flags.transitional)
    }

    pub fn find_instance_by_id(&self, id: InstanceId) -> Option<&StateInstance> {
        self.slot_by_id(id).map(|slot| &self.instances[slot])
    }

    /// Oldest live instance of `state`.
    pub fn find_instance_by_name(&self, state: &str) -> Option<&StateInstance> {
        self.slots_old_to_new()
            .find(|&slot| self.instances[slot].state_name == state)
            .map(|slot| &self.instances[slot])
    }

    /// Newest live instance of `state`.
    pub fn find_instance_by_name_new_to_old(&self, state: &str) -> Option<&StateInstance> {
        self.slots_new_to_old()
            .find(|&slot| self.instances[slot].state_name == state)
            .map(|slot| &self.instances[slot])
    }

    /// Requests (or clears) a phase freeze on a live instance.
    pub fn set_instance_frozen(&mut self, id: InstanceId, frozen: bool) -> bool {
        let Some(slot) = self.slot_by_id(id) else {
            return false;
        };
        self.instances[slot].freeze_requested = frozen;
        true
    }

    pub fn disable_auto_transitions(&mut self, id: InstanceId) -> bool {
        let Some(slot) = self.slot_by_id(id) else {
            return false;
        };
        self.instances[slot].auto_transitions_disabled = true;
        true
    }

    /// Visits instances oldest track first, oldest instance first, until `visit` returns
    /// `false`.
    pub fn walk_instances_old_to_new(&self, mut visit: impl FnMut(&StateInstance, &Track) -> bool) {
        for &t in self.track_stack.iter().rev() {
            let track = &self.tracks[t];
            for &slot in track.instances.iter().rev() {
                if !visit(&self.instances[slot], track) {
                    return;
                }
            }
        }
    }

    /// Visits instances newest track first, newest instance first, until `visit` returns
    /// `false`.
    pub fn walk_instances_new_to_old(&self, mut visit: impl FnMut(&StateInstance, &Track) -> bool) {
        for &t in &self.track_stack {
            let track = &self.tracks[t];
            for &slot in &track.instances {
                if !visit(&self.instances[slot], track) {
                    return;
                }
            }
        }
    }

    pub(crate) fn slots_new_to_old(&self) -> impl Iterator<Item = usize> + '_ {
        self.track_stack
            .iter()
            .flat_map(|&t| self.tracks[t].instances.iter().copied())
    }

    pub(crate) fn slots_old_to_new(&self) -> impl Iterator<Item = usize> + '_ {
        self.track_stack
            .iter()
            .rev()
            .flat_map(|&t| self.tracks[t].instances.iter().rev().copied())
    }

    pub(crate) fn slot_by_id(&self, id: InstanceId) -> Option<usize> {
        if !id.is_valid() {
            return None;
        }
        self.slots_new_to_old()
            .find(|&slot| self.instances[slot].id == id)
    }

    pub(crate) fn is_live(&self, slot: usize, id: InstanceId) -> bool {
        self.instance_used[slot] && self.instances[slot].id == id
    }

    pub(crate) fn is_top_of_track(&self, slot: usize) -> bool {
        let track = self.instances[slot].track;
        self.tracks
            .get(track)
            .is_some_and(|t| t.top() == Some(slot))
    }

    pub(crate) fn is_top_track(&self, track: usize) -> bool {
        self.track_stack.first() == Some(&track)
    }

    pub(crate) fn release_instance(&mut self, slot: usize) {
        if !self.instance_used[slot] {
            return;
        }
        self.hooks.on_destroy(&self.instances[slot]);
        self.instances[slot] = StateInstance::default();
        self.instance_used[slot] = false;
    }

    /// Releases every instance on `track` and removes it from the stack.
    pub(crate) fn release_track(&mut self, track: usize) {
        let slots = std::mem::take(&mut self.tracks[track].instances);
        for slot in slots {
            self.release_instance(slot);
        }
        self.tracks[track].clear();
        self.track_used[track] = false;
        self.track_stack.retain(|&t| t != track);
    }

    /// Claims a free track, reclaiming the oldest track in the stack when none is free.
    pub(crate) fn allocate_track(&mut self) -> usize {
        if let Some(track) = self.track_used.iter().position(|used| !*used) {
            self.track_used[track] = true;
            return track;
        }
        let Some(&oldest) = self.track_stack.last() else {
            panic!(
                "animation layer '{}': track pool exhausted with an empty stack",
                self.params.name
            );
        };
        tracing::debug!(layer = %self.params.name, track = oldest, "reclaiming oldest track");
        self.release_track(oldest);
        self.track_used[oldest] = true;
        oldest
    }

    /// Claims a free instance slot for a push onto `target`. When the pool is exhausted the
    /// oldest track other than `target` is released; failing that, `target`'s own oldest
    /// instance is reclaimed.
    pub(crate) fn allocate_instance(&mut self, target: usize) -> usize {
        if let Some(slot) = self.instance_used.iter().position(|used| !*used) {
            self.instance_used[slot] = true;
            return slot;
        }

        let victim = self
            .track_stack
            .iter()
            .rev()
            .copied()
            .find(|&t| t != target && !self.tracks[t].is_empty());
        if let Some(track) = victim {
            tracing::debug!(layer = %self.params.name, track, "instance pool full, reclaiming oldest track");
            self.release_track(track);
        } else if let Some(slot) = self.tracks[target].instances.pop() {
            tracing::debug!(layer = %self.params.name, track = target, "instance pool full, reclaiming oldest instance");
            self.release_instance(slot);
        }

        let Some(slot) = self.instance_used.iter().position(|used| !*used) else {
            panic!("animation layer '{}': instance pool exhausted", self.params.name);
        };
        self.instance_used[slot] = true;
        slot
    }

    pub(crate) fn delete_non_contributing_instances(&mut self) {
        for i in 0..self.track_stack.len() {
            let t = self.track_stack[i];
            let released = self.tracks[t].take_non_contributing(&self.instances);
            for slot in released {
                self.release_instance(slot);
            }
        }
    }

    /// Releases empty tracks and every track older than the first fully faded-in one.
    pub(crate) fn delete_non_contributing_tracks(&mut self) {
        let mut fully_covered = false;
        let stack = self.track_stack.clone();
        for t in stack {
            if fully_covered || self.tracks[t].is_empty() {
                self.release_track(t);
                continue;
            }
            if self.tracks[t].master_fade(&self.instances) >= 1.0 {
                fully_covered = true;
            }
        }
        self.assert_pool_invariants();
    }

    pub(crate) fn delete_non_contributing(&mut self) {
        self.delete_non_contributing_instances();
        self.delete_non_contributing_tracks();
    }

    pub(crate) fn assert_pool_invariants(&self) {
        let used_instances = self.instance_used.iter().filter(|u| **u).count();
        let used_tracks = self.track_used.iter().filter(|u| **u).count();
        assert_eq!(
            used_instances,
            self.num_total_instances(),
            "animation layer '{}': instance pool and tracks disagree",
            self.params.name
        );
        assert_eq!(
            used_tracks,
            self.track_stack.len(),
            "animation layer '{}': track pool and stack disagree",
            self.params.name
        );
    }
}
