use crate::{BlendCurve, Error};
use std::collections::{HashMap, HashSet};

/// Name of the transition taken automatically when a state completes.
pub const AUTO_TRANSITION: &str = "auto";

/// Where a new instance goes relative to the instance it replaces.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Hash)]
pub enum NewInstanceBehavior {
    #[default]
    Unspecified,
    SpawnNewTrack,
    UsePreviousTrack,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StateFlags {
    pub never_loop: bool,
    /// Short-lived in-between state; see `AnimStateLayer::is_in_non_transitional_state`.
    pub transitional: bool,
    pub spawn_on_new_track: bool,
    pub spawn_on_same_track: bool,
    /// Entering the state disables auto transitions on every live instance.
    pub disable_prev_insts_auto_trans: bool,
    /// Completed instances keep their channel deltas and stop advancing.
    pub extrapolate_align: bool,
    pub exclusive_effects: bool,
}

impl StateFlags {
    pub(crate) fn placement(self) -> NewInstanceBehavior {
        if self.spawn_on_new_track {
            NewInstanceBehavior::SpawnNewTrack
        } else if self.spawn_on_same_track {
            NewInstanceBehavior::UsePreviousTrack
        } else {
            NewInstanceBehavior::Unspecified
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TransitionFlags {
    pub fade_out_layer: bool,
    pub no_reset: bool,
    pub phase_sync: bool,
    pub freeze_src_state: bool,
    pub freeze_dest_state: bool,
    pub limit_blend_time: bool,
    pub spawn_on_new_track: bool,
    pub spawn_on_same_track: bool,
    pub inactive_while_blending: bool,
    pub valid_on_top_instance_only: bool,
    pub valid_if_has_free_instance: bool,
    pub start_blend_early: bool,
    pub start_blend_early_reverse: bool,
}

impl TransitionFlags {
    pub(crate) fn placement(self) -> NewInstanceBehavior {
        if self.spawn_on_new_track {
            NewInstanceBehavior::SpawnNewTrack
        } else if self.spawn_on_same_track {
            NewInstanceBehavior::UsePreviousTrack
        } else {
            NewInstanceBehavior::Unspecified
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConditionSource {
    Phase,
    StateFade,
    Info(String),
}

/// Inclusive range check over a runtime value. Missing bounds are open.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionCondition {
    pub source: ConditionSource,
    pub lower: Option<f32>,
    pub upper: Option<f32>,
    pub require_switch: bool,
}

impl TransitionCondition {
    pub fn in_range(&self, value: f32) -> bool {
        self.lower.is_none_or(|lower| value >= lower) && self.upper.is_none_or(|upper| value <= upper)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionDef {
    pub name: String,
    pub dest_state: String,
    pub fade_time: f32,
    /// Defaults to `fade_time`.
    pub motion_fade_time: Option<f32>,
    pub curve: BlendCurve,
    pub start_phase: f32,
    pub flags: TransitionFlags,
    pub conditions: Vec<TransitionCondition>,
}

impl TransitionDef {
    pub fn new(name: impl Into<String>, dest_state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dest_state: dest_state.into(),
            fade_time: 0.0,
            motion_fade_time: None,
            curve: BlendCurve::Linear,
            start_phase: 0.0,
            flags: TransitionFlags::default(),
            conditions: Vec::new(),
        }
    }

    pub fn with_fade(mut self, fade_time: f32) -> Self {
        self.fade_time = fade_time;
        self
    }

    pub fn with_condition(mut self, condition: TransitionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn motion_fade_time(&self) -> f32 {
        self.motion_fade_time.unwrap_or(self.fade_time)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionGroupDef {
    pub name: String,
    pub transitions: Vec<TransitionDef>,
    pub groups: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectDef {
    pub name: String,
    pub phase: f32,
}

/// Pose subtree description compiled into a [`crate::PoseNode`] per instance.
#[derive(Clone, Debug, PartialEq)]
pub enum PoseTreeDef {
    Clip {
        anim: String,
    },
    Blend {
        left: Box<PoseTreeDef>,
        right: Box<PoseTreeDef>,
        factor: f32,
    },
}

impl PoseTreeDef {
    pub fn clip(anim: impl Into<String>) -> Self {
        Self::Clip { anim: anim.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateDef {
    pub name: String,
    /// Seconds; must be positive.
    pub duration: f32,
    pub speed: f32,
    pub flags: StateFlags,
    pub pose: PoseTreeDef,
    pub effects: Vec<EffectDef>,
    pub transitions: Vec<TransitionDef>,
    pub transition_groups: Vec<String>,
}

impl StateDef {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        let name = name.into();
        Self {
            pose: PoseTreeDef::clip(name.clone()),
            name,
            duration,
            speed: 1.0,
            flags: StateFlags::default(),
            effects: Vec::new(),
            transitions: Vec::new(),
            transition_groups: Vec::new(),
        }
    }

    pub fn with_transition(mut self, transition: TransitionDef) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn with_flags(mut self, flags: StateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Phase units per second.
    pub fn phase_rate(&self) -> f32 {
        self.speed / self.duration
    }

    pub fn has_transition(&self, name: &str) -> bool {
        self.transitions.iter().any(|t| t.name == name)
    }

    pub fn transitions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TransitionDef> {
        self.transitions.iter().filter(move |t| t.name == name)
    }
}

/// Read-only, name-keyed collection of states. Transition groups are flattened into each
/// state's transition list when the graph is built.
#[derive(Clone, Debug, Default)]
pub struct StateGraph {
    states: Vec<StateDef>,
    index: HashMap<String, usize>,
}

impl StateGraph {
    pub fn new(states: Vec<StateDef>) -> Result<Self, Error> {
        Self::with_groups(states, Vec::new())
    }

    pub fn with_groups(
        mut states: Vec<StateDef>,
        groups: Vec<TransitionGroupDef>,
    ) -> Result<Self, Error> {
        let groups: HashMap<&str, &TransitionGroupDef> =
            groups.iter().map(|g| (g.name.as_str(), g)).collect();

        let mut index = HashMap::with_capacity(states.len());
        for (i, state) in states.iter().enumerate() {
            if !(state.duration.is_finite() && state.duration > 0.0) {
                return Err(Error::InvalidValue {
                    message: format!(
                        "state '{}' has non-positive duration {}",
                        state.name, state.duration
                    ),
                });
            }
            if !state.speed.is_finite() {
                return Err(Error::InvalidValue {
                    message: format!("state '{}' has non-finite speed", state.name),
                });
            }
            if index.insert(state.name.clone(), i).is_some() {
                return Err(Error::DuplicateState {
                    name: state.name.clone(),
                });
            }
        }

        for state in &mut states {
            let mut flattened = Vec::new();
            for group in &state.transition_groups {
                let mut visiting = Vec::new();
                collect_group(&groups, group, &state.name, &mut visiting, &mut flattened)?;
            }
            state.transitions.extend(flattened);
        }

        for state in &states {
            for transition in &state.transitions {
                if !index.contains_key(&transition.dest_state) {
                    return Err(Error::UnknownTransitionDest {
                        state: state.name.clone(),
                        transition: transition.name.clone(),
                        dest: transition.dest_state.clone(),
                    });
                }
            }
        }

        Ok(Self { states, index })
    }

    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn state_at(&self, index: usize) -> Option<&StateDef> {
        self.states.get(index)
    }

    pub fn states(&self) -> &[StateDef] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn collect_group(
    groups: &HashMap<&str, &TransitionGroupDef>,
    name: &str,
    owner: &str,
    visiting: &mut Vec<String>,
    out: &mut Vec<TransitionDef>,
) -> Result<(), Error> {
    if visiting.iter().any(|v| v == name) {
        return Err(Error::TransitionGroupCycle {
            group: name.to_string(),
        });
    }
    let Some(group) = groups.get(name) else {
        return Err(Error::UnknownTransitionGroup {
            owner: owner.to_string(),
            group: name.to_string(),
        });
    };

    visiting.push(name.to_string());
    out.extend(group.transitions.iter().cloned());
    for sub in &group.groups {
        collect_group(groups, sub, name, visiting, out)?;
    }
    visiting.pop();
    Ok(())
}

/// Per (source, destination) state pair fade overrides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlendOverride {
    pub fade_time: Option<f32>,
    pub motion_fade_time: Option<f32>,
    pub curve: Option<BlendCurve>,
    /// Also applies when the transition taken is [`AUTO_TRANSITION`].
    pub allow_auto_transition: bool,
}

#[derive(Clone, Debug, Default)]
pub struct BlendOverrideTable {
    entries: HashMap<String, HashMap<String, BlendOverride>>,
}

impl BlendOverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, dst: impl Into<String>, entry: BlendOverride) {
        self.entries
            .entry(src.into())
            .or_default()
            .insert(dst.into(), entry);
    }

    pub fn lookup(&self, src: &str, dst: &str) -> Option<&BlendOverride> {
        self.entries.get(src)?.get(dst)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails on the first state name the graph does not know.
    pub fn validate(&self, graph: &StateGraph) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for (src, dsts) in &self.entries {
            for name in std::iter::once(src).chain(dsts.keys()) {
                if seen.insert(name.as_str()) && graph.state_index(name).is_none() {
                    return Err(Error::UnknownBlendOverrideState { name: name.clone() });
                }
            }
        }
        Ok(())
    }
}
