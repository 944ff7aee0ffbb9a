use super::{
    AnimCmdList, AnimStateLayer, LayerHooks, LayerParams, PendingChangeKind, StateInstance,
};
use crate::{
    ConditionSource, NewInstanceBehavior, RequestId, StateDef, StateGraph, TransitionCondition,
    TransitionDef,
};
use std::sync::{Arc, Mutex};

pub(crate) fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

pub(crate) fn phase_at_least(lower: f32) -> TransitionCondition {
    TransitionCondition {
        source: ConditionSource::Phase,
        lower: Some(lower),
        upper: None,
        require_switch: false,
    }
}

/// `idle` (1s), `walk` (1s), `run` (0.5s), `hit` (0.5s, auto back to idle once complete).
/// `idle-to-run` is only active once idle has completed.
pub(crate) fn locomotion_states() -> Vec<StateDef> {
    vec![
        StateDef::new("idle", 1.0)
            .with_transition(
                TransitionDef::new("idle-to-run", "run")
                    .with_fade(0.2)
                    .with_condition(phase_at_least(1.0)),
            )
            .with_transition(TransitionDef::new("go-walk", "walk").with_fade(0.2))
            .with_transition(TransitionDef::new("hit", "hit")),
        StateDef::new("walk", 1.0).with_transition(TransitionDef::new("go-idle", "idle").with_fade(0.2)),
        StateDef::new("run", 0.5),
        StateDef::new("hit", 0.5)
            .with_transition(TransitionDef::new("auto", "idle").with_condition(phase_at_least(1.0))),
    ]
}

pub(crate) fn layer_with(
    states: Vec<StateDef>,
    max_tracks: usize,
    max_instances: usize,
    default_behavior: NewInstanceBehavior,
) -> AnimStateLayer {
    let graph = Arc::new(StateGraph::new(states).unwrap());
    let params = LayerParams {
        name: "test".to_string(),
        max_tracks,
        max_instances,
        default_behavior,
        ..LayerParams::default()
    };
    AnimStateLayer::new(graph, params).unwrap()
}

pub(crate) fn locomotion_layer(default_behavior: NewInstanceBehavior) -> AnimStateLayer {
    layer_with(locomotion_states(), 2, 2, default_behavior)
}

/// Names of the states on each track, newest track and newest instance first.
pub(crate) fn stack_layout(layer: &AnimStateLayer) -> Vec<Vec<String>> {
    (0..layer.num_used_tracks())
        .filter_map(|i| layer.track(i))
        .map(|track| {
            track
                .instance_slots()
                .iter()
                .map(|&slot| layer.instances[slot].state_name().to_string())
                .collect()
        })
        .collect()
}

pub(crate) fn used_bits(layer: &AnimStateLayer) -> (usize, usize) {
    (
        layer.instance_used.iter().filter(|u| **u).count(),
        layer.track_used.iter().filter(|u| **u).count(),
    )
}

pub(crate) fn assert_pools_consistent(layer: &AnimStateLayer) {
    let (instances, tracks) = used_bits(layer);
    assert_eq!(instances, layer.num_total_instances());
    assert_eq!(tracks, layer.num_used_tracks());
}

#[derive(Clone, Default)]
pub(crate) struct Recording {
    pub(crate) events: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

pub(crate) struct RecordingHooks {
    pub(crate) recording: Recording,
}

impl LayerHooks for RecordingHooks {
    fn on_create(&mut self, instance: &StateInstance) {
        self.recording.push(format!("create {}", instance.state_name()));
    }

    fn on_destroy(&mut self, instance: &StateInstance) {
        self.recording.push(format!("destroy {}", instance.state_name()));
    }

    fn on_pending_change(&mut self, id: RequestId, name: &str, kind: PendingChangeKind) {
        let id = if id == RequestId::QUEUE_FULL {
            "full".to_string()
        } else {
            id.0.to_string()
        };
        self.recording.push(format!("pending {kind:?} {name} {id}"));
    }

    fn pre_blend(&self, layer: &str, cmds: &mut AnimCmdList, _fade: f32) {
        self.recording.push(format!("pre {layer} {}", cmds.len()));
    }

    fn post_blend(&self, layer: &str, cmds: &mut AnimCmdList, _fade: f32) {
        self.recording.push(format!("post {layer} {}", cmds.len()));
    }
}

pub(crate) fn attach_recording(layer: &mut AnimStateLayer) -> Recording {
    let recording = Recording::default();
    layer.set_hooks(RecordingHooks {
        recording: recording.clone(),
    });
    recording
}

pub(crate) fn recording_layer(default_behavior: NewInstanceBehavior) -> (AnimStateLayer, Recording) {
    let mut layer = locomotion_layer(default_behavior);
    let recording = attach_recording(&mut layer);
    (layer, recording)
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
