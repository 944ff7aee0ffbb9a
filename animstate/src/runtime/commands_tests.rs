use super::test_support::{
    assert_approx, attach_recording, layer_with, locomotion_layer, locomotion_states,
};
use super::{
    AnimCmd, AnimCmdList, AnimStateLayer, CmdContext, LayerBlendMode, LayerHooks, LayerParams,
    StateInstance,
};
use crate::{FadeToStateParams, NewInstanceBehavior, PoseTreeDef, StateDef, StateGraph};
use std::sync::Arc;

const STANDALONE: CmdContext = CmdContext {
    instance_zero_valid: false,
};
const ON_TOP: CmdContext = CmdContext {
    instance_zero_valid: true,
};

fn clip(anim: &str, phase: f32, out: u32) -> AnimCmd {
    AnimCmd::EvaluateClip {
        anim: anim.to_string(),
        phase,
        out,
    }
}

fn idle_only(params: LayerParams) -> AnimStateLayer {
    let graph = Arc::new(StateGraph::new(locomotion_states()).unwrap());
    let mut layer = AnimStateLayer::new(graph, params).unwrap();
    layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);
    layer
}

/// idle fully in, walk half way in after 0.25s.
fn walk_over_idle(behavior: NewInstanceBehavior) -> AnimStateLayer {
    let mut layer = locomotion_layer(behavior);
    layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);
    layer.fade_to_state("walk", FadeToStateParams::with_fade(0.5));
    layer.begin_step(0.0);
    layer.begin_step(0.25);
    layer
}

#[test]
fn empty_layer_emits_nothing() {
    let layer = locomotion_layer(NewInstanceBehavior::UsePreviousTrack);
    assert!(layer.create_anim_cmds(&STANDALONE).is_empty());
    assert!(layer.create_anim_cmds(&ON_TOP).is_empty());
}

#[test]
fn single_instance_evaluates_into_slot_zero() {
    let layer = idle_only(LayerParams::default());
    let cmds = layer.create_anim_cmds(&STANDALONE);
    assert_eq!(cmds.as_slice(), [clip("idle", 0.0, 0)]);
    assert_eq!(cmds.max_slot(), Some(0));
}

#[test]
fn two_tracks_blend_the_older_under_the_newer() {
    let layer = walk_over_idle(NewInstanceBehavior::SpawnNewTrack);
    assert_eq!(layer.num_used_tracks(), 2);

    let cmds = layer.create_anim_cmds(&STANDALONE);
    assert_eq!(
        cmds.as_slice(),
        [
            clip("walk", 0.25, 0),
            clip("idle", 0.25, 1),
            AnimCmd::Blend {
                left: 1,
                right: 0,
                out: 0,
                factor: 0.5,
            },
        ]
    );
}

#[test]
fn instances_on_one_track_fold_the_same_way() {
    let same_track = walk_over_idle(NewInstanceBehavior::UsePreviousTrack);
    let new_track = walk_over_idle(NewInstanceBehavior::SpawnNewTrack);
    assert_eq!(same_track.num_used_tracks(), 1);
    assert_eq!(
        same_track.create_anim_cmds(&STANDALONE),
        new_track.create_anim_cmds(&STANDALONE)
    );
}

#[test]
fn three_instances_reproduce_the_oldest_first_weights() {
    let mut layer = layer_with(locomotion_states(), 1, 3, NewInstanceBehavior::UsePreviousTrack);
    layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);
    layer.fade_to_state("walk", FadeToStateParams::with_fade(1.0));
    layer.begin_step(0.0);
    layer.begin_step(0.5);
    layer.fade_to_state("run", FadeToStateParams::with_fade(1.0));
    layer.begin_step(0.0);
    layer.begin_step(0.25);
    assert_eq!(layer.num_total_instances(), 3);

    // run 0.25, walk 0.75 * 0.75, idle the rest.
    let cmds = layer.create_anim_cmds(&STANDALONE);
    let factors: Vec<f32> = cmds
        .iter()
        .filter_map(|cmd| match cmd {
            AnimCmd::Blend { factor, .. } => Some(*factor),
            _ => None,
        })
        .collect();
    assert_eq!(factors.len(), 2);
    assert_approx(factors[0], 0.25 / 0.8125);
    assert_approx(factors[1], 0.8125);
    assert_eq!(cmds.max_slot(), Some(1));
}

#[test]
fn layer_on_top_blends_into_slot_zero() {
    let layer = idle_only(LayerParams::default());
    let cmds = layer.create_anim_cmds(&ON_TOP);
    assert_eq!(
        cmds.as_slice(),
        [
            clip("idle", 0.0, 1),
            AnimCmd::Blend {
                left: 0,
                right: 1,
                out: 0,
                factor: 1.0,
            },
        ]
    );
}

#[test]
fn feather_index_selects_a_feather_blend() {
    let layer = idle_only(LayerParams {
        feather_blend_index: Some(3),
        initial_fade: 0.5,
        ..LayerParams::default()
    });
    let cmds = layer.create_anim_cmds(&ON_TOP);
    assert_eq!(
        cmds.as_slice().last(),
        Some(&AnimCmd::FeatherBlend {
            left: 0,
            right: 1,
            out: 0,
            factor: 0.5,
            feather_index: 3,
        })
    );
}

#[test]
fn additive_layers_emit_an_additive_blend() {
    let layer = idle_only(LayerParams {
        blend_mode: LayerBlendMode::Additive,
        feather_blend_index: Some(3),
        ..LayerParams::default()
    });
    let cmds = layer.create_anim_cmds(&ON_TOP);
    assert_eq!(
        cmds.as_slice().last(),
        Some(&AnimCmd::AdditiveBlend {
            left: 0,
            right: 1,
            out: 0,
            factor: 1.0,
        })
    );
}

#[test]
fn pose_tree_expands_through_the_overlay() {
    let mut aim = StateDef::new("aim", 1.0);
    aim.pose = PoseTreeDef::Blend {
        left: Box::new(PoseTreeDef::clip("aim-low")),
        right: Box::new(PoseTreeDef::clip("aim-high")),
        factor: 0.3,
    };
    let mut layer = layer_with(vec![aim], 2, 2, NewInstanceBehavior::UsePreviousTrack);
    layer.overlay_mut().set_remap("aim-high", "aim-up");
    layer.fade_to_state("aim", FadeToStateParams::default());
    layer.begin_step(0.0);

    let cmds = layer.create_anim_cmds(&STANDALONE);
    assert_eq!(
        cmds.as_slice(),
        [
            clip("aim-low", 0.0, 0),
            clip("aim-up", 0.0, 1),
            AnimCmd::Blend {
                left: 0,
                right: 1,
                out: 0,
                factor: 0.3,
            },
        ]
    );
}

#[test]
fn building_commands_leaves_the_layer_untouched() {
    let layer = walk_over_idle(NewInstanceBehavior::SpawnNewTrack);
    let before = format!("{layer:?}");
    let first = layer.create_anim_cmds(&ON_TOP);
    let second = layer.create_anim_cmds(&ON_TOP);
    assert_eq!(first, second);
    assert_eq!(format!("{layer:?}"), before);
}

#[test]
fn blend_hooks_wrap_the_layer_blend() {
    let mut layer = locomotion_layer(NewInstanceBehavior::UsePreviousTrack);
    let recording = attach_recording(&mut layer);
    layer.fade_to_state("idle", FadeToStateParams::default());
    layer.begin_step(0.0);
    recording.take();

    layer.create_anim_cmds(&STANDALONE);
    assert!(recording.take().is_empty());

    layer.create_anim_cmds(&ON_TOP);
    assert_eq!(recording.take(), ["pre test 1", "post test 2"]);
}

struct MirrorHooks;

impl LayerHooks for MirrorHooks {
    fn state_blend(&self, instance: &StateInstance, cmds: &mut AnimCmdList, slot: u32) -> bool {
        if instance.state_name() != "walk" {
            return false;
        }
        cmds.push(AnimCmd::EvaluateClip {
            anim: "walk-mirrored".to_string(),
            phase: instance.phase(),
            out: slot,
        });
        true
    }
}

#[test]
fn state_blend_hook_can_replace_an_instance() {
    let mut layer = walk_over_idle(NewInstanceBehavior::SpawnNewTrack);
    layer.set_hooks(MirrorHooks);

    let cmds = layer.create_anim_cmds(&STANDALONE);
    assert_eq!(cmds.as_slice()[0], clip("walk-mirrored", 0.25, 0));
    assert_eq!(cmds.as_slice()[1], clip("idle", 0.25, 1));
}
