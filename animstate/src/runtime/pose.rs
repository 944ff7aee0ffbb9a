use crate::{OverlaySnapshot, PoseTreeDef, StateDef};

/// Per-instance compiled pose subtree. Owned by exactly one instance.
#[derive(Clone, Debug, PartialEq)]
pub enum PoseNode {
    Clip {
        anim: String,
    },
    Blend {
        left: Box<PoseNode>,
        right: Box<PoseNode>,
        factor: f32,
    },
}

pub trait PoseTreeCompiler {
    /// Builds the subtree for a new instance of `state`. `overlay` is the snapshot that
    /// applies to the instance's track, if overlays are cached per track.
    fn compile(&mut self, state: &StateDef, overlay: &mut OverlaySnapshot) -> PoseNode;
}

/// Resolves every clip through the overlay, advancing variant counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayPoseCompiler;

impl PoseTreeCompiler for OverlayPoseCompiler {
    fn compile(&mut self, state: &StateDef, overlay: &mut OverlaySnapshot) -> PoseNode {
        compile_def(&state.pose, overlay)
    }
}

fn compile_def(def: &PoseTreeDef, overlay: &mut OverlaySnapshot) -> PoseNode {
    match def {
        PoseTreeDef::Clip { anim } => PoseNode::Clip {
            anim: overlay.lookup_and_increment(anim),
        },
        PoseTreeDef::Blend {
            left,
            right,
            factor,
        } => PoseNode::Blend {
            left: Box::new(compile_def(left, overlay)),
            right: Box::new(compile_def(right, overlay)),
            factor: factor.clamp(0.0, 1.0),
        },
    }
}
