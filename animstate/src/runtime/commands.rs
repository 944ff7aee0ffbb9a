use super::{AnimStateLayer, PoseNode, StateInstance};
use crate::curve::clamp01;

/// How the layer's result is combined with what is already in slot zero.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, Hash)]
pub enum LayerBlendMode {
    #[default]
    Interpolate,
    Additive,
}

/// One primitive for the pose evaluator. Slots are scratch pose buffers; blends write
/// `left * (1 - factor) + right * factor` into `out`.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimCmd {
    EvaluateClip {
        anim: String,
        phase: f32,
        out: u32,
    },
    Blend {
        left: u32,
        right: u32,
        out: u32,
        factor: f32,
    },
    FeatherBlend {
        left: u32,
        right: u32,
        out: u32,
        factor: f32,
        feather_index: u32,
    },
    AdditiveBlend {
        left: u32,
        right: u32,
        out: u32,
        factor: f32,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimCmdList {
    cmds: Vec<AnimCmd>,
}

impl AnimCmdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: AnimCmd) {
        self.cmds.push(cmd);
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn as_slice(&self) -> &[AnimCmd] {
        &self.cmds
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnimCmd> {
        self.cmds.iter()
    }

    /// Highest slot index written by any command.
    pub fn max_slot(&self) -> Option<u32> {
        self.cmds
            .iter()
            .map(|cmd| match cmd {
                AnimCmd::EvaluateClip { out, .. } => *out,
                AnimCmd::Blend { left, right, out, .. }
                | AnimCmd::FeatherBlend { left, right, out, .. }
                | AnimCmd::AdditiveBlend { left, right, out, .. } => *left.max(right).max(out),
            })
            .max()
    }
}

impl<'a> IntoIterator for &'a AnimCmdList {
    type Item = &'a AnimCmd;
    type IntoIter = std::slice::Iter<'a, AnimCmd>;

    fn into_iter(self) -> Self::IntoIter {
        self.cmds.iter()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CmdContext {
    /// Slot zero already holds the pose of the layers below; the layer result is blended
    /// onto it.
    pub instance_zero_valid: bool,
}

/// Folds a newest-first list of weighted items into `base`.
///
/// Item `k` gets weight `remaining * fade_k` and `remaining` shrinks by `1 - fade_k`; the
/// oldest item takes whatever is left. Each older item is evaluated into `base + 1` and
/// blended under the accumulator with factor `acc / (acc + weight)`, which reproduces the
/// oldest-first interpolation chain.
fn emit_fold(
    cmds: &mut AnimCmdList,
    base: u32,
    fades: &[f32],
    mut emit: impl FnMut(&mut AnimCmdList, usize, u32),
) {
    let mut remaining = 1.0f32;
    let mut accumulated = 0.0f32;
    for (k, &fade) in fades.iter().enumerate() {
        let fade = if k + 1 == fades.len() { 1.0 } else { clamp01(fade) };
        let weight = remaining * fade;
        if k == 0 {
            emit(cmds, k, base);
            accumulated = weight;
        } else {
            emit(cmds, k, base + 1);
            let total = accumulated + weight;
            let factor = if total > 0.0 { accumulated / total } else { 0.0 };
            cmds.push(AnimCmd::Blend {
                left: base + 1,
                right: base,
                out: base,
                factor,
            });
            accumulated = total;
        }
        remaining *= 1.0 - fade;
    }
}

fn emit_pose(cmds: &mut AnimCmdList, node: &PoseNode, phase: f32, slot: u32) {
    match node {
        PoseNode::Clip { anim } => cmds.push(AnimCmd::EvaluateClip {
            anim: anim.clone(),
            phase,
            out: slot,
        }),
        PoseNode::Blend {
            left,
            right,
            factor,
        } => {
            emit_pose(cmds, left, phase, slot);
            emit_pose(cmds, right, phase, slot + 1);
            cmds.push(AnimCmd::Blend {
                left: slot,
                right: slot + 1,
                out: slot,
                factor: *factor,
            });
        }
    }
}

impl AnimStateLayer {
    /// Builds the blend program for the current track stack. Does not modify the layer.
    #[tracing::instrument(level = "trace", skip(self), fields(layer = %self.params.name))]
    pub fn create_anim_cmds(&self, context: &CmdContext) -> AnimCmdList {
        let mut cmds = AnimCmdList::new();
        if self.track_stack.is_empty() {
            return cmds;
        }

        let base = u32::from(context.instance_zero_valid);
        let track_fades: Vec<f32> = self
            .track_stack
            .iter()
            .map(|&t| self.tracks[t].anim_fade(&self.instances))
            .collect();

        emit_fold(&mut cmds, base, &track_fades, |cmds, k, slot| {
            let track = &self.tracks[self.track_stack[k]];
            let instance_fades: Vec<f32> = track
                .instances
                .iter()
                .map(|&i| self.instances[i].anim_fade)
                .collect();
            emit_fold(cmds, slot, &instance_fades, |cmds, j, slot| {
                self.emit_instance(cmds, &self.instances[track.instances[j]], slot);
            });
        });

        if context.instance_zero_valid {
            let fade = self.fade.current;
            self.hooks.pre_blend(&self.params.name, &mut cmds, fade);
            let cmd = match (self.params.blend_mode, self.params.feather_blend_index) {
                (super::LayerBlendMode::Additive, _) => AnimCmd::AdditiveBlend {
                    left: 0,
                    right: base,
                    out: 0,
                    factor: fade,
                },
                (_, Some(feather_index)) => AnimCmd::FeatherBlend {
                    left: 0,
                    right: base,
                    out: 0,
                    factor: fade,
                    feather_index,
                },
                (_, None) => AnimCmd::Blend {
                    left: 0,
                    right: base,
                    out: 0,
                    factor: fade,
                },
            };
            cmds.push(cmd);
            self.hooks.post_blend(&self.params.name, &mut cmds, fade);
        }

        tracing::trace!(cmds = cmds.len(), "emitted anim cmds");
        cmds
    }

    fn emit_instance(&self, cmds: &mut AnimCmdList, instance: &StateInstance, slot: u32) {
        if self.hooks.state_blend(instance, cmds, slot) {
            return;
        }
        match &instance.pose {
            Some(pose) => emit_pose(cmds, pose, instance.phase, slot),
            None => cmds.push(AnimCmd::EvaluateClip {
                anim: instance.state_name.clone(),
                phase: instance.phase,
                out: slot,
            }),
        }
    }
}
