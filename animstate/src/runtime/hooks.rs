use super::{AnimCmdList, SetStateParams, StateInstance};
use crate::{RequestId, StateDef};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PendingChangeKind {
    FadeToState,
    Transition,
}

/// Callbacks a layer owner can install. Every method defaults to a no-op.
pub trait LayerHooks {
    /// Runs before a new instance is created and may adjust its parameters.
    fn prepare(&mut self, _state: &StateDef, _params: &mut SetStateParams) {}

    fn on_create(&mut self, _instance: &StateInstance) {}

    fn on_destroy(&mut self, _instance: &StateInstance) {}

    fn on_pending_change(&mut self, _id: RequestId, _name: &str, _kind: PendingChangeKind) {}

    fn pre_blend(&self, _layer: &str, _cmds: &mut AnimCmdList, _fade: f32) {}

    fn post_blend(&self, _layer: &str, _cmds: &mut AnimCmdList, _fade: f32) {}

    /// Emits the commands for one instance into `slot`. Returning `false` falls back to the
    /// instance's compiled pose tree.
    fn state_blend(&self, _instance: &StateInstance, _cmds: &mut AnimCmdList, _slot: u32) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl LayerHooks for NoHooks {}
