//! Layered animation state machine.
//!
//! A layer owns a fixed pool of state instances grouped into a stack of tracks, a bounded
//! queue of transition requests, and the per-frame stepper that resolves requests, advances
//! fades and phases, and garbage collects instances that no longer contribute. The blend
//! program for a frame is produced by [`AnimStateLayer::create_anim_cmds`].
//!
//! The crate is evaluator-agnostic: it emits [`AnimCmd`]s and never touches pose data.

#![forbid(unsafe_code)]

mod curve;
mod error;
mod ids;
mod model;
mod overlay;
mod runtime;

#[cfg(feature = "json")]
mod json;

pub use curve::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use overlay::*;
pub use runtime::*;

#[cfg(test)]
mod curve_tests;
