mod blender;
mod commands;
mod effects;
mod hooks;
mod info;
mod instance;
mod layer;
mod pose;
mod queue;
mod request;
mod resolver;
mod stepper;
mod track;

pub use blender::*;
pub use commands::*;
pub use effects::*;
pub use hooks::*;
pub use info::*;
pub use instance::*;
pub use layer::*;
pub use pose::*;
pub use request::*;
pub use track::*;

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod track_tests;


#[cfg(test)]
mod queue_tests;



#[cfg(test)]
mod commands_tests;
