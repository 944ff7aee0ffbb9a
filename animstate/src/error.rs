use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown state: {name}")]
    UnknownState { name: String },

    #[error("duplicate state: {name}")]
    DuplicateState { name: String },

    #[error("unknown destination state '{dest}' for transition '{transition}' of state '{state}'")]
    UnknownTransitionDest {
        state: String,
        transition: String,
        dest: String,
    },

    #[error("unknown transition group '{group}' referenced by '{owner}'")]
    UnknownTransitionGroup { owner: String, group: String },

    #[error("transition group cycle through '{group}'")]
    TransitionGroupCycle { group: String },

    #[error("unknown state '{name}' referenced by blend override table")]
    UnknownBlendOverrideState { name: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse animation state JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("invalid curve '{value}' for {context}")]
    JsonInvalidCurve { context: String, value: String },

    #[cfg(feature = "json")]
    #[error("invalid {field} '{value}' for {context}")]
    JsonInvalidEnum {
        context: String,
        field: String,
        value: String,
    },
}
