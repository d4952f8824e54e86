//! # Composer Errors
//!
//! This module defines the error type returned across the crate. Errors fall
//! into four families: configuration errors raised while composing roles,
//! dispatch errors raised while invoking methods, conversion errors between
//! RDF terms and values, and store errors wrapping the triple store cause.

use crate::{model::IriError, store::StoreError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// A concept was requested explicitly but never registered.
    #[error("concept `{0}` is not registered")]
    UnknownConcept(String),

    /// A method processor claimed a method and then declined to implement it.
    #[error("processor `{processor}` claimed `{method}` but did not apply to it")]
    ProcessorNotApplied { processor: String, method: String },

    /// A property declares a datatype no converter is registered for.
    #[error("no literal converter registered for datatype `{datatype}`")]
    MissingConverter { datatype: String },

    /// A behaviour requires a collaborator the injector cannot provide.
    #[error("behaviour `{behaviour}` requires collaborator `{collaborator}`")]
    MissingCollaborator {
        behaviour: String,
        collaborator: &'static str,
    },

    /// Only raised when the cycle policy is `reject`.
    #[error("ordering `{before}` before `{after}` closes a cycle")]
    OrderingCycle { before: String, after: String },

    #[error("method `{method}` has no implementation in `{class}`")]
    Unimplemented { class: String, method: String },

    #[error("no method `{method}` accepting {arity} argument(s) in `{class}`")]
    UnknownMethod {
        class: String,
        method: String,
        arity: usize,
    },

    #[error("state of behaviour `{behaviour}` is not a `{expected}`")]
    StateType {
        behaviour: String,
        expected: &'static str,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot convert `{value}` to {target}")]
    Conversion { value: String, target: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Iri(#[from] IriError),

    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    YAML(#[from] serde_yaml::Error),

    #[error(transparent)]
    TOML(#[from] toml::de::Error),
}

impl Error {
    /// Builds a conversion error from the offending value and target type.
    #[must_use]
    pub fn conversion(value: impl ToString, target: impl Into<String>) -> Self {
        Self::Conversion {
            value: value.to_string(),
            target: target.into(),
        }
    }

    /// Returns `true` for errors raised while composing roles.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownConcept(_)
                | Self::ProcessorNotApplied { .. }
                | Self::MissingConverter { .. }
                | Self::MissingCollaborator { .. }
                | Self::OrderingCycle { .. }
        )
    }
}
