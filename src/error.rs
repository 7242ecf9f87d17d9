//! Command-scoped (fatal) errors.
//!
//! Two severities exist in the engine. Faults tied to a single element travel
//! through the stream as [`Value::Error`](crate::Value::Error) and never stop it.
//! Everything in this module is the other kind: a [`CommandError`] aborts the
//! whole command before (or, for unhashable join/set keys, while) elements flow.
//! The hosting [`Session`](crate::Session) survives and can run the next command.

use crate::value::ErrorValue;
use thiserror::Error;

/// Fatal error for one command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// A non-source op was placed at the head of a pipeline.
    #[error("{op} cannot be the first operator in a pipeline")]
    NotFirst { op: String },

    /// A parameter failed its type or range check, or flags conflict.
    #[error("{0}")]
    InvalidArgument(String),

    /// A join or set-algebra key could not be hashed.
    #[error("{0} is not hashable")]
    Unhashable(String),

    /// A name used by store/load is bound to something other than a reservoir.
    #[error("{0} is not a Reservoir")]
    NotAReservoir(String),

    /// A store/load name is not identifier-shaped.
    #[error("{0} is not an identifier")]
    NotAnIdentifier(String),

    /// A cluster reference did not resolve.
    #[error("{0} is not a Cluster")]
    UnknownCluster(String),

    /// A pipeline template has the wrong number of parameters.
    #[error("{0}")]
    Arity(String),

    /// No element was available where one was required.
    #[error("{0}")]
    Empty(String),

    /// The first element of a stream was an error (see [`Session::first`](crate::Session::first)).
    #[error("{0}")]
    Element(ErrorValue),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by collaborators (codecs, transports, persistence).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    /// Shorthand for [`CommandError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        CommandError::InvalidArgument(message.into())
    }
}

/// Result alias used by every Validate-phase operation.
pub type Result<T> = std::result::Result<T, CommandError>;
