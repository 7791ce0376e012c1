//! Error Types
//!
//! Every fallible operation in the engine returns [`Result`]. Errors fall
//! into three families:
//!
//! - Structural errors (invalid names, rejected connections, cycles) are
//!   raised synchronously by the offending edit, which leaves the graph
//!   unchanged.
//! - Compute errors wrap a failure raised inside a node's `hash()` or
//!   `compute()` together with the path of the plug being evaluated. They
//!   are never cached.
//! - Cancellation is reported separately so that callers can drop it
//!   silently instead of presenting it to a user.
//!
//! Errors are `Clone` because a single failed computation is delivered to
//! every thread that was waiting on it.

use std::sync::Arc;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by the engine.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A component name was empty or did not match `[A-Za-z_][A-Za-z_0-9]*`.
    #[error("invalid name \"{0}\"")]
    InvalidName(String),

    /// An argument did not satisfy the operation's preconditions.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A component id or path did not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// A connection was refused for type, direction or flag reasons.
    #[error("plug \"{destination}\" rejects input \"{source_plug}\": {reason}")]
    IncompatiblePlugs {
        destination: String,
        source_plug: String,
        reason: String,
    },

    /// The destination of an edit is flagged read-only.
    #[error("plug \"{0}\" is read-only")]
    ReadOnly(String),

    /// Connecting would make a plug depend on itself.
    #[error("connecting \"{destination}\" to \"{source_plug}\" would create a cycle")]
    CyclicConnection {
        destination: String,
        source_plug: String,
    },

    /// `set_value` was called on a plug that cannot hold a static value.
    #[error("plug \"{0}\" is not settable")]
    NotSettable(String),

    /// A value did not match the type expected by a plug.
    #[error("type mismatch for \"{target}\": expected {expected}, got {actual}")]
    TypeMismatch {
        target: String,
        expected: String,
        actual: String,
    },

    /// A context variable was missing or had an unexpected type.
    #[error("context variable \"{name}\": {reason}")]
    ContextVariable { name: String, reason: String },

    /// A node type name is not present in the registry.
    #[error("unknown node type \"{0}\"")]
    UnknownNodeType(String),

    /// A failure raised while hashing or computing a plug.
    #[error("{plug}: {source}")]
    Compute {
        plug: String,
        #[source]
        source: Arc<Error>,
    },

    /// Error raised by a node implementation.
    #[error("{0}")]
    Node(String),

    /// The computation was cancelled through the context's canceller.
    #[error("computation cancelled")]
    Cancelled,

    /// A serialised script could not be parsed or executed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// JSON literal or configuration error.
    #[error("json: {0}")]
    Json(String),
}

impl Error {
    /// Shorthand for errors raised from node implementations.
    pub fn node(message: impl Into<String>) -> Self {
        Self::Node(message.into())
    }

    /// True for errors rejected synchronously by graph edits.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_)
                | Self::InvalidArgument(_)
                | Self::IncompatiblePlugs { .. }
                | Self::ReadOnly(_)
                | Self::CyclicConnection { .. }
                | Self::NotSettable(_)
        )
    }

    /// True if this error is, or wraps, a cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Compute { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// The path of the plug where a compute failure originated.
    pub fn plug(&self) -> Option<&str> {
        match self {
            Self::Compute { plug, .. } => Some(plug),
            _ => None,
        }
    }

    /// Wrap `self` as a compute failure of `plug`.
    ///
    /// Failures that already carry an originating plug, and cancellations,
    /// pass through unchanged so the innermost plug path is preserved.
    pub(crate) fn in_plug(self, plug: impl FnOnce() -> String) -> Self {
        match self {
            Self::Compute { .. } | Self::Cancelled => self,
            other => Self::Compute {
                plug: plug(),
                source: Arc::new(other),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
