use std::time::Duration;

use thiserror::Error;

/// Failure classification shared by the registry, the runtime and the messaging facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// The actor could not be constructed or initialized
    #[error("actor {identity} failed to start: {reason}")]
    Construction { identity: String, reason: String },

    /// The actor failed while handling a message
    #[error("actor {identity} failed while processing: {reason}")]
    Processing { identity: String, reason: String },

    /// No live handle is registered under the identity
    #[error("actor {0} is not registered")]
    NotFound(String),

    /// Another registration already owns the identity
    #[error("actor {0} is already registered")]
    AlreadyExists(String),

    /// Rejected pool or supervisor settings
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No reply arrived before the deadline
    #[error("ask to {identity} timed out after {timeout:?}")]
    Timeout { identity: String, timeout: Duration },

    /// The actor handled the request without producing a reply
    #[error("actor {0} did not reply")]
    NoReply(String),

    /// `start` was called on a runtime that is already starting or running
    #[error("actor runtime {0} is already started")]
    AlreadyStarted(String),

    /// The runtime was never started
    #[error("actor runtime is not initialized")]
    NotInitialized,

    /// The runtime has already been torn down
    #[error("actor runtime has been shut down")]
    Terminated,

    /// The message could not be enqueued
    #[error("{0}")]
    Delivery(String),

    /// Configuration file errors
    #[error("{0}")]
    Configuration(String)
}

impl ActorError {
    pub fn construction(identity: impl ToString, reason: impl ToString) -> Self {
        ActorError::Construction { identity: identity.to_string(), reason: reason.to_string() }
    }

    pub fn processing(identity: impl ToString, reason: impl ToString) -> Self {
        ActorError::Processing { identity: identity.to_string(), reason: reason.to_string() }
    }

    /// Whether this failure is allowed to take the whole runtime down
    pub fn is_escalating(&self) -> bool {
        matches!(self, ActorError::Construction { .. })
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for ActorError {
    fn from(err: std::io::Error) -> Self {
        ActorError::Configuration(err.to_string())
    }
}

/// Convert from serde_yaml::Error
impl From<serde_yaml::Error> for ActorError {
    fn from(err: serde_yaml::Error) -> Self {
        ActorError::Configuration(err.to_string())
    }
}
