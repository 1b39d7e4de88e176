//! Core types: identities, supervision policy, pool sizing and errors

pub mod constant;
pub mod error;
pub mod identity;
pub mod resizer;
pub mod supervisor;

pub use error::ActorError;
pub use identity::{ActorIdentity, MessageTag};
pub use resizer::{PoolConfig, Resizer, ResizerConfig};
pub use supervisor::{Directive, FailureKind, SupervisorConfig, SupervisorPolicy, SupervisorState};
