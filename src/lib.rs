//! # Actor Host
//!
//! In-process actor lifecycle and supervision on top of `ractor`.
//!
//! This crate provides:
//! - A registry with at-most-one registration per actor identity
//! - Per-instance supervision (resume, restart, stop) with a rolling retry budget
//! - Elastic round-robin worker pools behind a single identity
//! - tell / ask / broadcast messaging through [`ActorEventService`]
//! - An explicit runtime object with start and drain-on-shutdown

pub mod actor;
pub mod config;
pub mod domain;
pub mod runtime;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::{ActorBehavior, ActorContext, ActorFactory, SystemHealth};
pub use config::RuntimeConfig;
pub use domain::{ActorError, ActorIdentity, Directive, PoolConfig, ResizerConfig, SupervisorPolicy};
pub use runtime::{ActorHandle, ActorRuntime, ActorSpec, RuntimeBuilder};
pub use service::ActorEventService;
