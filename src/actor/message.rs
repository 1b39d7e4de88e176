//! Typed messages for actor communication

use ractor::RpcReplyPort;

/// Mailbox item of a supervised instance or a pool router
#[derive(Debug)]
pub enum Envelope<M, R> {
    /// Fire-and-forget delivery
    Tell(M),
    /// Request expecting a reply on the port
    Ask(M, RpcReplyPort<R>),
    /// Live instance count (1 for a single actor)
    InstanceCount(RpcReplyPort<usize>),
    /// Stop once everything queued ahead has been processed
    Drain
}

/// Messages for the Guardian actor (root of the supervision tree)
#[derive(Debug)]
pub enum GuardianMessage {
    /// System health check
    HealthCheck { reply: RpcReplyPort<SystemHealth> }
}

/// System health information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemHealth {
    pub supervised_actors: usize,
    pub failed_actors:     u64,
    pub escalated:         bool,
    pub uptime_seconds:    u64
}
