//! Structured event names for runtime monitoring and debugging

/// Guardian Actor Events
pub mod guardian {
    pub const GUARDIAN_STARTED: &str = "guardian.started";
    pub const GUARDIAN_STOPPED: &str = "guardian.stopped";
    pub const CHILD_STARTED: &str = "child.started";
    pub const CHILD_FAILED: &str = "child.failed";
    pub const CHILD_TERMINATED: &str = "child.terminated";
    pub const ESCALATION_RAISED: &str = "escalation.raised";
    pub const HEALTH_CHECK_COMPLETED: &str = "health.check_completed";
}

/// Supervised actor instance events
pub mod worker {
    pub const INSTANCE_STARTED: &str = "instance.started";
    pub const INSTANCE_STOPPED: &str = "instance.stopped";
    pub const CONSTRUCTION_FAILED: &str = "construction.failed";
    pub const MESSAGE_FAILED: &str = "message.failed";
    pub const FAILURE_RESUMED: &str = "failure.resumed";
    pub const INSTANCE_RESTARTED: &str = "instance.restarted";
    pub const INSTANCE_FAILED: &str = "instance.failed";
    pub const INSTANCE_ESCALATED: &str = "instance.escalated";
    pub const REPLY_DROPPED: &str = "reply.dropped";
    pub const DRAIN_REQUESTED: &str = "drain.requested";
    pub const CHILD_SPAWNED: &str = "child.spawned";
    pub const CHILD_EXITED: &str = "child.exited";
}

/// Pool router events
pub mod pool {
    pub const POOL_STARTED: &str = "pool.started";
    pub const WORKER_SPAWNED: &str = "worker.spawned";
    pub const WORKER_RETIRED: &str = "worker.retired";
    pub const WORKER_FAILED: &str = "worker.failed";
    pub const WORKER_REPLACED: &str = "worker.replaced";
    pub const ROUTE_FAILED: &str = "route.failed";
    pub const POOL_RESIZED: &str = "pool.resized";
    pub const POOL_DRAINED: &str = "pool.drained";
}

/// Registry events
pub mod registry {
    pub const ACTOR_REGISTERED: &str = "actor.registered";
    pub const ACTOR_ALREADY_REGISTERED: &str = "actor.already_registered";
    pub const REGISTRATION_FAILED: &str = "registration.failed";
    pub const REGISTRY_CLEARED: &str = "registry.cleared";
    pub const SUBSCRIPTION_ADDED: &str = "subscription.added";
}

/// Messaging facade events
pub mod messaging {
    pub const TELL_SENT: &str = "tell.sent";
    pub const TELL_FAILED: &str = "tell.failed";
    pub const ASK_SENT: &str = "ask.sent";
    pub const ASK_FAILED: &str = "ask.failed";
    pub const BROADCAST_PUBLISHED: &str = "broadcast.published";
    pub const BROADCAST_FAILED: &str = "broadcast.failed";
}

/// Runtime lifecycle events
pub mod runtime {
    pub const RUNTIME_STARTED: &str = "runtime.started";
    pub const RUNTIME_ESCALATED: &str = "runtime.escalated";
    pub const SHUTDOWN_STARTED: &str = "runtime.shutdown_started";
    pub const SHUTDOWN_FORCED: &str = "runtime.shutdown_forced";
    pub const SHUTDOWN_COMPLETED: &str = "runtime.shutdown_completed";
}
