//! Actor factory
//!
//! Binds the external construction capability (a constructor closure, usually
//! backed by the host's dependency container) to a supervisor policy, and spawns
//! supervised instances from it.

use std::sync::Arc;

use ractor::{Actor, ActorCell, ActorProcessingErr, ActorRef};
use tokio::task::JoinHandle;

use crate::{
    actor::{
        behavior::{ActorBehavior, ActorContext},
        message::Envelope,
        worker::{SupervisedActor, WorkerArgs}
    },
    domain::{error::ActorError, supervisor::SupervisorPolicy}
};

type Constructor<A> = dyn Fn() -> Result<A, ActorProcessingErr> + Send + Sync;

/// Mailbox reference of a spawned instance
pub type InstanceRef<A> = ActorRef<Envelope<<A as ActorBehavior>::Msg, <A as ActorBehavior>::Reply>>;

/// Constructor plus failure-handling policy for one actor type
pub struct ActorFactory<A: ActorBehavior> {
    constructor: Arc<Constructor<A>>,
    policy:      SupervisorPolicy
}

impl<A: ActorBehavior> Clone for ActorFactory<A> {
    fn clone(&self) -> Self {
        Self { constructor: self.constructor.clone(), policy: self.policy }
    }
}

impl<A: ActorBehavior> ActorFactory<A> {
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn() -> Result<A, ActorProcessingErr> + Send + Sync + 'static
    {
        Self { constructor: Arc::new(constructor), policy: SupervisorPolicy::default() }
    }

    pub fn with_policy(mut self, policy: SupervisorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SupervisorPolicy {
        &self.policy
    }

    /// Construct a bare behavior without spawning it
    pub fn build(&self) -> Result<A, ActorProcessingErr> {
        (self.constructor)()
    }

    /// Spawn one supervised instance linked under `supervisor`
    pub async fn spawn(
        &self,
        instance: String,
        context: &ActorContext,
        load: Option<Arc<std::sync::atomic::AtomicUsize>>,
        supervisor: ActorCell
    ) -> Result<(InstanceRef<A>, JoinHandle<()>), ActorError> {
        let args = WorkerArgs { context: context.for_instance(&instance), load };

        Actor::spawn_linked(Some(instance), SupervisedActor::new(self.clone()), args, supervisor)
            .await
            .map_err(|e| ActorError::construction(context.identity(), e))
    }
}

impl<A: ActorBehavior + Default> ActorFactory<A> {
    /// Factory for behaviors that need no injected dependencies
    pub fn from_default() -> Self {
        Self::new(|| Ok(A::default()))
    }
}
