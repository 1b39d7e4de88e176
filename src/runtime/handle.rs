//! Typed handles to registered actors

use std::{any::Any, time::Duration};

use ractor::rpc::{CallResult, call};

use crate::{
    actor::{ActorBehavior, Envelope, InstanceRef},
    domain::{error::ActorError, identity::ActorIdentity}
};

const INSTANCE_COUNT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery reference for a single actor or a pool front
pub struct ActorHandle<A: ActorBehavior> {
    identity: ActorIdentity,
    actor:    InstanceRef<A>,
    pooled:   bool
}

impl<A: ActorBehavior> Clone for ActorHandle<A> {
    fn clone(&self) -> Self {
        Self { identity: self.identity.clone(), actor: self.actor.clone(), pooled: self.pooled }
    }
}

impl<A: ActorBehavior> ActorHandle<A> {
    pub(crate) fn new(identity: ActorIdentity, actor: InstanceRef<A>, pooled: bool) -> Self {
        Self { identity, actor, pooled }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    /// Whether the handle fronts a worker pool
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// Enqueue without waiting for processing
    pub fn tell(&self, message: A::Msg) -> Result<(), ActorError> {
        self.actor
            .cast(Envelope::Tell(message))
            .map_err(|e| ActorError::Delivery(format!("failed to deliver to {}: {}", self.identity, e)))
    }

    /// Enqueue and wait up to `timeout` for the reply
    pub async fn ask(&self, message: A::Msg, timeout: Duration) -> Result<A::Reply, ActorError> {
        match call(&self.actor, |reply| Envelope::<A::Msg, A::Reply>::Ask(message, reply), Some(timeout)).await {
            Ok(CallResult::Success(response)) => Ok(response),
            Ok(CallResult::Timeout) => Err(ActorError::Timeout { identity: self.identity.to_string(), timeout }),
            Ok(_) => Err(ActorError::NoReply(self.identity.to_string())),
            Err(e) => Err(ActorError::Delivery(format!("failed to deliver to {}: {}", self.identity, e)))
        }
    }

    /// Number of live instances behind the handle
    pub async fn instance_count(&self) -> Result<usize, ActorError> {
        match call(&self.actor, Envelope::<A::Msg, A::Reply>::InstanceCount, Some(INSTANCE_COUNT_TIMEOUT)).await {
            Ok(CallResult::Success(count)) => Ok(count),
            Ok(CallResult::Timeout) => {
                Err(ActorError::Timeout { identity: self.identity.to_string(), timeout: INSTANCE_COUNT_TIMEOUT })
            }
            Ok(_) => Err(ActorError::NoReply(self.identity.to_string())),
            Err(e) => Err(ActorError::Delivery(format!("failed to query {}: {}", self.identity, e)))
        }
    }
}

/// Type-erased view the registry keeps for lookup and shutdown
pub(crate) trait ErasedHandle: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Queue a drain behind pending work; false when the mailbox is gone
    fn drain(&self) -> bool;

    fn kill(&self);
}

impl<A: ActorBehavior> ErasedHandle for ActorHandle<A> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn drain(&self) -> bool {
        self.actor.cast(Envelope::Drain).is_ok()
    }

    fn kill(&self) {
        self.actor.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::resizer::PoolConfig,
        runtime::{ActorRuntime, ActorSpec},
        testing::{Counter, CounterMsg, Vitals, test_config}
    };

    fn counter_spec(vitals: &Vitals) -> ActorSpec<Counter> {
        let vitals = vitals.clone();
        ActorSpec::new(move || Ok(Counter::new(vitals.clone())))
    }

    #[tokio::test]
    async fn test_abandoned_instance_count_leaves_actor_serving() {
        let runtime = ActorRuntime::init(test_config()).await.unwrap();
        let vitals = Vitals::default();
        runtime.register(counter_spec(&vitals)).await.unwrap();
        let handle = runtime.lookup::<Counter>(&ActorIdentity::of::<Counter>()).unwrap();

        handle.tell(CounterMsg::Slow(Duration::from_millis(100))).unwrap();
        let abandoned =
            call(&handle.actor, Envelope::<CounterMsg, i64>::InstanceCount, Some(Duration::from_millis(10))).await.unwrap();
        assert!(matches!(abandoned, CallResult::Timeout));

        // the late reply goes nowhere and the instance keeps serving
        assert_eq!(handle.ask(CounterMsg::Add(2), Duration::from_secs(1)).await.unwrap(), 2);
        assert_eq!(handle.instance_count().await.unwrap(), 1);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_instance_count_reports_pool_size() {
        let runtime = ActorRuntime::init(test_config()).await.unwrap();
        let vitals = Vitals::default();
        runtime.register(counter_spec(&vitals).pooled(PoolConfig::new(2, 4)).named("pooled")).await.unwrap();
        let handle = runtime.lookup::<Counter>(&ActorIdentity::named::<Counter>("pooled")).unwrap();

        assert_eq!(handle.instance_count().await.unwrap(), 2);

        runtime.shutdown().await.unwrap();
        assert!(handle.instance_count().await.is_err());
    }
}
