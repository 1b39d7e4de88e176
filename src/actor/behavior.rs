//! Actor capability
//!
//! User actors implement [`ActorBehavior`]: one message type, zero or one reply
//! per message. The runtime owns the instance and calls `receive` for one
//! message at a time, so the behavior can mutate `self` freely.

use std::{
    any::Any,
    fmt::Debug,
    sync::{Arc, Weak}
};

use async_trait::async_trait;
use ractor::{ActorCell, ActorProcessingErr};
use tracing::{Level, event};

use crate::{
    actor::{
        factory::{ActorFactory, InstanceRef},
        message::Envelope
    },
    domain::{
        constant::worker,
        error::ActorError,
        identity::{ActorIdentity, instance_name, short_type_name}
    },
    runtime::system::RuntimeCore
};

/// A sequential message processor hosted by the runtime
#[async_trait]
pub trait ActorBehavior: Send + 'static {
    /// Inbound message; match on it exhaustively in `receive`
    type Msg: Debug + Send + 'static;
    /// Reply produced for `ask`; `Default` is what callers get on failure
    type Reply: Default + Send + 'static;

    /// Type half of the actor's identity
    fn type_tag() -> &'static str
    where
        Self: Sized
    {
        short_type_name::<Self>()
    }

    /// Initialization hook; an error here is a construction failure
    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<(), ActorProcessingErr> {
        Ok(())
    }

    /// Handle one message, optionally producing a reply
    async fn receive(&mut self, message: Self::Msg, ctx: &ActorContext)
    -> Result<Option<Self::Reply>, ActorProcessingErr>;

    /// Called when the instance is drained or replaced by a restart
    async fn on_stop(&mut self, _ctx: &ActorContext) {}
}

/// What a running behavior can see of the runtime
#[derive(Clone)]
pub struct ActorContext {
    identity: ActorIdentity,
    instance: Arc<str>,
    runtime:  Weak<RuntimeCore>,
    /// Mailbox of the running instance; children are linked under it
    cell:     Option<ActorCell>
}

impl ActorContext {
    pub(crate) fn new(identity: ActorIdentity, runtime: Weak<RuntimeCore>) -> Self {
        Self { identity, instance: Arc::from(""), runtime, cell: None }
    }

    /// Context not attached to any runtime; `publish` and `tell` report failure
    pub fn detached(identity: ActorIdentity) -> Self {
        Self::new(identity, Weak::new())
    }

    pub(crate) fn for_instance(&self, instance: &str) -> Self {
        Self { identity: self.identity.clone(), instance: Arc::from(instance), runtime: self.runtime.clone(), cell: None }
    }

    pub(crate) fn attached_to(self, cell: ActorCell) -> Self {
        Self { cell: Some(cell), ..self }
    }

    /// Registry identity this instance serves
    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    /// Generated scheduler-level name of this instance
    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    /// Broadcast to every subscriber of `M`
    pub fn publish<M>(&self, message: M) -> bool
    where
        M: Any + Clone + Debug + Send
    {
        match self.runtime.upgrade() {
            Some(core) => core.publish(&message).is_ok(),
            None => false
        }
    }

    /// Fire-and-forget to another registered actor
    pub fn tell<B: ActorBehavior>(&self, identity: &ActorIdentity, message: B::Msg) -> bool {
        let Some(core) = self.runtime.upgrade() else {
            return false;
        };

        match core.lookup::<B>(identity) {
            Ok(handle) => handle.tell(message).is_ok(),
            Err(_) => false
        }
    }

    /// Spawn a `B` instance under this one and hand it `message`
    ///
    /// The child is not registered; it lives until it is drained, fails, or this
    /// instance stops. With `stop_after` it drains as soon as `message` is handled.
    pub async fn spawn_child<B: ActorBehavior>(
        &self,
        factory: &ActorFactory<B>,
        message: B::Msg,
        name: Option<&str>,
        stop_after: bool
    ) -> Result<InstanceRef<B>, ActorError> {
        let core = self.runtime.upgrade().ok_or(ActorError::NotInitialized)?;
        core.ensure_running()?;

        let Some(parent) = self.cell.clone() else {
            return Err(ActorError::Delivery(format!("{} has no running instance to own children", self.identity)));
        };

        let identity = ActorIdentity::new(B::type_tag(), name);
        let child_name = instance_name(core.system_name(), &identity);
        let context = ActorContext::new(identity.clone(), self.runtime.clone());

        // the join handle is dropped; the child's exit is observed by this instance
        let (child, _) = factory.spawn(child_name.clone(), &context, None, parent).await?;

        event!(Level::DEBUG, event = worker::CHILD_SPAWNED,
               actor = %self.identity, child = %child_name, stop_after = %stop_after);

        child
            .cast(Envelope::Tell(message))
            .map_err(|e| ActorError::Delivery(format!("child {} rejected its message: {}", identity, e)))?;

        if stop_after {
            child
                .cast(Envelope::Drain)
                .map_err(|e| ActorError::Delivery(format!("child {} rejected drain: {}", identity, e)))?;
        }

        Ok(child)
    }
}

impl Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext").field("identity", &self.identity).field("instance", &self.instance).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::Ordering, time::Duration};

    use super::*;
    use crate::{
        runtime::{ActorRuntime, ActorSpec},
        testing::{Counter, CounterMsg, DispatchMsg, Dispatcher, Vitals, test_config}
    };

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn dispatcher(vitals: &Vitals) -> ActorRuntime {
        let runtime = ActorRuntime::init(test_config()).await.unwrap();
        let children = vitals.clone();
        runtime.register(ActorSpec::new(move || Ok(Dispatcher::new(children.clone())))).await.unwrap();
        runtime
    }

    #[tokio::test]
    async fn test_child_handles_message_then_stops() {
        let vitals = Vitals::default();
        let runtime = dispatcher(&vitals).await;
        let handle = runtime.lookup::<Dispatcher>(&ActorIdentity::of::<Dispatcher>()).unwrap();
        let timeout = Duration::from_secs(1);

        let name = handle.ask(DispatchMsg::Delegate { amount: 3, stop_after: true }, timeout).await.unwrap();
        assert!(name.starts_with("test-counter-delegate-"), "unexpected child name {}", name);

        wait_until(|| vitals.stopped.load(Ordering::SeqCst) == 1).await;
        assert_eq!(vitals.started.load(Ordering::SeqCst), 1);
        assert_eq!(vitals.processed.load(Ordering::SeqCst), 1);
        assert_eq!(vitals.stopped.load(Ordering::SeqCst), 1);
        wait_until(|| ractor::registry::where_is(name.clone()).is_none()).await;
        assert!(ractor::registry::where_is(name).is_none());

        // the parent outlives its child
        assert_eq!(handle.ask(DispatchMsg::Ping, timeout).await.unwrap(), "pong");
        assert!(runtime.is_running());
        assert!(runtime.registry().lookup::<Counter>(&ActorIdentity::named::<Counter>("delegate")).is_err());

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_child_without_stop_lives_until_parent_stops() {
        let vitals = Vitals::default();
        let runtime = dispatcher(&vitals).await;
        let handle = runtime.lookup::<Dispatcher>(&ActorIdentity::of::<Dispatcher>()).unwrap();

        let name =
            handle.ask(DispatchMsg::Delegate { amount: 1, stop_after: false }, Duration::from_secs(1)).await.unwrap();

        wait_until(|| vitals.processed.load(Ordering::SeqCst) == 1).await;
        assert_eq!(vitals.processed.load(Ordering::SeqCst), 1);
        assert_eq!(vitals.stopped.load(Ordering::SeqCst), 0);
        assert!(ractor::registry::where_is(name.clone()).is_some());

        runtime.shutdown().await.unwrap();
        wait_until(|| ractor::registry::where_is(name.clone()).is_none()).await;
        assert!(ractor::registry::where_is(name).is_none());
    }

    #[tokio::test]
    async fn test_spawn_child_requires_a_running_instance() {
        let factory = ActorFactory::new(|| Ok(Counter::new(Vitals::default())));
        let detached = ActorContext::detached(ActorIdentity::of::<Dispatcher>());

        let result = detached.spawn_child(&factory, CounterMsg::Add(1), None, true).await;
        assert!(matches!(result, Err(ActorError::NotInitialized)));
    }
}
