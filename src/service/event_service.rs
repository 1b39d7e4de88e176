//! Messaging facade
//!
//! Boolean and default-value front over the runtime. Failures are logged and
//! swallowed here; callers that want the typed error use the `try_` variants.

use std::{any::Any, fmt::Debug, time::Duration};

use tracing::{Level, event};

use crate::{
    actor::ActorBehavior,
    domain::{constant::messaging, error::ActorError, identity::ActorIdentity},
    runtime::ActorRuntime
};

/// tell / ask / broadcast over one runtime
#[derive(Clone)]
pub struct ActorEventService {
    runtime: ActorRuntime
}

impl ActorEventService {
    pub fn new(runtime: ActorRuntime) -> Self {
        Self { runtime }
    }

    /// Fire-and-forget; false when the identity is unknown or the runtime is not running
    pub fn tell<A: ActorBehavior>(&self, identity: &ActorIdentity, message: A::Msg) -> bool {
        match self.try_tell::<A>(identity, message) {
            Ok(()) => true,
            Err(e) => {
                event!(Level::ERROR, event = messaging::TELL_FAILED, actor = %identity, error = %e);
                false
            }
        }
    }

    /// `tell` addressed to the default identity of `A`
    pub fn send<A: ActorBehavior>(&self, message: A::Msg) -> bool {
        self.tell::<A>(&ActorIdentity::of::<A>(), message)
    }

    pub fn try_tell<A: ActorBehavior>(&self, identity: &ActorIdentity, message: A::Msg) -> Result<(), ActorError> {
        event!(Level::DEBUG, event = messaging::TELL_SENT, actor = %identity, message = ?message);
        self.runtime.lookup::<A>(identity)?.tell(message)
    }

    /// Request/response; yields `A::Reply::default()` on timeout or any failure
    pub async fn ask<A: ActorBehavior>(&self, identity: &ActorIdentity, message: A::Msg, timeout: Duration) -> A::Reply {
        match self.try_ask::<A>(identity, message, timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                event!(Level::ERROR, event = messaging::ASK_FAILED, actor = %identity, error = %e);
                A::Reply::default()
            }
        }
    }

    /// `ask` addressed to the default identity of `A` with the configured timeout
    pub async fn request<A: ActorBehavior>(&self, message: A::Msg) -> A::Reply {
        let timeout = self.runtime.config().ask_timeout();
        self.ask::<A>(&ActorIdentity::of::<A>(), message, timeout).await
    }

    pub async fn try_ask<A: ActorBehavior>(
        &self,
        identity: &ActorIdentity,
        message: A::Msg,
        timeout: Duration
    ) -> Result<A::Reply, ActorError> {
        event!(Level::DEBUG, event = messaging::ASK_SENT,
               actor = %identity, message = ?message, timeout_ms = %timeout.as_millis());
        self.runtime.lookup::<A>(identity)?.ask(message, timeout).await
    }

    /// Deliver one copy to every subscriber of `M`; false when the runtime is not running
    pub fn broadcast<M>(&self, message: M) -> bool
    where
        M: Any + Debug
    {
        match self.runtime.publish(&message) {
            Ok(delivered) => {
                event!(Level::DEBUG, event = messaging::BROADCAST_PUBLISHED,
                       message = ?message, delivered = %delivered);
                true
            }
            Err(e) => {
                event!(Level::ERROR, event = messaging::BROADCAST_FAILED, message = ?message, error = %e);
                false
            }
        }
    }

    /// Subscribe the `A` actor at `identity` to `M`; repeating a pair is a no-op
    pub fn subscribe<A, M>(&self, identity: &ActorIdentity) -> bool
    where
        A: ActorBehavior,
        A::Msg: From<M>,
        M: Any + Clone + Send
    {
        match self.runtime.subscribe::<A, M>(identity) {
            Ok(_) => true,
            Err(e) => {
                event!(Level::ERROR, event = messaging::BROADCAST_FAILED, actor = %identity, error = %e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        runtime::ActorSpec,
        testing::{Counter, CounterMsg, Echo, EchoMsg, Ledger, LedgerMsg, Vitals, Tick, test_config}
    };

    async fn running() -> (ActorRuntime, ActorEventService) {
        let runtime = ActorRuntime::init(test_config()).await.unwrap();
        let events = runtime.events();
        (runtime, events)
    }

    #[tokio::test]
    async fn test_calls_before_init_report_failure() {
        let runtime = ActorRuntime::new(test_config()).unwrap();
        let events = runtime.events();
        let identity = ActorIdentity::of::<Echo>();

        assert!(!events.tell::<Echo>(&identity, EchoMsg::Say("hi".to_string())));
        assert_eq!(events.ask::<Echo>(&identity, EchoMsg::Say("hi".to_string()), Duration::from_secs(1)).await, "");
        assert!(!events.broadcast(Tick(1)));
        assert!(!events.subscribe::<Ledger, Tick>(&ActorIdentity::of::<Ledger>()));
        assert!(matches!(
            events.try_tell::<Echo>(&identity, EchoMsg::Say("hi".to_string())),
            Err(ActorError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_tell_unknown_identity_returns_false() {
        let (runtime, events) = running().await;

        assert!(!events.tell::<Echo>(&ActorIdentity::named::<Echo>("nobody"), EchoMsg::Say("hi".to_string())));
        assert!(matches!(
            events.try_tell::<Echo>(&ActorIdentity::named::<Echo>("nobody"), EchoMsg::Say("hi".to_string())),
            Err(ActorError::NotFound(_))
        ));

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_tell_preserves_send_order() {
        let (runtime, events) = running().await;
        let ledger = Ledger::default();
        let entries = ledger.entries.clone();
        runtime.register(ActorSpec::new(move || Ok(ledger.clone()))).await.unwrap();

        for n in 0..20 {
            assert!(events.send::<Ledger>(LedgerMsg::Record(n.to_string())));
        }
        assert_eq!(events.request::<Ledger>(LedgerMsg::Count).await, 20);

        let expected: Vec<String> = (0..20).map(|n: i32| n.to_string()).collect();
        assert_eq!(*entries.lock(), expected);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_times_out_with_default() {
        let (runtime, events) = running().await;
        runtime.register_default::<Echo>().await.unwrap();
        let identity = ActorIdentity::of::<Echo>();

        let timeout = Duration::from_millis(50);
        let started = Instant::now();
        let reply = events.ask::<Echo>(&identity, EchoMsg::Silent(Duration::from_millis(300)), timeout).await;

        assert_eq!(reply, String::default());
        assert!(started.elapsed() < timeout + Duration::from_millis(200));

        let result = events.try_ask::<Echo>(&identity, EchoMsg::Silent(Duration::from_millis(300)), timeout).await;
        assert!(matches!(result, Err(ActorError::Timeout { .. })));

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_failures_map_to_default() {
        let (runtime, events) = running().await;
        let vitals = Vitals::default();
        let counter = vitals.clone();
        runtime.register(ActorSpec::new(move || Ok(Counter::new(counter.clone())))).await.unwrap();
        let identity = ActorIdentity::of::<Counter>();
        let timeout = Duration::from_secs(1);

        assert_eq!(events.ask::<Counter>(&identity, CounterMsg::Add(4), timeout).await, 4);
        assert_eq!(events.ask::<Counter>(&identity, CounterMsg::Fail, timeout).await, 0);
        assert_eq!(events.ask::<Counter>(&identity, CounterMsg::Panic, timeout).await, 0);
        assert_eq!(events.ask::<Counter>(&ActorIdentity::named::<Counter>("missing"), CounterMsg::Add(1), timeout).await, 0);

        // both failures resumed, so state survived
        assert_eq!(events.ask::<Counter>(&identity, CounterMsg::Add(1), timeout).await, 5);
        assert_eq!(vitals.failures.load(std::sync::atomic::Ordering::SeqCst), 2);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_without_reply_returns_default() {
        let (runtime, events) = running().await;
        runtime.register_default::<Echo>().await.unwrap();
        let identity = ActorIdentity::of::<Echo>();

        let started = Instant::now();
        let result = events.try_ask::<Echo>(&identity, EchoMsg::Silent(Duration::ZERO), Duration::from_secs(5)).await;

        assert!(matches!(result, Err(ActorError::NoReply(_))));
        assert!(started.elapsed() < Duration::from_secs(1));

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_reaches_each_subscriber_once() {
        let (runtime, events) = running().await;

        let mut ledgers = Vec::new();
        for name in ["first", "second", "bystander"] {
            let ledger = Ledger::default();
            ledgers.push(ledger.entries.clone());
            runtime.register(ActorSpec::new(move || Ok(ledger.clone())).named(name)).await.unwrap();
        }

        let first = ActorIdentity::named::<Ledger>("first");
        let second = ActorIdentity::named::<Ledger>("second");
        assert!(events.subscribe::<Ledger, Tick>(&first));
        assert!(events.subscribe::<Ledger, Tick>(&second));
        assert!(events.subscribe::<Ledger, Tick>(&second));

        assert!(events.broadcast(Tick(3)));

        for name in ["first", "second", "bystander"] {
            let identity = ActorIdentity::named::<Ledger>(name);
            events.ask::<Ledger>(&identity, LedgerMsg::Count, Duration::from_secs(1)).await;
        }

        assert_eq!(*ledgers[0].lock(), vec!["tick 3".to_string()]);
        assert_eq!(*ledgers[1].lock(), vec!["tick 3".to_string()]);
        assert!(ledgers[2].lock().is_empty());

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_succeeds() {
        let (runtime, events) = running().await;
        assert!(events.broadcast(Tick(1)));
        runtime.shutdown().await.unwrap();
        assert!(!events.broadcast(Tick(2)));
    }

    #[tokio::test]
    async fn test_actor_can_publish_through_its_context() {
        let (runtime, events) = running().await;

        let relay = Ledger::default();
        let listener = Ledger::default();
        let heard = listener.entries.clone();
        runtime.register(ActorSpec::new(move || Ok(relay.clone())).named("relay")).await.unwrap();
        runtime.register(ActorSpec::new(move || Ok(listener.clone())).named("listener")).await.unwrap();

        let listener_identity = ActorIdentity::named::<Ledger>("listener");
        assert!(events.subscribe::<Ledger, Tick>(&listener_identity));

        let relay_identity = ActorIdentity::named::<Ledger>("relay");
        events.ask::<Ledger>(&relay_identity, LedgerMsg::Relay(9), Duration::from_secs(1)).await;
        events.ask::<Ledger>(&listener_identity, LedgerMsg::Count, Duration::from_secs(1)).await;

        assert_eq!(*heard.lock(), vec!["tick 9".to_string()]);

        runtime.shutdown().await.unwrap();
    }
}
