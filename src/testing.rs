//! Behaviors shared by the runtime and facade tests

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering}
    },
    time::Duration
};

use async_trait::async_trait;
use parking_lot::Mutex;
use ractor::ActorProcessingErr;

use crate::{
    actor::{ActorBehavior, ActorContext, ActorFactory},
    config::RuntimeConfig,
    domain::resizer::PoolConfig
};

pub(crate) fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        system_name: "test".to_string(),
        pool_defaults: PoolConfig::new(2, 4),
        ask_timeout_ms: 1_000,
        shutdown_timeout_ms: 2_000,
        escalation_timeout_ms: 200,
        ..RuntimeConfig::default()
    }
}

/// Lifecycle counters shared by every instance built from one constructor
#[derive(Clone, Default)]
pub(crate) struct Vitals {
    pub started:   Arc<AtomicUsize>,
    pub stopped:   Arc<AtomicUsize>,
    pub processed: Arc<AtomicUsize>,
    pub failures:  Arc<AtomicUsize>
}

#[derive(Debug)]
pub(crate) enum CounterMsg {
    Add(i64),
    Slow(Duration),
    Fail,
    Panic
}

pub(crate) struct Counter {
    vitals: Vitals,
    total: i64
}

impl Counter {
    pub fn new(vitals: Vitals) -> Self {
        Self { vitals, total: 0 }
    }
}

#[async_trait]
impl ActorBehavior for Counter {
    type Msg = CounterMsg;
    type Reply = i64;

    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<(), ActorProcessingErr> {
        self.vitals.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn receive(&mut self, message: CounterMsg, _ctx: &ActorContext) -> Result<Option<i64>, ActorProcessingErr> {
        match message {
            CounterMsg::Add(amount) => self.total += amount,
            CounterMsg::Slow(delay) => tokio::time::sleep(delay).await,
            CounterMsg::Fail => {
                self.vitals.failures.fetch_add(1, Ordering::SeqCst);
                return Err("requested failure".into());
            }
            CounterMsg::Panic => {
                self.vitals.failures.fetch_add(1, Ordering::SeqCst);
                panic!("requested panic");
            }
        }

        self.vitals.processed.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.total))
    }

    async fn on_stop(&mut self, _ctx: &ActorContext) {
        self.vitals.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub(crate) enum EchoMsg {
    Say(String),
    /// Sleep, then finish without replying
    Silent(Duration)
}

#[derive(Default)]
pub(crate) struct Echo;

#[async_trait]
impl ActorBehavior for Echo {
    type Msg = EchoMsg;
    type Reply = String;

    async fn receive(&mut self, message: EchoMsg, _ctx: &ActorContext) -> Result<Option<String>, ActorProcessingErr> {
        match message {
            EchoMsg::Say(text) => Ok(Some(text)),
            EchoMsg::Silent(delay) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum FaultyMsg {
    Fail
}

#[derive(Default)]
pub(crate) struct Faulty;

#[async_trait]
impl ActorBehavior for Faulty {
    type Msg = FaultyMsg;
    type Reply = ();

    async fn receive(&mut self, message: FaultyMsg, _ctx: &ActorContext) -> Result<Option<()>, ActorProcessingErr> {
        match message {
            FaultyMsg::Fail => Err("always failing".into())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tick(pub u64);

#[derive(Debug)]
pub(crate) enum LedgerMsg {
    Record(String),
    Tick(Tick),
    /// Re-broadcast a tick through the actor context
    Relay(u64),
    Count
}

impl From<Tick> for LedgerMsg {
    fn from(tick: Tick) -> Self {
        LedgerMsg::Tick(tick)
    }
}

/// Appends what it receives to a shared list
#[derive(Clone, Default)]
pub(crate) struct Ledger {
    pub entries: Arc<Mutex<Vec<String>>>
}

#[async_trait]
impl ActorBehavior for Ledger {
    type Msg = LedgerMsg;
    type Reply = usize;

    async fn receive(&mut self, message: LedgerMsg, ctx: &ActorContext) -> Result<Option<usize>, ActorProcessingErr> {
        match message {
            LedgerMsg::Record(entry) => self.entries.lock().push(entry),
            LedgerMsg::Tick(Tick(n)) => self.entries.lock().push(format!("tick {}", n)),
            LedgerMsg::Relay(n) => {
                if !ctx.publish(Tick(n)) {
                    return Err("relay failed".into());
                }
            }
            LedgerMsg::Count => {}
        }

        Ok(Some(self.entries.lock().len()))
    }
}

#[derive(Debug)]
pub(crate) enum DispatchMsg {
    /// Hand `Add(amount)` to a fresh unregistered counter
    Delegate { amount: i64, stop_after: bool },
    Ping
}

/// Spawns a counter child per delegated message; replies with the child's instance name
pub(crate) struct Dispatcher {
    children: ActorFactory<Counter>
}

impl Dispatcher {
    pub fn new(vitals: Vitals) -> Self {
        Self { children: ActorFactory::new(move || Ok(Counter::new(vitals.clone()))) }
    }
}

#[async_trait]
impl ActorBehavior for Dispatcher {
    type Msg = DispatchMsg;
    type Reply = String;

    async fn receive(&mut self, message: DispatchMsg, ctx: &ActorContext) -> Result<Option<String>, ActorProcessingErr> {
        match message {
            DispatchMsg::Delegate { amount, stop_after } => {
                let child = ctx.spawn_child(&self.children, CounterMsg::Add(amount), Some("delegate"), stop_after).await?;
                Ok(Some(child.get_name().unwrap_or_default()))
            }
            DispatchMsg::Ping => Ok(Some("pong".to_string()))
        }
    }
}
