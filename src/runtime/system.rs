//! Actor runtime
//!
//! Owns the Guardian, the registry and the subscription table. The runtime is
//! an explicit object: created, started once, shut down once. Every operation
//! made outside the running phase reports `NotInitialized` or `Terminated`.

use std::{
    any::Any,
    fmt::Debug,
    sync::{Arc, Weak},
    time::{Duration, Instant}
};

use futures::{
    FutureExt,
    future::{BoxFuture, join_all}
};
use parking_lot::Mutex;
use ractor::{
    Actor, ActorCell, ActorRef,
    rpc::{CallResult, call}
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    actor::{
        ActorBehavior, ActorContext, ActorFactory, Guardian, GuardianMessage, PoolArgs, PoolRouter, SystemHealth
    },
    config::RuntimeConfig,
    domain::{
        constant::runtime,
        error::ActorError,
        identity::{ActorIdentity, instance_name},
        resizer::{PoolConfig, ResizerConfig},
        supervisor::SupervisorPolicy
    },
    runtime::{
        handle::ActorHandle,
        registry::{ActorRegistry, Registration},
        subscription::SubscriptionTable
    },
    service::ActorEventService
};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const GUARDIAN_STOP_TIMEOUT: Duration = Duration::from_secs(1);

enum Lifecycle {
    Created,
    Starting,
    Running { guardian: ActorRef<GuardianMessage>, guardian_join: Option<JoinHandle<()>>, started_at: Instant },
    Terminated
}

/// State shared by the runtime handle, actor contexts and the escalation watcher
pub(crate) struct RuntimeCore {
    config:        RuntimeConfig,
    registry:      ActorRegistry,
    subscriptions: SubscriptionTable,
    lifecycle:     Mutex<Lifecycle>,
    escalation:    CancellationToken,
    stopped:       CancellationToken
}

impl RuntimeCore {
    fn guardian(&self) -> Result<ActorRef<GuardianMessage>, ActorError> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running { guardian, .. } => Ok(guardian.clone()),
            Lifecycle::Created | Lifecycle::Starting => Err(ActorError::NotInitialized),
            Lifecycle::Terminated => Err(ActorError::Terminated)
        }
    }

    pub(crate) fn ensure_running(&self) -> Result<(), ActorError> {
        self.guardian().map(|_| ())
    }

    /// Prefix of every generated instance name
    pub(crate) fn system_name(&self) -> &str {
        &self.config.system_name
    }

    pub(crate) fn lookup<A: ActorBehavior>(&self, identity: &ActorIdentity) -> Result<ActorHandle<A>, ActorError> {
        self.guardian()?;
        self.registry.lookup::<A>(identity)
    }

    /// Fan `message` out to its subscribers; returns how many accepted it
    pub(crate) fn publish<M>(&self, message: &M) -> Result<usize, ActorError>
    where
        M: Any + Debug
    {
        self.guardian()?;
        Ok(self.subscriptions.publish(&self.registry, message))
    }

    async fn spawn<A: ActorBehavior>(
        self: &Arc<Self>,
        identity: ActorIdentity,
        factory: ActorFactory<A>,
        pool: Option<(PoolConfig, ResizerConfig)>,
        supervisor: ActorCell
    ) -> Result<Registration, ActorError> {
        let context = ActorContext::new(identity.clone(), Arc::downgrade(self));
        let name = instance_name(&self.config.system_name, &identity);

        match pool {
            None => {
                let (actor, join) = factory.spawn(name, &context, None, supervisor).await?;
                Ok(Registration::new(ActorHandle::<A>::new(identity, actor, false), join))
            }
            Some((config, resizer)) => {
                let args = PoolArgs {
                    context: context.for_instance(&name),
                    name_prefix: self.config.system_name.clone(),
                    config,
                    resizer
                };
                let (actor, join) = Actor::spawn_linked(Some(name), PoolRouter::new(factory), args, supervisor)
                    .await
                    .map_err(|e| ActorError::construction(&identity, e))?;
                Ok(Registration::new(ActorHandle::<A>::new(identity, actor, true), join))
            }
        }
    }

    /// Drain every registration, waiting at most `grace`, then stop the Guardian
    async fn terminate(&self, grace: Duration) -> Result<(), ActorError> {
        let (guardian, guardian_join, started_at) = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Terminated) {
                Lifecycle::Running { guardian, guardian_join, started_at } => (guardian, guardian_join, started_at),
                Lifecycle::Created => {
                    drop(lifecycle);
                    self.stopped.cancel();
                    return Ok(());
                }
                Lifecycle::Starting => {
                    *lifecycle = Lifecycle::Starting;
                    return Err(ActorError::NotInitialized);
                }
                Lifecycle::Terminated => return Err(ActorError::Terminated)
            }
        };

        let registrations = self.registry.unregister_all();
        event!(Level::INFO, event = runtime::SHUTDOWN_STARTED,
               system = %self.config.system_name, actors = %registrations.len(), grace_ms = %grace.as_millis());

        for registration in &registrations {
            if !registration.drain() {
                event!(Level::DEBUG, event = runtime::SHUTDOWN_STARTED,
                       actor = %registration.identity(), error = "mailbox already closed");
            }
        }

        let joins: Vec<JoinHandle<()>> = registrations.iter().filter_map(|registration| registration.take_join()).collect();

        if tokio::time::timeout(grace, join_all(joins)).await.is_err() {
            event!(Level::WARN, event = runtime::SHUTDOWN_FORCED,
                   system = %self.config.system_name, grace_ms = %grace.as_millis());
            for registration in &registrations {
                registration.kill();
            }
        }

        self.subscriptions.clear();

        guardian.stop(Some("runtime shutdown".to_string()));
        if let Some(join) = guardian_join {
            let _ = tokio::time::timeout(GUARDIAN_STOP_TIMEOUT, join).await;
        }

        self.stopped.cancel();
        event!(Level::INFO, event = runtime::SHUTDOWN_COMPLETED,
               system = %self.config.system_name, uptime_ms = %started_at.elapsed().as_millis());
        Ok(())
    }
}

/// Handle to a process-local actor system
#[derive(Clone)]
pub struct ActorRuntime {
    core: Arc<RuntimeCore>
}

impl ActorRuntime {
    /// Create a runtime without starting it
    pub fn new(config: RuntimeConfig) -> Result<Self, ActorError> {
        config.validate()?;

        Ok(Self {
            core: Arc::new(RuntimeCore {
                config,
                registry: ActorRegistry::new(),
                subscriptions: SubscriptionTable::new(),
                lifecycle: Mutex::new(Lifecycle::Created),
                escalation: CancellationToken::new(),
                stopped: CancellationToken::new()
            })
        })
    }

    /// Create and start a runtime
    pub async fn init(config: RuntimeConfig) -> Result<Self, ActorError> {
        let runtime = Self::new(config)?;
        runtime.start().await?;
        Ok(runtime)
    }

    /// Spawn the Guardian and begin watching for escalations
    pub async fn start(&self) -> Result<(), ActorError> {
        {
            let mut lifecycle = self.core.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Created => *lifecycle = Lifecycle::Starting,
                Lifecycle::Starting | Lifecycle::Running { .. } => {
                    return Err(ActorError::AlreadyStarted(self.core.config.system_name.clone()));
                }
                Lifecycle::Terminated => return Err(ActorError::Terminated)
            }
        }

        let identity = ActorIdentity::new("guardian", None);
        let name = instance_name(&self.core.config.system_name, &identity);

        let (guardian, guardian_join) = match Guardian::spawn_root(name, self.core.escalation.clone()).await {
            Ok(spawned) => spawned,
            Err(e) => {
                *self.core.lifecycle.lock() = Lifecycle::Created;
                return Err(ActorError::construction(identity, e));
            }
        };

        *self.core.lifecycle.lock() =
            Lifecycle::Running { guardian, guardian_join: Some(guardian_join), started_at: Instant::now() };

        self.watch_escalation();

        event!(Level::INFO, event = runtime::RUNTIME_STARTED, system = %self.core.config.system_name);
        Ok(())
    }

    fn watch_escalation(&self) {
        let core: Weak<RuntimeCore> = Arc::downgrade(&self.core);
        let escalation = self.core.escalation.clone();
        let stopped = self.core.stopped.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = escalation.cancelled() => {
                    let Some(core) = core.upgrade() else {
                        return;
                    };
                    event!(Level::ERROR, event = runtime::RUNTIME_ESCALATED,
                           system = %core.config.system_name,
                           grace_ms = %core.config.escalation_timeout().as_millis());
                    let _ = core.terminate(core.config.escalation_timeout()).await;
                }
                _ = stopped.cancelled() => {}
            }
        });
    }

    /// Register one actor (or pool) described by `spec`
    ///
    /// Invalid pool sizes and duplicate identities are rejected without side
    /// effects. A construction failure escalates and shuts the runtime down.
    pub async fn register<A: ActorBehavior>(&self, spec: ActorSpec<A>) -> Result<(), ActorError> {
        let guardian = self.core.guardian()?;
        let identity = spec.identity();

        let pool = match spec.pool {
            Some(config) => {
                config.validate()?;
                let resizer = spec.resizer.unwrap_or(self.core.config.resizer);
                resizer.validate()?;
                Some((config, resizer))
            }
            None => None
        };

        let policy = match spec.policy {
            Some(policy) => policy.validated()?,
            None => self.core.config.default_policy()?
        };
        let factory = spec.factory.with_policy(policy);

        let result = self
            .core
            .registry
            .register(identity.clone(), || self.core.spawn(identity, factory, pool, guardian.get_cell()))
            .await;

        if let Err(e) = &result {
            if e.is_escalating() && !self.core.escalation.is_cancelled() {
                self.core.escalation.cancel();
            }
        }

        result
    }

    /// Register `A` under its default identity, built with `A::default()`
    pub async fn register_default<A: ActorBehavior + Default>(&self) -> Result<(), ActorError> {
        self.register(ActorSpec::<A>::from_default()).await
    }

    /// Subscribe the `A` actor at `identity` to broadcasts of `M`
    ///
    /// Returns false when the pair was already subscribed.
    pub fn subscribe<A, M>(&self, identity: &ActorIdentity) -> Result<bool, ActorError>
    where
        A: ActorBehavior,
        A::Msg: From<M>,
        M: Any + Clone + Send
    {
        self.core.guardian()?;
        Ok(self.core.subscriptions.subscribe::<A, M>(identity))
    }

    pub fn lookup<A: ActorBehavior>(&self, identity: &ActorIdentity) -> Result<ActorHandle<A>, ActorError> {
        self.core.lookup::<A>(identity)
    }

    /// Publish `message` to every subscriber of its type
    pub fn publish<M>(&self, message: &M) -> Result<usize, ActorError>
    where
        M: Any + Debug
    {
        self.core.publish(message)
    }

    /// Drain all actors within `shutdown_timeout`, then stop
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.core.terminate(self.core.config.shutdown_timeout()).await
    }

    /// Resolves once the runtime has fully stopped, by shutdown or escalation
    pub async fn wait_for_shutdown(&self) {
        self.core.stopped.cancelled().await;
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.core.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// Whether an actor escalated since the runtime started
    pub fn is_escalated(&self) -> bool {
        self.core.escalation.is_cancelled()
    }

    pub async fn health(&self) -> Result<SystemHealth, ActorError> {
        let guardian = self.core.guardian()?;

        match call(&guardian, |reply| GuardianMessage::HealthCheck { reply }, Some(HEALTH_CHECK_TIMEOUT)).await {
            Ok(CallResult::Success(health)) => Ok(health),
            Ok(CallResult::Timeout) => {
                Err(ActorError::Timeout { identity: "guardian".to_string(), timeout: HEALTH_CHECK_TIMEOUT })
            }
            Ok(_) => Err(ActorError::NoReply("guardian".to_string())),
            Err(e) => Err(ActorError::Delivery(format!("health check failed: {}", e)))
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.core.config
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.core.registry
    }

    /// Messaging facade bound to this runtime
    pub fn events(&self) -> ActorEventService {
        ActorEventService::new(self.clone())
    }
}

/// How one actor type is registered: constructor, name, policy and pooling
pub struct ActorSpec<A: ActorBehavior> {
    factory: ActorFactory<A>,
    name:    Option<String>,
    policy:  Option<SupervisorPolicy>,
    pool:    Option<PoolConfig>,
    resizer: Option<ResizerConfig>
}

impl<A: ActorBehavior> ActorSpec<A> {
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn() -> Result<A, ractor::ActorProcessingErr> + Send + Sync + 'static
    {
        Self::from_parts(ActorFactory::new(constructor), None)
    }

    /// Use an existing factory, keeping its policy
    pub fn from_factory(factory: ActorFactory<A>) -> Self {
        let policy = *factory.policy();
        Self::from_parts(factory, Some(policy))
    }

    fn from_parts(factory: ActorFactory<A>, policy: Option<SupervisorPolicy>) -> Self {
        Self { factory, name: None, policy, pool: None, resizer: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_policy(mut self, policy: SupervisorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Front the identity with a worker pool
    pub fn pooled(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_resizer(mut self, resizer: ResizerConfig) -> Self {
        self.resizer = Some(resizer);
        self
    }

    pub fn identity(&self) -> ActorIdentity {
        ActorIdentity::new(A::type_tag(), self.name.as_deref())
    }
}

impl<A: ActorBehavior + Default> ActorSpec<A> {
    pub fn from_default() -> Self {
        Self::from_parts(ActorFactory::from_default(), None)
    }
}

type Registrar = Box<dyn FnOnce(ActorRuntime) -> BoxFuture<'static, Result<(), ActorError>> + Send>;
type Wiring = Box<dyn Fn(&ActorRuntime, &[ActorIdentity]) -> Result<(), ActorError> + Send>;

/// Startup table of actor registrations and subscriptions
///
/// Applied in declaration order by [`RuntimeBuilder::start`]; the first failure
/// shuts the runtime down and is returned.
pub struct RuntimeBuilder {
    config:        RuntimeConfig,
    registrations: Vec<(ActorIdentity, Registrar)>,
    subscriptions: Vec<Wiring>
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config, registrations: Vec::new(), subscriptions: Vec::new() }
    }

    pub fn actor<A: ActorBehavior>(mut self, spec: ActorSpec<A>) -> Self {
        let identity = spec.identity();
        let registrar: Registrar = Box::new(move |runtime| async move { runtime.register(spec).await }.boxed());
        self.registrations.push((identity, registrar));
        self
    }

    /// Register `spec` as a pool sized from the config entry of its type tag
    pub fn pooled_actor<A: ActorBehavior>(self, spec: ActorSpec<A>) -> Self {
        let pool = self.config.pool_for(A::type_tag());
        self.actor(spec.pooled(pool))
    }

    /// Every declared actor of type `A` receives broadcasts of `M`
    ///
    /// When no `A` was declared, the default identity of `A` is subscribed.
    pub fn subscribe<A, M>(mut self) -> Self
    where
        A: ActorBehavior,
        A::Msg: From<M>,
        M: Any + Clone + Send
    {
        let wiring: Wiring = Box::new(|runtime, declared| {
            let fallback = ActorIdentity::of::<A>();
            let mut targets: Vec<&ActorIdentity> =
                declared.iter().filter(|identity| identity.type_tag() == fallback.type_tag()).collect();

            if targets.is_empty() {
                targets.push(&fallback);
            }

            for identity in targets {
                runtime.subscribe::<A, M>(identity)?;
            }
            Ok(())
        });
        self.subscriptions.push(wiring);
        self
    }

    pub async fn start(self) -> Result<ActorRuntime, ActorError> {
        let runtime = ActorRuntime::init(self.config).await?;

        let mut declared = Vec::with_capacity(self.registrations.len());
        for (identity, registrar) in self.registrations {
            if let Err(e) = registrar(runtime.clone()).await {
                let _ = runtime.shutdown().await;
                return Err(e);
            }
            declared.push(identity);
        }

        for wiring in &self.subscriptions {
            if let Err(e) = wiring(&runtime, &declared) {
                let _ = runtime.shutdown().await;
                return Err(e);
            }
        }

        Ok(runtime)
    }
}
