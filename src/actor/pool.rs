//! PoolRouter Actor - fans one identity out over N supervised instances
//!
//! The router is the pool front registered under the identity:
//! - Spawns and links the initial workers
//! - Routes work round-robin across live workers
//! - Grows and shrinks the pool through the [`Resizer`]
//! - Replaces a worker that stopped on failure so the pool never drops below
//!   its floor; only construction failures are passed up to the Guardian

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering}
};

use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::task::JoinHandle;
use tracing::{Level, event};

use crate::{
    actor::{
        behavior::{ActorBehavior, ActorContext},
        factory::{ActorFactory, InstanceRef},
        message::Envelope,
        worker::is_escalating
    },
    domain::{
        constant::{pool, worker},
        identity::instance_name,
        resizer::{PoolConfig, Resizer, ResizerConfig}
    }
};

/// Startup arguments of a pool router
pub struct PoolArgs {
    pub context:     ActorContext,
    pub name_prefix: String,
    pub config:      PoolConfig,
    pub resizer:     ResizerConfig
}

/// One live pool member
struct PooledWorker<A: ActorBehavior> {
    actor: InstanceRef<A>,
    load:  Arc<AtomicUsize>,
    join:  JoinHandle<()>
}

/// PoolRouter State - live workers and routing cursor
pub struct PoolState<A: ActorBehavior> {
    workers:     Vec<PooledWorker<A>>,
    cursor:      usize,
    resizer:     Resizer,
    context:     ActorContext,
    name_prefix: String,
    draining:    bool
}

impl<A: ActorBehavior> PoolState<A> {
    fn loads(&self) -> Vec<usize> {
        self.workers.iter().map(|worker| worker.load.load(Ordering::Acquire)).collect()
    }
}

/// ractor actor fronting a worker pool
pub struct PoolRouter<A: ActorBehavior> {
    factory: ActorFactory<A>
}

impl<A: ActorBehavior> PoolRouter<A> {
    pub fn new(factory: ActorFactory<A>) -> Self {
        Self { factory }
    }
}

#[async_trait::async_trait]
impl<A: ActorBehavior> Actor for PoolRouter<A> {
    type Arguments = PoolArgs;
    type Msg = Envelope<A::Msg, A::Reply>;
    type State = PoolState<A>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        PoolArgs { context, name_prefix, config, resizer }: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        let mut state = PoolState {
            workers: Vec::with_capacity(config.instance_count),
            cursor: 0,
            resizer: Resizer::new(config, resizer),
            context,
            name_prefix,
            draining: false
        };

        for _ in 0..config.instance_count {
            if let Err(e) = self.spawn_worker(&myself, &mut state).await {
                for worker in state.workers.drain(..) {
                    worker.actor.stop(Some("pool startup failed".to_string()));
                }
                return Err(e);
            }
        }

        event!(Level::DEBUG, event = pool::POOL_STARTED,
               actor = %state.context.identity(), instances = %state.workers.len(),
               lower = %state.resizer.lower(), upper = %state.resizer.upper());

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            Envelope::InstanceCount(reply) => {
                if reply.send(state.workers.len()).is_err() {
                    event!(Level::DEBUG, event = worker::REPLY_DROPPED, actor = %state.context.identity());
                }
                Ok(())
            }
            Envelope::Drain => self.handle_drain(myself, state).await,
            work => {
                if state.resizer.tick() {
                    self.resize(&myself, state).await?;
                }
                self.route(work, state);
                Ok(())
            }
        }
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorFailed(cell, error) => {
                let before = state.workers.len();
                state.workers.retain(|worker| worker.actor.get_id() != cell.get_id());

                if is_escalating(&error) {
                    event!(Level::ERROR, event = pool::WORKER_FAILED,
                           actor = %state.context.identity(), worker = %cell.get_id(), error = %error);
                    return Err(error);
                }

                event!(Level::WARN, event = pool::WORKER_FAILED,
                       actor = %state.context.identity(), worker = %cell.get_id(), error = %error);

                if state.workers.len() < before && !state.draining {
                    self.replenish(&myself, state).await?;
                }
                Ok(())
            }
            SupervisionEvent::ActorTerminated(cell, _, _) => {
                state.workers.retain(|worker| worker.actor.get_id() != cell.get_id());
                Ok(())
            }
            _ => Ok(())
        }
    }
}

impl<A: ActorBehavior> PoolRouter<A> {
    async fn spawn_worker(
        &self,
        myself: &ActorRef<Envelope<A::Msg, A::Reply>>,
        state: &mut PoolState<A>
    ) -> Result<(), ActorProcessingErr> {
        let name = instance_name(&state.name_prefix, state.context.identity());
        let load = Arc::new(AtomicUsize::new(0));

        let (actor, join) =
            self.factory.spawn(name.clone(), &state.context, Some(load.clone()), myself.get_cell()).await?;

        event!(Level::DEBUG, event = pool::WORKER_SPAWNED, actor = %state.context.identity(), worker = %name);

        state.workers.push(PooledWorker { actor, load, join });
        Ok(())
    }

    /// Spawn replacements until the pool is back at its floor
    async fn replenish(
        &self,
        myself: &ActorRef<Envelope<A::Msg, A::Reply>>,
        state: &mut PoolState<A>
    ) -> Result<(), ActorProcessingErr> {
        let before = state.workers.len();
        while state.workers.len() < state.resizer.lower() {
            self.spawn_worker(myself, state).await?;
        }

        if state.workers.len() != before {
            event!(Level::INFO, event = pool::WORKER_REPLACED,
                   actor = %state.context.identity(), from = %before, to = %state.workers.len());
        }
        Ok(())
    }

    /// Round-robin over live workers
    fn route(&self, work: Envelope<A::Msg, A::Reply>, state: &mut PoolState<A>) {
        if state.workers.is_empty() {
            event!(Level::ERROR, event = pool::ROUTE_FAILED,
                   actor = %state.context.identity(), error = "no live workers");
            return;
        }

        let index = state.cursor % state.workers.len();
        state.cursor = state.cursor.wrapping_add(1);

        let worker = &state.workers[index];
        worker.load.fetch_add(1, Ordering::AcqRel);

        if let Err(e) = worker.actor.cast(work) {
            worker.load.fetch_sub(1, Ordering::AcqRel);
            event!(Level::ERROR, event = pool::ROUTE_FAILED,
                   actor = %state.context.identity(), worker = %worker.actor.get_id(), error = %e);
        }
    }

    async fn resize(
        &self,
        myself: &ActorRef<Envelope<A::Msg, A::Reply>>,
        state: &mut PoolState<A>
    ) -> Result<(), ActorProcessingErr> {
        let before = state.workers.len();
        let delta = state.resizer.resize(&state.loads());

        if delta > 0 {
            for _ in 0..delta {
                self.spawn_worker(myself, state).await?;
            }
        } else if delta < 0 {
            self.retire_idle(delta.unsigned_abs(), state);
        }

        if state.workers.len() != before {
            event!(Level::DEBUG, event = pool::POOL_RESIZED,
                   actor = %state.context.identity(), from = %before, to = %state.workers.len());
        }

        Ok(())
    }

    /// Drain up to `count` idle workers, newest first
    fn retire_idle(&self, count: usize, state: &mut PoolState<A>) {
        let mut retired = 0;
        let mut index = state.workers.len();

        while index > 0 && retired < count && state.workers.len() > state.resizer.lower() {
            index -= 1;
            if state.workers[index].load.load(Ordering::Acquire) > 0 {
                continue;
            }

            let worker = state.workers.remove(index);
            if let Err(e) = worker.actor.cast(Envelope::Drain) {
                event!(Level::WARN, event = pool::WORKER_RETIRED,
                       actor = %state.context.identity(), worker = %worker.actor.get_id(), error = %e);
            }
            retired += 1;
        }

        if retired > 0 {
            event!(Level::DEBUG, event = pool::WORKER_RETIRED, actor = %state.context.identity(), count = %retired);
        }
    }

    async fn handle_drain(
        &self,
        myself: ActorRef<Envelope<A::Msg, A::Reply>>,
        state: &mut PoolState<A>
    ) -> Result<(), ActorProcessingErr> {
        state.draining = true;
        let workers = std::mem::take(&mut state.workers);

        for worker in &workers {
            if let Err(e) = worker.actor.cast(Envelope::Drain) {
                event!(Level::WARN, event = pool::POOL_DRAINED,
                       actor = %state.context.identity(), worker = %worker.actor.get_id(), error = %e);
            }
        }

        for worker in workers {
            let _ = worker.join.await;
        }

        event!(Level::DEBUG, event = pool::POOL_DRAINED, actor = %state.context.identity());
        myself.stop(Some("drained".to_string()));
        Ok(())
    }
}
