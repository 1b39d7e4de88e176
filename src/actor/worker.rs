//! SupervisedActor - hosts one behavior instance
//!
//! Runs the user behavior inside a ractor mailbox and applies the supervisor
//! policy to every failure in place:
//! - Resume: the failing message is dropped, state is kept
//! - Restart: the behavior is rebuilt through the factory
//! - Stop: the instance fails with a processing error; siblings and the
//!   runtime keep running
//!
//! A failed rebuild fails the instance with a construction error, which is the
//! only kind its supervisors escalate.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering}
    },
    time::Instant
};

use futures::FutureExt;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use tracing::{Level, event};

use crate::{
    actor::{
        behavior::{ActorBehavior, ActorContext},
        factory::ActorFactory,
        message::Envelope
    },
    domain::{
        constant::worker,
        error::ActorError,
        supervisor::{Directive, FailureKind, SupervisorState}
    }
};

/// Startup arguments of one instance
pub struct WorkerArgs {
    pub context: ActorContext,
    /// In-flight counter shared with a pool router, if pooled
    pub load:    Option<Arc<AtomicUsize>>
}

/// SupervisedActor State - the behavior plus its private failure history
pub struct WorkerState<A: ActorBehavior> {
    behavior:   A,
    supervisor: SupervisorState,
    context:    ActorContext,
    load:       Option<Arc<AtomicUsize>>
}

/// ractor actor wrapping an [`ActorBehavior`]
pub struct SupervisedActor<A: ActorBehavior> {
    factory: ActorFactory<A>
}

impl<A: ActorBehavior> SupervisedActor<A> {
    pub fn new(factory: ActorFactory<A>) -> Self {
        Self { factory }
    }
}

#[async_trait::async_trait]
impl<A: ActorBehavior> Actor for SupervisedActor<A> {
    type Arguments = WorkerArgs;
    type Msg = Envelope<A::Msg, A::Reply>;
    type State = WorkerState<A>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        WorkerArgs { context, load }: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        let context = context.attached_to(myself.get_cell());
        let behavior = self.construct(&context).await.map_err(|e| {
            event!(Level::ERROR, event = worker::CONSTRUCTION_FAILED,
                   actor = %context.identity(), instance = %context.instance_name(), error = %e);
            e
        })?;

        event!(Level::DEBUG, event = worker::INSTANCE_STARTED,
               actor = %context.identity(), instance = %context.instance_name());

        Ok(WorkerState { behavior, supervisor: SupervisorState::new(), context, load })
    }

    async fn post_stop(&self, _myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        state.behavior.on_stop(&state.context).await;
        event!(Level::DEBUG, event = worker::INSTANCE_STOPPED,
               actor = %state.context.identity(), instance = %state.context.instance_name(),
               failures = %state.supervisor.total_failures(), restarts = %state.supervisor.restarts());
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            Envelope::Tell(message) => self.process(message, None, state).await,
            Envelope::Ask(message, reply) => self.process(message, Some(reply), state).await,
            Envelope::InstanceCount(reply) => {
                if reply.send(1).is_err() {
                    event!(Level::DEBUG, event = worker::REPLY_DROPPED, actor = %state.context.identity());
                }
                Ok(())
            }
            Envelope::Drain => {
                event!(Level::DEBUG, event = worker::DRAIN_REQUESTED,
                       actor = %state.context.identity(), instance = %state.context.instance_name());
                myself.stop(Some("drained".to_string()));
                Ok(())
            }
        }
    }

    /// Children spawned through the context; their exit never stops this instance
    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                event!(Level::DEBUG, event = worker::CHILD_EXITED,
                       actor = %state.context.identity(), child = %cell.get_id(), reason = ?reason);
                Ok(())
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                event!(Level::WARN, event = worker::CHILD_EXITED,
                       actor = %state.context.identity(), child = %cell.get_id(), error = %error);
                if is_escalating(&error) {
                    return Err(error);
                }
                Ok(())
            }
            _ => Ok(())
        }
    }
}

impl<A: ActorBehavior> SupervisedActor<A> {
    /// Build and initialize a fresh behavior
    async fn construct(&self, context: &ActorContext) -> Result<A, ActorProcessingErr> {
        let mut behavior = self.factory.build()?;
        behavior.on_start(context).await?;
        Ok(behavior)
    }

    /// Run one message through the behavior and supervise the outcome
    async fn process(
        &self,
        message: A::Msg,
        reply: Option<RpcReplyPort<A::Reply>>,
        state: &mut WorkerState<A>
    ) -> Result<(), ActorProcessingErr> {
        let outcome = AssertUnwindSafe(state.behavior.receive(message, &state.context)).catch_unwind().await;

        if let Some(load) = &state.load {
            load.fetch_sub(1, Ordering::AcqRel);
        }

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(ActorProcessingErr::from(panic_message(panic.as_ref())))
        };

        match result {
            Ok(response) => {
                state.supervisor.record_success(Instant::now(), self.factory.policy().within());
                if let (Some(reply), Some(response)) = (reply, response) {
                    if reply.send(response).is_err() {
                        event!(Level::DEBUG, event = worker::REPLY_DROPPED, actor = %state.context.identity());
                    }
                }
                Ok(())
            }
            Err(e) => {
                // dropping the reply port releases a waiting ask immediately
                drop(reply);
                self.supervise(FailureKind::Processing, e, state).await
            }
        }
    }

    async fn supervise(
        &self,
        kind: FailureKind,
        error: ActorProcessingErr,
        state: &mut WorkerState<A>
    ) -> Result<(), ActorProcessingErr> {
        let directive = self.factory.policy().decide(kind, &mut state.supervisor, Instant::now());

        event!(Level::WARN, event = worker::MESSAGE_FAILED,
               actor = %state.context.identity(), instance = %state.context.instance_name(),
               error = %error, directive = ?directive, recent_failures = %state.supervisor.recent_failures());

        match directive {
            Directive::Resume => {
                event!(Level::DEBUG, event = worker::FAILURE_RESUMED, actor = %state.context.identity());
                Ok(())
            }
            Directive::Restart => match self.construct(&state.context).await {
                Ok(fresh) => {
                    let mut previous = std::mem::replace(&mut state.behavior, fresh);
                    previous.on_stop(&state.context).await;
                    state.supervisor.record_restart();
                    event!(Level::INFO, event = worker::INSTANCE_RESTARTED,
                           actor = %state.context.identity(), instance = %state.context.instance_name(),
                           restarts = %state.supervisor.restarts());
                    Ok(())
                }
                Err(e) => {
                    event!(Level::ERROR, event = worker::CONSTRUCTION_FAILED,
                           actor = %state.context.identity(), instance = %state.context.instance_name(), error = %e);
                    Err(ActorProcessingErr::from(ActorError::construction(state.context.identity(), e)))
                }
            },
            Directive::Stop => {
                // a failing actor skips post_stop, so run the hook here
                state.behavior.on_stop(&state.context).await;
                event!(Level::WARN, event = worker::INSTANCE_FAILED,
                       actor = %state.context.identity(), instance = %state.context.instance_name(), error = %error);
                Err(ActorProcessingErr::from(ActorError::processing(state.context.identity(), error)))
            }
            Directive::Escalate => {
                event!(Level::ERROR, event = worker::INSTANCE_ESCALATED,
                       actor = %state.context.identity(), instance = %state.context.instance_name(), error = %error);
                Err(ActorProcessingErr::from(ActorError::construction(state.context.identity(), error)))
            }
        }
    }
}

/// Whether a failure reported by a linked actor must take the runtime down
pub(crate) fn is_escalating(error: &ActorProcessingErr) -> bool {
    error.downcast_ref::<ActorError>().is_some_and(ActorError::is_escalating)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
