//! Guardian Actor - Root Supervisor
//!
//! The Guardian is the root of the actor hierarchy:
//! - Every registered actor or pool router is linked under it
//! - A child failing with a construction error raises the runtime-wide
//!   escalation signal; other failures only stop that child
//! - Provides health checks

use std::time::SystemTime;

use ractor::{Actor, ActorProcessingErr, ActorRef, SpawnErr, SupervisionEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    actor::{
        message::{GuardianMessage, SystemHealth},
        worker::is_escalating
    },
    domain::constant::guardian
};

/// Guardian Actor State - tracks child actors and system metrics
pub struct GuardianState {
    /// Runtime escalation signal
    escalation:     CancellationToken,
    /// Currently linked children
    supervised:     usize,
    /// Children that failed instead of stopping
    failed:         u64,
    /// System startup time for uptime calculation
    startup_time:   SystemTime
}

/// Guardian Actor - Root supervisor of the actor system
pub struct Guardian;

#[async_trait::async_trait]
impl Actor for Guardian {
    type Arguments = CancellationToken;
    type Msg = GuardianMessage;
    type State = GuardianState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        escalation: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = guardian::GUARDIAN_STARTED);

        Ok(GuardianState { escalation, supervised: 0, failed: 0, startup_time: SystemTime::now() })
    }

    async fn post_stop(&self, _myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        event!(Level::DEBUG, event = guardian::GUARDIAN_STOPPED, failed = %state.failed);
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            GuardianMessage::HealthCheck { reply } => self.handle_health_check(reply, state).await
        }
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorStarted(cell) => {
                state.supervised += 1;
                event!(Level::DEBUG, event = guardian::CHILD_STARTED, child = %cell.get_id());
            }
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                state.supervised = state.supervised.saturating_sub(1);
                event!(Level::DEBUG, event = guardian::CHILD_TERMINATED, child = %cell.get_id(), reason = ?reason);
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                state.supervised = state.supervised.saturating_sub(1);
                state.failed += 1;
                event!(Level::ERROR, event = guardian::CHILD_FAILED, child = %cell.get_id(), error = %error);

                if is_escalating(&error) && !state.escalation.is_cancelled() {
                    event!(Level::ERROR, event = guardian::ESCALATION_RAISED, child = %cell.get_id());
                    state.escalation.cancel();
                }
            }
            _ => {}
        }

        Ok(())
    }
}

impl Guardian {
    /// Spawn the root supervisor under a unique name
    pub async fn spawn_root(
        name: String,
        escalation: CancellationToken
    ) -> Result<(ActorRef<GuardianMessage>, JoinHandle<()>), SpawnErr> {
        Actor::spawn(Some(name), Guardian, escalation).await
    }

    /// Handle health check requests
    async fn handle_health_check(
        &self,
        reply: ractor::RpcReplyPort<SystemHealth>,
        state: &GuardianState
    ) -> Result<(), ActorProcessingErr> {
        let uptime_seconds = state.startup_time.elapsed().unwrap_or_default().as_secs();

        let health = SystemHealth {
            supervised_actors: state.supervised,
            failed_actors: state.failed,
            escalated: state.escalation.is_cancelled(),
            uptime_seconds
        };

        event!(Level::DEBUG, event = guardian::HEALTH_CHECK_COMPLETED,
               supervised_actors = %health.supervised_actors, uptime_seconds = %uptime_seconds);

        if let Err(e) = reply.send(health) {
            event!(Level::ERROR, event = guardian::HEALTH_CHECK_COMPLETED, error = %e);
        }

        Ok(())
    }
}
