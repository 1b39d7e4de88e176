//! Actor Registry
//!
//! Concurrent identity -> handle map with at-most-once registration. A
//! registration first reserves the identity atomically, then builds the actor,
//! then commits; a second registration racing the first sees the reservation
//! and reports `AlreadyExists`. Lookups only ever see committed handles.

use std::{future::Future, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{Level, event};

use crate::{
    actor::ActorBehavior,
    domain::{constant::registry, error::ActorError, identity::ActorIdentity},
    runtime::handle::{ActorHandle, ErasedHandle}
};

/// A committed registry entry
pub struct Registration {
    identity: ActorIdentity,
    handle:   Arc<dyn ErasedHandle>,
    join:     Mutex<Option<JoinHandle<()>>>
}

impl Registration {
    pub(crate) fn new<A: ActorBehavior>(handle: ActorHandle<A>, join: JoinHandle<()>) -> Self {
        Self { identity: handle.identity().clone(), handle: Arc::new(handle), join: Mutex::new(Some(join)) }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub(crate) fn drain(&self) -> bool {
        self.handle.drain()
    }

    pub(crate) fn kill(&self) {
        self.handle.kill();
    }

    /// Task handle of the top-level instance; yields `None` after the first call
    pub(crate) fn take_join(&self) -> Option<JoinHandle<()>> {
        self.join.lock().take()
    }
}

enum Slot {
    Reserved,
    Live(Arc<Registration>)
}

/// Process-local identity -> handle map
#[derive(Default)]
pub struct ActorRegistry {
    entries: DashMap<ActorIdentity, Slot>
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity` with the handle produced by `build`
    ///
    /// `build` only runs when the identity was free. On failure the identity is
    /// released again and the registry is left as it was.
    pub async fn register<F, Fut>(&self, identity: ActorIdentity, build: F) -> Result<(), ActorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Registration, ActorError>>
    {
        let reservation = match self.reserve(&identity) {
            Ok(reservation) => reservation,
            Err(e) => {
                event!(Level::DEBUG, event = registry::ACTOR_ALREADY_REGISTERED, actor = %identity);
                return Err(e);
            }
        };

        let registration = match build().await {
            Ok(registration) => Arc::new(registration),
            Err(e) => {
                event!(Level::ERROR, event = registry::REGISTRATION_FAILED, actor = %identity, error = %e);
                return Err(e);
            }
        };

        if let Err(orphan) = reservation.commit(registration) {
            // the registry was cleared while the actor was being built
            orphan.kill();
            return Err(ActorError::Terminated);
        }

        event!(Level::DEBUG, event = registry::ACTOR_REGISTERED, actor = %identity);
        Ok(())
    }

    fn reserve(&self, identity: &ActorIdentity) -> Result<Reservation<'_>, ActorError> {
        match self.entries.entry(identity.clone()) {
            Entry::Occupied(_) => Err(ActorError::AlreadyExists(identity.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Reserved);
                Ok(Reservation { registry: self, identity: identity.clone(), committed: false })
            }
        }
    }

    /// Typed handle registered under `identity`
    pub fn lookup<A: ActorBehavior>(&self, identity: &ActorIdentity) -> Result<ActorHandle<A>, ActorError> {
        let not_found = || ActorError::NotFound(identity.to_string());
        let entry = self.entries.get(identity).ok_or_else(not_found)?;

        match entry.value() {
            Slot::Live(registration) => {
                registration.handle.as_any().downcast_ref::<ActorHandle<A>>().cloned().ok_or_else(not_found)
            }
            Slot::Reserved => Err(not_found())
        }
    }

    pub fn contains(&self, identity: &ActorIdentity) -> bool {
        self.entries.get(identity).is_some_and(|entry| matches!(entry.value(), Slot::Live(_)))
    }

    /// Number of committed registrations
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| matches!(entry.value(), Slot::Live(_))).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identities(&self) -> Vec<ActorIdentity> {
        let mut identities: Vec<ActorIdentity> = self
            .entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Live(_)))
            .map(|entry| entry.key().clone())
            .collect();
        identities.sort();
        identities
    }

    /// Remove every entry and hand the committed ones back for teardown
    pub fn unregister_all(&self) -> Vec<Arc<Registration>> {
        let keys: Vec<ActorIdentity> = self.entries.iter().map(|entry| entry.key().clone()).collect();

        let released: Vec<Arc<Registration>> = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter_map(|(_, slot)| match slot {
                Slot::Live(registration) => Some(registration),
                Slot::Reserved => None
            })
            .collect();

        event!(Level::DEBUG, event = registry::REGISTRY_CLEARED, released = %released.len());
        released
    }
}

/// Claim on a vacant identity; released on drop unless committed
struct Reservation<'a> {
    registry:  &'a ActorRegistry,
    identity:  ActorIdentity,
    committed: bool
}

impl Reservation<'_> {
    fn commit(mut self, registration: Arc<Registration>) -> Result<(), Arc<Registration>> {
        self.committed = true;

        match self.registry.entries.get_mut(&self.identity) {
            Some(mut slot) if matches!(*slot, Slot::Reserved) => {
                *slot = Slot::Live(registration);
                Ok(())
            }
            _ => Err(registration)
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.entries.remove_if(&self.identity, |_, slot| matches!(slot, Slot::Reserved));
        }
    }
}
