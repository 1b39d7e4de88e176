//! Broadcast subscriptions
//!
//! Maps a message type to the identities that want it. Delivery resolves each
//! identity through the registry at publish time, so a subscription may be
//! declared before its actor is registered.

use std::{any::Any, fmt::Debug};

use dashmap::DashMap;
use tracing::{Level, event};

use crate::{
    actor::ActorBehavior,
    domain::{
        constant::registry as registry_events,
        identity::{ActorIdentity, MessageTag}
    },
    runtime::registry::ActorRegistry
};

type DeliverFn = fn(&ActorRegistry, &ActorIdentity, &dyn Any) -> bool;

struct Subscriber {
    identity: ActorIdentity,
    deliver:  DeliverFn
}

/// Message type -> subscribed identities
#[derive(Default)]
pub struct SubscriptionTable {
    topics: DashMap<MessageTag, Vec<Subscriber>>
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `identity` (an `A` actor) to broadcasts of `M`
    ///
    /// Returns false when the pair was already subscribed.
    pub fn subscribe<A, M>(&self, identity: &ActorIdentity) -> bool
    where
        A: ActorBehavior,
        A::Msg: From<M>,
        M: Any + Clone + Send
    {
        let tag = MessageTag::of::<M>();
        let mut subscribers = self.topics.entry(tag).or_default();

        if subscribers.iter().any(|subscriber| &subscriber.identity == identity) {
            return false;
        }

        subscribers.push(Subscriber { identity: identity.clone(), deliver: deliver::<A, M> });
        event!(Level::DEBUG, event = registry_events::SUBSCRIPTION_ADDED, actor = %identity, message = %tag);
        true
    }

    /// Identities subscribed to `M`
    pub fn subscribers<M: Any>(&self) -> Vec<ActorIdentity> {
        self.topics
            .get(&MessageTag::of::<M>())
            .map(|subscribers| subscribers.iter().map(|subscriber| subscriber.identity.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliver one copy of `message` to every subscriber; returns how many accepted it
    pub fn publish<M>(&self, registry: &ActorRegistry, message: &M) -> usize
    where
        M: Any + Debug
    {
        let targets: Vec<(ActorIdentity, DeliverFn)> = match self.topics.get(&MessageTag::of::<M>()) {
            Some(subscribers) => subscribers.iter().map(|s| (s.identity.clone(), s.deliver)).collect(),
            None => return 0
        };

        targets.iter().filter(|(identity, deliver)| deliver(registry, identity, message)).count()
    }

    pub fn clear(&self) {
        self.topics.clear();
    }
}

fn deliver<A, M>(registry: &ActorRegistry, identity: &ActorIdentity, message: &dyn Any) -> bool
where
    A: ActorBehavior,
    A::Msg: From<M>,
    M: Any + Clone + Send
{
    let Some(message) = message.downcast_ref::<M>() else {
        return false;
    };

    match registry.lookup::<A>(identity) {
        Ok(handle) => handle.tell(A::Msg::from(message.clone())).is_ok(),
        Err(_) => false
    }
}
