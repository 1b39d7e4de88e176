//! Actor identities and message tags
//!
//! An identity is the `(logical name, type tag)` pair the registry is keyed by.
//! Both halves are trimmed and lowercased so that `" Billing "` and `"billing"`
//! address the same actor.

use std::{
    any::{TypeId, type_name},
    fmt,
    hash::{Hash, Hasher}
};

use uuid::Uuid;

/// Registry key for a single actor or a pool front
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorIdentity {
    name:     String,
    type_tag: String
}

impl ActorIdentity {
    /// Build an identity; an empty or missing name falls back to the type tag
    pub fn new(type_tag: &str, name: Option<&str>) -> Self {
        let type_tag = normalize(type_tag);
        let name = match name.map(normalize) {
            Some(name) if !name.is_empty() => name,
            _ => type_tag.clone()
        };

        Self { name, type_tag }
    }

    /// Default identity of an actor type
    pub fn of<A: crate::actor::ActorBehavior>() -> Self {
        Self::new(A::type_tag(), None)
    }

    /// Named identity of an actor type
    pub fn named<A: crate::actor::ActorBehavior>(name: &str) -> Self {
        Self::new(A::type_tag(), Some(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Whether the logical name was given explicitly
    pub fn has_explicit_name(&self) -> bool {
        self.name != self.type_tag
    }
}

impl fmt::Display for ActorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.type_tag)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Collision-free instance name: `{prefix}-{typetag}[-{name}]-{suffix}`
pub fn instance_name(prefix: &str, identity: &ActorIdentity) -> String {
    let suffix = Uuid::new_v4().simple();

    if identity.has_explicit_name() {
        format!("{}-{}-{}-{}", prefix, identity.type_tag(), identity.name(), suffix)
    } else {
        format!("{}-{}-{}", prefix, identity.type_tag(), suffix)
    }
}

/// Short Rust type name with module path and generic arguments stripped
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Broadcast topic key: the concrete Rust type of a message
#[derive(Debug, Clone, Copy)]
pub struct MessageTag {
    id:   TypeId,
    name: &'static str
}

impl MessageTag {
    pub fn of<M: 'static>() -> Self {
        Self { id: TypeId::of::<M>(), name: short_type_name::<M>() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageTag {}

impl Hash for MessageTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invoice;
    struct Receipt;

    #[test]
    fn test_name_defaults_to_type_tag() {
        let identity = ActorIdentity::new("Billing", None);
        assert_eq!(identity.name(), "billing");
        assert_eq!(identity.type_tag(), "billing");
        assert!(!identity.has_explicit_name());

        let blank = ActorIdentity::new("Billing", Some("   "));
        assert_eq!(blank, identity);
    }

    #[test]
    fn test_identity_is_trimmed_and_case_normalized() {
        let a = ActorIdentity::new("Billing", Some("  EU-West "));
        let b = ActorIdentity::new("billing", Some("eu-west"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "eu-west_billing");
    }

    #[test]
    fn test_instance_names_are_unique() {
        let identity = ActorIdentity::new("Billing", Some("eu"));
        let first = instance_name("host", &identity);
        let second = instance_name("host", &identity);

        assert!(first.starts_with("host-billing-eu-"));
        assert_ne!(first, second);

        let unnamed = instance_name("host", &ActorIdentity::new("Billing", None));
        assert!(unnamed.starts_with("host-billing-"));
        assert!(!unnamed.contains("billing-billing"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Invoice>(), "Invoice");
        assert_eq!(short_type_name::<Vec<Invoice>>(), "Vec");
    }

    #[test]
    fn test_message_tag_equality_follows_type() {
        assert_eq!(MessageTag::of::<Invoice>(), MessageTag::of::<Invoice>());
        assert_ne!(MessageTag::of::<Invoice>(), MessageTag::of::<Receipt>());
        assert_eq!(MessageTag::of::<Receipt>().name(), "Receipt");
    }
}
