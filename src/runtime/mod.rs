//! Runtime: registry, subscriptions, handles and the lifecycle object tying
//! them to the Guardian

pub mod handle;
pub mod registry;
pub mod subscription;
pub mod system;

pub use handle::ActorHandle;
pub use registry::{ActorRegistry, Registration};
pub use subscription::SubscriptionTable;
pub use system::{ActorRuntime, ActorSpec, RuntimeBuilder};
