//! Actor hosting layer
//!
//! This module implements an Akka-style supervision tree using Ractor:
//! a Guardian root, pool routers, and supervised instances wrapping user
//! behaviors.

pub mod behavior;
pub mod factory;
pub mod guardian;
pub mod message;
pub mod pool;
pub mod worker;

pub use behavior::*;
pub use factory::*;
pub use guardian::*;
pub use message::*;
pub use pool::*;
pub use worker::*;
