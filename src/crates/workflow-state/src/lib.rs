//! Key/value state store with TTL and atomic counters (§4.C1).
//!
//! Two interchangeable backends implement [`StateStore`]:
//! [`memory::InProcessStore`] for dev/test and [`redis_store::RedisStore`]
//! for staging/production. [`keys`] centralizes the reserved key layout from
//! §6 that the executor and emergency controller write to.

pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{Result, StateError};
pub use memory::InProcessStore;
pub use redis_store::RedisStore;
pub use store::StateStore;
