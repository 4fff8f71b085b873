//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (NodeStore) but are themselves
//! concrete structs, not traits.

mod locks;
mod response;

pub use locks::ResponseLocks;
pub use response::ResponseTreeService;
