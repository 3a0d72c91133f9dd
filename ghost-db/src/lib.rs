//! Async work registry and database-backend abstraction for the GHost core.
//!
//! The orchestrator only ever sees [`callable::CallableRegistry`] and
//! [`backend::DbBackend`]; it has no idea whether the backend is sqlite or
//! MySQL, and the registry has no idea what kind of work a callable
//! actually performs.

pub mod backend;
pub mod callable;
pub mod error;

pub use backend::{connect, DbBackend, DbConfig, DbKind, IpRange};
pub use callable::{Callable, CallableRegistry};
pub use error::{DbError, Result};
