//! Connection management
//!
//! Live connection handles and the per-user connection registry.

mod handle;
mod registry;

pub use handle::{ConnectionHandle, ConnectionState};
pub use registry::{ConnectionRegistry, RegistryEvent};
