//! # Resource Registry
//!
//! A thread-safe registry of named, expensive, long-lived resources (connection
//! pools, clients, handles) that are built lazily on first use.
//!
//! - **Single-flight**: concurrent requests for the same name collapse into one
//!   factory call; every caller observes the same resource or the same error.
//! - **Cached**: once built, a resource is shared as `Arc<R>` until shutdown.
//! - **Race-free shutdown**: [`Registry::close_all`] stops new builds, drains the
//!   ones in flight, then releases every cached resource.
//!
//! ## Quick Start
//!
//! ```rust
//! use resource_registry::{BoxError, Registry, Resource};
//!
//! struct Pool {
//!     dsn: String,
//! }
//!
//! impl Resource for Pool {
//!     fn release(&self) -> Result<(), BoxError> {
//!         // close sockets here
//!         Ok(())
//!     }
//! }
//!
//! let registry = Registry::new(|dsn: &String| -> Result<Pool, BoxError> {
//!     Ok(Pool { dsn: dsn.clone() })
//! });
//!
//! registry.add_default("host=localhost dbname=app".to_string());
//! registry.add("reporting", "host=replica dbname=app".to_string());
//!
//! let main = registry.get_default().unwrap();
//! let reporting = registry.get("reporting").unwrap();
//! assert_ne!(main.dsn, reporting.dsn);
//!
//! registry.close_all().unwrap();
//! assert!(registry.is_closing());
//! ```
//!
//! ## Main Types
//!
//! - [`Registry`] - the registry itself
//! - [`Resource`] - what a registry stores; must be releasable
//! - [`Factory`] - how a registry builds a resource from its configuration
//! - [`RegistryError`] - everything that can go wrong
//! - [`RegistryEvent`] - events passed to the optional trace callback
//! - [`define_registry!`] - declares a process-wide registry with free functions

mod macros;
mod registry;
mod registry_error;
mod registry_event;
mod resource;
mod ticket;

// Re-export the main public API
pub use registry::{Registry, TraceCallback, DEFAULT_NAME};
pub use registry_error::{BoxError, RegistryError, SharedError};
pub use registry_event::RegistryEvent;
pub use resource::{Factory, Resource};
