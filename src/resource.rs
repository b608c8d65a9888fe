//! Collaborator contracts: what the registry builds and how it builds it.

use crate::BoxError;

/// A long-lived value owned by a registry, such as a connection pool.
///
/// Cached resources are shared as `Arc<R>`, so callers may still hold a handle
/// when the registry releases it. `release` must therefore be idempotent and
/// leave the resource in a state where further use fails cleanly.
///
/// # Examples
///
/// ```rust
/// use resource_registry::{BoxError, Resource};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Pool {
///     open: AtomicBool,
/// }
///
/// impl Resource for Pool {
///     fn release(&self) -> Result<(), BoxError> {
///         self.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Resource: Send + Sync + 'static {
    /// Releases whatever the resource holds (sockets, file handles, threads).
    fn release(&self) -> Result<(), BoxError>;
}

/// Builds a resource from its configuration.
///
/// The registry calls `build` without holding any internal lock, possibly from
/// several threads at once for different names. A factory must not call back
/// into the same registry for the name it is building; that caller would wait
/// on its own build forever.
///
/// Every `Fn(&C) -> Result<R, BoxError> + Send + Sync` closure is a factory.
pub trait Factory<C, R>: Send + Sync {
    fn build(&self, config: &C) -> Result<R, BoxError>;
}

impl<C, R, F> Factory<C, R> for F
where
    F: Fn(&C) -> Result<R, BoxError> + Send + Sync,
{
    fn build(&self, config: &C) -> Result<R, BoxError> {
        self(config)
    }
}
