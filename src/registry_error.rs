use std::any::Any;
use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

/// Error type produced by collaborators (factories and resources).
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Shared form of a collaborator error.
///
/// A failed build is recorded once and handed to every caller that waited on
/// it, so the error has to be cheap to clone.
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Errors returned by [`Registry`](crate::Registry) operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// `close_all` has been called; the registry never hands out resources again.
    #[error("registry is closing")]
    Closing,

    /// No configuration was added for the requested name.
    #[error("configuration not found: {name}")]
    ConfigNotFound { name: String },

    /// The factory returned an error or panicked.
    #[error("failed to build resource {name}: {source}")]
    BuildFailed { name: String, source: SharedError },

    /// A build finished without publishing a resource or recording an error.
    ///
    /// This means the registry lost track of a build and should be reported as a bug.
    #[error("resource not created: {name}")]
    NotCreated { name: String },

    /// Releasing a cached resource during shutdown failed.
    #[error("failed to release resource {name}: {source}")]
    ReleaseFailed { name: String, source: SharedError },

    /// A bounded wait on another caller's build elapsed.
    ///
    /// The build itself keeps running and its result is still published.
    #[error("timed out waiting for resource {name}")]
    WaitTimeout { name: String },
}

impl RegistryError {
    pub(crate) fn build_failed(name: &str, source: BoxError) -> Self {
        RegistryError::BuildFailed {
            name: name.to_owned(),
            source: Arc::from(source),
        }
    }

    pub(crate) fn release_failed(name: &str, source: BoxError) -> Self {
        RegistryError::ReleaseFailed {
            name: name.to_owned(),
            source: Arc::from(source),
        }
    }

    /// Returns the resource name this error refers to, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            RegistryError::Closing => None,
            RegistryError::ConfigNotFound { name }
            | RegistryError::BuildFailed { name, .. }
            | RegistryError::NotCreated { name }
            | RegistryError::ReleaseFailed { name, .. }
            | RegistryError::WaitTimeout { name } => Some(name),
        }
    }

    /// Returns `true` for [`RegistryError::Closing`].
    pub fn is_closing(&self) -> bool {
        matches!(self, RegistryError::Closing)
    }
}

/// Turns a caught panic payload into an error a waiter can read.
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> BoxError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    };
    format!("factory panicked: {message}").into()
}
