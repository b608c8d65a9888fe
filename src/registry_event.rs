/// Events emitted by a registry during operations.
///
/// These events are passed to the tracing callback set via
/// [`Registry::set_trace_callback`](crate::Registry::set_trace_callback).
/// The callback is never invoked while the registry's state lock is held.
///
/// # Examples
///
/// ```rust
/// use resource_registry::RegistryEvent;
///
/// let event = RegistryEvent::Add { name: "default".to_string() };
/// assert_eq!(event.to_string(), "add { name: default }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A configuration was stored (or overwritten).
    Add { name: String },

    /// A cached resource was returned.
    Hit { name: String },

    /// The caller joined a build started by another caller.
    Wait { name: String },

    /// The caller became the builder and is about to invoke the factory.
    Build { name: String },

    /// A build finished and its outcome was recorded.
    Built {
        name: String,
        /// Whether a resource was published to the cache.
        ok: bool,
    },

    /// A resource built after shutdown began was released instead of published.
    Discard { name: String },

    /// `close_all` finished releasing cached resources.
    Close {
        /// Number of resources whose release was attempted.
        released: usize,
    },
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Add { name } => write!(f, "add {{ name: {name} }}"),
            RegistryEvent::Hit { name } => write!(f, "hit {{ name: {name} }}"),
            RegistryEvent::Wait { name } => write!(f, "wait {{ name: {name} }}"),
            RegistryEvent::Build { name } => write!(f, "build {{ name: {name} }}"),
            RegistryEvent::Built { name, ok } => {
                write!(f, "built {{ name: {name}, ok: {ok} }}")
            }
            RegistryEvent::Discard { name } => write!(f, "discard {{ name: {name} }}"),
            RegistryEvent::Close { released } => {
                write!(f, "close {{ released: {released} }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_event_display() {
        let event = RegistryEvent::Add {
            name: "db".to_string(),
        };
        assert_eq!(event.to_string(), "add { name: db }");

        let event = RegistryEvent::Built {
            name: "db".to_string(),
            ok: false,
        };
        assert_eq!(event.to_string(), "built { name: db, ok: false }");

        let event = RegistryEvent::Close { released: 3 };
        assert_eq!(event.to_string(), "close { released: 3 }");
    }

    #[test]
    fn test_registry_event_clone() {
        let event = RegistryEvent::Wait {
            name: "cache".to_string(),
        };
        let cloned = event.clone();
        assert_eq!(event, cloned);
    }
}
