//! Macros for declaring process-wide registries.

/// Declares a process-wide registry together with free functions to reach it.
///
/// `define_registry!(name: Config => Resource, factory)` generates `pub mod name`
/// containing a lazily created static [`Registry`](crate::Registry) and functions
/// that delegate to it:
///
/// - `registry()` returns the `&'static Registry<Config, Resource>`
/// - `add`, `add_default`, `get`, `get_default`, `get_timeout`
/// - `is_closing`, `close_all`
/// - `set_trace_callback`, `clear_trace_callback`
///
/// The configuration type, resource type and factory are resolved from the module
/// the macro is invoked in, so they must be module-level items (not locals of a
/// function body).
///
/// # Examples
///
/// ```rust
/// use resource_registry::{define_registry, BoxError, Resource};
///
/// pub struct Pool {
///     pub dsn: String,
/// }
///
/// impl Resource for Pool {
///     fn release(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// fn open_pool(dsn: &String) -> Result<Pool, BoxError> {
///     Ok(Pool { dsn: dsn.clone() })
/// }
///
/// define_registry!(postgres: String => Pool, open_pool);
///
/// fn main() {
///     postgres::add_default("host=localhost dbname=app".to_string());
///     let pool = postgres::get_default().unwrap();
///     assert_eq!(pool.dsn, "host=localhost dbname=app");
/// }
/// ```
///
/// # Multiple Registries
///
/// Every invocation owns its own registry:
///
/// ```rust
/// use resource_registry::{define_registry, BoxError, Resource};
///
/// pub struct Client(pub String);
///
/// impl Resource for Client {
///     fn release(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// fn connect(url: &String) -> Result<Client, BoxError> {
///     Ok(Client(url.clone()))
/// }
///
/// define_registry!(primary: String => Client, connect);
/// define_registry!(analytics: String => Client, connect);
///
/// fn main() {
///     primary::add_default("postgres://primary".to_string());
///
///     assert!(primary::get_default().is_ok());
///     assert!(analytics::get_default().is_err());
/// }
/// ```
#[macro_export]
macro_rules! define_registry {
    ($name:ident: $config:ty => $resource:ty, $factory:expr) => {
        pub mod $name {
            #[allow(unused_imports)]
            use super::*;

            use std::sync::{Arc, LazyLock};
            use std::time::Duration;

            static REGISTRY: LazyLock<$crate::Registry<$config, $resource>> =
                LazyLock::new(|| $crate::Registry::with_factory($factory));

            /// The registry behind the free functions of this module.
            pub fn registry() -> &'static $crate::Registry<$config, $resource> {
                &REGISTRY
            }

            /// Store the configuration for `name`.
            pub fn add(name: impl Into<String>, config: $config) {
                REGISTRY.add(name, config)
            }

            /// Store the configuration for the default name.
            pub fn add_default(config: $config) {
                REGISTRY.add_default(config)
            }

            /// Return the resource for `name`, building it on first use.
            pub fn get(name: &str) -> Result<Arc<$resource>, $crate::RegistryError> {
                REGISTRY.get(name)
            }

            /// Return the resource for the default name.
            pub fn get_default() -> Result<Arc<$resource>, $crate::RegistryError> {
                REGISTRY.get_default()
            }

            /// Return the resource for `name`, waiting at most `timeout` on another caller's build.
            pub fn get_timeout(
                name: &str,
                timeout: Duration,
            ) -> Result<Arc<$resource>, $crate::RegistryError> {
                REGISTRY.get_timeout(name, timeout)
            }

            /// Whether `close_all` has been called.
            pub fn is_closing() -> bool {
                REGISTRY.is_closing()
            }

            /// Close the registry and release every cached resource.
            pub fn close_all() -> Result<(), $crate::RegistryError> {
                REGISTRY.close_all()
            }

            /// Set a tracing callback for registry operations.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::RegistryEvent) + Send + Sync + 'static,
            ) {
                REGISTRY.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                REGISTRY.clear_trace_callback()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{BoxError, RegistryError, Resource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    pub struct Token {
        pub secret: String,
        pub released: AtomicUsize,
    }

    impl Resource for Token {
        fn release(&self) -> Result<(), BoxError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn issue(secret: &String) -> Result<Token, BoxError> {
        if secret.is_empty() {
            return Err("empty secret".into());
        }
        Ok(Token {
            secret: secret.clone(),
            released: AtomicUsize::new(0),
        })
    }

    define_registry!(tokens: String => Token, issue);
    define_registry!(other_tokens: String => Token, issue);
    define_registry!(closures: u32 => Token, |n: &u32| -> Result<Token, BoxError> {
        Ok(Token {
            secret: n.to_string(),
            released: AtomicUsize::new(0),
        })
    });

    #[test]
    fn test_define_registry_macro() {
        tokens::add("api", "s3cr3t".to_string());

        let token: Arc<Token> = tokens::get("api").unwrap();
        assert_eq!(token.secret, "s3cr3t");
        assert!(Arc::ptr_eq(&token, &tokens::get("api").unwrap()));
        assert!(!tokens::is_closing());
    }

    #[test]
    fn test_multiple_registries() {
        other_tokens::add_default("only-here".to_string());

        assert!(other_tokens::get_default().is_ok());
        assert!(matches!(
            tokens::registry().get("only-here"),
            Err(RegistryError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_closure_factory() {
        closures::add("seven", 7);
        assert_eq!(closures::get("seven").unwrap().secret, "7");

        let token = closures::get("seven").unwrap();
        closures::close_all().unwrap();
        assert_eq!(token.released.load(Ordering::SeqCst), 1);
        assert!(closures::is_closing());
        assert!(closures::get("seven").unwrap_err().is_closing());
    }
}
