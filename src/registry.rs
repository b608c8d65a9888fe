//! A thread-safe registry of named resources that are built lazily, at most once
//! per name, and released together on shutdown.
//!
//! # Examples
//!
//! ```
//! use resource_registry::{BoxError, Registry, Resource};
//!
//! struct Pool {
//!     url: String,
//! }
//!
//! impl Resource for Pool {
//!     fn release(&self) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! let registry = Registry::new(|url: &String| -> Result<Pool, BoxError> {
//!     Ok(Pool { url: url.clone() })
//! });
//!
//! registry.add_default("postgres://localhost/app".to_string());
//!
//! let pool = registry.get_default().unwrap();
//! assert_eq!(pool.url, "postgres://localhost/app");
//!
//! registry.close_all().unwrap();
//! assert!(registry.get_default().is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::registry_error::panic_error;
use crate::ticket::Ticket;
use crate::{Factory, RegistryError, RegistryEvent, Resource};

/// Name used by [`Registry::add_default`] and [`Registry::get_default`].
pub const DEFAULT_NAME: &str = "default";

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `RegistryEvent` every time the registry is
/// interacted with. It must be thread-safe because the registry itself is shared.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

struct State<C, R> {
    configs: HashMap<String, Arc<C>>,
    clients: HashMap<String, Arc<R>>,
    inflight: HashMap<String, Arc<Ticket>>,
    errors: HashMap<String, RegistryError>,
    /// Release failures of resources built after shutdown began, reported by `close_all`.
    discard_errors: Vec<RegistryError>,
    closing: bool,
}

impl<C, R> Default for State<C, R> {
    fn default() -> Self {
        Self {
            configs: HashMap::new(),
            clients: HashMap::new(),
            inflight: HashMap::new(),
            errors: HashMap::new(),
            discard_errors: Vec::new(),
            closing: false,
        }
    }
}

/// Where `get` found (or did not find) the resource on the optimistic path.
enum Lookup<R> {
    Cached(Arc<R>),
    Pending(Arc<Ticket>),
}

/// Registry of lazily built resources keyed by name.
///
/// - `add` stores the configuration for a name; nothing is built yet.
/// - The first `get` for a name calls the factory. Concurrent callers for the same
///   name wait for that single build and all observe its outcome.
/// - A successful build is cached; later `get` calls return the same `Arc<R>`.
/// - `close_all` closes the registry for good: in-flight builds are drained and
///   discarded, cached resources are released, every later `get` fails with
///   [`RegistryError::Closing`].
///
/// The factory and [`Resource::release`] are always called with no internal lock
/// held, so a slow build for one name never blocks other names.
///
/// Overwriting a configuration with `add` does not rebuild a resource that is
/// already cached; the new configuration only applies to builds that start later.
pub struct Registry<C, R> {
    state: RwLock<State<C, R>>,
    factory: Box<dyn Factory<C, R>>,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

impl<C, R> Registry<C, R>
where
    C: Send + Sync + 'static,
    R: Resource,
{
    /// Creates an empty registry that builds resources with `factory`.
    ///
    /// # Examples
    ///
    /// ```
    /// use resource_registry::{BoxError, Registry, Resource};
    ///
    /// struct Handle(u32);
    ///
    /// impl Resource for Handle {
    ///     fn release(&self) -> Result<(), BoxError> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let registry = Registry::new(|id: &u32| -> Result<Handle, BoxError> { Ok(Handle(*id)) });
    /// registry.add("primary", 1);
    /// assert_eq!(registry.get("primary").unwrap().0, 1);
    /// ```
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&C) -> Result<R, crate::BoxError> + Send + Sync + 'static,
    {
        Self::with_factory(factory)
    }

    /// Creates an empty registry from any [`Factory`] implementation.
    pub fn with_factory(factory: impl Factory<C, R> + 'static) -> Self {
        Self {
            state: RwLock::new(State::default()),
            factory: Box::new(factory),
            trace: Mutex::new(None),
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Sets a tracing callback that will be invoked on every registry interaction.
    ///
    /// The callback is called without the registry's state lock held, so it may
    /// call back into the registry.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        *self.trace.lock() = Some(Arc::new(callback));
    }

    /// Clears the tracing callback (disables registry tracing).
    pub fn clear_trace_callback(&self) {
        *self.trace.lock() = None;
    }

    fn emit_event(&self, event: RegistryEvent) {
        let callback = self.trace.lock().clone();
        if let Some(callback) = callback {
            callback(&event);
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------------------------------

    /// Stores the configuration for `name`, replacing any previous one.
    ///
    /// Only builds that start afterwards see the new configuration. A resource that
    /// is already cached, or a build that is already running, is not affected.
    pub fn add(&self, name: impl Into<String>, config: C) {
        let name = name.into();
        self.state
            .write()
            .configs
            .insert(name.clone(), Arc::new(config));

        self.emit_event(RegistryEvent::Add { name });
    }

    /// Stores the configuration for [`DEFAULT_NAME`].
    pub fn add_default(&self, config: C) {
        self.add(DEFAULT_NAME, config);
    }

    /// Returns `true` once [`close_all`](Self::close_all) has been called.
    pub fn is_closing(&self) -> bool {
        self.state.read().closing
    }

    /// Returns the resource for `name`, building it on first use.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Closing`] if shutdown has begun, including when it began
    ///   while this call was waiting or building
    /// - [`RegistryError::ConfigNotFound`] if no configuration was added for `name`
    /// - [`RegistryError::BuildFailed`] if the factory failed or panicked; every caller
    ///   that waited on the same build gets the same error
    pub fn get(&self, name: &str) -> Result<Arc<R>, RegistryError> {
        self.get_inner(name, None)
    }

    /// Returns the resource for [`DEFAULT_NAME`].
    pub fn get_default(&self) -> Result<Arc<R>, RegistryError> {
        self.get(DEFAULT_NAME)
    }

    /// Like [`get`](Self::get), but gives up waiting on another caller's build after
    /// `timeout` with [`RegistryError::WaitTimeout`].
    ///
    /// Giving up does not cancel the build: it still completes and, unless the
    /// registry is closing, is cached for later callers. When this call is the one
    /// that runs the factory, the timeout does not apply.
    pub fn get_timeout(&self, name: &str, timeout: Duration) -> Result<Arc<R>, RegistryError> {
        self.get_inner(name, Some(timeout))
    }

    fn get_inner(&self, name: &str, timeout: Option<Duration>) -> Result<Arc<R>, RegistryError> {
        // Optimistic path under the shared lock.
        let lookup = {
            let state = self.state.read();
            if state.closing {
                return Err(RegistryError::Closing);
            }
            if let Some(resource) = state.clients.get(name) {
                Some(Lookup::Cached(resource.clone()))
            } else {
                state
                    .inflight
                    .get(name)
                    .map(|ticket| Lookup::Pending(ticket.clone()))
            }
        };

        match lookup {
            Some(Lookup::Cached(resource)) => return Ok(self.hit(name, resource)),
            Some(Lookup::Pending(ticket)) => return self.join(name, &ticket, timeout),
            None => {}
        }

        // Nothing was there a moment ago. Re-check everything under the exclusive
        // lock: another caller may have claimed the name in between.
        let (ticket, config) = {
            let mut state = self.state.write();
            if state.closing {
                return Err(RegistryError::Closing);
            }
            if let Some(resource) = state.clients.get(name) {
                let resource = resource.clone();
                drop(state);
                return Ok(self.hit(name, resource));
            }
            if let Some(ticket) = state.inflight.get(name) {
                let ticket = ticket.clone();
                drop(state);
                return self.join(name, &ticket, timeout);
            }

            let config = match state.configs.get(name) {
                Some(config) => config.clone(),
                None => {
                    return Err(RegistryError::ConfigNotFound {
                        name: name.to_owned(),
                    })
                }
            };

            let ticket = Arc::new(Ticket::new());
            state.inflight.insert(name.to_owned(), ticket.clone());
            (ticket, config)
        };

        self.build(name, &ticket, &config)
    }

    fn hit(&self, name: &str, resource: Arc<R>) -> Arc<R> {
        trace!(resource = name, "resource cache hit");
        self.emit_event(RegistryEvent::Hit {
            name: name.to_owned(),
        });
        resource
    }

    /// Waits for a build started by another caller and reads its outcome.
    fn join(
        &self,
        name: &str,
        ticket: &Ticket,
        timeout: Option<Duration>,
    ) -> Result<Arc<R>, RegistryError> {
        trace!(resource = name, "waiting for in-flight build");
        self.emit_event(RegistryEvent::Wait {
            name: name.to_owned(),
        });

        match timeout {
            Some(timeout) => {
                if !ticket.wait_for(timeout) {
                    return Err(RegistryError::WaitTimeout {
                        name: name.to_owned(),
                    });
                }
            }
            None => ticket.wait(),
        }

        let state = self.state.read();
        if state.closing {
            return Err(RegistryError::Closing);
        }
        if let Some(err) = state.errors.get(name) {
            return Err(err.clone());
        }
        match state.clients.get(name) {
            Some(resource) => Ok(resource.clone()),
            None => Err(RegistryError::NotCreated {
                name: name.to_owned(),
            }),
        }
    }

    /// Runs the factory with no lock held, then publishes or discards the result
    /// and releases every waiter.
    fn build(&self, name: &str, ticket: &Ticket, config: &C) -> Result<Arc<R>, RegistryError> {
        let mut flight = Flight {
            registry: self,
            name,
            ticket,
            landed: false,
        };

        debug!(resource = name, "building resource");
        self.emit_event(RegistryEvent::Build {
            name: name.to_owned(),
        });

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.factory.build(config))) {
            Ok(Ok(resource)) => Ok(resource),
            Ok(Err(source)) => Err(RegistryError::build_failed(name, source)),
            Err(payload) => Err(RegistryError::build_failed(name, panic_error(payload))),
        };

        let mut discarded = None;
        let result = {
            let mut state = self.state.write();
            let result = if state.closing {
                discarded = outcome.ok();
                Err(RegistryError::Closing)
            } else {
                outcome.map(|resource| {
                    let resource = Arc::new(resource);
                    state.clients.insert(name.to_owned(), resource.clone());
                    state.errors.remove(name);
                    resource
                })
            };

            if let Err(err) = &result {
                state.errors.insert(name.to_owned(), err.clone());
            }
            state.inflight.remove(name);
            flight.landed = true;
            result
        };

        // The ticket stays unresolved until the discarded resource is released,
        // so close_all cannot return while it is still open.
        if let Some(resource) = discarded {
            debug!(resource = name, "registry closing, releasing freshly built resource");
            if let Err(source) = resource.release() {
                debug!(resource = name, error = %source, "failed to release resource built during shutdown");
                self.state
                    .write()
                    .discard_errors
                    .push(RegistryError::release_failed(name, source));
            }
            self.emit_event(RegistryEvent::Discard {
                name: name.to_owned(),
            });
        }
        drop(flight);

        match &result {
            Ok(_) => debug!(resource = name, "resource built"),
            Err(err) => debug!(resource = name, error = %err, "resource build did not publish"),
        }
        self.emit_event(RegistryEvent::Built {
            name: name.to_owned(),
            ok: result.is_ok(),
        });

        result
    }

    /// Closes the registry and releases every cached resource.
    ///
    /// 1. Marks the registry as closing, so no build can publish from now on.
    /// 2. Waits for builds that were already running; their results are discarded.
    /// 3. Takes all cached resources out of the registry.
    /// 4. Releases them (in name order), continuing past failures.
    ///
    /// Configurations are kept. The registry stays closed: every later `get` fails
    /// with [`RegistryError::Closing`]. Calling `close_all` again is harmless and
    /// returns `Ok(())` since nothing is left to release.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError::ReleaseFailed`] encountered. Failures to
    /// release resources that finished building after shutdown began come first.
    pub fn close_all(&self) -> Result<(), RegistryError> {
        let pending: Vec<Arc<Ticket>> = {
            let mut state = self.state.write();
            state.closing = true;
            state.inflight.values().cloned().collect()
        };

        debug!(in_flight = pending.len(), "registry closing");
        for ticket in &pending {
            ticket.wait();
        }

        let (mut clients, discard_errors) = {
            let mut state = self.state.write();
            state.errors.clear();
            let clients: Vec<(String, Arc<R>)> = state.clients.drain().collect();
            (clients, std::mem::take(&mut state.discard_errors))
        };
        clients.sort_by(|a, b| a.0.cmp(&b.0));

        let released = clients.len();
        let mut first_err = discard_errors.into_iter().next();
        for (name, resource) in clients {
            if let Err(source) = resource.release() {
                debug!(resource = %name, error = %source, "failed to release resource");
                if first_err.is_none() {
                    first_err = Some(RegistryError::release_failed(&name, source));
                }
            }
        }

        debug!(released, "registry closed");
        self.emit_event(RegistryEvent::Close { released });

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<C, R> fmt::Debug for Registry<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("configs", &state.configs.len())
            .field("clients", &state.clients.len())
            .field("inflight", &state.inflight.len())
            .field("closing", &state.closing)
            .finish()
    }
}

/// Resolves an in-flight ticket when dropped.
///
/// Once the build has recorded its outcome (`landed`), dropping only fires the
/// ticket, even if a later `release` or trace callback panics. If the build
/// unwinds before that, the drop also records an error and removes the ticket.
/// Either way waiters and `close_all` are never stranded.
struct Flight<'a, C, R> {
    registry: &'a Registry<C, R>,
    name: &'a str,
    ticket: &'a Ticket,
    landed: bool,
}

impl<C, R> Drop for Flight<'_, C, R> {
    fn drop(&mut self) {
        if !self.landed {
            let mut state = self.registry.state.write();
            let err = if state.closing {
                RegistryError::Closing
            } else {
                RegistryError::build_failed(self.name, "build aborted before completion".into())
            };
            state.errors.insert(self.name.to_owned(), err);
            state.inflight.remove(self.name);
        }
        self.ticket.complete();
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
