//! Diagnostic observers for the injection pipeline.
//!
//! Observers receive one call per pipeline event. The pipeline already
//! logs through `tracing`; observers are for hosts that want their own
//! sink, counters or test assertions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DiError;
use crate::key::Key;

/// Observer of injection pipeline events.
///
/// Every method has an empty default. Calls are synchronous; keep them
/// cheap.
///
/// # Examples
///
/// ```
/// use ferrous_locator::{InjectionObserver, Key};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountCreated(AtomicUsize);
///
/// impl InjectionObserver for CountCreated {
///     fn service_created(&self, _service: &Key, _defining: &Key, _elapsed: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait InjectionObserver: Send + Sync {
    /// A declaration produced an instance.
    fn service_created(&self, _service: &Key, _defining: &Key, _elapsed: Duration) {}

    /// A declaration was skipped.
    fn service_failed(&self, _service: &Key, _defining: &Key, _error: &DiError) {}

    /// A lazy declaration was realized on demand.
    fn lazy_initialized(&self, _defining: &Key) {}

    /// A service received its dependencies through `init`.
    fn cross_injected(&self, _service: &Key, _arity: usize) {}

    /// A client received its arguments.
    fn client_assigned(&self, _client: &Key) {}

    /// The pipeline reached the ready state.
    fn services_ready(&self, _constructed: usize, _failed: usize) {}
}

/// Registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn InjectionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn InjectionObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn service_created(&self, service: &Key, defining: &Key, elapsed: Duration) {
        for observer in &self.observers {
            observer.service_created(service, defining, elapsed);
        }
    }

    pub(crate) fn service_failed(&self, service: &Key, defining: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.service_failed(service, defining, error);
        }
    }

    pub(crate) fn lazy_initialized(&self, defining: &Key) {
        for observer in &self.observers {
            observer.lazy_initialized(defining);
        }
    }

    pub(crate) fn cross_injected(&self, service: &Key, arity: usize) {
        for observer in &self.observers {
            observer.cross_injected(service, arity);
        }
    }

    pub(crate) fn client_assigned(&self, client: &Key) {
        for observer in &self.observers {
            observer.client_assigned(client);
        }
    }

    pub(crate) fn services_ready(&self, constructed: usize, failed: usize) {
        for observer in &self.observers {
            observer.services_ready(constructed, failed);
        }
    }
}

/// Observer that re-emits every event as a `tracing` event under its own
/// target, so hosts can filter pipeline chatter separately.
pub struct TracingObserver {
    prefix: String,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self { prefix: "[ferrous-locator]".to_string() }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectionObserver for TracingObserver {
    fn service_created(&self, service: &Key, defining: &Key, elapsed: Duration) {
        debug!(
            target: "ferrous_locator::observer",
            service = service.display_name(),
            defining_type = defining.display_name(),
            elapsed_us = elapsed.as_micros() as u64,
            "{} created",
            self.prefix
        );
    }

    fn service_failed(&self, service: &Key, defining: &Key, error: &DiError) {
        warn!(
            target: "ferrous_locator::observer",
            service = service.display_name(),
            defining_type = defining.display_name(),
            reason = %error,
            "{} skipped",
            self.prefix
        );
    }

    fn lazy_initialized(&self, defining: &Key) {
        debug!(
            target: "ferrous_locator::observer",
            defining_type = defining.display_name(),
            "{} lazily initialized",
            self.prefix
        );
    }

    fn cross_injected(&self, service: &Key, arity: usize) {
        debug!(
            target: "ferrous_locator::observer",
            service = service.display_name(),
            arity,
            "{} initialized with services",
            self.prefix
        );
    }

    fn client_assigned(&self, client: &Key) {
        debug!(
            target: "ferrous_locator::observer",
            client = client.display_name(),
            "{} client arguments assigned",
            self.prefix
        );
    }

    fn services_ready(&self, constructed: usize, failed: usize) {
        debug!(
            target: "ferrous_locator::observer",
            constructed,
            failed,
            "{} services ready",
            self.prefix
        );
    }
}

/// Counting observer.
#[derive(Default)]
pub struct MetricsObserver {
    created: AtomicU64,
    failed: AtomicU64,
    lazy: AtomicU64,
    cross_injected: AtomicU64,
    clients: AtomicU64,
    creation_nanos: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn lazy_count(&self) -> u64 {
        self.lazy.load(Ordering::Relaxed)
    }

    pub fn cross_injected_count(&self) -> u64 {
        self.cross_injected.load(Ordering::Relaxed)
    }

    pub fn client_count(&self) -> u64 {
        self.clients.load(Ordering::Relaxed)
    }

    /// Average time spent producing one instance.
    pub fn average_creation_time(&self) -> Option<Duration> {
        let count = self.created_count();
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.creation_nanos.load(Ordering::Relaxed) / count))
    }

    pub fn reset(&self) {
        for counter in [
            &self.created,
            &self.failed,
            &self.lazy,
            &self.cross_injected,
            &self.clients,
            &self.creation_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl InjectionObserver for MetricsObserver {
    fn service_created(&self, _service: &Key, _defining: &Key, elapsed: Duration) {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.creation_nanos.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    fn service_failed(&self, _service: &Key, _defining: &Key, _error: &DiError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn lazy_initialized(&self, _defining: &Key) {
        self.lazy.fetch_add(1, Ordering::Relaxed);
    }

    fn cross_injected(&self, _service: &Key, _arity: usize) {
        self.cross_injected.fetch_add(1, Ordering::Relaxed);
    }

    fn client_assigned(&self, _client: &Key) {
        self.clients.fetch_add(1, Ordering::Relaxed);
    }
}
