//! The service container and its resolution API.
//!
//! A [`ServiceContainer`] owns every piece of process-wide state the
//! pipeline needs: realized instances, the lazy index, global slots, the
//! scoped registry and the client argument store. It is created from a
//! [`ServiceManifest`] and cloned cheaply (it uses `Arc` internally).

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::assets::{AssetLoader, AssetStore};
use crate::collection::ServiceManifest;
use crate::config::InjectorOptions;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::global::GlobalServices;
use crate::graph::{NodeId, ObjectGraph, SceneGraph};
use crate::init_args::InitArgs;
use crate::injector::{CrossInjection, InjectorState, Lifecycle};
use crate::key::{key_of, Key};
use crate::lifecycle::{LifecycleBroadcaster, UpdateLoop};
use crate::observer::{InjectionObserver, Observers};
use crate::traits::{Resolver, ResolverCore};
use crate::type_index::TypeIndex;
use crate::types::Instance;

pub mod context;
pub mod scope;

pub use context::{ClientResolver, Requester};
pub use scope::{ProvidedService, ProviderId, ServiceRegistry, Visibility};

/// Owner of all services declared in one manifest.
///
/// # Thread Safety
///
/// The container is `Send + Sync` and every shared table sits behind a
/// `parking_lot` lock. No lock is held while constructors, `init`
/// methods, lifecycle hooks, slot listeners or ready callbacks run. The
/// pipeline itself is meant to be driven from one thread.
///
/// # Examples
///
/// ```
/// use ferrous_locator::{described, InjectorState, Resolver, ServiceDeclaration, ServiceManifest};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync { fn now(&self) -> u64; }
/// struct FixedClock;
/// impl Clock for FixedClock { fn now(&self) -> u64 { 42 } }
/// described!(FixedClock: dyn Clock);
///
/// let mut manifest = ServiceManifest::new();
/// manifest.add_service(
///     ServiceDeclaration::of::<FixedClock>().defining::<dyn Clock>().default_constructor(|| FixedClock),
/// );
///
/// let container = manifest.build();
/// assert_eq!(container.state(), InjectorState::NotStarted);
///
/// let report = container.start();
/// assert_eq!(report.constructed, 1);
/// assert!(container.services_ready());
///
/// let a = container.get::<dyn Clock>().unwrap();
/// let b = container.get::<dyn Clock>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.now(), 42);
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) manifest: ServiceManifest,
    pub(crate) type_index: TypeIndex,
    pub(crate) graph: Arc<dyn ObjectGraph>,
    pub(crate) assets: Arc<dyn AssetLoader>,
    pub(crate) broadcaster: Arc<dyn LifecycleBroadcaster>,
    pub(crate) observers: Observers,
    pub(crate) options: InjectorOptions,
    pub(crate) registry: ServiceRegistry,
    pub(crate) globals: GlobalServices,
    pub(crate) init_args: InitArgs,
    pub(crate) lifecycle: Mutex<Lifecycle>,
    /// Realized instances by defining key and by concrete key.
    pub(crate) instances: RwLock<AHashMap<Key, Instance>>,
    /// Lazy declarations not yet constructed, by defining key.
    pub(crate) uninitialized: Mutex<AHashMap<Key, usize>>,
    /// Cross-injection progress by class.
    pub(crate) cross_injected: Mutex<AHashMap<Key, CrossInjection>>,
    /// Declarations that failed for good, by manifest index.
    pub(crate) failed: Mutex<AHashMap<usize, DiError>>,
    /// Distinct realized instances, in realization order.
    pub(crate) realized: Mutex<Vec<Instance>>,
    /// Instances the container constructed itself; these get lifecycle hooks.
    pub(crate) owned: Mutex<Vec<Instance>>,
    /// Addresses of instances whose hooks were already dispatched.
    pub(crate) broadcast: Mutex<AHashSet<usize>>,
}

impl ServiceContainer {
    /// Current pipeline state.
    pub fn state(&self) -> InjectorState {
        self.inner.lifecycle.lock().state
    }

    /// Whether the pipeline has reached [`InjectorState::Ready`].
    pub fn services_ready(&self) -> bool {
        self.state() == InjectorState::Ready
    }

    /// Runs `callback` once the services are ready.
    ///
    /// Fires immediately when they already are; otherwise the callback is
    /// queued and fired exactly once by [`start`](Self::start).
    pub fn on_services_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state == InjectorState::Ready {
            drop(lifecycle);
            callback();
        } else {
            lifecycle.ready_callbacks.push(Box::new(callback));
        }
    }

    /// Resolver acting on behalf of `requester`.
    pub fn resolver_for(&self, requester: impl Into<Requester>) -> ClientResolver<'_> {
        ClientResolver::new(self, requester.into())
    }

    /// Resolves `T` for a requester placed in the object graph.
    pub fn get_for<T>(&self, requester: impl Into<Requester>) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolver_for(requester).get::<T>()
    }

    /// Whether `T` can be resolved for any client.
    pub fn exists<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.try_get::<T>().is_some()
    }

    /// Whether `T` can be resolved for a requester at `node`.
    pub fn exists_for<T: ?Sized + Send + Sync + 'static>(&self, node: NodeId) -> bool {
        self.get_for::<T>(node).is_ok()
    }

    /// Whether `candidate` is the instance of `T` a requester at `node` would get.
    pub fn ptr_eq_for<T: ?Sized + Send + Sync + 'static>(&self, node: NodeId, candidate: &Arc<T>) -> bool {
        self.get_for::<T>(node)
            .map(|resolved| Arc::ptr_eq(&resolved, candidate))
            .unwrap_or(false)
    }

    /// Supplies the instance for defining type `T` directly.
    ///
    /// A lazy declaration still pending for `T` is dropped. Returns whether
    /// the slot changed.
    pub fn set_instance<T: ?Sized + 'static>(&self, instance: Instance) -> bool {
        self.set_instance_by_key(&key_of::<T>(), instance)
    }

    pub fn set_instance_by_key(&self, defining: &Key, instance: Instance) -> bool {
        let Some(converted) = instance.convert(defining, self.inner.options.max_unwrap_depth) else {
            let error = DiError::TypeMismatch {
                expected: defining.display_name(),
                found: instance.type_name(),
            };
            warn!(
                service = instance.type_name(),
                defining_type = defining.display_name(),
                reason = %error,
                "Instance ignored"
            );
            return false;
        };
        self.inner.uninitialized.lock().remove(defining);
        self.inner.instances.write().insert(*defining, converted.clone());
        self.inner.globals.set(defining, converted)
    }

    /// Registers the services a scene-level provider exposes.
    pub fn register_provider(
        &self,
        provider: ProviderId,
        node: Option<NodeId>,
        services: &[(Key, Instance)],
        visibility: Visibility,
    ) -> DiResult<usize> {
        self.inner
            .registry
            .register(provider, node, services, visibility, self.inner.graph.as_ref())
    }

    /// Removes everything `provider` registered. Safe to call repeatedly.
    pub fn deregister_provider(&self, provider: ProviderId) -> usize {
        self.inner.registry.deregister(provider)
    }

    /// Whether some declaration is requested through `key`.
    pub fn is_service_defining_type(&self, key: &Key) -> bool {
        self.inner.manifest.is_service_defining_type(key)
    }

    /// Whether `key` names a declared service class.
    pub fn has_service_declaration(&self, key: &Key) -> bool {
        self.inner.manifest.has_service_declaration(key)
    }

    /// Snapshot of every declaration and whether it has been realized.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        let instances = self.inner.instances.read();
        self.inner
            .manifest
            .services()
            .iter()
            .map(|decl| ServiceDescriptor {
                defining: decl.defining_key(),
                concrete: decl.class_key(),
                lazy: decl.is_lazy(),
                location: decl.location().clone(),
                realized: instances.contains_key(&decl.defining_key()),
            })
            .collect()
    }

    pub fn manifest(&self) -> &ServiceManifest {
        &self.inner.manifest
    }

    pub fn init_args(&self) -> &InitArgs {
        &self.inner.init_args
    }

    pub fn globals(&self) -> &GlobalServices {
        &self.inner.globals
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn type_index(&self) -> &TypeIndex {
        &self.inner.type_index
    }

    pub fn options(&self) -> &InjectorOptions {
        &self.inner.options
    }

    pub fn graph(&self) -> &Arc<dyn ObjectGraph> {
        &self.inner.graph
    }

    pub(crate) fn resolve_for(&self, key: &Key, requester: Requester) -> DiResult<Instance> {
        if let Some(found) = self
            .inner
            .registry
            .try_get_for(key, requester, self.inner.graph.as_ref())?
        {
            return Ok(found);
        }
        self.inner.resolve_fallback(key)
    }
}

impl ResolverCore for ServiceContainer {
    fn resolve_any(&self, key: &Key) -> DiResult<Instance> {
        if let Some(found) = self.inner.registry.try_get_for_any_client(key) {
            return Ok(found);
        }
        self.inner.resolve_fallback(key)
    }
}

impl ContainerInner {
    // Global slot, then lazy construction, then a live-object search while
    // the pipeline hasn't finished.
    fn resolve_fallback(&self, key: &Key) -> DiResult<Instance> {
        if let Some(found) = self.globals.get(key) {
            return Ok(found);
        }
        if let Some(found) = self.ensure_initialized(key) {
            return Ok(found);
        }
        if self.lifecycle.lock().state != InjectorState::Ready {
            if let Some(found) = self.type_index.find_any(key, self.graph.as_ref()) {
                return Ok(found);
            }
        }
        Err(DiError::NotFound(key.display_name()))
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("state", &self.state())
            .field("declarations", &self.inner.manifest.len())
            .field("instances", &self.inner.instances.read().len())
            .field("pending_lazy", &self.inner.uninitialized.lock().len())
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

/// Builder wiring a manifest to its collaborators.
///
/// Collaborators not supplied default to an empty [`SceneGraph`], an
/// empty [`AssetStore`] and an [`UpdateLoop`].
pub struct ContainerBuilder {
    manifest: ServiceManifest,
    graph: Option<Arc<dyn ObjectGraph>>,
    assets: Option<Arc<dyn AssetLoader>>,
    broadcaster: Option<Arc<dyn LifecycleBroadcaster>>,
    observers: Observers,
    options: InjectorOptions,
}

impl ContainerBuilder {
    pub fn new(manifest: ServiceManifest) -> Self {
        Self {
            manifest,
            graph: None,
            assets: None,
            broadcaster: None,
            observers: Observers::new(),
            options: InjectorOptions::default(),
        }
    }

    pub fn with_graph(mut self, graph: Arc<dyn ObjectGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetLoader>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn LifecycleBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Adds an observer; observers are called in the order added.
    pub fn with_observer(mut self, observer: Arc<dyn InjectionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn with_options(mut self, options: InjectorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ServiceContainer {
        let options = self.options;
        let type_index =
            TypeIndex::build(self.manifest.type_universe()).with_unwrap_depth(options.max_unwrap_depth);
        let registry = ServiceRegistry::with_options(options.ambiguity_warnings, options.max_unwrap_depth);

        let inner = ContainerInner {
            type_index,
            graph: self.graph.unwrap_or_else(|| Arc::new(SceneGraph::new())),
            assets: self.assets.unwrap_or_else(|| Arc::new(AssetStore::new())),
            broadcaster: self.broadcaster.unwrap_or_else(|| Arc::new(UpdateLoop::new())),
            observers: self.observers,
            registry,
            globals: GlobalServices::new(),
            init_args: InitArgs::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
            instances: RwLock::new(AHashMap::new()),
            uninitialized: Mutex::new(AHashMap::new()),
            cross_injected: Mutex::new(AHashMap::new()),
            failed: Mutex::new(AHashMap::new()),
            realized: Mutex::new(Vec::new()),
            owned: Mutex::new(Vec::new()),
            broadcast: Mutex::new(AHashSet::new()),
            manifest: self.manifest,
            options,
        };
        ServiceContainer { inner: Arc::new(inner) }
    }
}
