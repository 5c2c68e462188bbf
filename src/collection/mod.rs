//! Registration manifest: declared services, clients and known types.
//!
//! The manifest replaces whole-program type scanning. It lists every
//! service declaration in discovery order, every client that needs a
//! fixed set of services, and any extra type (wrappers, findable scene
//! objects) the type index should know about.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::args::{ArgKeys, ArgList};
use crate::key::{key_of, Key};
use crate::provider::{ContainerBuilder, ServiceContainer};
use crate::types::{type_info_of, Described, Instance, TypeInfo};

pub mod module_system;

pub use module_system::{ManifestModule, ServiceManifestExt};

type ConstructFn = Arc<dyn Fn(&[Instance]) -> Option<Instance> + Send + Sync>;

/// Where a service instance comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Location {
    /// Constructor injection, falling back to the parameterless constructor.
    #[default]
    Construct,
    /// An existing object in the live object graph.
    FindInScene,
    /// A resource loaded by path.
    ResourcePath(String),
    /// An entry of the external asset catalog.
    CatalogKey(String),
    /// An authoring-time asset.
    EditorAsset(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Construct => f.write_str("constructor"),
            Location::FindInScene => f.write_str("scene"),
            Location::ResourcePath(path) => write!(f, "resource '{}'", path),
            Location::CatalogKey(key) => write!(f, "catalog key '{}'", key),
            Location::EditorAsset(path) => write!(f, "editor asset '{}'", path),
        }
    }
}

/// One constructor of a service class.
#[derive(Clone)]
pub struct Constructor {
    params: ArgKeys,
    invoke: ConstructFn,
}

impl Constructor {
    pub fn new<C, A, F>(build: F) -> Self
    where
        C: Described,
        A: ArgList,
        F: Fn(A) -> C + Send + Sync + 'static,
    {
        let invoke: ConstructFn = Arc::new(move |args: &[Instance]| {
            A::from_instances(args).map(|args| Instance::from_value(build(args)))
        });
        Self { params: A::keys(), invoke }
    }

    pub fn params(&self) -> &[Key] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn invoke(&self, args: &[Instance]) -> Option<Instance> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Constructor").field(&self.params).finish()
    }
}

/// A concrete class eligible to become a service.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{described, key_of, Location, ServiceDeclaration};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {}
/// struct SystemClock;
/// impl Clock for SystemClock {}
/// described!(SystemClock: dyn Clock);
///
/// struct Scheduler { clock: Arc<dyn Clock> }
/// described!(Scheduler);
///
/// let clock = ServiceDeclaration::of::<SystemClock>()
///     .defining::<dyn Clock>()
///     .default_constructor(|| SystemClock);
/// let scheduler = ServiceDeclaration::of::<Scheduler>()
///     .lazy()
///     .constructor(|(clock,): (Arc<dyn Clock>,)| Scheduler { clock });
///
/// assert_eq!(clock.defining_key(), key_of::<dyn Clock>());
/// assert!(scheduler.is_lazy());
/// assert_eq!(scheduler.location(), &Location::Construct);
/// ```
pub struct ServiceDeclaration<C: ?Sized = AnyClass> {
    class: Arc<TypeInfo>,
    defining: Key,
    location: Location,
    lazy: bool,
    constructors: Vec<Constructor>,
    _class: PhantomData<fn() -> C>,
}

/// Class marker of a declaration once it is stored in a manifest.
pub enum AnyClass {}

impl ServiceDeclaration {
    /// Declares `C` as a service defined by its own type.
    pub fn of<C: Described>() -> ServiceDeclaration<C> {
        ServiceDeclaration {
            class: type_info_of::<C>(),
            defining: key_of::<C>(),
            location: Location::Construct,
            lazy: false,
            constructors: Vec::new(),
            _class: PhantomData,
        }
    }
}

impl<C: Described> ServiceDeclaration<C> {
    /// Adds a constructor taking the services in `A`.
    ///
    /// Constructors are attempted with the most parameters first; among
    /// equal arities, in the order they were added.
    pub fn constructor<A, F>(mut self, build: F) -> Self
    where
        A: ArgList,
        F: Fn(A) -> C + Send + Sync + 'static,
    {
        let constructor = Constructor::new::<C, A, F>(build);
        let position = self
            .constructors
            .iter()
            .position(|existing| existing.arity() < constructor.arity())
            .unwrap_or(self.constructors.len());
        self.constructors.insert(position, constructor);
        self
    }

    /// Adds the parameterless constructor.
    pub fn default_constructor<F>(self, build: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.constructor(move |(): ()| build())
    }
}

impl<C: ?Sized> ServiceDeclaration<C> {
    /// Sets the type other code requests this service by.
    pub fn defining<D: ?Sized + 'static>(mut self) -> Self {
        self.defining = key_of::<D>();
        self
    }

    pub fn find_in_scene(self) -> Self {
        self.at(Location::FindInScene)
    }

    pub fn resource_path(self, path: impl Into<String>) -> Self {
        self.at(Location::ResourcePath(path.into()))
    }

    pub fn catalog_key(self, key: impl Into<String>) -> Self {
        self.at(Location::CatalogKey(key.into()))
    }

    pub fn editor_asset(self, path: impl Into<String>) -> Self {
        self.at(Location::EditorAsset(path.into()))
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Defers construction until first demand.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn class(&self) -> &Arc<TypeInfo> {
        &self.class
    }

    pub fn class_key(&self) -> Key {
        self.class.key()
    }

    pub fn defining_key(&self) -> Key {
        self.defining
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Constructors, most parameters first.
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    pub(crate) fn name(&self) -> &'static str {
        self.class.name()
    }

    /// Drops the class parameter so declarations of different classes
    /// can share a list.
    pub fn erase(self) -> ServiceDeclaration {
        ServiceDeclaration {
            class: self.class,
            defining: self.defining,
            location: self.location,
            lazy: self.lazy,
            constructors: self.constructors,
            _class: PhantomData,
        }
    }
}

impl<C: ?Sized> Clone for ServiceDeclaration<C> {
    fn clone(&self) -> Self {
        Self {
            class: self.class.clone(),
            defining: self.defining,
            location: self.location.clone(),
            lazy: self.lazy,
            constructors: self.constructors.clone(),
            _class: PhantomData,
        }
    }
}

impl<C: ?Sized> fmt::Debug for ServiceDeclaration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDeclaration")
            .field("class", &self.class.key())
            .field("defining", &self.defining)
            .field("location", &self.location)
            .field("lazy", &self.lazy)
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// A non-service type that needs exactly N services.
#[derive(Debug, Clone)]
pub struct ClientDeclaration {
    client: Key,
    args: ArgKeys,
}

impl ClientDeclaration {
    pub fn of<C: ?Sized + 'static, A: ArgList>() -> Self {
        Self { client: key_of::<C>(), args: A::keys() }
    }

    pub fn client_key(&self) -> Key {
        self.client
    }

    pub fn arg_keys(&self) -> &[Key] {
        &self.args
    }
}

/// Ordered list of declarations and known types.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{described, Resolver, ServiceDeclaration, ServiceManifest};
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct English;
/// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
/// described!(English: dyn Greeter);
///
/// let mut manifest = ServiceManifest::new();
/// manifest.add_service(
///     ServiceDeclaration::of::<English>()
///         .defining::<dyn Greeter>()
///         .default_constructor(|| English),
/// );
///
/// let container = manifest.build();
/// container.start();
/// assert_eq!(container.get::<dyn Greeter>().unwrap().greet(), "hello");
/// ```
#[derive(Default, Clone)]
pub struct ServiceManifest {
    services: Vec<ServiceDeclaration>,
    clients: Vec<ClientDeclaration>,
    types: Vec<Arc<TypeInfo>>,
}

impl ServiceManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service<C: ?Sized>(&mut self, declaration: ServiceDeclaration<C>) -> &mut Self {
        self.services.push(declaration.erase());
        self
    }

    pub fn add_client<C: ?Sized + 'static, A: ArgList>(&mut self) -> &mut Self {
        self.clients.push(ClientDeclaration::of::<C, A>());
        self
    }

    pub fn add_client_declaration(&mut self, client: ClientDeclaration) -> &mut Self {
        self.clients.push(client);
        self
    }

    /// Makes `T` known to the type index without declaring a service.
    pub fn add_type<T: Described>(&mut self) -> &mut Self {
        self.add_type_info(type_info_of::<T>())
    }

    pub fn add_type_info(&mut self, info: Arc<TypeInfo>) -> &mut Self {
        self.types.push(info);
        self
    }

    pub fn services(&self) -> &[ServiceDeclaration] {
        &self.services
    }

    pub fn clients(&self) -> &[ClientDeclaration] {
        &self.clients
    }

    /// The type universe: explicit types first, then declared classes,
    /// each once.
    pub fn type_universe(&self) -> Vec<Arc<TypeInfo>> {
        let mut universe: Vec<Arc<TypeInfo>> = Vec::new();
        let classes = self.services.iter().map(|decl| decl.class.clone());
        for info in self.types.iter().cloned().chain(classes) {
            if !universe.iter().any(|known| known.key() == info.key()) {
                universe.push(info);
            }
        }
        universe
    }

    /// Whether some declaration uses `key` as its defining type.
    pub fn is_service_defining_type(&self, key: &Key) -> bool {
        self.services.iter().any(|decl| decl.defining == *key)
    }

    /// Whether `key` names a declared service class.
    pub fn has_service_declaration(&self, key: &Key) -> bool {
        self.services.iter().any(|decl| decl.class.key() == *key)
    }

    /// Builds a container with the default collaborators.
    pub fn build(self) -> ServiceContainer {
        ContainerBuilder::new(self).build()
    }

    /// Starts a container builder for setting collaborators and options.
    pub fn container(self) -> ContainerBuilder {
        ContainerBuilder::new(self)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManifest")
            .field("services", &self.services)
            .field("clients", &self.clients)
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dep;
    crate::described!(Dep);

    struct Other;
    crate::described!(Other);

    #[derive(Default)]
    struct Svc;
    crate::described!(Svc);

    #[test]
    fn test_constructors_sorted_by_arity() {
        let decl = ServiceDeclaration::of::<Svc>()
            .default_constructor(|| Svc)
            .constructor(|(_d,): (Arc<Dep>,)| Svc)
            .constructor(|(_d, _o): (Arc<Dep>, Arc<Other>)| Svc)
            .constructor(|(_o,): (Arc<Other>,)| Svc);

        let arities: Vec<usize> = decl.constructors().iter().map(Constructor::arity).collect();
        assert_eq!(arities, vec![2, 1, 1, 0]);
        assert_eq!(decl.constructors()[1].params(), &[key_of::<Dep>()]);
        assert_eq!(decl.constructors()[2].params(), &[key_of::<Other>()]);
    }

    #[test]
    fn test_constructor_built_from_declared_class() {
        // The closure's output is the declared class, so a bare path suffices.
        let decl = ServiceDeclaration::of::<Svc>().lazy().default_constructor(Default::default);
        let built = decl.constructors()[0].invoke(&[]).unwrap();
        assert_eq!(built.key(), key_of::<Svc>());

        let erased: ServiceDeclaration = decl.erase();
        assert_eq!(erased.class_key(), key_of::<Svc>());
        assert!(erased.is_lazy());
        assert_eq!(erased.constructors().len(), 1);
    }

    #[test]
    fn test_type_universe_deduplicates() {
        let mut manifest = ServiceManifest::new();
        manifest
            .add_type::<Dep>()
            .add_service(ServiceDeclaration::of::<Dep>())
            .add_service(ServiceDeclaration::of::<Svc>());

        let keys: Vec<Key> = manifest.type_universe().iter().map(|i| i.key()).collect();
        assert_eq!(keys, vec![key_of::<Dep>(), key_of::<Svc>()]);
        assert!(manifest.has_service_declaration(&key_of::<Svc>()));
        assert!(manifest.is_service_defining_type(&key_of::<Dep>()));
        assert!(!manifest.is_service_defining_type(&key_of::<Other>()));
    }
}
