//! Static type descriptors and type-erased instances.
//!
//! Every type that takes part in service location carries a [`TypeInfo`]
//! describing what it can be viewed as, what it resolves to through
//! indirection, and which lifecycle and initialization capabilities it
//! has. Descriptors are built once per type through [`Described`] and
//! cached for the process lifetime.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::args::{ArgKeys, ArgList, Initializable};
use crate::key::{key_of, AnyObject, Key};
use crate::lifecycle::{Awake, FixedUpdate, LateUpdate, OnEnable, Start, Update};

/// Type-erased shared object.
pub type AnyArc = Arc<AnyObject>;

type ViewFn = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;
type ResolveFn = Arc<dyn Fn(&AnyArc) -> Option<Instance> + Send + Sync>;
type HookFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;
type UpdateFn = Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn Update>> + Send + Sync>;
type LateUpdateFn = Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn LateUpdate>> + Send + Sync>;
type FixedUpdateFn = Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn FixedUpdate>> + Send + Sync>;
type InitFn = Arc<dyn Fn(&AnyArc, &[Instance]) -> bool + Send + Sync>;

// A view casts the erased object into an erased `Arc<V>`.
#[derive(Clone)]
struct View {
    key: Key,
    cast: ViewFn,
}

/// How an object stands in for another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectionKind {
    /// Logically represents another object.
    Wrapper,
    /// Holds a value that may satisfy requests it cannot satisfy itself.
    ValueProvider,
    /// Builds and hands out its target object.
    Initializer,
}

#[derive(Clone)]
struct Indirection {
    kind: IndirectionKind,
    target: Option<Key>,
    target_info: Option<fn() -> Arc<TypeInfo>>,
    resolve: ResolveFn,
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) awake: Option<HookFn>,
    pub(crate) on_enable: Option<HookFn>,
    pub(crate) start: Option<HookFn>,
    pub(crate) update: Option<UpdateFn>,
    pub(crate) late_update: Option<LateUpdateFn>,
    pub(crate) fixed_update: Option<FixedUpdateFn>,
}

/// One `Initializable<A>` implementation of a type.
#[derive(Clone)]
pub(crate) struct InitCapability {
    pub(crate) params: ArgKeys,
    pub(crate) invoke: InitFn,
}

/// Capability flags, computed once when the descriptor is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub awake: bool,
    pub on_enable: bool,
    pub start: bool,
    pub update: bool,
    pub late_update: bool,
    pub fixed_update: bool,
    /// Number of `Initializable` variants declared.
    pub initializers: usize,
}

/// Static descriptor of one concrete type.
pub struct TypeInfo {
    key: Key,
    views: SmallVec<[View; 4]>,
    indirection: Option<Indirection>,
    hooks: Hooks,
    initializers: Vec<InitCapability>,
    capabilities: Capabilities,
}

impl TypeInfo {
    /// Key of the concrete type.
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.key.display_name()
    }

    /// Every key the type is assignable to, starting with its own.
    pub fn view_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.views.iter().map(|view| view.key)
    }

    /// Whether an instance of this type directly satisfies `key`.
    pub fn is_assignable_to(&self, key: &Key) -> bool {
        key.is_object() || self.views.iter().any(|view| view.key == *key)
    }

    /// Whether `self` is strictly more specific than `other`.
    pub fn is_more_specific_than(&self, other: &TypeInfo) -> bool {
        self.key != other.key && self.is_assignable_to(&other.key)
    }

    pub fn indirection_kind(&self) -> Option<IndirectionKind> {
        self.indirection.as_ref().map(|ind| ind.kind)
    }

    /// Key of the object this type wraps or initializes, if declared.
    pub fn wrapped_key(&self) -> Option<Key> {
        self.indirection.as_ref().and_then(|ind| ind.target)
    }

    /// Descriptor of the wrapped type, if declared.
    pub fn wrapped_info(&self) -> Option<Arc<TypeInfo>> {
        self.indirection
            .as_ref()
            .and_then(|ind| ind.target_info)
            .map(|info| info())
    }

    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub(crate) fn initializers(&self) -> &[InitCapability] {
        &self.initializers
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("key", &self.key)
            .field("views", &self.views.iter().map(|v| v.key).collect::<Vec<_>>())
            .field("indirection", &self.indirection_kind())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Builder for a [`TypeInfo`].
///
/// The builder starts with the type's own view. Further views are added
/// with [`implements`](Self::implements), usually for trait objects:
///
/// ```rust
/// use ferrous_locator::{Described, TypeInfoBuilder, key_of, type_info_of};
/// use std::sync::Arc;
///
/// trait Input: Send + Sync {}
/// struct Gamepad;
/// impl Input for Gamepad {}
///
/// impl Described for Gamepad {
///     fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
///         info.implements::<dyn Input>(|pad: Arc<Self>| -> Arc<dyn Input> { pad })
///     }
/// }
///
/// let info = type_info_of::<Gamepad>();
/// assert!(info.is_assignable_to(&key_of::<dyn Input>()));
/// ```
pub struct TypeInfoBuilder<T> {
    views: SmallVec<[View; 4]>,
    indirection: Option<Indirection>,
    hooks: Hooks,
    initializers: Vec<InitCapability>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeInfoBuilder<T> {
    pub fn new() -> Self {
        let cast: ViewFn = Arc::new(|obj: &AnyArc| {
            obj.clone()
                .downcast::<T>()
                .ok()
                .map(|typed| Arc::new(typed) as AnyArc)
        });
        let mut views = SmallVec::new();
        views.push(View { key: key_of::<T>(), cast });
        Self {
            views,
            indirection: None,
            hooks: Hooks::default(),
            initializers: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares that `T` can be viewed as `V`.
    pub fn implements<V: ?Sized + Send + Sync + 'static>(
        mut self,
        convert: impl Fn(Arc<T>) -> Arc<V> + Send + Sync + 'static,
    ) -> Self {
        let key = key_of::<V>();
        if key.is_object() || self.views.iter().any(|view| view.key == key) {
            return self;
        }
        let cast: ViewFn = Arc::new(move |obj: &AnyArc| {
            let typed = obj.clone().downcast::<T>().ok()?;
            Some(Arc::new(convert(typed)) as AnyArc)
        });
        self.views.push(View { key, cast });
        self
    }

    /// Declares that `T` logically represents a `W`.
    pub fn wraps<W: Described>(
        self,
        unwrap: impl Fn(&T) -> Option<Arc<W>> + Send + Sync + 'static,
    ) -> Self {
        self.with_target::<W>(IndirectionKind::Wrapper, unwrap)
    }

    /// Declares that `T` builds and hands out a `W`.
    pub fn initializes<W: Described>(
        self,
        target: impl Fn(&T) -> Option<Arc<W>> + Send + Sync + 'static,
    ) -> Self {
        self.with_target::<W>(IndirectionKind::Initializer, target)
    }

    /// Declares that `T` holds a value of a type known only at runtime.
    pub fn provides_value(
        mut self,
        value: impl Fn(&T) -> Option<Instance> + Send + Sync + 'static,
    ) -> Self {
        let resolve: ResolveFn = Arc::new(move |obj: &AnyArc| {
            let typed = obj.clone().downcast::<T>().ok()?;
            value(&typed)
        });
        self.indirection = Some(Indirection {
            kind: IndirectionKind::ValueProvider,
            target: None,
            target_info: None,
            resolve,
        });
        self
    }

    fn with_target<W: Described>(
        mut self,
        kind: IndirectionKind,
        unwrap: impl Fn(&T) -> Option<Arc<W>> + Send + Sync + 'static,
    ) -> Self {
        let resolve: ResolveFn = Arc::new(move |obj: &AnyArc| {
            let typed = obj.clone().downcast::<T>().ok()?;
            unwrap(&typed).map(Instance::new)
        });
        self.indirection = Some(Indirection {
            kind,
            target: Some(key_of::<W>()),
            target_info: Some(type_info_of::<W> as fn() -> Arc<TypeInfo>),
            resolve,
        });
        self
    }

    pub fn awake(mut self) -> Self
    where
        T: Awake,
    {
        let hook: HookFn = Arc::new(|obj: &AnyArc| {
            if let Ok(typed) = obj.clone().downcast::<T>() {
                typed.awake();
            }
        });
        self.hooks.awake = Some(hook);
        self
    }

    pub fn on_enable(mut self) -> Self
    where
        T: OnEnable,
    {
        let hook: HookFn = Arc::new(|obj: &AnyArc| {
            if let Ok(typed) = obj.clone().downcast::<T>() {
                typed.on_enable();
            }
        });
        self.hooks.on_enable = Some(hook);
        self
    }

    pub fn start(mut self) -> Self
    where
        T: Start,
    {
        let hook: HookFn = Arc::new(|obj: &AnyArc| {
            if let Ok(typed) = obj.clone().downcast::<T>() {
                typed.start();
            }
        });
        self.hooks.start = Some(hook);
        self
    }

    pub fn update(mut self) -> Self
    where
        T: Update,
    {
        let hook: UpdateFn = Arc::new(|obj: &AnyArc| {
            obj.clone()
                .downcast::<T>()
                .ok()
                .map(|typed| typed as Arc<dyn Update>)
        });
        self.hooks.update = Some(hook);
        self
    }

    pub fn late_update(mut self) -> Self
    where
        T: LateUpdate,
    {
        let hook: LateUpdateFn = Arc::new(|obj: &AnyArc| {
            obj.clone()
                .downcast::<T>()
                .ok()
                .map(|typed| typed as Arc<dyn LateUpdate>)
        });
        self.hooks.late_update = Some(hook);
        self
    }

    pub fn fixed_update(mut self) -> Self
    where
        T: FixedUpdate,
    {
        let hook: FixedUpdateFn = Arc::new(|obj: &AnyArc| {
            obj.clone()
                .downcast::<T>()
                .ok()
                .map(|typed| typed as Arc<dyn FixedUpdate>)
        });
        self.hooks.fixed_update = Some(hook);
        self
    }

    /// Registers an `Initializable<A>` implementation for cross-injection.
    pub fn initializable<A: ArgList>(mut self) -> Self
    where
        T: Initializable<A>,
    {
        let invoke: InitFn = Arc::new(|obj: &AnyArc, args: &[Instance]| {
            let Ok(typed) = obj.clone().downcast::<T>() else {
                return false;
            };
            match A::from_instances(args) {
                Some(args) => {
                    typed.init(args);
                    true
                }
                None => false,
            }
        });
        self.initializers.push(InitCapability { params: A::keys(), invoke });
        self
    }

    pub fn build(self) -> TypeInfo {
        let capabilities = Capabilities {
            awake: self.hooks.awake.is_some(),
            on_enable: self.hooks.on_enable.is_some(),
            start: self.hooks.start.is_some(),
            update: self.hooks.update.is_some(),
            late_update: self.hooks.late_update.is_some(),
            fixed_update: self.hooks.fixed_update.is_some(),
            initializers: self.initializers.len(),
        };
        TypeInfo {
            key: key_of::<T>(),
            views: self.views,
            indirection: self.indirection,
            hooks: self.hooks,
            initializers: self.initializers,
            capabilities,
        }
    }
}

impl<T: Send + Sync + 'static> Default for TypeInfoBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A type that can be located, constructed or injected.
///
/// The default description exposes only the type itself. Use the
/// [`described!`](crate::described) macro for the common case of a type
/// plus the traits it implements.
pub trait Described: Send + Sync + Sized + 'static {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info
    }
}

static DESCRIPTORS: Lazy<RwLock<AHashMap<TypeId, Arc<TypeInfo>>>> =
    Lazy::new(|| RwLock::new(AHashMap::new()));

/// Cached descriptor of `T`.
pub fn type_info_of<T: Described>() -> Arc<TypeInfo> {
    let id = TypeId::of::<T>();
    if let Some(info) = DESCRIPTORS.read().get(&id) {
        return info.clone();
    }
    let built = Arc::new(T::describe(TypeInfoBuilder::new()).build());
    DESCRIPTORS.write().entry(id).or_insert(built).clone()
}

/// Implements [`Described`] for a type and the traits it implements.
///
/// ```rust
/// use ferrous_locator::{described, key_of, type_info_of};
///
/// trait Audio: Send + Sync {}
/// struct Mixer;
/// impl Audio for Mixer {}
/// described!(Mixer: dyn Audio);
///
/// assert!(type_info_of::<Mixer>().is_assignable_to(&key_of::<dyn Audio>()));
/// ```
#[macro_export]
macro_rules! described {
    ($ty:ty : $($view:ty),+ $(,)?) => {
        impl $crate::Described for $ty {
            fn describe(info: $crate::TypeInfoBuilder<Self>) -> $crate::TypeInfoBuilder<Self> {
                info $(.implements::<$view>(
                    |this: ::std::sync::Arc<$ty>| -> ::std::sync::Arc<$view> { this }
                ))+
            }
        }
    };
    ($ty:ty) => {
        impl $crate::Described for $ty {}
    };
}

/// A realized object together with its descriptor.
#[derive(Clone)]
pub struct Instance {
    object: AnyArc,
    info: Arc<TypeInfo>,
}

impl Instance {
    pub fn new<T: Described>(value: Arc<T>) -> Self {
        Self {
            object: value,
            info: type_info_of::<T>(),
        }
    }

    pub fn from_value<T: Described>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Key of the concrete type.
    #[inline]
    pub fn key(&self) -> Key {
        self.info.key
    }

    pub fn type_name(&self) -> &'static str {
        self.info.name()
    }

    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.info
    }

    pub fn object(&self) -> &AnyArc {
        &self.object
    }

    /// Whether this object directly satisfies `key`.
    #[inline]
    pub fn satisfies(&self, key: &Key) -> bool {
        self.info.is_assignable_to(key)
    }

    /// Typed handle for one of the object's views.
    pub fn downcast<V: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<V>> {
        let erased = self.view_erased(&key_of::<V>())?;
        erased.downcast::<Arc<V>>().ok().map(|outer| (*outer).clone())
    }

    fn view_erased(&self, key: &Key) -> Option<AnyArc> {
        if key.is_object() {
            return Some(Arc::new(self.object.clone()) as AnyArc);
        }
        self.info
            .views
            .iter()
            .find(|view| view.key == *key)
            .and_then(|view| (view.cast)(&self.object))
    }

    /// The object this one stands in for, one indirection step down.
    pub fn unwrap_once(&self) -> Option<Instance> {
        let indirection = self.info.indirection.as_ref()?;
        (indirection.resolve)(&self.object)
    }

    /// This object if it satisfies `key`, otherwise the first object down
    /// its indirection chain that does, following at most `max_depth` steps.
    pub fn convert(&self, key: &Key, max_depth: usize) -> Option<Instance> {
        let mut current = self.clone();
        for _ in 0..=max_depth {
            if current.satisfies(key) {
                return Some(current);
            }
            current = current.unwrap_once()?;
        }
        None
    }

    /// Reference identity.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.addr() == other.addr()
    }

    /// Whether `other` points at this very object.
    pub fn is_same_object<V: ?Sized>(&self, other: &Arc<V>) -> bool {
        self.addr() == Arc::as_ptr(other) as *const () as usize
    }

    /// Address of the shared object, stable for its lifetime.
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.object) as *const () as usize
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} @ {:#x})", self.type_name(), self.addr())
    }
}
