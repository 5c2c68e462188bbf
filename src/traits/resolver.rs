//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of, Key};
use crate::types::Instance;

/// Object-safe resolution by key.
///
/// Implemented by the container itself (resolution for any client) and by
/// [`ClientResolver`](crate::ClientResolver) (resolution on behalf of a
/// requester placed in the object graph). Most users call the generic
/// methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves the instance registered for `key`.
    ///
    /// Returns [`DiError::NotFound`] when nothing can provide the key and
    /// [`DiError::InvalidArgument`] for requests the resolver cannot
    /// evaluate, such as a requester that isn't part of the graph.
    fn resolve_any(&self, key: &Key) -> DiResult<Instance>;
}

/// Typed resolution helpers, available on every [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use ferrous_locator::{described, Resolver, ServiceDeclaration, ServiceManifest};
///
/// trait Storage: Send + Sync { fn kind(&self) -> &'static str; }
/// struct Disk;
/// impl Storage for Disk { fn kind(&self) -> &'static str { "disk" } }
/// described!(Disk: dyn Storage);
///
/// let mut manifest = ServiceManifest::new();
/// manifest.add_service(ServiceDeclaration::of::<Disk>().defining::<dyn Storage>().default_constructor(|| Disk));
/// let container = manifest.build();
/// container.start();
///
/// assert_eq!(container.get::<dyn Storage>().unwrap().kind(), "disk");
/// assert!(container.try_get::<String>().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T`, which may be a concrete type or a `dyn Trait`.
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = key_of::<T>();
        let instance = self.resolve_any(&key)?;
        instance.downcast::<T>().ok_or(DiError::TypeMismatch {
            expected: key.display_name(),
            found: instance.type_name(),
        })
    }

    /// Resolves `T`, mapping every failure to `None`.
    fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Resolves `T`, panicking on failure.
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
