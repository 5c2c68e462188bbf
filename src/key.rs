//! Type keys for service storage and lookup.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The universal object type. Every realized instance satisfies it.
pub type AnyObject = dyn Any + Send + Sync;

/// Key identifying a requested type.
///
/// A key is built for concrete types and trait objects alike, so the same
/// key type is used for a service's concrete class, for its defining type
/// and for every view it exposes.
///
/// Equality, ordering and hashing look at the `TypeId` only; the name is
/// carried for diagnostics.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{key_of, Key};
///
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
///
/// let concrete: Key = key_of::<ConsoleLogger>();
/// let contract: Key = key_of::<dyn Logger>();
///
/// assert_ne!(concrete, contract);
/// assert_eq!(concrete, key_of::<ConsoleLogger>());
/// assert!(contract.display_name().contains("Logger"));
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    id: TypeId,
    name: &'static str,
}

impl Key {
    /// The `TypeId` behind this key.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human readable type name, the `std::any::type_name` result.
    #[inline]
    pub fn display_name(&self) -> &'static str {
        self.name
    }

    /// Name without the module path, used in log lines.
    pub fn short_name(&self) -> &'static str {
        let name = self.name;
        // Generic arguments keep their paths.
        let head = name.split('<').next().unwrap_or(name);
        match head.rfind("::") {
            Some(pos) if !name.starts_with("dyn ") => &name[pos + 2..],
            _ => name,
        }
    }

    /// Whether this is the key of the universal object type.
    #[inline]
    pub fn is_object(&self) -> bool {
        self.id == TypeId::of::<AnyObject>()
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key for any `'static` type, sized or not.
#[inline(always)]
pub fn key_of<T: ?Sized + 'static>() -> Key {
    Key {
        id: TypeId::of::<T>(),
        name: std::any::type_name::<T>(),
    }
}

/// Key of the universal object type.
#[inline(always)]
pub fn object_key() -> Key {
    key_of::<AnyObject>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Marker {}
    struct Widget;

    #[test]
    fn test_equality_ignores_name() {
        let a = key_of::<Widget>();
        let b = Key { id: TypeId::of::<Widget>(), name: "renamed" };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_trait_and_concrete_keys_differ() {
        assert_ne!(key_of::<Widget>(), key_of::<dyn Marker>());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(key_of::<Widget>().short_name(), "Widget");
        assert!(key_of::<dyn Marker>().short_name().starts_with("dyn "));
    }

    #[test]
    fn test_object_key() {
        assert!(object_key().is_object());
        assert!(!key_of::<Widget>().is_object());
    }
}
