//! Process-wide slot per defining type.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::key::{key_of, Key};
use crate::types::Instance;

type ChangeListener = Arc<dyn Fn(Option<&Instance>, Option<&Instance>) + Send + Sync>;

/// Current shared instance per defining type, with change notification.
///
/// Listeners run after the slot has been updated and without any lock
/// held. Assigning the same key again from inside one of its own
/// listeners is refused.
#[derive(Default)]
pub struct GlobalServices {
    slots: RwLock<AHashMap<Key, Instance>>,
    listeners: RwLock<AHashMap<Key, Vec<ChangeListener>>>,
    setting: Mutex<AHashSet<Key>>,
}

impl GlobalServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, defining: &Key) -> Option<Instance> {
        self.slots.read().get(defining).cloned()
    }

    pub fn contains(&self, defining: &Key) -> bool {
        self.slots.read().contains_key(defining)
    }

    /// Stores `instance` for `defining`. Returns whether the slot changed.
    ///
    /// Instances that do not satisfy `defining` are rejected with a
    /// warning. Assigning the instance already held is a no-op.
    pub fn set(&self, defining: &Key, instance: Instance) -> bool {
        if !instance.satisfies(defining) {
            warn!(
                defining_type = defining.display_name(),
                service = instance.type_name(),
                "instance is not assignable to the defining type, ignoring"
            );
            return false;
        }
        self.replace(defining, Some(instance))
    }

    /// Empties the slot for `defining`. Returns whether it held anything.
    pub fn remove(&self, defining: &Key) -> bool {
        self.replace(defining, None)
    }

    fn replace(&self, defining: &Key, new: Option<Instance>) -> bool {
        if !self.setting.lock().insert(*defining) {
            warn!(
                defining_type = defining.display_name(),
                "re-entrant assignment while listeners run, ignoring"
            );
            return false;
        }

        let old = {
            let mut slots = self.slots.write();
            let unchanged = match (slots.get(defining), new.as_ref()) {
                (Some(current), Some(new)) => current.ptr_eq(new),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                drop(slots);
                self.setting.lock().remove(defining);
                return false;
            }
            match new.clone() {
                Some(new) => slots.insert(*defining, new),
                None => slots.remove(defining),
            }
        };

        debug!(defining_type = defining.display_name(), "global service changed");
        let listeners = self.listeners.read().get(defining).cloned().unwrap_or_default();
        for listener in listeners {
            listener(old.as_ref(), new.as_ref());
        }
        self.setting.lock().remove(defining);
        true
    }

    /// Subscribes to changes of the slot for `defining`.
    pub fn on_changed_any<F>(&self, defining: Key, listener: F)
    where
        F: Fn(Option<&Instance>, Option<&Instance>) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(defining)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Typed subscription: receives the old and new handle as `Arc<T>`.
    ///
    /// ```rust
    /// use ferrous_locator::{described, key_of, GlobalServices, Instance};
    /// use std::sync::{Arc, Mutex};
    ///
    /// trait Weather: Send + Sync { fn name(&self) -> &str; }
    /// struct Rain;
    /// impl Weather for Rain { fn name(&self) -> &str { "rain" } }
    /// described!(Rain: dyn Weather);
    ///
    /// let globals = GlobalServices::new();
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = seen.clone();
    /// globals.on_changed::<dyn Weather, _>(move |_old, new| {
    ///     sink.lock().unwrap().push(new.map(|w| w.name().to_string()));
    /// });
    ///
    /// assert!(globals.set(&key_of::<dyn Weather>(), Instance::from_value(Rain)));
    /// assert_eq!(*seen.lock().unwrap(), vec![Some("rain".to_string())]);
    /// ```
    pub fn on_changed<T, F>(&self, listener: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Option<Arc<T>>, Option<Arc<T>>) + Send + Sync + 'static,
    {
        self.on_changed_any(key_of::<T>(), move |old, new| {
            listener(
                old.and_then(|i| i.downcast::<T>()),
                new.and_then(|i| i.downcast::<T>()),
            )
        });
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every slot without notifying listeners.
    pub(crate) fn clear(&self) {
        self.slots.write().clear();
        self.setting.lock().clear();
    }
}

impl std::fmt::Debug for GlobalServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalServices")
            .field("slots", &self.slots.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Clock;
    crate::described!(Clock);

    struct Other;
    crate::described!(Other);

    #[test]
    fn test_set_same_reference_is_noop() {
        let globals = GlobalServices::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        globals.on_changed_any(key_of::<Clock>(), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let clock = Instance::from_value(Clock);
        assert!(globals.set(&key_of::<Clock>(), clock.clone()));
        assert!(!globals.set(&key_of::<Clock>(), clock.clone()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(globals.set(&key_of::<Clock>(), Instance::from_value(Clock)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejects_unassignable() {
        let globals = GlobalServices::new();
        assert!(!globals.set(&key_of::<Clock>(), Instance::from_value(Other)));
        assert!(globals.get(&key_of::<Clock>()).is_none());
    }

    #[test]
    fn test_listener_receives_old_and_new() {
        let globals = Arc::new(GlobalServices::new());
        let first = Instance::from_value(Clock);
        let second = Instance::from_value(Clock);
        let observed = Arc::new(Mutex::new(Vec::new()));

        let sink = observed.clone();
        globals.on_changed_any(key_of::<Clock>(), move |old, new| {
            sink.lock().push((old.map(|i| i.addr()), new.map(|i| i.addr())));
        });

        globals.set(&key_of::<Clock>(), first.clone());
        globals.set(&key_of::<Clock>(), second.clone());
        globals.remove(&key_of::<Clock>());

        let observed = observed.lock();
        assert_eq!(observed[0], (None, Some(first.addr())));
        assert_eq!(observed[1], (Some(first.addr()), Some(second.addr())));
        assert_eq!(observed[2], (Some(second.addr()), None));
    }

    #[test]
    fn test_reentrant_set_refused() {
        let globals = Arc::new(GlobalServices::new());
        let inner = globals.clone();
        let nested_result = Arc::new(Mutex::new(None));
        let sink = nested_result.clone();
        globals.on_changed_any(key_of::<Clock>(), move |_, _| {
            let changed = inner.set(&key_of::<Clock>(), Instance::from_value(Clock));
            sink.lock().get_or_insert(changed);
        });

        let first = Instance::from_value(Clock);
        assert!(globals.set(&key_of::<Clock>(), first.clone()));
        assert_eq!(*nested_result.lock(), Some(false));
        assert!(globals.get(&key_of::<Clock>()).unwrap().ptr_eq(&first));
    }
}
