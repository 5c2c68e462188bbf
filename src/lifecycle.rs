//! Lifecycle hooks for realized services.
//!
//! `Awake`, `OnEnable` and `Start` are invoked directly, once, by the
//! pipeline. The per-frame hooks are handed to a [`LifecycleBroadcaster`]
//! which owns the actual scheduling.

use std::sync::Arc;

use parking_lot::Mutex;

/// Invoked once after the service has been constructed.
pub trait Awake: Send + Sync {
    fn awake(&self);
}

/// Invoked once after every service received its `awake` call.
pub trait OnEnable: Send + Sync {
    fn on_enable(&self);
}

/// Invoked once after every service received its `on_enable` call.
pub trait Start: Send + Sync {
    fn start(&self);
}

/// Per-frame update.
pub trait Update: Send + Sync {
    fn update(&self);
}

/// Per-frame update running after every `update`.
pub trait LateUpdate: Send + Sync {
    fn late_update(&self);
}

/// Fixed timestep update.
pub trait FixedUpdate: Send + Sync {
    fn fixed_update(&self);
}

/// Receives the per-frame hooks of realized services.
///
/// The pipeline calls each method at most once per service instance.
pub trait LifecycleBroadcaster: Send + Sync {
    fn subscribe_update(&self, target: Arc<dyn Update>);
    fn subscribe_late_update(&self, target: Arc<dyn LateUpdate>);
    fn subscribe_fixed_update(&self, target: Arc<dyn FixedUpdate>);
}

/// In-memory broadcaster driven by explicit ticks.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{LifecycleBroadcaster, Update, UpdateLoop};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
/// impl Update for Counter {
///     fn update(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
/// }
///
/// let updates = UpdateLoop::new();
/// let counter = Arc::new(Counter::default());
/// updates.subscribe_update(counter.clone());
///
/// updates.tick();
/// updates.tick();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 2);
/// ```
#[derive(Default)]
pub struct UpdateLoop {
    update: Mutex<Vec<Arc<dyn Update>>>,
    late_update: Mutex<Vec<Arc<dyn LateUpdate>>>,
    fixed_update: Mutex<Vec<Arc<dyn FixedUpdate>>>,
}

impl UpdateLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every `update` subscriber, in subscription order.
    pub fn tick(&self) {
        let targets = self.update.lock().clone();
        for target in targets {
            target.update();
        }
    }

    /// Runs every `late_update` subscriber.
    pub fn late_tick(&self) {
        let targets = self.late_update.lock().clone();
        for target in targets {
            target.late_update();
        }
    }

    /// Runs every `fixed_update` subscriber.
    pub fn fixed_tick(&self) {
        let targets = self.fixed_update.lock().clone();
        for target in targets {
            target.fixed_update();
        }
    }

    /// Number of subscribers per hook: (update, late, fixed).
    pub fn subscriber_counts(&self) -> (usize, usize, usize) {
        (
            self.update.lock().len(),
            self.late_update.lock().len(),
            self.fixed_update.lock().len(),
        )
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.update.lock().clear();
        self.late_update.lock().clear();
        self.fixed_update.lock().clear();
    }
}

impl LifecycleBroadcaster for UpdateLoop {
    fn subscribe_update(&self, target: Arc<dyn Update>) {
        self.update.lock().push(target);
    }

    fn subscribe_late_update(&self, target: Arc<dyn LateUpdate>) {
        self.late_update.lock().push(target);
    }

    fn subscribe_fixed_update(&self, target: Arc<dyn FixedUpdate>) {
        self.fixed_update.lock().push(target);
    }
}

impl std::fmt::Debug for UpdateLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (update, late, fixed) = self.subscriber_counts();
        f.debug_struct("UpdateLoop")
            .field("update", &update)
            .field("late_update", &late)
            .field("fixed_update", &fixed)
            .finish()
    }
}
