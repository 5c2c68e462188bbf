//! Pipeline state and lifecycle hook dispatch tests.

use ferrous_locator::{
    Awake, Described, FixedUpdate, InjectorState, LateUpdate, OnEnable, Resolver,
    ServiceDeclaration, ServiceManifest, Start, TypeInfoBuilder, Update, UpdateLoop,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

type Journal = Arc<Mutex<Vec<String>>>;

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

struct Actor {
    name: &'static str,
    journal: Journal,
    ticks: AtomicUsize,
}

impl Actor {
    fn new(name: &'static str, journal: Journal) -> Self {
        Self { name, journal, ticks: AtomicUsize::new(0) }
    }

    fn note(&self, event: &str) {
        self.journal.lock().push(format!("{}:{}", self.name, event));
    }
}

impl Awake for Actor {
    fn awake(&self) {
        self.note("awake");
    }
}
impl OnEnable for Actor {
    fn on_enable(&self) {
        self.note("enable");
    }
}
impl Start for Actor {
    fn start(&self) {
        self.note("start");
    }
}
impl Update for Actor {
    fn update(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}
impl LateUpdate for Actor {
    fn late_update(&self) {
        self.note("late");
    }
}
impl FixedUpdate for Actor {
    fn fixed_update(&self) {
        self.note("fixed");
    }
}

impl Described for Actor {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.implements::<dyn Update>(|actor: Arc<Self>| -> Arc<dyn Update> { actor })
            .awake()
            .on_enable()
            .start()
            .update()
            .late_update()
            .fixed_update()
    }
}

/// A second type with the same hooks, so two instances can coexist.
struct Prop(Actor);
impl Awake for Prop {
    fn awake(&self) {
        self.0.awake();
    }
}
impl OnEnable for Prop {
    fn on_enable(&self) {
        self.0.on_enable();
    }
}
impl Start for Prop {
    fn start(&self) {
        self.0.start();
    }
}
impl Described for Prop {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.awake().on_enable().start()
    }
}

// ===== Tests =====

#[test]
fn test_hooks_run_in_phase_order() {
    let log = journal();
    let (actor_log, prop_log) = (log.clone(), log.clone());

    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(
            ServiceDeclaration::of::<Actor>()
                .default_constructor(move || Actor::new("actor", actor_log.clone())),
        )
        .add_service(
            ServiceDeclaration::of::<Prop>()
                .default_constructor(move || Prop(Actor::new("prop", prop_log.clone()))),
        );

    let container = manifest.build();
    container.start();

    assert_eq!(
        *log.lock(),
        vec![
            "actor:awake",
            "prop:awake",
            "actor:enable",
            "prop:enable",
            "actor:start",
            "prop:start",
        ]
    );
}

#[test]
fn test_update_hooks_subscribed_once() {
    let log = journal();
    let updates = Arc::new(UpdateLoop::new());
    let actor_log = log.clone();

    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(
            ServiceDeclaration::of::<Actor>()
                .default_constructor(move || Actor::new("actor", actor_log.clone())),
        )
        // Same class under a second defining type must not subscribe twice.
        .add_service(
            ServiceDeclaration::of::<Actor>()
                .defining::<dyn Update>()
                .default_constructor(|| Actor::new("unused", journal())),
        );

    let container = manifest.container().with_broadcaster(updates.clone()).build();
    container.start();

    assert_eq!(updates.subscriber_counts(), (1, 1, 1));
    updates.tick();
    updates.tick();
    updates.late_tick();
    updates.fixed_tick();

    let actor = container.get_required::<Actor>();
    assert_eq!(actor.ticks.load(Ordering::SeqCst), 2);
    assert_eq!(log.lock().iter().filter(|e| e.ends_with("awake")).count(), 1);
    assert!(log.lock().ends_with(&["actor:late".to_string(), "actor:fixed".to_string()]));
}

#[test]
fn test_lazy_service_gets_hooks_on_realization() {
    let log = journal();
    let actor_log = log.clone();
    let updates = Arc::new(UpdateLoop::new());

    let mut manifest = ServiceManifest::new();
    manifest.add_service(
        ServiceDeclaration::of::<Actor>()
            .lazy()
            .default_constructor(move || Actor::new("late-comer", actor_log.clone())),
    );

    let container = manifest.container().with_broadcaster(updates.clone()).build();
    container.start();
    assert!(log.lock().is_empty());
    assert_eq!(updates.subscriber_counts(), (0, 0, 0));

    container.get_required::<Actor>();
    container.get_required::<Actor>();
    assert_eq!(
        *log.lock(),
        vec!["late-comer:awake", "late-comer:enable", "late-comer:start"]
    );
    assert_eq!(updates.subscriber_counts(), (1, 1, 1));
}

#[test]
fn test_state_transitions_and_ready_callback() {
    let container = ServiceManifest::new().build();
    assert_eq!(container.state(), InjectorState::NotStarted);
    assert!(!container.services_ready());

    let observed = Arc::new(Mutex::new(None));
    let handle = container.clone();
    let slot = observed.clone();
    container.on_services_ready(move || {
        *slot.lock() = Some(handle.state());
    });

    let report = container.start();
    assert!(report.is_clean());
    assert_eq!(*observed.lock(), Some(InjectorState::Ready));
    assert_eq!(report.to_string(), "0 constructed, 0 lazy, 0 failed, 0 cross-injected, 0 clients assigned");
}

#[test]
fn test_reset_keeps_callbacks_registered_before_restart() {
    let fired = Arc::new(AtomicUsize::new(0));
    let container = ServiceManifest::new().build();
    container.start();
    container.reset();

    let counter = fired.clone();
    container.on_services_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    container.start();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
