//! Cross-service injection and client argument tests.

use ferrous_locator::{
    described, key_of, Described, Initializable, MetricsObserver, Resolver, ServiceDeclaration,
    ServiceManifest, TypeInfoBuilder,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

struct Logger;
described!(Logger);

struct Config {
    name: &'static str,
}
described!(Config);

/// Takes the logger alone.
#[derive(Default)]
struct App {
    logger: Mutex<Option<Arc<Logger>>>,
    injected: AtomicBool,
}

impl Initializable<(Arc<Logger>,)> for App {
    fn init(&self, (logger,): (Arc<Logger>,)) {
        *self.logger.lock() = Some(logger);
        self.injected.store(true, Ordering::SeqCst);
    }
}

impl Described for App {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Logger>,)>()
    }
}

/// Needs both the logger and the config.
#[derive(Default)]
struct ConfiguredApp {
    injected: AtomicBool,
}

impl Initializable<(Arc<Logger>, Arc<Config>)> for ConfiguredApp {
    fn init(&self, _: (Arc<Logger>, Arc<Config>)) {
        self.injected.store(true, Ordering::SeqCst);
    }
}

impl Described for ConfiguredApp {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Logger>, Arc<Config>)>()
    }
}

/// Two variants; the one declared last is preferred.
#[derive(Default)]
struct FlexibleApp {
    arity: AtomicUsize,
    config: Mutex<Option<&'static str>>,
}

impl Initializable<(Arc<Logger>,)> for FlexibleApp {
    fn init(&self, _: (Arc<Logger>,)) {
        self.arity.store(1, Ordering::SeqCst);
    }
}

impl Initializable<(Arc<Logger>, Arc<Config>)> for FlexibleApp {
    fn init(&self, (_, config): (Arc<Logger>, Arc<Config>)) {
        self.arity.store(2, Ordering::SeqCst);
        *self.config.lock() = Some(config.name);
    }
}

impl Described for FlexibleApp {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Logger>,)>()
            .initializable::<(Arc<Logger>, Arc<Config>)>()
    }
}

#[derive(Default)]
struct Ping {
    pong: Mutex<Option<Arc<Pong>>>,
}
impl Initializable<(Arc<Pong>,)> for Ping {
    fn init(&self, (pong,): (Arc<Pong>,)) {
        *self.pong.lock() = Some(pong);
    }
}
impl Described for Ping {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Pong>,)>()
    }
}

#[derive(Default)]
struct Pong {
    ping: Mutex<Option<Arc<Ping>>>,
}
impl Initializable<(Arc<Ping>,)> for Pong {
    fn init(&self, (ping,): (Arc<Ping>,)) {
        *self.ping.lock() = Some(ping);
    }
}
impl Described for Pong {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Ping>,)>()
    }
}

#[derive(Default)]
struct Fragile;
impl Initializable<(Arc<Logger>,)> for Fragile {
    fn init(&self, _: (Arc<Logger>,)) {
        panic!("init failed");
    }
}
impl Described for Fragile {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Logger>,)>()
    }
}

/// Initialized with the settings declared after it.
#[derive(Default)]
struct Journal {
    settings: Mutex<Option<&'static str>>,
}
impl Initializable<(Arc<Settings>,)> for Journal {
    fn init(&self, (settings,): (Arc<Settings>,)) {
        *self.settings.lock() = Some(settings.profile);
    }
}
impl Described for Journal {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.initializable::<(Arc<Settings>,)>()
    }
}

struct Shell {
    journal: Arc<Journal>,
}
described!(Shell);

struct Settings {
    profile: &'static str,
}
described!(Settings);

/// Client that is not a service; it picks up its arguments later.
struct Hud;

fn logger_decl() -> ServiceDeclaration<Logger> {
    ServiceDeclaration::of::<Logger>().default_constructor(|| Logger)
}

// ===== Tests =====

#[test]
fn test_single_argument_injection() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<App>().default_constructor(App::default));

    let container = manifest.build();
    let report = container.start();
    assert_eq!(report.cross_injected, 1);

    let app = container.get_required::<App>();
    let logger = container.get_required::<Logger>();
    assert!(app.injected.load(Ordering::SeqCst));
    assert!(Arc::ptr_eq(app.logger.lock().as_ref().unwrap(), &logger));
}

#[test]
fn test_missing_dependency_leaves_service_uninitialized() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<ConfiguredApp>().default_constructor(ConfiguredApp::default));

    let container = manifest.build();
    let report = container.start();

    assert!(report.is_clean());
    assert_eq!(report.cross_injected, 0);
    assert!(container.services_ready());
    assert!(!container.get_required::<ConfiguredApp>().injected.load(Ordering::SeqCst));
}

#[test]
fn test_last_declared_variant_preferred() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<Config>().default_constructor(|| Config { name: "prod" }))
        .add_service(ServiceDeclaration::of::<FlexibleApp>().default_constructor(FlexibleApp::default));

    let container = manifest.build();
    container.start();

    let app = container.get_required::<FlexibleApp>();
    assert_eq!(app.arity.load(Ordering::SeqCst), 2);
    assert_eq!(*app.config.lock(), Some("prod"));
}

#[test]
fn test_falls_back_to_satisfiable_variant() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<FlexibleApp>().default_constructor(FlexibleApp::default));

    let container = manifest.build();
    let report = container.start();

    assert_eq!(report.cross_injected, 1);
    let app = container.get_required::<FlexibleApp>();
    assert_eq!(app.arity.load(Ordering::SeqCst), 1);
    assert!(app.config.lock().is_none());
}

#[test]
fn test_lazy_argument_realized_for_injection() {
    let config_built = Arc::new(AtomicBool::new(false));
    let flag = config_built.clone();

    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<Config>().lazy().default_constructor(move || {
            flag.store(true, Ordering::SeqCst);
            Config { name: "lazy" }
        }))
        .add_service(ServiceDeclaration::of::<FlexibleApp>().default_constructor(FlexibleApp::default));

    let container = manifest.build();
    container.start();

    assert!(config_built.load(Ordering::SeqCst));
    assert_eq!(*container.get_required::<FlexibleApp>().config.lock(), Some("lazy"));
}

#[test]
fn test_mutual_injection_terminates() {
    let metrics = Arc::new(MetricsObserver::new());
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Ping>().default_constructor(Ping::default))
        .add_service(ServiceDeclaration::of::<Pong>().default_constructor(Pong::default));

    let container = manifest.container().with_observer(metrics.clone()).build();
    container.start();

    let ping = container.get_required::<Ping>();
    let pong = container.get_required::<Pong>();
    assert!(Arc::ptr_eq(ping.pong.lock().as_ref().unwrap(), &pong));
    assert!(Arc::ptr_eq(pong.ping.lock().as_ref().unwrap(), &ping));
    assert_eq!(metrics.cross_injected_count(), 2);
}

#[test]
fn test_constructor_argument_initialized_after_later_declarations() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Journal>().default_constructor(Journal::default))
        .add_service(ServiceDeclaration::of::<Shell>().constructor(|(journal,): (Arc<Journal>,)| Shell { journal }))
        .add_service(ServiceDeclaration::of::<Settings>().default_constructor(|| Settings { profile: "dev" }));

    let container = manifest.build();
    let report = container.start();

    assert!(report.is_clean());
    assert_eq!(report.cross_injected, 1);
    let shell = container.get_required::<Shell>();
    assert!(Arc::ptr_eq(&shell.journal, &container.get_required::<Journal>()));
    assert_eq!(*shell.journal.settings.lock(), Some("dev"));
}

#[test]
fn test_panicking_init_does_not_abort_pipeline() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<Fragile>().default_constructor(Fragile::default))
        .add_service(ServiceDeclaration::of::<App>().default_constructor(App::default));

    let container = manifest.build();
    let report = container.start();

    assert!(report.is_clean());
    assert!(container.services_ready());
    assert!(container.get_required::<App>().injected.load(Ordering::SeqCst));
}

#[test]
fn test_client_receives_arguments() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<Config>().default_constructor(|| Config { name: "hud" }))
        .add_client::<Hud, (Arc<Logger>, Arc<Config>)>();

    let container = manifest.build();
    let report = container.start();
    assert_eq!(report.clients_assigned, 1);
    assert!(container.init_args().contains(&key_of::<Hud>()));

    let (logger, config) = container
        .init_args()
        .peek::<Hud, (Arc<Logger>, Arc<Config>)>()
        .unwrap();
    assert!(Arc::ptr_eq(&logger, &container.get_required::<Logger>()));
    assert_eq!(config.name, "hud");

    // Wrong shape leaves the assignment in place.
    assert!(container.init_args().take::<Hud, (Arc<Config>,)>().is_none());
    assert!(container.init_args().take::<Hud, (Arc<Logger>, Arc<Config>)>().is_some());
    assert!(!container.init_args().contains(&key_of::<Hud>()));
}

#[test]
fn test_client_with_unrealized_argument_is_skipped() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(logger_decl())
        .add_service(ServiceDeclaration::of::<Config>().lazy().default_constructor(|| Config { name: "x" }))
        .add_client::<Hud, (Arc<Logger>, Arc<Config>)>()
        .add_client::<App, (Arc<Logger>,)>();

    let container = manifest.build();
    let report = container.start();

    // Client assignment never forces a lazy service.
    assert_eq!(report.clients_assigned, 1);
    assert!(!container.init_args().contains(&key_of::<Hud>()));
    assert!(container.init_args().contains(&key_of::<App>()));
    assert!(container.is_pending(&key_of::<Config>()));
}
