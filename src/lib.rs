//! # ferrous-locator
//!
//! Service location and cross-service injection for Rust, built around an
//! explicit registration manifest instead of runtime reflection.
//!
//! ## Features
//!
//! - **Declared services**: each concrete class is declared once with the
//!   type it is requested by, where it comes from and whether it is lazy
//! - **Strategy chain**: live object graph, resources, an asset catalog,
//!   or constructor injection with cycle detection
//! - **Cross-service injection**: services receive up to six other
//!   services through typed `init` methods after construction
//! - **Scoped providers**: services exposed by providers in the object
//!   graph, resolved to the nearest visible one
//! - **Global slots**: one current instance per defining type, with change
//!   notification
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_locator::{described, Resolver, ServiceDeclaration, ServiceManifest};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {}", message)
//!     }
//! }
//! described!(ConsoleLogger: dyn Logger);
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//! described!(UserService);
//!
//! let mut manifest = ServiceManifest::new();
//! manifest
//!     .add_service(
//!         ServiceDeclaration::of::<ConsoleLogger>()
//!             .defining::<dyn Logger>()
//!             .default_constructor(|| ConsoleLogger),
//!     )
//!     .add_service(
//!         ServiceDeclaration::of::<UserService>()
//!             .constructor(|(logger,): (Arc<dyn Logger>,)| UserService { logger }),
//!     );
//!
//! let container = manifest.build();
//! let report = container.start();
//! assert!(report.is_clean());
//!
//! let users = container.get_required::<UserService>();
//! assert_eq!(users.logger.log("hi"), "[LOG] hi");
//! ```
//!
//! ## Cross-Service Injection
//!
//! ```rust
//! use ferrous_locator::{
//!     Described, Initializable, Resolver, ServiceDeclaration, ServiceManifest, TypeInfoBuilder,
//! };
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! struct Settings;
//! impl Described for Settings {}
//!
//! #[derive(Default)]
//! struct Game {
//!     settings: Mutex<Option<Arc<Settings>>>,
//! }
//!
//! impl Initializable<(Arc<Settings>,)> for Game {
//!     fn init(&self, (settings,): (Arc<Settings>,)) {
//!         *self.settings.lock() = Some(settings);
//!     }
//! }
//!
//! impl Described for Game {
//!     fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
//!         info.initializable::<(Arc<Settings>,)>()
//!     }
//! }
//!
//! let mut manifest = ServiceManifest::new();
//! manifest
//!     .add_service(ServiceDeclaration::of::<Game>().default_constructor(Game::default))
//!     .add_service(ServiceDeclaration::of::<Settings>().lazy().default_constructor(|| Settings));
//!
//! let container = manifest.build();
//! let report = container.start();
//! assert_eq!(report.cross_injected, 1);
//!
//! let game = container.get_required::<Game>();
//! let settings = container.get_required::<Settings>();
//! assert!(Arc::ptr_eq(game.settings.lock().as_ref().unwrap(), &settings));
//! ```

// Module declarations
pub mod args;
pub mod assets;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod global;
pub mod graph;
pub mod init_args;
pub mod injector;
pub mod key;
pub mod lifecycle;
pub mod observer;
pub mod provider;
pub mod traits;
pub mod type_index;
pub mod types;
pub mod validation;

// Internal modules
mod internal;

// Re-exports
pub use args::{ArgKeys, ArgList, Initializable, MAX_ARITY};
pub use assets::{AssetLoader, AssetStore};
pub use collection::{
    AnyClass, ClientDeclaration, Constructor, Location, ManifestModule, ServiceDeclaration,
    ServiceManifest, ServiceManifestExt,
};
pub use config::{
    ConfigProvider, ConfigSource, ConfigValue, EnvironmentConfigSource, InjectorOptions, ENV_PREFIX,
};
#[cfg(feature = "config")]
pub use config::JsonConfigSource;
pub use descriptors::ServiceDescriptor;
pub use error::{DiError, DiResult};
pub use global::GlobalServices;
pub use graph::{distance_up, root_of, GroupId, Located, NodeId, ObjectGraph, SceneGraph};
pub use init_args::InitArgs;
pub use injector::{InjectorState, StartupReport};
pub use key::{key_of, object_key, AnyObject, Key};
pub use lifecycle::{
    Awake, FixedUpdate, LateUpdate, LifecycleBroadcaster, OnEnable, Start, Update, UpdateLoop,
};
pub use observer::{InjectionObserver, MetricsObserver, TracingObserver};
pub use provider::{
    ClientResolver, ContainerBuilder, ProvidedService, ProviderId, Requester, ServiceContainer,
    ServiceRegistry, Visibility,
};
pub use traits::{Resolver, ResolverCore};
pub use type_index::{TypeIndex, DEFAULT_UNWRAP_DEPTH};
pub use types::{
    type_info_of, AnyArc, Capabilities, Described, IndirectionKind, Instance, TypeInfo,
    TypeInfoBuilder,
};
pub use validation::{ValidationReport, ValidationWarning};
