//! Location strategy tests: scene lookups, assets, wrappers and failures.

use ferrous_locator::{
    described, key_of, AssetStore, Described, DiError, GroupId, InjectorOptions, Instance,
    ProviderId, Resolver, SceneGraph, ServiceDeclaration, ServiceManifest, TypeInfoBuilder,
    Visibility,
};
use std::sync::Arc;

// ===== Test Services =====

trait Input: Send + Sync {
    fn device(&self) -> &'static str;
}

struct Keyboard;
impl Input for Keyboard {
    fn device(&self) -> &'static str {
        "keyboard"
    }
}
described!(Keyboard: dyn Input);

struct Gamepad;
impl Input for Gamepad {
    fn device(&self) -> &'static str {
        "gamepad"
    }
}
described!(Gamepad: dyn Input);

/// Scene object standing in for a keyboard.
struct KeyboardSlot(Option<Arc<Keyboard>>);
impl Described for KeyboardSlot {
    fn describe(info: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self> {
        info.wraps::<Keyboard>(|slot| slot.0.clone())
    }
}

struct Theme(&'static str);
described!(Theme);

struct Exploding;
described!(Exploding);

fn scene_with(instance: Instance) -> Arc<SceneGraph> {
    let scene = Arc::new(SceneGraph::new());
    let root = scene.add_root(GroupId(1));
    scene.attach(root, instance);
    scene
}

// ===== Tests =====

#[test]
fn test_find_in_scene_uses_live_object() {
    let keyboard = Arc::new(Keyboard);
    let scene = scene_with(Instance::new(keyboard.clone()));

    let mut manifest = ServiceManifest::new();
    manifest.add_service(
        ServiceDeclaration::of::<Keyboard>()
            .defining::<dyn Input>()
            .find_in_scene()
            .default_constructor(|| Keyboard),
    );
    let container = manifest.container().with_graph(scene).build();
    let report = container.start();

    assert!(report.is_clean());
    let input = container.get_required::<dyn Input>();
    assert_eq!(
        Arc::as_ptr(&input) as *const () as usize,
        Arc::as_ptr(&keyboard) as *const () as usize
    );
}

#[test]
fn test_find_in_scene_through_wrapper() {
    let keyboard = Arc::new(Keyboard);
    let scene = scene_with(Instance::from_value(KeyboardSlot(Some(keyboard.clone()))));

    let mut manifest = ServiceManifest::new();
    manifest
        .add_type::<KeyboardSlot>()
        .add_service(ServiceDeclaration::of::<Keyboard>().defining::<dyn Input>().find_in_scene());
    let container = manifest.container().with_graph(scene).build();
    container.start();

    // The wrapper is unwrapped before the instance is recorded.
    let input = container.get_required::<dyn Input>();
    assert_eq!(input.device(), "keyboard");
    assert_eq!(
        Arc::as_ptr(&input) as *const () as usize,
        Arc::as_ptr(&keyboard) as *const () as usize
    );
}

#[test]
fn test_find_in_scene_falls_back_to_unrestricted_provider() {
    let mut manifest = ServiceManifest::new();
    manifest.add_service(ServiceDeclaration::of::<Theme>().find_in_scene());
    let container = manifest.build();

    container
        .register_provider(
            ProviderId::next(),
            None,
            &[(key_of::<Theme>(), Instance::from_value(Theme("shared")))],
            Visibility::Unrestricted,
        )
        .unwrap();
    let report = container.start();

    assert!(report.is_clean());
    assert_eq!(container.get_required::<Theme>().0, "shared");
}

#[test]
fn test_scene_miss_is_reported() {
    let mut manifest = ServiceManifest::new();
    manifest.add_service(
        ServiceDeclaration::of::<Gamepad>()
            .defining::<dyn Input>()
            .find_in_scene()
            .default_constructor(|| Gamepad),
    );
    let container = manifest.build();
    let report = container.start();

    // A location hint is authoritative; the constructor is not used.
    match &report.failed[..] {
        [(_, DiError::MissingLocationTarget { location, .. })] => assert_eq!(location, "scene"),
        other => panic!("expected a scene miss, got {:?}", other),
    }
    assert!(container.try_get::<dyn Input>().is_none());
}

#[test]
fn test_scene_miss_before_primary_group_loaded() {
    let scene = Arc::new(SceneGraph::new());
    scene.set_primary_group_loaded(false);

    let mut manifest = ServiceManifest::new();
    manifest.add_service(ServiceDeclaration::of::<Gamepad>().find_in_scene());
    let container = manifest.container().with_graph(scene).build();
    let report = container.start();

    // Still recorded as a failure, only logged quietly.
    assert_eq!(report.failed.len(), 1);
    assert!(container.services_ready());
}

#[test]
fn test_resource_path() {
    let assets = Arc::new(AssetStore::new());
    assets.insert_resource("themes/dark", Instance::from_value(Theme("dark")));

    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Theme>().resource_path("themes/dark"))
        .add_service(ServiceDeclaration::of::<Gamepad>().resource_path("input/missing"));
    let container = manifest.container().with_assets(assets).build();
    let report = container.start();

    assert_eq!(container.get_required::<Theme>().0, "dark");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, std::any::type_name::<Gamepad>());
}

#[test]
fn test_catalog_key_requires_catalog() {
    let mut manifest = ServiceManifest::new();
    manifest.add_service(ServiceDeclaration::of::<Theme>().catalog_key("theme-light"));
    let container = manifest.build();
    let report = container.start();

    match &report.failed[..] {
        [(_, DiError::MissingLocationTarget { location, .. })] => {
            assert!(location.contains("catalog unavailable"), "{}", location)
        }
        other => panic!("expected a catalog miss, got {:?}", other),
    }
}

#[test]
fn test_catalog_key_loads_entry() {
    let assets = Arc::new(AssetStore::with_catalog());
    assets.insert_catalog_entry("theme-light", Instance::from_value(Theme("light")));

    let mut manifest = ServiceManifest::new();
    manifest.add_service(ServiceDeclaration::of::<Theme>().catalog_key("theme-light"));
    let container = manifest.container().with_assets(assets.clone()).build();
    container.start();
    assert_eq!(container.get_required::<Theme>().0, "light");

    // Disabled through options, the catalog is never consulted.
    let mut manifest = ServiceManifest::new();
    manifest.add_service(ServiceDeclaration::of::<Theme>().catalog_key("theme-light"));
    let options = InjectorOptions {
        catalog_lookup: false,
        ..InjectorOptions::default()
    };
    let container = manifest.container().with_assets(assets).with_options(options).build();
    assert_eq!(container.start().failed.len(), 1);
}

#[test]
fn test_editor_asset() {
    let assets = Arc::new(AssetStore::new());
    assets.insert_editor_asset("Assets/Input.asset", Instance::from_value(Gamepad));

    let mut manifest = ServiceManifest::new();
    manifest.add_service(
        ServiceDeclaration::of::<Gamepad>()
            .defining::<dyn Input>()
            .editor_asset("Assets/Input.asset"),
    );
    let container = manifest.container().with_assets(assets).build();
    container.start();
    assert_eq!(container.get_required::<dyn Input>().device(), "gamepad");
}

#[test]
fn test_located_object_of_wrong_type() {
    let assets = Arc::new(AssetStore::new());
    assets.insert_resource("input", Instance::from_value(Theme("not an input")));

    let mut manifest = ServiceManifest::new();
    manifest.add_service(
        ServiceDeclaration::of::<Gamepad>()
            .defining::<dyn Input>()
            .resource_path("input"),
    );
    let container = manifest.container().with_assets(assets).build();
    let report = container.start();

    assert!(matches!(report.failed[0].1, DiError::TypeMismatch { .. }));
}

#[test]
fn test_panicking_constructor_is_contained() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Exploding>().default_constructor(|| -> Exploding {
            panic!("boom")
        }))
        .add_service(ServiceDeclaration::of::<Theme>().default_constructor(|| Theme("after")));

    let container = manifest.build();
    let report = container.start();

    match &report.failed[..] {
        [(_, DiError::ConstructorPanicked { message, .. })] => assert_eq!(message, "boom"),
        other => panic!("expected a constructor panic, got {:?}", other),
    }
    assert_eq!(container.get_required::<Theme>().0, "after");
}

#[test]
fn test_constructor_injection_disabled() {
    struct NeedsTheme(Option<Arc<Theme>>);
    described!(NeedsTheme);

    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Theme>().default_constructor(|| Theme("base")))
        .add_service(
            ServiceDeclaration::of::<NeedsTheme>()
                .constructor(|(theme,): (Arc<Theme>,)| NeedsTheme(Some(theme)))
                .default_constructor(|| NeedsTheme(None)),
        );

    let options = InjectorOptions {
        constructor_injection: false,
        ..InjectorOptions::default()
    };
    let container = manifest.container().with_options(options).build();
    container.start();
    assert!(container.get_required::<NeedsTheme>().0.is_none());
}
