//! Manifest module and validation tests.

use ferrous_locator::{
    described, DiError, DiResult, ManifestModule, Resolver, ServiceDeclaration, ServiceManifest,
    ServiceManifestExt, ValidationWarning,
};
use std::sync::Arc;

// ===== Test Services =====

trait Storage: Send + Sync {
    fn name(&self) -> &'static str;
}

struct DiskStorage;
impl Storage for DiskStorage {
    fn name(&self) -> &'static str {
        "disk"
    }
}
described!(DiskStorage: dyn Storage);

struct SaveSystem {
    storage: Arc<dyn Storage>,
}
described!(SaveSystem);

struct Achievements {
    saves: Arc<SaveSystem>,
}
described!(Achievements);

struct Unrelated;
described!(Unrelated);

struct Left(Arc<Right>);
described!(Left);
struct Right(Arc<Left>);
described!(Right);

// ===== Test Modules =====

struct StorageModule;

impl ManifestModule for StorageModule {
    fn register_services(self, manifest: &mut ServiceManifest) -> DiResult<()> {
        manifest
            .add_service(
                ServiceDeclaration::of::<DiskStorage>()
                    .defining::<dyn Storage>()
                    .default_constructor(|| DiskStorage),
            )
            .add_service(
                ServiceDeclaration::of::<SaveSystem>()
                    .constructor(|(storage,): (Arc<dyn Storage>,)| SaveSystem { storage }),
            );
        Ok(())
    }
}

struct AchievementsModule {
    enabled: bool,
}

impl ManifestModule for AchievementsModule {
    fn register_services(self, manifest: &mut ServiceManifest) -> DiResult<()> {
        if !self.enabled {
            return Err(DiError::Configuration("achievements are disabled".to_string()));
        }
        manifest.add_service(
            ServiceDeclaration::of::<Achievements>()
                .lazy()
                .constructor(|(saves,): (Arc<SaveSystem>,)| Achievements { saves }),
        );
        Ok(())
    }
}

// ===== Tests =====

#[test]
fn test_modules_compose() {
    let manifest = ServiceManifest::new()
        .add_module(StorageModule)
        .and_then(|m| m.add_module(AchievementsModule { enabled: true }))
        .unwrap();
    assert_eq!(manifest.len(), 3);
    assert!(manifest.validate().is_clean());

    let container = manifest.build();
    let report = container.start();
    assert_eq!(report.constructed, 2);
    assert_eq!(report.lazy, 1);

    let achievements = container.get_required::<Achievements>();
    assert_eq!(achievements.saves.storage.name(), "disk");
    assert!(Arc::ptr_eq(&achievements.saves, &container.get_required::<SaveSystem>()));
}

#[test]
fn test_module_error_propagates() {
    let mut manifest = ServiceManifest::new();
    manifest.add_module_mut(StorageModule).unwrap();

    match manifest.add_module_mut(AchievementsModule { enabled: false }) {
        Err(DiError::Configuration(message)) => assert!(message.contains("disabled")),
        other => panic!("expected a configuration error, got {:?}", other.map(|m| m.len())),
    }
    assert_eq!(manifest.len(), 2);
}

#[test]
fn test_validation_findings() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Unrelated>().defining::<dyn Storage>().default_constructor(|| Unrelated))
        .add_service(ServiceDeclaration::of::<DiskStorage>())
        .add_service(ServiceDeclaration::of::<SaveSystem>().constructor(
            |(storage,): (Arc<dyn Storage>,)| SaveSystem { storage },
        ))
        .add_service(
            ServiceDeclaration::of::<Achievements>()
                .constructor(|(saves,): (Arc<SaveSystem>,)| Achievements { saves }),
        )
        .add_client::<Unrelated, (Arc<String>,)>();

    let report = manifest.validate();
    let warnings = &report.warnings;

    assert!(warnings.contains(&ValidationWarning::DefiningTypeUnsatisfied {
        service: std::any::type_name::<Unrelated>(),
        defining_type: std::any::type_name::<dyn Storage>(),
    }));
    assert!(warnings.contains(&ValidationWarning::NoConstructor {
        service: std::any::type_name::<DiskStorage>(),
    }));
    assert!(warnings.contains(&ValidationWarning::UndeclaredClientArgument {
        client: std::any::type_name::<Unrelated>(),
        argument: std::any::type_name::<String>(),
    }));
    // `dyn Storage` is declared (by a class that cannot provide it) and
    // `SaveSystem` is declared, so no parameter is reported.
    assert!(!warnings
        .iter()
        .any(|w| matches!(w, ValidationWarning::UndeclaredParameter { .. })));

    let text = report.format_issues();
    assert!(text.starts_with("Manifest Warnings:"));
    assert_eq!(text.lines().count(), warnings.len() + 1);
}

#[test]
fn test_validation_detects_cycles_and_duplicate_lazy_types() {
    let mut manifest = ServiceManifest::new();
    manifest
        .add_service(ServiceDeclaration::of::<Left>().constructor(|(right,): (Arc<Right>,)| Left(right)))
        .add_service(ServiceDeclaration::of::<Right>().constructor(|(left,): (Arc<Left>,)| Right(left)))
        .add_service(
            ServiceDeclaration::of::<DiskStorage>()
                .defining::<dyn Storage>()
                .lazy()
                .default_constructor(|| DiskStorage),
        )
        .add_service(
            ServiceDeclaration::of::<DiskStorage>()
                .defining::<dyn Storage>()
                .lazy()
                .default_constructor(|| DiskStorage),
        );

    let report = manifest.validate();
    assert!(report.has_warnings());
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, ValidationWarning::ConstructorCycle { services } if services.len() >= 2)));
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        ValidationWarning::DuplicateLazyDefiningType { services, .. } if services.len() == 2
    )));

    // The pipeline tolerates what validation flags.
    let container = manifest.build();
    let report = container.start();
    assert_eq!(report.failed.len(), 2);
    assert!(container.services_ready());
    assert!(container.try_get::<dyn Storage>().is_some());
}
