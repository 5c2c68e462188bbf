//! Manifest module system for modular registration.
//!
//! Groups of related declarations can be packaged as a [`ManifestModule`]
//! and added to a [`ServiceManifest`] in one call.

use crate::collection::ServiceManifest;
use crate::error::DiResult;

/// A module that adds declarations to a [`ServiceManifest`].
///
/// # Example
///
/// ```rust
/// use ferrous_locator::{
///     described, DiResult, ManifestModule, ServiceDeclaration, ServiceManifest,
///     ServiceManifestExt,
/// };
/// use std::sync::Arc;
///
/// struct AudioSettings;
/// described!(AudioSettings);
///
/// struct AudioMixer { settings: Arc<AudioSettings> }
/// described!(AudioMixer);
///
/// struct AudioModule;
///
/// impl ManifestModule for AudioModule {
///     fn register_services(self, manifest: &mut ServiceManifest) -> DiResult<()> {
///         manifest
///             .add_service(ServiceDeclaration::of::<AudioSettings>().default_constructor(|| AudioSettings))
///             .add_service(
///                 ServiceDeclaration::of::<AudioMixer>()
///                     .constructor(|(settings,): (Arc<AudioSettings>,)| AudioMixer { settings }),
///             );
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let manifest = ServiceManifest::new().add_module(AudioModule)?;
/// assert_eq!(manifest.len(), 2);
/// # Ok(())
/// # }
/// ```
pub trait ManifestModule {
    /// Adds this module's declarations to the manifest.
    fn register_services(self, manifest: &mut ServiceManifest) -> DiResult<()>;
}

/// Extension methods for adding modules to a manifest.
pub trait ServiceManifestExt {
    /// Adds a module, consuming and returning the manifest for chaining.
    fn add_module<M: ManifestModule>(self, module: M) -> DiResult<Self>
    where
        Self: Sized;

    /// Adds a module in place.
    fn add_module_mut<M: ManifestModule>(&mut self, module: M) -> DiResult<&mut Self>;
}

impl ServiceManifestExt for ServiceManifest {
    fn add_module<M: ManifestModule>(mut self, module: M) -> DiResult<Self> {
        module.register_services(&mut self)?;
        Ok(self)
    }

    fn add_module_mut<M: ManifestModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
