//! Service descriptors for introspection and diagnostics.

use crate::collection::Location;
use crate::key::Key;

/// Snapshot of one declared service.
///
/// Produced by [`ServiceContainer::descriptors`](crate::ServiceContainer::descriptors)
/// and refreshed on every call, so lazily initialized services show up as
/// realized once they have been demanded.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{described, Resolver, ServiceDeclaration, ServiceManifest};
///
/// struct Clock;
/// described!(Clock);
/// struct Weather;
/// described!(Weather);
///
/// let mut manifest = ServiceManifest::new();
/// manifest
///     .add_service(ServiceDeclaration::of::<Clock>().default_constructor(|| Clock))
///     .add_service(ServiceDeclaration::of::<Weather>().lazy().default_constructor(|| Weather));
///
/// let container = manifest.build();
/// container.start();
///
/// let descriptors = container.descriptors();
/// let weather = descriptors.iter().find(|d| d.type_name().ends_with("Weather")).unwrap();
/// assert!(weather.lazy);
/// assert!(!weather.realized);
///
/// container.get::<Weather>().unwrap();
/// let weather = container.descriptors().into_iter().find(|d| d.lazy).unwrap();
/// assert!(weather.realized);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Key the service is requested by.
    pub defining: Key,
    /// Concrete class of the declaration.
    pub concrete: Key,
    pub lazy: bool,
    pub location: Location,
    /// Whether an instance exists for the defining type.
    pub realized: bool,
}

impl ServiceDescriptor {
    /// Human-readable defining type name.
    pub fn type_name(&self) -> &'static str {
        self.defining.display_name()
    }

    pub fn concrete_name(&self) -> &'static str {
        self.concrete.display_name()
    }

    /// Whether the service is requested through a different type than its class.
    pub fn is_abstract(&self) -> bool {
        self.defining != self.concrete
    }
}
