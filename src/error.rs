//! Error types for the service locator.

use thiserror::Error;

/// Service location and injection errors.
///
/// Most variants never leave the construction pipeline: they are logged,
/// handed to observers and recorded in the startup report, and the
/// pipeline moves on to the next declaration. Only [`DiError::NotFound`]
/// and [`DiError::InvalidArgument`] are returned by the public resolution
/// entry points.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::DiError;
///
/// let cycle = DiError::ConstructorCycle(vec!["Audio", "Mixer", "Audio"]);
/// assert!(cycle.to_string().contains("Audio -> Mixer -> Audio"));
/// assert!(cycle.is_cycle());
///
/// let missing = DiError::NotFound("dyn game::Inventory");
/// assert_eq!(missing.to_string(), "Service not found: dyn game::Inventory");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// A location hinted lookup found nothing.
    #[error("No object found for {service} at {location}")]
    MissingLocationTarget {
        service: &'static str,
        location: String,
    },
    /// A located or constructed object is not assignable to the requested type.
    #[error("{found} is not assignable to {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// Mutually recursive constructor dependencies (includes path).
    #[error("Circular constructor dependency: {}", .0.join(" -> "))]
    ConstructorCycle(Vec<&'static str>),
    /// None of the declared constructors could be satisfied.
    #[error("No constructor of {0} could be satisfied")]
    NoViableConstructor(&'static str),
    /// User constructor code panicked.
    #[error("Constructor of {service} panicked: {message}")]
    ConstructorPanicked {
        service: &'static str,
        message: String,
    },
    /// Several scoped providers are equally near to a requester.
    #[error("Ambiguous providers for {0}")]
    AmbiguousVisibility(&'static str),
    /// Contract violation on a public entry point.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Nothing resolves the requested type.
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Maximum construction depth exceeded.
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Configuration value missing or of the wrong shape.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DiError {
    /// Whether this error came from the cycle guard.
    pub fn is_cycle(&self) -> bool {
        matches!(self, DiError::ConstructorCycle(_))
    }

    /// Whether the error reflects the construction chain that asked rather
    /// than the service itself.
    pub(crate) fn depends_on_requester(&self) -> bool {
        matches!(self, DiError::ConstructorCycle(_) | DiError::DepthExceeded(_))
    }

    /// Whether the error aborts the whole construction chain rather than
    /// a single constructor attempt.
    pub(crate) fn is_fatal_for_chain(&self) -> bool {
        matches!(self, DiError::DepthExceeded(_))
    }
}

/// Result type for locator operations.
pub type DiResult<T> = Result<T, DiError>;
