//! Manifest validation.
//!
//! Catches common declaration mistakes before the pipeline runs. Every
//! finding is a warning: the pipeline tolerates all of them and reports
//! the concrete failure at startup.

use std::fmt;

use ahash::AHashMap;

use crate::collection::{Location, ServiceDeclaration, ServiceManifest};
use crate::key::Key;

/// A finding about a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// The class neither implements the defining type nor declares an
    /// indirection that could produce it.
    DefiningTypeUnsatisfied {
        service: &'static str,
        defining_type: &'static str,
    },
    /// Two lazy declarations share a defining type; only the last is kept.
    DuplicateLazyDefiningType {
        defining_type: &'static str,
        services: Vec<&'static str>,
    },
    /// A constructor parameter no declaration can satisfy.
    UndeclaredParameter {
        service: &'static str,
        parameter: &'static str,
    },
    /// A client argument no declaration can satisfy.
    UndeclaredClientArgument {
        client: &'static str,
        argument: &'static str,
    },
    /// Every constructor of each listed class needs another listed class.
    ConstructorCycle { services: Vec<&'static str> },
    /// A constructed service without any constructor.
    NoConstructor { service: &'static str },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::DefiningTypeUnsatisfied { service, defining_type } => write!(
                f,
                "Service '{}' cannot be converted to its defining type '{}'",
                service, defining_type
            ),
            ValidationWarning::DuplicateLazyDefiningType { defining_type, services } => write!(
                f,
                "Lazy defining type '{}' is declared by several services: {}",
                defining_type,
                services.join(", ")
            ),
            ValidationWarning::UndeclaredParameter { service, parameter } => write!(
                f,
                "Service '{}' has a constructor parameter '{}' with no declaration",
                service, parameter
            ),
            ValidationWarning::UndeclaredClientArgument { client, argument } => write!(
                f,
                "Client '{}' requires '{}' which has no declaration",
                client, argument
            ),
            ValidationWarning::ConstructorCycle { services } => write!(
                f,
                "Possible circular constructor dependency: {}",
                services.join(" -> ")
            ),
            ValidationWarning::NoConstructor { service } => {
                write!(f, "Service '{}' is constructed but declares no constructor", service)
            }
        }
    }
}

/// Result of [`ServiceManifest::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// True when nothing was found.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Formats the findings for display.
    pub fn format_issues(&self) -> String {
        let mut output = String::new();
        if !self.warnings.is_empty() {
            output.push_str("Manifest Warnings:\n");
            for warning in &self.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }
        output
    }
}

impl ServiceManifest {
    /// Checks the manifest for declarations that are likely to fail.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_locator::{described, ServiceDeclaration, ServiceManifest, ValidationWarning};
    /// use std::sync::Arc;
    ///
    /// struct Config;
    /// described!(Config);
    /// struct App { config: Arc<Config> }
    /// described!(App);
    ///
    /// let mut manifest = ServiceManifest::new();
    /// manifest.add_service(
    ///     ServiceDeclaration::of::<App>().constructor(|(config,): (Arc<Config>,)| App { config }),
    /// );
    ///
    /// let report = manifest.validate();
    /// assert!(matches!(
    ///     report.warnings[0],
    ///     ValidationWarning::UndeclaredParameter { .. }
    /// ));
    /// ```
    pub fn validate(&self) -> ValidationReport {
        let mut warnings = Vec::new();
        let services = self.services();

        for decl in services {
            let class = decl.class();
            let defining = decl.defining_key();
            if !class.is_assignable_to(&defining) && class.indirection_kind().is_none() {
                warnings.push(ValidationWarning::DefiningTypeUnsatisfied {
                    service: class.name(),
                    defining_type: defining.display_name(),
                });
            }

            if decl.location() == &Location::Construct && decl.constructors().is_empty() {
                warnings.push(ValidationWarning::NoConstructor { service: class.name() });
            }

            let mut reported: Vec<Key> = Vec::new();
            for constructor in decl.constructors() {
                for param in constructor.params() {
                    if !is_declared(services, param) && !reported.contains(param) {
                        reported.push(*param);
                        warnings.push(ValidationWarning::UndeclaredParameter {
                            service: class.name(),
                            parameter: param.display_name(),
                        });
                    }
                }
            }
        }

        let mut lazy_by_defining: AHashMap<Key, Vec<&'static str>> = AHashMap::new();
        let mut lazy_order: Vec<Key> = Vec::new();
        for decl in services.iter().filter(|decl| decl.is_lazy()) {
            let entry = lazy_by_defining.entry(decl.defining_key()).or_default();
            if entry.is_empty() {
                lazy_order.push(decl.defining_key());
            }
            entry.push(decl.class().name());
        }
        for defining in lazy_order {
            if let Some(names) = lazy_by_defining.remove(&defining) {
                if names.len() > 1 {
                    warnings.push(ValidationWarning::DuplicateLazyDefiningType {
                        defining_type: defining.display_name(),
                        services: names,
                    });
                }
            }
        }

        for client in self.clients() {
            for argument in client.arg_keys() {
                if !is_declared(services, argument) {
                    warnings.push(ValidationWarning::UndeclaredClientArgument {
                        client: client.client_key().display_name(),
                        argument: argument.display_name(),
                    });
                }
            }
        }

        warnings.extend(
            detect_cycles(services)
                .into_iter()
                .map(|services| ValidationWarning::ConstructorCycle { services }),
        );

        ValidationReport { warnings }
    }
}

fn is_declared(services: &[ServiceDeclaration], key: &Key) -> bool {
    services
        .iter()
        .any(|decl| decl.defining_key() == *key || decl.class().is_assignable_to(key))
}

// Classes that can only be constructed through a parameterized
// constructor, and only when some other such class is available first.
fn detect_cycles(services: &[ServiceDeclaration]) -> Vec<Vec<&'static str>> {
    let constrained: Vec<&ServiceDeclaration> = services
        .iter()
        .filter(|decl| {
            decl.location() == &Location::Construct
                && !decl.constructors().is_empty()
                && decl.constructors().iter().all(|c| c.arity() > 0)
        })
        .collect();

    let edges = |decl: &ServiceDeclaration| -> Vec<usize> {
        let mut targets = Vec::new();
        for constructor in decl.constructors() {
            for param in constructor.params() {
                for (index, other) in constrained.iter().enumerate() {
                    let provides = other.defining_key() == *param || other.class().is_assignable_to(param);
                    if provides && !targets.contains(&index) {
                        targets.push(index);
                    }
                }
            }
        }
        targets
    };

    let mut cycles = Vec::new();
    let mut visited = vec![false; constrained.len()];
    for start in 0..constrained.len() {
        if visited[start] {
            continue;
        }
        let mut path = Vec::new();
        dfs_cycles(start, &constrained, &edges, &mut visited, &mut path, &mut cycles);
    }
    cycles
}

fn dfs_cycles<F>(
    current: usize,
    decls: &[&ServiceDeclaration],
    edges: &F,
    visited: &mut [bool],
    path: &mut Vec<usize>,
    cycles: &mut Vec<Vec<&'static str>>,
) where
    F: Fn(&ServiceDeclaration) -> Vec<usize>,
{
    if let Some(pos) = path.iter().position(|&node| node == current) {
        let mut cycle: Vec<&'static str> = path[pos..].iter().map(|&i| decls[i].class().name()).collect();
        cycle.push(decls[current].class().name());
        cycles.push(cycle);
        return;
    }
    if visited[current] {
        return;
    }
    visited[current] = true;
    path.push(current);
    for next in edges(decls[current]) {
        dfs_cycles(next, decls, edges, visited, path, cycles);
    }
    path.pop();
}
