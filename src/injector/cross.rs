//! Cross-service injection and client argument assignment.

use std::panic::{self, AssertUnwindSafe};

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::args::MAX_ARITY;
use crate::internal::InProgress;
use crate::key::Key;
use crate::provider::ContainerInner;
use crate::types::Instance;

/// Cross-injection progress of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CrossInjection {
    Running,
    Done,
}

impl ContainerInner {
    /// Invokes the first satisfiable `init` of `instance`'s class.
    ///
    /// Initializers are tried in reverse declaration order. An `init` runs
    /// at most once per class. The class is marked as running before any
    /// argument is resolved so mutually dependent services terminate; the
    /// mark is lifted again when no initializer could be satisfied, so a
    /// later attempt can still succeed. Returns whether an `init` ran.
    pub(crate) fn inject_cross(&self, instance: &Instance, in_progress: &InProgress) -> bool {
        let info = instance.type_info().clone();
        if info.initializers().is_empty() {
            return false;
        }
        let class = instance.key();
        {
            let mut marks = self.cross_injected.lock();
            if marks.contains_key(&class) {
                return false;
            }
            marks.insert(class, CrossInjection::Running);
        }

        for initializer in info.initializers().iter().rev() {
            let mut args: SmallVec<[Instance; MAX_ARITY]> = SmallVec::new();
            for param in &initializer.params {
                match self.try_get_service(param, in_progress) {
                    Some(arg) => args.push(arg),
                    None => break,
                }
            }
            if args.len() < initializer.params.len() {
                continue;
            }

            for arg in &args {
                self.inject_cross(arg, in_progress);
            }

            let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
                (initializer.invoke)(instance.object(), &args)
            }));
            match invoked {
                Ok(true) => {
                    self.cross_injected.lock().insert(class, CrossInjection::Done);
                    self.observers.cross_injected(&class, args.len());
                    if self.options.log_cross_injection {
                        info!(service = class.display_name(), arity = args.len(), "Service initialized");
                    } else {
                        debug!(service = class.display_name(), arity = args.len(), "Service initialized");
                    }
                    return true;
                }
                Ok(false) => continue,
                Err(_) => {
                    self.cross_injected.lock().insert(class, CrossInjection::Done);
                    warn!(
                        service = class.display_name(),
                        arity = args.len(),
                        "Service init panicked"
                    );
                    return false;
                }
            }
        }

        self.cross_injected.lock().remove(&class);
        debug!(
            service = class.display_name(),
            "No initializer could be satisfied; service left uninitialized"
        );
        false
    }

    // Realized service, lazily constructed one, explicit global, or a
    // provider serving every client.
    fn try_get_service(&self, key: &Key, in_progress: &InProgress) -> Option<Instance> {
        let existing = self.instances.read().get(key).cloned();
        if existing.is_some() {
            return existing;
        }
        if let Ok(Some(lazy)) = self.ensure_initialized_in(key, in_progress) {
            return Some(lazy);
        }
        self.globals
            .get(key)
            .or_else(|| self.registry.try_get_for_any_client(key))
    }

    /// Stores arguments for every declared client whose services are all
    /// realized. Returns how many clients were assigned.
    pub(crate) fn assign_clients(&self) -> usize {
        let mut assigned = 0;
        for client in self.manifest.clients() {
            let args: Option<Vec<Instance>> = {
                let instances = self.instances.read();
                client
                    .arg_keys()
                    .iter()
                    .map(|key| instances.get(key).cloned())
                    .collect()
            };
            match args {
                Some(args) => {
                    self.init_args.assign(client.client_key(), args);
                    self.observers.client_assigned(&client.client_key());
                    assigned += 1;
                }
                None => debug!(
                    client = client.client_key().display_name(),
                    "Client arguments not all available"
                ),
            }
        }
        assigned
    }
}
