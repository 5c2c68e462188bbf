//! Instance acquisition strategies.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::args::MAX_ARITY;
use crate::collection::{Constructor, Location, ServiceDeclaration};
use crate::error::{DiError, DiResult};
use crate::internal::InProgress;
use crate::key::Key;
use crate::provider::ContainerInner;
use crate::types::Instance;

use super::InjectorState;

impl ContainerInner {
    /// Instance for `decl`, reusing the one already realized for its class.
    pub(crate) fn realize(&self, decl: &ServiceDeclaration, in_progress: &InProgress) -> DiResult<Instance> {
        let class = decl.class_key();
        let defining = decl.defining_key();
        let depth = self.options.max_unwrap_depth;

        let existing = self.instances.read().get(&class).cloned();
        if let Some(existing) = existing {
            let instance = existing.convert(&defining, depth).ok_or(DiError::TypeMismatch {
                expected: defining.display_name(),
                found: existing.type_name(),
            })?;
            self.record(decl, &instance, false);
            return Ok(instance);
        }

        let _guard = in_progress.enter(class)?;
        let started = Instant::now();
        let raw = self.load_instance(decl, in_progress)?;
        let instance = raw.convert(&defining, depth).ok_or(DiError::TypeMismatch {
            expected: defining.display_name(),
            found: raw.type_name(),
        })?;

        if let Some(as_class) = raw.convert(&class, depth) {
            if !as_class.ptr_eq(&instance) {
                self.instances.write().insert(class, as_class);
            }
        }
        self.record(decl, &instance, decl.location() == &Location::Construct);

        let elapsed = started.elapsed();
        self.observers.service_created(&class, &defining, elapsed);
        if self.options.log_service_creation {
            info!(
                service = class.display_name(),
                defining_type = defining.display_name(),
                elapsed_us = elapsed.as_micros() as u64,
                "Service created"
            );
        } else {
            debug!(
                service = class.display_name(),
                defining_type = defining.display_name(),
                "Service created"
            );
        }
        Ok(instance)
    }

    /// Stores `instance` under the defining and concrete keys and in the
    /// global slot.
    fn record(&self, decl: &ServiceDeclaration, instance: &Instance, owned: bool) {
        let defining = decl.defining_key();
        {
            let mut instances = self.instances.write();
            instances.insert(defining, instance.clone());
            instances.entry(instance.key()).or_insert_with(|| instance.clone());
        }
        {
            let mut realized = self.realized.lock();
            if !realized.iter().any(|known| known.ptr_eq(instance)) {
                realized.push(instance.clone());
                if owned {
                    self.owned.lock().push(instance.clone());
                }
            }
        }
        self.globals.set(&defining, instance.clone());
    }

    fn load_instance(&self, decl: &ServiceDeclaration, in_progress: &InProgress) -> DiResult<Instance> {
        let missing = || DiError::MissingLocationTarget {
            service: decl.name(),
            location: decl.location().to_string(),
        };

        match decl.location() {
            Location::FindInScene => self.find_in_scene(decl).ok_or_else(missing),
            Location::ResourcePath(path) => self.assets.load_by_path(path).ok_or_else(missing),
            Location::CatalogKey(key) => {
                if !self.options.catalog_lookup || !self.assets.supports_catalog() {
                    return Err(DiError::MissingLocationTarget {
                        service: decl.name(),
                        location: format!("{} (catalog unavailable)", decl.location()),
                    });
                }
                self.assets.load_by_key(key).ok_or_else(missing)
            }
            Location::EditorAsset(path) => self.assets.load_editor_asset(path).ok_or_else(missing),
            Location::Construct => self.construct(decl, in_progress),
        }
    }

    // Live object of the class, then a wrapper or initializer of it, then a
    // provider that serves every client.
    fn find_in_scene(&self, decl: &ServiceDeclaration) -> Option<Instance> {
        let class = decl.class_key();
        if let Some(found) = self.graph.find_first(&class) {
            return Some(found.instance);
        }
        for wrapper in self.type_index.wrapper_types(&class) {
            for located in self.graph.find_all(&wrapper) {
                if located.instance.convert(&class, self.options.max_unwrap_depth).is_some() {
                    return Some(located.instance);
                }
            }
        }
        self.registry.try_get_for_any_client(&decl.defining_key())
    }

    fn construct(&self, decl: &ServiceDeclaration, in_progress: &InProgress) -> DiResult<Instance> {
        let mut cycle: Option<DiError> = None;

        for constructor in decl.constructors() {
            if constructor.arity() > 0 && !self.options.constructor_injection {
                continue;
            }

            let mut args: SmallVec<[Instance; MAX_ARITY]> = SmallVec::new();
            for param in constructor.params() {
                match self.try_get_or_create_service(param, in_progress) {
                    Ok(arg) => args.push(arg),
                    Err(error) if error.is_fatal_for_chain() => return Err(error),
                    Err(error) => {
                        if error.is_cycle() && cycle.is_none() {
                            cycle = Some(error);
                        }
                        break;
                    }
                }
            }
            if args.len() < constructor.arity() {
                continue;
            }

            // While constructing, the cross pass that follows sees every
            // declared service; arguments are only initialized early once
            // that pass has begun.
            if self.state() != InjectorState::Constructing {
                for arg in &args {
                    self.inject_cross(arg, in_progress);
                }
            }
            if let Some(instance) = invoke_guarded(decl, constructor, &args)? {
                return Ok(instance);
            }
        }

        Err(cycle.unwrap_or(DiError::NoViableConstructor(decl.name())))
    }

    /// Realized or realizable service for `key`, for constructor parameters.
    ///
    /// A declaration is found through its defining type first, then
    /// through its concrete class, so a concrete parameter resolves the
    /// same way whatever the declaration order.
    pub(crate) fn try_get_or_create_service(&self, key: &Key, in_progress: &InProgress) -> DiResult<Instance> {
        let existing = self.instances.read().get(key).cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }
        if let Some(lazy) = self.ensure_initialized_in(key, in_progress)? {
            return Ok(lazy);
        }

        let services = self.manifest.services();
        let declared = services
            .iter()
            .enumerate()
            .find(|(_, decl)| !decl.is_lazy() && decl.defining_key() == *key)
            .or_else(|| services.iter().enumerate().find(|(_, decl)| decl.class_key() == *key));
        if let Some((index, decl)) = declared {
            let realized = if decl.is_lazy() {
                self.ensure_initialized_in(&decl.defining_key(), in_progress)?
            } else {
                Some(self.realize_declared(index, decl, in_progress)?)
            };
            if let Some(instance) = realized {
                return instance
                    .convert(key, self.options.max_unwrap_depth)
                    .ok_or(DiError::TypeMismatch {
                        expected: key.display_name(),
                        found: instance.type_name(),
                    });
            }
        }

        if let Some(global) = self.globals.get(key) {
            return Ok(global);
        }
        Err(DiError::NotFound(key.display_name()))
    }

    /// [`realize`](Self::realize) for the declaration at `index`, run at most
    /// once per start.
    ///
    /// A failure is remembered unless it came from the cycle guard or the
    /// depth limit, which depend on who asked.
    pub(crate) fn realize_declared(
        &self,
        index: usize,
        decl: &ServiceDeclaration,
        in_progress: &InProgress,
    ) -> DiResult<Instance> {
        let known = self.failed.lock().get(&index).cloned();
        if let Some(error) = known {
            return Err(error);
        }
        let result = self.realize(decl, in_progress);
        if let Err(error) = &result {
            if !error.depends_on_requester() {
                self.failed.lock().insert(index, error.clone());
            }
        }
        result
    }
}

fn invoke_guarded(
    decl: &ServiceDeclaration,
    constructor: &Constructor,
    args: &[Instance],
) -> DiResult<Option<Instance>> {
    panic::catch_unwind(AssertUnwindSafe(|| constructor.invoke(args))).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        DiError::ConstructorPanicked {
            service: decl.name(),
            message,
        }
    })
}
