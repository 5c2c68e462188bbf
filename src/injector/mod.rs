//! The construction and injection pipeline.
//!
//! [`ServiceContainer::start`] walks every declaration in manifest order:
//! lazy declarations are parked in the uninitialized index, all others
//! are realized through their location strategy. Once every declaration
//! has been attempted, realized services are cross-injected, declared
//! clients receive their arguments, lifecycle hooks are dispatched and
//! the ready callbacks fire.

use std::fmt;

use tracing::{debug, info, warn};

use crate::collection::{Location, ServiceDeclaration};
use crate::error::DiError;
use crate::internal::InProgress;
use crate::provider::{ContainerInner, ServiceContainer};
use crate::types::Instance;

mod cross;
mod lazy;
mod strategies;

pub(crate) use cross::CrossInjection;

type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectorState {
    #[default]
    NotStarted,
    Constructing,
    CrossInjecting,
    Ready,
}

#[derive(Default)]
pub(crate) struct Lifecycle {
    pub(crate) state: InjectorState,
    pub(crate) ready_callbacks: Vec<ReadyCallback>,
}

/// Outcome of one [`ServiceContainer::start`] call.
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    /// Non-lazy declarations that produced an instance.
    pub constructed: usize,
    /// Declarations parked for construction on demand.
    pub lazy: usize,
    /// Declarations skipped, with the reason.
    pub failed: Vec<(&'static str, DiError)>,
    /// Services whose `init` was invoked by the cross-injection pass.
    pub cross_injected: usize,
    /// Clients that received their arguments.
    pub clients_assigned: usize,
}

impl StartupReport {
    /// True when no declaration failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for StartupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} constructed, {} lazy, {} failed, {} cross-injected, {} clients assigned",
            self.constructed,
            self.lazy,
            self.failed.len(),
            self.cross_injected,
            self.clients_assigned
        )
    }
}

impl ServiceContainer {
    /// Runs the pipeline. Does nothing unless the container is
    /// [`InjectorState::NotStarted`].
    pub fn start(&self) -> StartupReport {
        self.inner.start()
    }

    /// Drops every instance and returns to [`InjectorState::NotStarted`].
    ///
    /// Ready callbacks queued after the last start are kept for the next one.
    pub fn reset(&self) {
        self.inner.reset();
    }
}

impl ContainerInner {
    pub(crate) fn start(&self) -> StartupReport {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != InjectorState::NotStarted {
                debug!(state = ?lifecycle.state, "Pipeline already started");
                return StartupReport::default();
            }
            lifecycle.state = InjectorState::Constructing;
        }

        let declarations = self.manifest.services();
        info!(declarations = declarations.len(), "Initializing services");
        let mut report = StartupReport::default();

        {
            let mut uninitialized = self.uninitialized.lock();
            for (index, decl) in declarations.iter().enumerate() {
                if decl.is_lazy() {
                    uninitialized.insert(decl.defining_key(), index);
                    report.lazy += 1;
                }
            }
        }

        // A declaration already attempted as a dependency is not run again;
        // its stored failure is reported at its own turn.
        for (index, decl) in declarations.iter().enumerate().filter(|(_, decl)| !decl.is_lazy()) {
            let in_progress = InProgress::new(self.options.max_depth);
            match self.realize_declared(index, decl, &in_progress) {
                Ok(_) => report.constructed += 1,
                Err(error) => {
                    self.report_failure(decl, &error);
                    report.failed.push((decl.name(), error));
                }
            }
        }

        self.set_state(InjectorState::CrossInjecting);
        let realized = self.realized.lock().clone();
        for instance in &realized {
            let in_progress = InProgress::new(self.options.max_depth);
            if self.inject_cross(instance, &in_progress) {
                report.cross_injected += 1;
            }
        }
        report.clients_assigned = self.assign_clients();

        let owned = self.owned.lock().clone();
        self.broadcast_lifecycle(&owned);

        let callbacks = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.state = InjectorState::Ready;
            std::mem::take(&mut lifecycle.ready_callbacks)
        };
        self.observers
            .services_ready(report.constructed, report.failed.len());
        info!(
            constructed = report.constructed,
            lazy = report.lazy,
            failed = report.failed.len(),
            cross_injected = report.cross_injected,
            clients = report.clients_assigned,
            "Services ready"
        );
        for callback in callbacks {
            callback();
        }
        report
    }

    pub(crate) fn reset(&self) {
        self.set_state(InjectorState::NotStarted);
        self.instances.write().clear();
        self.uninitialized.lock().clear();
        self.cross_injected.lock().clear();
        self.failed.lock().clear();
        self.realized.lock().clear();
        self.owned.lock().clear();
        self.broadcast.lock().clear();
        self.globals.clear();
        self.registry.clear();
        self.init_args.clear();
        debug!("Services reset");
    }

    pub(crate) fn state(&self) -> InjectorState {
        self.lifecycle.lock().state
    }

    fn set_state(&self, state: InjectorState) {
        self.lifecycle.lock().state = state;
    }

    /// Dispatches lifecycle hooks to instances that haven't had them yet.
    ///
    /// Update-style subscriptions come first, then awake, enable and start,
    /// each across all instances before the next hook type.
    pub(crate) fn broadcast_lifecycle(&self, instances: &[Instance]) {
        let fresh: Vec<Instance> = {
            let mut broadcast = self.broadcast.lock();
            instances
                .iter()
                .filter(|instance| broadcast.insert(instance.addr()))
                .cloned()
                .collect()
        };
        if fresh.is_empty() {
            return;
        }

        for instance in &fresh {
            if let Some(target) = instance.type_info().hooks().update.as_ref().and_then(|h| h(instance.object())) {
                self.broadcaster.subscribe_update(target);
            }
        }
        for instance in &fresh {
            if let Some(target) = instance
                .type_info()
                .hooks()
                .late_update
                .as_ref()
                .and_then(|h| h(instance.object()))
            {
                self.broadcaster.subscribe_late_update(target);
            }
        }
        for instance in &fresh {
            if let Some(target) = instance
                .type_info()
                .hooks()
                .fixed_update
                .as_ref()
                .and_then(|h| h(instance.object()))
            {
                self.broadcaster.subscribe_fixed_update(target);
            }
        }
        for instance in &fresh {
            if let Some(awake) = &instance.type_info().hooks().awake {
                awake(instance.object());
            }
        }
        for instance in &fresh {
            if let Some(on_enable) = &instance.type_info().hooks().on_enable {
                on_enable(instance.object());
            }
        }
        for instance in &fresh {
            if let Some(start) = &instance.type_info().hooks().start {
                start(instance.object());
            }
        }
    }

    /// Logs a skipped declaration and notifies observers.
    pub(crate) fn report_failure(&self, decl: &ServiceDeclaration, error: &DiError) {
        let class = decl.class_key();
        let defining = decl.defining_key();
        self.observers.service_failed(&class, &defining, error);

        let scene_miss = matches!(error, DiError::MissingLocationTarget { .. })
            && decl.location() == &Location::FindInScene;
        if scene_miss
            && (self.options.suppress_missing_scene_warnings || !self.graph.is_primary_group_loaded())
        {
            debug!(
                service = class.display_name(),
                defining_type = defining.display_name(),
                reason = %error,
                "Service not found in scene yet"
            );
            return;
        }

        if self.looks_circular(decl, error) {
            warn!(
                service = class.display_name(),
                defining_type = defining.display_name(),
                reason = %error,
                "Service skipped; this is most likely caused by a circular constructor dependency"
            );
        } else {
            warn!(
                service = class.display_name(),
                defining_type = defining.display_name(),
                reason = %error,
                "Service skipped"
            );
        }
    }

    fn looks_circular(&self, decl: &ServiceDeclaration, error: &DiError) -> bool {
        match error {
            DiError::ConstructorCycle(_) | DiError::DepthExceeded(_) => true,
            DiError::NoViableConstructor(_) => decl.constructors().iter().all(|c| c.arity() > 0),
            _ => false,
        }
    }
}
