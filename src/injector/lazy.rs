//! On-demand construction of lazy services.

use tracing::{debug, info};

use crate::error::DiResult;
use crate::internal::InProgress;
use crate::key::Key;
use crate::provider::{ContainerInner, ServiceContainer};
use crate::types::Instance;

use super::InjectorState;

impl ServiceContainer {
    /// Realizes the lazy service defined by `defining` if it is still
    /// pending.
    ///
    /// Returns the instance when one exists afterwards. The pending entry
    /// is removed before construction begins, so a service is constructed
    /// at most once even when its own construction asks for it again.
    pub fn ensure_initialized(&self, defining: &Key) -> Option<Instance> {
        self.inner.ensure_initialized(defining)
    }

    /// Whether `defining` still waits for its first demand.
    pub fn is_pending(&self, defining: &Key) -> bool {
        self.inner.uninitialized.lock().contains_key(defining)
    }
}

impl ContainerInner {
    pub(crate) fn ensure_initialized(&self, defining: &Key) -> Option<Instance> {
        let in_progress = InProgress::new(self.options.max_depth);
        self.ensure_initialized_in(defining, &in_progress).ok().flatten()
    }

    /// Lazy realization sharing the caller's in-progress set.
    ///
    /// `Ok(None)` when `defining` has no pending lazy declaration.
    pub(crate) fn ensure_initialized_in(
        &self,
        defining: &Key,
        in_progress: &InProgress,
    ) -> DiResult<Option<Instance>> {
        let existing = self.instances.read().get(defining).cloned();
        if existing.is_some() {
            return Ok(existing);
        }
        let Some(index) = self.uninitialized.lock().remove(defining) else {
            return Ok(None);
        };
        let Some(decl) = self.manifest.services().get(index) else {
            return Ok(None);
        };

        let instance = match self.realize(decl, in_progress) {
            Ok(instance) => instance,
            Err(error) => {
                self.report_failure(decl, &error);
                return Err(error);
            }
        };

        self.observers.lazy_initialized(defining);
        if self.options.log_lazy_init {
            info!(defining_type = defining.display_name(), "Lazy service initialized");
        } else {
            debug!(defining_type = defining.display_name(), "Lazy service initialized");
        }

        // During construction the cross pass still runs over everything.
        let state = self.state();
        if state != InjectorState::Constructing {
            self.inject_cross(&instance, in_progress);
        }
        if state == InjectorState::Ready {
            let owned: Vec<Instance> = self
                .owned
                .lock()
                .iter()
                .filter(|known| known.ptr_eq(&instance))
                .cloned()
                .collect();
            self.broadcast_lifecycle(&owned);
        }
        Ok(Some(instance))
    }
}
