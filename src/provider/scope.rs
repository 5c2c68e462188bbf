//! Scene-scoped service registry.
//!
//! Providers placed in the object graph register the services they hold
//! together with a [`Visibility`]. Requests made on behalf of a placed
//! requester resolve to the nearest visible provider.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::{DiError, DiResult};
use crate::graph::{distance_up, root_of, NodeId, ObjectGraph};
use crate::key::Key;
use crate::provider::context::Requester;
use crate::type_index::DEFAULT_UNWRAP_DEPTH;
use crate::types::Instance;

/// Which requesters may resolve a provided service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Visibility {
    /// Only requests made from the provider's own node.
    InSameContainer,
    /// The provider's node and everything below it.
    InDescendants,
    /// The provider's node and everything above it.
    InAncestors,
    /// Anything under the same hierarchy root.
    InSameRootGroup,
    /// Anything in the same group (scene).
    InSameContainerGroup,
    /// Any placed requester.
    AcrossAllGroups,
    /// Every requester, placed or not.
    Unrestricted,
}

/// Identity of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

impl ProviderId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ProviderId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// One registered (instance, provider, visibility) entry.
#[derive(Debug, Clone)]
pub struct ProvidedService {
    pub instance: Instance,
    pub provider: ProviderId,
    /// Where the provider sits, `None` for providers outside the graph.
    pub node: Option<NodeId>,
    pub visibility: Visibility,
}

/// Defining type to the services active providers expose for it.
///
/// Entries for one defining type are kept in registration order; the
/// order is the tie-break when two candidates are equally near.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{
///     described, key_of, GroupId, Instance, ProviderId, Requester, SceneGraph, ServiceRegistry,
///     Visibility,
/// };
///
/// struct Music;
/// described!(Music);
///
/// let graph = SceneGraph::new();
/// let level = graph.add_root(GroupId(1));
/// let room = graph.add_child(level).unwrap();
///
/// let registry = ServiceRegistry::new();
/// let music = Instance::from_value(Music);
/// registry
///     .register(ProviderId::next(), Some(level), &[(key_of::<Music>(), music.clone())], Visibility::InDescendants, &graph)
///     .unwrap();
///
/// let found = registry.try_get_for(&key_of::<Music>(), Requester::Node(room), &graph).unwrap();
/// assert!(found.unwrap().ptr_eq(&music));
/// assert!(registry.try_get_for_any_client(&key_of::<Music>()).is_none());
/// ```
pub struct ServiceRegistry {
    entries: RwLock<AHashMap<Key, Vec<ProvidedService>>>,
    ambiguity_warnings: bool,
    unwrap_depth: usize,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            ambiguity_warnings: true,
            unwrap_depth: DEFAULT_UNWRAP_DEPTH,
        }
    }

    pub(crate) fn with_options(ambiguity_warnings: bool, unwrap_depth: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            ambiguity_warnings,
            unwrap_depth,
        }
    }

    /// Adds one entry per `(defining type, instance)` pair.
    ///
    /// An instance that does not satisfy its defining type is replaced by
    /// the value its indirection resolves to; pairs that still don't match
    /// are skipped with a warning. Returns the number of entries added.
    pub fn register(
        &self,
        provider: ProviderId,
        node: Option<NodeId>,
        services: &[(Key, Instance)],
        visibility: Visibility,
        graph: &dyn ObjectGraph,
    ) -> DiResult<usize> {
        if let Some(node) = node {
            if !graph.contains(node) {
                return Err(DiError::InvalidArgument(format!(
                    "provider node {:?} is not part of the object graph",
                    node
                )));
            }
        }

        let mut accepted = Vec::with_capacity(services.len());
        for (defining, instance) in services {
            match instance.convert(defining, self.unwrap_depth) {
                Some(converted) => accepted.push((*defining, converted)),
                None => {
                    let error = DiError::TypeMismatch {
                        expected: defining.display_name(),
                        found: instance.type_name(),
                    };
                    warn!(
                        service = instance.type_name(),
                        defining_type = defining.display_name(),
                        reason = %error,
                        "Provided service skipped"
                    );
                }
            }
        }

        let added = accepted.len();
        let mut entries = self.entries.write();
        for (defining, instance) in accepted {
            entries.entry(defining).or_default().push(ProvidedService {
                instance,
                provider,
                node,
                visibility,
            });
        }
        Ok(added)
    }

    /// Removes every entry added by `provider`. Returns how many were removed.
    pub fn deregister(&self, provider: ProviderId) -> usize {
        let mut entries = self.entries.write();
        let mut removed = 0;
        entries.retain(|_, list| {
            let before = list.len();
            list.retain(|entry| entry.provider != provider);
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// Nearest service of type `defining` visible to `requester`.
    ///
    /// Fails only for a requester node the graph doesn't know.
    pub fn try_get_for(
        &self,
        defining: &Key,
        requester: Requester,
        graph: &dyn ObjectGraph,
    ) -> DiResult<Option<Instance>> {
        if let Requester::Node(node) = requester {
            if !graph.contains(node) {
                return Err(DiError::InvalidArgument(format!(
                    "requester node {:?} is not part of the object graph",
                    node
                )));
            }
        }

        let candidates = self.candidates(defining);
        let mut best: Option<ProvidedService> = None;
        for candidate in candidates {
            if !is_visible(&candidate, requester, graph) {
                continue;
            }
            best = Some(match best {
                None => candidate,
                Some(current) => self.nearer(defining, current, candidate, requester, graph),
            });
        }
        Ok(best.map(|entry| entry.instance))
    }

    /// First [`Visibility::Unrestricted`] service of type `defining`.
    pub fn try_get_for_any_client(&self, defining: &Key) -> Option<Instance> {
        let entries = self.entries.read();
        let list = entries.get(defining)?;
        let mut unrestricted = list
            .iter()
            .filter(|entry| entry.visibility == Visibility::Unrestricted);
        let first = unrestricted.next()?;
        if self.ambiguity_warnings && unrestricted.any(|other| !other.instance.ptr_eq(&first.instance)) {
            warn_ambiguous(defining, &first.instance);
        }
        Some(first.instance.clone())
    }

    /// Whether `instance` is registered under `defining` by any provider.
    pub fn is_service(&self, defining: &Key, instance: &Instance) -> bool {
        self.entries
            .read()
            .get(defining)
            .map_or(false, |list| list.iter().any(|entry| entry.instance.ptr_eq(instance)))
    }

    /// Visibility `provider` registered `defining` with.
    pub fn visibility_of(&self, provider: ProviderId, defining: &Key) -> Option<Visibility> {
        self.entries.read().get(defining).and_then(|list| {
            list.iter()
                .find(|entry| entry.provider == provider)
                .map(|entry| entry.visibility)
        })
    }

    /// Number of entries across all defining types.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn candidates(&self, defining: &Key) -> Vec<ProvidedService> {
        self.entries.read().get(defining).cloned().unwrap_or_default()
    }

    // Prefers the same group, then the shorter ancestor chain; otherwise
    // keeps the earlier registration.
    fn nearer(
        &self,
        defining: &Key,
        current: ProvidedService,
        candidate: ProvidedService,
        requester: Requester,
        graph: &dyn ObjectGraph,
    ) -> ProvidedService {
        if current.instance.ptr_eq(&candidate.instance) {
            return current;
        }

        let Requester::Node(at) = requester else {
            self.ambiguous(defining, &current);
            return current;
        };

        let requester_group = graph.group(at);
        let same_group = |entry: &ProvidedService| {
            requester_group.is_some() && entry.node.and_then(|n| graph.group(n)) == requester_group
        };
        match (same_group(&current), same_group(&candidate)) {
            (true, false) => return current,
            (false, true) => return candidate,
            _ => {}
        }

        let distance = |entry: &ProvidedService| {
            entry
                .node
                .and_then(|n| distance_up(graph, at, n).or_else(|| distance_up(graph, n, at)))
        };
        match (distance(&current), distance(&candidate)) {
            (Some(a), Some(b)) if a < b => current,
            (Some(a), Some(b)) if b < a => candidate,
            (Some(_), None) => current,
            (None, Some(_)) => candidate,
            _ => {
                self.ambiguous(defining, &current);
                current
            }
        }
    }

    fn ambiguous(&self, defining: &Key, chosen: &ProvidedService) {
        if self.ambiguity_warnings {
            warn_ambiguous(defining, &chosen.instance);
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("defining_types", &self.entries.read().len())
            .field("entries", &self.len())
            .finish()
    }
}

fn warn_ambiguous(defining: &Key, chosen: &Instance) {
    let error = DiError::AmbiguousVisibility(defining.display_name());
    warn!(
        service = chosen.type_name(),
        defining_type = defining.display_name(),
        reason = %error,
        "Several providers are equally near; using the first registered"
    );
}

fn is_visible(entry: &ProvidedService, requester: Requester, graph: &dyn ObjectGraph) -> bool {
    if entry.visibility == Visibility::Unrestricted {
        return true;
    }
    let Requester::Node(at) = requester else {
        return false;
    };
    if entry.visibility == Visibility::AcrossAllGroups {
        return true;
    }
    let Some(provider) = entry.node else {
        return false;
    };

    match entry.visibility {
        Visibility::InSameContainer => at == provider,
        Visibility::InDescendants => distance_up(graph, at, provider).is_some(),
        Visibility::InAncestors => distance_up(graph, provider, at).is_some(),
        Visibility::InSameRootGroup => root_of(graph, at) == root_of(graph, provider),
        Visibility::InSameContainerGroup => {
            let group = graph.group(at);
            group.is_some() && group == graph.group(provider)
        }
        Visibility::AcrossAllGroups | Visibility::Unrestricted => true,
    }
}
