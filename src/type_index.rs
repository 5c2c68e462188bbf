//! Index from requested types to the concrete types that satisfy them.
//!
//! For every requested key the index keeps the most derived known
//! concrete types (a type always stays findable under its own key) and,
//! separately, the wrapper types that stand in for it.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::graph::ObjectGraph;
use crate::key::{object_key, Key};
use crate::types::{Instance, TypeInfo};

/// Default number of indirection steps followed when converting.
pub const DEFAULT_UNWRAP_DEPTH: usize = 4;

#[derive(Default)]
struct Tables {
    infos: AHashMap<Key, Arc<TypeInfo>>,
    findable: AHashMap<Key, Vec<Key>>,
    wrappers: AHashMap<Key, Vec<Key>>,
}

/// Requested type to findable and wrapper types.
///
/// Built once from the type universe; wrappers may be added later, the
/// tables only ever grow.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{described, key_of, type_info_of, TypeIndex};
///
/// trait Weapon: Send + Sync {}
/// struct Sword;
/// impl Weapon for Sword {}
/// described!(Sword: dyn Weapon);
///
/// let index = TypeIndex::build([type_info_of::<Sword>()]);
/// assert_eq!(index.findable_types(&key_of::<dyn Weapon>()), vec![key_of::<Sword>()]);
/// assert!(index.findable_types(&key_of::<u8>()).is_empty());
/// ```
pub struct TypeIndex {
    tables: RwLock<Tables>,
    unwrap_depth: usize,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            unwrap_depth: DEFAULT_UNWRAP_DEPTH,
        }
    }

    /// Builds the index from the type universe, in registration order.
    pub fn build(types: impl IntoIterator<Item = Arc<TypeInfo>>) -> Self {
        let index = Self::new();
        for info in types {
            index.register(info);
        }
        index
    }

    pub(crate) fn with_unwrap_depth(mut self, depth: usize) -> Self {
        self.unwrap_depth = depth;
        self
    }

    /// Adds one type. Registering the same type twice is ignored.
    pub fn register(&self, info: Arc<TypeInfo>) {
        let key = info.key();
        {
            let mut tables = self.tables.write();
            if tables.infos.contains_key(&key) {
                warn!(type_name = key.display_name(), "type registered twice, ignoring");
                return;
            }
            tables.infos.insert(key, info.clone());
            for target in info.view_keys() {
                add_most_derived(&mut tables, target, &info);
            }
        }
        if info.wrapped_key().is_some() {
            self.register_wrapper(info);
        }
    }

    /// Registers `wrapper` against its wrapped type and every view of it.
    pub fn register_wrapper(&self, wrapper: Arc<TypeInfo>) {
        let Some(target) = wrapper.wrapped_key() else {
            warn!(type_name = wrapper.name(), "type declares no wrapped type");
            return;
        };
        let target_info = {
            let tables = self.tables.read();
            tables.infos.get(&target).cloned()
        }
        .or_else(|| wrapper.wrapped_info());

        let mut tables = self.tables.write();
        tables.infos.entry(wrapper.key()).or_insert_with(|| wrapper.clone());
        match target_info {
            Some(target_info) => {
                for view in target_info.view_keys() {
                    push_unique(tables.wrappers.entry(view).or_default(), wrapper.key());
                }
            }
            None => {
                warn!(
                    wrapper = wrapper.name(),
                    wrapped = target.display_name(),
                    "wrapped type is unknown, registering against its own key only"
                );
                push_unique(tables.wrappers.entry(target).or_default(), wrapper.key());
            }
        }
        debug!(wrapper = wrapper.name(), wrapped = target.display_name(), "wrapper registered");
    }

    /// Concrete types to probe for `requested`, most recently registered
    /// first. The universal object type yields itself; unknown types yield
    /// nothing.
    pub fn findable_types(&self, requested: &Key) -> Vec<Key> {
        if requested.is_object() {
            return vec![object_key()];
        }
        let tables = self.tables.read();
        tables
            .findable
            .get(requested)
            .map(|types| types.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    /// Wrapper types standing in for `requested`, most recent first.
    pub fn wrapper_types(&self, requested: &Key) -> Vec<Key> {
        let tables = self.tables.read();
        tables
            .wrappers
            .get(requested)
            .map(|types| types.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    pub fn type_info(&self, key: &Key) -> Option<Arc<TypeInfo>> {
        self.tables.read().infos.get(key).cloned()
    }

    pub fn is_known(&self, key: &Key) -> bool {
        self.tables.read().infos.contains_key(key)
    }

    /// Whether a `from` instance directly satisfies `to`.
    pub fn is_assignable(&self, from: &Key, to: &Key) -> bool {
        if from == to || to.is_object() {
            return true;
        }
        self.type_info(from)
            .map(|info| info.is_assignable_to(to))
            .unwrap_or(false)
    }

    /// First live object that satisfies `requested`, directly or through
    /// a wrapper.
    pub fn find_any(&self, requested: &Key, graph: &dyn ObjectGraph) -> Option<Instance> {
        for concrete in self.findable_types(requested) {
            for located in graph.find_all(&concrete) {
                if let Some(found) = located.instance.convert(requested, self.unwrap_depth) {
                    return Some(found);
                }
            }
        }
        for wrapper in self.wrapper_types(requested) {
            for located in graph.find_all(&wrapper) {
                if let Some(found) = located.instance.convert(requested, self.unwrap_depth) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Every live object that satisfies `requested`, without duplicates.
    pub fn find_all(&self, requested: &Key, graph: &dyn ObjectGraph) -> Vec<Instance> {
        let mut found: Vec<Instance> = Vec::new();
        let candidates = self
            .findable_types(requested)
            .into_iter()
            .chain(self.wrapper_types(requested));
        for concrete in candidates {
            for located in graph.find_all(&concrete) {
                if let Some(instance) = located.instance.convert(requested, self.unwrap_depth) {
                    if !found.iter().any(|f| f.ptr_eq(&instance)) {
                        found.push(instance);
                    }
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.tables.read().infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("TypeIndex")
            .field("types", &tables.infos.len())
            .field("findable", &tables.findable.len())
            .field("wrappers", &tables.wrappers.len())
            .finish()
    }
}

fn add_most_derived(tables: &mut Tables, target: Key, info: &Arc<TypeInfo>) {
    let own_key = info.key();
    let Tables { infos, findable, .. } = tables;
    let entries = findable.entry(target).or_default();

    // An existing entry more specific than the newcomer wins, except under
    // the newcomer's own key.
    if own_key != target {
        let shadowed = entries.iter().any(|existing| {
            infos
                .get(existing)
                .map(|existing| existing.is_more_specific_than(info))
                .unwrap_or(false)
        });
        if shadowed {
            return;
        }
    }

    entries.retain(|existing| *existing == target || !info.is_assignable_to(existing));
    push_unique(entries, own_key);
}

fn push_unique(entries: &mut Vec<Key>, key: Key) {
    if !entries.contains(&key) {
        entries.push(key);
    }
}
