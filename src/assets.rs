//! Asset loading contract.
//!
//! Loads are synchronous from the locator's point of view and return
//! `None` on a miss.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::types::Instance;

pub trait AssetLoader: Send + Sync {
    /// Loads a resource by path.
    fn load_by_path(&self, path: &str) -> Option<Instance>;

    /// Loads an entry from an external asset catalog.
    fn load_by_key(&self, _key: &str) -> Option<Instance> {
        None
    }

    /// Whether an external catalog is available at all.
    fn supports_catalog(&self) -> bool {
        false
    }

    /// Loads an authoring-time asset; only meaningful inside editor hosts.
    fn load_editor_asset(&self, _path: &str) -> Option<Instance> {
        None
    }
}

/// In-memory [`AssetLoader`].
#[derive(Default)]
pub struct AssetStore {
    resources: RwLock<AHashMap<String, Instance>>,
    catalog: RwLock<Option<AHashMap<String, Instance>>>,
    editor: RwLock<AHashMap<String, Instance>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an (initially empty) catalog.
    pub fn with_catalog() -> Self {
        let store = Self::default();
        *store.catalog.write() = Some(AHashMap::new());
        store
    }

    pub fn insert_resource(&self, path: impl Into<String>, instance: Instance) {
        self.resources.write().insert(path.into(), instance);
    }

    /// Adds a catalog entry, enabling the catalog if needed.
    pub fn insert_catalog_entry(&self, key: impl Into<String>, instance: Instance) {
        self.catalog
            .write()
            .get_or_insert_with(AHashMap::new)
            .insert(key.into(), instance);
    }

    pub fn insert_editor_asset(&self, path: impl Into<String>, instance: Instance) {
        self.editor.write().insert(path.into(), instance);
    }
}

impl AssetLoader for AssetStore {
    fn load_by_path(&self, path: &str) -> Option<Instance> {
        self.resources.read().get(path).cloned()
    }

    fn load_by_key(&self, key: &str) -> Option<Instance> {
        self.catalog.read().as_ref()?.get(key).cloned()
    }

    fn supports_catalog(&self) -> bool {
        self.catalog.read().is_some()
    }

    fn load_editor_asset(&self, path: &str) -> Option<Instance> {
        self.editor.read().get(path).cloned()
    }
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("resources", &self.resources.read().len())
            .field("catalog", &self.catalog.read().as_ref().map(|c| c.len()))
            .field("editor", &self.editor.read().len())
            .finish()
    }
}
