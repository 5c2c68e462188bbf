//! Object graph contract and an in-memory scene graph.
//!
//! The locator never mutates the host's object graph. It asks for live
//! objects by concrete type and for hierarchy relationships when checking
//! provider visibility.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::key::Key;
use crate::types::Instance;

/// Node in the host's hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Logical grouping of nodes, for example a loaded scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

/// A live object and where it sits, if anywhere.
#[derive(Debug, Clone)]
pub struct Located {
    pub instance: Instance,
    pub node: Option<NodeId>,
}

/// Read-only view of the host's live objects and hierarchy.
pub trait ObjectGraph: Send + Sync {
    /// Every live object whose concrete type is `concrete`. The universal
    /// object key returns every live object.
    fn find_all(&self, concrete: &Key) -> Vec<Located>;

    fn find_first(&self, concrete: &Key) -> Option<Located> {
        self.find_all(concrete).into_iter().next()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn group(&self, node: NodeId) -> Option<GroupId>;

    fn contains(&self, node: NodeId) -> bool;

    /// Whether the primary group has finished loading. Scene lookups that
    /// miss before that point stay silent.
    fn is_primary_group_loaded(&self) -> bool {
        true
    }
}

/// Topmost ancestor of `node` (the node itself when it has no parent).
pub fn root_of(graph: &dyn ObjectGraph, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(parent) = graph.parent(current) {
        current = parent;
    }
    current
}

/// Number of parent steps from `node` up to `ancestor`, `Some(0)` when
/// they are the same node, `None` when `ancestor` is not above `node`.
pub fn distance_up(graph: &dyn ObjectGraph, node: NodeId, ancestor: NodeId) -> Option<usize> {
    let mut current = node;
    let mut steps = 0;
    loop {
        if current == ancestor {
            return Some(steps);
        }
        current = graph.parent(current)?;
        steps += 1;
    }
}

struct NodeData {
    parent: Option<NodeId>,
    group: GroupId,
    objects: Vec<Instance>,
}

#[derive(Default)]
struct SceneInner {
    // Indexed by node id; removed nodes leave a hole.
    nodes: Vec<Option<NodeData>>,
    detached: Vec<Instance>,
}

/// In-memory [`ObjectGraph`].
///
/// Nodes are created as roots of a group or as children of an existing
/// node (children inherit the parent's group). Objects are attached to a
/// node or kept detached.
///
/// # Examples
///
/// ```rust
/// use ferrous_locator::{GroupId, ObjectGraph, SceneGraph};
///
/// let scene = SceneGraph::new();
/// let level = scene.add_root(GroupId(1));
/// let player = scene.add_child(level).unwrap();
///
/// assert_eq!(scene.parent(player), Some(level));
/// assert_eq!(scene.group(player), Some(GroupId(1)));
/// ```
pub struct SceneGraph {
    inner: RwLock<SceneInner>,
    primary_loaded: AtomicBool,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SceneInner::default()),
            primary_loaded: AtomicBool::new(true),
        }
    }

    pub fn add_root(&self, group: GroupId) -> NodeId {
        self.push_node(None, group)
    }

    /// Adds a child under `parent`; `None` when the parent does not exist.
    pub fn add_child(&self, parent: NodeId) -> Option<NodeId> {
        let group = self.group(parent)?;
        Some(self.push_node(Some(parent), group))
    }

    fn push_node(&self, parent: Option<NodeId>, group: GroupId) -> NodeId {
        let mut inner = self.inner.write();
        let id = NodeId(inner.nodes.len() as u64);
        inner.nodes.push(Some(NodeData { parent, group, objects: Vec::new() }));
        id
    }

    /// Attaches an object to a node. Returns `false` for unknown nodes.
    pub fn attach(&self, node: NodeId, instance: Instance) -> bool {
        let mut inner = self.inner.write();
        match inner.nodes.get_mut(node.0 as usize).and_then(Option::as_mut) {
            Some(data) => {
                data.objects.push(instance);
                true
            }
            None => false,
        }
    }

    /// Adds an object with no hierarchy placement.
    pub fn add_detached(&self, instance: Instance) {
        self.inner.write().detached.push(instance);
    }

    /// Removes a node and its subtree.
    pub fn remove(&self, node: NodeId) {
        let doomed: Vec<NodeId> = {
            let inner = self.inner.read();
            (0..inner.nodes.len() as u64)
                .map(NodeId)
                .filter(|candidate| self.is_within(&inner, *candidate, node))
                .collect()
        };
        let mut inner = self.inner.write();
        for id in doomed {
            if let Some(slot) = inner.nodes.get_mut(id.0 as usize) {
                *slot = None;
            }
        }
    }

    fn is_within(&self, inner: &SceneInner, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = inner
                .nodes
                .get(id.0 as usize)
                .and_then(Option::as_ref)
                .and_then(|data| data.parent);
        }
        false
    }

    pub fn set_primary_group_loaded(&self, loaded: bool) {
        self.primary_loaded.store(loaded, Ordering::SeqCst);
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectGraph for SceneGraph {
    fn find_all(&self, concrete: &Key) -> Vec<Located> {
        let inner = self.inner.read();
        let matches = |instance: &Instance| concrete.is_object() || instance.key() == *concrete;

        let mut found = Vec::new();
        for (index, slot) in inner.nodes.iter().enumerate() {
            if let Some(data) = slot {
                for instance in data.objects.iter().filter(|i| matches(i)) {
                    found.push(Located {
                        instance: instance.clone(),
                        node: Some(NodeId(index as u64)),
                    });
                }
            }
        }
        for instance in inner.detached.iter().filter(|i| matches(i)) {
            found.push(Located { instance: instance.clone(), node: None });
        }
        found
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let inner = self.inner.read();
        inner.nodes.get(node.0 as usize)?.as_ref()?.parent
    }

    fn group(&self, node: NodeId) -> Option<GroupId> {
        let inner = self.inner.read();
        inner.nodes.get(node.0 as usize)?.as_ref().map(|data| data.group)
    }

    fn contains(&self, node: NodeId) -> bool {
        let inner = self.inner.read();
        matches!(inner.nodes.get(node.0 as usize), Some(Some(_)))
    }

    fn is_primary_group_loaded(&self) -> bool {
        self.primary_loaded.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SceneGraph")
            .field("nodes", &inner.nodes.iter().filter(|n| n.is_some()).count())
            .field("detached", &inner.detached.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{key_of, object_key};

    struct Torch;
    crate::described!(Torch);

    #[test]
    fn test_hierarchy_queries() {
        let scene = SceneGraph::new();
        let root = scene.add_root(GroupId(0));
        let child = scene.add_child(root).unwrap();
        let grandchild = scene.add_child(child).unwrap();

        assert_eq!(root_of(&scene, grandchild), root);
        assert_eq!(distance_up(&scene, grandchild, root), Some(2));
        assert_eq!(distance_up(&scene, grandchild, grandchild), Some(0));
        assert_eq!(distance_up(&scene, root, grandchild), None);
    }

    #[test]
    fn test_find_by_concrete_type() {
        let scene = SceneGraph::new();
        let root = scene.add_root(GroupId(0));
        scene.attach(root, Instance::from_value(Torch));
        scene.add_detached(Instance::from_value(Torch));

        let found = scene.find_all(&key_of::<Torch>());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].node, Some(root));
        assert_eq!(found[1].node, None);
        assert_eq!(scene.find_all(&object_key()).len(), 2);
        assert!(scene.find_all(&key_of::<u32>()).is_empty());
    }

    #[test]
    fn test_remove_subtree() {
        let scene = SceneGraph::new();
        let root = scene.add_root(GroupId(0));
        let child = scene.add_child(root).unwrap();
        let other = scene.add_root(GroupId(0));

        scene.remove(root);
        assert!(!scene.contains(root));
        assert!(!scene.contains(child));
        assert!(scene.contains(other));
        assert!(scene.add_child(child).is_none());
    }
}
