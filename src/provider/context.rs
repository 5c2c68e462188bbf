//! Requester context for scoped resolution.

use crate::error::DiResult;
use crate::graph::NodeId;
use crate::key::Key;
use crate::provider::ServiceContainer;
use crate::traits::ResolverCore;
use crate::types::Instance;

/// Who is asking for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requester {
    /// A requester placed in the object graph.
    Node(NodeId),
    /// A requester with no placement, such as a plain object.
    Detached,
}

impl From<NodeId> for Requester {
    fn from(node: NodeId) -> Self {
        Requester::Node(node)
    }
}

impl From<Option<NodeId>> for Requester {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(Requester::Detached, Requester::Node)
    }
}

/// Resolver bound to one requester.
///
/// Resolution prefers the nearest scoped provider visible to the
/// requester and falls back to the container's process-wide services.
///
/// # Examples
///
/// ```
/// use ferrous_locator::{
///     described, key_of, GroupId, Instance, ProviderId, Resolver, SceneGraph, ServiceManifest,
///     Visibility,
/// };
/// use std::sync::Arc;
///
/// struct Theme(&'static str);
/// described!(Theme);
///
/// let graph = Arc::new(SceneGraph::new());
/// let menu = graph.add_root(GroupId(1));
/// let button = graph.add_child(menu).unwrap();
///
/// let container = ServiceManifest::new().container().with_graph(graph.clone()).build();
/// container.start();
/// container
///     .register_provider(
///         ProviderId::next(),
///         Some(menu),
///         &[(key_of::<Theme>(), Instance::from_value(Theme("dark")))],
///         Visibility::InDescendants,
///     )
///     .unwrap();
///
/// assert_eq!(container.resolver_for(button).get::<Theme>().unwrap().0, "dark");
/// assert!(container.get::<Theme>().is_err());
/// ```
pub struct ClientResolver<'a> {
    container: &'a ServiceContainer,
    requester: Requester,
}

impl<'a> ClientResolver<'a> {
    pub(crate) fn new(container: &'a ServiceContainer, requester: Requester) -> Self {
        Self { container, requester }
    }

    pub fn requester(&self) -> Requester {
        self.requester
    }
}

impl ResolverCore for ClientResolver<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<Instance> {
        self.container.resolve_for(key, self.requester)
    }
}
