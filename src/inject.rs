//! Depth-bounded dependency injection over freshly loaded subtrees.
//!
//! [`inject`] walks a subtree in pre-order and hands every visited node to a
//! [`Resolver`]. The root is depth 1, so a depth of 2 covers the root and its
//! direct children, a depth of 1 only the root.
//!
//! [`Container`] is a small type-keyed resolver: nodes list what they need in
//! a [`Requires`] component and receive an [`Injected`] component holding the
//! bound values.
//!
//! # Example
//!
//! ```
//! use stagehand::{Container, DependencyInjector, Injected, Requires, SceneTree};
//!
//! struct Settings { volume: f32 }
//!
//! let mut tree = SceneTree::new();
//! let hud = tree.spawn_with("Hud", (Requires::new().with::<Settings>(),));
//!
//! let mut container = Container::new();
//! container.bind(Settings { volume: 0.8 });
//!
//! let mut injector = DependencyInjector::new(container);
//! injector.inject(&mut tree, hud, 1).unwrap();
//!
//! let injected = tree.get::<Injected>(hud).unwrap();
//! assert_eq!(injected.get::<Settings>().unwrap().volume, 0.8);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::InjectError;
use crate::tree::{NodeId, SceneTree};

/// The one capability the injection walk needs from a tree.
pub trait Hierarchy {
    /// Direct children of `node` in insertion order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;
}

/// Per-node injection step. Binding logic is entirely up to the implementor.
pub trait Resolver<H: ?Sized> {
    fn resolve(&mut self, graph: &mut H, node: NodeId) -> Result<(), InjectError>;
}

impl<H: ?Sized, F> Resolver<H> for F
where
    F: FnMut(&mut H, NodeId) -> Result<(), InjectError>,
{
    fn resolve(&mut self, graph: &mut H, node: NodeId) -> Result<(), InjectError> {
        self(graph, node)
    }
}

/// Resolve `root` and its descendants down to `max_depth` levels.
///
/// Returns the number of visited nodes.
pub fn inject<H, R>(
    graph: &mut H,
    resolver: &mut R,
    root: NodeId,
    max_depth: usize,
) -> Result<usize, InjectError>
where
    H: Hierarchy + ?Sized,
    R: Resolver<H> + ?Sized,
{
    if max_depth == 0 {
        return Err(InjectError::InvalidDepth(max_depth));
    }
    let mut visited = 0;
    visit(graph, resolver, root, 1, max_depth, &mut visited)?;
    debug!(%root, max_depth, visited, "injected subtree");
    Ok(visited)
}

fn visit<H, R>(
    graph: &mut H,
    resolver: &mut R,
    node: NodeId,
    depth: usize,
    max_depth: usize,
    visited: &mut usize,
) -> Result<(), InjectError>
where
    H: Hierarchy + ?Sized,
    R: Resolver<H> + ?Sized,
{
    trace!(%node, depth, "resolve");
    resolver.resolve(graph, node)?;
    *visited += 1;

    if depth < max_depth {
        for child in graph.children(node) {
            visit(graph, resolver, child, depth + 1, max_depth, visited)?;
        }
    }
    Ok(())
}

/// Owns a resolver and runs bounded injection walks with it.
#[derive(Debug, Default)]
pub struct DependencyInjector<R> {
    resolver: R,
}

impl<R> DependencyInjector<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    pub fn into_inner(self) -> R {
        self.resolver
    }

    /// See [`inject`].
    pub fn inject<H>(
        &mut self,
        graph: &mut H,
        root: NodeId,
        max_depth: usize,
    ) -> Result<usize, InjectError>
    where
        H: Hierarchy + ?Sized,
        R: Resolver<H>,
    {
        inject(graph, &mut self.resolver, root, max_depth)
    }
}

type Binding = Arc<dyn Any + Send + Sync>;

/// A dependency a node asks for, identified by type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
}

impl Dependency {
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Component listing the dependencies a node wants injected.
#[derive(Clone, Debug, Default)]
pub struct Requires(Vec<Dependency>);

impl Requires {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self) -> Self {
        self.0.push(Dependency::of::<T>());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Component holding the values a [`Container`] injected into a node.
#[derive(Clone, Default)]
pub struct Injected {
    values: HashMap<TypeId, Binding>,
}

impl Injected {
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Injected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injected")
            .field("values", &self.values.len())
            .finish()
    }
}

/// Type-keyed singleton bindings.
#[derive(Default)]
pub struct Container {
    bindings: HashMap<TypeId, Binding>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` as the singleton for its type, replacing any earlier binding.
    pub fn bind<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.bind_arc(Arc::new(value))
    }

    /// Bind an already shared value.
    pub fn bind_arc<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> &mut Self {
        self.bindings.insert(TypeId::of::<T>(), value);
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.bindings
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl Resolver<SceneTree> for Container {
    fn resolve(&mut self, tree: &mut SceneTree, node: NodeId) -> Result<(), InjectError> {
        if !tree.contains(node) {
            return Err(InjectError::MissingNode(node));
        }
        // Nodes that ask for nothing are left untouched.
        let Some(requires) = tree.get::<Requires>(node) else {
            return Ok(());
        };

        let mut injected = tree.get::<Injected>(node).unwrap_or_default();
        for dependency in requires.iter() {
            let value = self.bindings.get(&dependency.type_id).ok_or(
                InjectError::Unbound {
                    node,
                    dependency: dependency.type_name,
                },
            )?;
            injected
                .values
                .insert(dependency.type_id, Arc::clone(value));
        }

        tree.insert(node, injected)
            .map_err(|_| InjectError::MissingNode(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audio;
    struct Score(u32);

    /// Level -> (A -> A1), B
    fn three_levels(tree: &mut SceneTree) -> (NodeId, NodeId, NodeId, NodeId) {
        let level = tree.spawn("Level");
        let a = tree.spawn("A");
        let a1 = tree.spawn("A1");
        let b = tree.spawn("B");
        tree.add_child(level, a).unwrap();
        tree.add_child(a, a1).unwrap();
        tree.add_child(level, b).unwrap();
        (level, a, a1, b)
    }

    fn visit_order(tree: &mut SceneTree, root: NodeId, depth: usize) -> Vec<NodeId> {
        let mut seen = Vec::new();
        let mut record = |_: &mut SceneTree, node: NodeId| -> Result<(), InjectError> {
            seen.push(node);
            Ok(())
        };
        inject(tree, &mut record, root, depth).unwrap();
        seen
    }

    #[test]
    fn depth_two_stops_at_direct_children() {
        let mut tree = SceneTree::new();
        let (level, a, _a1, b) = three_levels(&mut tree);
        assert_eq!(visit_order(&mut tree, level, 2), vec![level, a, b]);
    }

    #[test]
    fn depth_one_visits_only_the_root() {
        let mut tree = SceneTree::new();
        let (level, ..) = three_levels(&mut tree);
        assert_eq!(visit_order(&mut tree, level, 1), vec![level]);
    }

    #[test]
    fn deep_bound_visits_in_preorder() {
        let mut tree = SceneTree::new();
        let (level, a, a1, b) = three_levels(&mut tree);
        assert_eq!(visit_order(&mut tree, level, 10), vec![level, a, a1, b]);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let mut tree = SceneTree::new();
        let (level, ..) = three_levels(&mut tree);
        let mut noop = |_: &mut SceneTree, _: NodeId| -> Result<(), InjectError> { Ok(()) };
        assert!(matches!(
            inject(&mut tree, &mut noop, level, 0),
            Err(InjectError::InvalidDepth(0))
        ));
    }

    #[test]
    fn container_fills_requirements() {
        let mut tree = SceneTree::new();
        let level = tree.spawn_with("Level", (Requires::new().with::<Audio>().with::<Score>(),));
        let plain = tree.spawn("Plain");
        tree.add_child(level, plain).unwrap();

        let mut container = Container::new();
        container.bind(Audio).bind(Score(42));
        let mut injector = DependencyInjector::new(container);

        assert_eq!(injector.inject(&mut tree, level, 2).unwrap(), 2);

        let injected = tree.get::<Injected>(level).unwrap();
        assert_eq!(injected.len(), 2);
        assert_eq!(injected.get::<Score>().unwrap().0, 42);
        assert!(injected.get::<Audio>().is_some());
        assert!(!tree.has::<Injected>(plain));
    }

    #[test]
    fn unbound_requirement_fails() {
        let mut tree = SceneTree::new();
        let level = tree.spawn_with("Level", (Requires::new().with::<Score>(),));
        let mut container = Container::new();

        let err = inject(&mut tree, &mut container, level, 1).unwrap_err();
        match err {
            InjectError::Unbound { node, dependency } => {
                assert_eq!(node, level);
                assert!(dependency.ends_with("Score"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
