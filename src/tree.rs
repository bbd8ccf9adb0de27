//! The live node tree scenes are instantiated into.
//!
//! [`SceneTree`] is the ambient environment the [`SceneManager`](crate::scene::SceneManager)
//! works against. Nodes are `hecs` entities carrying a [`Name`] plus private
//! parent/child links; any other component can be attached to them. The tree
//! owns a global root and a global "current scene" slot, and publishes
//! [`MembershipEvent`]s whenever nodes enter or leave the part of the tree
//! reachable from the root.
//!
//! # Example
//!
//! ```
//! use stagehand::SceneTree;
//!
//! let mut tree = SceneTree::new();
//! let level = tree.spawn("Level");
//! let player = tree.spawn("Player");
//! tree.add_child(level, player).unwrap();
//! tree.add_child(tree.root(), level).unwrap();
//!
//! assert_eq!(tree.get_node(tree.root(), "Level/Player"), Some(player));
//! ```

use crossbeam_channel::{Receiver, Sender};
use glam::Vec4;
use hecs::{Component, DynamicBundle, Entity, EntityBuilder, World};

use crate::error::SceneError;
use crate::inject::Hierarchy;

/// Handle to a node living in a [`SceneTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) Entity);

impl NodeId {
    /// The underlying ECS entity.
    pub fn entity(self) -> Entity {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0.id())
    }
}

/// Display name of a node, used for path lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name(pub String);

/// Z-ordering layer for overlay nodes such as transition effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasLayer(pub i32);

/// RGBA color of a full-screen overlay. Alpha is the overlay opacity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overlay(pub Vec4);

#[derive(Clone, Copy, Debug)]
struct Parent(NodeId);

#[derive(Clone, Debug, Default)]
struct Children(Vec<NodeId>);

/// Whether a node entered or left the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    Added,
    Removed,
}

/// Notification that a node entered or left the tree.
///
/// `ancestors` is captured when the event is raised (nearest parent first),
/// so ancestry checks stay valid after the node itself has been freed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipEvent {
    pub kind: Membership,
    pub node: NodeId,
    pub ancestors: Vec<NodeId>,
}

impl MembershipEvent {
    /// Whether `node` was an ancestor of the subject when the event fired.
    pub fn descends_from(&self, node: NodeId) -> bool {
        self.ancestors.contains(&node)
    }
}

/// Node tree backed by a `hecs` world.
pub struct SceneTree {
    world: World,
    root: NodeId,
    current_scene: Option<NodeId>,
    subscribers: Vec<Sender<MembershipEvent>>,
    frame: u64,
}

impl SceneTree {
    /// Create a tree containing only the global root.
    pub fn new() -> Self {
        let mut world = World::new();
        let root = NodeId(world.spawn((Name("root".to_string()), Children::default())));
        Self {
            world,
            root,
            current_scene: None,
            subscribers: Vec::new(),
            frame: 0,
        }
    }

    /// The global root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The tree-wide current scene slot.
    pub fn current_scene(&self) -> Option<NodeId> {
        self.current_scene
    }

    pub fn set_current_scene(&mut self, scene: Option<NodeId>) {
        self.current_scene = scene;
    }

    /// Spawn a detached node.
    pub fn spawn(&mut self, name: impl Into<String>) -> NodeId {
        NodeId(self.world.spawn((Name(name.into()), Children::default())))
    }

    /// Spawn a detached node with extra components.
    pub fn spawn_with(&mut self, name: impl Into<String>, bundle: impl DynamicBundle) -> NodeId {
        let mut builder = EntityBuilder::new();
        builder.add_bundle(bundle);
        builder.add(Name(name.into()));
        builder.add(Children::default());
        NodeId(self.world.spawn(builder.build()))
    }

    /// Attach a component to a node, replacing any previous value.
    pub fn insert<C: Component>(&mut self, node: NodeId, component: C) -> Result<(), SceneError> {
        self.world
            .insert_one(node.0, component)
            .map_err(|_| SceneError::NodeNotFound(node))
    }

    /// Clone a component out of a node.
    pub fn get<C: Component + Clone>(&self, node: NodeId) -> Option<C> {
        self.world.get::<&C>(node.0).ok().map(|c| (*c).clone())
    }

    pub fn has<C: Component>(&self, node: NodeId) -> bool {
        self.world.get::<&C>(node.0).is_ok()
    }

    pub fn remove<C: Component>(&mut self, node: NodeId) -> Option<C> {
        self.world.remove_one::<C>(node.0).ok()
    }

    /// Read-only access to the underlying world for custom queries.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Whether the node still exists (attached or not).
    pub fn contains(&self, node: NodeId) -> bool {
        self.world.contains(node.0)
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self, node: NodeId) -> Option<String> {
        self.get::<Name>(node).map(|n| n.0)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.world.get::<&Parent>(node.0).ok().map(|p| p.0)
    }

    /// Direct children in insertion order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.world
            .get::<&Children>(node.0)
            .map(|c| c.0.clone())
            .unwrap_or_default()
    }

    /// Ancestor chain, nearest parent first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.parent(node);
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.parent(parent);
        }
        chain
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).contains(&ancestor)
    }

    /// Whether the node is reachable from the global root.
    pub fn is_inside_tree(&self, node: NodeId) -> bool {
        node == self.root || self.ancestors(node).last() == Some(&self.root)
    }

    /// First direct child with the given name.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .into_iter()
            .find(|child| self.name(*child).as_deref() == Some(name))
    }

    /// Resolve a slash separated path of names relative to `from`.
    ///
    /// `..` steps to the parent; empty segments are ignored.
    pub fn get_node(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let mut cursor = from;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            cursor = match segment {
                "." => cursor,
                ".." => self.parent(cursor)?,
                name => self.find_child(cursor, name)?,
            };
        }
        Some(cursor)
    }

    /// The subtree rooted at `node` in pre-order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        order
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// If `parent` is inside the tree, every node of the attached subtree
    /// raises [`Membership::Added`] in pre-order.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        for node in [parent, child] {
            if !self.contains(node) {
                return Err(SceneError::NodeNotFound(node));
            }
        }
        if child == self.root {
            return Err(SceneError::InvalidHierarchy(
                "the root cannot be reparented".to_string(),
            ));
        }
        if let Some(existing) = self.parent(child) {
            return Err(SceneError::InvalidHierarchy(format!(
                "{child} is already a child of {existing}"
            )));
        }
        if parent == child || self.is_ancestor_of(child, parent) {
            return Err(SceneError::InvalidHierarchy(format!(
                "attaching {child} under {parent} would create a cycle"
            )));
        }

        self.world
            .get::<&mut Children>(parent.0)
            .map_err(|_| SceneError::NodeNotFound(parent))?
            .0
            .push(child);
        self.insert(child, Parent(parent))?;

        if self.is_inside_tree(parent) {
            for node in self.descendants(child) {
                self.notify(Membership::Added, node);
            }
        }
        Ok(())
    }

    /// Detach `child` from `parent` without destroying it.
    ///
    /// Raises [`Membership::Removed`] children-first while the links are
    /// still intact.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if self.parent(child) != Some(parent) {
            return Err(SceneError::InvalidHierarchy(format!(
                "{child} is not a child of {parent}"
            )));
        }

        if self.is_inside_tree(parent) {
            for node in self.descendants(child).into_iter().rev() {
                self.notify(Membership::Removed, node);
            }
        }

        if let Ok(mut children) = self.world.get::<&mut Children>(parent.0) {
            children.0.retain(|c| *c != child);
        }
        self.world
            .remove_one::<Parent>(child.0)
            .map_err(|_| SceneError::NodeNotFound(child))?;
        Ok(())
    }

    /// Detach a node and despawn its whole subtree.
    pub fn free(&mut self, node: NodeId) -> Result<(), SceneError> {
        if node == self.root {
            return Err(SceneError::InvalidHierarchy(
                "the root cannot be freed".to_string(),
            ));
        }
        if !self.contains(node) {
            return Err(SceneError::NodeNotFound(node));
        }
        if let Some(parent) = self.parent(node) {
            self.remove_child(parent, node)?;
        }

        for doomed in self.descendants(node) {
            if self.current_scene == Some(doomed) {
                self.current_scene = None;
            }
            self.world
                .despawn(doomed.0)
                .map_err(|_| SceneError::NodeNotFound(doomed))?;
        }
        Ok(())
    }

    /// Subscribe to membership notifications.
    ///
    /// Dropping the receiver unsubscribes on the next notification.
    pub fn subscribe(&mut self) -> Receiver<MembershipEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Mark the start of a new frame.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// Number of frames started so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn notify(&mut self, kind: Membership, node: NodeId) {
        let event = MembershipEvent {
            kind,
            node,
            ancestors: self.ancestors(node),
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy for SceneTree {
    fn children(&self, node: NodeId) -> Vec<NodeId> {
        SceneTree::children(self, node)
    }
}
