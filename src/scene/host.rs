//! Authority modes: who owns the current scene.
//!
//! A [`SceneManager`](super::SceneManager) either owns its scenes itself
//! ([`SelfContained`]) or defers to the tree's global root and current scene
//! slot ([`TreeRooted`]). The mode is picked once when the manager is built.

use crate::tree::{MembershipEvent, NodeId, SceneTree};

/// Where scenes are attached and where the current scene is recorded.
pub trait SceneHost {
    /// Node new scene instances are attached under.
    fn root(&self, tree: &SceneTree) -> NodeId;

    fn current_scene(&self, tree: &SceneTree) -> Option<NodeId>;

    fn set_current_scene(&mut self, tree: &mut SceneTree, scene: Option<NodeId>);

    /// Whether a membership change should be forwarded by the manager.
    fn tracks(&self, event: &MembershipEvent) -> bool;
}

/// The manager's own node is the root; only its descendants are tracked.
#[derive(Debug)]
pub struct SelfContained {
    node: NodeId,
    current: Option<NodeId>,
}

impl SelfContained {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            current: None,
        }
    }
}

impl SceneHost for SelfContained {
    fn root(&self, _tree: &SceneTree) -> NodeId {
        self.node
    }

    fn current_scene(&self, tree: &SceneTree) -> Option<NodeId> {
        self.current.filter(|scene| tree.contains(*scene))
    }

    fn set_current_scene(&mut self, _tree: &mut SceneTree, scene: Option<NodeId>) {
        self.current = scene;
    }

    // Removal can surface after the node is already detached, so this checks
    // the ancestry captured with the event rather than the direct parent.
    fn tracks(&self, event: &MembershipEvent) -> bool {
        event.descends_from(self.node)
    }
}

/// The tree's global root and current scene slot are used; everything is tracked.
#[derive(Debug, Default)]
pub struct TreeRooted;

impl SceneHost for TreeRooted {
    fn root(&self, tree: &SceneTree) -> NodeId {
        tree.root()
    }

    fn current_scene(&self, tree: &SceneTree) -> Option<NodeId> {
        tree.current_scene()
    }

    fn set_current_scene(&mut self, tree: &mut SceneTree, scene: Option<NodeId>) {
        tree.set_current_scene(scene);
    }

    fn tracks(&self, _event: &MembershipEvent) -> bool {
        true
    }
}
