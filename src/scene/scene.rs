//! Scene templates, identifiers and the scene library.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::SceneError;
use crate::inject::Requires;
use crate::tree::{NodeId, SceneTree};

/// Unique identifier for a scene.
///
/// Scene IDs are strings that uniquely identify scenes within a [`SceneLibrary`].
/// They're used when switching scenes by name via
/// [`SceneManager::goto`](super::SceneManager::goto) and
/// [`SceneManager::transition_to_id`](super::SceneManager::transition_to_id).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SceneId(pub(crate) String);

impl SceneId {
    /// Create a new scene ID from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the scene ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SceneId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SceneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

type BuildFn = dyn Fn(&mut SceneTree) -> Result<NodeId, SceneError>;

/// An instantiable blueprint for a subtree.
///
/// Every call to [`instantiate`](Self::instantiate) builds a new, detached,
/// independently owned subtree and returns its root.
///
/// # Example
///
/// ```
/// use stagehand::SceneTree;
/// use stagehand::scene::{NodeTemplate, Scene};
///
/// let menu = Scene::from_template(
///     "menu",
///     NodeTemplate::new("Menu").child(NodeTemplate::new("Buttons")),
/// );
///
/// let mut tree = SceneTree::new();
/// let first = menu.instantiate(&mut tree).unwrap();
/// let second = menu.instantiate(&mut tree).unwrap();
/// assert_ne!(first, second);
/// assert_eq!(tree.children(first).len(), 1);
/// ```
#[derive(Clone)]
pub struct Scene {
    id: SceneId,
    build: Rc<BuildFn>,
}

impl Scene {
    /// Create a scene from a build closure.
    ///
    /// The closure must return a detached root; the manager attaches it.
    pub fn new<F>(id: impl Into<SceneId>, build: F) -> Self
    where
        F: Fn(&mut SceneTree) -> Result<NodeId, SceneError> + 'static,
    {
        Self {
            id: id.into(),
            build: Rc::new(build),
        }
    }

    /// Create a scene from a declarative node template.
    pub fn from_template(id: impl Into<SceneId>, template: NodeTemplate) -> Self {
        Self::new(id, move |tree| template.build(tree))
    }

    pub fn id(&self) -> &SceneId {
        &self.id
    }

    /// Build a new instance of this scene.
    pub fn instantiate(&self, tree: &mut SceneTree) -> Result<NodeId, SceneError> {
        let root = (self.build)(tree)?;
        if tree.parent(root).is_some() {
            return Err(SceneError::Instantiate {
                scene: self.id.to_string(),
                reason: format!("root {root} is already attached"),
            });
        }
        Ok(root)
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene").field("id", &self.id).finish()
    }
}

/// Declarative description of a subtree.
#[derive(Clone, Debug)]
pub struct NodeTemplate {
    pub name: String,
    pub requires: Option<Requires>,
    pub children: Vec<NodeTemplate>,
}

impl NodeTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: None,
            children: Vec::new(),
        }
    }

    /// Declare the dependencies this node wants injected.
    pub fn requires(mut self, requires: Requires) -> Self {
        self.requires = Some(requires);
        self
    }

    pub fn child(mut self, child: NodeTemplate) -> Self {
        self.children.push(child);
        self
    }

    /// Spawn this template as a detached subtree.
    pub fn build(&self, tree: &mut SceneTree) -> Result<NodeId, SceneError> {
        let node = match &self.requires {
            Some(requires) => tree.spawn_with(self.name.clone(), (requires.clone(),)),
            None => tree.spawn(self.name.clone()),
        };
        for child in &self.children {
            let child = child.build(tree)?;
            tree.add_child(node, child)?;
        }
        Ok(node)
    }
}

/// Registered scenes by id.
#[derive(Clone, Debug, Default)]
pub struct SceneLibrary {
    scenes: HashMap<String, Scene>,
}

impl SceneLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene, replacing any scene with the same id.
    pub fn register(&mut self, scene: Scene) -> &mut Self {
        self.scenes.insert(scene.id.0.clone(), scene);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    /// Look a scene up, failing with [`SceneError::UnknownScene`].
    pub fn require(&self, id: &str) -> Result<&Scene, SceneError> {
        self.get(id)
            .ok_or_else(|| SceneError::UnknownScene(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }
}
