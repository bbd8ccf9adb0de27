//! Runs dependency injection on every scene a [`SceneManager`] loads.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::manager::SceneManager;
use crate::error::{InjectError, SceneError};
use crate::inject::{DependencyInjector, Resolver};
use crate::signal::ListenerId;
use crate::tree::SceneTree;

/// Injects freshly loaded scenes down to a fixed depth.
///
/// Injection happens on `scene_loaded`, before the instance is attached, so
/// nodes see their dependencies by the time they enter the tree. A depth of 2
/// covers the scene root and its direct children.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use stagehand::{Container, DependencyInjector, Injected, Requires, SceneTree};
/// use stagehand::scene::{NodeTemplate, Scene, SceneLoadInjector, SceneManager, SceneManagerConfig};
///
/// struct Score(u32);
///
/// let mut tree = SceneTree::new();
/// let mut manager = SceneManager::new(&mut tree, SceneManagerConfig::new()).unwrap();
///
/// let mut container = Container::new();
/// container.bind(Score(7));
/// let injector = Rc::new(RefCell::new(DependencyInjector::new(container)));
///
/// let mut trigger = SceneLoadInjector::new(2).unwrap();
/// trigger.attach(&mut manager, injector);
///
/// let level = Scene::from_template(
///     "level",
///     NodeTemplate::new("Level").requires(Requires::new().with::<Score>()),
/// );
/// let root = manager.goto_scene(&mut tree, &level).unwrap();
/// let injected = tree.get::<Injected>(root).unwrap();
/// assert_eq!(injected.get::<Score>().unwrap().0, 7);
/// ```
#[derive(Debug)]
pub struct SceneLoadInjector {
    depth: usize,
    listener: Option<ListenerId>,
}

impl SceneLoadInjector {
    /// Fails with [`InjectError::InvalidDepth`] unless `depth >= 1`.
    pub fn new(depth: usize) -> Result<Self, InjectError> {
        if depth == 0 {
            return Err(InjectError::InvalidDepth(depth));
        }
        Ok(Self {
            depth,
            listener: None,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Start injecting every scene `manager` loads.
    ///
    /// Attaching again replaces the previous connection on the same manager.
    /// Resolver errors abort the swap and surface from the manager call that
    /// loaded the scene.
    pub fn attach<R>(
        &mut self,
        manager: &mut SceneManager,
        injector: Rc<RefCell<DependencyInjector<R>>>,
    ) -> ListenerId
    where
        R: Resolver<SceneTree> + 'static,
    {
        self.detach(manager);

        let depth = self.depth;
        let id = manager.scene_loaded().connect(move |tree, scene| {
            let visited = injector.borrow_mut().inject(tree, *scene, depth)?;
            debug!(%scene, depth, visited, "injected loaded scene");
            Ok(())
        });
        self.listener = Some(id);
        id
    }

    /// Stop injecting. Returns `false` if nothing was attached.
    pub fn detach(&mut self, manager: &mut SceneManager) -> bool {
        match self.listener.take() {
            Some(id) => manager.scene_loaded().disconnect(id),
            None => false,
        }
    }

    /// Inject the manager's current scene, if any.
    ///
    /// Covers a scene that was already current before the injector was attached.
    pub fn inject_current<R>(
        &self,
        tree: &mut SceneTree,
        manager: &SceneManager,
        injector: &mut DependencyInjector<R>,
    ) -> Result<usize, SceneError>
    where
        R: Resolver<SceneTree>,
    {
        let Some(scene) = manager.current_scene(tree) else {
            return Ok(0);
        };
        Ok(injector.inject(tree, scene, self.depth)?)
    }
}
