//! Scene manager for swapping the current scene, instantly or behind a transition.

use std::rc::Rc;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use super::host::{SceneHost, SelfContained, TreeRooted};
use super::scene::{Scene, SceneLibrary};
use super::transition::{SceneTransition, TransitionBlueprint, TransitionSignal, TransitionState};
use crate::error::SceneError;
use crate::signal::Signal;
use crate::tree::{CanvasLayer, Membership, MembershipEvent, NodeId, Overlay, SceneTree};

/// A scene to load automatically shortly after the manager starts.
#[derive(Clone)]
pub struct AutoLoad {
    pub scene: Scene,
    /// Seconds to wait after the first frame.
    pub delay: f32,
    pub transition: Option<Rc<dyn TransitionBlueprint>>,
}

impl AutoLoad {
    pub fn new(scene: Scene, delay: f32) -> Self {
        Self {
            scene,
            delay,
            transition: None,
        }
    }

    pub fn with_transition(mut self, transition: impl TransitionBlueprint + 'static) -> Self {
        self.transition = Some(Rc::new(transition));
        self
    }
}

impl std::fmt::Debug for AutoLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoLoad")
            .field("scene", self.scene.id())
            .field("delay", &self.delay)
            .field("transition", &self.transition.is_some())
            .finish()
    }
}

/// Configuration for a [`SceneManager`].
#[derive(Clone)]
pub struct SceneManagerConfig {
    /// Own the scenes under the manager's node instead of the tree root.
    pub self_contained: bool,
    /// [`CanvasLayer`] of the node transition effects are attached under.
    pub transition_layer: i32,
    pub default_transition: Option<Rc<dyn TransitionBlueprint>>,
    pub auto_load: Option<AutoLoad>,
    /// Give up on a transition phase after this many seconds. `None` waits forever.
    pub phase_timeout: Option<f32>,
}

impl Default for SceneManagerConfig {
    fn default() -> Self {
        Self {
            self_contained: false,
            transition_layer: 100,
            default_transition: None,
            auto_load: None,
            phase_timeout: None,
        }
    }
}

impl SceneManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn self_contained(mut self, self_contained: bool) -> Self {
        self.self_contained = self_contained;
        self
    }

    pub fn transition_layer(mut self, layer: i32) -> Self {
        self.transition_layer = layer;
        self
    }

    pub fn default_transition(mut self, transition: impl TransitionBlueprint + 'static) -> Self {
        self.default_transition = Some(Rc::new(transition));
        self
    }

    pub fn auto_load(mut self, auto_load: AutoLoad) -> Self {
        self.auto_load = Some(auto_load);
        self
    }

    pub fn phase_timeout(mut self, seconds: f32) -> Self {
        self.phase_timeout = Some(seconds);
        self
    }
}

impl std::fmt::Debug for SceneManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManagerConfig")
            .field("self_contained", &self.self_contained)
            .field("transition_layer", &self.transition_layer)
            .field("default_transition", &self.default_transition.is_some())
            .field("auto_load", &self.auto_load)
            .field("phase_timeout", &self.phase_timeout)
            .finish()
    }
}

/// A transition effect instance and the node that displays it.
struct ActiveEffect {
    node: NodeId,
    effect: Box<dyn SceneTransition>,
    elapsed: f32,
}

/// Where an in-flight transitioned swap is.
enum SwapPhase {
    Idle,
    WaitingForFadeIn { scene: Scene, active: ActiveEffect },
    WaitingForFadeOut { instance: NodeId, active: ActiveEffect },
}

struct PendingAutoLoad {
    load: AutoLoad,
    /// `None` until the first frame has been processed.
    elapsed: Option<f32>,
}

/// Swaps the current scene and reports what happened through signals.
///
/// The manager is a node in the [`SceneTree`] with a transition layer child.
/// A swap is either instant ([`goto_scene`](Self::goto_scene)) or bracketed by
/// a transition effect ([`transition_to`](Self::transition_to)), in which case
/// it advances one step per [`process`](Self::process) call:
///
/// 1. the effect fades in and signals `TransitionedIn`,
/// 2. the old scene is torn down, the new one instantiated, `scene_loaded`
///    fires and the instance is attached,
/// 3. the effect fades out and signals `TransitionedOut`,
/// 4. the effect is freed and `scene_readied` fires.
///
/// Only one swap can be in flight; requesting another one before it finishes
/// fails with [`SceneError::InvalidState`].
///
/// # Example
///
/// ```
/// use stagehand::SceneTree;
/// use stagehand::scene::{NodeTemplate, Scene, SceneManager, SceneManagerConfig, Transition};
///
/// let mut tree = SceneTree::new();
/// let mut manager = SceneManager::new(&mut tree, SceneManagerConfig::new()).unwrap();
///
/// let title = Scene::from_template("title", NodeTemplate::new("Title"));
/// manager.transition_to(&mut tree, &title, Some(&Transition::fade_to_black(1.0))).unwrap();
///
/// while manager.is_transitioning() {
///     manager.process(&mut tree, 0.1).unwrap();
/// }
/// assert!(manager.current_scene(&tree).is_some());
/// ```
pub struct SceneManager {
    node: NodeId,
    layer: NodeId,
    host: Box<dyn SceneHost>,
    scenes: SceneLibrary,
    default_transition: Option<Rc<dyn TransitionBlueprint>>,
    phase_timeout: Option<f32>,
    phase: SwapPhase,
    auto_load: Option<PendingAutoLoad>,
    membership: Receiver<MembershipEvent>,
    scene_loaded: Signal<NodeId>,
    scene_readied: Signal<NodeId>,
    node_added: Signal<NodeId>,
    node_removed: Signal<NodeId>,
    transition_signal: Signal<TransitionSignal>,
}

impl SceneManager {
    /// Create a manager attached under the tree's root.
    pub fn new(tree: &mut SceneTree, config: SceneManagerConfig) -> Result<Self, SceneError> {
        let root = tree.root();
        Self::with_parent(tree, root, config)
    }

    /// Create a manager attached under `parent`.
    ///
    /// `parent` must be inside the tree; a detached manager would never see
    /// its scenes enter or leave it.
    pub fn with_parent(
        tree: &mut SceneTree,
        parent: NodeId,
        config: SceneManagerConfig,
    ) -> Result<Self, SceneError> {
        if !tree.contains(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        if !tree.is_inside_tree(parent) {
            return Err(SceneError::InvalidHierarchy(format!(
                "scene manager parent {parent} is not inside the tree"
            )));
        }

        let node = tree.spawn("SceneManager");
        let layer = tree.spawn_with("TransitionLayer", (CanvasLayer(config.transition_layer),));
        tree.add_child(node, layer)?;
        tree.add_child(parent, node)?;

        // Subscribe after attaching so the manager does not report itself.
        let membership = tree.subscribe();

        let host: Box<dyn SceneHost> = if config.self_contained {
            Box::new(SelfContained::new(node))
        } else {
            Box::new(TreeRooted)
        };

        debug!(
            %node,
            self_contained = config.self_contained,
            layer = config.transition_layer,
            "scene manager ready"
        );

        Ok(Self {
            node,
            layer,
            host,
            scenes: SceneLibrary::new(),
            default_transition: config.default_transition,
            phase_timeout: config.phase_timeout,
            phase: SwapPhase::Idle,
            auto_load: config.auto_load.map(|load| PendingAutoLoad {
                load,
                elapsed: None,
            }),
            membership,
            scene_loaded: Signal::new("scene_loaded"),
            scene_readied: Signal::new("scene_readied"),
            node_added: Signal::new("node_added"),
            node_removed: Signal::new("node_removed"),
            transition_signal: Signal::new("transition_signal"),
        })
    }

    /// The manager's own node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The node transition effects are attached under.
    pub fn transition_layer(&self) -> NodeId {
        self.layer
    }

    /// The node scene instances are attached under.
    pub fn root(&self, tree: &SceneTree) -> NodeId {
        self.host.root(tree)
    }

    pub fn current_scene(&self, tree: &SceneTree) -> Option<NodeId> {
        self.host.current_scene(tree)
    }

    pub fn set_current_scene(&mut self, tree: &mut SceneTree, scene: Option<NodeId>) {
        self.host.set_current_scene(tree, scene);
    }

    /// Check if a transitioned swap is in progress.
    pub fn is_transitioning(&self) -> bool {
        !matches!(self.phase, SwapPhase::Idle)
    }

    /// State of the in-flight transition effect, if any.
    pub fn transition_state(&self) -> Option<TransitionState> {
        self.active_effect().map(|active| active.effect.state())
    }

    /// Node of the in-flight transition effect, if any.
    pub fn effect_node(&self) -> Option<NodeId> {
        self.active_effect().map(|active| active.node)
    }

    pub fn scenes(&self) -> &SceneLibrary {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneLibrary {
        &mut self.scenes
    }

    /// Register a scene for the name based [`goto`](Self::goto) and
    /// [`transition_to_id`](Self::transition_to_id).
    pub fn register(&mut self, scene: Scene) -> &mut Self {
        self.scenes.register(scene);
        self
    }

    pub fn set_default_transition(&mut self, transition: Option<Rc<dyn TransitionBlueprint>>) {
        self.default_transition = transition;
    }

    /// Fires with each freshly instantiated scene, before it is attached.
    pub fn scene_loaded(&mut self) -> &mut Signal<NodeId> {
        &mut self.scene_loaded
    }

    /// Fires once a scene is attached, current and (if transitioned) revealed.
    pub fn scene_readied(&mut self) -> &mut Signal<NodeId> {
        &mut self.scene_readied
    }

    pub fn node_added(&mut self) -> &mut Signal<NodeId> {
        &mut self.node_added
    }

    pub fn node_removed(&mut self) -> &mut Signal<NodeId> {
        &mut self.node_removed
    }

    /// Phase completions of transition effects.
    pub fn transition_signal(&mut self) -> &mut Signal<TransitionSignal> {
        &mut self.transition_signal
    }

    /// Replace the current scene immediately.
    pub fn goto_scene(&mut self, tree: &mut SceneTree, scene: &Scene) -> Result<NodeId, SceneError> {
        self.ensure_idle("goto_scene")?;
        let instance = self.swap(tree, scene)?;
        self.scene_readied.emit(tree, &instance)?;
        info!(scene = %scene.id(), %instance, "scene readied");
        Ok(instance)
    }

    /// [`goto_scene`](Self::goto_scene) with a registered scene.
    pub fn goto(&mut self, tree: &mut SceneTree, id: &str) -> Result<NodeId, SceneError> {
        let scene = self.scenes.require(id)?.clone();
        self.goto_scene(tree, &scene)
    }

    /// Start swapping to `scene` behind a transition effect.
    ///
    /// Uses `transition` if given, the configured default otherwise. Fails
    /// with [`SceneError::MissingTransition`] and changes nothing if neither
    /// is available. The swap then advances through [`process`](Self::process).
    pub fn transition_to(
        &mut self,
        tree: &mut SceneTree,
        scene: &Scene,
        transition: Option<&dyn TransitionBlueprint>,
    ) -> Result<(), SceneError> {
        self.ensure_idle("transition_to")?;

        let default = self.default_transition.clone();
        let blueprint: &dyn TransitionBlueprint = match (transition, default.as_deref()) {
            (Some(given), _) => given,
            (None, Some(default)) => default,
            (None, None) => {
                warn!(scene = %scene.id(), "no transition given and no default configured, swap aborted");
                return Err(SceneError::MissingTransition);
            }
        };

        let mut effect = blueprint.instantiate();
        effect.transition_in()?;
        let node = tree.spawn_with(blueprint.node_name().to_string(), (Overlay(effect.overlay()),));
        tree.add_child(self.layer, node)?;
        debug!(scene = %scene.id(), effect = %node, "transition started");

        self.phase = SwapPhase::WaitingForFadeIn {
            scene: scene.clone(),
            active: ActiveEffect {
                node,
                effect,
                elapsed: 0.0,
            },
        };
        self.flush_membership(tree)
    }

    /// [`transition_to`](Self::transition_to) with a registered scene.
    pub fn transition_to_id(
        &mut self,
        tree: &mut SceneTree,
        id: &str,
        transition: Option<&dyn TransitionBlueprint>,
    ) -> Result<(), SceneError> {
        let scene = self.scenes.require(id)?.clone();
        self.transition_to(tree, &scene, transition)
    }

    /// Per-frame tick.
    ///
    /// Advances an in-flight transition, runs a due auto-load and forwards
    /// membership changes.
    pub fn process(&mut self, tree: &mut SceneTree, dt: f32) -> Result<(), SceneError> {
        self.advance_swap(tree, dt)?;
        self.advance_auto_load(tree, dt)?;
        self.flush_membership(tree)
    }

    /// Forward pending tree membership changes as `node_added` / `node_removed`.
    ///
    /// A self-contained manager only forwards changes to its own descendants.
    pub fn flush_membership(&mut self, tree: &mut SceneTree) -> Result<(), SceneError> {
        let events: Vec<MembershipEvent> = self.membership.try_iter().collect();
        for event in events.iter().filter(|event| self.host.tracks(event)) {
            match event.kind {
                Membership::Added => self.node_added.emit(tree, &event.node)?,
                Membership::Removed => self.node_removed.emit(tree, &event.node)?,
            }
        }
        Ok(())
    }

    /// Free the manager's node, and with it any scene it owns.
    pub fn free(self, tree: &mut SceneTree) -> Result<(), SceneError> {
        tree.free(self.node)
    }

    fn ensure_idle(&self, operation: &str) -> Result<(), SceneError> {
        if self.is_transitioning() {
            warn!(operation, "scene swap already in progress");
            return Err(SceneError::InvalidState(format!(
                "{operation} called while a scene swap is in progress"
            )));
        }
        Ok(())
    }

    fn active_effect(&self) -> Option<&ActiveEffect> {
        match &self.phase {
            SwapPhase::Idle => None,
            SwapPhase::WaitingForFadeIn { active, .. }
            | SwapPhase::WaitingForFadeOut { active, .. } => Some(active),
        }
    }

    /// Tear down the current scene, load `scene` and make it current.
    fn swap(&mut self, tree: &mut SceneTree, scene: &Scene) -> Result<NodeId, SceneError> {
        if let Some(old) = self.host.current_scene(tree) {
            debug!(%old, "tearing down current scene");
            tree.free(old)?;
            self.host.set_current_scene(tree, None);
            self.flush_membership(tree)?;
        }

        let instance = scene.instantiate(tree)?;
        debug!(scene = %scene.id(), %instance, "scene loaded");
        let root = self.host.root(tree);
        let attached = self
            .scene_loaded
            .emit(tree, &instance)
            .and_then(|()| tree.add_child(root, instance));
        if let Err(err) = attached {
            // Never attached, so nothing else can reach it.
            if tree.contains(instance) && tree.parent(instance).is_none() {
                tree.free(instance)?;
            }
            return Err(err);
        }
        self.host.set_current_scene(tree, Some(instance));
        self.flush_membership(tree)?;
        Ok(instance)
    }

    /// Errors leave the manager idle with the effect node freed. Other steps
    /// already applied are not rolled back.
    fn advance_swap(&mut self, tree: &mut SceneTree, dt: f32) -> Result<(), SceneError> {
        let phase = std::mem::replace(&mut self.phase, SwapPhase::Idle);
        let effect = match &phase {
            SwapPhase::Idle => return Ok(()),
            SwapPhase::WaitingForFadeIn { active, .. }
            | SwapPhase::WaitingForFadeOut { active, .. } => active.node,
        };

        match self.step_swap(tree, phase, dt) {
            Ok(next) => {
                self.phase = next;
                Ok(())
            }
            Err(err) => {
                warn!(%effect, error = %err, "transitioned swap failed");
                if tree.contains(effect) {
                    tree.free(effect)?;
                    self.flush_membership(tree)?;
                }
                Err(err)
            }
        }
    }

    fn step_swap(
        &mut self,
        tree: &mut SceneTree,
        phase: SwapPhase,
        dt: f32,
    ) -> Result<SwapPhase, SceneError> {
        Ok(match phase {
            SwapPhase::Idle => SwapPhase::Idle,
            SwapPhase::WaitingForFadeIn { scene, mut active } => {
                if self.tick_effect(tree, &mut active, dt, TransitionSignal::TransitionedIn)? {
                    let instance = self.swap(tree, &scene)?;
                    active.effect.transition_out()?;
                    active.elapsed = 0.0;
                    SwapPhase::WaitingForFadeOut { instance, active }
                } else {
                    SwapPhase::WaitingForFadeIn { scene, active }
                }
            }
            SwapPhase::WaitingForFadeOut {
                instance,
                mut active,
            } => {
                if self.tick_effect(tree, &mut active, dt, TransitionSignal::TransitionedOut)? {
                    tree.free(active.node)?;
                    self.scene_readied.emit(tree, &instance)?;
                    info!(%instance, "scene readied");
                    SwapPhase::Idle
                } else {
                    SwapPhase::WaitingForFadeOut { instance, active }
                }
            }
        })
    }

    /// Tick the effect once. Returns whether it signalled `expected`.
    fn tick_effect(
        &mut self,
        tree: &mut SceneTree,
        active: &mut ActiveEffect,
        dt: f32,
        expected: TransitionSignal,
    ) -> Result<bool, SceneError> {
        let signal = active.effect.process(dt);
        active.elapsed += dt.max(0.0);
        tree.insert(active.node, Overlay(active.effect.overlay()))?;

        match signal {
            Some(signal) if signal == expected => {
                self.transition_signal.emit(tree, &signal)?;
                Ok(true)
            }
            Some(other) => Err(SceneError::InvalidState(format!(
                "expected {expected:?} but the effect signalled {other:?}"
            ))),
            None => match self.phase_timeout {
                Some(timeout) if active.elapsed > timeout => {
                    let phase = match expected {
                        TransitionSignal::TransitionedIn => "fade in",
                        TransitionSignal::TransitionedOut => "fade out",
                    };
                    warn!(phase, timeout, "transition phase timed out");
                    Err(SceneError::PhaseTimeout { phase, timeout })
                }
                _ => Ok(false),
            },
        }
    }

    fn advance_auto_load(&mut self, tree: &mut SceneTree, dt: f32) -> Result<(), SceneError> {
        let Some(pending) = self.auto_load.as_mut() else {
            return Ok(());
        };

        // The timer starts on the first frame so the tree is fully built.
        let elapsed = pending.elapsed.map_or(0.0, |elapsed| elapsed + dt.max(0.0));
        pending.elapsed = Some(elapsed);
        if elapsed < pending.load.delay || self.is_transitioning() {
            return Ok(());
        }

        let Some(PendingAutoLoad { load, .. }) = self.auto_load.take() else {
            return Ok(());
        };
        debug!(scene = %load.scene.id(), "auto-loading initial scene");
        match &load.transition {
            Some(transition) => self.transition_to(tree, &load.scene, Some(transition.as_ref())),
            None => self.goto_scene(tree, &load.scene).map(|_| ()),
        }
    }
}

impl std::fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManager")
            .field("node", &self.node)
            .field("layer", &self.layer)
            .field("transitioning", &self.is_transitioning())
            .field("scenes", &self.scenes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Easing, NodeTemplate, Transition};
    use glam::Vec4;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn level(id: &str) -> Scene {
        Scene::from_template(
            id,
            NodeTemplate::new(id).child(NodeTemplate::new("Child")),
        )
    }

    fn half_second_fades() -> Transition {
        Transition::instant()
            .fade_in(0.5, Easing::Linear)
            .fade_out(0.5, Easing::Linear)
    }

    fn self_contained(tree: &mut SceneTree) -> SceneManager {
        SceneManager::new(tree, SceneManagerConfig::new().self_contained(true)).unwrap()
    }

    /// Record loaded/readied/phase signals as readable strings.
    fn record(manager: &mut SceneManager) -> Log {
        let log: Log = Rc::default();

        let sink = Rc::clone(&log);
        manager.scene_loaded().connect(move |tree, node| {
            sink.borrow_mut()
                .push(format!("loaded:{}", tree.name(*node).unwrap_or_default()));
            Ok(())
        });
        let sink = Rc::clone(&log);
        manager.scene_readied().connect(move |tree, node| {
            sink.borrow_mut()
                .push(format!("readied:{}", tree.name(*node).unwrap_or_default()));
            Ok(())
        });
        let sink = Rc::clone(&log);
        manager.transition_signal().connect(move |_, signal| {
            sink.borrow_mut().push(format!("{signal:?}"));
            Ok(())
        });
        log
    }

    #[test]
    fn goto_scene_emits_loaded_then_readied_with_same_instance() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);

        let seen: Rc<RefCell<Vec<(&str, NodeId)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        manager.scene_loaded().connect(move |tree, node| {
            assert!(!tree.is_inside_tree(*node), "loaded fires before attach");
            sink.borrow_mut().push(("loaded", *node));
            Ok(())
        });
        let sink = Rc::clone(&seen);
        manager.scene_readied().connect(move |tree, node| {
            assert!(tree.is_inside_tree(*node));
            sink.borrow_mut().push(("readied", *node));
            Ok(())
        });

        let a = manager.goto_scene(&mut tree, &level("A")).unwrap();
        assert_eq!(*seen.borrow(), vec![("loaded", a), ("readied", a)]);
        assert_eq!(manager.current_scene(&tree), Some(a));
        assert_eq!(tree.parent(a), Some(manager.node()));
    }

    #[test]
    fn goto_scene_tears_down_old_instance_before_loading() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let a = manager.goto_scene(&mut tree, &level("A")).unwrap();

        let old_alive = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&old_alive);
        manager.scene_loaded().connect(move |tree, _| {
            *sink.borrow_mut() = Some(tree.contains(a));
            Ok(())
        });

        let log = record(&mut manager);
        let b = manager.goto_scene(&mut tree, &level("B")).unwrap();

        assert_eq!(*old_alive.borrow(), Some(false));
        assert_eq!(*log.borrow(), vec!["loaded:B", "readied:B"]);
        assert_eq!(manager.current_scene(&tree), Some(b));
        assert!(!tree.contains(a));
    }

    #[test]
    fn transition_orders_signals_around_the_swap() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let a = manager.goto_scene(&mut tree, &level("A")).unwrap();

        let log = record(&mut manager);
        let old_attached = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&old_attached);
        manager.scene_loaded().connect(move |tree, _| {
            *sink.borrow_mut() = Some(tree.contains(a));
            Ok(())
        });

        let fade = half_second_fades();
        manager
            .transition_to(&mut tree, &level("B"), Some(&fade))
            .unwrap();
        assert!(manager.is_transitioning());
        assert_eq!(manager.current_scene(&tree), Some(a));

        manager.process(&mut tree, 0.25).unwrap();
        assert!(log.borrow().is_empty());

        manager.process(&mut tree, 0.25).unwrap();
        assert_eq!(*log.borrow(), vec!["TransitionedIn", "loaded:B"]);
        assert_eq!(*old_attached.borrow(), Some(false));
        assert_eq!(
            manager.transition_state(),
            Some(TransitionState::FadingOut)
        );

        manager.process(&mut tree, 0.6).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["TransitionedIn", "loaded:B", "TransitionedOut", "readied:B"]
        );
        assert!(!manager.is_transitioning());
        assert!(tree.children(manager.transition_layer()).is_empty());

        let b = manager.current_scene(&tree).unwrap();
        assert_eq!(tree.name(b).as_deref(), Some("B"));
    }

    #[test]
    fn effect_node_lives_under_the_transition_layer() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(
            &mut tree,
            SceneManagerConfig::new().transition_layer(7),
        )
        .unwrap();
        assert_eq!(
            tree.get::<CanvasLayer>(manager.transition_layer()),
            Some(CanvasLayer(7))
        );

        let fade = Transition::instant()
            .fade_in(1.0, Easing::Linear)
            .fade_out(1.0, Easing::Linear);
        manager
            .transition_to(&mut tree, &level("A"), Some(&fade))
            .unwrap();
        let effect = manager.effect_node().unwrap();
        assert_eq!(tree.parent(effect), Some(manager.transition_layer()));

        manager.process(&mut tree, 0.5).unwrap();
        let Overlay(color) = tree.get::<Overlay>(effect).unwrap();
        assert!((color.w - 0.5).abs() < 1e-6);
        assert_eq!(color.truncate(), Vec4::ZERO.truncate());
    }

    #[test]
    fn missing_transition_changes_nothing() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let a = manager.goto_scene(&mut tree, &level("A")).unwrap();
        let nodes = tree.len();

        let err = manager
            .transition_to(&mut tree, &level("B"), None)
            .unwrap_err();
        assert!(matches!(err, SceneError::MissingTransition));
        assert_eq!(manager.current_scene(&tree), Some(a));
        assert!(!manager.is_transitioning());
        assert_eq!(tree.len(), nodes);
    }

    #[test]
    fn default_transition_is_used_when_none_given() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(
            &mut tree,
            SceneManagerConfig::new().default_transition(Transition::instant()),
        )
        .unwrap();

        manager.transition_to(&mut tree, &level("A"), None).unwrap();
        manager.process(&mut tree, 0.0).unwrap();
        manager.process(&mut tree, 0.0).unwrap();

        assert!(!manager.is_transitioning());
        assert!(manager.current_scene(&tree).is_some());
    }

    #[test]
    fn requests_during_a_swap_are_rejected() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let a = manager.goto_scene(&mut tree, &level("A")).unwrap();
        let fade = half_second_fades();
        manager
            .transition_to(&mut tree, &level("B"), Some(&fade))
            .unwrap();

        assert!(matches!(
            manager.transition_to(&mut tree, &level("C"), Some(&fade)),
            Err(SceneError::InvalidState(_))
        ));
        assert!(matches!(
            manager.goto_scene(&mut tree, &level("C")),
            Err(SceneError::InvalidState(_))
        ));
        assert_eq!(manager.current_scene(&tree), Some(a));
        assert_eq!(tree.children(manager.transition_layer()).len(), 1);

        manager.process(&mut tree, 0.5).unwrap();
        manager.process(&mut tree, 0.5).unwrap();
        let current = manager.current_scene(&tree).unwrap();
        assert_eq!(tree.name(current).as_deref(), Some("B"));
    }

    #[test]
    fn self_contained_forwards_only_own_descendants() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let scene = manager.goto_scene(&mut tree, &level("A")).unwrap();

        let added: Rc<RefCell<Vec<NodeId>>> = Rc::default();
        let sink = Rc::clone(&added);
        manager.node_added().connect(move |_, node| {
            sink.borrow_mut().push(*node);
            Ok(())
        });

        let outside = tree.spawn("Outside");
        tree.add_child(tree.root(), outside).unwrap();
        manager.process(&mut tree, 0.016).unwrap();
        assert!(added.borrow().is_empty());

        let inside = tree.spawn("Inside");
        tree.add_child(scene, inside).unwrap();
        manager.process(&mut tree, 0.016).unwrap();
        manager.process(&mut tree, 0.016).unwrap();
        assert_eq!(*added.borrow(), vec![inside]);
    }

    #[test]
    fn self_contained_reports_removal_of_freed_nodes() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let scene = manager.goto_scene(&mut tree, &level("A")).unwrap();
        let child = tree.find_child(scene, "Child").unwrap();

        let removed: Rc<RefCell<Vec<NodeId>>> = Rc::default();
        let sink = Rc::clone(&removed);
        manager.node_removed().connect(move |_, node| {
            sink.borrow_mut().push(*node);
            Ok(())
        });

        tree.free(child).unwrap();
        manager.process(&mut tree, 0.016).unwrap();
        assert_eq!(*removed.borrow(), vec![child]);
    }

    #[test]
    fn tree_rooted_forwards_everything() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(&mut tree, SceneManagerConfig::new()).unwrap();

        let log: Log = Rc::default();
        let sink = Rc::clone(&log);
        manager.node_added().connect(move |tree, node| {
            sink.borrow_mut()
                .push(format!("+{}", tree.name(*node).unwrap_or_default()));
            Ok(())
        });
        let sink = Rc::clone(&log);
        manager.node_removed().connect(move |_, _| {
            sink.borrow_mut().push("-".to_string());
            Ok(())
        });

        let elsewhere = tree.spawn("Elsewhere");
        tree.add_child(tree.root(), elsewhere).unwrap();
        manager.process(&mut tree, 0.016).unwrap();
        tree.free(elsewhere).unwrap();
        manager.process(&mut tree, 0.016).unwrap();

        assert_eq!(*log.borrow(), vec!["+Elsewhere", "-"]);
    }

    #[test]
    fn tree_rooted_uses_global_root_and_slot() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(&mut tree, SceneManagerConfig::new()).unwrap();

        let scene = manager.goto_scene(&mut tree, &level("A")).unwrap();
        assert_eq!(tree.parent(scene), Some(tree.root()));
        assert_eq!(tree.current_scene(), Some(scene));
        assert_eq!(manager.root(&tree), tree.root());
    }

    #[test]
    fn goto_by_id_uses_the_library() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        manager.register(level("menu"));

        let menu = manager.goto(&mut tree, "menu").unwrap();
        assert_eq!(tree.name(menu).as_deref(), Some("menu"));
        assert!(matches!(
            manager.goto(&mut tree, "missing"),
            Err(SceneError::UnknownScene(_))
        ));
    }

    #[test]
    fn auto_load_waits_for_first_frame_and_delay() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(
            &mut tree,
            SceneManagerConfig::new()
                .self_contained(true)
                .auto_load(AutoLoad::new(level("Intro"), 0.5)),
        )
        .unwrap();
        assert!(manager.current_scene(&tree).is_none());

        // First frame only starts the timer.
        manager.process(&mut tree, 0.3).unwrap();
        assert!(manager.current_scene(&tree).is_none());
        manager.process(&mut tree, 0.3).unwrap();
        assert!(manager.current_scene(&tree).is_none());
        manager.process(&mut tree, 0.3).unwrap();
        assert!(manager.current_scene(&tree).is_some());
    }

    #[test]
    fn auto_load_without_delay_fires_on_first_frame() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(
            &mut tree,
            SceneManagerConfig::new().auto_load(AutoLoad::new(level("Intro"), 0.0)),
        )
        .unwrap();

        manager.process(&mut tree, 0.016).unwrap();
        assert!(manager.current_scene(&tree).is_some());
    }

    #[test]
    fn auto_load_with_transition_starts_a_transition() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(
            &mut tree,
            SceneManagerConfig::new().auto_load(
                AutoLoad::new(level("Intro"), 0.0).with_transition(half_second_fades()),
            ),
        )
        .unwrap();

        manager.process(&mut tree, 0.016).unwrap();
        assert!(manager.is_transitioning());
        assert!(manager.current_scene(&tree).is_none());
    }

    struct Stuck;

    impl SceneTransition for Stuck {
        fn transition_in(&mut self) -> Result<(), SceneError> {
            Ok(())
        }
        fn transition_out(&mut self) -> Result<(), SceneError> {
            Ok(())
        }
        fn process(&mut self, _dt: f32) -> Option<TransitionSignal> {
            None
        }
        fn state(&self) -> TransitionState {
            TransitionState::FadingIn
        }
        fn overlay(&self) -> Vec4 {
            Vec4::ZERO
        }
    }

    struct StuckBlueprint;

    impl TransitionBlueprint for StuckBlueprint {
        fn instantiate(&self) -> Box<dyn SceneTransition> {
            Box::new(Stuck)
        }
    }

    #[test]
    fn phase_timeout_aborts_a_stuck_transition() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(
            &mut tree,
            SceneManagerConfig::new().phase_timeout(1.0),
        )
        .unwrap();
        manager
            .transition_to(&mut tree, &level("A"), Some(&StuckBlueprint))
            .unwrap();

        manager.process(&mut tree, 0.6).unwrap();
        let err = manager.process(&mut tree, 0.6).unwrap_err();
        assert!(matches!(
            err,
            SceneError::PhaseTimeout {
                phase: "fade in",
                ..
            }
        ));
        assert!(!manager.is_transitioning());
        assert!(tree.children(manager.transition_layer()).is_empty());
        assert!(manager.current_scene(&tree).is_none());
    }

    #[test]
    fn without_timeout_a_stuck_transition_keeps_waiting() {
        let mut tree = SceneTree::new();
        let mut manager = SceneManager::new(&mut tree, SceneManagerConfig::new()).unwrap();
        manager
            .transition_to(&mut tree, &level("A"), Some(&StuckBlueprint))
            .unwrap();

        for _ in 0..100 {
            manager.process(&mut tree, 1.0).unwrap();
        }
        assert!(manager.is_transitioning());
    }

    #[test]
    fn listener_errors_propagate_out_of_the_swap() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        manager
            .scene_loaded()
            .connect(|_, _| Err(SceneError::InvalidState("rejected".to_string())));

        let before = tree.len();
        assert!(manager.goto_scene(&mut tree, &level("A")).is_err());
        assert!(!manager.is_transitioning());
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn failed_transitioned_swap_frees_effect_and_instance() {
        let mut tree = SceneTree::new();
        let mut manager = self_contained(&mut tree);
        let reject = manager
            .scene_loaded()
            .connect(|_, _| Err(SceneError::InvalidState("rejected".to_string())));
        let before = tree.len();

        let fades = Transition::instant()
            .fade_in(0.1, Easing::Linear)
            .fade_out(0.1, Easing::Linear);
        manager
            .transition_to(&mut tree, &level("B"), Some(&fades))
            .unwrap();
        assert_eq!(tree.children(manager.transition_layer()).len(), 1);

        let err = manager.process(&mut tree, 0.2).unwrap_err();
        assert!(matches!(err, SceneError::InvalidState(_)));
        assert!(!manager.is_transitioning());
        assert!(manager.effect_node().is_none());
        assert!(tree.children(manager.transition_layer()).is_empty());
        assert!(manager.current_scene(&tree).is_none());
        assert_eq!(tree.len(), before);

        // A later swap is not covered by a leftover overlay.
        assert!(manager.scene_loaded().disconnect(reject));
        manager
            .transition_to(&mut tree, &level("C"), Some(&fades))
            .unwrap();
        assert_eq!(tree.children(manager.transition_layer()).len(), 1);
    }

    #[test]
    fn manager_under_a_detached_parent_is_rejected() {
        let mut tree = SceneTree::new();
        let orphan = tree.spawn("Orphan");
        let before = tree.len();

        let result = SceneManager::with_parent(&mut tree, orphan, SceneManagerConfig::new());
        assert!(matches!(result, Err(SceneError::InvalidHierarchy(_))));
        assert_eq!(tree.len(), before);

        let holder = tree.spawn("Holder");
        let root = tree.root();
        tree.add_child(root, holder).unwrap();
        let manager =
            SceneManager::with_parent(&mut tree, holder, SceneManagerConfig::new()).unwrap();
        assert_eq!(tree.parent(manager.node()), Some(holder));
    }
}
