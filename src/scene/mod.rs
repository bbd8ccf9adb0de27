//! Scene management for Stagehand.
//!
//! This module swaps the "current scene" of a [`SceneTree`](crate::SceneTree)
//! and optionally hides the swap behind a full-screen transition effect.
//!
//! # Overview
//!
//! - [`Scene`] is an instantiable template; every instantiation builds a new,
//!   detached subtree.
//! - [`SceneManager`] owns the swap. Instant swaps go through
//!   [`goto_scene`](SceneManager::goto_scene); transitioned swaps through
//!   [`transition_to`](SceneManager::transition_to) and are advanced by
//!   [`process`](SceneManager::process) once per frame.
//! - [`FadeTransition`] is the stock effect: it fades an overlay color in,
//!   lets the manager swap, then fades it back out.
//! - [`SceneLoadInjector`] runs dependency injection on every freshly loaded
//!   scene before it enters the tree.
//!
//! # Example
//!
//! ```
//! use stagehand::SceneTree;
//! use stagehand::scene::{NodeTemplate, Scene, SceneManager, SceneManagerConfig, Transition};
//!
//! let mut tree = SceneTree::new();
//! let mut manager = SceneManager::new(
//!     &mut tree,
//!     SceneManagerConfig::new()
//!         .self_contained(true)
//!         .default_transition(Transition::fade_to_black(0.5)),
//! )
//! .unwrap();
//!
//! manager.register(Scene::from_template("menu", NodeTemplate::new("Menu")));
//! manager.register(Scene::from_template(
//!     "level",
//!     NodeTemplate::new("Level").child(NodeTemplate::new("Player")),
//! ));
//!
//! manager.goto(&mut tree, "menu").unwrap();
//! manager.transition_to_id(&mut tree, "level", None).unwrap();
//!
//! // The menu stays visible until the overlay fully covers the screen.
//! while manager.is_transitioning() {
//!     manager.process(&mut tree, 1.0 / 60.0).unwrap();
//! }
//!
//! let level = manager.current_scene(&tree).unwrap();
//! assert!(tree.get_node(level, "Player").is_some());
//! ```

mod host;
mod load_injector;
mod manager;
pub mod scene;
mod transition;

pub use host::{SceneHost, SelfContained, TreeRooted};
pub use load_injector::SceneLoadInjector;
pub use manager::{AutoLoad, SceneManager, SceneManagerConfig};
pub use scene::{NodeTemplate, Scene, SceneId, SceneLibrary};
pub use transition::{
    Easing, Fade, FadeTransition, SceneTransition, Transition, TransitionBlueprint,
    TransitionSignal, TransitionState,
};
