//! # Stagehand
//!
//! **Scene swaps, fades and dependency injection for node trees.**
//!
//! Stagehand replaces the "current scene" of a node tree, either instantly or
//! behind a full-screen fade, and can inject dependencies into every scene it
//! loads before that scene enters the tree.
//!
//! ## Quick Start
//!
//! ```
//! use stagehand::scene::{NodeTemplate, Scene, SceneManager, SceneManagerConfig, Transition};
//! use stagehand::SceneTree;
//!
//! let mut tree = SceneTree::new();
//! let mut manager = SceneManager::new(&mut tree, SceneManagerConfig::new()).unwrap();
//!
//! manager.scene_readied().connect(|tree, scene| {
//!     println!("{} is ready", tree.name(*scene).unwrap_or_default());
//!     Ok(())
//! });
//!
//! let level = Scene::from_template("level", NodeTemplate::new("Level"));
//! manager.transition_to(&mut tree, &level, Some(&Transition::fade_to_black(0.5))).unwrap();
//!
//! while manager.is_transitioning() {
//!     manager.process(&mut tree, 1.0 / 60.0).unwrap();
//! }
//! ```
//!
//! ## Pieces
//!
//! - [`SceneTree`] is the node tree, backed by a `hecs` world.
//! - [`scene::SceneManager`] swaps scenes and reports what happened through [`Signal`]s.
//! - [`scene::FadeTransition`] is the stock fade-through-color effect.
//! - [`DependencyInjector`] walks a subtree to a fixed depth and hands each node
//!   to a [`Resolver`]; [`Container`] is a type-keyed resolver.
//! - [`Settings`] loads all of the above from TOML.

mod app;
mod config;
mod error;
mod inject;
pub mod scene;
mod signal;
mod tree;

pub use app::{App, AppConfig, Frame, SetupContext, run, run_with_config};
pub use config::{AutoLoadSettings, ConfigError, Settings};
pub use error::{InjectError, SceneError};
pub use inject::{
    Container, Dependency, DependencyInjector, Hierarchy, Injected, Requires, Resolver, inject,
};
pub use signal::{ListenerId, Signal};
pub use tree::{CanvasLayer, Membership, MembershipEvent, Name, NodeId, Overlay, SceneTree};

// Re-export glam math types for convenience
pub use glam::Vec4;

// ECS access for custom components
pub use hecs::{Entity, World};
