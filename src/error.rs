//! Error types shared by the scene manager, the node tree and the injector.

use crate::tree::NodeId;

/// Errors produced while swapping scenes or manipulating the node tree.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// `transition_to` was called without a transition and no default is configured.
    #[error("no transition given and no default transition configured")]
    MissingTransition,
    /// An operation was requested in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A scene was requested by id but is not registered.
    #[error("scene '{0}' is not registered")]
    UnknownScene(String),
    /// A scene template failed to build its subtree.
    #[error("failed to instantiate scene '{scene}': {reason}")]
    Instantiate { scene: String, reason: String },
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    /// An attach or detach would break the tree shape.
    #[error("invalid hierarchy change: {0}")]
    InvalidHierarchy(String),
    /// A transition phase did not complete within the configured timeout.
    #[error("{phase} did not complete within {timeout:.2}s")]
    PhaseTimeout { phase: &'static str, timeout: f32 },
    #[error(transparent)]
    Inject(#[from] InjectError),
}

/// Errors produced by the dependency injection walk.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// Injection depth must be at least 1 (the root itself).
    #[error("injection depth must be at least 1, got {0}")]
    InvalidDepth(usize),
    #[error("node {node} requires `{dependency}` but nothing is bound for it")]
    Unbound {
        node: NodeId,
        dependency: &'static str,
    },
    #[error("node {0} vanished during injection")]
    MissingNode(NodeId),
}
