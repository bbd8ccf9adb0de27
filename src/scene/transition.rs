//! Transition blueprints, easing curves and the fade state machine.

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Easing functions for smooth transitions.
///
/// These control the acceleration curve of transition animations.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant speed throughout.
    #[default]
    Linear,
    /// Start slow, accelerate.
    EaseIn,
    /// Start fast, decelerate.
    EaseOut,
    /// Start slow, speed up, then slow down.
    EaseInOut,
    /// User supplied curve mapping `[0, 1]` to `[0, 1]`.
    #[serde(skip)]
    Custom(fn(f32) -> f32),
}

impl Easing {
    /// Apply the easing function to a linear progress value (0.0 to 1.0).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::Custom(curve) => curve(t),
        }
    }
}

/// One phase of a fade: how long it takes and how it accelerates.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Fade {
    /// Duration in seconds.
    pub duration: f32,
    #[serde(default)]
    pub easing: Easing,
}

impl Fade {
    pub fn new(duration: f32, easing: Easing) -> Self {
        Self { duration, easing }
    }
}

/// Configuration for a fade-through-color scene transition.
///
/// The overlay fades in to cover the old scene, the scene is swapped while the
/// screen is covered, then the overlay fades out to reveal the new one.
///
/// # Example
///
/// ```
/// use stagehand::scene::{Easing, Transition};
///
/// // Half a second to black and half a second back
/// let fade = Transition::fade_to_black(1.0);
/// assert_eq!(fade.fade_in.duration, 0.5);
///
/// // Slow reveal with a custom curve
/// let slow = Transition::fade_to_white(0.4).fade_out(2.0, Easing::EaseOut);
/// assert_eq!(slow.fade_out.duration, 2.0);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    /// Overlay color (RGB used, alpha driven by the fade).
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    pub fade_in: Fade,
    pub fade_out: Fade,
}

fn default_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Default for Transition {
    fn default() -> Self {
        Self::instant()
    }
}

impl Transition {
    /// A transition whose phases both complete on the first frame.
    pub fn instant() -> Self {
        Self {
            color: default_color(),
            fade_in: Fade::default(),
            fade_out: Fade::default(),
        }
    }

    /// Fade to black, swap, fade back in.
    ///
    /// `duration` is the total time, split evenly between the two phases.
    pub fn fade_to_black(duration: f32) -> Self {
        Self::fade_to_color(Vec4::new(0.0, 0.0, 0.0, 1.0), duration)
    }

    pub fn fade_to_white(duration: f32) -> Self {
        Self::fade_to_color(Vec4::ONE, duration)
    }

    pub fn fade_to_color(color: Vec4, duration: f32) -> Self {
        let half = Fade::new(duration / 2.0, Easing::EaseInOut);
        Self {
            color: color.to_array(),
            fade_in: half,
            fade_out: half,
        }
    }

    /// Set the easing function for both phases.
    pub fn easing(mut self, easing: Easing) -> Self {
        self.fade_in.easing = easing;
        self.fade_out.easing = easing;
        self
    }

    /// Set the total duration, split evenly between the two phases.
    pub fn duration(mut self, duration: f32) -> Self {
        self.fade_in.duration = duration / 2.0;
        self.fade_out.duration = duration / 2.0;
        self
    }

    pub fn fade_in(mut self, duration: f32, easing: Easing) -> Self {
        self.fade_in = Fade::new(duration, easing);
        self
    }

    pub fn fade_out(mut self, duration: f32, easing: Easing) -> Self {
        self.fade_out = Fade::new(duration, easing);
        self
    }

    pub fn total_duration(&self) -> f32 {
        self.fade_in.duration + self.fade_out.duration
    }
}

/// Something that can produce a fresh transition effect for each swap.
pub trait TransitionBlueprint {
    fn instantiate(&self) -> Box<dyn SceneTransition>;

    /// Name given to the effect's node in the tree.
    fn node_name(&self) -> &str {
        "Transition"
    }
}

impl TransitionBlueprint for Transition {
    fn instantiate(&self) -> Box<dyn SceneTransition> {
        Box::new(FadeTransition::new(self.clone()))
    }
}

/// State of a transition effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionState {
    #[default]
    Idle,
    FadingIn,
    FadingOut,
}

/// Completion signal of a transition phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionSignal {
    /// The overlay fully covers the screen.
    TransitionedIn,
    /// The overlay is fully transparent again.
    TransitionedOut,
}

/// A visual effect bracketing a scene swap.
///
/// Effects are ticked once per frame through [`process`](Self::process),
/// which must do nothing while the effect is [`TransitionState::Idle`].
pub trait SceneTransition {
    /// Start covering the screen. Fails unless idle.
    fn transition_in(&mut self) -> Result<(), SceneError>;
    /// Start revealing the screen. Fails unless idle.
    fn transition_out(&mut self) -> Result<(), SceneError>;
    /// Advance by `dt` seconds, returning the phase signal on the frame the phase completes.
    fn process(&mut self, dt: f32) -> Option<TransitionSignal>;
    fn state(&self) -> TransitionState;
    /// Current overlay color; alpha is the opacity.
    fn overlay(&self) -> Vec4;
}

/// Fade-through-color effect driven by a [`Transition`].
#[derive(Clone, Debug)]
pub struct FadeTransition {
    config: Transition,
    state: TransitionState,
    opacity: f32,
    start: f32,
    target: f32,
    timer: f32,
}

impl FadeTransition {
    /// Create an idle, fully transparent effect.
    pub fn new(config: Transition) -> Self {
        Self {
            config,
            state: TransitionState::Idle,
            opacity: 0.0,
            start: 0.0,
            target: 0.0,
            timer: 0.0,
        }
    }

    pub fn config(&self) -> &Transition {
        &self.config
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    fn begin(&mut self, next: TransitionState, target: f32) -> Result<(), SceneError> {
        if self.state != TransitionState::Idle {
            return Err(SceneError::InvalidState(format!(
                "cannot start {next:?} while the transition is {:?}",
                self.state
            )));
        }
        self.start = self.opacity;
        self.target = target;
        self.timer = 0.0;
        self.state = next;
        Ok(())
    }
}

impl SceneTransition for FadeTransition {
    fn transition_in(&mut self) -> Result<(), SceneError> {
        self.begin(TransitionState::FadingIn, 1.0)
    }

    fn transition_out(&mut self) -> Result<(), SceneError> {
        self.begin(TransitionState::FadingOut, 0.0)
    }

    fn process(&mut self, dt: f32) -> Option<TransitionSignal> {
        let (fade, signal) = match self.state {
            TransitionState::Idle => return None,
            TransitionState::FadingIn => (self.config.fade_in, TransitionSignal::TransitionedIn),
            TransitionState::FadingOut => {
                (self.config.fade_out, TransitionSignal::TransitionedOut)
            }
        };

        self.timer += dt.max(0.0);
        let t = if fade.duration > 0.0 {
            self.timer / fade.duration
        } else {
            1.0
        };
        self.opacity = glam::FloatExt::lerp(self.start, self.target, fade.easing.apply(t));

        if self.timer >= fade.duration {
            self.opacity = self.target;
            self.state = TransitionState::Idle;
            Some(signal)
        } else {
            None
        }
    }

    fn state(&self) -> TransitionState {
        self.state
    }

    fn overlay(&self) -> Vec4 {
        let [r, g, b, _] = self.config.color;
        Vec4::new(r, g, b, self.opacity)
    }
}
