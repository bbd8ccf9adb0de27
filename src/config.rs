//! TOML settings for wiring a scene manager and its injector.
//!
//! ```toml
//! self_contained = true
//! injection_depth = 2
//! default_transition = "black"
//!
//! [auto_load]
//! scene = "title"
//! delay_secs = 0.5
//! transition = "black"
//!
//! [transitions.black]
//! fade_in = { duration = 0.3, easing = "ease_in" }
//! fade_out = { duration = 0.6, easing = "ease_out" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scene::{AutoLoad, SceneLibrary, SceneLoadInjector, SceneManagerConfig, Transition};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub self_contained: bool,
    #[serde(default = "default_transition_layer")]
    pub transition_layer: i32,
    #[serde(default = "default_injection_depth")]
    pub injection_depth: usize,
    #[serde(default)]
    pub inject_initial_scene: bool,
    #[serde(default)]
    pub default_transition: Option<String>,
    #[serde(default)]
    pub auto_load: Option<AutoLoadSettings>,
    #[serde(default)]
    pub phase_timeout_secs: Option<f32>,
    #[serde(default)]
    pub transitions: BTreeMap<String, Transition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutoLoadSettings {
    pub scene: String,
    #[serde(default)]
    pub delay_secs: f32,
    #[serde(default)]
    pub transition: Option<String>,
}

fn default_transition_layer() -> i32 {
    100
}

fn default_injection_depth() -> usize {
    2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            self_contained: false,
            transition_layer: default_transition_layer(),
            injection_depth: default_injection_depth(),
            inject_initial_scene: false,
            default_transition: None,
            auto_load: None,
            phase_timeout_secs: None,
            transitions: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn transition(&self, name: &str) -> Result<&Transition, ConfigError> {
        self.transitions
            .get(name)
            .ok_or_else(|| ConfigError::Invalid(format!("transition '{name}' is not defined")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.injection_depth == 0 {
            return Err(ConfigError::Invalid(
                "injection_depth must be at least 1".into(),
            ));
        }

        for (name, transition) in &self.transitions {
            for (phase, fade) in [("fade_in", transition.fade_in), ("fade_out", transition.fade_out)] {
                if !is_valid_seconds(fade.duration) {
                    return Err(ConfigError::Invalid(format!(
                        "transition '{name}' {phase} duration must be a non-negative number"
                    )));
                }
            }
        }

        if let Some(name) = &self.default_transition {
            self.transition(name)?;
        }

        if let Some(auto_load) = &self.auto_load {
            if auto_load.scene.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "auto_load scene must not be empty".into(),
                ));
            }
            if !is_valid_seconds(auto_load.delay_secs) {
                return Err(ConfigError::Invalid(
                    "auto_load delay_secs must be a non-negative number".into(),
                ));
            }
            if let Some(name) = &auto_load.transition {
                self.transition(name)?;
            }
        }

        if let Some(timeout) = self.phase_timeout_secs {
            if !is_valid_seconds(timeout) {
                return Err(ConfigError::Invalid(
                    "phase_timeout_secs must be a non-negative number".into(),
                ));
            }
        }

        Ok(())
    }

    /// Build a manager configuration, looking auto-load scenes up in `library`.
    pub fn resolve(&self, library: &SceneLibrary) -> Result<SceneManagerConfig, ConfigError> {
        let mut config = SceneManagerConfig::new()
            .self_contained(self.self_contained)
            .transition_layer(self.transition_layer);

        if let Some(name) = &self.default_transition {
            config = config.default_transition(self.transition(name)?.clone());
        }
        if let Some(timeout) = self.phase_timeout_secs {
            config = config.phase_timeout(timeout);
        }
        if let Some(auto_load) = &self.auto_load {
            let scene = library.get(&auto_load.scene).cloned().ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "auto_load scene '{}' is not registered",
                    auto_load.scene
                ))
            })?;
            let mut load = AutoLoad::new(scene, auto_load.delay_secs);
            if let Some(name) = &auto_load.transition {
                load = load.with_transition(self.transition(name)?.clone());
            }
            config = config.auto_load(load);
        }

        Ok(config)
    }

    /// Injector for loaded scenes at the configured depth.
    pub fn load_injector(&self) -> Result<SceneLoadInjector, ConfigError> {
        SceneLoadInjector::new(self.injection_depth)
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

fn is_valid_seconds(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}
