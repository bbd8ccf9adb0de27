use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::SceneError;
use crate::scene::{SceneManager, SceneManagerConfig};
use crate::tree::SceneTree;

/// Context provided during app setup.
pub struct SetupContext<'a> {
    pub tree: &'a mut SceneTree,
    pub manager: &'a mut SceneManager,
}

/// Per-frame context handed to the frame closure.
pub struct Frame<'a> {
    pub tree: &'a mut SceneTree,
    pub manager: &'a mut SceneManager,
    /// Seconds since the loop started.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Number of frames stepped so far, this one included.
    pub frame: u64,
    exit: bool,
}

impl Frame<'_> {
    /// Get the current frames per second.
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    /// Stop the loop after this frame.
    pub fn exit(&mut self) {
        self.exit = true;
    }
}

/// Configuration for the frame loop.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    /// Target frames per second.
    pub frame_rate: f32,
    /// Stop after this many frames. `None` runs until the frame closure exits.
    pub max_frames: Option<u64>,
    pub scenes: SceneManagerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Stagehand".to_string(),
            frame_rate: 60.0,
            max_frames: None,
            scenes: SceneManagerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn scenes(mut self, scenes: SceneManagerConfig) -> Self {
        self.scenes = scenes;
        self
    }
}

/// A scene tree with its manager, stepped one frame at a time.
pub struct App {
    tree: SceneTree,
    manager: SceneManager,
    time: f32,
    frame: u64,
}

impl App {
    pub fn new(config: SceneManagerConfig) -> Result<Self, SceneError> {
        let mut tree = SceneTree::new();
        let manager = SceneManager::new(&mut tree, config)?;
        Ok(Self {
            tree,
            manager,
            time: 0.0,
            frame: 0,
        })
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn manager(&self) -> &SceneManager {
        &self.manager
    }

    /// Borrow the tree and the manager together.
    pub fn parts_mut(&mut self) -> (&mut SceneTree, &mut SceneManager) {
        (&mut self.tree, &mut self.manager)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance one frame by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> Result<(), SceneError> {
        self.tree.begin_frame();
        self.manager.process(&mut self.tree, dt)?;
        self.time += dt;
        self.frame += 1;
        Ok(())
    }
}

/// Run a headless frame loop with setup and frame closures.
///
/// Returns the number of frames stepped.
///
/// # Example
/// ```
/// use stagehand::scene::{NodeTemplate, Scene};
/// use stagehand::AppConfig;
///
/// let frames = stagehand::run_with_config(
///     AppConfig::new().frame_rate(1000.0).max_frames(3),
///     |ctx| {
///         let menu = Scene::from_template("menu", NodeTemplate::new("Menu"));
///         ctx.manager.goto_scene(ctx.tree, &menu)?;
///
///         Ok(move |frame: &mut stagehand::Frame| {
///             assert!(frame.manager.current_scene(frame.tree).is_some());
///             Ok(())
///         })
///     },
/// )
/// .unwrap();
/// assert_eq!(frames, 3);
/// ```
pub fn run_with_config<S, F>(config: AppConfig, setup: S) -> Result<u64, SceneError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, SceneError>,
    F: FnMut(&mut Frame) -> Result<(), SceneError>,
{
    let mut app = App::new(config.scenes.clone())?;
    let mut frame_fn = {
        let (tree, manager) = app.parts_mut();
        setup(&mut SetupContext { tree, manager })?
    };

    let frame_time = Duration::from_secs_f32(1.0 / config.frame_rate.max(1.0));
    info!(title = %config.title, frame_rate = config.frame_rate, "starting frame loop");

    let mut last = Instant::now();
    loop {
        if config.max_frames.is_some_and(|max| app.frame >= max) {
            break;
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        app.step(dt)?;

        let mut frame = Frame {
            time: app.time,
            dt,
            frame: app.frame,
            tree: &mut app.tree,
            manager: &mut app.manager,
            exit: false,
        };
        frame_fn(&mut frame)?;
        if frame.exit {
            debug!(frame = app.frame, "exit requested");
            break;
        }

        let elapsed = now.elapsed();
        if elapsed < frame_time {
            std::thread::sleep(frame_time - elapsed);
        }
    }

    info!(frames = app.frame, "frame loop finished");
    Ok(app.frame)
}

/// [`run_with_config`] with the default configuration.
pub fn run<S, F>(setup: S) -> Result<u64, SceneError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, SceneError>,
    F: FnMut(&mut Frame) -> Result<(), SceneError>,
{
    run_with_config(AppConfig::default(), setup)
}
