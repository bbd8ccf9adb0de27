use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stagehand::scene::{NodeTemplate, Scene, SceneLibrary, Transition, TransitionBlueprint};
use stagehand::{
    AppConfig, Container, DependencyInjector, Injected, Requires, SceneError, Settings,
};

const DEFAULT_SETTINGS: &str = include_str!("../stagehand.toml");

#[derive(Parser, Debug)]
#[command(
    name = "stagehand",
    version,
    about = "Headless demo: title screen, fade, level"
)]
struct Args {
    /// Settings file; the bundled demo settings are used when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Frames per second of the headless loop.
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Give up after this many frames.
    #[arg(long, default_value_t = 600)]
    max_frames: u64,

    /// Seconds to stay on the title screen before moving on.
    #[arg(long, default_value_t = 1.0)]
    title_hold: f32,
}

/// Shared game state handed to scenes that ask for it.
struct GameState {
    player: String,
    lives: u32,
}

fn main() -> Result<()> {
    initialise_tracing();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::from_toml_str(DEFAULT_SETTINGS).context("bundled settings are invalid")?,
    };

    let library = scene_library();
    let scenes = settings
        .resolve(&library)
        .context("failed to resolve scene manager settings")?;
    let mut trigger = settings.load_injector()?;

    let mut container = Container::new();
    container.bind(GameState {
        player: "ada".to_string(),
        lives: 3,
    });
    let injector = Rc::new(RefCell::new(DependencyInjector::new(container)));

    // Used when no default transition is configured.
    let fallback = settings
        .default_transition
        .is_none()
        .then(|| Transition::fade_to_black(1.0));
    let title_hold = args.title_hold;
    let has_auto_load = settings.auto_load.is_some();
    let inject_initial_scene = settings.inject_initial_scene;

    let frames = stagehand::run_with_config(
        AppConfig::new()
            .title("stagehand demo")
            .frame_rate(args.fps)
            .max_frames(args.max_frames)
            .scenes(scenes),
        move |ctx| {
            *ctx.manager.scenes_mut() = library;
            trigger.attach(ctx.manager, Rc::clone(&injector));

            ctx.manager.scene_readied().connect(|tree, scene| {
                let name = tree.name(*scene).unwrap_or_default();
                match tree.get::<Injected>(*scene).and_then(|i| i.get::<GameState>()) {
                    Some(state) => tracing::info!(
                        scene = %name,
                        player = %state.player,
                        lives = state.lives,
                        "scene ready"
                    ),
                    None => tracing::info!(scene = %name, "scene ready"),
                }
                Ok(())
            });
            ctx.manager.transition_signal().connect(|_, signal| {
                tracing::debug!(?signal, "transition phase complete");
                Ok(())
            });

            if !has_auto_load {
                ctx.manager.goto(ctx.tree, "title")?;
            }
            if inject_initial_scene {
                trigger.inject_current(ctx.tree, ctx.manager, &mut *injector.borrow_mut())?;
            }

            let mut title_since = None;
            Ok(move |frame: &mut stagehand::Frame| -> Result<(), SceneError> {
                if frame.manager.is_transitioning() {
                    return Ok(());
                }
                let current = frame
                    .manager
                    .current_scene(frame.tree)
                    .and_then(|scene| frame.tree.name(scene));

                match current.as_deref() {
                    Some("Title") => {
                        let since = *title_since.get_or_insert(frame.time);
                        if frame.time - since >= title_hold {
                            let transition =
                                fallback.as_ref().map(|t| t as &dyn TransitionBlueprint);
                            frame.manager.transition_to_id(frame.tree, "level", transition)?;
                        }
                    }
                    Some("Level") => frame.exit(),
                    _ => {}
                }
                Ok(())
            })
        },
    )?;

    tracing::info!(frames, "demo finished");
    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn scene_library() -> SceneLibrary {
    let mut library = SceneLibrary::new();
    library.register(Scene::from_template(
        "title",
        NodeTemplate::new("Title")
            .child(NodeTemplate::new("Logo"))
            .child(NodeTemplate::new("PressStart")),
    ));
    library.register(Scene::from_template(
        "level",
        NodeTemplate::new("Level")
            .requires(Requires::new().with::<GameState>())
            .child(NodeTemplate::new("Player").requires(Requires::new().with::<GameState>()))
            .child(NodeTemplate::new("Hud").requires(Requires::new().with::<GameState>())),
    ));
    library
}
