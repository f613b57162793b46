//! contact-backdrop: animated contact-page background and webhook form
//!
//! `render` mounts the background on a headless surface and writes a
//! frame to disk, `submit` delivers the contact form to the configured
//! webhook and, on Windows, `overlay` shows the live background behind
//! the desktop's windows.

mod app;
mod config;
mod domain;
mod platform;
mod ui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use app::controller::{SubmissionController, SubmitError};
use app::notify::LogNotifier;
use config::{AppConfig, ConfigError};
use domain::core::Viewport;
use domain::form::FormField;
use platform::mount::MemoryMount;
use platform::webhook::WebhookError;
use ui::{FrameScheduler, ManualClock, SceneError, SceneLifecycleManager};

#[derive(Debug, Parser)]
#[command(name = "contact-backdrop", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the background headlessly and save the last frame as PNG
    Render {
        /// Number of frames to simulate
        #[arg(long, default_value_t = 60)]
        frames: u32,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Resize the surface to WIDTHxHEIGHT halfway through
        #[arg(long, value_parser = parse_viewport)]
        resize: Option<Viewport>,
        #[arg(long, default_value = "frame.png")]
        output: PathBuf,
    },
    /// Submit the contact form
    Submit(SubmitArgs),
    /// Show the background in a click-through desktop overlay
    #[cfg(windows)]
    Overlay {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

#[derive(Debug, Args)]
struct SubmitArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    company: String,
    #[arg(long, default_value = "")]
    position: String,
    #[arg(long)]
    country: String,
    #[arg(long)]
    message: String,
    /// Deliveries to make, re-arming the form between them
    #[arg(long, default_value_t = 1)]
    repeat: u32,
}

impl SubmitArgs {
    fn into_values(self) -> [(FormField, String); 8] {
        [
            (FormField::FirstName, self.first_name),
            (FormField::LastName, self.last_name),
            (FormField::Email, self.email),
            (FormField::Phone, self.phone),
            (FormField::Company, self.company),
            (FormField::Position, self.position),
            (FormField::Country, self.country),
            (FormField::Message, self.message),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Render {
            frames,
            width,
            height,
            resize,
            output,
        } => {
            let configured = config.scene.viewport();
            let viewport = Viewport::new(
                width.unwrap_or(configured.width),
                height.unwrap_or(configured.height),
            );
            render(&config, viewport, frames, resize, &output)
        }
        Command::Submit(args) => submit(&config, args),
        #[cfg(windows)]
        Command::Overlay { seconds } => overlay(&config, seconds),
    }
}

/// Parses `WIDTHxHEIGHT`
fn parse_viewport(text: &str) -> Result<Viewport, String> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let width = width.trim().parse::<u32>().map_err(|e| format!("width: {e}"))?;
    let height = height.trim().parse::<u32>().map_err(|e| format!("height: {e}"))?;
    Ok(Viewport::new(width, height))
}

/// Mounts the scene headlessly, simulates `frames` frames and saves the last
fn render(
    config: &AppConfig,
    viewport: Viewport,
    frames: u32,
    resize: Option<Viewport>,
    output: &Path,
) -> Result<(), CliError> {
    let clock = ManualClock::new();
    let manager = SceneLifecycleManager::new(FrameScheduler::new(clock.clone()))
        .antialias(config.scene.antialias);
    let mount = MemoryMount::shared();
    let mut slot = None;
    let handle = manager.remount(&mut slot, mount.clone(), viewport)?;

    let interval = config.scene.frame_interval();
    let frames = frames.max(1);
    for frame in 0..frames {
        if let Some(size) = resize.filter(|_| frame == frames / 2) {
            handle.resize(size)?;
            log::info!("Resized background to {}x{}", size.width, size.height);
        }
        clock.advance(interval);
        manager.scheduler().run_frame();
    }

    handle.save_frame(output)?;
    if let Some(surface) = mount.borrow().surface() {
        let size = surface
            .last_frame
            .as_ref()
            .map(|frame| (frame.width(), frame.height()));
        log::debug!(
            "Surface {:?} received {} frames, last one {:?}",
            surface.id,
            surface.frames_presented,
            size
        );
    }
    log::info!(
        "Wrote frame {} ({:.2}s of animation) to {}",
        handle.ticks(),
        handle.elapsed().as_secs_f32(),
        output.display()
    );

    handle.teardown();
    if !mount.borrow().is_empty() || manager.scheduler().pending_count() > 0 {
        log::warn!("Background left a surface or frame request behind after teardown");
    }
    Ok(())
}

fn submit(config: &AppConfig, args: SubmitArgs) -> Result<(), CliError> {
    let repeat = args.repeat.max(1);
    let controller = SubmissionController::from_config(&config.webhook, LogNotifier)?;
    for (field, value) in args.into_values() {
        controller.update_field(field, value);
    }

    let missing = controller.form().missing_required();
    if !missing.is_empty() {
        log::warn!(
            "Submitting with empty required fields: {}",
            missing
                .iter()
                .map(|field| field.wire_name())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    log::info!("Delivering contact form to {}", controller.endpoint());
    let mut result = Ok(());
    for attempt in 1..=repeat {
        if attempt > 1 {
            controller.reset();
        }
        let delivery = runtime.block_on(controller.submit());
        println!("Submission {}: {:?}", attempt, controller.phase());
        if let Err(e) = delivery {
            result = Err(e);
            break;
        }
    }

    controller.dispose();
    result?;
    Ok(())
}

#[cfg(windows)]
fn overlay(config: &AppConfig, seconds: u64) -> Result<(), CliError> {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use platform::overlay::{OverlayMount, pump_messages};
    use ui::frames::{FrameDriver, SystemClock};

    let scheduler = FrameScheduler::new(SystemClock::new());
    let manager =
        SceneLifecycleManager::new(scheduler.clone()).antialias(config.scene.antialias);
    let mount = Rc::new(RefCell::new(OverlayMount::new(0, 0)));
    let handle = manager.setup(mount, config.scene.viewport())?;

    let driver = FrameDriver::new(scheduler, config.scene.frame_interval());
    let frames = driver.run_for(Duration::from_secs(seconds), pump_messages);
    log::info!("Overlay ran {} frames", frames);

    handle.teardown();
    Ok(())
}
