use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use pollster::block_on;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use hero_scene::render::GpuSurface;
use hero_scene::{
    AnimationDriver, Clock, HeadlessSurface, ManualClock, RenderSurface, RendererOptions,
    SceneComposer, SceneConfig, SystemClock, Viewport,
};

const USAGE: &str = "Usage: hero-scene [--headless] [--frames N] [--seed N] [--size WxH]";
const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    if options.headless {
        return run_headless(&options);
    }
    match run_interactive(&options) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(&options)
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    headless: bool,
    frames: u64,
    seed: Option<u64>,
    width: u32,
    height: u32,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            headless: false,
            frames: 120,
            seed: None,
            width: 1280,
            height: 720,
        }
    }
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => options.headless = true,
                "--frames" => {
                    options.frames = parse_value(&arg, args.next())?;
                }
                "--seed" => {
                    options.seed = Some(parse_value(&arg, args.next())?);
                }
                "--size" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--size expects a value. {USAGE}"))?;
                    (options.width, options.height) = parse_size(&value)?;
                }
                "--help" | "-h" => return Err(anyhow!(USAGE)),
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

fn parse_value<T>(flag: &str, value: Option<String>) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = value.ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))?;
    value
        .parse()
        .with_context(|| format!("invalid value for {flag}: {value}"))
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("invalid size {value}, expected WxH"))?;
    let width: u32 = width
        .parse()
        .with_context(|| format!("invalid width in {value}"))?;
    let height: u32 = height
        .parse()
        .with_context(|| format!("invalid height in {value}"))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("size must be non-zero, got {value}"));
    }
    Ok((width, height))
}

fn renderer_options(config: &SceneConfig) -> RendererOptions {
    RendererOptions {
        antialias: config.antialias,
        alpha: config.alpha,
    }
}

fn run_headless(options: &CliOptions) -> Result<()> {
    let config = SceneConfig::default();
    let surface = HeadlessSurface::new(renderer_options(&config));
    let mut composer = SceneComposer::new(config, options.viewport(), surface)
        .context("failed to set up the scene")?;
    composer
        .populate(&mut options.rng())
        .context("failed to compose the scene")?;
    print_composition(&composer);

    let clock = ManualClock::new(SystemClock.now_ms());
    let mut driver = AnimationDriver::new();
    driver.start();
    let rendered = driver.run_frames(&mut composer, &clock, options.frames, |_| {
        clock.advance(FRAME_INTERVAL_MS)
    })?;
    driver.stop();

    let (width, height) = composer.surface().physical_size();
    println!("Rendered {rendered} frame(s) at {width}x{height}");
    if let Some(frame) = composer.surface().last_frame() {
        println!(
            "Last frame: {} draw calls, {} visible triangles",
            frame.draw_calls, frame.triangles
        );
    }
    print_final_state(&composer);
    Ok(())
}

fn print_composition<S: RenderSurface>(composer: &SceneComposer<S>) {
    println!(
        "Composed scene with {} turbines, {} solar panels, {} buildings ({} nodes)",
        composer.turbines().len(),
        composer.solar_panels().len(),
        composer.buildings().len(),
        composer.scene().len()
    );
}

fn print_final_state<S: RenderSurface>(composer: &SceneComposer<S>) {
    let camera = composer.camera();
    println!(
        "Camera at ({:.2}, {:.2}, {:.2})",
        camera.position.x, camera.position.y, camera.position.z
    );
    println!("Final turbine states:");
    let scene = composer.scene();
    for (index, turbine) in composer.turbines().iter().enumerate() {
        let position = scene
            .node(turbine.group)
            .map(|node| node.transform.position)
            .unwrap_or_default();
        let angle = scene
            .node(turbine.blades)
            .map(|node| node.transform.rotation.z)
            .unwrap_or_default();
        println!(
            " - turbine {index} at ({:.1}, {:.1}) speed={:.4} angle={angle:.3}",
            position.x, position.z, turbine.rotation_speed
        );
    }
}

fn run_interactive(options: &CliOptions) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut app = HeroApp {
        options: options.clone(),
        state: None,
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(state) = &app.state {
        print_final_state(&state.composer);
    }
    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct HeroApp {
    options: CliOptions,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

struct AppState {
    composer: SceneComposer<GpuSurface>,
    driver: AnimationDriver,
}

impl HeroApp {
    fn init(&self, event_loop: &ActiveEventLoop) -> Result<AppState> {
        let config = SceneConfig::default();
        let attributes = Window::default_attributes()
            .with_title("Hero Scene")
            .with_inner_size(LogicalSize::new(
                self.options.width as f64,
                self.options.height as f64,
            ))
            .with_transparent(config.alpha);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let viewport = logical_viewport(window.inner_size(), window.scale_factor());
        let surface = block_on(GpuSurface::new(Arc::clone(&window), renderer_options(&config)))?;
        let mut composer = SceneComposer::new(config, viewport, surface)?;
        composer.populate(&mut self.options.rng())?;
        print_composition(&composer);

        let mut driver = AnimationDriver::new();
        driver.start();
        window.request_redraw();
        Ok(AppState { composer, driver })
    }
}

/// The window manager may not honor the requested size, so the viewport
/// always comes from what the window reports.
fn logical_viewport(size: PhysicalSize<u32>, scale_factor: f64) -> Viewport {
    let logical = size.to_logical::<f64>(scale_factor);
    Viewport::new(logical.width.round() as u32, logical.height.round() as u32)
        .with_pixel_ratio(scale_factor)
}

impl ApplicationHandler for HeroApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if window_id != state.composer.surface().window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                state.driver.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let viewport = logical_viewport(size, state.composer.viewport().pixel_ratio);
                state.composer.resize(viewport.width, viewport.height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                state.composer.set_pixel_ratio(scale_factor);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = state.driver.tick(&mut state.composer, &SystemClock) {
                    self.error = Some(err.into());
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if state.driver.is_running() {
            state.composer.surface().window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        match &self.state {
            Some(state) => info!("window closed after {} frame(s)", state.driver.ticks()),
            None => warn!("exiting before the scene was composed"),
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_when_no_arguments() {
        assert_eq!(parse(&[]).unwrap(), CliOptions::default());
    }

    #[test]
    fn parses_all_flags() {
        let options =
            parse(&["--headless", "--frames", "5", "--seed", "7", "--size", "800x600"]).unwrap();
        assert!(options.headless);
        assert_eq!(options.frames, 5);
        assert_eq!(options.seed, Some(7));
        assert_eq!((options.width, options.height), (800, 600));
    }

    #[test]
    fn viewport_follows_reported_window_size() {
        let viewport = logical_viewport(PhysicalSize::new(2000, 1000), 2.0);
        assert_eq!((viewport.width, viewport.height), (1000, 500));
        assert_eq!(viewport.pixel_ratio, 2.0);

        let viewport = logical_viewport(PhysicalSize::new(1366, 768), 1.0);
        assert_eq!((viewport.width, viewport.height), (1366, 768));

        let viewport = logical_viewport(PhysicalSize::new(0, 0), 1.5);
        assert_eq!((viewport.width, viewport.height), (1, 1));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
        assert!(parse(&["--size", "800"]).is_err());
        assert!(parse(&["--size", "0x600"]).is_err());
    }
}
