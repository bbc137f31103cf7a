//! Browser entry point.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use log::{error, info};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, HtmlCanvasElement, Window};

use crate::animation::{AnimationDriver, Clock};
use crate::composer::{SceneComposer, Viewport};
use crate::config::SceneConfig;
use crate::render::{CanvasSurface, RendererOptions};

/// Element the canvas is appended to when the page does not name one.
pub const DEFAULT_MOUNT_ID: &str = "hero-canvas";

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

/// `Date.now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateClock;

impl Clock for DateClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

/// Handle to a running hero scene.
#[wasm_bindgen]
pub struct HeroScene {
    inner: Rc<RefCell<AppState>>,
}

/// Mounts the hero scene under the element with id `mount_id` (or
/// `hero-canvas`) and starts animating it.
///
/// Returns `undefined` without touching the page when the element is missing.
#[wasm_bindgen(js_name = mountHeroScene)]
pub fn mount_hero_scene(mount_id: Option<String>) -> Result<Option<HeroScene>, JsValue> {
    let mount_id = mount_id.as_deref().unwrap_or(DEFAULT_MOUNT_ID);
    HeroScene::mount(mount_id).map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

impl HeroScene {
    fn mount(mount_id: &str) -> Result<Option<Self>> {
        let window = window().ok_or_else(|| anyhow!("window not available"))?;
        let document = window
            .document()
            .ok_or_else(|| anyhow!("document not available"))?;

        let config = SceneConfig::default();
        let options = RendererOptions {
            antialias: config.antialias,
            alpha: config.alpha,
        };
        let surface = match document.get_element_by_id(mount_id) {
            Some(container) => {
                let canvas = document
                    .create_element("canvas")
                    .map_err(|err| anyhow!("failed to create canvas: {err:?}"))?
                    .dyn_into::<HtmlCanvasElement>()
                    .map_err(|_| anyhow!("created element is not a canvas"))?;
                container
                    .append_child(&canvas)
                    .map_err(|err| anyhow!("failed to append canvas: {err:?}"))?;
                Some(CanvasSurface::new(canvas, options)?)
            }
            None => None,
        };

        let Some(mut composer) = SceneComposer::mount(surface, config, window_viewport(&window))?
        else {
            return Ok(None);
        };
        composer.populate(&mut rand::thread_rng())?;

        let state = Rc::new(RefCell::new(AppState {
            composer,
            driver: AnimationDriver::new(),
            animation_closure: None,
            resize_closure: None,
            frame_pending: false,
        }));
        install_resize_listener(&window, &state)?;
        install_animation_loop(&state);

        let scene = Self { inner: state };
        scene.start_loop()?;
        info!("hero scene mounted under #{mount_id}");
        Ok(Some(scene))
    }

    fn start_loop(&self) -> Result<()> {
        let mut state = self.inner.borrow_mut();
        state.driver.start();
        if !state.frame_pending {
            state.request_frame()?;
        }
        Ok(())
    }
}

#[wasm_bindgen]
impl HeroScene {
    /// Resumes a stopped animation.
    pub fn start(&self) -> Result<(), JsValue> {
        self.start_loop()
            .map_err(|err| JsValue::from_str(&format!("{err:#}")))
    }

    /// Stops the animation after the current frame.
    pub fn stop(&self) {
        self.inner.borrow_mut().driver.stop();
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.inner.borrow().driver.is_running()
    }

    /// Frames rendered since mounting.
    #[wasm_bindgen(getter)]
    pub fn frames(&self) -> f64 {
        self.inner.borrow().composer.frames() as f64
    }
}

struct AppState {
    composer: SceneComposer<CanvasSurface>,
    driver: AnimationDriver,
    animation_closure: Option<Closure<dyn FnMut()>>,
    resize_closure: Option<Closure<dyn FnMut()>>,
    frame_pending: bool,
}

impl AppState {
    fn request_frame(&mut self) -> Result<()> {
        let window = window().ok_or_else(|| anyhow!("window not available"))?;
        let closure = self
            .animation_closure
            .as_ref()
            .ok_or_else(|| anyhow!("animation loop not installed"))?;
        window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
        self.frame_pending = true;
        Ok(())
    }

    fn animate(&mut self) {
        self.frame_pending = false;
        match self.driver.tick(&mut self.composer, &DateClock) {
            Ok(true) => {
                if let Err(err) = self.request_frame() {
                    error!("{err:#}");
                }
            }
            Ok(false) => {}
            Err(err) => error!("hero scene stopped: {err}"),
        }
    }
}

/// Stores one frame callback that re-registers itself while the driver runs.
fn install_animation_loop(state: &Rc<RefCell<AppState>>) {
    let handle = Rc::clone(state);
    let closure = Closure::wrap(Box::new(move || {
        handle.borrow_mut().animate();
    }) as Box<dyn FnMut()>);
    state.borrow_mut().animation_closure = Some(closure);
}

fn install_resize_listener(window: &Window, state: &Rc<RefCell<AppState>>) -> Result<()> {
    let handle = Rc::clone(state);
    let closure = Closure::wrap(Box::new(move || {
        let Some(window) = web_sys::window() else {
            return;
        };
        let viewport = window_viewport(&window);
        if let Ok(mut state) = handle.try_borrow_mut() {
            state.composer.resize(viewport.width, viewport.height);
        }
    }) as Box<dyn FnMut()>);

    window
        .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("failed to add resize listener: {err:?}"))?;
    state.borrow_mut().resize_closure = Some(closure);
    Ok(())
}

fn window_viewport(window: &Window) -> Viewport {
    let dimension = |value: Result<JsValue, JsValue>| {
        value
            .ok()
            .and_then(|value| value.as_f64())
            .map(|value| value.max(0.0) as u32)
            .unwrap_or(1)
    };
    Viewport::new(
        dimension(window.inner_width()),
        dimension(window.inner_height()),
    )
    .with_pixel_ratio(window.device_pixel_ratio())
}
