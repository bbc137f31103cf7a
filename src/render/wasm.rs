use anyhow::{anyhow, Result};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::{physical_size, Painter, RenderError, RenderSurface, RendererOptions};
use crate::camera::PerspectiveCamera;
use crate::color::Color;
use crate::scene::Scene;

/// Surface backed by a 2D canvas, drawn with the painter's algorithm.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    options: RendererOptions,
    size: (u32, u32),
    pixel_ratio: f64,
    painter: Painter,
}

impl CanvasSurface {
    /// Wraps the provided canvas element.
    pub fn new(canvas: HtmlCanvasElement, options: RendererOptions) -> Result<Self> {
        let context = canvas
            .get_context_with_context_options("2d", &context_options(options.alpha))
            .map_err(|err| anyhow!("failed to query canvas context: {err:?}"))?
            .ok_or_else(|| anyhow!("canvas does not support 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| anyhow!("failed to cast canvas context"))?;
        context.set_line_join("round");

        let size = (canvas.width(), canvas.height());
        Ok(Self {
            canvas,
            context,
            options,
            size,
            pixel_ratio: 1.0,
            painter: Painter::new(),
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn apply_size(&mut self) {
        let (width, height) = physical_size(self.size.0, self.size.1, self.pixel_ratio);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", self.size.0));
        let _ = style.set_property("height", &format!("{}px", self.size.1));
    }
}

fn context_options(alpha: bool) -> JsValue {
    let options = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&options, &"alpha".into(), &alpha.into());
    options.into()
}

impl RenderSurface for CanvasSurface {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.apply_size();
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
        self.apply_size();
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        if width == 0 || height == 0 {
            return Err(RenderError::SurfaceLost);
        }

        self.context
            .set_fill_style(&Color::css(scene.background.rgb()).into());
        self.context.fill_rect(0.0, 0.0, width as f64, height as f64);

        for polygon in self.painter.paint(scene, camera, (width, height)) {
            let Some((first, rest)) = polygon.points.split_first() else {
                continue;
            };
            let style: JsValue = Color::css(polygon.fill).into();
            self.context.begin_path();
            self.context.move_to(first.x as f64, first.y as f64);
            for point in rest {
                self.context.line_to(point.x as f64, point.y as f64);
            }
            self.context.close_path();
            self.context.set_fill_style(&style);
            self.context.fill();
            // Canvas antialiasing leaves hairline gaps between adjacent triangles.
            if self.options.antialias {
                self.context.set_stroke_style(&style);
                self.context.stroke();
            }
        }
        Ok(())
    }
}
