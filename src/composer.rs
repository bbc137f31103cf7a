//! Composition of the hero scene: setup, object placement, per-frame update
//! and viewport handling.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_6, TAU};

use glam::Vec3;
use log::{debug, info, warn};
use rand::Rng;

use crate::camera::PerspectiveCamera;
use crate::config::SceneConfig;
use crate::error::{HeroError, Result};
use crate::geometry::Geometry;
use crate::render::RenderSurface;
use crate::scene::{Fog, Light, Material, NodeId, Scene, Transform};

const POLE_RADIUS_TOP: f32 = 0.2;
const POLE_RADIUS_BOTTOM: f32 = 0.4;
const POLE_HEIGHT: f32 = 8.0;
const HUB_RADIUS: f32 = 0.3;
const HUB_HEIGHT: f32 = 6.0;
const HUB_OFFSET: f32 = 0.3;
const BLADE_COUNT: usize = 3;
const BLADE_RADIUS: f32 = 1.5;
const BLADE_SIZE: (f32, f32, f32) = (0.3, 3.5, 0.1);
const ROUND_SEGMENTS: u32 = 8;

const STAND_RADIUS: f32 = 0.05;
const STAND_HEIGHT: f32 = 1.0;
const STAND_OFFSET: f32 = 0.5;
const PANEL_SIZE: (f32, f32, f32) = (1.5, 0.1, 1.0);
const PANEL_TILT: f32 = FRAC_PI_6;

const ACCENT_MARGIN: f32 = 0.1;
const ACCENT_THICKNESS: f32 = 0.2;

/// Host viewport in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// A placed wind turbine whose blades spin every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turbine {
    pub group: NodeId,
    pub blades: NodeId,
    /// Radians subtracted from the blade angle per frame.
    pub rotation_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Building {
    pub base: NodeId,
    pub accent: NodeId,
}

/// Owns the scene, camera and output surface of one hero scene instance.
pub struct SceneComposer<S> {
    config: SceneConfig,
    scene: Scene,
    camera: PerspectiveCamera,
    surface: S,
    viewport: Viewport,
    world: NodeId,
    ground: Option<NodeId>,
    turbines: Vec<Turbine>,
    solar_panels: Vec<NodeId>,
    buildings: Vec<Building>,
    frames: u64,
}

impl<S: RenderSurface> SceneComposer<S> {
    /// Sets up scene, lighting, camera and surface. No decorative objects yet.
    pub fn new(config: SceneConfig, viewport: Viewport, mut surface: S) -> Result<Self> {
        let speed = config.turbine_speed;
        if !(speed.min.is_finite() && speed.max.is_finite() && speed.min < speed.max) {
            return Err(HeroError::InvalidConfig(format!(
                "turbine speed range [{}, {}) is empty",
                speed.min, speed.max
            )));
        }
        let mut scene = Scene::new(config.background);
        scene.fog = Some(Fog {
            color: config.fog.color,
            near: config.fog.near,
            far: config.fog.far,
        });
        let lighting = config.lighting;
        scene.lights.push(Light::Ambient {
            color: lighting.ambient_color,
            intensity: lighting.ambient_intensity,
        });
        scene.lights.push(Light::Directional {
            color: lighting.sun_color,
            intensity: lighting.sun_intensity,
            position: lighting.sun_position,
            cast_shadow: lighting.sun_casts_shadow,
        });

        let world = scene.add_group(scene.root(), "world", Transform::default())?;
        let camera = PerspectiveCamera::from_config(&config.camera, viewport.aspect());

        surface.set_size(viewport.width, viewport.height);
        surface.set_pixel_ratio(viewport.pixel_ratio);

        Ok(Self {
            config,
            scene,
            camera,
            surface,
            viewport,
            world,
            ground: None,
            turbines: Vec::new(),
            solar_panels: Vec::new(),
            buildings: Vec::new(),
            frames: 0,
        })
    }

    /// Like [`SceneComposer::new`], but does nothing when the host has no
    /// mount point to hand over a surface for.
    pub fn mount(mount: Option<S>, config: SceneConfig, viewport: Viewport) -> Result<Option<Self>> {
        match mount {
            Some(surface) => Self::new(config, viewport, surface).map(Some),
            None => {
                debug!("no mount point for the hero scene, skipping");
                Ok(None)
            }
        }
    }

    /// Places the ground and the whole configured catalog.
    pub fn populate<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.place_ground()?;
        let catalog = self.config.catalog.clone();
        for site in &catalog.turbines {
            self.place_turbine(site.x, site.z, site.scale, rng)?;
        }
        for site in &catalog.solar_panels {
            self.place_solar_panel(site.x, site.z)?;
        }
        for site in &catalog.buildings {
            self.place_building(site.x, site.z, site.width, site.height, site.depth)?;
        }
        info!(
            "composed hero scene: {} turbines, {} solar panels, {} buildings ({} nodes)",
            self.turbines.len(),
            self.solar_panels.len(),
            self.buildings.len(),
            self.scene.len()
        );
        Ok(())
    }

    pub fn place_ground(&mut self) -> Result<NodeId> {
        let catalog = &self.config.catalog;
        let mut transform = Transform::at(Vec3::new(0.0, catalog.ground_level, 0.0));
        transform.rotation.x = -FRAC_PI_2;
        let ground = self.scene.add_mesh(
            self.world,
            "ground",
            Geometry::plane(catalog.ground_size, catalog.ground_size),
            Material::matte(self.config.palette.ground),
            transform,
        )?;
        self.ground = Some(ground);
        Ok(ground)
    }

    /// Places a turbine at ground position `(x, z)`, uniformly scaled.
    pub fn place_turbine<R: Rng>(
        &mut self,
        x: f32,
        z: f32,
        scale: f32,
        rng: &mut R,
    ) -> Result<Turbine> {
        let white = Material::matte(self.config.palette.white);
        let mut transform = Transform::at(Vec3::new(x, 0.0, z));
        transform.scale = Vec3::splat(scale);
        let group = self.scene.add_group(self.world, "turbine", transform)?;

        let pole_y = self.config.catalog.ground_level + POLE_HEIGHT / 2.0;
        self.scene.add_mesh(
            group,
            "pole",
            Geometry::cylinder(POLE_RADIUS_TOP, POLE_RADIUS_BOTTOM, POLE_HEIGHT, ROUND_SEGMENTS),
            white,
            Transform::at(Vec3::new(0.0, pole_y, 0.0)),
        )?;

        let hub_position = Vec3::new(0.0, HUB_HEIGHT, HUB_OFFSET);
        self.scene.add_mesh(
            group,
            "hub",
            Geometry::sphere(HUB_RADIUS, ROUND_SEGMENTS, ROUND_SEGMENTS),
            white,
            Transform::at(hub_position),
        )?;

        let blades = self
            .scene
            .add_group(group, "blades", Transform::at(hub_position))?;
        let (width, height, depth) = BLADE_SIZE;
        for i in 0..BLADE_COUNT {
            let angle = i as f32 * TAU / BLADE_COUNT as f32;
            let mut transform = Transform::at(Vec3::new(
                angle.sin() * BLADE_RADIUS,
                angle.cos() * BLADE_RADIUS,
                0.0,
            ));
            transform.rotation.z = -angle;
            self.scene.add_mesh(
                blades,
                "blade",
                Geometry::cuboid(width, height, depth),
                white,
                transform,
            )?;
        }

        let speed = self.config.turbine_speed;
        let rotation_speed = rng.gen_range(speed.min..speed.max);
        let turbine = Turbine {
            group,
            blades,
            rotation_speed,
        };
        debug!("placed turbine at ({x}, {z}) scale {scale} speed {rotation_speed:.4}");
        self.turbines.push(turbine);
        Ok(turbine)
    }

    /// Places two stands and a tilted panel; returns the panel group.
    pub fn place_solar_panel(&mut self, x: f32, z: f32) -> Result<NodeId> {
        let palette = self.config.palette;
        let grey = Material::matte(palette.grey);
        let blue = Material {
            color: palette.solar,
            metalness: palette.solar_metalness,
            roughness: palette.solar_roughness,
        };
        let base_y = self.config.catalog.ground_level + STAND_HEIGHT / 2.0;
        let group = self.scene.add_group(
            self.world,
            "solar-panel",
            Transform::at(Vec3::new(x, base_y, z)),
        )?;

        let stand = Geometry::cylinder(STAND_RADIUS, STAND_RADIUS, STAND_HEIGHT, ROUND_SEGMENTS);
        for offset in [-STAND_OFFSET, STAND_OFFSET] {
            self.scene.add_mesh(
                group,
                "stand",
                stand,
                grey,
                Transform::at(Vec3::new(offset, 0.0, 0.0)),
            )?;
        }

        let (width, height, depth) = PANEL_SIZE;
        let mut transform = Transform::at(Vec3::new(0.0, STAND_HEIGHT / 2.0, 0.0));
        transform.rotation.x = PANEL_TILT;
        self.scene.add_mesh(
            group,
            "panel",
            Geometry::cuboid(width, height, depth),
            blue,
            transform,
        )?;

        debug!("placed solar panel at ({x}, {z})");
        self.solar_panels.push(group);
        Ok(group)
    }

    /// Places a box building standing on the ground with a trim on its roof.
    pub fn place_building(
        &mut self,
        x: f32,
        z: f32,
        width: f32,
        height: f32,
        depth: f32,
    ) -> Result<Building> {
        let palette = self.config.palette;
        let ground = self.config.catalog.ground_level;
        let base = self.scene.add_mesh(
            self.world,
            "building",
            Geometry::cuboid(width, height, depth),
            Material::matte(palette.white),
            Transform::at(Vec3::new(x, height / 2.0 + ground, z)),
        )?;
        let accent = self.scene.add_mesh(
            self.world,
            "accent",
            Geometry::cuboid(width + ACCENT_MARGIN, ACCENT_THICKNESS, depth + ACCENT_MARGIN),
            Material::matte(palette.accent),
            Transform::at(Vec3::new(x, height + ground, z)),
        )?;

        debug!("placed building at ({x}, {z}) {width}x{height}x{depth}");
        let building = Building { base, accent };
        self.buildings.push(building);
        Ok(building)
    }

    /// Advances every turbine by one frame. Angles stay in `[0, 2π)`.
    pub fn spin_turbines(&mut self) {
        for turbine in &self.turbines {
            if let Some(transform) = self.scene.transform_mut(turbine.blades) {
                transform.rotation.z = wrap_angle(transform.rotation.z - turbine.rotation_speed);
            }
        }
    }

    /// Moves the camera along its sway path and re-aims it.
    pub fn sway_camera(&mut self, now_ms: f64) {
        let (x, y) = self.config.sway.offset(now_ms);
        self.camera.position.x = x;
        self.camera.position.y = y;
        self.camera.look_at(self.config.camera.look_at);
    }

    /// One animation frame: spin blades, move camera, render.
    ///
    /// Non-fatal render failures skip the frame; fatal ones are returned.
    pub fn step(&mut self, now_ms: f64) -> Result<()> {
        self.spin_turbines();
        self.sway_camera(now_ms);
        match self.surface.render(&self.scene, &self.camera) {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => warn!("skipping frame {}: {err}", self.frames),
        }
        self.frames += 1;
        Ok(())
    }

    /// Applies a new viewport size to camera and surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport {
            pixel_ratio: self.viewport.pixel_ratio,
            ..Viewport::new(width, height)
        };
        self.camera.aspect = self.viewport.aspect();
        self.camera.update_projection_matrix();
        self.surface
            .set_size(self.viewport.width, self.viewport.height);
    }

    pub fn set_pixel_ratio(&mut self, ratio: f64) {
        self.viewport.pixel_ratio = ratio;
        self.surface.set_pixel_ratio(ratio);
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn world(&self) -> NodeId {
        self.world
    }

    pub fn ground(&self) -> Option<NodeId> {
        self.ground
    }

    pub fn turbines(&self) -> &[Turbine] {
        &self.turbines
    }

    pub fn solar_panels(&self) -> &[NodeId] {
        &self.solar_panels
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    /// Frames stepped so far, including skipped ones.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Wraps into `[0, 2π)`. `rem_euclid` alone may round up to exactly `TAU`.
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}
