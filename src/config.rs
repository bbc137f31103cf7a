//! Presentation constants for the hero scene.
//!
//! None of these values carry meaning beyond how the page looks. `Default`
//! reproduces the landing page.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color::Color;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: Color,
    pub fog: FogConfig,
    pub camera: CameraConfig,
    pub sway: SwayConfig,
    pub lighting: LightingConfig,
    pub palette: Palette,
    pub turbine_speed: SpeedRange,
    pub catalog: Catalog,
    pub antialias: bool,
    pub alpha: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: Color(0xf0f0f0),
            fog: FogConfig::default(),
            camera: CameraConfig::default(),
            sway: SwayConfig::default(),
            lighting: LightingConfig::default(),
            palette: Palette::default(),
            turbine_speed: SpeedRange::default(),
            catalog: Catalog::default(),
            antialias: true,
            alpha: true,
        }
    }
}

/// Linear fog between `near` and `far` world units from the eye.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FogConfig {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            near: 10.0,
            far: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub look_at: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 5.0, 15.0),
            look_at: Vec3::new(0.0, 2.0, 0.0),
        }
    }
}

/// Camera sway: `x = sin(t) * amplitude_x`, `y = base_y + cos(t * bob_frequency) * bob_amplitude`
/// with `t = now_ms * time_scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwayConfig {
    pub time_scale: f64,
    pub amplitude_x: f64,
    pub base_y: f64,
    pub bob_amplitude: f64,
    pub bob_frequency: f64,
}

impl Default for SwayConfig {
    fn default() -> Self {
        Self {
            time_scale: 0.0005,
            amplitude_x: 2.0,
            base_y: 5.0,
            bob_amplitude: 1.0,
            bob_frequency: 0.5,
        }
    }
}

impl SwayConfig {
    /// Camera `(x, y)` for the given wall-clock time in milliseconds.
    pub fn offset(&self, now_ms: f64) -> (f32, f32) {
        let t = now_ms * self.time_scale;
        let x = t.sin() * self.amplitude_x;
        let y = self.base_y + (t * self.bob_frequency).cos() * self.bob_amplitude;
        (x as f32, y as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingConfig {
    pub ambient_color: Color,
    pub ambient_intensity: f32,
    pub sun_color: Color,
    pub sun_intensity: f32,
    pub sun_position: Vec3,
    pub sun_casts_shadow: bool,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: Color::WHITE,
            ambient_intensity: 0.6,
            sun_color: Color::WHITE,
            sun_intensity: 0.8,
            sun_position: Vec3::new(10.0, 20.0, 10.0),
            sun_casts_shadow: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub white: Color,
    pub grey: Color,
    pub dark: Color,
    pub accent: Color,
    pub solar: Color,
    pub solar_metalness: f32,
    pub solar_roughness: f32,
    pub ground: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            white: Color::WHITE,
            grey: Color(0xcccccc),
            dark: Color(0x333333),
            accent: Color(0xb91d1d),
            solar: Color(0x3b82f6),
            solar_metalness: 0.5,
            solar_roughness: 0.1,
            ground: Color(0xe5e7eb),
        }
    }
}

/// Half-open range `[min, max)` for per-turbine blade speed, in radians per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: f32,
    pub max: f32,
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self {
            min: 0.02,
            max: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurbineSite {
    pub x: f32,
    pub z: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarSite {
    pub x: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingSite {
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

/// Fixed list of decorative objects placed into the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub ground_size: f32,
    pub ground_level: f32,
    pub turbines: Vec<TurbineSite>,
    pub solar_panels: Vec<SolarSite>,
    pub buildings: Vec<BuildingSite>,
}

impl Default for Catalog {
    fn default() -> Self {
        let solar_panels = (0..5)
            .flat_map(|i| {
                let x = 5.0 + i as f32 * 1.8;
                [SolarSite { x, z: 2.0 }, SolarSite { x, z: 4.0 }]
            })
            .collect();

        Self {
            ground_size: 100.0,
            ground_level: -2.0,
            turbines: vec![
                TurbineSite { x: -8.0, z: -5.0, scale: 1.2 },
                TurbineSite { x: -12.0, z: -2.0, scale: 0.9 },
                TurbineSite { x: 10.0, z: -8.0, scale: 1.5 },
            ],
            solar_panels,
            buildings: vec![
                BuildingSite { x: -5.0, z: 5.0, width: 3.0, height: 4.0, depth: 3.0 },
                BuildingSite { x: -2.0, z: 2.0, width: 2.0, height: 6.0, depth: 2.0 },
                BuildingSite { x: 2.0, z: -3.0, width: 4.0, height: 3.0, depth: 4.0 },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_matches_landing_page() {
        let catalog = Catalog::default();
        assert_eq!(catalog.turbines.len(), 3);
        assert_eq!(catalog.buildings.len(), 3);
        assert_eq!(catalog.solar_panels.len(), 10);
        assert_eq!(catalog.solar_panels[0], SolarSite { x: 5.0, z: 2.0 });
        assert_eq!(catalog.solar_panels[1], SolarSite { x: 5.0, z: 4.0 });
        let last = catalog.solar_panels[9];
        assert!((last.x - 12.2).abs() < 1e-5);
        assert_eq!(last.z, 4.0);
    }

    #[test]
    fn sway_at_time_zero_is_centered_and_raised() {
        let (x, y) = SwayConfig::default().offset(0.0);
        assert_eq!(x, 0.0);
        assert_eq!(y, 6.0);
    }
}
