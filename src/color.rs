use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Packed `0xRRGGBB` color as used by the page stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Self = Self(0xffffff);

    pub const fn hex(self) -> u32 {
        self.0
    }

    /// Returns the color as normalized `[0, 1]` channels.
    pub fn rgb(self) -> Vec3 {
        let r = ((self.0 >> 16) & 0xff) as f32;
        let g = ((self.0 >> 8) & 0xff) as f32;
        let b = (self.0 & 0xff) as f32;
        Vec3::new(r / 255.0, g / 255.0, b / 255.0)
    }

    /// CSS `rgb()` string for canvas fill styles.
    pub fn css(rgb: Vec3) -> String {
        let c = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
        format!("rgb({}, {}, {})", c.x as u8, c.y as u8, c.z as u8)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_channels() {
        let red = Color(0xb91d1d).rgb();
        assert!((red.x - 185.0 / 255.0).abs() < f32::EPSILON);
        assert!((red.y - 29.0 / 255.0).abs() < f32::EPSILON);
        assert!((red.z - 29.0 / 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn css_clamps_out_of_range_channels() {
        assert_eq!(Color::css(Vec3::new(1.5, 0.5, -1.0)), "rgb(255, 128, 0)");
    }
}
