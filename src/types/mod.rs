//! Shared types used throughout the library.

mod transform;

pub use transform::Transform;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Which side of a face a material is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn is_front(self) -> bool {
        self == Side::Front
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        }
    }
}

/// An 8-bit RGB colour as stored by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components scaled to 0-1.
    pub fn unit(&self) -> [f64; 3] {
        [
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        ]
    }

    /// Convert to hue (degrees), saturation and brightness (percent),
    /// each rounded to one decimal place.
    pub fn to_hsb(&self) -> [f64; 3] {
        let [r, g, b] = self.unit();
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);

        if max == 0.0 {
            return [0.0, 0.0, 0.0];
        }

        let s = (max - min) / max;
        let mut h = if r == g && g == b {
            0.0
        } else if b == max {
            4.0 + (r - g) / (max - min)
        } else if g == max {
            2.0 + (b - r) / (max - min)
        } else {
            (g - b) / (max - min)
        };
        if h < 0.0 {
            h += 6.0;
        }

        [
            (h * 600.0).round() / 10.0,
            (s * 1000.0).round() / 10.0,
            (max * 1000.0).round() / 10.0,
        ]
    }

    /// Inverse of [`Color::to_hsb`].
    pub fn from_hsb(h: f64, s: f64, v: f64) -> Color {
        let v = v / 100.0;
        let s = s / 100.0;
        let h = if h >= 360.0 { 0.0 } else { h / 60.0 };

        let i = h.floor();
        let f = h - i;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        let (r, g, b) = match i as u32 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        let channel = |x: f64| (x * 255.0).round().clamp(0.0, 255.0) as u8;
        Color::new(channel(r), channel(g), channel(b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl Iterator<Item = DVec3>) -> Option<Self> {
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        let mut has_points = false;

        for p in points {
            has_points = true;
            min = min.min(p);
            max = max.max(p);
        }

        if has_points {
            Some(Self { min, max })
        } else {
            None
        }
    }

    /// Grow the box to contain a point.
    pub fn include(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn dimensions(&self) -> DVec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsb_round_trip() {
        for color in [
            Color::new(216, 216, 216),
            Color::new(255, 0, 0),
            Color::new(12, 200, 99),
            Color::new(40, 60, 250),
            Color::new(0, 0, 0),
        ] {
            let [h, s, v] = color.to_hsb();
            let back = Color::from_hsb(h, s, v);
            for (a, b) in [(color.r, back.r), (color.g, back.g), (color.b, back.b)] {
                assert!((a as i32 - b as i32).abs() <= 1, "{:?} -> {:?}", color, back);
            }
        }
    }

    #[test]
    fn test_hsb_values() {
        assert_eq!(Color::new(255, 0, 0).to_hsb(), [0.0, 100.0, 100.0]);
        assert_eq!(Color::new(0, 0, 255).to_hsb(), [240.0, 100.0, 100.0]);
        assert_eq!(Color::new(255, 255, 255).to_hsb(), [0.0, 0.0, 100.0]);
    }

    #[test]
    fn test_bounding_box() {
        let bb = BoundingBox::from_points(
            [DVec3::new(1.0, 2.0, 3.0), DVec3::new(-1.0, 4.0, 0.0)].into_iter(),
        )
        .unwrap();
        assert_eq!(bb.min, DVec3::new(-1.0, 2.0, 0.0));
        assert_eq!(bb.center(), DVec3::new(0.0, 3.0, 1.5));
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }
}
