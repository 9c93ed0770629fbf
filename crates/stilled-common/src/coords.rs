//! Grid coordinate types for spatial memory and query caching.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Unit grid cell on the floor plane.
///
/// Coordinates are truncated toward zero, so the cells on either side of an
/// axis (`-0.5` and `0.5`) both map to `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    /// X cell index
    pub x: i32,
    /// Y cell index
    pub y: i32,
}

impl GridCell {
    /// Creates a new grid cell.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing a world position.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self::from_xy(position.x, position.y)
    }

    /// Cell containing a floor-plane point.
    #[must_use]
    pub fn from_xy(x: f32, y: f32) -> Self {
        Self {
            x: x.trunc() as i32,
            y: y.trunc() as i32,
        }
    }
}

/// Floor-plane point quantized to buckets of a fixed size.
///
/// Used as a cache key so that near-identical query points share one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizedCell {
    /// X bucket index
    pub x: i32,
    /// Y bucket index
    pub y: i32,
}

impl QuantizedCell {
    /// Quantizes a point into buckets of `bucket` world units.
    ///
    /// A non-positive bucket size falls back to unit buckets.
    #[must_use]
    pub fn from_xy(x: f32, y: f32, bucket: f32) -> Self {
        let scale = if bucket > 0.0 { 1.0 / bucket } else { 1.0 };
        Self {
            x: (x * scale).trunc() as i32,
            y: (y * scale).trunc() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantized_half_unit_buckets() {
        let a = QuantizedCell::from_xy(1.1, 2.2, 0.5);
        let b = QuantizedCell::from_xy(1.4, 2.4, 0.5);
        let c = QuantizedCell::from_xy(1.6, 2.4, 0.5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_quantized_zero_bucket_falls_back() {
        assert_eq!(QuantizedCell::from_xy(3.7, -2.2, 0.0), QuantizedCell { x: 3, y: -2 });
    }
}
