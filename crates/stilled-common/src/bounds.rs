//! Room extents and their scaled safe interiors.

use crate::error::BoundsError;
use crate::planar::uniform;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Immutable extents of a level's room, centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomBounds {
    /// Half extent along x
    pub half_width: f32,
    /// Half extent along y
    pub half_length: f32,
    /// Ceiling height
    pub height: f32,
}

impl Default for RoomBounds {
    fn default() -> Self {
        Self {
            half_width: 20.0,
            half_length: 10.0,
            height: 4.0,
        }
    }
}

impl RoomBounds {
    /// Creates room bounds, rejecting degenerate extents.
    pub fn new(half_width: f32, half_length: f32, height: f32) -> Result<Self, BoundsError> {
        let room = Self {
            half_width,
            half_length,
            height,
        };
        room.check()?;
        Ok(room)
    }

    /// Verifies that every extent is finite and positive.
    pub fn check(&self) -> Result<(), BoundsError> {
        for (axis, value) in [
            ("half_width", self.half_width),
            ("half_length", self.half_length),
            ("height", self.height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BoundsError::InvalidExtent { axis, value });
            }
        }
        Ok(())
    }

    /// Interior shrunk to `fraction` of the half extents.
    #[must_use]
    pub fn safe(&self, fraction: f32) -> SafeBounds {
        SafeBounds {
            half_x: self.half_width * fraction,
            half_y: self.half_length * fraction,
        }
    }
}

/// Axis-aligned rectangle centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeBounds {
    /// Half extent along x
    pub half_x: f32,
    /// Half extent along y
    pub half_y: f32,
}

impl SafeBounds {
    /// Whether a point lies inside, edges included.
    #[must_use]
    pub fn contains(&self, position: Vec3) -> bool {
        position.x.abs() <= self.half_x && position.y.abs() <= self.half_y
    }

    /// Whether a point lies strictly inside.
    #[must_use]
    pub fn contains_strict(&self, position: Vec3) -> bool {
        position.x.abs() < self.half_x && position.y.abs() < self.half_y
    }

    /// Clamps the planar components, keeping height untouched.
    #[must_use]
    pub fn clamp(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            position.x.clamp(-self.half_x, self.half_x),
            position.y.clamp(-self.half_y, self.half_y),
            position.z,
        )
    }

    /// Same rectangle scaled by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            half_x: self.half_x * factor,
            half_y: self.half_y * factor,
        }
    }

    /// Uniform floor-plane sample inside the rectangle at height `z`.
    pub fn sample(&self, rng: &mut fastrand::Rng, z: f32) -> Vec3 {
        Vec3::new(
            uniform(rng, -self.half_x, self.half_x),
            uniform(rng, -self.half_y, self.half_y),
            z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_room_rejected() {
        assert!(RoomBounds::new(0.0, 10.0, 4.0).is_err());
        assert!(RoomBounds::new(20.0, f32::NAN, 4.0).is_err());
        assert!(RoomBounds::new(20.0, 10.0, 4.0).is_ok());
    }

    #[test]
    fn test_clamp_keeps_height() {
        let safe = RoomBounds::default().safe(0.5);
        let clamped = safe.clamp(Vec3::new(50.0, -50.0, 1.25));
        assert_eq!(clamped, Vec3::new(10.0, -5.0, 1.25));
    }

    #[test]
    fn test_samples_stay_inside() {
        let safe = RoomBounds::default().safe(0.6);
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..200 {
            assert!(safe.contains(safe.sample(&mut rng, 0.0)));
        }
    }
}
