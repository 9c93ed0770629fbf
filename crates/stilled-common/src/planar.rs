//! Floor-plane helpers for `glam::Vec3`.
//!
//! The world is z-up. Navigation happens on the x/y plane; heights only matter
//! for the segment queries handed to the occlusion oracle.

use glam::Vec3;

/// Planar operations used by navigation code.
pub trait PlanarExt {
    /// Copy with the vertical component zeroed.
    fn planar(self) -> Vec3;

    /// Distance on the floor plane, ignoring height.
    fn planar_distance(self, other: Vec3) -> f32;

    /// Squared distance on the floor plane.
    fn planar_distance_squared(self, other: Vec3) -> f32;

    /// Rotates about the vertical axis by `angle` radians (counter-clockwise).
    fn rotate_about_z(self, angle: f32) -> Vec3;

    /// Unit vector from an angle on the floor plane.
    fn from_heading(angle: f32) -> Vec3;
}

impl PlanarExt for Vec3 {
    fn planar(self) -> Vec3 {
        Vec3::new(self.x, self.y, 0.0)
    }

    fn planar_distance(self, other: Vec3) -> f32 {
        self.planar_distance_squared(other).sqrt()
    }

    fn planar_distance_squared(self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    fn rotate_about_z(self, angle: f32) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        Vec3::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
            self.z,
        )
    }

    fn from_heading(angle: f32) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        Vec3::new(cos, sin, 0.0)
    }
}

/// Uniform sample in `[min, max)`; returns `min` when the range is empty.
pub fn uniform(rng: &mut fastrand::Rng, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    min + rng.f32() * (max - min)
}
