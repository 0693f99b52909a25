//! Spatial primitives shared by player state and positional audio.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two points.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Position, orientation (Euler angles, degrees) and velocity of a player,
/// stamped with the client time it was sampled at.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity: Vec3,
    pub timestamp: u64,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Dead-reckons the position `dt_secs` ahead using the current velocity.
    pub fn extrapolate(&self, dt_secs: f32) -> Vec3 {
        self.position + self.velocity * dt_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_euclidean() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 3.0);
        assert!((a.distance(b) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Vec3::new(-3.0, 0.5, 10.0);
        let b = Vec3::new(7.0, -2.0, 1.0);
        assert_eq!(a.distance(b), b.distance(a));
    }

    #[test]
    fn test_extrapolate_moves_along_velocity() {
        let t = Transform {
            position: Vec3::new(0.0, 0.0, 0.0),
            velocity: Vec3::new(2.0, 0.0, -1.0),
            ..Transform::default()
        };
        assert_eq!(t.extrapolate(0.5), Vec3::new(1.0, 0.0, -0.5));
    }
}
