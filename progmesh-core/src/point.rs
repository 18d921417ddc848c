//! Point and vector types

use nalgebra::{Point3, Vector3};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// Exact bit pattern of a position, usable as a hash key.
///
/// `-0.0` and `0.0` map to the same key so that mirrored geometry welds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey([u32; 3]);

impl PositionKey {
    pub fn new(p: &Point3f) -> Self {
        Self([canonical_bits(p.x), canonical_bits(p.y), canonical_bits(p.z)])
    }
}

fn canonical_bits(v: f32) -> u32 {
    if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

/// Whether every coordinate of the point is finite
pub fn is_finite_point(p: &Point3f) -> bool {
    p.coords.iter().all(|c| c.is_finite())
}
