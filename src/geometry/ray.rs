//! Rays

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::Vector3f;
use std::fmt;

/// A ray with an origin, a unit direction and a parametric extent.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    /// Origin.
    pub o: Vector3f,

    /// Direction.
    pub d: Vector3f,

    /// Minimum ray parameter.
    pub t_min: Float,

    /// Maximum ray parameter.
    pub t_max: Float,
}

impl Ray {
    /// Creates a new ray.
    ///
    /// * `o` - Origin.
    /// * `d` - Direction.
    pub fn new(o: Vector3f, d: Vector3f) -> Self {
        Self {
            o,
            d,
            t_min: 1e-4,
            t_max: INFINITY,
        }
    }

    /// Returns the point at the given parameter along the ray.
    ///
    /// * `t` - The ray parameter.
    pub fn at(&self, t: Float) -> Vector3f {
        self.o + self.d * t
    }
}

impl Default for Ray {
    /// Returns a degenerate ray at the origin.
    fn default() -> Self {
        Self::new(Vector3f::zero(), Vector3f::new(0.0, 0.0, 1.0))
    }
}

impl fmt::Display for Ray {
    /// Formats the ray as `o -> d`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.o, self.d)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_along_ray() {
        let r = Ray::new(Vector3f::new(1.0, 2.0, 3.0), Vector3f::new(0.0, 0.0, 1.0));
        assert_eq!(r.at(2.0), Vector3f::new(1.0, 2.0, 5.0));
    }
}
