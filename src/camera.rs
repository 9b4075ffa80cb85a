//! Camera

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::*;
use std::sync::Arc;

/// Camera interface. The allocator never evaluates a camera model itself; it
/// only maps pixel coordinates to film coordinates and asks the camera for a
/// primary ray.
pub trait Camera: Send + Sync {
    /// Returns the physical film dimensions; only the aspect ratio matters to
    /// callers.
    fn film(&self) -> Point2f;

    /// Returns the primary ray through the given film coordinates.
    ///
    /// * `uv`   - Film coordinates in [0, 1)², `(0, 0)` at the top left.
    /// * `lens` - Lens coordinates on the unit disk for depth of field.
    fn generate_ray(&self, uv: &Point2f, lens: &Point2f) -> Ray;
}

/// Atomic reference counted `Camera`.
pub type ArcCamera = Arc<dyn Camera>;

/// Maps a point uniformly distributed in [0, 1)² to the unit disk.
///
/// * `uv` - The point to map.
pub fn sample_disk(uv: &Point2f) -> Point2f {
    let r = uv.y.sqrt();
    let phi = TWO_PI * uv.x;
    Point2f::new(phi.cos() * r, phi.sin() * r)
}

/// Samples a camera ray for a pixel. With `tent_filter` the sub-pixel offset
/// is remapped through an inverted tent of width 2 centered on the pixel,
/// otherwise the offset is used as a box filter.
///
/// * `camera`      - The camera.
/// * `ij`          - The pixel coordinates.
/// * `image_size`  - The image dimensions.
/// * `puv`         - Uniform sub-pixel sample in [0, 1)².
/// * `luv`         - Uniform lens sample in [0, 1)².
/// * `tent_filter` - Selects tent reconstruction over the box filter.
pub fn sample_camera(
    camera: &dyn Camera,
    ij: &Point2i,
    image_size: &Point2i,
    puv: &Point2f,
    luv: &Point2f,
    tent_filter: bool,
) -> Ray {
    if !tent_filter {
        let uv = Point2f::new(
            (ij.x as Float + puv.x) / image_size.x as Float,
            (ij.y as Float + puv.y) / image_size.y as Float,
        );
        camera.generate_ray(&uv, &sample_disk(luv))
    } else {
        const WIDTH: Float = 2.0;
        const OFFSET: Float = 0.5;
        let fuv = Point2f::new(
            if puv.x < 0.5 {
                (2.0 * puv.x).sqrt() - 1.0
            } else {
                1.0 - (2.0 - 2.0 * puv.x).sqrt()
            },
            if puv.y < 0.5 {
                (2.0 * puv.y).sqrt() - 1.0
            } else {
                1.0 - (2.0 - 2.0 * puv.y).sqrt()
            },
        ) * WIDTH
            + Point2f::new(OFFSET, OFFSET);
        let uv = Point2f::new(
            (ij.x as Float + fuv.x) / image_size.x as Float,
            (ij.y as Float + fuv.y) / image_size.y as Float,
        );
        camera.generate_ray(&uv, &sample_disk(luv))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Camera that echoes the film coordinates back in the ray direction.
    struct UvCamera;

    impl Camera for UvCamera {
        fn film(&self) -> Point2f {
            Point2f::new(0.036, 0.024)
        }

        fn generate_ray(&self, uv: &Point2f, _lens: &Point2f) -> Ray {
            Ray::new(Vector3f::zero(), Vector3f::new(uv.x, uv.y, 1.0))
        }
    }

    #[test]
    fn disk_sample_is_inside_unit_disk() {
        let mut rng = crate::rng::Rng::new(7, 1);
        for _ in 0..1000 {
            let p = sample_disk(&rng.uniform_point2f());
            assert!(p.x * p.x + p.y * p.y <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn box_filter_stays_in_pixel() {
        let camera = UvCamera;
        let size = Point2i::new(10, 10);
        let ij = Point2i::new(3, 4);
        let ray = sample_camera(
            &camera,
            &ij,
            &size,
            &Point2f::new(0.25, 0.75),
            &Point2f::zero(),
            false,
        );
        assert!((ray.d.x - 0.325).abs() < 1e-6);
        assert!((ray.d.y - 0.475).abs() < 1e-6);
    }

    #[test]
    fn tent_filter_is_centered() {
        let camera = UvCamera;
        let size = Point2i::new(10, 10);
        let ij = Point2i::new(0, 0);
        // A sub-pixel sample of exactly 0.5 maps to the pixel center.
        let ray = sample_camera(
            &camera,
            &ij,
            &size,
            &Point2f::new(0.5, 0.5),
            &Point2f::zero(),
            true,
        );
        assert!((ray.d.x - 0.05).abs() < 1e-6);
        assert!((ray.d.y - 0.05).abs() < 1e-6);
    }

    #[test]
    fn tent_filter_spans_two_pixels() {
        let camera = UvCamera;
        let size = Point2i::new(10, 10);
        let ij = Point2i::new(5, 5);
        for uv in [0.001, 0.25, 0.5, 0.75, 0.999] {
            let ray = sample_camera(
                &camera,
                &ij,
                &size,
                &Point2f::new(uv, uv),
                &Point2f::zero(),
                true,
            );
            let offset = ray.d.x * size.x as Float - ij.x as Float;
            assert!((-1.5..=2.5).contains(&offset));
        }
    }
}
