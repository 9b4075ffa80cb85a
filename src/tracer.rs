//! Tracer

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::*;
use crate::rng::Rng;
use std::sync::Arc;

/// Path sampling algorithms a tracer can be asked to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SamplerKind {
    /// Full path tracing with next event estimation.
    Path,

    /// Naive path tracing without light sampling.
    Naive,

    /// Eyelight shading for quick previews.
    Eyelight,
}

/// Parameters handed through to the tracer with every sample.
#[derive(Copy, Clone, Debug)]
pub struct TraceParams {
    /// Length of the longer image axis in pixels.
    pub resolution: Int,

    /// The sampling algorithm to run.
    pub sampler: SamplerKind,

    /// Firefly clamp; single-sample radiance is rescaled so no channel
    /// exceeds this value.
    pub clamp: Float,

    /// Seed reproducing the whole render.
    pub seed: u64,

    /// Hide environment lights from camera rays.
    pub envhidden: bool,

    /// Use tent reconstruction for sub-pixel sample positions.
    pub tentfilter: bool,
}

impl Default for TraceParams {
    /// Returns the default trace parameters.
    fn default() -> Self {
        Self {
            resolution: 1280,
            sampler: SamplerKind::Path,
            clamp: 10.0,
            seed: 961748941,
            envhidden: false,
            tentfilter: false,
        }
    }
}

/// A single radiance estimate returned by the tracer.
#[derive(Copy, Clone, Debug)]
pub struct TraceSample {
    /// The radiance estimate.
    pub radiance: Vector3f,

    /// True when the ray hit geometry or an environment light.
    pub hit: bool,
}

/// Interface to the external path tracer. Implementations own the scene,
/// acceleration structures and materials; the allocator only shoots rays
/// through this seam.
pub trait Tracer: Send + Sync {
    /// Estimates the radiance arriving along a camera ray.
    ///
    /// * `ray`    - The camera ray.
    /// * `rng`    - The per-pixel random number generator.
    /// * `params` - The trace parameters; `params.sampler` selects the
    ///              algorithm.
    fn sample(&self, ray: &Ray, rng: &mut Rng, params: &TraceParams) -> TraceSample;

    /// Returns true when the scene contains environment lights.
    fn has_environments(&self) -> bool {
        false
    }
}

/// Atomic reference counted `Tracer`.
pub type ArcTracer = Arc<dyn Tracer>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

/// Mock tracers shared by unit tests across the crate.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Tracer returning a fixed radiance on every sample.
    pub struct ConstTracer {
        pub radiance: Vector3f,
        pub hit: bool,
        pub environments: bool,
    }

    impl ConstTracer {
        pub fn new(radiance: Vector3f) -> Self {
            Self {
                radiance,
                hit: true,
                environments: false,
            }
        }
    }

    impl Tracer for ConstTracer {
        fn sample(&self, _ray: &Ray, _rng: &mut Rng, _params: &TraceParams) -> TraceSample {
            TraceSample {
                radiance: self.radiance,
                hit: self.hit,
            }
        }

        fn has_environments(&self) -> bool {
            self.environments
        }
    }

    /// Tracer whose radiance is a deterministic function of the ray and the
    /// pixel's RNG stream; noisy enough that quality climbs gradually.
    pub struct NoisyTracer;

    impl Tracer for NoisyTracer {
        fn sample(&self, ray: &Ray, rng: &mut Rng, _params: &TraceParams) -> TraceSample {
            let n = rng.uniform_float();
            let base = 0.25 + 0.5 * (ray.d.x.abs() + ray.d.y.abs());
            TraceSample {
                radiance: Vector3f::new(base + n, base + n * 0.5, base + n * 0.25),
                hit: true,
            }
        }
    }

    /// Tracer returning non-finite radiance on every sample.
    pub struct NanTracer;

    impl Tracer for NanTracer {
        fn sample(&self, _ray: &Ray, _rng: &mut Rng, _params: &TraceParams) -> TraceSample {
            TraceSample {
                radiance: Vector3f::new(Float::NAN, 0.0, 0.0),
                hit: true,
            }
        }
    }

    /// Camera with a 3:2 film whose rays encode the film coordinates.
    pub struct TestCamera;

    impl crate::camera::Camera for TestCamera {
        fn film(&self) -> crate::geometry::Point2f {
            crate::geometry::Point2f::new(0.036, 0.024)
        }

        fn generate_ray(
            &self,
            uv: &crate::geometry::Point2f,
            _lens: &crate::geometry::Point2f,
        ) -> Ray {
            Ray::new(Vector3f::zero(), Vector3f::new(uv.x, uv.y, 1.0))
        }
    }
}
