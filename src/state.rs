//! Render State

#![allow(dead_code)]

use crate::camera::Camera;
use crate::common::*;
use crate::geometry::*;
use crate::parallel::AtomicFloat;
use crate::rng::Rng;
use crate::tracer::TraceParams;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Seed of the bootstrap generator that salts the per-pixel streams; fixed so
/// a given `TraceParams::seed` reproduces the entire image.
const SALT_SEED: u64 = 1301081;

/// Radiance and hit totals accumulated over a pixel's samples.
#[derive(Clone, Debug, Default)]
pub struct SampleAccum {
    /// Sum of sampled radiance values.
    pub radiance: Vector3<f64>,

    /// Number of samples that hit geometry or an environment.
    pub hits: Int,

    /// Number of samples taken.
    pub samples: Int,
}

impl SampleAccum {
    /// Returns the mean radiance (over hitting samples) and the hit rate as
    /// an RGBA value; both are zero for a pixel that never hit anything.
    pub fn mean_rgba(&self) -> Vector4f {
        let rgb = if self.hits > 0 {
            Vector3f::from(self.radiance / self.hits as f64)
        } else {
            Vector3f::zero()
        };
        let alpha = if self.samples > 0 {
            self.hits as Float / self.samples as Float
        } else {
            0.0
        };
        Vector4f::from_rgba(rgb, alpha)
    }
}

/// Per-pixel render state.
#[derive(Clone, Debug)]
pub struct Pixel {
    /// Independent random number generator for this pixel's samples.
    pub rng: Rng,

    /// Accumulator over all samples.
    pub actual: SampleAccum,

    /// Accumulator over the odd-numbered samples (1st, 3rd, 5th, ...).
    pub odd: SampleAccum,

    /// Current quality estimate, at most `QUALITY_MAX`.
    pub q: Float,

    /// Samples granted by the neighborhood pass, pending execution.
    pub sample_budget: Int,

    /// Wall time spent inside the tracer for this pixel, in nanoseconds.
    pub time_in_sample: u64,
}

impl Default for Pixel {
    /// Returns a pixel with no samples and a default generator.
    fn default() -> Self {
        Self {
            rng: Rng::default(),
            actual: SampleAccum::default(),
            odd: SampleAccum::default(),
            q: 0.0,
            sample_budget: 0,
            time_in_sample: 0,
        }
    }
}

/// Fixed-size grid of pixel records. Render workers mutate entries in place
/// without locking; the scheduler guarantees a pixel appears in at most one
/// in-flight worklist, which makes those mutations race free.
pub struct PixelGrid {
    /// Grid dimensions.
    resolution: Point2i,

    /// The pixel records in row-major order.
    cells: Vec<UnsafeCell<Pixel>>,
}

// SAFETY: concurrent access is partitioned by pixel; see the type docs.
unsafe impl Sync for PixelGrid {}

impl PixelGrid {
    /// Creates a grid of default pixels.
    ///
    /// * `resolution` - Grid dimensions.
    pub fn new(resolution: Point2i) -> Self {
        assert!(resolution.x > 0 && resolution.y > 0);
        let n = resolution.area() as usize;
        let mut cells = Vec::with_capacity(n);
        cells.resize_with(n, || UnsafeCell::new(Pixel::default()));
        Self { resolution, cells }
    }

    /// Returns the grid dimensions.
    pub fn resolution(&self) -> Point2i {
        self.resolution
    }

    /// Returns the number of pixels.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the grid holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the row-major offset of a pixel. Panics on out-of-bounds
    /// coordinates.
    ///
    /// * `p` - The pixel coordinates.
    fn offset(&self, p: &Point2i) -> usize {
        assert!(
            p.x >= 0 && p.x < self.resolution.x && p.y >= 0 && p.y < self.resolution.y,
            "pixel {} outside image {}",
            p,
            self.resolution
        );
        (p.y * self.resolution.x + p.x) as usize
    }

    /// Returns a shared reference to a pixel. Valid while no worker mutates
    /// the same pixel; the scheduler only reads between batches.
    ///
    /// * `p` - The pixel coordinates.
    pub fn pixel(&self, p: &Point2i) -> &Pixel {
        let offset = self.offset(p);
        unsafe { &*self.cells[offset].get() }
    }

    /// Returns a mutable reference to a pixel.
    ///
    /// # Safety
    ///
    /// The caller must be the only holder of a reference to this pixel: either
    /// a render worker that owns the pixel through the current worklist, or
    /// the scheduler thread between batches.
    ///
    /// * `p` - The pixel coordinates.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn pixel_mut(&self, p: &Point2i) -> &mut Pixel {
        let offset = self.offset(p);
        &mut *self.cells[offset].get()
    }

    /// Iterates over all pixels. Valid only while no workers are running.
    pub fn iter(&self) -> impl Iterator<Item = &Pixel> {
        self.cells.iter().map(|c| unsafe { &*c.get() })
    }

    /// Iterates mutably over all pixels.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pixel> {
        self.cells.iter_mut().map(|c| c.get_mut())
    }
}

/// Image with fixed resolution and row-major texels. Texels are written in
/// place by render workers; as with `PixelGrid`, the worklist partitioning
/// guarantees a texel has at most one writer at a time.
pub struct Image<T: Copy> {
    /// Image dimensions.
    resolution: Point2i,

    /// The texels in row-major order.
    texels: Vec<UnsafeCell<T>>,
}

// SAFETY: concurrent access is partitioned by texel; see the type docs.
unsafe impl<T: Copy + Send> Sync for Image<T> {}

impl<T: Copy> Image<T> {
    /// Creates an image filled with a constant value.
    ///
    /// * `resolution` - Image dimensions.
    /// * `fill`       - The fill value.
    pub fn new(resolution: Point2i, fill: T) -> Self {
        assert!(resolution.x > 0 && resolution.y > 0);
        let n = resolution.area() as usize;
        let mut texels = Vec::with_capacity(n);
        texels.resize_with(n, || UnsafeCell::new(fill));
        Self { resolution, texels }
    }

    /// Returns the image dimensions.
    pub fn resolution(&self) -> Point2i {
        self.resolution
    }

    /// Returns the row-major offset of a texel. Panics on out-of-bounds
    /// coordinates.
    ///
    /// * `p` - The texel coordinates.
    fn offset(&self, p: &Point2i) -> usize {
        assert!(
            p.x >= 0 && p.x < self.resolution.x && p.y >= 0 && p.y < self.resolution.y,
            "texel {} outside image {}",
            p,
            self.resolution
        );
        (p.y * self.resolution.x + p.x) as usize
    }

    /// Returns a copy of a texel.
    ///
    /// * `p` - The texel coordinates.
    pub fn get(&self, p: &Point2i) -> T {
        let offset = self.offset(p);
        unsafe { *self.texels[offset].get() }
    }

    /// Overwrites a texel. The caller must own the texel through the current
    /// worklist, or run while no workers do.
    ///
    /// * `p` - The texel coordinates.
    /// * `v` - The new value.
    pub(crate) fn set(&self, p: &Point2i, v: T) {
        let offset = self.offset(p);
        unsafe { *self.texels[offset].get() = v };
    }

    /// Returns a snapshot of all texels in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.texels.iter().map(|t| unsafe { *t.get() }).collect()
    }
}

impl<T: Copy> Clone for Image<T> {
    /// Returns a snapshot copy of the image.
    fn clone(&self) -> Self {
        let texels = self.to_vec().into_iter().map(UnsafeCell::new).collect();
        Self {
            resolution: self.resolution,
            texels,
        }
    }
}

/// State of one adaptive render: pixel records, the running mean images and
/// the shared progress scalars. Created by the host, handed by reference to
/// the scheduler and workers, destroyed after `trace_stop` returns.
pub struct RenderState {
    /// The per-pixel records.
    pub pixels: PixelGrid,

    /// Mean radiance over all samples plus hit rate, per pixel.
    pub render: Image<Vector4f>,

    /// Mean radiance over the odd-numbered samples plus hit rate, per pixel.
    pub odd_render: Image<Vector4f>,

    /// Wall clock at state creation.
    start_time: Instant,

    /// Total samples shot across the image; monotonic.
    pub sample_count: AtomicU64,

    /// Smallest per-pixel quality found by the last scheduler sweep.
    pub min_q: AtomicFloat,

    /// Quality step the whole image has reached.
    pub curr_q: AtomicFloat,

    /// Cooperative cancellation flag.
    pub stop: AtomicBool,

    /// Handle of the background render worker, if one is running.
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
}

impl RenderState {
    /// Allocates and seeds the state for a render. The image dimensions are
    /// derived from the camera's film aspect: the longer axis receives
    /// `params.resolution`, the shorter one is scaled proportionally.
    ///
    /// * `camera` - The camera.
    /// * `params` - The trace parameters.
    pub fn new(camera: &dyn Camera, params: &TraceParams) -> Self {
        let film = camera.film();
        let image_size = if film.x > film.y {
            Point2i::new(
                params.resolution,
                (params.resolution as Float * film.y / film.x).round() as Int,
            )
        } else {
            Point2i::new(
                (params.resolution as Float * film.x / film.y).round() as Int,
                params.resolution,
            )
        };

        let mut pixels = PixelGrid::new(image_size);
        let mut salt = Rng::new(SALT_SEED, 1);
        for pixel in pixels.iter_mut() {
            let sequence = salt.uniform_u32_below(1 << 31) / 2 + 1;
            pixel.rng = Rng::new(params.seed, sequence as u64);
        }

        Self {
            pixels,
            render: Image::new(image_size, Vector4f::zero()),
            odd_render: Image::new(image_size, Vector4f::zero()),
            start_time: Instant::now(),
            sample_count: AtomicU64::new(0),
            min_q: AtomicFloat::new(0.0),
            curr_q: AtomicFloat::new(0.0),
            stop: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Returns the image dimensions.
    pub fn resolution(&self) -> Point2i {
        self.pixels.resolution()
    }

    /// Returns the wall time since the state was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::testing::TestCamera;

    #[test]
    fn grid_offsets_are_row_major() {
        let grid = PixelGrid::new(Point2i::new(4, 3));
        assert_eq!(grid.offset(&Point2i::new(0, 0)), 0);
        assert_eq!(grid.offset(&Point2i::new(3, 0)), 3);
        assert_eq!(grid.offset(&Point2i::new(0, 1)), 4);
        assert_eq!(grid.offset(&Point2i::new(3, 2)), 11);
    }

    #[test]
    #[should_panic]
    fn grid_rejects_out_of_bounds() {
        let grid = PixelGrid::new(Point2i::new(4, 3));
        let _ = grid.pixel(&Point2i::new(4, 0));
    }

    #[test]
    fn image_get_set() {
        let img = Image::new(Point2i::new(2, 2), Vector4f::zero());
        let p = Point2i::new(1, 1);
        img.set(&p, Vector4f::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(img.get(&p), Vector4f::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(img.get(&Point2i::new(0, 0)), Vector4f::zero());
    }

    #[test]
    fn landscape_film_sets_width_to_resolution() {
        let params = TraceParams {
            resolution: 120,
            ..TraceParams::default()
        };
        let state = RenderState::new(&TestCamera, &params);
        // TestCamera film is 0.036 x 0.024, a 3:2 aspect.
        assert_eq!(state.resolution(), Point2i::new(120, 80));
    }

    #[test]
    fn pixel_streams_reproduce_per_seed() {
        let params = TraceParams {
            resolution: 16,
            seed: 77,
            ..TraceParams::default()
        };
        let a = RenderState::new(&TestCamera, &params);
        let b = RenderState::new(&TestCamera, &params);
        for (pa, pb) in a.pixels.iter().zip(b.pixels.iter()) {
            let mut ra = pa.rng.clone();
            let mut rb = pb.rng.clone();
            for _ in 0..8 {
                assert_eq!(ra.uniform_u32(), rb.uniform_u32());
            }
        }
    }

    #[test]
    fn pixel_streams_differ_between_pixels() {
        let params = TraceParams {
            resolution: 8,
            ..TraceParams::default()
        };
        let state = RenderState::new(&TestCamera, &params);
        let mut first: Vec<u32> = state
            .pixels
            .iter()
            .map(|p| p.rng.clone().uniform_u32())
            .collect();
        first.sort_unstable();
        first.dedup();
        // A handful of collisions is tolerable; identical streams are not.
        assert!(first.len() > state.pixels.len() / 2);
    }
}
