//! Statistics

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::Point2i;
use crate::state::RenderState;
use image::{Rgba, RgbaImage};
use itertools::iproduct;
use std::sync::atomic::Ordering;

/// Aggregate render statistics collected from the pixel records.
#[derive(Clone, Debug, Default)]
pub struct Statistic {
    /// Total samples shot across the image.
    pub samples: u64,

    /// Number of pixels.
    pub pixels: Int,

    /// Smallest per-pixel quality.
    pub min_q: Float,

    /// Largest per-pixel quality.
    pub max_q: Float,

    /// Smallest per-pixel sample count.
    pub min_spp: Int,

    /// Mean samples per pixel.
    pub avg_spp: f64,

    /// Largest per-pixel sample count.
    pub max_spp: Int,

    /// Human readable summary block.
    pub stat_text: String,
}

/// Collects render statistics. Call between batches or after the render; the
/// pixel scan assumes no workers are mutating the grid.
///
/// * `state` - The render state.
pub fn collect_statistics(state: &RenderState) -> Statistic {
    let size = state.resolution();

    let mut pixels = 0;
    let mut min_q = Float::MAX;
    let mut max_q = Float::MIN;
    let mut min_spp = Int::MAX;
    let mut max_spp = 0;

    for (i, j) in iproduct!(0..size.x, 0..size.y) {
        let pixel = state.pixels.pixel(&Point2i::new(i, j));

        pixels += 1;

        if pixel.q < min_q {
            min_q = pixel.q;
        }
        if pixel.q > max_q {
            max_q = pixel.q;
        }
        if pixel.actual.samples < min_spp {
            min_spp = pixel.actual.samples;
        }
        if pixel.actual.samples > max_spp {
            max_spp = pixel.actual.samples;
        }
    }

    let samples = state.sample_count.load(Ordering::Relaxed);
    let avg_spp = samples as f64 / pixels as f64;

    let elapsed = state.elapsed().as_millis();
    let mins = elapsed / 60_000;
    let secs = (elapsed % 60_000) / 1000;
    let msecs = (elapsed % 60_000) % 1000;

    let stat_text = format!(
        "    Current q: {:.6}\n      min_spp: {}\n      avg_spp: {:.6}\n      max_spp: {}\nsampling time: {:02}:{:02}.{:03}\n",
        state.curr_q.load(),
        min_spp,
        avg_spp,
        max_spp,
        mins,
        secs,
        msecs
    );

    Statistic {
        samples,
        pixels,
        min_q,
        max_q,
        min_spp,
        avg_spp,
        max_spp,
        stat_text,
    }
}

/// Renders the per-pixel sample counts to a grayscale byte image, square-root
/// scaled over the observed range.
///
/// * `state` - The render state.
/// * `stat`  - Statistics previously collected from the same state.
pub fn sample_density_img(state: &RenderState, stat: &Statistic) -> RgbaImage {
    let size = state.resolution();
    let mut img = RgbaImage::new(size.x as u32, size.y as u32);

    let range = (stat.max_spp - stat.min_spp) as Float;
    let step = if range > 0.0 { 255.0 / range.sqrt() } else { 0.0 };

    for (i, j) in iproduct!(0..size.x, 0..size.y) {
        let pixel = state.pixels.pixel(&Point2i::new(i, j));
        let p = (((pixel.actual.samples - stat.min_spp) as Float).sqrt() * step) as u8;
        img.put_pixel(i as u32, j as u32, Rgba([p, p, p, 255]));
    }

    img
}

/// Renders the average wall time per sample to a grayscale byte image,
/// square-root scaled over the observed range. Unsampled pixels stay black.
///
/// * `state` - The render state.
pub fn time_density_img(state: &RenderState) -> RgbaImage {
    let size = state.resolution();
    let mut img = RgbaImage::new(size.x as u32, size.y as u32);

    let mut min_time = 0.0f64;
    let mut max_time = 0.0f64;
    for (i, j) in iproduct!(0..size.x, 0..size.y) {
        let pixel = state.pixels.pixel(&Point2i::new(i, j));
        if pixel.actual.samples > 0 {
            let time = pixel.time_in_sample as f64 / pixel.actual.samples as f64;
            if min_time == 0.0 {
                min_time = time;
            }
            if max_time == 0.0 {
                max_time = time;
            }
            if time > max_time {
                max_time = time;
            }
            if time < min_time {
                min_time = time;
            }
        }
    }

    let range = max_time - min_time;
    let step = if range > 0.0 { 255.0 / range.sqrt() } else { 0.0 };

    for (i, j) in iproduct!(0..size.x, 0..size.y) {
        let pixel = state.pixels.pixel(&Point2i::new(i, j));
        let p = if pixel.actual.samples > 0 {
            let time = pixel.time_in_sample as f64 / pixel.actual.samples as f64;
            ((time - min_time) * step).sqrt() as u8
        } else {
            0
        };
        img.put_pixel(i as u32, j as u32, Rgba([p, p, p, 255]));
    }

    img
}

/// Renders the per-pixel quality to a grayscale byte image on a fixed linear
/// scale of 20 gray levels per quality unit.
///
/// * `state` - The render state.
pub fn q_img(state: &RenderState) -> RgbaImage {
    let size = state.resolution();
    let mut img = RgbaImage::new(size.x as u32, size.y as u32);

    let step = 20.0f32;

    for (i, j) in iproduct!(0..size.x, 0..size.y) {
        let pixel = state.pixels.pixel(&Point2i::new(i, j));
        let p = clamp((pixel.q * step) as Int, 0, 255) as u8;
        img.put_pixel(i as u32, j as u32, Rgba([p, p, p, 255]));
    }

    img
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::TraceParams;
    use crate::tracer::testing::TestCamera;

    fn seeded_state() -> RenderState {
        let params = TraceParams {
            resolution: 6,
            ..TraceParams::default()
        };
        let state = RenderState::new(&TestCamera, &params);
        let size = state.resolution();
        for (idx, (j, i)) in iproduct!(0..size.y, 0..size.x).enumerate() {
            // SAFETY: no workers are running in tests.
            let pixel = unsafe { state.pixels.pixel_mut(&Point2i::new(i, j)) };
            pixel.actual.samples = 4 + idx as Int;
            pixel.q = idx as Float * 0.5;
            pixel.time_in_sample = 1000 * (idx as u64 + 1);
        }
        let total: u64 = state.pixels.iter().map(|p| p.actual.samples as u64).sum();
        state.sample_count.fetch_add(total, Ordering::Relaxed);
        state
    }

    #[test]
    fn statistics_cover_extremes() {
        let state = seeded_state();
        let stat = collect_statistics(&state);

        let npixels = state.resolution().area();
        assert_eq!(stat.pixels, npixels);
        assert_eq!(stat.min_spp, 4);
        assert_eq!(stat.max_spp, 4 + npixels - 1);
        assert_eq!(stat.min_q, 0.0);
        assert_eq!(stat.max_q, (npixels - 1) as Float * 0.5);
        assert_eq!(stat.samples, state.sample_count.load(Ordering::Relaxed));
        assert!((stat.avg_spp - stat.samples as f64 / npixels as f64).abs() < 1e-12);
        assert!(stat.stat_text.contains("min_spp: 4"));
        assert!(stat.stat_text.contains("sampling time:"));
    }

    #[test]
    fn sample_density_spans_black_to_white() {
        let state = seeded_state();
        let stat = collect_statistics(&state);
        let img = sample_density_img(&state, &stat);

        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        let size = state.resolution();
        let brightest = img.get_pixel(size.x as u32 - 1, size.y as u32 - 1).0[0];
        // Allow one gray level of float rounding at the top of the range.
        assert!(brightest >= 254);
    }

    #[test]
    fn density_images_handle_uniform_state() {
        let params = TraceParams {
            resolution: 6,
            ..TraceParams::default()
        };
        let state = RenderState::new(&TestCamera, &params);
        let stat = collect_statistics(&state);
        let img = sample_density_img(&state, &stat);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));

        let img = time_density_img(&state);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn q_img_clamps_to_byte_range() {
        let state = seeded_state();
        unsafe {
            state.pixels.pixel_mut(&Point2i::new(0, 0)).q = -3.0;
            state.pixels.pixel_mut(&Point2i::new(1, 0)).q = 100.0;
            state.pixels.pixel_mut(&Point2i::new(2, 0)).q = 5.0;
        }
        let img = q_img(&state);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 255);
        assert_eq!(img.get_pixel(2, 0).0[0], 100);
    }
}
