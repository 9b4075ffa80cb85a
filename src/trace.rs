//! Adaptive Tracing

#![allow(dead_code)]

use crate::camera::{sample_camera, Camera};
use crate::common::*;
use crate::geometry::*;
use crate::parallel::parallel_pixels_in_list;
use crate::quality::{estimate_quality, QUALITY_MAX};
use crate::state::RenderState;
use crate::tracer::{TraceParams, TraceSample, Tracer};
use itertools::iproduct;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Parameters of the adaptive scheduler.
#[derive(Clone, Debug)]
pub struct AdpParams {
    /// Target minimum per-pixel quality; governs termination only when both
    /// budget caps below are zero.
    pub desired_q: Float,

    /// Image-wide samples-per-pixel budget; 0 disables.
    pub desired_spp: Int,

    /// Wall-clock budget in seconds; 0 disables.
    pub desired_seconds: Int,

    /// Uniform sample floor every pixel receives before the estimator is
    /// trusted.
    pub min_samples: Int,

    /// Absolute per-pixel sample cap; a saturated pixel is retired with
    /// `q = QUALITY_MAX`.
    pub max_samples: Int,

    /// Kernel batch size.
    pub sample_step: Int,

    /// Quality increment per outer scheduler iteration.
    pub step_q: Float,

    /// Quality delta between host batch callback invocations.
    pub batch_step: Float,

    /// Parameters handed through to the tracer.
    pub trc_params: TraceParams,
}

impl Default for AdpParams {
    /// Returns the default scheduler parameters.
    fn default() -> Self {
        Self {
            desired_q: 4.0,
            desired_spp: 0,
            desired_seconds: 0,
            min_samples: 32,
            max_samples: 4096,
            sample_step: 8,
            step_q: 0.25,
            batch_step: 1.0,
            trc_params: TraceParams::default(),
        }
    }
}

/// Callback reporting scheduler progress; receives the state, a phase
/// description and the actual / maximum progress values.
pub type ProgressCallback = Arc<dyn Fn(&RenderState, &str, Int, Int) + Send + Sync>;

/// Callback fired when the whole image reaches a new quality batch; receives
/// the state, the reached quality and the desired quality.
pub type BatchCallback = Arc<dyn Fn(&RenderState, Float, Float) + Send + Sync>;

/// Evaluates the global stop predicate. The rules are checked in order: the
/// cancellation flag, the sample budget, the time budget, and — only when
/// both budgets are disabled — the quality target.
///
/// * `state`  - The render state.
/// * `params` - The scheduler parameters.
pub fn check_end(state: &RenderState, params: &AdpParams) -> bool {
    if state.stop.load(Ordering::Relaxed) {
        return true;
    }

    if params.desired_spp > 0 {
        let img_size = state.resolution().area() as u64;
        let image_spp = state.sample_count.load(Ordering::Relaxed) / img_size;
        if image_spp >= params.desired_spp as u64 {
            return true;
        }
    }

    if params.desired_seconds > 0 && state.elapsed().as_secs() >= params.desired_seconds as u64 {
        return true;
    }

    // Only check quality if not checking time or spp.
    if params.desired_spp == 0
        && params.desired_seconds == 0
        && state.min_q.load() >= params.desired_q
    {
        return true;
    }

    false
}

/// Returns the maximum progress value for the active termination rule.
///
/// * `params` - The scheduler parameters.
pub fn get_max_progress(params: &AdpParams) -> Int {
    if params.desired_spp > 0 {
        params.desired_spp
    } else if params.desired_seconds > 0 {
        params.desired_seconds
    } else {
        (params.desired_q * 100.0) as Int
    }
}

/// Returns the current progress value for the active termination rule.
///
/// * `state`  - The render state.
/// * `params` - The scheduler parameters.
pub fn get_actual_progress(state: &RenderState, params: &AdpParams) -> Int {
    if params.desired_spp > 0 {
        let img_size = state.resolution().area() as u64;
        (state.sample_count.load(Ordering::Relaxed) / img_size) as Int
    } else if params.desired_seconds > 0 {
        state.elapsed().as_secs() as Int
    } else {
        max(0, (state.curr_q.load() * 100.0) as Int)
    }
}

/// Traces a block of samples for one pixel: drives the tracer, accumulates
/// radiance into the full and odd accumulators, refreshes the mean images and
/// recomputes the pixel's quality.
///
/// * `state`       - The render state.
/// * `scene`       - The tracer owning the scene.
/// * `camera`      - The camera.
/// * `ij`          - The pixel coordinates.
/// * `num_samples` - Requested number of samples; clipped against
///                   `params.max_samples`.
/// * `params`      - The scheduler parameters.
pub(crate) fn trace_sample(
    state: &RenderState,
    scene: &dyn Tracer,
    camera: &dyn Camera,
    ij: &Point2i,
    num_samples: Int,
    params: &AdpParams,
) {
    // SAFETY: this pixel appears in exactly one in-flight worklist and this
    // worker drew it from there.
    let pixel = unsafe { state.pixels.pixel_mut(ij) };
    let image_size = state.resolution();

    let mut samples = num_samples;
    if pixel.actual.samples + num_samples > params.max_samples {
        samples = params.max_samples - pixel.actual.samples;
    }

    for _ in 0..samples {
        if !state.stop.load(Ordering::Relaxed) {
            let start = Instant::now();
            let puv = pixel.rng.uniform_point2f();
            let luv = pixel.rng.uniform_point2f();
            let ray = sample_camera(
                camera,
                ij,
                &image_size,
                &puv,
                &luv,
                params.trc_params.tentfilter,
            );
            let TraceSample {
                mut radiance,
                mut hit,
            } = scene.sample(&ray, &mut pixel.rng, &params.trc_params);
            pixel.time_in_sample += start.elapsed().as_nanos() as u64;
            state.sample_count.fetch_add(1, Ordering::Relaxed);

            if !hit {
                if params.trc_params.envhidden || !scene.has_environments() {
                    radiance = Vector3f::zero();
                    hit = false;
                } else {
                    // The miss gathered environment light; count it as a hit.
                    hit = true;
                }
            }
            if !radiance.is_finite() {
                radiance = Vector3f::zero();
            }
            if radiance.max_component() >= params.trc_params.clamp {
                radiance = radiance * (params.trc_params.clamp / radiance.max_component());
            }

            pixel.actual.radiance += Vector3::new(
                radiance.x as f64,
                radiance.y as f64,
                radiance.z as f64,
            );
            pixel.actual.hits += Int::from(hit);
            pixel.actual.samples += 1;

            if pixel.actual.samples % 2 == 1 {
                pixel.odd.radiance += Vector3::new(
                    radiance.x as f64,
                    radiance.y as f64,
                    radiance.z as f64,
                );
                pixel.odd.hits += Int::from(hit);
                pixel.odd.samples += 1;
            }
        }

        if check_end(state, params) {
            return;
        }
    }

    state.render.set(ij, pixel.actual.mean_rgba());
    state.odd_render.set(ij, pixel.odd.mean_rgba());

    if pixel.actual.samples < params.max_samples {
        pixel.q = estimate_quality(&state.render.get(ij), &state.odd_render.get(ij));
    } else {
        pixel.q = QUALITY_MAX;
    }
}

/// Traces batches for one pixel until its quality reaches `q` or
/// `sample_limit` extra samples have been spent on it. The first batch is
/// always taken so a fresh pixel gets new signal before the limit applies.
///
/// * `state`        - The render state.
/// * `scene`        - The tracer owning the scene.
/// * `camera`       - The camera.
/// * `ij`           - The pixel coordinates.
/// * `params`       - The scheduler parameters.
/// * `q`            - The quality to reach.
/// * `sample_limit` - Upper bound on extra samples for this pixel.
pub(crate) fn trace_until_quality(
    state: &RenderState,
    scene: &dyn Tracer,
    camera: &dyn Camera,
    ij: &Point2i,
    params: &AdpParams,
    q: Float,
    sample_limit: Int,
) {
    trace_sample(state, scene, camera, ij, params.sample_step, params);
    if check_end(state, params) {
        return;
    }

    let mut samples_shot = params.sample_step;
    while state.pixels.pixel(ij).q < q && samples_shot < sample_limit {
        trace_sample(state, scene, camera, ij, params.sample_step, params);
        if check_end(state, params) {
            return;
        }
        samples_shot += params.sample_step;
    }
}

/// Spends a pixel's neighborhood budget in one kernel call, then clears it.
///
/// * `state`  - The render state.
/// * `scene`  - The tracer owning the scene.
/// * `camera` - The camera.
/// * `ij`     - The pixel coordinates.
/// * `params` - The scheduler parameters.
pub(crate) fn trace_by_budget(
    state: &RenderState,
    scene: &dyn Tracer,
    camera: &dyn Camera,
    ij: &Point2i,
    params: &AdpParams,
) {
    let budget = state.pixels.pixel(ij).sample_budget;
    trace_sample(state, scene, camera, ij, budget, params);
    // SAFETY: this worker owns the pixel through the proximity worklist.
    unsafe { state.pixels.pixel_mut(ij) }.sample_budget = 0;
}

/// One neighbor offset of the spread template.
#[derive(Copy, Clone, Debug)]
pub struct SampleSpread {
    /// X-offset.
    pub x: i8,

    /// Y-offset.
    pub y: i8,

    /// Divisor applied to the parent's sample count when granting budget.
    pub div: Float,
}

/// Rebuilds the neighborhood template for a quality step: all lattice offsets
/// inside a disk whose radius shrinks as the image converges. The radius-1
/// template keeps its corner offsets; the larger radii apply the distance
/// cutoff.
///
/// * `spread_vec` - The template to rebuild.
/// * `step_q`     - The current quality step.
pub fn create_sample_spread(spread_vec: &mut Vec<SampleSpread>, step_q: Float) {
    let radius: Int = if step_q <= 0.49 {
        8
    } else if step_q <= 1.99 {
        4
    } else if step_q <= 3.99 {
        2
    } else {
        1
    };

    spread_vec.clear();
    for i in -radius..=radius {
        for j in -radius..=radius {
            if i == 0 && j == 0 {
                continue;
            }

            let spread = SampleSpread {
                x: i as i8,
                y: j as i8,
                div: 2.0,
            };
            if radius == 1 {
                spread_vec.push(spread);
            } else {
                let dist = ((i * i + j * j) as Float).sqrt();
                if dist <= radius as Float {
                    spread_vec.push(spread);
                }
            }
        }
    }
}

/// Returns every pixel coordinate of the image in row-major order.
///
/// * `state` - The render state.
fn all_image_ij(state: &RenderState) -> Vec<Point2i> {
    let size = state.resolution();
    iproduct!(0..size.y, 0..size.x)
        .map(|(j, i)| Point2i::new(i, j))
        .collect()
}

/// Selects every pixel below the quality step and zeroes all sample budgets.
/// Runs on the scheduler thread between batches.
///
/// * `state`  - The render state.
/// * `step_q` - The current quality step.
fn select_below_step(state: &RenderState, step_q: Float) -> Vec<Point2i> {
    let size = state.resolution();
    let mut ij_by_q = Vec::new();
    for (j, i) in iproduct!(0..size.y, 0..size.x) {
        let ij = Point2i::new(i, j);
        // SAFETY: no workers run between batches.
        let pixel = unsafe { state.pixels.pixel_mut(&ij) };
        pixel.sample_budget = 0;
        if pixel.q < step_q {
            ij_by_q.push(ij);
        }
    }
    ij_by_q
}

/// Grants sample budget to the neighbors of every below-step pixel: a
/// neighbor whose samples plus pending budget fall short of the parent's
/// share receives the difference. Larger grants overwrite smaller ones; they
/// do not accumulate. Assignment is sequential on the scheduler thread, which
/// keeps the overwrite order deterministic.
///
/// * `state`      - The render state.
/// * `spread_vec` - The neighborhood template.
/// * `ij_by_q`    - The below-step pixels.
fn assign_proximity_budgets(
    state: &RenderState,
    spread_vec: &[SampleSpread],
    ij_by_q: &[Point2i],
) {
    let size = state.resolution();
    for ij in ij_by_q {
        let parent_samples = state.pixels.pixel(ij).actual.samples;

        for spread in spread_vec {
            let k = ij.x + spread.x as Int;
            let l = ij.y + spread.y as Int;

            if k >= 0 && l >= 0 && k < size.x && l < size.y {
                // SAFETY: budgets are assigned on the scheduler thread only.
                let neighbor = unsafe { state.pixels.pixel_mut(&Point2i::new(k, l)) };
                let share = parent_samples as Float / spread.div;

                if ((neighbor.actual.samples + neighbor.sample_budget) as Float) < share {
                    neighbor.sample_budget = (share - neighbor.actual.samples as Float) as Int;
                }
            }
        }
    }
}

/// Returns every pixel holding a positive sample budget.
///
/// * `state` - The render state.
fn collect_budgeted(state: &RenderState) -> Vec<Point2i> {
    let size = state.resolution();
    let mut ij_by_proximity = Vec::new();
    for (j, i) in iproduct!(0..size.y, 0..size.x) {
        let ij = Point2i::new(i, j);
        if state.pixels.pixel(&ij).sample_budget > 0 {
            ij_by_proximity.push(ij);
        }
    }
    ij_by_proximity
}

/// Renders the image adaptively and synchronously. Phase one spreads a
/// uniform sample floor over the whole image; phase two repeatedly raises a
/// quality step, brings the below-step pixels up to it and grants their
/// neighborhoods a share of the spent samples, until the stop predicate
/// fires. Always returns the current render buffer, cancelled or not.
///
/// * `state`       - The render state; freshly created by `RenderState::new`.
/// * `scene`       - The tracer owning the scene.
/// * `camera`      - The camera.
/// * `params`      - The scheduler parameters.
/// * `progress_cb` - Optional progress callback.
/// * `batch_cb`    - Optional per-quality-batch callback.
pub fn trace_image(
    state: &RenderState,
    scene: &dyn Tracer,
    camera: &dyn Camera,
    params: &AdpParams,
    progress_cb: Option<ProgressCallback>,
    batch_cb: Option<BatchCallback>,
) -> crate::state::Image<Vector4f> {
    let size = state.resolution();
    info!(
        "Adaptive render of {}x{} image, desired_q {}, spp cap {}, time cap {}s",
        size.x, size.y, params.desired_q, params.desired_spp, params.desired_seconds
    );

    let mut spread_vec: Vec<SampleSpread> = Vec::new();
    let mut step_q: Float = 0.0;
    state.curr_q.store(-2.0);

    create_sample_spread(&mut spread_vec, step_q);

    if let Some(cb) = progress_cb.as_ref() {
        cb(
            state,
            "initial samples",
            get_actual_progress(state, params),
            get_max_progress(params),
        );
    }
    state.curr_q.store(-1.0);

    // Uniform floor so the quality estimator has signal everywhere.
    let mut sampled = 0;
    while sampled < params.min_samples {
        parallel_pixels_in_list(
            &all_image_ij(state),
            || check_end(state, params),
            |ij| trace_sample(state, scene, camera, ij, params.sample_step, params),
        );
        sampled += params.sample_step;
    }

    let mut min_sample_in_a_pixel = params.min_samples;
    let mut old_min_sample = 0;
    if let Some(cb) = batch_cb.as_ref() {
        cb(state, state.curr_q.load(), params.desired_q);
    }
    let mut next_batch = state.curr_q.load() + params.batch_step;

    while !check_end(state, params) {
        // Select pixels that are below the actual quality step.
        let ij_by_q = select_below_step(state, step_q);

        // Trace samples for each pixel until it reaches the actual quality
        // step; the limit keeps intractable pixels from dominating a round.
        let limit_trace = min_sample_in_a_pixel - old_min_sample;
        debug!(
            "quality step {:.2}: {} pixels below, limit {}",
            step_q,
            ij_by_q.len(),
            limit_trace
        );
        if let Some(cb) = progress_cb.as_ref() {
            cb(
                state,
                "samples by quality",
                get_actual_progress(state, params),
                get_max_progress(params),
            );
        }
        parallel_pixels_in_list(
            &ij_by_q,
            || check_end(state, params),
            |ij| trace_until_quality(state, scene, camera, ij, params, step_q, limit_trace),
        );

        // Grant the neighborhoods of the sampled pixels a share of their
        // samples, then trace every pixel holding budget.
        assign_proximity_budgets(state, &spread_vec, &ij_by_q);
        let ij_by_proximity = collect_budgeted(state);

        if let Some(cb) = progress_cb.as_ref() {
            cb(
                state,
                "samples by proximity",
                get_actual_progress(state, params),
                get_max_progress(params),
            );
        }
        parallel_pixels_in_list(
            &ij_by_proximity,
            || check_end(state, params),
            |ij| trace_by_budget(state, scene, camera, ij, params),
        );

        // Sweep the image for the new quality floor and sample minimum.
        old_min_sample = min_sample_in_a_pixel;
        let mut tmp_min_q = Float::MAX;
        for (j, i) in iproduct!(0..size.y, 0..size.x) {
            let pixel = state.pixels.pixel(&Point2i::new(i, j));

            if tmp_min_q > pixel.q {
                tmp_min_q = pixel.q;
            }

            if min_sample_in_a_pixel > pixel.actual.samples {
                min_sample_in_a_pixel = pixel.actual.samples;
            }
        }

        state.min_q.store(tmp_min_q);
        if state.min_q.load() >= step_q {
            state.curr_q.store(step_q);

            if state.curr_q.load() >= next_batch {
                if let Some(cb) = batch_cb.as_ref() {
                    cb(state, state.curr_q.load(), params.desired_q);
                }
                next_batch = state.curr_q.load() + params.batch_step;
            }
            step_q += params.step_q;
            create_sample_spread(&mut spread_vec, step_q);

            // In pure-quality mode the last step lands exactly on the target.
            if params.desired_seconds == 0
                && params.desired_spp == 0
                && step_q > params.desired_q
            {
                step_q = params.desired_q;
            }
        }
    }

    if !state.stop.load(Ordering::Relaxed) {
        if let Some(cb) = progress_cb.as_ref() {
            cb(
                state,
                "samples by proximity",
                get_max_progress(params),
                get_max_progress(params),
            );
        }
        if let Some(cb) = batch_cb.as_ref() {
            cb(state, params.desired_q, params.desired_q);
        }
    }

    state.render.clone()
}

/// Starts an asynchronous render: clears the cancellation flag, spawns the
/// background worker and parks its handle in the state. Returns immediately.
///
/// * `state`       - The render state.
/// * `scene`       - The tracer owning the scene.
/// * `camera`      - The camera.
/// * `params`      - The scheduler parameters.
/// * `progress_cb` - Optional progress callback.
/// * `batch_cb`    - Optional per-quality-batch callback.
pub fn trace_start(
    state: &Arc<RenderState>,
    scene: &Arc<dyn Tracer>,
    camera: &Arc<dyn Camera>,
    params: &AdpParams,
    progress_cb: Option<ProgressCallback>,
    batch_cb: Option<BatchCallback>,
) {
    state.stop.store(false, Ordering::Relaxed);

    let worker_state = Arc::clone(state);
    let scene = Arc::clone(scene);
    let camera = Arc::clone(camera);
    let params = params.clone();
    let handle = thread::spawn(move || {
        trace_image(
            &worker_state,
            scene.as_ref(),
            camera.as_ref(),
            &params,
            progress_cb,
            batch_cb,
        );
    });

    *state.worker.lock().unwrap() = Some(handle);
}

/// Cancels a render cooperatively and joins the background worker. Safe to
/// call when no worker is running, and calling it twice is a no-op the
/// second time.
///
/// * `state` - The render state.
pub fn trace_stop(state: &RenderState) {
    state.stop.store(true, Ordering::Relaxed);

    let handle = state.worker.lock().unwrap().take();
    if let Some(handle) = handle {
        if handle.join().is_err() {
            error!("Render worker panicked before trace_stop.");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
