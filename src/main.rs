//! Adaptive renderer command line host.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

use adaptive_trace::*;
use clap::Parser;
use std::process::exit;
use std::sync::Arc;

lazy_static! {
    /// The global application options.
    pub static ref OPTIONS: Options = Options::parse();
}

/// System wide options.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// Target minimum per-pixel quality; drives the adaptive scheduler when
    /// no sample or time budget is given.
    #[arg(
        long = "quality",
        short = 'q',
        value_name = "Q",
        help = "Render until every pixel reaches this quality (commonly 3-6)."
    )]
    pub quality: Option<f32>,

    /// Samples-per-pixel budget cap.
    #[arg(
        long = "spp",
        value_name = "NUM",
        conflicts_with = "seconds",
        help = "Stop after this many samples per pixel on average."
    )]
    pub spp: Option<i32>,

    /// Wall-clock budget cap.
    #[arg(
        long = "seconds",
        value_name = "NUM",
        help = "Stop after this many seconds of sampling."
    )]
    pub seconds: Option<i32>,

    /// Length of the longer image axis.
    #[arg(
        long = "resolution",
        short = 'r',
        value_name = "NUM",
        default_value_t = 640,
        help = "Length of the longer image axis in pixels."
    )]
    pub resolution: i32,

    /// Number of threads to use for rendering; 0 uses all cores.
    #[arg(
        long = "nthreads",
        short = 't',
        value_name = "NUM",
        default_value_t = 0,
        help = "Use specified number of threads for rendering."
    )]
    pub n_threads: usize,

    /// Random seed; the same seed reproduces the render bit for bit.
    #[arg(long = "seed", value_name = "NUM", default_value_t = 961748941)]
    pub seed: u64,

    /// Firefly clamp for single-sample radiance.
    #[arg(long = "clamp", value_name = "FLOAT", default_value_t = 10.0)]
    pub clamp: f32,

    /// Hide environment lights from camera rays.
    #[arg(long = "envhidden", help = "Environment lights are invisible to camera rays.")]
    pub envhidden: bool,

    /// Use tent reconstruction for sub-pixel sample positions.
    #[arg(long = "tentfilter", help = "Use a tent filter for sub-pixel positions.")]
    pub tentfilter: bool,

    /// Uniform sample floor.
    #[arg(long = "min-samples", value_name = "NUM", default_value_t = 32)]
    pub min_samples: i32,

    /// Absolute per-pixel sample cap.
    #[arg(long = "max-samples", value_name = "NUM", default_value_t = 4096)]
    pub max_samples: i32,

    /// Kernel batch size.
    #[arg(long = "sample-step", value_name = "NUM", default_value_t = 8)]
    pub sample_step: i32,

    /// Sampling algorithm: path, naive or eyelight.
    #[arg(
        long = "sampler",
        value_name = "NAME",
        default_value = "path",
        help = "Sampling algorithm: path, naive or eyelight."
    )]
    pub sampler: String,

    /// Path to the output image; .png or .exr.
    #[arg(
        long = "outfile",
        short = 'o',
        value_name = "FILE",
        default_value = "render.png",
        help = "Write the final image to the given filename."
    )]
    pub outfile: String,

    /// Dump sample density, time density and quality diagnostic images.
    #[arg(
        long = "density-images",
        help = "Write sample-density.png, time-density.png and quality.png."
    )]
    pub density_images: bool,
}

/// One sphere of the demo scene.
struct Sphere {
    center: Vector3f,
    radius: Float,
    albedo: Vector3f,
    emission: Vector3f,
}

impl Sphere {
    /// Returns the nearest intersection parameter along the ray, if any.
    ///
    /// * `ray` - The ray.
    fn intersect(&self, ray: &Ray) -> Option<Float> {
        let oc = ray.o - self.center;
        let b = oc.dot(&ray.d);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        for t in [-b - sqrt_disc, -b + sqrt_disc] {
            if t > ray.t_min && t < ray.t_max {
                return Some(t);
            }
        }
        None
    }
}

/// Built-in analytic scene standing in for a scene loader: diffuse spheres on
/// a large ground sphere below a gradient sky.
struct DemoScene {
    spheres: Vec<Sphere>,
}

impl DemoScene {
    fn new() -> Self {
        let spheres = vec![
            // Ground.
            Sphere {
                center: Vector3f::new(0.0, -1000.0, 0.0),
                radius: 1000.0,
                albedo: Vector3f::new(0.6, 0.6, 0.6),
                emission: Vector3f::zero(),
            },
            Sphere {
                center: Vector3f::new(-1.2, 0.5, 0.0),
                radius: 0.5,
                albedo: Vector3f::new(0.75, 0.25, 0.2),
                emission: Vector3f::zero(),
            },
            Sphere {
                center: Vector3f::new(0.0, 0.6, 0.0),
                radius: 0.6,
                albedo: Vector3f::new(0.25, 0.5, 0.75),
                emission: Vector3f::zero(),
            },
            Sphere {
                center: Vector3f::new(1.2, 0.4, 0.3),
                radius: 0.4,
                albedo: Vector3f::new(0.3, 0.7, 0.3),
                emission: Vector3f::zero(),
            },
            // Small emitter; its sharp shadows keep the allocator busy.
            Sphere {
                center: Vector3f::new(0.6, 2.2, -0.8),
                radius: 0.2,
                albedo: Vector3f::zero(),
                emission: Vector3f::new(40.0, 38.0, 34.0),
            },
        ];
        Self { spheres }
    }

    /// Returns the nearest hit along the ray.
    ///
    /// * `ray` - The ray.
    fn intersect(&self, ray: &Ray) -> Option<(Float, &Sphere)> {
        let mut nearest: Option<(Float, &Sphere)> = None;
        for sphere in &self.spheres {
            let mut probe = *ray;
            if let Some((t, _)) = nearest {
                probe.t_max = t;
            }
            if let Some(t) = sphere.intersect(&probe) {
                nearest = Some((t, sphere));
            }
        }
        nearest
    }

    /// Sky gradient evaluated for an escaped ray.
    ///
    /// * `d` - The ray direction.
    fn sky(&self, d: &Vector3f) -> Vector3f {
        let t = 0.5 * (d.y + 1.0);
        Vector3f::new(1.0, 1.0, 1.0) * (1.0 - t) + Vector3f::new(0.5, 0.7, 1.0) * t
    }
}

/// Maps a uniform square sample to a cosine-weighted direction around the
/// normal.
///
/// * `n`  - The surface normal.
/// * `uv` - Uniform sample in [0, 1)².
fn sample_hemisphere_cos(n: &Vector3f, uv: &Point2f) -> Vector3f {
    let z = uv.y.sqrt();
    let r = (1.0 - z * z).sqrt();
    let phi = TWO_PI * uv.x;

    let up = if n.z.abs() < 0.999 {
        Vector3f::new(0.0, 0.0, 1.0)
    } else {
        Vector3f::new(1.0, 0.0, 0.0)
    };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(&tangent);

    (tangent * (phi.cos() * r) + bitangent * (phi.sin() * r) + *n * z).normalize()
}

impl Tracer for DemoScene {
    fn sample(&self, ray: &Ray, rng: &mut Rng, params: &TraceParams) -> TraceSample {
        let mut ray = *ray;

        if params.sampler == SamplerKind::Eyelight {
            return match self.intersect(&ray) {
                Some((t, sphere)) => {
                    let n = (ray.at(t) - sphere.center).normalize();
                    let shade = n.dot(&-ray.d).abs();
                    TraceSample {
                        radiance: sphere.emission + sphere.albedo * shade,
                        hit: true,
                    }
                }
                None => TraceSample {
                    radiance: self.sky(&ray.d),
                    hit: false,
                },
            };
        }

        let mut radiance = Vector3f::zero();
        let mut throughput = Vector3f::new(1.0, 1.0, 1.0);
        let mut hit = false;

        for bounce in 0..8 {
            match self.intersect(&ray) {
                Some((t, sphere)) => {
                    if bounce == 0 {
                        hit = true;
                    }
                    radiance += throughput * sphere.emission;
                    throughput = throughput * sphere.albedo;
                    if throughput.max_component() <= 0.0 {
                        break;
                    }

                    let p = ray.at(t);
                    let n = (p - sphere.center).normalize();
                    let n = if n.dot(&ray.d) > 0.0 { -n } else { n };
                    let d = sample_hemisphere_cos(&n, &rng.uniform_point2f());
                    ray = Ray::new(p + n * 1e-4, d);
                }
                None => {
                    radiance += throughput * self.sky(&ray.d);
                    break;
                }
            }
        }

        TraceSample { radiance, hit }
    }

    fn has_environments(&self) -> bool {
        true
    }
}

/// Pinhole camera for the demo scene.
struct DemoCamera {
    position: Vector3f,
    right: Vector3f,
    up: Vector3f,
    forward: Vector3f,
    screen: Point2f,
    film: Point2f,
}

impl DemoCamera {
    /// Creates a camera looking from `position` at `target`.
    ///
    /// * `position` - Camera position.
    /// * `target`   - Point the camera looks at.
    /// * `fov`      - Vertical field of view in degrees.
    fn new(position: Vector3f, target: Vector3f, fov: Float) -> Self {
        let film = Point2f::new(0.036, 0.024);
        let aspect = film.x / film.y;

        let forward = (target - position).normalize();
        let right = forward.cross(&Vector3f::new(0.0, 1.0, 0.0)).normalize();
        let up = right.cross(&forward);

        let screen_y = 2.0 * (fov.to_radians() * 0.5).tan();
        let screen = Point2f::new(screen_y * aspect, screen_y);

        Self {
            position,
            right,
            up,
            forward,
            screen,
            film,
        }
    }
}

impl Camera for DemoCamera {
    fn film(&self) -> Point2f {
        self.film
    }

    fn generate_ray(&self, uv: &Point2f, _lens: &Point2f) -> Ray {
        let x = (uv.x - 0.5) * self.screen.x;
        let y = (0.5 - uv.y) * self.screen.y;
        let d = (self.forward + self.right * x + self.up * y).normalize();
        Ray::new(self.position, d)
    }
}

fn main() {
    // Initialize `env_logger`.
    env_logger::init();

    // Load the program options.
    let options = OPTIONS.clone();

    // Configure number of threads.
    if options.n_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(options.n_threads)
            .build_global()
            .unwrap();
    }

    let sampler = match options.sampler.as_str() {
        "path" => SamplerKind::Path,
        "naive" => SamplerKind::Naive,
        "eyelight" => SamplerKind::Eyelight,
        other => {
            error!("Unknown sampler '{other}'; expected path, naive or eyelight.");
            exit(1);
        }
    };

    let trc_params = TraceParams {
        resolution: options.resolution,
        sampler,
        clamp: options.clamp,
        seed: options.seed,
        envhidden: options.envhidden,
        tentfilter: options.tentfilter,
    };
    let params = AdpParams {
        desired_q: options.quality.unwrap_or(4.0),
        desired_spp: options.spp.unwrap_or(0),
        desired_seconds: options.seconds.unwrap_or(0),
        min_samples: options.min_samples,
        max_samples: options.max_samples,
        sample_step: options.sample_step,
        trc_params,
        ..AdpParams::default()
    };

    let scene = DemoScene::new();
    let camera = DemoCamera::new(
        Vector3f::new(0.0, 1.2, 4.0),
        Vector3f::new(0.0, 0.6, 0.0),
        35.0,
    );

    let state = RenderState::new(&camera, &trc_params);
    let progress_cb: ProgressCallback = Arc::new(|_state, description, actual, total| {
        info!("{description}: {actual}/{total}");
    });

    let image = trace_image(&state, &scene, &camera, &params, Some(progress_cb), None);

    let stat = collect_statistics(&state);
    println!("{}", stat.stat_text);

    if let Err(err) = write_image(&options.outfile, &image) {
        error!("{err}");
        exit(1);
    }
    info!("Output image written to {}.", options.outfile);

    if options.density_images {
        let results = [
            ("sample-density.png", sample_density_img(&state, &stat)),
            ("time-density.png", time_density_img(&state)),
            ("quality.png", q_img(&state)),
        ];
        for (path, img) in results {
            if let Err(err) = img.save(path) {
                error!("Error writing diagnostic image {path}. {err}.");
                exit(1);
            }
        }
    }
}
