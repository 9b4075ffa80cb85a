//! Adaptive Trace
//!
//! An adaptive sample allocator around an external path tracer: given a
//! tracer that maps a camera ray to a radiance estimate, it decides which
//! pixels of an image receive more samples and when to stop, reaching a
//! target visual quality (or a sample / time budget) faster than uniformly
//! sampling every pixel.

#[macro_use]
extern crate hexf;
#[macro_use]
extern crate log;

pub mod camera;
pub mod common;
pub mod geometry;
pub mod image_io;
pub mod parallel;
pub mod quality;
pub mod rng;
pub mod state;
pub mod stats;
pub mod trace;
pub mod tracer;

// Re-export.
pub use camera::*;
pub use common::*;
pub use geometry::*;
pub use image_io::*;
pub use quality::*;
pub use rng::*;
pub use state::*;
pub use stats::*;
pub use trace::*;
pub use tracer::*;
