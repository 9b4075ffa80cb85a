//! Image I/O

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::{Point2i, Vector4f};
use crate::state::Image;
use exr::prelude as exrs;
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Write a rendered image to an output file. The extension selects the
/// format: `.png` stores gamma-encoded 8-bit values, `.exr` stores linear
/// floats.
///
/// * `path` - Output file path.
/// * `img`  - The image to write.
pub fn write_image(path: &str, img: &Image<Vector4f>) -> Result<(), String> {
    match get_extension_from_filename(path) {
        Some("png") => write_png(path, img),
        Some("exr") => write_exr(path, img),
        Some(extension) => Err(format!("Unsupported image file extension {extension}.")),
        None => Err(format!(
            "Can't determine file type from suffix of filename {path}."
        )),
    }
}

/// Write a gamma-encoded 8-bit PNG file.
///
/// * `path` - Output file path.
/// * `img`  - The image to write.
fn write_png(path: &str, img: &Image<Vector4f>) -> Result<(), String> {
    let size = img.resolution();
    let mut out = RgbaImage::new(size.x as u32, size.y as u32);

    for j in 0..size.y {
        for i in 0..size.x {
            let texel = img.get(&Point2i::new(i, j));
            let encode = |v: Float| (clamp(gamma_correct(v), 0.0, 1.0) * 255.0).round() as u8;
            let alpha = (clamp(texel.w, 0.0, 1.0) * 255.0).round() as u8;
            out.put_pixel(
                i as u32,
                j as u32,
                Rgba([encode(texel.x), encode(texel.y), encode(texel.z), alpha]),
            );
        }
    }

    out.save(path)
        .map_err(|err| format!("Error writing output image {path}. {err}."))
}

/// Write a linear float OpenEXR file.
///
/// * `path` - Output file path.
/// * `img`  - The image to write.
fn write_exr(path: &str, img: &Image<Vector4f>) -> Result<(), String> {
    let size = img.resolution();
    exrs::write_rgba_file(path, size.x as usize, size.y as usize, |x, y| {
        let texel = img.get(&Point2i::new(x as Int, y as Int));
        (texel.x, texel.y, texel.z, texel.w)
    })
    .map_err(|err| format!("Error writing output image {path}. {err}."))
}

/// Returns the lowercase extension of a filename, if any.
///
/// * `filename` - The filename.
fn get_extension_from_filename(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|e| e.to_str())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> Image<Vector4f> {
        let img = Image::new(Point2i::new(8, 4), Vector4f::zero());
        for j in 0..4 {
            for i in 0..8 {
                let v = i as Float / 7.0;
                img.set(&Point2i::new(i, j), Vector4f::new(v, v * 0.5, 1.0 - v, 1.0));
            }
        }
        img
    }

    #[test]
    fn png_round_trip_dimensions() {
        let path = std::env::temp_dir().join("adaptive_trace_io_test.png");
        let path = path.to_str().unwrap().to_owned();
        write_image(&path, &gradient_image()).unwrap();

        let read_back = image::open(&path).unwrap();
        assert_eq!(read_back.width(), 8);
        assert_eq!(read_back.height(), 4);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn exr_writes_without_error() {
        let path = std::env::temp_dir().join("adaptive_trace_io_test.exr");
        let path = path.to_str().unwrap().to_owned();
        write_image(&path, &gradient_image()).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(write_image("render.bmp", &gradient_image()).is_err());
        assert!(write_image("render", &gradient_image()).is_err());
    }
}
