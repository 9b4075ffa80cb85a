//! Quality Estimator

use crate::common::*;
use crate::geometry::Vector4f;

/// Quality ceiling; a pixel at this value is retired from scheduling.
pub const QUALITY_MAX: Float = 10.0;

/// Luminance threshold below which the error is divided by a fixed floor
/// instead of the shot-noise normalizer.
const NEAR_BLACK: f64 = 1e-4;

/// Estimates a pixel's quality from its full and odd-half mean radiances.
///
/// The two estimators share half their samples, so their difference is a
/// cheap Monte Carlo variance proxy. The difference is taken on the
/// gamma-encoded values and normalized by the square root of the encoded
/// luminance sum; near-black pixels divide by a fixed floor instead.
///
/// * `full` - Mean radiance over all samples.
/// * `odd`  - Mean radiance over the odd-numbered samples.
pub fn estimate_quality(full: &Vector4f, odd: &Vector4f) -> Float {
    let r = gamma_correct(full.x) as f64;
    let g = gamma_correct(full.y) as f64;
    let b = gamma_correct(full.z) as f64;
    let r_odd = gamma_correct(odd.x) as f64;
    let g_odd = gamma_correct(odd.y) as f64;
    let b_odd = gamma_correct(odd.z) as f64;

    let d = (r - r_odd).abs() + (g - g_odd).abs() + (b - b_odd).abs();
    let div = (r + g + b).sqrt();

    let err = if div >= NEAR_BLACK { d / div } else { d / 0.01 };

    let q = -err.log2() as Float;
    min(q, QUALITY_MAX)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_estimates_hit_the_ceiling() {
        let v = Vector4f::new(0.5, 0.25, 0.125, 1.0);
        assert_eq!(estimate_quality(&v, &v), QUALITY_MAX);
    }

    #[test]
    fn larger_differences_score_lower() {
        let full = Vector4f::new(0.5, 0.5, 0.5, 1.0);
        let close = Vector4f::new(0.501, 0.5, 0.5, 1.0);
        let far = Vector4f::new(0.6, 0.5, 0.5, 1.0);
        assert!(estimate_quality(&full, &close) > estimate_quality(&full, &far));
    }

    #[test]
    fn near_black_uses_fixed_floor() {
        // Both estimates are essentially black; the error is divided by 0.01
        // rather than by the vanishing luminance normalizer.
        let full = Vector4f::zero();
        let odd = Vector4f::new(1e-5, 0.0, 0.0, 0.0);
        let d = gamma_correct(1e-5) as f64;
        let expected = -(d / 0.01).log2() as Float;
        let q = estimate_quality(&full, &odd);
        assert!(q < QUALITY_MAX);
        assert!((q - expected).abs() < 1e-4);
    }

    #[test]
    fn quality_can_be_negative() {
        // A wildly different odd estimate yields an error above 1.
        let full = Vector4f::new(0.001, 0.001, 0.001, 1.0);
        let odd = Vector4f::new(1.0, 1.0, 1.0, 1.0);
        assert!(estimate_quality(&full, &odd) < 0.0);
    }

    proptest! {
        #[test]
        fn quality_never_exceeds_ceiling(
            (r, g, b) in (0.0..1.0f32, 0.0..1.0f32, 0.0..1.0f32),
            (ro, go, bo) in (0.0..1.0f32, 0.0..1.0f32, 0.0..1.0f32),
        ) {
            let full = Vector4f::new(r, g, b, 1.0);
            let odd = Vector4f::new(ro, go, bo, 1.0);
            prop_assert!(estimate_quality(&full, &odd) <= QUALITY_MAX);
        }
    }
}
