use screencanvas_protocol::{MAX_ZOOM, MIN_ZOOM};

/// Per-unit wheel response. `0.999^delta` is close to linear for the small
/// deltas a wheel notch produces.
const WHEEL_BASE: f64 = 0.999;

/// Compute the zoom factor after a wheel movement of `delta`.
///
/// Positive deltas (scrolling down) zoom out, negative deltas zoom in. The
/// result is saturated to `[MIN_ZOOM, MAX_ZOOM]`.
pub fn calculate_zoom(current_zoom: f64, delta: f64) -> f64 {
    let zoom = current_zoom * WHEEL_BASE.powf(delta);
    if zoom.is_nan() {
        // 0 * inf and friends: fall back to the nearest bound of the input.
        return current_zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_delta_is_identity() {
        for z in [0.01, 0.5, 1.0, 7.25, 20.0] {
            assert_eq!(calculate_zoom(z, 0.0), z);
        }
    }

    #[test]
    fn moderate_delta_is_not_clamped() {
        let z = calculate_zoom(1.0, 1000.0);
        assert!((z - 0.3677).abs() < 1e-3, "z={z}");
    }

    #[test]
    fn large_positive_delta_clamps_to_min() {
        assert_eq!(calculate_zoom(1.0, 50_000.0), MIN_ZOOM);
    }

    #[test]
    fn large_negative_delta_clamps_to_max() {
        assert_eq!(calculate_zoom(1.0, -50_000.0), MAX_ZOOM);
    }

    #[test]
    fn non_finite_inputs_stay_in_range() {
        let z = calculate_zoom(f64::INFINITY, 0.0);
        assert_eq!(z, MAX_ZOOM);
        let z = calculate_zoom(0.0, -1.0e9);
        assert!((MIN_ZOOM..=MAX_ZOOM).contains(&z));
    }

    proptest! {
        #[test]
        fn output_is_always_in_range(z in 1e-6f64..1e6, delta in -1e6f64..1e6) {
            let out = calculate_zoom(z, delta);
            prop_assert!((MIN_ZOOM..=MAX_ZOOM).contains(&out));
        }

        #[test]
        fn monotonically_decreasing_in_delta(a in -5000f64..5000.0, b in -5000f64..5000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(calculate_zoom(1.0, lo) >= calculate_zoom(1.0, hi));
        }

        #[test]
        fn sign_selects_direction(delta in 1f64..2000.0) {
            prop_assert!(calculate_zoom(1.0, delta) < 1.0);
            prop_assert!(calculate_zoom(1.0, -delta) > 1.0);
        }
    }
}
