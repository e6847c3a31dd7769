use crate::calibration::Limits;

/// Above this the probe is treated as disconnected, whatever the calibration.
pub const DISCONNECTED_OHMS: f32 = 1e8;

/// Maps a probe resistance to a 0..=100 moisture index.
///
/// Probe resistance falls roughly exponentially with moisture, so the index
/// interpolates linearly between the limits in the log domain. The limits are
/// sorted by magnitude first, a swapped dry/wet capture gives the same curve.
pub fn compute_index(resistance: f32, limits: Limits) -> f32 {
    if resistance > DISCONNECTED_OHMS {
        return 0.0;
    }

    let dry_limit = limits.dry.max(limits.wet);
    let wet_limit = limits.dry.min(limits.wet);

    if dry_limit == wet_limit {
        return 0.0;
    }

    let ln_dry = dry_limit.ln();
    let pct = 100.0 * (ln_dry - resistance.ln()) / (ln_dry - wet_limit.ln());

    if pct.is_nan() {
        return 0.0;
    }

    pct.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{DEFAULT_DRY_OHMS, DEFAULT_WET_OHMS};

    const DEFAULTS: Limits = Limits {
        dry: DEFAULT_DRY_OHMS,
        wet: DEFAULT_WET_OHMS,
    };

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn limits_map_to_bounds() {
        let limits = Limits {
            dry: 750_000.0,
            wet: 35_000.0,
        };

        assert!(close(compute_index(750_000.0, limits), 0.0));
        assert!(close(compute_index(35_000.0, limits), 100.0));
    }

    #[test]
    fn log_interpolation_between_defaults() {
        let index = compute_index(100_000.0, DEFAULTS);

        assert!(close(index, 70.85), "{index}");
    }

    #[test]
    fn always_within_bounds() {
        let resistances = [
            -10.0,
            0.0,
            1.0,
            1_000.0,
            20_000.0,
            99_999.0,
            5_000_000.0,
            9e7,
            1e8,
            1e9,
            f32::INFINITY,
            f32::NAN,
        ];

        for r in resistances {
            let index = compute_index(r, DEFAULTS);
            assert!((0.0..=100.0).contains(&index), "r={r} -> {index}");
        }
    }

    #[test]
    fn monotonic_from_dry_to_wet() {
        let mut previous = compute_index(DEFAULT_DRY_OHMS, DEFAULTS);
        let mut r = DEFAULT_DRY_OHMS;

        while r > DEFAULT_WET_OHMS {
            r *= 0.9;
            let index = compute_index(r, DEFAULTS);
            assert!(index >= previous, "r={r}: {index} < {previous}");
            previous = index;
        }
    }

    #[test]
    fn swapped_limits_give_same_curve() {
        let swapped = Limits {
            dry: DEFAULT_WET_OHMS,
            wet: DEFAULT_DRY_OHMS,
        };

        for r in [15_000.0, 20_000.0, 64_000.0, 480_000.0, 5_000_000.0, 8e6] {
            assert_eq!(compute_index(r, DEFAULTS), compute_index(r, swapped));
        }
    }

    #[test]
    fn disconnected_probe_reads_zero_whatever_the_calibration() {
        let limits = Limits {
            dry: 5e9,
            wet: 2e9,
        };

        assert_eq!(compute_index(1e9, limits), 0.0);
        assert_eq!(compute_index(1.5e8, DEFAULTS), 0.0);
    }

    #[test]
    fn degenerate_calibration_reads_zero() {
        let limits = Limits {
            dry: 50_000.0,
            wet: 50_000.0,
        };

        assert_eq!(compute_index(10_000.0, limits), 0.0);
        assert_eq!(compute_index(50_000.0, limits), 0.0);
    }

    #[test]
    fn outside_range_saturates() {
        assert_eq!(compute_index(1_000.0, DEFAULTS), 100.0);
        assert_eq!(compute_index(9e7, DEFAULTS), 0.0);
    }
}
