//! Easing curves and small interpolation helpers

/// Standard "bounce out" curve: overshoots are folded back as decaying bounces
///
/// Input is clamped to [0, 1]; output stays in [0, 1] with f(0) = 0 and f(1) = 1.
pub fn ease_out_bounce(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;

    let t = t.clamp(0.0, 1.0);
    let v = if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984375
    };
    v.min(1.0)
}

pub fn ease_in_cubic(t: f32) -> f32 {
    t * t * t
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let u = t - 1.0;
    u * u * u + 1.0
}

/// Map `value` from `[in_start, in_stop]` onto `[out_start, out_stop]` (no clamping)
pub fn valmap(value: f32, in_start: f32, in_stop: f32, out_start: f32, out_stop: f32) -> f32 {
    out_start + (out_stop - out_start) * ((value - in_start) / (in_stop - in_start))
}

/// Alpha of a label blinking with the given period
///
/// `phase` runs from 0 to `interval`. The second half fades in with `fade_in`,
/// the first half fades out with `fade_out`.
pub fn blink(phase: f32, fade_in: fn(f32) -> f32, fade_out: fn(f32) -> f32, interval: f32) -> u8 {
    let half = interval / 2.0;
    let alpha = if phase > half {
        fade_in(valmap(phase, half, interval, 0.0, 1.0))
    } else {
        fade_out(valmap(phase, 0.0, half, 1.0, 0.0))
    };
    (alpha.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bounce_endpoints() {
        assert_eq!(ease_out_bounce(0.0), 0.0);
        assert!((ease_out_bounce(1.0) - 1.0).abs() < 1e-6);
        // Out-of-range input is clamped
        assert_eq!(ease_out_bounce(-3.0), 0.0);
        assert!((ease_out_bounce(7.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounce_touches_one_at_each_bounce() {
        assert!((ease_out_bounce(1.0 / 2.75) - 1.0).abs() < 1e-5);
        assert!((ease_out_bounce(1.5 / 2.75) - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_cubics() {
        assert_eq!(ease_in_cubic(0.5), 0.125);
        assert_eq!(ease_out_cubic(0.5), 0.875);
        assert_eq!(ease_out_cubic(1.0), 1.0);
    }

    #[test]
    fn test_valmap_inverts_ranges() {
        assert_eq!(valmap(0.25, 0.0, 0.5, 1.0, 0.0), 0.5);
        assert_eq!(valmap(5.0, 0.0, 10.0, 100.0, 200.0), 150.0);
    }

    #[test]
    fn test_blink_cycle() {
        // Fully visible at both ends of the period, dark in the middle
        assert_eq!(blink(0.0, ease_in_cubic, ease_out_cubic, 0.5), 255);
        assert_eq!(blink(0.5, ease_in_cubic, ease_out_cubic, 0.5), 255);
        assert_eq!(blink(0.25, ease_in_cubic, ease_out_cubic, 0.5), 0);
    }

    proptest! {
        #[test]
        fn test_bounce_stays_in_unit_range(t in -1.0f32..2.0) {
            let v = ease_out_bounce(t);
            prop_assert!((0.0..=1.0).contains(&v), "f({t}) = {v}");
        }

        #[test]
        fn test_bounce_rises_within_first_arc(a in 0.0f32..0.36, b in 0.0f32..0.36) {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(ease_out_bounce(lo) <= ease_out_bounce(hi));
        }
    }
}
