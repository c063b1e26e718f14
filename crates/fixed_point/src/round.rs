//! Rounding primitives shared by the rescale paths

/// Arithmetic right shift of a 64-bit accumulator with round-half-to-even.
///
/// Computes `(acc + ((acc >> shift) & 1) + (2^(shift-1) - 1)) >> shift`.
/// The `(acc >> shift) & 1` term pushes exact ties toward the even result.
///
/// `shift` must be in `1..=63`, which [`crate::normalize_scale`] guarantees.
/// The rounding addend saturates at `i64::MAX`, so an accumulator that
/// already sits at the top of the range never flips sign.
#[inline]
pub fn ll_round(acc: i64, shift: u32) -> i64 {
    debug_assert!((1..=63).contains(&shift), "shift {} out of range", shift);
    let parity = (acc >> shift) & 1;
    let bias = (1i64 << (shift - 1)) - 1;
    acc.saturating_add(parity + bias) >> shift
}

/// Round half away from zero (C `round`)
#[inline]
pub fn round_half_away(value: f64) -> f64 {
    value.round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ties_go_to_even() {
        // 6 / 4 = 1.5 -> 2
        assert_eq!(ll_round(6, 2), 2);
        // 2 / 4 = 0.5 -> 0
        assert_eq!(ll_round(2, 2), 0);
        // 10 / 4 = 2.5 -> 2
        assert_eq!(ll_round(10, 2), 2);
        // 14 / 4 = 3.5 -> 4
        assert_eq!(ll_round(14, 2), 4);
    }

    #[test]
    fn test_negative_ties_go_to_even() {
        assert_eq!(ll_round(-6, 2), -2);
        assert_eq!(ll_round(-2, 2), 0);
        assert_eq!(ll_round(-10, 2), -2);
        assert_eq!(ll_round(-14, 2), -4);
    }

    #[test]
    fn test_non_ties_round_to_nearest() {
        // 5 / 4 = 1.25 -> 1, 7 / 4 = 1.75 -> 2
        assert_eq!(ll_round(5, 2), 1);
        assert_eq!(ll_round(7, 2), 2);
        assert_eq!(ll_round(-5, 2), -1);
        assert_eq!(ll_round(-7, 2), -2);
    }

    #[test]
    fn test_halving() {
        assert_eq!(ll_round(100, 1), 50);
        assert_eq!(ll_round(127, 1), 64);
        assert_eq!(ll_round(-128, 1), -64);
        assert_eq!(ll_round(0, 1), 0);
        assert_eq!(ll_round(1, 1), 0);
        assert_eq!(ll_round(3, 1), 2);
    }

    #[test]
    fn test_matches_float_round_half_even() {
        for acc in -4096i64..4096 {
            for shift in 1..8u32 {
                let exact = acc as f64 / (1u64 << shift) as f64;
                let floor = exact.floor();
                let expected = if exact - floor == 0.5 {
                    if floor as i64 % 2 == 0 { floor } else { floor + 1.0 }
                } else {
                    exact.round()
                };
                assert_eq!(ll_round(acc, shift), expected as i64, "acc {} shift {}", acc, shift);
            }
        }
    }

    #[test]
    fn test_range_edges_keep_sign() {
        assert_eq!(ll_round(i64::MAX, 1), i64::MAX >> 1);
        assert_eq!(ll_round(i64::MAX, 63), 0);
        assert_eq!(ll_round(i64::MAX - 1, 2), i64::MAX >> 2);
        assert!(ll_round(i64::MIN, 1) < 0);
        assert_eq!(ll_round(i64::MIN, 63), -1);
    }

    #[test]
    fn test_round_half_away() {
        assert_eq!(round_half_away(2.5), 3.0);
        assert_eq!(round_half_away(-2.5), -3.0);
        assert_eq!(round_half_away(2.4), 2.0);
    }
}
