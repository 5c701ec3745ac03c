// Fixed output precision so identical data always yields identical reports.

pub const PERCENT_DECIMALS: i32 = 1;
pub const HOURS_DECIMALS: i32 = 1;
pub const RATING_DECIMALS: i32 = 2;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn round_hours(value: f64) -> f64 {
    round_to(value, HOURS_DECIMALS)
}

pub fn round_rating(value: f64) -> f64 {
    round_to(value, RATING_DECIMALS)
}

/// `part / whole * 100` at one decimal; zero when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, PERCENT_DECIMALS)
}

/// Unrounded arithmetic mean; zero for an empty set.
pub fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_guards_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn percentage_stays_in_bounds() {
        for whole in 0..40u64 {
            for part in 0..=whole {
                let p = percentage(part, whole);
                assert!((0.0..=100.0).contains(&p), "{part}/{whole} -> {p}");
            }
        }
    }

    #[test]
    fn rounding_precision() {
        assert_eq!(round_rating(4.0 / 3.0), 1.33);
        assert_eq!(round_hours(10.04), 10.0);
        assert_eq!(round_to(f64::NAN, 2), 0.0);
        assert_eq!(mean(9.0, 0), 0.0);
    }
}
