//! Display oracles
//!
//! The dashboard colours a price cell by where the price sits between a low
//! and a high threshold, and renders ratios as `N.NNx`. These functions
//! compute what the page is expected to show for a given fixture.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of gradient classes the dashboard styles (`gradient-1` .. `gradient-10`).
pub const GRADIENT_STEPS: u8 = 10;

/// Low/high price thresholds for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Thresholds {
    /// Build a threshold pair. Returns `None` unless both bounds are finite
    /// and `high > low`; the dashboard applies no colouring in that case.
    pub fn new(low: f64, high: f64) -> Option<Self> {
        if low.is_finite() && high.is_finite() && high > low {
            Some(Self { low, high })
        } else {
            None
        }
    }

    fn span(&self) -> f64 {
        self.high - self.low
    }
}

/// Gradient bucket a value falls into, 1 (at or below low) to 10 (at or above high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GradientBucket(u8);

impl GradientBucket {
    pub const LOWEST: GradientBucket = GradientBucket(1);
    pub const HIGHEST: GradientBucket = GradientBucket(GRADIENT_STEPS);

    pub fn index(&self) -> u8 {
        self.0
    }

    /// CSS class carried by the cell, e.g. `gradient-2`.
    pub fn class_name(&self) -> String {
        format!("gradient-{}", self.0)
    }
}

impl fmt::Display for GradientBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gradient-{}", self.0)
    }
}

/// Bucket for `value` under `thresholds`.
///
/// Values at or below `low` land in the lowest bucket, values at or above
/// `high` in the highest. Everything strictly between is spread over the
/// eight intermediate buckets by `ceil(8 * fraction) + 1`.
pub fn gradient_bucket(value: f64, thresholds: &Thresholds) -> Option<GradientBucket> {
    if value.is_nan() {
        return None;
    }
    if value <= thresholds.low {
        return Some(GradientBucket::LOWEST);
    }
    if value >= thresholds.high {
        return Some(GradientBucket::HIGHEST);
    }

    let intermediate = f64::from(GRADIENT_STEPS - 2);
    let fraction = (value - thresholds.low) / thresholds.span();
    let index = (fraction * intermediate).ceil() + 1.0;
    // Strictly between the bounds is never the first or last bucket.
    let index = index.clamp(2.0, f64::from(GRADIENT_STEPS - 1)) as u8;
    Some(GradientBucket(index))
}

/// Position of `value` between the thresholds, only when it lies within them.
pub fn risk_level(value: f64, thresholds: &Thresholds) -> Option<f64> {
    let fraction = (value - thresholds.low) / thresholds.span();
    (0.0..=1.0).contains(&fraction).then_some(fraction)
}

/// Risk level as rendered on an asset card: three decimals, or `N/A`.
pub fn format_risk_level(level: Option<f64>) -> String {
    match level {
        Some(level) => format!("{:.3}", level),
        None => "N/A".to_string(),
    }
}

/// Ratio of the potential high to the current price.
pub fn multiplier(current: f64, potential_high: f64) -> Option<f64> {
    if current.is_finite() && potential_high.is_finite() && current > 0.0 {
        Some(potential_high / current)
    } else {
        None
    }
}

/// `2.22` -> `"2.22x"`, `10.0` -> `"10.00x"`.
pub fn format_multiplier(ratio: f64) -> String {
    format!("{:.2}x", ratio)
}

/// Potential upside as a whole percentage, e.g. `"200%"`.
pub fn format_upside(current: f64, potential_high: f64) -> Option<String> {
    multiplier(current, potential_high).map(|ratio| format!("{:.0}%", (ratio - 1.0) * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn thresholds(low: f64, high: f64) -> Thresholds {
        Thresholds::new(low, high).unwrap()
    }

    #[test_case(0.001, 0.1, 1.0 => 1; "below default low threshold")]
    #[test_case(0.001, 0.0005, 1.0 => 2; "just above lowered low threshold")]
    #[test_case(0.1, 0.1, 1.0 => 1; "equal to low")]
    #[test_case(1.0, 0.1, 1.0 => 10; "equal to high")]
    #[test_case(5.0, 0.1, 1.0 => 10; "above high")]
    #[test_case(0.5, 0.0, 8.0 => 2; "first intermediate bucket")]
    #[test_case(4.0, 0.0, 8.0 => 5; "midpoint")]
    #[test_case(4.5, 0.0, 8.0 => 6; "just past midpoint")]
    #[test_case(7.9, 0.0, 8.0 => 9; "last intermediate bucket")]
    fn test_gradient_bucket(value: f64, low: f64, high: f64) -> u8 {
        gradient_bucket(value, &thresholds(low, high)).unwrap().index()
    }

    #[test]
    fn test_lowering_thresholds_moves_bucket() {
        let before = gradient_bucket(0.001, &thresholds(0.1, 1.0)).unwrap();
        let after = gradient_bucket(0.001, &thresholds(0.0005, 1.0)).unwrap();

        assert_eq!(before.class_name(), "gradient-1");
        assert_eq!(after.class_name(), "gradient-2");
        assert!(after > before);
    }

    #[test]
    fn test_nan_has_no_bucket() {
        assert_eq!(gradient_bucket(f64::NAN, &thresholds(0.1, 1.0)), None);
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(Thresholds::new(1.0, 1.0).is_none());
        assert!(Thresholds::new(2.0, 1.0).is_none());
        assert!(Thresholds::new(f64::NAN, 1.0).is_none());
        assert!(Thresholds::new(0.0, f64::INFINITY).is_none());
    }

    #[test_case(2.22 => "2.22x")]
    #[test_case(10.0 => "10.00x")]
    #[test_case(0.5 => "0.50x")]
    fn test_format_multiplier(ratio: f64) -> String {
        format_multiplier(ratio)
    }

    #[test]
    fn test_multiplier_from_prices() {
        let ratio = multiplier(0.45, 1.0).unwrap();
        assert_eq!(format_multiplier(ratio), "2.22x");

        assert_eq!(multiplier(0.0, 1.0), None);
        assert_eq!(multiplier(-1.0, 1.0), None);
        assert_eq!(multiplier(f64::NAN, 1.0), None);
    }

    #[test]
    fn test_format_upside() {
        assert_eq!(format_upside(1.0, 3.0).as_deref(), Some("200%"));
        assert_eq!(format_upside(0.45, 1.0).as_deref(), Some("122%"));
        assert_eq!(format_upside(0.0, 3.0), None);
    }

    #[test]
    fn test_risk_level() {
        let t = thresholds(0.0, 8.0);
        assert_eq!(format_risk_level(risk_level(4.0, &t)), "0.500");
        assert_eq!(format_risk_level(risk_level(8.0, &t)), "1.000");
        assert_eq!(format_risk_level(risk_level(9.0, &t)), "N/A");
        assert_eq!(format_risk_level(risk_level(-0.1, &t)), "N/A");
    }
}
