use crate::domain::Series;
use crate::numerics::mean;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResilienceComponents {
    /// `value(Y) / mean(pre)`
    pub resistance: Option<f64>,
    /// `mean(post) / value(Y)`
    pub recovery: Option<f64>,
    /// `mean(post) / mean(pre)`
    pub resilience: Option<f64>,
}

fn window_mean(series: &Series, from_year: i32, to_year: i32) -> Option<f64> {
    let values: Vec<f64> = (from_year..=to_year)
        .filter_map(|year| series.get(year))
        .collect();
    mean(&values)
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let value = numerator? / denominator?;
    value.is_finite().then_some(value)
}

/// Lloret-style components around a disturbance year with `pre_years`
/// before and `post_years` after it.
pub fn resilience_components(
    series: &Series,
    disturbance_year: i32,
    pre_years: u32,
    post_years: u32,
) -> ResilienceComponents {
    let pre_years = pre_years.max(1) as i32;
    let post_years = post_years.max(1) as i32;

    let pre = window_mean(series, disturbance_year - pre_years, disturbance_year - 1);
    let post = window_mean(series, disturbance_year + 1, disturbance_year + post_years);
    let during = series.get(disturbance_year);

    ResilienceComponents {
        resistance: ratio(during, pre),
        recovery: ratio(post, during),
        resilience: ratio(post, pre),
    }
}

#[cfg(test)]
mod tests {
    use super::resilience_components;
    use crate::domain::Series;

    #[test]
    fn components_use_the_configured_windows() {
        let series = Series::from_values(
            1990,
            &[9.0, 2.0, 2.0, 2.0, 2.0, 1.0, 1.5, 2.5, 9.0],
        );
        let components = resilience_components(&series, 1995, 4, 2);

        assert_eq!(components.resistance, Some(0.5));
        assert_eq!(components.recovery, Some(2.0));
        assert_eq!(components.resilience, Some(1.0));
    }

    #[test]
    fn resistance_times_recovery_is_resilience() {
        let series = Series::from_values(2000, &[1.3, 1.1, 0.9, 1.2, 0.6, 0.8, 1.4]);
        let components = resilience_components(&series, 2004, 4, 2);

        let resistance = components.resistance.expect("resistance");
        let recovery = components.recovery.expect("recovery");
        let resilience = components.resilience.expect("resilience");
        assert!((resistance * recovery - resilience).abs() < 1.0e-12);
    }

    #[test]
    fn missing_disturbance_value_leaves_only_resilience() {
        let series = Series::new(2000, vec![Some(1.0), Some(1.0), None, Some(2.0)]);
        let components = resilience_components(&series, 2002, 4, 2);
        assert_eq!(components.resistance, None);
        assert_eq!(components.recovery, None);
        assert_eq!(components.resilience, Some(2.0));
    }

    #[test]
    fn zero_baseline_yields_missing_ratios() {
        let series = Series::from_values(2000, &[0.0, 0.0, 1.0, 1.0]);
        let components = resilience_components(&series, 2002, 2, 1);
        assert_eq!(components.resistance, None);
        assert_eq!(components.resilience, None);
        assert_eq!(components.recovery, Some(1.0));
    }
}
