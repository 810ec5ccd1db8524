//! Monthly reference evapotranspiration and the standardized
//! precipitation-evapotranspiration index.

use crate::common::constants::{
    DEFAULT_SPEI_SCALE_MONTHS, EXTRATERRESTRIAL_RADIATION_SCALE, HARGREAVES_COEFFICIENT,
    HARGREAVES_TEMPERATURE_OFFSET_C, RADIATION_TO_EVAPORATION,
};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::gamma::gamma;

const MIN_FIT_SAMPLES: usize = 3;
const PROBABILITY_FLOOR: f64 = 1.0e-6;

/// Representative day of year for a calendar month.
pub fn mid_month_day_of_year(month: u32) -> f64 {
    (30.5 * f64::from(month) - 14.6).trunc()
}

/// Extraterrestrial radiation (MJ m-2 day-1) at the middle of `month`.
pub fn extraterrestrial_radiation(latitude_deg: f64, month: u32) -> f64 {
    let day = mid_month_day_of_year(month);
    let latitude = latitude_deg.to_radians();
    let declination = 0.409 * (0.0172 * day - 1.39).sin();
    let inverse_distance = 1.0 + 0.033 * (0.0172 * day).cos();
    let sunset_angle = (-latitude.tan() * declination.tan()).clamp(-1.0, 1.0).acos();

    let radiation = EXTRATERRESTRIAL_RADIATION_SCALE
        * inverse_distance
        * (sunset_angle * latitude.sin() * declination.sin()
            + latitude.cos() * declination.cos() * sunset_angle.sin());
    radiation.max(0.0)
}

/// Hargreaves PET summed over a month (mm). Never negative.
pub fn hargreaves_monthly_pet(
    t_mean: f64,
    t_min: f64,
    t_max: f64,
    latitude_deg: f64,
    month: u32,
    days: u32,
) -> f64 {
    let range = (t_max - t_min).max(0.0);
    let daily = HARGREAVES_COEFFICIENT
        * RADIATION_TO_EVAPORATION
        * extraterrestrial_radiation(latitude_deg, month)
        * (t_mean + HARGREAVES_TEMPERATURE_OFFSET_C)
        * range.sqrt();
    (daily * f64::from(days)).max(0.0)
}

/// Trailing sums over `window` consecutive entries. A sum is missing until
/// the window is full and whenever any entry inside it is missing.
pub fn accumulate(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                return None;
            }
            values[end + 1 - window..=end]
                .iter()
                .copied()
                .sum::<Option<f64>>()
        })
        .collect()
}

pub trait SpeiEstimator {
    /// `balance` is a run of consecutive months, each tagged with its
    /// calendar month (1..=12). Returns one index per input month.
    fn standardize(&self, balance: &[(u32, Option<f64>)]) -> Vec<Option<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLogistic {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl LogLogistic {
    /// Fits the three-parameter distribution from unbiased probability
    /// weighted moments. The shape is the inverse L-skewness, so negatively
    /// skewed samples yield an upper-bounded fit with `beta < 0`. `None` when
    /// the sample is too small or `|beta| <= 1`.
    pub fn fit(sample: &[f64]) -> Option<Self> {
        let n = sample.len();
        if n < MIN_FIT_SAMPLES {
            return None;
        }
        let mut sorted = sample.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = n as f64;
        let mut moments = [0.0; 3];
        for (rank, value) in sorted.iter().enumerate() {
            let above = (n - 1 - rank) as f64;
            moments[0] += value;
            moments[1] += value * above / (count - 1.0);
            moments[2] += value * above * (above - 1.0) / ((count - 1.0) * (count - 2.0));
        }
        let [w0, w1, w2] = moments.map(|moment| moment / count);

        let beta = (2.0 * w1 - w0) / (6.0 * w1 - w0 - 6.0 * w2);
        if !beta.is_finite() || beta.abs() <= 1.0 {
            return None;
        }
        let gamma_product = gamma(1.0 + 1.0 / beta) * gamma(1.0 - 1.0 / beta);
        let alpha = (w0 - 2.0 * w1) * beta / gamma_product;
        let location = w0 - alpha * gamma_product;
        (alpha.is_finite() && alpha != 0.0 && location.is_finite()).then_some(Self {
            alpha,
            beta,
            gamma: location,
        })
    }

    pub fn cdf(&self, value: f64) -> f64 {
        let ratio = self.alpha / (value - self.gamma);
        if !(ratio.is_finite() && ratio > 0.0) {
            // outside the support: below a lower bound or above an upper one
            return if self.beta > 0.0 { 0.0 } else { 1.0 };
        }
        1.0 / (1.0 + ratio.powf(self.beta))
    }
}

/// Log-logistic SPEI fitted separately for each calendar month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLogisticSpei {
    pub scale_months: usize,
}

impl Default for LogLogisticSpei {
    fn default() -> Self {
        Self {
            scale_months: DEFAULT_SPEI_SCALE_MONTHS,
        }
    }
}

impl SpeiEstimator for LogLogisticSpei {
    fn standardize(&self, balance: &[(u32, Option<f64>)]) -> Vec<Option<f64>> {
        let values: Vec<Option<f64>> = balance.iter().map(|(_, value)| *value).collect();
        let accumulated = accumulate(&values, self.scale_months);
        let normal = Normal::standard();
        let mut index = vec![None; balance.len()];

        for month in 1..=12 {
            let positions: Vec<usize> = balance
                .iter()
                .enumerate()
                .filter(|(position, (calendar, _))| {
                    *calendar == month && accumulated[*position].is_some()
                })
                .map(|(position, _)| position)
                .collect();
            let sample: Vec<f64> = positions
                .iter()
                .filter_map(|position| accumulated[*position])
                .collect();

            let Some(distribution) = LogLogistic::fit(&sample) else {
                if !sample.is_empty() {
                    tracing::debug!(month, samples = sample.len(), "log-logistic fit undefined");
                }
                continue;
            };

            for position in positions {
                index[position] = accumulated[position].map(|value| {
                    let probability = distribution
                        .cdf(value)
                        .clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
                    normal.inverse_cdf(probability)
                });
            }
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use super::{
        LogLogistic, LogLogisticSpei, SpeiEstimator, accumulate, extraterrestrial_radiation,
        hargreaves_monthly_pet, mid_month_day_of_year,
    };
    use crate::numerics::{mean, sample_variance};
    use statrs::distribution::{ContinuousCDF, Normal};

    fn pseudo_random(count: usize) -> Vec<f64> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                (state >> 11) as f64 / (1_u64 << 53) as f64
            })
            .collect()
    }

    #[test]
    fn mid_month_days_follow_the_fixed_rule() {
        assert_eq!(mid_month_day_of_year(1), 15.0);
        assert_eq!(mid_month_day_of_year(6), 168.0);
        assert_eq!(mid_month_day_of_year(12), 351.0);
    }

    #[test]
    fn radiation_is_seasonal_and_vanishes_in_polar_night() {
        let june = extraterrestrial_radiation(60.0, 6);
        let december = extraterrestrial_radiation(60.0, 12);
        assert!(june > 38.0 && june < 44.0, "june {june}");
        assert!(december < 3.0, "december {december}");
        assert_eq!(extraterrestrial_radiation(75.0, 12), 0.0);
    }

    #[test]
    fn hargreaves_pet_is_never_negative() {
        let summer = hargreaves_monthly_pet(15.0, 8.0, 22.0, 62.0, 7, 31);
        assert!(summer > 50.0 && summer < 200.0, "july pet {summer}");
        assert_eq!(hargreaves_monthly_pet(-25.0, -30.0, -20.0, 62.0, 1, 31), 0.0);
        assert_eq!(hargreaves_monthly_pet(5.0, 6.0, 4.0, 62.0, 5, 31), 0.0);
    }

    #[test]
    fn accumulate_requires_full_windows() {
        let sums = accumulate(&[Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)], 2);
        assert_eq!(sums, vec![None, Some(3.0), Some(5.0), None, None]);
        assert_eq!(accumulate(&[Some(1.0)], 0), vec![None]);
    }

    #[test]
    fn log_logistic_fit_centres_the_sample() {
        let sample: Vec<f64> = pseudo_random(200).iter().map(|u| 40.0 * u - 10.0).collect();
        let distribution = LogLogistic::fit(&sample).expect("fit should succeed");
        let mut sorted = sample.clone();
        sorted.sort_by(f64::total_cmp);
        let median = sorted[100];
        let probability = distribution.cdf(median);
        assert!((probability - 0.5).abs() < 0.1, "cdf at median {probability}");
        assert_eq!(LogLogistic::fit(&[1.0, 2.0]), None);
    }

    #[test]
    fn standard_normal_deviates_match_tabulated_values() {
        let normal = Normal::standard();
        assert!((normal.inverse_cdf(0.975) - 1.959_963_985).abs() < 1.0e-6);
        assert!((normal.inverse_cdf(0.9) - 1.281_551_566).abs() < 1.0e-6);
        assert!(normal.inverse_cdf(0.5).abs() < 1.0e-9);
        assert!((normal.inverse_cdf(0.025) + normal.inverse_cdf(0.975)).abs() < 1.0e-9);
    }

    #[test]
    fn clamped_tails_stay_finite() {
        // Extreme sums are clamped to the probability floor.
        let balance: Vec<(u32, Option<f64>)> = (0..24)
            .map(|position| (position % 12 + 1, Some(f64::from(position) * 3.0)))
            .chain([(1, Some(1.0e9)), (2, Some(-1.0e9))])
            .collect();
        let index = LogLogisticSpei { scale_months: 1 }.standardize(&balance);
        assert!(index.iter().flatten().all(|value| value.is_finite()));
        assert!(index.iter().flatten().all(|value| value.abs() <= 4.8));
    }

    #[test]
    fn spei_is_roughly_standard_normal() {
        let noise = pseudo_random(40 * 12);
        let balance: Vec<(u32, Option<f64>)> = noise
            .iter()
            .enumerate()
            .map(|(position, u)| {
                let month = (position % 12) as u32 + 1;
                let seasonal = 20.0 * (f64::from(month) * 0.52).sin();
                (month, Some(seasonal + 60.0 * (u - 0.5)))
            })
            .collect();

        let index = LogLogisticSpei::default().standardize(&balance);
        assert_eq!(index.len(), balance.len());
        assert!(index[..5].iter().all(Option::is_none));

        let values: Vec<f64> = index.iter().flatten().copied().collect();
        assert!(values.len() > 400);
        let centre = mean(&values).expect("mean");
        let spread = sample_variance(&values).expect("variance").sqrt();
        assert!(centre.abs() < 0.25, "mean {centre}");
        assert!((spread - 1.0).abs() < 0.25, "sd {spread}");
    }
}
