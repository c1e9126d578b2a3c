//! Lognormal recruitment deviations.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProjectionError, Result};
use crate::projection::RecruitmentDeviations;
use crate::rng::RngManager;

/// Variability of recruitment around the stock-recruit curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationSettings {
    /// Standard deviation of log recruitment deviations.
    pub sigma: f64,
    /// Lag-one autocorrelation of log deviations.
    #[serde(default)]
    pub autocorrelation: f64,
}

impl DeviationSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(ProjectionError::InvalidInput(format!(
                "recruitment sigma {} must be finite and nonnegative",
                self.sigma
            )));
        }
        if !(-1.0 < self.autocorrelation && self.autocorrelation < 1.0) {
            return Err(ProjectionError::InvalidInput(format!(
                "recruitment autocorrelation {} must lie in (-1, 1)",
                self.autocorrelation
            )));
        }
        Ok(())
    }
}

/// Draws `len` bias-corrected lognormal deviations for one replicate.
pub fn generate(
    settings: DeviationSettings,
    rng: &RngManager,
    replicate: u64,
    len: usize,
) -> Result<RecruitmentDeviations> {
    settings.validate()?;
    if settings.sigma == 0.0 {
        return Ok(RecruitmentDeviations::ones(len));
    }

    debug!(
        seed = rng.master_seed(),
        replicate,
        len,
        sigma = settings.sigma,
        "drawing recruitment deviations"
    );
    let mut stream = rng.stream("recruitment", replicate);
    let rho = settings.autocorrelation;
    let innovation_scale = (1.0 - rho * rho).sqrt();
    let bias = settings.sigma * settings.sigma / 2.0;

    let mut previous = 0.0;
    let mut values = Vec::with_capacity(len);
    for step in 0..len {
        let z: f64 = stream.sample(StandardNormal);
        let eps = if step == 0 {
            z * settings.sigma
        } else {
            rho * previous + innovation_scale * z * settings.sigma
        };
        previous = eps;
        values.push((eps - bias).exp());
    }
    Ok(RecruitmentDeviations::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sigma_gives_ones() {
        let settings = DeviationSettings {
            sigma: 0.0,
            autocorrelation: 0.0,
        };
        let devs = generate(settings, &RngManager::new(1), 0, 12).unwrap();
        assert_eq!(devs, RecruitmentDeviations::ones(12));
    }

    #[test]
    fn test_same_seed_same_series() {
        let settings = DeviationSettings {
            sigma: 0.6,
            autocorrelation: 0.4,
        };
        let a = generate(settings, &RngManager::new(11), 3, 40).unwrap();
        let b = generate(settings, &RngManager::new(11), 3, 40).unwrap();
        let c = generate(settings, &RngManager::new(11), 4, 40).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.values().iter().all(|d| *d > 0.0 && d.is_finite()));
    }

    #[test]
    fn test_bias_correction_centres_mean_near_one() {
        let settings = DeviationSettings {
            sigma: 0.3,
            autocorrelation: 0.0,
        };
        let devs = generate(settings, &RngManager::new(5), 0, 20_000).unwrap();
        let mean = devs.values().iter().sum::<f64>() / devs.len() as f64;
        assert!((mean - 1.0).abs() < 0.02, "mean deviation {mean}");
    }

    #[test]
    fn test_invalid_settings() {
        let negative = DeviationSettings {
            sigma: -0.1,
            autocorrelation: 0.0,
        };
        assert!(generate(negative, &RngManager::default(), 0, 3).is_err());

        let unit_root = DeviationSettings {
            sigma: 0.2,
            autocorrelation: 1.0,
        };
        assert!(generate(unit_root, &RngManager::default(), 0, 3).is_err());
    }
}
