//! Stock-recruitment relationships.

use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};

/// Per-area stock-recruit parameters, tagged by relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "relationship", rename_all = "snake_case")]
pub enum StockRecruit {
    BevertonHolt { r0: Vec<f64>, ssbpr: Vec<f64> },
    Ricker { alpha: Vec<f64>, beta: Vec<f64> },
}

impl StockRecruit {
    pub fn areas(&self) -> usize {
        match self {
            StockRecruit::BevertonHolt { r0, .. } => r0.len(),
            StockRecruit::Ricker { alpha, .. } => alpha.len(),
        }
    }

    pub fn validate(&self, areas: usize) -> Result<()> {
        let (first, second, names) = match self {
            StockRecruit::BevertonHolt { r0, ssbpr } => (r0, ssbpr, ("r0", "ssbpr")),
            StockRecruit::Ricker { alpha, beta } => (alpha, beta, ("alpha", "beta")),
        };
        for (values, name) in [(first, names.0), (second, names.1)] {
            if values.len() != areas {
                return Err(ProjectionError::ShapeMismatch {
                    what: "stock-recruit parameters",
                    expected: format!("{areas} areas"),
                    found: format!("{} values for {name}", values.len()),
                });
            }
            if let Some((area, value)) = values
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
            {
                return Err(ProjectionError::DegenerateRecruitment {
                    area,
                    reason: format!("{name} is {value}"),
                });
            }
        }
        Ok(())
    }

    /// Predicted recruitment in `area` before the deviation is applied.
    pub fn recruits(&self, area: usize, ssb: f64, steepness: f64) -> Result<f64> {
        if !ssb.is_finite() || ssb < 0.0 {
            return Err(ProjectionError::DegenerateRecruitment {
                area,
                reason: format!("spawning biomass is {ssb}"),
            });
        }
        let recruits = match self {
            StockRecruit::BevertonHolt { r0, ssbpr } => {
                let denominator =
                    ssbpr[area] * r0[area] * (1.0 - steepness) + (5.0 * steepness - 1.0) * ssb;
                if !(denominator > 0.0) {
                    return Err(ProjectionError::DegenerateRecruitment {
                        area,
                        reason: format!("Beverton-Holt denominator is {denominator}"),
                    });
                }
                4.0 * r0[area] * steepness * ssb / denominator
            }
            StockRecruit::Ricker { alpha, beta } => {
                alpha[area] * ssb * (-beta[area] * ssb).exp()
            }
        };
        if !recruits.is_finite() {
            return Err(ProjectionError::DegenerateRecruitment {
                area,
                reason: format!("recruitment evaluates to {recruits}"),
            });
        }
        Ok(recruits)
    }

    /// Ricker parameters that reproduce `steepness` against unfished spawning biomass.
    pub fn ricker_from_unfished(ssb0: &[f64], ssbpr: &[f64], steepness: f64) -> Result<Self> {
        let mut alpha = Vec::with_capacity(ssb0.len());
        let mut beta = Vec::with_capacity(ssb0.len());
        for (area, (&b0, &spr)) in ssb0.iter().zip(ssbpr).enumerate() {
            if !(b0 > 0.0) || !(spr > 0.0) {
                return Err(ProjectionError::DegenerateRecruitment {
                    area,
                    reason: format!("unfished spawning biomass {b0} with spawning per recruit {spr}"),
                });
            }
            let b = (5.0 * steepness).ln() / (0.8 * b0);
            let a = (b * b0).exp() / spr;
            if !a.is_finite() || !b.is_finite() {
                return Err(ProjectionError::DegenerateRecruitment {
                    area,
                    reason: format!("Ricker parameters alpha {a}, beta {b}"),
                });
            }
            alpha.push(a);
            beta.push(b);
        }
        Ok(StockRecruit::Ricker { alpha, beta })
    }

    /// Ricker parameters implied by per-area unfished recruitment and spawning per recruit.
    pub fn ricker_from_r0(r0: &[f64], ssbpr: &[f64], steepness: f64) -> Result<Self> {
        let ssb0: Vec<f64> = r0.iter().zip(ssbpr).map(|(r, s)| r * s).collect();
        Self::ricker_from_unfished(&ssb0, ssbpr, steepness)
    }

    /// Replaces Beverton-Holt unfished recruitment; Ricker parameters are untouched.
    pub(crate) fn set_r0(&mut self, values: &[f64]) {
        if let StockRecruit::BevertonHolt { r0, .. } = self {
            r0.copy_from_slice(values);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bh() -> StockRecruit {
        StockRecruit::BevertonHolt {
            r0: vec![1000.0],
            ssbpr: vec![2.0],
        }
    }

    #[test]
    fn test_bh_returns_r0_at_unfished() {
        let r = bh().recruits(0, 2000.0, 0.7).unwrap();
        assert!((r - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_bh_steepness_at_twenty_percent() {
        let r = bh().recruits(0, 400.0, 0.7).unwrap();
        assert!((r - 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_bh_non_decreasing_in_ssb() {
        for &h in &[0.25, 0.5, 0.75, 0.99] {
            let mut previous = 0.0;
            for step in 0..200 {
                let ssb = step as f64 * 25.0;
                let r = bh().recruits(0, ssb, h).unwrap();
                assert!(r >= previous, "h={h} ssb={ssb}: {r} < {previous}");
                previous = r;
            }
        }
    }

    #[test]
    fn test_bh_degenerate_denominator() {
        let sr = StockRecruit::BevertonHolt {
            r0: vec![1000.0],
            ssbpr: vec![0.0],
        };
        let err = sr.recruits(0, 0.0, 0.7).unwrap_err();
        assert!(matches!(err, ProjectionError::DegenerateRecruitment { area: 0, .. }));
    }

    #[test]
    fn test_negative_ssb_rejected() {
        let err = bh().recruits(0, -1.0, 0.7).unwrap_err();
        assert!(matches!(err, ProjectionError::DegenerateRecruitment { .. }));
    }

    #[test]
    fn test_ricker_single_interior_maximum() {
        let sr = StockRecruit::Ricker {
            alpha: vec![3.0],
            beta: vec![0.002],
        };
        let peak = 1.0 / 0.002;
        let at_peak = sr.recruits(0, peak, 0.7).unwrap();
        let below = sr.recruits(0, peak * 0.5, 0.7).unwrap();
        let above = sr.recruits(0, peak * 1.5, 0.7).unwrap();
        let far = sr.recruits(0, peak * 10.0, 0.7).unwrap();

        assert!(at_peak > below);
        assert!(at_peak > above);
        assert!(far < above);
    }

    #[test]
    fn test_ricker_from_unfished_hits_steepness() {
        let sr = StockRecruit::ricker_from_r0(&[1000.0], &[2.0], 0.8).unwrap();
        let r0 = sr.recruits(0, 2000.0, 0.8).unwrap();
        let r20 = sr.recruits(0, 400.0, 0.8).unwrap();

        assert!((r0 - 1000.0).abs() < 1e-6);
        assert!((r20 / r0 - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_ricker_from_zero_unfished_fails() {
        let err = StockRecruit::ricker_from_unfished(&[10.0, 0.0], &[1.0, 1.0], 0.7).unwrap_err();
        assert!(matches!(err, ProjectionError::DegenerateRecruitment { area: 1, .. }));
    }
}
