//! Fishing control modes, spatial effort allocation and closures.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ProjectionError, Result};

/// How fishing mortality is derived each year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FishingControl {
    /// Effort in each projection year scaled by catchability.
    Effort { effort: Vec<f64>, catchability: f64 },
    /// A fixed apical fishing mortality.
    ApicalF { apical_f: f64 },
    /// No fishing; stock-recruit parameters track a rescaled unfished reference.
    UnfishedReference {
        /// Total unfished spawning biomass across areas.
        ssb0: f64,
        /// Total unfished recruitment across areas.
        r0_total: f64,
        /// Spawning biomass per recruit by area.
        ssbpr: Vec<f64>,
    },
}

impl FishingControl {
    /// Apical fishing intensity for `year` before spatial allocation, if the mode fishes.
    pub fn intensity(&self, year: usize) -> Result<Option<f64>> {
        match self {
            FishingControl::Effort {
                effort,
                catchability,
            } => match effort.get(year) {
                Some(effort) => Ok(Some(effort * catchability)),
                None => Err(ProjectionError::ShapeMismatch {
                    what: "effort series",
                    expected: format!("a value for year {year}"),
                    found: format!("{} years", effort.len()),
                }),
            },
            FishingControl::ApicalF { apical_f } => Ok(Some(*apical_f)),
            FishingControl::UnfishedReference { .. } => Ok(None),
        }
    }
}

/// What happens when no effort can be placed in any open area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullClosurePolicy {
    /// The year is projected without fishing mortality.
    #[default]
    ZeroFishing,
    /// The projection stops with `DegenerateEffortAllocation`.
    Fail,
}

/// Fraction of each area closed to fishing, by year. Zero is fully open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureSchedule {
    years: usize,
    areas: usize,
    closed: Vec<f64>,
}

impl ClosureSchedule {
    pub fn open(years: usize, areas: usize) -> Self {
        Self {
            years,
            areas,
            closed: vec![0.0; years * areas],
        }
    }

    /// Rows are years, columns are areas.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let years = rows.len();
        let areas = rows.first().map(Vec::len).unwrap_or(0);
        let mut closed = Vec::with_capacity(years * areas);
        for (year, row) in rows.into_iter().enumerate() {
            if row.len() != areas {
                return Err(ProjectionError::ShapeMismatch {
                    what: "closure schedule row",
                    expected: format!("{areas} areas"),
                    found: format!("{} areas in year {year}", row.len()),
                });
            }
            for (area, &fraction) in row.iter().enumerate() {
                check_fraction(year, area, fraction)?;
            }
            closed.extend(row);
        }
        Ok(Self {
            years,
            areas,
            closed,
        })
    }

    /// Closes `fraction` of `area` from `from_year` onwards.
    pub fn close(&mut self, area: usize, from_year: usize, fraction: f64) -> Result<()> {
        if area >= self.areas {
            return Err(ProjectionError::InvalidInput(format!(
                "closure names area {area}, only {} areas exist",
                self.areas
            )));
        }
        check_fraction(from_year, area, fraction)?;
        for year in from_year..self.years {
            self.closed[year * self.areas + area] = fraction;
        }
        Ok(())
    }

    pub fn years(&self) -> usize {
        self.years
    }

    pub fn areas(&self) -> usize {
        self.areas
    }

    /// Checks the stored fractions cover the declared shape and lie in [0, 1].
    pub fn validate(&self) -> Result<()> {
        if self.closed.len() != self.years * self.areas {
            return Err(ProjectionError::ShapeMismatch {
                what: "closure schedule",
                expected: format!(
                    "{} fractions for {} years x {} areas",
                    self.years * self.areas,
                    self.years,
                    self.areas
                ),
                found: format!("{} fractions", self.closed.len()),
            });
        }
        for (cell, &fraction) in self.closed.iter().enumerate() {
            check_fraction(cell / self.areas, cell % self.areas, fraction)?;
        }
        Ok(())
    }

    pub fn closed_fraction(&self, year: usize, area: usize) -> f64 {
        assert!(
            year < self.years && area < self.areas,
            "closure index (year {year}, area {area}) outside {}x{} schedule",
            self.years,
            self.areas
        );
        self.closed[year * self.areas + area]
    }

    pub fn open_fraction(&self, year: usize, area: usize) -> f64 {
        1.0 - self.closed_fraction(year, area)
    }
}

fn check_fraction(year: usize, area: usize, fraction: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(ProjectionError::InvalidInput(format!(
            "closure fraction {fraction} for year {year}, area {area} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// Share of effort per area proportional to vulnerable biomass raised to `targeting`.
///
/// Returns `None` when the normalizing sum is zero or not finite.
pub fn distribute(vulnerable_biomass: &[f64], targeting: f64) -> Option<Vec<f64>> {
    let weights: Vec<f64> = vulnerable_biomass
        .iter()
        .map(|vb| vb.powf(targeting))
        .collect();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    Some(weights.into_iter().map(|w| w / total).collect())
}

/// Masks a distribution by open fractions and hands closed-area effort to open areas.
///
/// Returns `None` when nothing is left open (`fracE == 0`).
pub fn reallocate(distribution: &[f64], open: &[f64]) -> Option<Vec<f64>> {
    let masked: Vec<f64> = distribution
        .iter()
        .zip(open)
        .map(|(share, open)| share * open)
        .collect();
    let frac_e: f64 = masked.iter().sum();
    if !(frac_e > 0.0) {
        return None;
    }
    Some(
        masked
            .into_iter()
            .map(|share| share * (frac_e + (1.0 - frac_e)) / frac_e)
            .collect(),
    )
}

/// Per-area effort shares for `year`, applying closures from `closure_year` if given.
pub(crate) fn allocate(
    year: usize,
    vulnerable_biomass: &[f64],
    targeting: f64,
    closures: Option<(&ClosureSchedule, usize)>,
    policy: FullClosurePolicy,
) -> Result<Vec<f64>> {
    let shares = distribute(vulnerable_biomass, targeting).and_then(|distribution| {
        match closures {
            Some((schedule, closure_year)) => {
                let open: Vec<f64> = (0..distribution.len())
                    .map(|area| schedule.open_fraction(closure_year, area))
                    .collect();
                reallocate(&distribution, &open)
            }
            None => Some(distribution),
        }
    });
    match (shares, policy) {
        (Some(shares), _) => Ok(shares),
        (None, FullClosurePolicy::ZeroFishing) => {
            warn!(year, "no open area holds vulnerable biomass; fishing suspended");
            Ok(vec![0.0; vulnerable_biomass.len()])
        }
        (None, FullClosurePolicy::Fail) => {
            Err(ProjectionError::DegenerateEffortAllocation { year })
        }
    }
}
