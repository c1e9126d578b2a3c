use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    deviations::{self, DeviationSettings},
    effort::{ClosureSchedule, FishingControl, FullClosurePolicy},
    error::ProjectionError,
    grid::{AgeByArea, AgeByYear},
    movement::{MovementSchedule, MovementTensor},
    projection::ProjectionInputs,
    recruitment::StockRecruit,
    rng::RngManager,
};

fn default_years() -> usize {
    50
}

fn default_area_size() -> f64 {
    1.0
}

fn default_max_f() -> f64 {
    3.0
}

fn default_spatial_targeting() -> f64 {
    1.0
}

fn default_residency() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_years")]
    pub years: usize,
    #[serde(default)]
    pub plus_group: bool,
    #[serde(default)]
    pub full_closure_policy: FullClosurePolicy,
    pub areas: Vec<ScenarioArea>,
    pub biology: Biology,
    pub fishery: Fishery,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub closures: Vec<ClosureConfig>,
    #[serde(default)]
    pub recruitment: Option<DeviationSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioArea {
    pub name: String,
    #[serde(default = "default_area_size")]
    pub size: f64,
    /// Unfished recruitment produced in this area.
    pub r0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    BevertonHolt,
    Ricker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Biology {
    /// Number of tracked age classes, starting at age 0.
    pub ages: usize,
    pub natural_mortality: f64,
    pub linf: f64,
    pub k: f64,
    #[serde(default)]
    pub t0: f64,
    pub wt_a: f64,
    pub wt_b: f64,
    pub a50: f64,
    pub a95: f64,
    pub steepness: f64,
    pub relationship: Relationship,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logistic {
    pub a50: f64,
    pub a95: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fishery {
    /// Selectivity at age.
    pub selectivity: Logistic,
    /// Retention at age; defaults to the selectivity curve.
    #[serde(default)]
    pub retention: Option<Logistic>,
    #[serde(default = "default_max_f")]
    pub max_f: f64,
    #[serde(default = "default_spatial_targeting")]
    pub spatial_targeting: f64,
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ControlConfig {
    Effort {
        effort: SeriesConfig,
        catchability: f64,
    },
    ApicalF {
        apical_f: f64,
    },
    Unfished,
}

/// A single value repeated every year, or one value per year.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeriesConfig {
    Constant(f64),
    Yearly(Vec<f64>),
}

impl SeriesConfig {
    fn materialize(&self, years: usize) -> Vec<f64> {
        match self {
            SeriesConfig::Constant(value) => vec![*value; years],
            SeriesConfig::Yearly(values) => values.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    /// Fraction staying in its area each year; the rest spreads evenly.
    #[serde(default = "default_residency")]
    pub residency: f64,
    /// Explicit from x to matrix, overriding `residency`.
    #[serde(default)]
    pub matrix: Option<Vec<Vec<f64>>>,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            residency: default_residency(),
            matrix: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClosureConfig {
    pub area: usize,
    pub from_year: usize,
    pub fraction: f64,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn years(&self, override_years: Option<usize>) -> usize {
        override_years.unwrap_or(self.years)
    }

    /// Unfished survivorship at age for one recruit.
    pub fn survivorship(&self) -> Vec<f64> {
        let ages = self.biology.ages;
        let survival = (-self.biology.natural_mortality).exp();
        let mut lx = Vec::with_capacity(ages);
        let mut current = 1.0;
        for _ in 0..ages {
            lx.push(current);
            current *= survival;
        }
        if self.plus_group {
            if let Some(last) = lx.last_mut() {
                *last /= 1.0 - survival;
            }
        }
        lx
    }

    pub fn weight_at_age(&self) -> Vec<f64> {
        let bio = &self.biology;
        (0..bio.ages)
            .map(|age| {
                let length = bio.linf * (1.0 - (-bio.k * (age as f64 - bio.t0)).exp());
                bio.wt_a * length.max(0.0).powf(bio.wt_b)
            })
            .collect()
    }

    pub fn maturity_at_age(&self) -> Vec<f64> {
        logistic_at_age(self.biology.ages, self.biology.a50, self.biology.a95)
    }

    /// Unfished spawning biomass per recruit, identical in every area.
    pub fn ssb_per_recruit(&self) -> f64 {
        let weight = self.weight_at_age();
        let maturity = self.maturity_at_age();
        self.survivorship()
            .iter()
            .zip(weight.iter().zip(&maturity))
            .map(|(l, (w, m))| l * w * m)
            .sum()
    }

    /// Total unfished spawning biomass across areas.
    pub fn ssb0(&self) -> f64 {
        let spr = self.ssb_per_recruit();
        self.areas.iter().map(|area| area.r0 * spr).sum()
    }

    /// Materializes the schedules for one replicate.
    pub fn build_inputs(
        &self,
        years: usize,
        replicate: u64,
    ) -> std::result::Result<ProjectionInputs, ProjectionError> {
        self.validate()?;
        let ages = self.biology.ages;
        let n_areas = self.areas.len();

        let lx = self.survivorship();
        let initial_numbers = AgeByArea::from_rows(
            lx.iter()
                .map(|l| self.areas.iter().map(|area| area.r0 * l).collect())
                .collect(),
        )?;

        let r0: Vec<f64> = self.areas.iter().map(|area| area.r0).collect();
        let spr = self.ssb_per_recruit();
        let ssbpr = vec![spr; n_areas];
        let stock_recruit = match self.biology.relationship {
            Relationship::BevertonHolt => StockRecruit::BevertonHolt {
                r0: r0.clone(),
                ssbpr: ssbpr.clone(),
            },
            Relationship::Ricker => {
                StockRecruit::ricker_from_r0(&r0, &ssbpr, self.biology.steepness)?
            }
        };

        let selectivity = logistic_at_age(
            ages,
            self.fishery.selectivity.a50,
            self.fishery.selectivity.a95,
        );
        let retention = match &self.fishery.retention {
            Some(curve) => logistic_at_age(ages, curve.a50, curve.a95),
            None => selectivity.clone(),
        };

        let control = match &self.fishery.control {
            ControlConfig::Effort {
                effort,
                catchability,
            } => FishingControl::Effort {
                effort: effort.materialize(years),
                catchability: *catchability,
            },
            ControlConfig::ApicalF { apical_f } => FishingControl::ApicalF {
                apical_f: *apical_f,
            },
            ControlConfig::Unfished => FishingControl::UnfishedReference {
                ssb0: self.ssb0(),
                r0_total: r0.iter().sum(),
                ssbpr,
            },
        };

        let mut closures = ClosureSchedule::open(years, n_areas);
        for closure in &self.closures {
            closures.close(closure.area, closure.from_year, closure.fraction)?;
        }

        let deviation_count = years + ages;
        let deviations = match self.recruitment {
            Some(settings) => deviations::generate(
                settings,
                &RngManager::new(self.seed),
                replicate,
                deviation_count,
            )?,
            None => crate::projection::RecruitmentDeviations::ones(deviation_count),
        };

        Ok(ProjectionInputs {
            initial_numbers,
            years,
            natural_mortality: AgeByYear::constant(
                &vec![self.biology.natural_mortality; ages],
                years,
            ),
            weight: AgeByYear::constant(&self.weight_at_age(), years),
            maturity: AgeByYear::constant(&self.maturity_at_age(), years),
            vulnerability: AgeByYear::constant(&selectivity, years),
            retention: AgeByYear::constant(&retention, years),
            deviations,
            movement: MovementSchedule::constant(self.movement_tensor()?, years)?,
            stock_recruit,
            steepness: self.biology.steepness,
            area_size: self.areas.iter().map(|area| area.size).collect(),
            closures,
            control,
            spatial_targeting: self.fishery.spatial_targeting,
            max_f: self.fishery.max_f,
            plus_group: self.plus_group,
            full_closure_policy: self.full_closure_policy,
        })
    }

    fn movement_tensor(&self) -> std::result::Result<MovementTensor, ProjectionError> {
        let ages = self.biology.ages;
        let n_areas = self.areas.len();
        if let Some(matrix) = &self.movement.matrix {
            if matrix.len() != n_areas || matrix.iter().any(|row| row.len() != n_areas) {
                return Err(ProjectionError::ShapeMismatch {
                    what: "movement matrix",
                    expected: format!("{n_areas}x{n_areas}"),
                    found: format!("{} rows", matrix.len()),
                });
            }
            return Ok(MovementTensor::uniform(ages, matrix));
        }
        if n_areas == 1 {
            return Ok(MovementTensor::identity(ages, 1));
        }
        let residency = self.movement.residency;
        let leaving = (1.0 - residency) / (n_areas - 1) as f64;
        let matrix: Vec<Vec<f64>> = (0..n_areas)
            .map(|from| {
                (0..n_areas)
                    .map(|to| if from == to { residency } else { leaving })
                    .collect()
            })
            .collect();
        Ok(MovementTensor::uniform(ages, &matrix))
    }

    fn validate(&self) -> std::result::Result<(), ProjectionError> {
        if self.areas.is_empty() {
            return Err(ProjectionError::InvalidInput(
                "scenario must define at least one area".into(),
            ));
        }
        if self.biology.ages == 0 {
            return Err(ProjectionError::InvalidInput(
                "scenario must track at least one age class".into(),
            ));
        }
        if self.biology.a95 <= self.biology.a50 {
            return Err(ProjectionError::InvalidInput(format!(
                "maturity a95 {} must exceed a50 {}",
                self.biology.a95, self.biology.a50
            )));
        }
        for (what, curve) in std::iter::once(("selectivity", &self.fishery.selectivity))
            .chain(self.fishery.retention.iter().map(|curve| ("retention", curve)))
        {
            if curve.a95 <= curve.a50 {
                return Err(ProjectionError::InvalidInput(format!(
                    "{what} a95 {} must exceed a50 {}",
                    curve.a95, curve.a50
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.movement.residency) {
            return Err(ProjectionError::InvalidInput(format!(
                "residency {} must lie in [0, 1]",
                self.movement.residency
            )));
        }
        Ok(())
    }
}

/// Logistic ogive at integer ages with 50% and 95% points.
fn logistic_at_age(ages: usize, x50: f64, x95: f64) -> Vec<f64> {
    (0..ages)
        .map(|age| 1.0 / (1.0 + (-(19f64).ln() * (age as f64 - x50) / (x95 - x50)).exp()))
        .collect()
}
