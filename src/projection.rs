//! Multi-year projection loop.
//!
//! Year 0 is seeded from the starting abundance. Each following year is the
//! result of one [`transition`](crate::transition) using the previous year's
//! total mortality, after which biomass-type quantities and the next fishing
//! mortality field are derived.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effort::{self, ClosureSchedule, FishingControl, FullClosurePolicy};
use crate::error::{ProjectionError, Result};
use crate::grid::{AgeByArea, AgeByYear, AgeYearArea};
use crate::movement::MovementSchedule;
use crate::recruitment::StockRecruit;
use crate::transition::{self, TransitionInputs};

/// Multiplicative recruitment deviations, indexed with a burn-in offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentDeviations {
    values: Vec<f64>,
}

impl RecruitmentDeviations {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// No variation: every deviation is one.
    pub fn ones(len: usize) -> Self {
        Self::new(vec![1.0; len])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index read by the transition out of `year`.
    ///
    /// The series is laid out with one leading entry per tracked age class, so
    /// the transition out of year `y` reads entry `y + ages`.
    pub fn index_for(year: usize, ages: usize) -> usize {
        year + ages
    }

    pub fn for_transition(&self, year: usize, ages: usize) -> Option<f64> {
        self.values.get(Self::index_for(year, ages)).copied()
    }
}

/// Everything a projection run reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInputs {
    /// Numbers at age in each area at the start of year 0.
    pub initial_numbers: AgeByArea,
    pub years: usize,
    pub natural_mortality: AgeByYear,
    pub weight: AgeByYear,
    pub maturity: AgeByYear,
    pub vulnerability: AgeByYear,
    pub retention: AgeByYear,
    pub deviations: RecruitmentDeviations,
    pub movement: MovementSchedule,
    pub stock_recruit: StockRecruit,
    pub steepness: f64,
    pub area_size: Vec<f64>,
    pub closures: ClosureSchedule,
    pub control: FishingControl,
    pub spatial_targeting: f64,
    pub max_f: f64,
    pub plus_group: bool,
    #[serde(default)]
    pub full_closure_policy: FullClosurePolicy,
}

/// Age x year x area histories produced by a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub numbers: AgeYearArea,
    pub biomass: AgeYearArea,
    pub mature_numbers: AgeYearArea,
    pub spawning_biomass: AgeYearArea,
    pub vulnerable_biomass: AgeYearArea,
    pub fishing_mortality: AgeYearArea,
    pub retained_fishing_mortality: AgeYearArea,
    pub total_mortality: AgeYearArea,
}

impl ProjectionOutput {
    fn zeros(ages: usize, years: usize, areas: usize) -> Self {
        let cube = AgeYearArea::zeros(ages, years, areas);
        Self {
            numbers: cube.clone(),
            biomass: cube.clone(),
            mature_numbers: cube.clone(),
            spawning_biomass: cube.clone(),
            vulnerable_biomass: cube.clone(),
            fishing_mortality: cube.clone(),
            retained_fishing_mortality: cube.clone(),
            total_mortality: cube,
        }
    }

    pub fn years(&self) -> usize {
        self.numbers.years()
    }

    pub fn areas(&self) -> usize {
        self.numbers.areas()
    }

    pub fn ages(&self) -> usize {
        self.numbers.ages()
    }

    /// Spawning biomass summed over ages, per area, for one year.
    pub fn spawning_biomass_by_area(&self, year: usize) -> Vec<f64> {
        (0..self.areas())
            .map(|area| self.spawning_biomass.area_total(year, area))
            .collect()
    }

    pub fn vulnerable_biomass_by_area(&self, year: usize) -> Vec<f64> {
        (0..self.areas())
            .map(|area| self.vulnerable_biomass.area_total(year, area))
            .collect()
    }
}

/// Projects the population over `inputs.years` years.
pub fn project(inputs: &ProjectionInputs) -> Result<ProjectionOutput> {
    validate(inputs)?;
    Projection::new(inputs).run()
}

struct Projection<'a> {
    inputs: &'a ProjectionInputs,
    ages: usize,
    areas: usize,
    out: ProjectionOutput,
    stock_recruit: StockRecruit,
    unfished_ssb: Option<Vec<f64>>,
}

impl<'a> Projection<'a> {
    fn new(inputs: &'a ProjectionInputs) -> Self {
        let ages = inputs.initial_numbers.ages();
        let areas = inputs.initial_numbers.areas();
        Self {
            inputs,
            ages,
            areas,
            out: ProjectionOutput::zeros(ages, inputs.years, areas),
            stock_recruit: inputs.stock_recruit.clone(),
            unfished_ssb: None,
        }
    }

    fn run(mut self) -> Result<ProjectionOutput> {
        let inputs = self.inputs;
        self.record_numbers(0, &inputs.initial_numbers);
        self.apply_fishing(0, None)?;

        for year in 0..inputs.years.saturating_sub(1) {
            let ssb = match (&self.unfished_ssb, year > 0) {
                (Some(unfished), true) => unfished.clone(),
                _ => self.out.spawning_biomass_by_area(year),
            };
            let numbers = self.out.numbers.year_slice(year);
            let mortality = self.out.total_mortality.year_slice(year);
            let movement = inputs.movement.tensor(year).ok_or_else(|| {
                ProjectionError::InvalidInput(format!("no movement tensor for year {year}"))
            })?;
            let deviation = inputs
                .deviations
                .for_transition(year, self.ages)
                .ok_or_else(|| {
                    ProjectionError::InvalidInput(format!(
                        "no recruitment deviation at index {}",
                        RecruitmentDeviations::index_for(year, self.ages)
                    ))
                })?;

            let next = transition::advance(&TransitionInputs {
                year,
                ssb: &ssb,
                numbers: &numbers,
                mortality: &mortality,
                deviation,
                steepness: inputs.steepness,
                stock_recruit: &self.stock_recruit,
                movement,
                plus_group: inputs.plus_group,
            })?;
            self.record_numbers(year + 1, &next);

            if let FishingControl::UnfishedReference {
                ssb0,
                r0_total,
                ssbpr,
            } = &inputs.control
            {
                self.apply_fishing(year + 1, None)?;
                self.update_unfished_reference(year, *ssb0, *r0_total, ssbpr)?;
            } else {
                self.apply_fishing(year + 1, Some(year))?;
            }

            debug!(
                year = year + 1,
                biomass = self.out.biomass.year_total(year + 1),
                spawning_biomass = self.out.spawning_biomass.year_total(year + 1),
                "projected year"
            );
        }

        Ok(self.out)
    }

    /// Stores numbers for `year` and the quantities derived from them.
    fn record_numbers(&mut self, year: usize, numbers: &AgeByArea) {
        let inputs = self.inputs;
        self.out.numbers.set_year(year, numbers);
        for area in 0..self.areas {
            for age in 0..self.ages {
                let n = numbers[(age, area)];
                let weight = inputs.weight[(age, year)];
                let maturity = inputs.maturity[(age, year)];
                self.out.biomass[(age, year, area)] = n * weight;
                self.out.mature_numbers[(age, year, area)] = n * maturity;
                self.out.spawning_biomass[(age, year, area)] = n * weight * maturity;
                self.out.vulnerable_biomass[(age, year, area)] =
                    n * weight * inputs.vulnerability[(age, year)];
            }
        }
    }

    /// Fishing, retained fishing and total mortality for `year`.
    ///
    /// Closures are read from `closure_year` when given; year 0 is allocated
    /// without closures.
    fn apply_fishing(&mut self, year: usize, closure_year: Option<usize>) -> Result<()> {
        let inputs = self.inputs;
        let intensity = inputs.control.intensity(year)?;

        let shares = match intensity {
            Some(_) => effort::allocate(
                year,
                &self.out.vulnerable_biomass_by_area(year),
                inputs.spatial_targeting,
                closure_year.map(|y| (&inputs.closures, y)),
                inputs.full_closure_policy,
            )?,
            None => vec![0.0; self.areas],
        };

        for area in 0..self.areas {
            for age in 0..self.ages {
                let (f, retained) = match intensity {
                    Some(intensity) => (
                        intensity * shares[area] * inputs.vulnerability[(age, year)]
                            / inputs.area_size[area],
                        intensity * shares[area] * inputs.retention[(age, year)]
                            / inputs.area_size[area],
                    ),
                    None => (0.0, 0.0),
                };
                let f = clamp_fishing(f, "fishing mortality", age, year, area, inputs.max_f)?;
                let retained = clamp_fishing(
                    retained,
                    "retained fishing mortality",
                    age,
                    year,
                    area,
                    inputs.max_f,
                )?;
                self.out.fishing_mortality[(age, year, area)] = f;
                self.out.retained_fishing_mortality[(age, year, area)] = retained;
                self.out.total_mortality[(age, year, area)] =
                    inputs.natural_mortality[(age, year)] + f;
            }
        }
        Ok(())
    }

    /// Rescales the spatial unfished reference after advancing out of `year`.
    fn update_unfished_reference(
        &mut self,
        year: usize,
        ssb0: f64,
        r0_total: f64,
        ssbpr: &[f64],
    ) -> Result<()> {
        let unfished_ssb = rescale(self.out.spawning_biomass_by_area(year + 1), ssb0)?;
        let recruitment_proxy = rescale(self.out.spawning_biomass_by_area(year), r0_total)?;

        self.stock_recruit = match &self.stock_recruit {
            StockRecruit::BevertonHolt { .. } => {
                let mut updated = self.stock_recruit.clone();
                updated.set_r0(&recruitment_proxy);
                updated
            }
            StockRecruit::Ricker { .. } => {
                StockRecruit::ricker_from_unfished(&unfished_ssb, ssbpr, self.inputs.steepness)?
            }
        };
        self.unfished_ssb = Some(unfished_ssb);
        Ok(())
    }
}

/// Scales `values` so they sum to `total`.
fn rescale(values: Vec<f64>, total: f64) -> Result<Vec<f64>> {
    let sum: f64 = values.iter().sum();
    if !(sum > 0.0) || !sum.is_finite() {
        return Err(ProjectionError::DegenerateRecruitment {
            area: 0,
            reason: format!("cannot rescale spatial spawning biomass summing to {sum}"),
        });
    }
    let scale = sum / total;
    Ok(values.into_iter().map(|v| v / scale).collect())
}

fn clamp_fishing(
    value: f64,
    what: &'static str,
    age: usize,
    year: usize,
    area: usize,
    max_f: f64,
) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProjectionError::OutOfRangeMortality {
            what,
            age,
            year,
            area,
            value,
        });
    }
    Ok(if value > max_f { max_f } else { value })
}

fn validate(inputs: &ProjectionInputs) -> Result<()> {
    inputs.initial_numbers.check_shape("starting abundance")?;
    let ages = inputs.initial_numbers.ages();
    let areas = inputs.initial_numbers.areas();
    let years = inputs.years;

    if ages == 0 || areas == 0 {
        return Err(ProjectionError::InvalidInput(
            "starting abundance needs at least one age class and one area".into(),
        ));
    }
    if years == 0 {
        return Err(ProjectionError::InvalidInput(
            "projection needs at least one year".into(),
        ));
    }
    if let Some(&n) = inputs
        .initial_numbers
        .values()
        .iter()
        .find(|n| !n.is_finite() || **n < 0.0)
    {
        return Err(ProjectionError::InvalidInput(format!(
            "starting abundance contains {n}"
        )));
    }

    for (what, schedule) in [
        ("natural mortality", &inputs.natural_mortality),
        ("weight", &inputs.weight),
        ("maturity", &inputs.maturity),
        ("vulnerability", &inputs.vulnerability),
        ("retention", &inputs.retention),
    ] {
        schedule.check_shape(what)?;
        if schedule.ages() != ages || schedule.years() < years {
            return Err(ProjectionError::ShapeMismatch {
                what,
                expected: format!("{ages} ages x at least {years} years"),
                found: format!("{} ages x {} years", schedule.ages(), schedule.years()),
            });
        }
        for year in 0..years {
            for age in 0..ages {
                let value = schedule[(age, year)];
                if value.is_finite() && value >= 0.0 {
                    continue;
                }
                if what == "natural mortality" {
                    return Err(ProjectionError::OutOfRangeMortality {
                        what,
                        age,
                        year,
                        area: 0,
                        value,
                    });
                }
                return Err(ProjectionError::InvalidInput(format!(
                    "{what} at age {age} in year {year} is {value}"
                )));
            }
        }
    }

    let transitions = years - 1;
    if transitions > 0 {
        let needed = RecruitmentDeviations::index_for(transitions - 1, ages) + 1;
        if inputs.deviations.len() < needed {
            return Err(ProjectionError::InvalidInput(format!(
                "recruitment deviations hold {} values, {needed} needed for {years} years and {ages} ages",
                inputs.deviations.len()
            )));
        }
        if inputs.movement.len() < transitions {
            return Err(ProjectionError::InvalidInput(format!(
                "movement schedule covers {} years, {transitions} needed",
                inputs.movement.len()
            )));
        }
        inputs.movement.validate()?;
        if let Some(tensor) = inputs.movement.tensor(0) {
            if (tensor.ages(), tensor.areas()) != (ages, areas) {
                return Err(ProjectionError::ShapeMismatch {
                    what: "movement tensor",
                    expected: format!("{ages} ages x {areas} areas"),
                    found: format!("{} ages x {} areas", tensor.ages(), tensor.areas()),
                });
            }
        }
        inputs.closures.validate()?;
        if inputs.closures.areas() != areas || inputs.closures.years() < transitions {
            return Err(ProjectionError::ShapeMismatch {
                what: "closure schedule",
                expected: format!("at least {transitions} years x {areas} areas"),
                found: format!(
                    "{} years x {} areas",
                    inputs.closures.years(),
                    inputs.closures.areas()
                ),
            });
        }
    }

    if inputs.area_size.len() != areas {
        return Err(ProjectionError::ShapeMismatch {
            what: "area size",
            expected: format!("{areas} areas"),
            found: format!("{} areas", inputs.area_size.len()),
        });
    }
    if let Some((area, size)) = inputs
        .area_size
        .iter()
        .enumerate()
        .find(|(_, s)| !s.is_finite() || **s <= 0.0)
    {
        return Err(ProjectionError::InvalidInput(format!(
            "area {area} has size {size}"
        )));
    }

    inputs.stock_recruit.validate(areas)?;
    if !inputs.steepness.is_finite() || inputs.steepness <= 0.0 {
        return Err(ProjectionError::InvalidInput(format!(
            "steepness {} must be positive",
            inputs.steepness
        )));
    }
    if !inputs.max_f.is_finite() || inputs.max_f < 0.0 {
        return Err(ProjectionError::InvalidInput(format!(
            "maximum fishing mortality {} must be finite and nonnegative",
            inputs.max_f
        )));
    }
    if !inputs.spatial_targeting.is_finite() {
        return Err(ProjectionError::InvalidInput(format!(
            "spatial targeting exponent {} is not finite",
            inputs.spatial_targeting
        )));
    }

    match &inputs.control {
        FishingControl::Effort {
            effort,
            catchability,
        } => {
            if effort.len() < years {
                return Err(ProjectionError::ShapeMismatch {
                    what: "effort series",
                    expected: format!("at least {years} years"),
                    found: format!("{} years", effort.len()),
                });
            }
            if !catchability.is_finite() || *catchability < 0.0 {
                return Err(ProjectionError::InvalidInput(format!(
                    "catchability {catchability} must be finite and nonnegative"
                )));
            }
        }
        FishingControl::ApicalF { .. } => {}
        FishingControl::UnfishedReference {
            ssb0,
            r0_total,
            ssbpr,
        } => {
            if ssbpr.len() != areas {
                return Err(ProjectionError::ShapeMismatch {
                    what: "unfished spawning per recruit",
                    expected: format!("{areas} areas"),
                    found: format!("{} areas", ssbpr.len()),
                });
            }
            if !(*ssb0 > 0.0) || !(*r0_total > 0.0) {
                return Err(ProjectionError::InvalidInput(format!(
                    "unfished reference needs positive totals, got SSB0 {ssb0} and R0 {r0_total}"
                )));
            }
        }
    }

    Ok(())
}
