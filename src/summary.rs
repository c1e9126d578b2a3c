use serde::{Deserialize, Serialize};

use crate::projection::ProjectionOutput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: usize,
    pub numbers: f64,
    pub biomass: f64,
    pub spawning_biomass: f64,
    pub vulnerable_biomass: f64,
    /// Age-0 numbers summed over areas.
    pub recruitment: f64,
    /// Highest fishing mortality at any age and area.
    pub max_fishing_mortality: f64,
    /// Spawning biomass relative to the unfished reference, when one is known.
    pub depletion: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub ssb0: Option<f64>,
    pub years: Vec<YearSummary>,
}

impl ProjectionSummary {
    pub fn from_output(output: &ProjectionOutput, ssb0: Option<f64>) -> Self {
        let reference = ssb0.filter(|b0| *b0 > 0.0);
        let years = (0..output.years())
            .map(|year| {
                let spawning_biomass = output.spawning_biomass.year_total(year);
                let recruitment = (0..output.areas())
                    .map(|area| output.numbers[(0, year, area)])
                    .sum();
                let mut max_f: f64 = 0.0;
                for area in 0..output.areas() {
                    for age in 0..output.ages() {
                        max_f = max_f.max(output.fishing_mortality[(age, year, area)]);
                    }
                }
                YearSummary {
                    year,
                    numbers: output.numbers.year_total(year),
                    biomass: output.biomass.year_total(year),
                    spawning_biomass,
                    vulnerable_biomass: output.vulnerable_biomass.year_total(year),
                    recruitment,
                    max_fishing_mortality: max_f,
                    depletion: reference.map(|b0| spawning_biomass / b0),
                }
            })
            .collect();
        Self { ssb0: reference, years }
    }

    pub fn final_year(&self) -> Option<&YearSummary> {
        self.years.last()
    }
}
