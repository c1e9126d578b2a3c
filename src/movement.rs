//! Inter-area movement fractions.

use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};
use crate::grid::AgeByArea;

/// Tolerance on each from-area row summing to one.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Fractions moving from one area to another, by age, for a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementTensor {
    ages: usize,
    areas: usize,
    data: Vec<f64>,
}

impl MovementTensor {
    /// Every age stays put.
    pub fn identity(ages: usize, areas: usize) -> Self {
        let matrix: Vec<Vec<f64>> = (0..areas)
            .map(|from| (0..areas).map(|to| if from == to { 1.0 } else { 0.0 }).collect())
            .collect();
        Self::uniform(ages, &matrix)
    }

    /// The same from x to matrix applied to every age. Rows are source areas.
    pub fn uniform(ages: usize, matrix: &[Vec<f64>]) -> Self {
        let areas = matrix.len();
        let mut data = Vec::with_capacity(ages * areas * areas);
        for _ in 0..ages {
            for row in matrix {
                data.extend(row.iter().copied());
            }
        }
        Self { ages, areas, data }
    }

    /// One from x to matrix per age.
    pub fn from_age_matrices(matrices: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        let ages = matrices.len();
        let areas = matrices.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(ages * areas * areas);
        for matrix in matrices {
            if matrix.len() != areas || matrix.iter().any(|row| row.len() != areas) {
                return Err(ProjectionError::ShapeMismatch {
                    what: "movement matrix",
                    expected: format!("{areas}x{areas}"),
                    found: format!("{} rows", matrix.len()),
                });
            }
            for row in matrix {
                data.extend(row);
            }
        }
        Ok(Self { ages, areas, data })
    }

    pub fn ages(&self) -> usize {
        self.ages
    }

    pub fn areas(&self) -> usize {
        self.areas
    }

    pub fn fraction(&self, age: usize, from: usize, to: usize) -> f64 {
        assert!(
            age < self.ages && from < self.areas && to < self.areas,
            "movement index (age {age}, {from} -> {to}) outside {} ages x {} areas",
            self.ages,
            self.areas
        );
        self.data[(age * self.areas + from) * self.areas + to]
    }

    /// Checks that every source row is nonnegative and sums to one.
    pub fn validate(&self, year: usize) -> Result<()> {
        let expected = self.ages * self.areas * self.areas;
        if self.data.len() != expected {
            return Err(ProjectionError::ShapeMismatch {
                what: "movement tensor",
                expected: format!(
                    "{expected} fractions for {} ages x {} areas",
                    self.ages, self.areas
                ),
                found: format!("{} fractions in year {year}", self.data.len()),
            });
        }
        for age in 0..self.ages {
            for from in 0..self.areas {
                let mut sum = 0.0;
                for to in 0..self.areas {
                    let fraction = self.fraction(age, from, to);
                    if !fraction.is_finite() || fraction < 0.0 {
                        return Err(ProjectionError::InvalidMovementField {
                            year,
                            age,
                            from,
                            sum: fraction,
                        });
                    }
                    sum += fraction;
                }
                if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                    return Err(ProjectionError::InvalidMovementField {
                        year,
                        age,
                        from,
                        sum,
                    });
                }
            }
        }
        Ok(())
    }

    /// Redistributes abundance at each age across areas.
    pub fn apply(&self, numbers: &AgeByArea) -> AgeByArea {
        let mut moved = AgeByArea::zeros(numbers.ages(), numbers.areas());
        for age in 0..numbers.ages() {
            for to in 0..self.areas {
                moved[(age, to)] = (0..self.areas)
                    .map(|from| numbers[(age, from)] * self.fraction(age, from, to))
                    .sum();
            }
        }
        moved
    }
}

/// Movement tensors keyed by projection year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSchedule {
    years: Vec<MovementTensor>,
}

impl MovementSchedule {
    /// Validates each year's tensor once.
    pub fn new(years: Vec<MovementTensor>) -> Result<Self> {
        let schedule = Self { years };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Checks every year shares one shape and holds a valid movement field.
    pub fn validate(&self) -> Result<()> {
        if let Some(first) = self.years.first() {
            for (year, tensor) in self.years.iter().enumerate() {
                if (tensor.ages(), tensor.areas()) != (first.ages(), first.areas()) {
                    return Err(ProjectionError::ShapeMismatch {
                        what: "movement tensor",
                        expected: format!("{} ages x {} areas", first.ages(), first.areas()),
                        found: format!(
                            "{} ages x {} areas in year {year}",
                            tensor.ages(),
                            tensor.areas()
                        ),
                    });
                }
                tensor.validate(year)?;
            }
        }
        Ok(())
    }

    /// The same tensor for every year.
    pub fn constant(tensor: MovementTensor, years: usize) -> Result<Self> {
        Self::new(vec![tensor; years])
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn tensor(&self, year: usize) -> Option<&MovementTensor> {
        self.years.get(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_area() -> MovementTensor {
        MovementTensor::uniform(
            2,
            &[
                vec![0.7, 0.2, 0.1],
                vec![0.0, 0.5, 0.5],
                vec![0.25, 0.25, 0.5],
            ],
        )
    }

    #[test]
    fn test_movement_conserves_abundance() {
        let numbers =
            AgeByArea::from_rows(vec![vec![100.0, 40.0, 7.0], vec![3.5, 0.0, 90.0]]).unwrap();
        let moved = three_area().apply(&numbers);

        for age in 0..2 {
            assert!((moved.age_total(age) - numbers.age_total(age)).abs() < 1e-9);
        }
        assert!((moved[(0, 0)] - (70.0 + 1.75)).abs() < 1e-9);
    }

    #[test]
    fn test_identity_leaves_numbers_alone() {
        let numbers = AgeByArea::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(MovementTensor::identity(2, 2).apply(&numbers), numbers);
    }

    #[test]
    fn test_row_not_summing_to_one() {
        let tensor = MovementTensor::uniform(1, &[vec![0.6, 0.3], vec![0.5, 0.5]]);
        let err = tensor.validate(4).unwrap_err();

        match err {
            ProjectionError::InvalidMovementField { year, age, from, sum } => {
                assert_eq!((year, age, from), (4, 0, 0));
                assert!((sum - 0.9).abs() < 1e-12);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_negative_fraction_rejected() {
        let tensor = MovementTensor::uniform(1, &[vec![1.2, -0.2], vec![0.0, 1.0]]);
        assert!(tensor.validate(0).is_err());
    }

    #[test]
    fn test_schedule_validates_every_year() {
        let good = MovementTensor::identity(2, 2);
        let bad = MovementTensor::uniform(2, &[vec![1.0, 0.0], vec![0.4, 0.4]]);
        let err = MovementSchedule::new(vec![good.clone(), good, bad]).unwrap_err();

        assert!(matches!(
            err,
            ProjectionError::InvalidMovementField { year: 2, from: 1, .. }
        ));
    }

    #[test]
    fn test_short_fraction_data_rejected() {
        let tensor: MovementTensor =
            serde_json::from_str(r#"{"ages": 1, "areas": 2, "data": [1.0, 0.0, 0.0]}"#).unwrap();
        assert!(matches!(
            tensor.validate(4),
            Err(ProjectionError::ShapeMismatch { what: "movement tensor", .. })
        ));

        let schedule: MovementSchedule = serde_json::from_str(
            r#"{"years": [{"ages": 1, "areas": 2, "data": [0.5, 0.6, 0.0, 1.0]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            schedule.validate(),
            Err(ProjectionError::InvalidMovementField { year: 0, from: 0, .. })
        ));
    }

    #[test]
    fn test_schedule_lookup_by_year() {
        let schedule = MovementSchedule::constant(three_area(), 3).unwrap();

        assert_eq!(schedule.len(), 3);
        assert!(schedule.tensor(2).is_some());
        assert!(schedule.tensor(3).is_none());
    }
}
