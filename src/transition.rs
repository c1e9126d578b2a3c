//! One annual step of the age- and area-structured dynamics.

use crate::error::{ProjectionError, Result};
use crate::grid::AgeByArea;
use crate::movement::MovementTensor;
use crate::recruitment::StockRecruit;

/// Everything a single annual transition reads.
pub struct TransitionInputs<'a> {
    /// Year being advanced from, used to label errors.
    pub year: usize,
    /// Spawning biomass per area feeding recruitment.
    pub ssb: &'a [f64],
    pub numbers: &'a AgeByArea,
    /// Total mortality at age in each area.
    pub mortality: &'a AgeByArea,
    pub deviation: f64,
    pub steepness: f64,
    pub stock_recruit: &'a StockRecruit,
    pub movement: &'a MovementTensor,
    pub plus_group: bool,
}

/// Advances numbers-at-age by one year: recruitment, survival, plus group, movement.
pub fn step(inputs: &TransitionInputs<'_>) -> Result<AgeByArea> {
    inputs.movement.validate(inputs.year)?;
    advance(inputs)
}

/// As [`step`], for a movement tensor that has already been validated.
pub(crate) fn advance(inputs: &TransitionInputs<'_>) -> Result<AgeByArea> {
    check_shapes(inputs)?;
    let ages = inputs.numbers.ages();
    let areas = inputs.numbers.areas();
    let mut next = AgeByArea::zeros(ages, areas);

    for area in 0..areas {
        let predicted =
            inputs
                .stock_recruit
                .recruits(area, inputs.ssb[area], inputs.steepness)?;
        next[(0, area)] = inputs.deviation * predicted;

        for age in 1..ages {
            let z = mortality_at(inputs, age - 1, area)?;
            next[(age, area)] = inputs.numbers[(age - 1, area)] * (-z).exp();
        }

        if inputs.plus_group {
            let last = ages - 1;
            let z = mortality_at(inputs, last, area)?;
            let pooled = 1.0 - (-z).exp();
            if !(pooled > 0.0) {
                return Err(ProjectionError::OutOfRangeMortality {
                    what: "plus-group total mortality",
                    age: last,
                    year: inputs.year,
                    area,
                    value: z,
                });
            }
            next[(last, area)] /= pooled;
        }
    }

    Ok(inputs.movement.apply(&next))
}

fn mortality_at(inputs: &TransitionInputs<'_>, age: usize, area: usize) -> Result<f64> {
    let z = inputs.mortality[(age, area)];
    if !z.is_finite() || z < 0.0 {
        return Err(ProjectionError::OutOfRangeMortality {
            what: "total mortality",
            age,
            year: inputs.year,
            area,
            value: z,
        });
    }
    Ok(z)
}

fn check_shapes(inputs: &TransitionInputs<'_>) -> Result<()> {
    let ages = inputs.numbers.ages();
    let areas = inputs.numbers.areas();
    if ages == 0 || areas == 0 {
        return Err(ProjectionError::InvalidInput(
            "transition needs at least one age class and one area".into(),
        ));
    }
    let expected = format!("{ages} ages x {areas} areas");
    if (inputs.mortality.ages(), inputs.mortality.areas()) != (ages, areas) {
        return Err(ProjectionError::ShapeMismatch {
            what: "total mortality",
            expected,
            found: format!(
                "{} ages x {} areas",
                inputs.mortality.ages(),
                inputs.mortality.areas()
            ),
        });
    }
    if (inputs.movement.ages(), inputs.movement.areas()) != (ages, areas) {
        return Err(ProjectionError::ShapeMismatch {
            what: "movement tensor",
            expected,
            found: format!(
                "{} ages x {} areas",
                inputs.movement.ages(),
                inputs.movement.areas()
            ),
        });
    }
    if inputs.ssb.len() != areas || inputs.stock_recruit.areas() != areas {
        return Err(ProjectionError::ShapeMismatch {
            what: "per-area recruitment inputs",
            expected: format!("{areas} areas"),
            found: format!(
                "{} spawning biomass values, {} stock-recruit areas",
                inputs.ssb.len(),
                inputs.stock_recruit.areas()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bh(areas: usize) -> StockRecruit {
        StockRecruit::BevertonHolt {
            r0: vec![1000.0; areas],
            ssbpr: vec![1.0; areas],
        }
    }

    fn constant_z(ages: usize, areas: usize, z: f64) -> AgeByArea {
        AgeByArea::from_rows(vec![vec![z; areas]; ages]).unwrap()
    }

    #[test]
    fn test_survival_shifts_ages() {
        let numbers = AgeByArea::from_rows(vec![vec![100.0], vec![50.0], vec![20.0]]).unwrap();
        let z = constant_z(3, 1, 0.3);
        let sr = bh(1);
        let movement = MovementTensor::identity(3, 1);
        let next = step(&TransitionInputs {
            year: 0,
            ssb: &[1000.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: false,
        })
        .unwrap();

        assert!((next[(0, 0)] - 1000.0).abs() < 1e-9);
        assert!((next[(1, 0)] - 100.0 * (-0.3f64).exp()).abs() < 1e-12);
        assert!((next[(2, 0)] - 50.0 * (-0.3f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_deviation_scales_recruitment() {
        let numbers = AgeByArea::from_rows(vec![vec![0.0], vec![0.0]]).unwrap();
        let z = constant_z(2, 1, 0.2);
        let sr = bh(1);
        let movement = MovementTensor::identity(2, 1);
        let next = step(&TransitionInputs {
            year: 0,
            ssb: &[1000.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.5,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: false,
        })
        .unwrap();

        assert!((next[(0, 0)] - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_plus_group_pools_survivors() {
        let numbers = AgeByArea::from_rows(vec![vec![100.0], vec![80.0]]).unwrap();
        let z = constant_z(2, 1, 0.4);
        let sr = bh(1);
        let movement = MovementTensor::identity(2, 1);
        let mut inputs = TransitionInputs {
            year: 0,
            ssb: &[500.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: false,
        };
        let without = step(&inputs).unwrap();
        inputs.plus_group = true;
        let with = step(&inputs).unwrap();

        assert!(with[(1, 0)] > without[(1, 0)]);
        let expected = without[(1, 0)] / (1.0 - (-0.4f64).exp());
        assert!((with[(1, 0)] - expected).abs() < 1e-9);
        assert_eq!(with[(0, 0)], without[(0, 0)]);
    }

    #[test]
    fn test_plus_group_with_zero_terminal_mortality_fails() {
        let numbers = AgeByArea::from_rows(vec![vec![100.0], vec![80.0]]).unwrap();
        let z = AgeByArea::from_rows(vec![vec![0.2], vec![0.0]]).unwrap();
        let sr = bh(1);
        let movement = MovementTensor::identity(2, 1);
        let err = step(&TransitionInputs {
            year: 3,
            ssb: &[500.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: true,
        })
        .unwrap_err();

        assert!(matches!(
            err,
            ProjectionError::OutOfRangeMortality { age: 1, year: 3, .. }
        ));
    }

    #[test]
    fn test_plus_group_with_vanishing_terminal_mortality_fails() {
        let numbers = AgeByArea::from_rows(vec![vec![100.0], vec![80.0]]).unwrap();
        let z = AgeByArea::from_rows(vec![vec![0.2], vec![1e-18]]).unwrap();
        let sr = bh(1);
        let movement = MovementTensor::identity(2, 1);
        let err = step(&TransitionInputs {
            year: 2,
            ssb: &[500.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: true,
        })
        .unwrap_err();

        assert!(matches!(
            err,
            ProjectionError::OutOfRangeMortality { age: 1, year: 2, .. }
        ));
    }

    #[test]
    fn test_negative_mortality_rejected() {
        let numbers = AgeByArea::from_rows(vec![vec![100.0], vec![80.0]]).unwrap();
        let z = AgeByArea::from_rows(vec![vec![-0.1], vec![0.2]]).unwrap();
        let sr = bh(1);
        let movement = MovementTensor::identity(2, 1);
        let err = step(&TransitionInputs {
            year: 0,
            ssb: &[500.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: false,
        })
        .unwrap_err();

        assert!(matches!(err, ProjectionError::OutOfRangeMortality { age: 0, .. }));
    }

    #[test]
    fn test_movement_after_survival() {
        let numbers = AgeByArea::from_rows(vec![vec![10.0, 30.0], vec![5.0, 5.0]]).unwrap();
        let z = constant_z(2, 2, 0.1);
        let sr = bh(2);
        let movement = MovementTensor::uniform(2, &[vec![0.5, 0.5], vec![0.0, 1.0]]);
        let next = step(&TransitionInputs {
            year: 0,
            ssb: &[100.0, 300.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: false,
        })
        .unwrap();

        let survival = (-0.1f64).exp();
        assert!((next[(1, 0)] - 5.0 * survival).abs() < 1e-12);
        assert!((next[(1, 1)] - 35.0 * survival).abs() < 1e-12);
        assert!((next.age_total(1) - 40.0 * survival).abs() < 1e-12);
    }

    #[test]
    fn test_unvalidated_movement_rejected() {
        let numbers = AgeByArea::from_rows(vec![vec![10.0, 30.0]]).unwrap();
        let z = constant_z(1, 2, 0.1);
        let sr = bh(2);
        let movement = MovementTensor::uniform(1, &[vec![0.5, 0.4], vec![0.0, 1.0]]);
        let err = step(&TransitionInputs {
            year: 7,
            ssb: &[100.0, 300.0],
            numbers: &numbers,
            mortality: &z,
            deviation: 1.0,
            steepness: 0.7,
            stock_recruit: &sr,
            movement: &movement,
            plus_group: false,
        })
        .unwrap_err();

        assert!(matches!(
            err,
            ProjectionError::InvalidMovementField { year: 7, .. }
        ));
    }
}
