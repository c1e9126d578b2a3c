//! Age, year and area indexed containers.
//!
//! Every container stores a flat `Vec<f64>` but is only addressed through
//! index tuples. `get` returns `None` outside the shape; the `Index` impls
//! panic with the offending index instead of silently aliasing into a
//! neighbouring row.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};

/// Numbers (or any quantity) at age in each area for a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeByArea {
    ages: usize,
    areas: usize,
    data: Vec<f64>,
}

impl AgeByArea {
    pub fn zeros(ages: usize, areas: usize) -> Self {
        Self {
            ages,
            areas,
            data: vec![0.0; ages * areas],
        }
    }

    /// Builds from rows, one row per age holding a value per area.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let ages = rows.len();
        let areas = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(ages * areas);
        for row in rows {
            if row.len() != areas {
                return Err(ProjectionError::ShapeMismatch {
                    what: "age-by-area row",
                    expected: format!("{areas} areas"),
                    found: format!("{} areas", row.len()),
                });
            }
            data.extend(row);
        }
        Ok(Self { ages, areas, data })
    }

    pub fn ages(&self) -> usize {
        self.ages
    }

    pub fn areas(&self) -> usize {
        self.areas
    }

    pub fn get(&self, age: usize, area: usize) -> Option<f64> {
        self.offset(age, area).map(|i| self.data[i])
    }

    /// Sum over ages for one area.
    pub fn area_total(&self, area: usize) -> f64 {
        (0..self.ages).map(|age| self[(age, area)]).sum()
    }

    /// Sum over areas for one age.
    pub fn age_total(&self, age: usize) -> f64 {
        (0..self.areas).map(|area| self[(age, area)]).sum()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Checks the stored values cover the declared shape.
    pub fn check_shape(&self, what: &'static str) -> Result<()> {
        check_len(what, self.ages, self.areas, "areas", self.data.len())
    }

    fn offset(&self, age: usize, area: usize) -> Option<usize> {
        if age < self.ages && area < self.areas {
            Some(age * self.areas + area)
        } else {
            None
        }
    }
}

impl Index<(usize, usize)> for AgeByArea {
    type Output = f64;

    fn index(&self, (age, area): (usize, usize)) -> &f64 {
        match self.offset(age, area) {
            Some(i) => &self.data[i],
            None => panic!(
                "index (age {age}, area {area}) outside {}x{} age-by-area grid",
                self.ages, self.areas
            ),
        }
    }
}

impl IndexMut<(usize, usize)> for AgeByArea {
    fn index_mut(&mut self, (age, area): (usize, usize)) -> &mut f64 {
        match self.offset(age, area) {
            Some(i) => &mut self.data[i],
            None => panic!(
                "index (age {age}, area {area}) outside {}x{} age-by-area grid",
                self.ages, self.areas
            ),
        }
    }
}

/// A per-age schedule over projection years (weight, maturity, selectivity, M).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeByYear {
    ages: usize,
    years: usize,
    data: Vec<f64>,
}

impl AgeByYear {
    /// Repeats one at-age vector for every year.
    pub fn constant(at_age: &[f64], years: usize) -> Self {
        let ages = at_age.len();
        let mut data = Vec::with_capacity(ages * years);
        for &value in at_age {
            data.extend(std::iter::repeat(value).take(years));
        }
        Self { ages, years, data }
    }

    /// Builds from rows, one row per age holding a value per year.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let ages = rows.len();
        let years = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(ages * years);
        for row in rows {
            if row.len() != years {
                return Err(ProjectionError::ShapeMismatch {
                    what: "age-by-year row",
                    expected: format!("{years} years"),
                    found: format!("{} years", row.len()),
                });
            }
            data.extend(row);
        }
        Ok(Self { ages, years, data })
    }

    pub fn ages(&self) -> usize {
        self.ages
    }

    pub fn years(&self) -> usize {
        self.years
    }

    pub fn get(&self, age: usize, year: usize) -> Option<f64> {
        self.offset(age, year).map(|i| self.data[i])
    }

    /// Checks the stored values cover the declared shape.
    pub fn check_shape(&self, what: &'static str) -> Result<()> {
        check_len(what, self.ages, self.years, "years", self.data.len())
    }

    fn offset(&self, age: usize, year: usize) -> Option<usize> {
        if age < self.ages && year < self.years {
            Some(age * self.years + year)
        } else {
            None
        }
    }
}

impl Index<(usize, usize)> for AgeByYear {
    type Output = f64;

    fn index(&self, (age, year): (usize, usize)) -> &f64 {
        match self.offset(age, year) {
            Some(i) => &self.data[i],
            None => panic!(
                "index (age {age}, year {year}) outside {}x{} age-by-year schedule",
                self.ages, self.years
            ),
        }
    }
}

fn check_len(
    what: &'static str,
    ages: usize,
    columns: usize,
    column_name: &str,
    len: usize,
) -> Result<()> {
    if ages * columns != len {
        return Err(ProjectionError::ShapeMismatch {
            what,
            expected: format!("{} values for {ages} ages x {columns} {column_name}", ages * columns),
            found: format!("{len} values"),
        });
    }
    Ok(())
}

/// Full projection history of one quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeYearArea {
    ages: usize,
    years: usize,
    areas: usize,
    data: Vec<f64>,
}

impl AgeYearArea {
    pub fn zeros(ages: usize, years: usize, areas: usize) -> Self {
        Self {
            ages,
            years,
            areas,
            data: vec![0.0; ages * years * areas],
        }
    }

    pub fn ages(&self) -> usize {
        self.ages
    }

    pub fn years(&self) -> usize {
        self.years
    }

    pub fn areas(&self) -> usize {
        self.areas
    }

    pub fn get(&self, age: usize, year: usize, area: usize) -> Option<f64> {
        self.offset(age, year, area).map(|i| self.data[i])
    }

    /// Copies one year out as an age-by-area slab.
    pub fn year_slice(&self, year: usize) -> AgeByArea {
        let mut slab = AgeByArea::zeros(self.ages, self.areas);
        for age in 0..self.ages {
            for area in 0..self.areas {
                slab[(age, area)] = self[(age, year, area)];
            }
        }
        slab
    }

    /// Writes an age-by-area slab into one year.
    pub fn set_year(&mut self, year: usize, slab: &AgeByArea) {
        assert_eq!(
            (slab.ages(), slab.areas()),
            (self.ages, self.areas),
            "slab shape does not match cube"
        );
        for age in 0..self.ages {
            for area in 0..self.areas {
                self[(age, year, area)] = slab[(age, area)];
            }
        }
    }

    /// Sum over ages for one year and area.
    pub fn area_total(&self, year: usize, area: usize) -> f64 {
        (0..self.ages).map(|age| self[(age, year, area)]).sum()
    }

    /// Sum over ages and areas for one year.
    pub fn year_total(&self, year: usize) -> f64 {
        (0..self.areas).map(|area| self.area_total(year, area)).sum()
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }

    fn offset(&self, age: usize, year: usize, area: usize) -> Option<usize> {
        if age < self.ages && year < self.years && area < self.areas {
            Some((year * self.areas + area) * self.ages + age)
        } else {
            None
        }
    }
}

impl Index<(usize, usize, usize)> for AgeYearArea {
    type Output = f64;

    fn index(&self, (age, year, area): (usize, usize, usize)) -> &f64 {
        match self.offset(age, year, area) {
            Some(i) => &self.data[i],
            None => panic!(
                "index (age {age}, year {year}, area {area}) outside {}x{}x{} cube",
                self.ages, self.years, self.areas
            ),
        }
    }
}

impl IndexMut<(usize, usize, usize)> for AgeYearArea {
    fn index_mut(&mut self, (age, year, area): (usize, usize, usize)) -> &mut f64 {
        match self.offset(age, year, area) {
            Some(i) => &mut self.data[i],
            None => panic!(
                "index (age {age}, year {year}, area {area}) outside {}x{}x{} cube",
                self.ages, self.years, self.areas
            ),
        }
    }
}
