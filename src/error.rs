//! Error taxonomy for the projection core.

/// Result type alias using the projection error.
pub type Result<T> = std::result::Result<T, ProjectionError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    /// Stock-recruit inputs that produce an undefined or non-finite recruitment.
    #[error("degenerate recruitment in area {area}: {reason}")]
    DegenerateRecruitment { area: usize, reason: String },

    /// A movement row that does not distribute exactly all of its source abundance.
    #[error(
        "invalid movement field in year {year}, age {age}: fractions from area {from} sum to {sum}"
    )]
    InvalidMovementField {
        year: usize,
        age: usize,
        from: usize,
        sum: f64,
    },

    /// No effort can be placed because every area is closed or holds no vulnerable biomass.
    #[error("effort allocation in year {year} has no open area to fish")]
    DegenerateEffortAllocation { year: usize },

    #[error("{what} out of range at age {age}, year {year}, area {area}: {value}")]
    OutOfRangeMortality {
        what: &'static str,
        age: usize,
        year: usize,
        area: usize,
        value: f64,
    },

    #[error("{what} has shape {found}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
