pub mod deviations;
pub mod effort;
pub mod error;
pub mod grid;
pub mod logging;
pub mod movement;
pub mod projection;
pub mod recruitment;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod summary;
pub mod transition;

pub use effort::{ClosureSchedule, FishingControl, FullClosurePolicy};
pub use error::{ProjectionError, Result};
pub use projection::{project, ProjectionInputs, ProjectionOutput, RecruitmentDeviations};
pub use recruitment::StockRecruit;
pub use scenario::Scenario;
