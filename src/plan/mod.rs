pub mod model;
pub mod planner;
pub mod version;

pub use model::{PlanItem, UpdateBatch};
pub use planner::{BatchPlanner, DEFAULT_MAX_BATCH_SIZE};
