mod controller;
mod engine;
mod snapshot;

pub use controller::{CleanupController, CleanupSchedule};
pub use engine::{CleanupEngine, RetentionPolicy};
pub use snapshot::snapshot_version;
