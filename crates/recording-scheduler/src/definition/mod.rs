//! Things the planner is asked to place: recordings and periodic tasks.

pub mod periodic;
pub mod recording;
pub mod recurrence;

pub use periodic::{PeriodicTask, RunInterval};
pub use recording::{
    MINIMUM_START_YEAR, PlanException, RecordingDefinition, RecordingDefinitionBuilder,
    RepeatPattern,
};
pub use recurrence::{Occurrence, OccurrenceCursor, Occurrences};
