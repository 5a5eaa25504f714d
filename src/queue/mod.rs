mod state;
mod step;

pub use state::{Action, SessionState};
pub use step::{AudioRef, GradingResult, QueueItem, StepKind};
