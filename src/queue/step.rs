//! Queue steps: the stages an admitted item expands into.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::{LessonKind, Skill, StudyItem};

/// The six stages a study item can pass through in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    NewIntro,
    NewOutro,
    Listening,
    Speaking,
    RemedialIntro,
    RemedialOutro,
}

impl StepKind {
    /// Queue scan order when looking for the current step.
    ///
    /// Intros come before outros of the same item; remedial work sits right
    /// behind brand-new introductions so it is never starved by drills.
    pub const PRIORITY: [StepKind; 6] = [
        StepKind::NewIntro,
        StepKind::RemedialIntro,
        StepKind::Listening,
        StepKind::Speaking,
        StepKind::NewOutro,
        StepKind::RemedialOutro,
    ];

    /// Steps an admitted item expands into, in the order they are queued.
    pub fn for_item(item: &StudyItem) -> &'static [StepKind] {
        match (item.lesson, item.skill) {
            (LessonKind::New, _) => &[StepKind::NewIntro, StepKind::NewOutro],
            (LessonKind::Remedial, _) => &[StepKind::RemedialIntro, StepKind::RemedialOutro],
            (LessonKind::Review, Skill::Listening) => &[StepKind::Listening],
            (LessonKind::Review, Skill::Speaking) => &[StepKind::Speaking],
        }
    }

    /// Whether this step expects a spoken attempt that gets graded.
    pub fn is_graded(&self) -> bool {
        !matches!(self, StepKind::NewIntro | StepKind::RemedialIntro)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::NewIntro => write!(f, "NEW_INTRO"),
            StepKind::NewOutro => write!(f, "NEW_OUTRO"),
            StepKind::Listening => write!(f, "LISTENING"),
            StepKind::Speaking => write!(f, "SPEAKING"),
            StepKind::RemedialIntro => write!(f, "REMEDIAL_INTRO"),
            StepKind::RemedialOutro => write!(f, "REMEDIAL_OUTRO"),
        }
    }
}

/// One pending step of one admitted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub item_uuid: Uuid,
    pub step_kind: StepKind,
    pub step_uuid: Uuid,
}

impl QueueItem {
    pub fn new(item_uuid: Uuid, step_kind: StepKind) -> Self {
        Self {
            item_uuid,
            step_kind,
            step_uuid: Uuid::new_v4(),
        }
    }
}

/// Opaque handle to a captured recording, e.g. a file path or blob key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioRef(pub String);

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of grading one attempt, kept per item until overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub transcription: String,
    pub is_correct: bool,
    pub feedback: String,
}
