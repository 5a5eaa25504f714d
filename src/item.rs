//! Study items: the (card, skill) pairs the engine selects, queues and schedules.
//!
//! Timestamps are epoch milliseconds; `0` means "never".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// The skill a quiz exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    /// Hear the target-language term, answer with its meaning.
    Listening,
    /// See the meaning, say the target-language term.
    Speaking,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Listening => "listening",
            Skill::Speaking => "speaking",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Skill {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listening" => Ok(Skill::Listening),
            "speaking" => Ok(Skill::Speaking),
            other => Err(UsageError::UnknownSkill(other.to_string())),
        }
    }
}

/// Why an item was admitted into the current session.
///
/// Decides how many queue steps the item expands into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    /// Never scheduled before.
    #[default]
    New,
    /// Due for its regular review.
    Review,
    /// Failed recently, re-drilled before returning to rotation.
    Remedial,
}

/// Persisted scheduling fields for one quiz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleRecord {
    pub difficulty: f64,
    pub stability: f64,
    pub repetitions: u32,
    pub lapses: u32,
    pub first_review_at: i64,
    pub last_review_at: i64,
    pub next_review_at: i64,
}

impl ScheduleRecord {
    /// True when the item has never been scheduled. Only the counters decide this.
    pub fn is_new(&self) -> bool {
        self.repetitions + self.lapses == 0
    }

    pub fn is_due(&self, now: i64) -> bool {
        !self.is_new() && self.next_review_at > 0 && self.next_review_at <= now
    }
}

/// A (card, skill) scheduling unit as seen by the session engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyItem {
    /// Session identity. Equal to `quiz_id` for persisted rows, negative for
    /// synthesized remedial records.
    pub id: i64,
    /// Persisted quiz row this item reads from and writes back to.
    pub quiz_id: i64,
    pub card_id: i64,
    pub deck_id: i64,
    pub skill: Skill,
    pub term: String,
    pub definition: String,
    pub lang_code: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub schedule: ScheduleRecord,
    /// Epoch ms of the most recent failed attempt, `0` when none is pending.
    #[serde(default)]
    pub last_failure: i64,
    #[serde(default)]
    pub lesson: LessonKind,
}

impl StudyItem {
    pub fn with_lesson(mut self, lesson: LessonKind) -> Self {
        self.lesson = lesson;
        self
    }

    /// Builds the session-only record used to re-drill a failed quiz.
    ///
    /// The negated quiz id keeps synthetic identities disjoint from persisted
    /// ones, and `repetitions = 1` keeps the item off the first-review branch.
    pub fn remedial(&self) -> Self {
        let mut item = self.clone();
        item.id = -self.quiz_id.abs();
        item.schedule.repetitions = 1;
        item.lesson = LessonKind::Remedial;
        item
    }
}
