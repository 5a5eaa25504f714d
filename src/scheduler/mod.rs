//! Review scheduling: turns a prior memory state and a grade into the next due date.
//!
//! Pure and I/O free. Randomness for interval fuzzing is injected by the caller.

mod model;

pub use model::{Grade, MemoryModel, MemoryState, DEFAULT_WEIGHTS};

use chrono::DateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::item::{DAY_MS, HOUR_MS, MINUTE_MS, ScheduleRecord};

/// The scheduler's only output. Persisted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingUpdate {
    pub difficulty: f64,
    pub stability: f64,
    pub next_review_at: i64,
}

/// Intervals used for an item's very first review.
fn first_review_interval_ms(grade: Grade) -> i64 {
    match grade {
        Grade::Again => MINUTE_MS,
        Grade::Hard => 6 * HOUR_MS,
        Grade::Good => DAY_MS,
        Grade::Easy => 4 * DAY_MS,
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    model: MemoryModel,
    /// Half-width of the uniform interval jitter, e.g. `0.2` for ±20%.
    fuzz: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(MemoryModel::default(), 0.2)
    }
}

impl Scheduler {
    pub fn new(model: MemoryModel, fuzz: f64) -> Self {
        Self {
            model,
            fuzz: fuzz.abs(),
        }
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    /// Computes the next schedule for an item reviewed at `now` (epoch ms).
    ///
    /// Items whose counters are both zero take the first-review branch no matter
    /// what difficulty or stability is stored. Returns
    /// [`ReviewError::Invariant`] when the result is not a timestamp at or after
    /// `now`; that is a model defect and is never clamped away.
    pub fn compute_schedule<R: Rng>(
        &self,
        prior: &ScheduleRecord,
        grade: Grade,
        now: i64,
        rng: &mut R,
    ) -> Result<SchedulingUpdate, ReviewError> {
        let (state, interval_ms) = if prior.is_new() {
            let state = self.model.initial(grade);
            (state, first_review_interval_ms(grade) as f64)
        } else {
            let elapsed_days = (now - prior.last_review_at).max(0) as f64 / DAY_MS as f64;
            let state = self.model.next_state(
                MemoryState {
                    stability: prior.stability,
                    difficulty: prior.difficulty,
                },
                elapsed_days,
                grade,
            );
            (state, self.model.interval_days(state.stability) * DAY_MS as f64)
        };

        let fuzzed = interval_ms * self.fuzz_factor(rng);
        let next_review_at = checked_due(now, fuzzed).ok_or_else(|| {
            ReviewError::Invariant(format!(
                "scheduler produced invalid due date: interval {fuzzed}ms from {now} \
                 (grade {grade}, stability {}, difficulty {})",
                state.stability, state.difficulty
            ))
        })?;

        if !state.stability.is_finite() || !state.difficulty.is_finite() {
            return Err(ReviewError::Invariant(format!(
                "scheduler produced non-finite memory state: stability {}, difficulty {}",
                state.stability, state.difficulty
            )));
        }

        log::debug!(
            "scheduled grade {grade}: stability {:.3}, difficulty {:.3}, due in {:.1}h",
            state.stability,
            state.difficulty,
            (next_review_at - now) as f64 / HOUR_MS as f64
        );

        Ok(SchedulingUpdate {
            difficulty: state.difficulty,
            stability: state.stability,
            next_review_at,
        })
    }

    fn fuzz_factor<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.fuzz > 0.0 {
            1.0 + rng.gen_range(-self.fuzz..self.fuzz)
        } else {
            1.0
        }
    }
}

// `None` unless `now + interval` is a representable timestamp not before `now`.
fn checked_due(now: i64, interval_ms: f64) -> Option<i64> {
    if !interval_ms.is_finite() || interval_ms < 0.0 || interval_ms >= i64::MAX as f64 {
        return None;
    }
    let due = now.checked_add(interval_ms.round() as i64)?;
    DateTime::from_timestamp_millis(due)?;
    (due >= now).then_some(due)
}

/// Folds an update into the persisted record, advancing the review counters.
///
/// A failed review counts as a lapse, anything else as a repetition.
pub fn apply_update(
    prior: &ScheduleRecord,
    update: &SchedulingUpdate,
    grade: Grade,
    now: i64,
) -> ScheduleRecord {
    let mut record = *prior;
    record.difficulty = update.difficulty;
    record.stability = update.stability;
    record.next_review_at = update.next_review_at;
    record.last_review_at = now;
    if record.first_review_at == 0 {
        record.first_review_at = now;
    }
    match grade {
        Grade::Again => record.lapses += 1,
        _ => record.repetitions += 1,
    }
    record
}
