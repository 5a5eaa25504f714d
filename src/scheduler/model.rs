//! Stability/difficulty memory model.
//!
//! Forgetting curve `R(t, S) = (1 + F·t/S)^D` with `D = -0.5` and
//! `F = 19/81`, so that `R(S, S) = 0.9`. Stability is measured in days,
//! difficulty lives in `[1, 10]`. A lapse may take stability below the floor
//! that every other grade keeps, down to [`MIN_LAPSE_STABILITY`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;

pub const MIN_STABILITY: f64 = 0.01;
/// Floor after a lapse. Below [`MIN_STABILITY`] so a lapse always ends up
/// less stable than a successful recall of the same prior.
pub const MIN_LAPSE_STABILITY: f64 = MIN_STABILITY / 2.0;
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Default model weights.
pub const DEFAULT_WEIGHTS: [f64; 17] = [
    0.4872, 1.4003, 3.7145, 13.8206, 5.1618, 1.2298, 0.8975, 0.031, 1.6474, 0.1367, 1.0461,
    2.1072, 0.0793, 0.3246, 1.587, 0.2272, 2.8755,
];

/// Learner's self-reported recall difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    pub fn value(self) -> f64 {
        self as i64 as f64
    }
}

impl TryFrom<i64> for Grade {
    type Error = UsageError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Grade::Again),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 => Ok(Grade::Easy),
            other => Err(UsageError::InvalidGrade(other)),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Again => write!(f, "AGAIN"),
            Grade::Hard => write!(f, "HARD"),
            Grade::Good => write!(f, "GOOD"),
            Grade::Easy => write!(f, "EASY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
}

#[derive(Debug, Clone)]
pub struct MemoryModel {
    weights: [f64; 17],
    request_retention: f64,
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHTS, 0.9)
    }
}

impl MemoryModel {
    pub fn new(weights: [f64; 17], request_retention: f64) -> Self {
        Self {
            weights,
            request_retention,
        }
    }

    pub fn request_retention(&self) -> f64 {
        self.request_retention
    }

    /// State after the very first exposure, derived from the grade alone.
    pub fn initial(&self, grade: Grade) -> MemoryState {
        MemoryState {
            stability: self.initial_stability(grade),
            difficulty: self.initial_difficulty(grade),
        }
    }

    /// Probability of recall after `elapsed_days` at the given stability.
    pub fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        (1.0 + FACTOR * elapsed_days / stability.max(MIN_STABILITY)).powf(DECAY)
    }

    /// Days until retrievability decays to the requested retention.
    pub fn interval_days(&self, stability: f64) -> f64 {
        stability / FACTOR * (self.request_retention.powf(1.0 / DECAY) - 1.0)
    }

    /// Updates a reviewed item's state.
    ///
    /// Out-of-range priors are pulled back into the model's domain first.
    pub fn next_state(&self, prior: MemoryState, elapsed_days: f64, grade: Grade) -> MemoryState {
        let stability = prior.stability.max(MIN_STABILITY);
        let difficulty = prior.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let r = self.retrievability(elapsed_days.max(0.0), stability);

        let next_stability = match grade {
            Grade::Again => self
                .forget_stability(difficulty, stability, r)
                .max(MIN_LAPSE_STABILITY),
            _ => self
                .recall_stability(difficulty, stability, r, grade)
                .max(MIN_STABILITY),
        };

        MemoryState {
            stability: next_stability,
            difficulty: self.next_difficulty(difficulty, grade),
        }
    }

    fn initial_stability(&self, grade: Grade) -> f64 {
        self.weights[grade as usize - 1].max(MIN_STABILITY)
    }

    fn initial_difficulty(&self, grade: Grade) -> f64 {
        let w = &self.weights;
        (w[4] - (grade.value() - 3.0) * w[5]).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn next_difficulty(&self, difficulty: f64, grade: Grade) -> f64 {
        let w = &self.weights;
        let shifted = difficulty - w[6] * (grade.value() - 3.0);
        // Mean reversion towards the difficulty of a first "good".
        let reverted = w[7] * self.initial_difficulty(Grade::Good) + (1.0 - w[7]) * shifted;
        reverted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn recall_stability(&self, difficulty: f64, stability: f64, r: f64, grade: Grade) -> f64 {
        let w = &self.weights;
        let hard_penalty = if grade == Grade::Hard { w[15] } else { 1.0 };
        let easy_bonus = if grade == Grade::Easy { w[16] } else { 1.0 };
        stability
            * (1.0
                + w[8].exp()
                    * (11.0 - difficulty)
                    * stability.powf(-w[9])
                    * ((w[10] * (1.0 - r)).exp() - 1.0)
                    * hard_penalty
                    * easy_bonus)
    }

    fn forget_stability(&self, difficulty: f64, stability: f64, r: f64) -> f64 {
        let w = &self.weights;
        let post_lapse = w[11]
            * difficulty.powf(-w[12])
            * ((stability + 1.0).powf(w[13]) - 1.0)
            * (w[14] * (1.0 - r)).exp();
        // A lapse never leaves the item more stable than before.
        post_lapse.min(stability)
    }
}
