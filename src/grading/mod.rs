//! Grading pipeline: turns a transcribed attempt into a pass, fail or error.
//!
//! Each skill runs a cascade that starts with a free local comparison and only
//! then asks the remote judge. Remote equivalence is asked twice at once and
//! the attempt passes if either answer is yes: a wrong rejection costs the
//! learner more than a wrong acceptance. A collaborator failure is reported as
//! [`Verdict::Error`] and never as a pass.

mod judge;
mod normalize;
mod telemetry;

pub use judge::{EquivalenceQuery, Judge, LlmJudge};
pub use normalize::{is_exact_match, normalize};
pub use telemetry::{
    ChannelTrainingLog, MemoryTrainingLog, NoTraining, TrainingEntry, TrainingLog,
};

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::item::Skill;

pub const UNKNOWN_QUIZ_TYPE: &str = "unknown quiz type";
const GRADING_UNAVAILABLE: &str = "Grading is unavailable right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// Not graded. The attempt may be retried.
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub result: Verdict,
    pub user_message: String,
}

impl Evaluation {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            result: Verdict::Pass,
            user_message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            result: Verdict::Fail,
            user_message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            result: Verdict::Error,
            user_message: message.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.result == Verdict::Pass
    }
}

/// The card fields an attempt is graded against.
#[derive(Debug, Clone, Copy)]
struct Target<'a> {
    term: &'a str,
    definition: &'a str,
    lang_code: &'a str,
}

pub struct Evaluator<J, L> {
    judge: J,
    log: L,
}

impl<J: Judge + Sync, L: TrainingLog + Sync> Evaluator<J, L> {
    pub fn new(judge: J, log: L) -> Self {
        Self { judge, log }
    }

    pub fn judge(&self) -> &J {
        &self.judge
    }

    /// Grades one attempt. Unknown skill kinds yield an error verdict instead
    /// of failing the whole session.
    pub async fn evaluate(
        &self,
        skill_kind: &str,
        attempt: &str,
        term: &str,
        definition: &str,
        lang_code: &str,
    ) -> Evaluation {
        let skill = match skill_kind.parse::<Skill>() {
            Ok(skill) => skill,
            Err(e) => {
                log::warn!("cannot grade attempt: {e}");
                return Evaluation::error(UNKNOWN_QUIZ_TYPE);
            }
        };
        let target = Target {
            term,
            definition,
            lang_code,
        };
        match skill {
            Skill::Speaking => self.speaking(attempt, target).await,
            Skill::Listening => self.listening(attempt, target).await,
        }
    }

    async fn speaking(&self, attempt: &str, target: Target<'_>) -> Evaluation {
        if is_exact_match(attempt, target.term) {
            return Evaluation::pass("Exact match.");
        }

        let query = EquivalenceQuery {
            skill: Skill::Speaking,
            expected: target.term,
            attempt,
            lang_code: target.lang_code,
        };
        let evaluation = match self.either_equivalent(&query).await {
            Err(e) => return collaborator_failure(&e),
            Ok(false) => Evaluation::fail(format!("Expected: {}", target.term)),
            Ok(true) => match self.judge.correction(attempt, target.lang_code).await {
                Err(e) => return collaborator_failure(&e),
                Ok(Some(corrected)) if normalize(&corrected) != normalize(attempt) => {
                    Evaluation::fail(format!("Almost! Corrected: {corrected}"))
                }
                Ok(_) => Evaluation::pass("Correct."),
            },
        };

        self.record(Skill::Speaking, &evaluation, attempt, target);
        evaluation
    }

    // The learner answers in their own language, so there is no grammar pass.
    async fn listening(&self, attempt: &str, target: Target<'_>) -> Evaluation {
        if is_exact_match(attempt, target.definition) {
            return Evaluation::pass("Exact match.");
        }

        let query = EquivalenceQuery {
            skill: Skill::Listening,
            expected: target.definition,
            attempt,
            lang_code: target.lang_code,
        };
        let evaluation = match self.either_equivalent(&query).await {
            Err(e) => return collaborator_failure(&e),
            Ok(true) => Evaluation::pass("Correct."),
            Ok(false) => Evaluation::fail(format!("It means: {}", target.definition)),
        };

        self.record(Skill::Listening, &evaluation, attempt, target);
        evaluation
    }

    async fn either_equivalent(&self, query: &EquivalenceQuery<'_>) -> Result<bool, ReviewError> {
        let (first, second) = tokio::join!(self.judge.equivalent(query), self.judge.equivalent(query));
        reconcile(first, second)
    }

    fn record(&self, skill: Skill, evaluation: &Evaluation, attempt: &str, target: Target<'_>) {
        let entry = TrainingEntry {
            skill,
            verdict: evaluation.result,
            attempt: attempt.to_string(),
            term: target.term.to_string(),
            definition: target.definition.to_string(),
            lang_code: target.lang_code.to_string(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.log.record(entry) {
            log::warn!("training telemetry dropped: {e}");
        }
    }
}

/// Any affirmative wins; otherwise an error wins over a negative.
fn reconcile(
    first: Result<bool, ReviewError>,
    second: Result<bool, ReviewError>,
) -> Result<bool, ReviewError> {
    match (first, second) {
        (Ok(true), _) | (_, Ok(true)) => Ok(true),
        (Err(e), _) | (_, Err(e)) => Err(e),
        _ => Ok(false),
    }
}

fn collaborator_failure(err: &ReviewError) -> Evaluation {
    log::warn!("grading collaborator failed: {err}");
    Evaluation::error(GRADING_UNAVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingTrainingLog, Reply, ScriptedJudge};

    fn evaluator(judge: ScriptedJudge) -> Evaluator<ScriptedJudge, MemoryTrainingLog> {
        Evaluator::new(judge, MemoryTrainingLog::default())
    }

    async fn speak(ev: &Evaluator<ScriptedJudge, MemoryTrainingLog>, attempt: &str) -> Evaluation {
        ev.evaluate("speaking", attempt, "Ich bin müde.", "I am tired.", "de")
            .await
    }

    #[tokio::test]
    async fn exact_match_never_calls_the_judge() {
        let ev = evaluator(ScriptedJudge::new(&[Reply::No, Reply::No]));
        let result = speak(&ev, "ich bin Müde").await;

        assert_eq!(result.result, Verdict::Pass);
        assert_eq!(ev.judge().calls(), 0);
        assert!(ev.log.entries().is_empty());
    }

    #[tokio::test]
    async fn unknown_skill_is_an_error_result() {
        let ev = evaluator(ScriptedJudge::new(&[]));
        let result = ev.evaluate("dictation", "x", "y", "z", "de").await;

        assert_eq!(result.result, Verdict::Error);
        assert_eq!(result.user_message, UNKNOWN_QUIZ_TYPE);
        assert_eq!(ev.judge().calls(), 0);
    }

    #[tokio::test]
    async fn either_affirmative_passes_in_any_order() {
        for replies in [[Reply::No, Reply::Yes], [Reply::Yes, Reply::No]] {
            let ev = evaluator(ScriptedJudge::new(&replies));
            let result = speak(&ev, "Ich bin sehr müde").await;
            assert_eq!(result.result, Verdict::Pass, "{replies:?}");
            assert_eq!(ev.judge().equivalence_calls(), 2);
            assert_eq!(ev.judge().correction_calls(), 1);
        }
    }

    #[tokio::test]
    async fn two_negatives_fail_and_are_recorded() {
        let ev = evaluator(ScriptedJudge::new(&[Reply::No, Reply::No]));
        let result = speak(&ev, "Ich habe Hunger").await;

        assert_eq!(result.result, Verdict::Fail);
        assert!(result.user_message.contains("Ich bin müde."));
        assert_eq!(ev.judge().correction_calls(), 0);

        let entries = ev.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].verdict, Verdict::Fail);
        assert_eq!(entries[0].attempt, "Ich habe Hunger");
    }

    #[tokio::test]
    async fn error_without_affirmative_is_never_a_pass() {
        for replies in [[Reply::Fail, Reply::No], [Reply::No, Reply::Fail]] {
            let ev = evaluator(ScriptedJudge::new(&replies));
            let result = speak(&ev, "Ich habe Hunger").await;
            assert_eq!(result.result, Verdict::Error, "{replies:?}");
            assert!(ev.log.entries().is_empty());
        }
    }

    #[tokio::test]
    async fn error_beside_affirmative_still_passes() {
        let ev = evaluator(ScriptedJudge::new(&[Reply::Fail, Reply::Yes]));
        assert_eq!(speak(&ev, "Ich bin sehr müde").await.result, Verdict::Pass);
    }

    #[tokio::test]
    async fn meaningful_correction_downgrades_to_fail() {
        let judge = ScriptedJudge::new(&[Reply::Yes, Reply::Yes])
            .with_correction(Reply::Text("Ich bin sehr müde."));
        let ev = evaluator(judge);
        let result = speak(&ev, "Ich bin sehr mude").await;

        assert_eq!(result.result, Verdict::Fail);
        assert!(result.user_message.contains("Ich bin sehr müde."));
        assert_eq!(ev.log.entries()[0].verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn cosmetic_correction_still_passes() {
        let judge = ScriptedJudge::new(&[Reply::Yes, Reply::No])
            .with_correction(Reply::Text("Ich bin sehr müde!"));
        let ev = evaluator(judge);
        let result = speak(&ev, "ich bin sehr müde").await;

        assert_eq!(result.result, Verdict::Pass);
        assert_eq!(ev.log.entries()[0].verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn failed_correction_is_an_error() {
        let judge = ScriptedJudge::new(&[Reply::Yes, Reply::Yes]).with_correction(Reply::Fail);
        let ev = evaluator(judge);
        assert_eq!(speak(&ev, "Ich bin sehr müde").await.result, Verdict::Error);
    }

    #[tokio::test]
    async fn listening_skips_the_grammar_pass() {
        let judge = ScriptedJudge::new(&[Reply::Yes, Reply::Yes])
            .with_correction(Reply::Text("something else entirely"));
        let ev = evaluator(judge);
        let result = ev
            .evaluate("listening", "I'm tired", "Ich bin müde.", "I am tired.", "de")
            .await;

        assert_eq!(result.result, Verdict::Pass);
        assert_eq!(ev.judge().correction_calls(), 0);
        assert_eq!(ev.log.entries()[0].skill, Skill::Listening);
    }

    #[tokio::test]
    async fn listening_exact_match_compares_with_definition() {
        let ev = evaluator(ScriptedJudge::new(&[]));
        let result = ev
            .evaluate("listening", "i am tired", "Ich bin müde.", "I am tired.", "de")
            .await;
        assert_eq!(result.result, Verdict::Pass);
        assert_eq!(ev.judge().calls(), 0);
    }

    #[tokio::test]
    async fn telemetry_failure_does_not_change_the_verdict() {
        let ev = Evaluator::new(
            ScriptedJudge::new(&[Reply::No, Reply::No]),
            FailingTrainingLog,
        );
        let result = ev
            .evaluate("speaking", "Ich habe Hunger", "Ich bin müde.", "I am tired.", "de")
            .await;
        assert_eq!(result.result, Verdict::Fail);
    }

    #[test]
    fn reconcile_is_order_independent() {
        let err = || Err(ReviewError::Collaborator("down".into()));
        assert!(reconcile(Ok(false), Ok(true)).unwrap());
        assert!(reconcile(err(), Ok(true)).unwrap());
        assert!(!reconcile(Ok(false), Ok(false)).unwrap());
        assert!(reconcile(Ok(false), err()).is_err());
        assert!(reconcile(err(), err()).is_err());
    }
}
