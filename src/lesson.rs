//! The lesson service: the three external calls plus give-up.
//!
//! Wires the selector, the grading pipeline and the scheduler to one
//! [`CardStore`]. Queue state is not held here; callers keep a
//! [`SessionState`](crate::queue::SessionState) per session and feed it the
//! results of these calls as actions.

use std::sync::{Mutex, MutexGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, UsageError};
use crate::grading::{Evaluator, Judge, TrainingLog, Verdict};
use crate::item::{ScheduleRecord, StudyItem};
use crate::queue::GradingResult;
use crate::scheduler::{Grade, Scheduler, apply_update};
use crate::selector::{SelectorConfig, SessionResponse, finalize, gather_candidates};
use crate::store::CardStore;
use crate::users::ApprovedUsers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub deck_id: i64,
    pub take: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    /// Session identity of the item; negative for remedial records.
    pub item_id: i64,
    /// 1 (again) to 4 (easy).
    pub perceived_difficulty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingRequest {
    pub attempt_text: String,
    pub item_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingResponse {
    pub is_correct: bool,
    pub feedback: String,
}

impl SpeakingResponse {
    /// The queue-side record of this verdict.
    pub fn grading_result(&self, transcription: &str) -> GradingResult {
        GradingResult {
            transcription: transcription.to_string(),
            is_correct: self.is_correct,
            feedback: self.feedback.clone(),
        }
    }
}

pub struct Lesson<S, J, L> {
    store: S,
    evaluator: Evaluator<J, L>,
    scheduler: Scheduler,
    selector: SelectorConfig,
    users: ApprovedUsers,
    rng: Mutex<StdRng>,
}

impl<S, J, L> Lesson<S, J, L>
where
    S: CardStore + Sync,
    J: Judge + Sync,
    L: TrainingLog + Sync,
{
    pub fn new(
        store: S,
        evaluator: Evaluator<J, L>,
        scheduler: Scheduler,
        selector: SelectorConfig,
        users: ApprovedUsers,
    ) -> Self {
        Self {
            store,
            evaluator,
            scheduler,
            selector,
            users,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replaces the randomness used for shuffling and fuzzing.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn evaluator(&self) -> &Evaluator<J, L> {
        &self.evaluator
    }

    pub async fn fetch_session(
        &self,
        user_id: &str,
        req: &SessionRequest,
        now: i64,
    ) -> Result<SessionResponse, ReviewError> {
        self.users.check(user_id)?;
        let candidates =
            gather_candidates(&self.store, &self.selector, user_id, req.deck_id, now, req.take)
                .await?;
        let stats = self.store.deck_stats(user_id, req.deck_id, now).await?;

        let items = finalize(candidates, req.take, &mut *self.lock_rng()?);
        log::info!(
            "session for {user_id} deck {}: {} items ({} due, {} new in deck)",
            req.deck_id,
            items.len(),
            stats.items_due,
            stats.new_items
        );
        Ok(SessionResponse::new(items, stats))
    }

    /// Schedules an item from the learner's own difficulty rating.
    pub async fn submit_grade(
        &self,
        user_id: &str,
        req: &GradeRequest,
        now: i64,
    ) -> Result<ScheduleRecord, ReviewError> {
        self.users.check(user_id)?;
        let grade = Grade::try_from(req.perceived_difficulty)?;
        let item = self.load(user_id, req.item_id).await?;

        let record = self.reschedule(&item, grade, now).await?;
        if grade != Grade::Again && item.last_failure > 0 {
            self.store.set_last_failure(item.quiz_id, 0).await?;
        }
        Ok(record)
    }

    /// Grades a typed or transcribed attempt. A wrong answer marks the item
    /// failed so it is re-drilled; scheduling is left to [`Self::submit_grade`].
    pub async fn grade_speaking(
        &self,
        user_id: &str,
        req: &SpeakingRequest,
        now: i64,
    ) -> Result<SpeakingResponse, ReviewError> {
        self.users.check(user_id)?;
        let item = self.load(user_id, req.item_id).await?;

        let evaluation = self
            .evaluator
            .evaluate(
                item.skill.as_str(),
                &req.attempt_text,
                &item.term,
                &item.definition,
                &item.lang_code,
            )
            .await;

        match evaluation.result {
            Verdict::Pass => Ok(SpeakingResponse {
                is_correct: true,
                feedback: evaluation.user_message,
            }),
            Verdict::Fail => {
                self.store.set_last_failure(item.quiz_id, now).await?;
                Ok(SpeakingResponse {
                    is_correct: false,
                    feedback: evaluation.user_message,
                })
            }
            Verdict::Error => Err(ReviewError::Collaborator(evaluation.user_message)),
        }
    }

    /// Records a forced failure: the item is re-drilled and scheduled as Again.
    pub async fn give_up(
        &self,
        user_id: &str,
        item_id: i64,
        now: i64,
    ) -> Result<ScheduleRecord, ReviewError> {
        self.users.check(user_id)?;
        let item = self.load(user_id, item_id).await?;
        self.store.set_last_failure(item.quiz_id, now).await?;
        self.reschedule(&item, Grade::Again, now).await
    }

    // Remedial ids are the negated quiz id.
    async fn load(&self, user_id: &str, item_id: i64) -> Result<StudyItem, ReviewError> {
        self.store
            .find_item(user_id, item_id.abs())
            .await?
            .ok_or_else(|| UsageError::ItemNotFound(item_id).into())
    }

    async fn reschedule(
        &self,
        item: &StudyItem,
        grade: Grade,
        now: i64,
    ) -> Result<ScheduleRecord, ReviewError> {
        let update = {
            let mut rng = self.lock_rng()?;
            self.scheduler
                .compute_schedule(&item.schedule, grade, now, &mut *rng)?
        };
        let record = apply_update(&item.schedule, &update, grade, now);
        self.store.save_schedule(item.quiz_id, record).await?;
        log::debug!(
            "quiz {} graded {grade}: next review at {}",
            item.quiz_id,
            record.next_review_at
        );
        Ok(record)
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, StdRng>, ReviewError> {
        self.rng
            .lock()
            .map_err(|_| ReviewError::Invariant("lesson rng lock poisoned".into()))
    }
}
