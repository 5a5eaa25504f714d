//! Shared fixtures and collaborator doubles for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::anthropic::{
    AnthropicError, ContentBlock, MessageSender, MessagesRequest, MessagesResponse, Usage,
};
use crate::error::ReviewError;
use crate::grading::{EquivalenceQuery, Judge, TrainingEntry, TrainingLog};
use crate::item::{LessonKind, ScheduleRecord, Skill, StudyItem};
use crate::store::{CardStore, DeckFile, DeckStats, MemoryStore, Order, StoredItem, UserSettings};

pub const USER: &str = "u1";

/// A never-scheduled item in deck 1.
pub fn item(quiz_id: i64, card_id: i64, skill: Skill) -> StudyItem {
    StudyItem {
        id: quiz_id,
        quiz_id,
        card_id,
        deck_id: 1,
        skill,
        term: format!("term {card_id}"),
        definition: format!("definition {card_id}"),
        lang_code: "ko".into(),
        gender: "N".into(),
        schedule: ScheduleRecord::default(),
        last_failure: 0,
        lesson: LessonKind::New,
    }
}

/// An item that has been reviewed at least once.
pub fn reviewed_item(
    quiz_id: i64,
    card_id: i64,
    skill: Skill,
    first_review_at: i64,
    next_review_at: i64,
) -> StudyItem {
    let mut item = item(quiz_id, card_id, skill);
    item.schedule = ScheduleRecord {
        difficulty: 5.0,
        stability: 3.0,
        repetitions: 2,
        lapses: 0,
        first_review_at,
        last_review_at: first_review_at,
        next_review_at,
    };
    item
}

/// Deck file owned by [`USER`], who may take 10 new items per day.
pub fn deck(items: Vec<StudyItem>) -> DeckFile {
    DeckFile {
        users: vec![UserSettings {
            user_id: USER.into(),
            per_day_max: 10,
        }],
        items: items
            .into_iter()
            .map(|item| StoredItem {
                user_id: USER.into(),
                item,
            })
            .collect(),
    }
}

/// Counts every call that reaches the wrapped store.
pub struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CardStore for CountingStore {
    async fn per_day_max(&self, user_id: &str) -> Result<Option<u32>, ReviewError> {
        self.tick();
        self.inner.per_day_max(user_id).await
    }

    async fn new_items_introduced_since(
        &self,
        user_id: &str,
        since: i64,
    ) -> Result<usize, ReviewError> {
        self.tick();
        self.inner.new_items_introduced_since(user_id, since).await
    }

    async fn due_items(
        &self,
        user_id: &str,
        deck_id: i64,
        skill: Skill,
        order: Order,
        now: i64,
        limit: usize,
    ) -> Result<Vec<StudyItem>, ReviewError> {
        self.tick();
        self.inner
            .due_items(user_id, deck_id, skill, order, now, limit)
            .await
    }

    async fn new_items(
        &self,
        user_id: &str,
        deck_id: i64,
        order: Order,
        limit: usize,
    ) -> Result<Vec<StudyItem>, ReviewError> {
        self.tick();
        self.inner.new_items(user_id, deck_id, order, limit).await
    }

    async fn failed_items(
        &self,
        user_id: &str,
        deck_id: i64,
        limit: usize,
    ) -> Result<Vec<StudyItem>, ReviewError> {
        self.tick();
        self.inner.failed_items(user_id, deck_id, limit).await
    }

    async fn find_item(
        &self,
        user_id: &str,
        quiz_id: i64,
    ) -> Result<Option<StudyItem>, ReviewError> {
        self.tick();
        self.inner.find_item(user_id, quiz_id).await
    }

    async fn save_schedule(&self, quiz_id: i64, record: ScheduleRecord) -> Result<(), ReviewError> {
        self.tick();
        self.inner.save_schedule(quiz_id, record).await
    }

    async fn set_last_failure(&self, quiz_id: i64, at: i64) -> Result<(), ReviewError> {
        self.tick();
        self.inner.set_last_failure(quiz_id, at).await
    }

    async fn deck_stats(
        &self,
        user_id: &str,
        deck_id: i64,
        now: i64,
    ) -> Result<DeckStats, ReviewError> {
        self.tick();
        self.inner.deck_stats(user_id, deck_id, now).await
    }
}

/// Replies with a fixed text, or fails every call.
pub struct ScriptedSender {
    reply: Option<String>,
    requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedSender {
    pub fn ok(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl MessageSender for ScriptedSender {
    async fn send_message(&self, req: &MessagesRequest) -> Result<MessagesResponse, AnthropicError> {
        self.requests.lock().unwrap().push(req.clone());
        let text = self.reply.clone().ok_or(AnthropicError::ApiError {
            status: 529,
            message: "overloaded".into(),
        })?;
        Ok(MessagesResponse {
            id: "msg_test".into(),
            content: vec![ContentBlock {
                content_type: "text".into(),
                text,
            }],
            model: req.model.clone(),
            stop_reason: Some("end_turn".into()),
            usage: Usage::default(),
        })
    }
}

/// One scripted judge answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Yes,
    No,
    Fail,
    Text(&'static str),
}

/// Judge that answers equivalence calls from a queue (defaulting to
/// [`Reply::No`]) and every correction call with one fixed reply.
pub struct ScriptedJudge {
    equivalence: Mutex<VecDeque<Reply>>,
    correction: Reply,
    equivalence_calls: AtomicUsize,
    correction_calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn new(equivalence: &[Reply]) -> Self {
        Self {
            equivalence: Mutex::new(equivalence.iter().copied().collect()),
            correction: Reply::No,
            equivalence_calls: AtomicUsize::new(0),
            correction_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_correction(mut self, reply: Reply) -> Self {
        self.correction = reply;
        self
    }

    pub fn equivalence_calls(&self) -> usize {
        self.equivalence_calls.load(Ordering::SeqCst)
    }

    pub fn correction_calls(&self) -> usize {
        self.correction_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.equivalence_calls() + self.correction_calls()
    }
}

fn unavailable() -> ReviewError {
    ReviewError::Collaborator("judge unavailable".into())
}

impl Judge for ScriptedJudge {
    async fn equivalent(&self, _query: &EquivalenceQuery<'_>) -> Result<bool, ReviewError> {
        self.equivalence_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.equivalence.lock().unwrap().pop_front().unwrap_or(Reply::No);
        match reply {
            Reply::Yes => Ok(true),
            Reply::No | Reply::Text(_) => Ok(false),
            Reply::Fail => Err(unavailable()),
        }
    }

    async fn correction(&self, _attempt: &str, _lang_code: &str) -> Result<Option<String>, ReviewError> {
        self.correction_calls.fetch_add(1, Ordering::SeqCst);
        match self.correction {
            Reply::Text(text) => Ok(Some(text.to_string())),
            Reply::Fail => Err(unavailable()),
            Reply::Yes | Reply::No => Ok(None),
        }
    }
}

/// Training log whose writes always fail.
pub struct FailingTrainingLog;

impl TrainingLog for FailingTrainingLog {
    fn record(&self, _entry: TrainingEntry) -> Result<(), ReviewError> {
        Err(ReviewError::Collaborator("disk full".into()))
    }
}
