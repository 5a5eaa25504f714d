//! Persistence collaborator.
//!
//! [`CardStore`] is the narrow set of reads and writes the engine needs from the
//! relational store. [`MemoryStore`] implements it over a JSON deck file and is
//! what the CLI and the tests run against.

use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::ReviewError;
use crate::item::{ScheduleRecord, Skill, StudyItem};

/// Sort direction over an item's introduction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    OlderFirst,
    NewerFirst,
}

/// Per-deck counts reported alongside a fetched session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub total_items: usize,
    pub items_due: usize,
    pub new_items: usize,
}

pub trait CardStore {
    /// The user's new-items-per-day setting, if they have one.
    fn per_day_max(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<u32>, ReviewError>> + Send;

    /// Number of items first reviewed at or after `since`.
    fn new_items_introduced_since(
        &self,
        user_id: &str,
        since: i64,
    ) -> impl Future<Output = Result<usize, ReviewError>> + Send;

    /// Reviewed items of one skill that are due at `now`, ordered by first review.
    fn due_items(
        &self,
        user_id: &str,
        deck_id: i64,
        skill: Skill,
        order: Order,
        now: i64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<StudyItem>, ReviewError>> + Send;

    /// Never-scheduled items, ordered by creation.
    fn new_items(
        &self,
        user_id: &str,
        deck_id: i64,
        order: Order,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<StudyItem>, ReviewError>> + Send;

    /// Items with a pending failure, oldest failure first.
    fn failed_items(
        &self,
        user_id: &str,
        deck_id: i64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<StudyItem>, ReviewError>> + Send;

    fn find_item(
        &self,
        user_id: &str,
        quiz_id: i64,
    ) -> impl Future<Output = Result<Option<StudyItem>, ReviewError>> + Send;

    /// Overwrites the scheduling fields and counters of one quiz.
    fn save_schedule(
        &self,
        quiz_id: i64,
        record: ScheduleRecord,
    ) -> impl Future<Output = Result<(), ReviewError>> + Send;

    /// Marks (or with `0`, clears) a pending failure.
    fn set_last_failure(
        &self,
        quiz_id: i64,
        at: i64,
    ) -> impl Future<Output = Result<(), ReviewError>> + Send;

    fn deck_stats(
        &self,
        user_id: &str,
        deck_id: i64,
        now: i64,
    ) -> impl Future<Output = Result<DeckStats, ReviewError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_id: String,
    pub per_day_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    pub user_id: String,
    #[serde(flatten)]
    pub item: StudyItem,
}

/// On-disk layout of a deck file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckFile {
    #[serde(default)]
    pub users: Vec<UserSettings>,
    #[serde(default)]
    pub items: Vec<StoredItem>,
}

/// In-process store backed by a [`DeckFile`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<DeckFile>,
}

impl MemoryStore {
    pub fn new(data: DeckFile) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ReviewError> {
        let contents = std::fs::read_to_string(path)?;
        let data: DeckFile = serde_json::from_str(&contents)?;
        log::debug!(
            "loaded {} items for {} users from {}",
            data.items.len(),
            data.users.len(),
            path.display()
        );
        Ok(Self::new(data))
    }

    pub fn save(&self, path: &Path) -> Result<(), ReviewError> {
        let json = serde_json::to_string_pretty(&*self.lock()?)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<DeckFile, ReviewError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, DeckFile>, ReviewError> {
        self.data
            .lock()
            .map_err(|_| ReviewError::Collaborator("deck store lock poisoned".into()))
    }

    fn select<F, K>(
        &self,
        user_id: &str,
        deck_id: i64,
        keep: F,
        key: K,
        order: Order,
        limit: usize,
    ) -> Result<Vec<StudyItem>, ReviewError>
    where
        F: Fn(&StudyItem) -> bool,
        K: Fn(&StudyItem) -> (i64, i64),
    {
        let data = self.lock()?;
        let mut rows: Vec<&StudyItem> = data
            .items
            .iter()
            .filter(|row| row.user_id == user_id && row.item.deck_id == deck_id)
            .map(|row| &row.item)
            .filter(|item| keep(*item))
            .collect();
        rows.sort_by_key(|item| key(*item));
        if order == Order::NewerFirst {
            rows.reverse();
        }
        Ok(rows.into_iter().take(limit).cloned().collect())
    }

    fn update<F>(&self, quiz_id: i64, apply: F) -> Result<(), ReviewError>
    where
        F: FnOnce(&mut StudyItem),
    {
        let mut data = self.lock()?;
        let row = data
            .items
            .iter_mut()
            .find(|row| row.item.quiz_id == quiz_id)
            .ok_or_else(|| ReviewError::Collaborator(format!("quiz {quiz_id} does not exist")))?;
        apply(&mut row.item);
        Ok(())
    }
}

impl CardStore for MemoryStore {
    async fn per_day_max(&self, user_id: &str) -> Result<Option<u32>, ReviewError> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| u.per_day_max))
    }

    async fn new_items_introduced_since(
        &self,
        user_id: &str,
        since: i64,
    ) -> Result<usize, ReviewError> {
        Ok(self
            .lock()?
            .items
            .iter()
            .filter(|row| row.user_id == user_id)
            .filter(|row| {
                let first = row.item.schedule.first_review_at;
                first > 0 && first >= since
            })
            .count())
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
        self.select(
            user_id,
            deck_id,
            |item| item.skill == skill && item.schedule.is_due(now),
            |item| (item.schedule.first_review_at, item.quiz_id),
            order,
            limit,
        )
    }

    async fn new_items(
        &self,
        user_id: &str,
        deck_id: i64,
        order: Order,
        limit: usize,
    ) -> Result<Vec<StudyItem>, ReviewError> {
        self.select(
            user_id,
            deck_id,
            |item| item.schedule.is_new(),
            |item| (item.quiz_id, 0),
            order,
            limit,
        )
    }

    async fn failed_items(
        &self,
        user_id: &str,
        deck_id: i64,
        limit: usize,
    ) -> Result<Vec<StudyItem>, ReviewError> {
        self.select(
            user_id,
            deck_id,
            |item| item.last_failure > 0,
            |item| (item.last_failure, item.quiz_id),
            Order::OlderFirst,
            limit,
        )
    }

    async fn find_item(
        &self,
        user_id: &str,
        quiz_id: i64,
    ) -> Result<Option<StudyItem>, ReviewError> {
        Ok(self
            .lock()?
            .items
            .iter()
            .find(|row| row.user_id == user_id && row.item.quiz_id == quiz_id)
            .map(|row| row.item.clone()))
    }

    async fn save_schedule(&self, quiz_id: i64, record: ScheduleRecord) -> Result<(), ReviewError> {
        self.update(quiz_id, |item| item.schedule = record)
    }

    async fn set_last_failure(&self, quiz_id: i64, at: i64) -> Result<(), ReviewError> {
        self.update(quiz_id, |item| item.last_failure = at)
    }

    async fn deck_stats(
        &self,
        user_id: &str,
        deck_id: i64,
        now: i64,
    ) -> Result<DeckStats, ReviewError> {
        let data = self.lock()?;
        let mut stats = DeckStats::default();
        for row in data
            .items
            .iter()
            .filter(|row| row.user_id == user_id && row.item.deck_id == deck_id)
        {
            stats.total_items += 1;
            if row.item.schedule.is_new() {
                stats.new_items += 1;
            } else if row.item.schedule.is_due(now) {
                stats.items_due += 1;
            }
        }
        Ok(stats)
    }
}
