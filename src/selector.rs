//! Session selection: picks the due, new and failed items for one batch.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, UsageError};
use crate::item::{DAY_MS, LessonKind, Skill, StudyItem};
use crate::store::{CardStore, DeckStats, Order};

/// Limits applied while selecting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Largest `take` a caller may request.
    pub max_take: usize,
    /// Most failed items re-drilled per session.
    pub failed_cap: usize,
    /// New items per day for users without their own setting.
    pub default_per_day_max: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_take: 45,
            failed_cap: 10,
            default_per_day_max: 10,
        }
    }
}

/// Reply to a session fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub items: Vec<StudyItem>,
    pub total_items: usize,
    pub items_due: usize,
    pub new_items: usize,
}

impl SessionResponse {
    pub fn new(items: Vec<StudyItem>, stats: DeckStats) -> Self {
        Self {
            items,
            total_items: stats.total_items,
            items_due: stats.items_due,
            new_items: stats.new_items,
        }
    }
}

/// Round-robin merge: element `i` of every bucket, in bucket order, before
/// element `i + 1` of any. Stops at `cap`.
pub fn interleave<T: Clone>(buckets: &[Vec<T>], cap: usize) -> Vec<T> {
    let longest = buckets.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(cap.min(buckets.iter().map(Vec::len).sum()));
    for i in 0..longest {
        for bucket in buckets {
            if out.len() >= cap {
                return out;
            }
            if let Some(entry) = bucket.get(i) {
                out.push(entry.clone());
            }
        }
    }
    out
}

/// How many never-seen items this session may introduce.
///
/// The week is the rolling window `now - 7 days`, not a calendar week.
pub fn new_item_allowance(take: usize, per_day_max: u32, introduced_this_week: usize) -> usize {
    let weekly_cap = per_day_max as usize * 7;
    take.min(weekly_cap.saturating_sub(introduced_this_week))
}

/// Drops later entries that repeat an earlier session identity or card.
pub fn dedup_items(items: Vec<StudyItem>) -> Vec<StudyItem> {
    let mut ids = HashSet::new();
    let mut cards = HashSet::new();
    items
        .into_iter()
        .filter(|item| ids.insert(item.id))
        .filter(|item| cards.insert(item.card_id))
        .collect()
}

/// Fetches and merges every bucket for one session, without the final shuffle.
///
/// Rejects an oversized `take` before touching the store. All bucket reads are
/// issued concurrently; the merge order only depends on their contents.
pub async fn gather_candidates<S: CardStore>(
    store: &S,
    config: &SelectorConfig,
    user_id: &str,
    deck_id: i64,
    now: i64,
    take: usize,
) -> Result<Vec<StudyItem>, ReviewError> {
    if take > config.max_take {
        return Err(UsageError::TakeTooLarge {
            requested: take,
            limit: config.max_take,
        }
        .into());
    }

    let (per_day_max, introduced) = tokio::try_join!(
        store.per_day_max(user_id),
        store.new_items_introduced_since(user_id, now - 7 * DAY_MS),
    )?;
    let per_day_max = per_day_max.unwrap_or(config.default_per_day_max);
    let allowance = new_item_allowance(take, per_day_max, introduced);

    let (listen_old, listen_new, speak_old, speak_new, new_old, new_new, failed) = tokio::try_join!(
        store.due_items(user_id, deck_id, Skill::Listening, Order::OlderFirst, now, take),
        store.due_items(user_id, deck_id, Skill::Listening, Order::NewerFirst, now, take),
        store.due_items(user_id, deck_id, Skill::Speaking, Order::OlderFirst, now, take),
        store.due_items(user_id, deck_id, Skill::Speaking, Order::NewerFirst, now, take),
        store.new_items(user_id, deck_id, Order::OlderFirst, allowance),
        store.new_items(user_id, deck_id, Order::NewerFirst, allowance),
        store.failed_items(user_id, deck_id, config.failed_cap),
    )?;

    let due = interleave(&[listen_old, listen_new, speak_old, speak_new], take);
    let new = interleave(&[new_old, new_new], allowance);

    log::debug!(
        "user {user_id} deck {deck_id}: {} due, {} new (allowance {allowance}), {} failed",
        due.len(),
        new.len(),
        failed.len()
    );

    let candidates = failed
        .iter()
        .map(StudyItem::remedial)
        .chain(new.into_iter().map(|item| item.with_lesson(LessonKind::New)))
        .chain(due.into_iter().map(|item| item.with_lesson(LessonKind::Review)))
        .collect();

    Ok(dedup_items(candidates))
}

/// Shuffles the merged candidates and keeps the first `take`.
pub fn finalize<R: Rng>(mut candidates: Vec<StudyItem>, take: usize, rng: &mut R) -> Vec<StudyItem> {
    candidates.shuffle(rng);
    candidates.truncate(take);
    candidates
}

/// Selects the items for one session.
pub async fn select_session<S: CardStore, R: Rng>(
    store: &S,
    config: &SelectorConfig,
    user_id: &str,
    deck_id: i64,
    now: i64,
    take: usize,
    rng: &mut R,
) -> Result<Vec<StudyItem>, ReviewError> {
    let candidates = gather_candidates(store, config, user_id, deck_id, now, take).await?;
    Ok(finalize(candidates, take, rng))
}
