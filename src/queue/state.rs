//! Session state and the reducer that applies [`Action`]s to it.

use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

use super::step::{AudioRef, GradingResult, QueueItem, StepKind};
use crate::error::ReviewError;
use crate::item::StudyItem;

/// Events a session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start over with a freshly selected batch.
    Replace(Vec<StudyItem>),
    /// Defer an item for this session without grading it.
    Skip { item_uuid: Uuid },
    /// Drop an item the learner could not answer. The caller schedules the failure.
    GiveUp { item_uuid: Uuid },
    /// A recording for a step is ready; replaces any pending one.
    RecordingCaptured { step_uuid: Uuid, audio: AudioRef },
    /// A single step is done.
    CompleteItem { step_uuid: Uuid },
    /// Grading finished for an item; replaces any earlier result.
    StoreGradeResult {
        item_uuid: Uuid,
        result: GradingResult,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Replace(items) => write!(f, "REPLACE({})", items.len()),
            Action::Skip { item_uuid } => write!(f, "SKIP({item_uuid})"),
            Action::GiveUp { item_uuid } => write!(f, "GIVE_UP({item_uuid})"),
            Action::RecordingCaptured { step_uuid, .. } => {
                write!(f, "RECORDING_CAPTURED({step_uuid})")
            }
            Action::CompleteItem { step_uuid } => write!(f, "COMPLETE_ITEM({step_uuid})"),
            Action::StoreGradeResult { item_uuid, .. } => {
                write!(f, "STORE_GRADE_RESULT({item_uuid})")
            }
        }
    }
}

/// In-memory state of one study session.
///
/// Single writer: every transition goes through [`SessionState::apply`], which
/// is synchronous. Results of asynchronous work come back as actions keyed by
/// step or item UUID, so they land on the step they belong to even if the
/// learner has moved on.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    queues: HashMap<StepKind, Vec<QueueItem>>,
    items_by_uuid: HashMap<Uuid, StudyItem>,
    pending_recordings: HashMap<Uuid, AudioRef>,
    pending_grades: HashMap<Uuid, GradingResult>,
    completed_count: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one transition and re-checks the queue invariants.
    pub fn apply(&mut self, action: Action) -> Result<(), ReviewError> {
        log::debug!("session action {action}");
        match action {
            Action::Replace(items) => self.replace(items),
            Action::Skip { item_uuid } | Action::GiveUp { item_uuid } => {
                let removed = self.purge_item(item_uuid);
                log::debug!("removed {removed} steps of item {item_uuid}");
            }
            Action::RecordingCaptured { step_uuid, audio } => {
                if self.step(step_uuid).is_some() {
                    self.pending_recordings.insert(step_uuid, audio);
                } else {
                    log::debug!("dropping recording for finished step {step_uuid}");
                }
            }
            Action::CompleteItem { step_uuid } => {
                let mut removed = 0;
                for queue in self.queues.values_mut() {
                    let before = queue.len();
                    queue.retain(|step| step.step_uuid != step_uuid);
                    removed += before - queue.len();
                }
                if removed > 0 {
                    self.pending_recordings.remove(&step_uuid);
                    self.completed_count += 1;
                }
            }
            Action::StoreGradeResult { item_uuid, result } => {
                if self.items_by_uuid.contains_key(&item_uuid) {
                    self.pending_grades.insert(item_uuid, result);
                } else {
                    log::debug!("dropping grade for item {item_uuid} not in this session");
                }
            }
        }
        self.check_invariants()
    }

    /// The step to show next: head of the first non-empty queue in priority order.
    pub fn current(&self) -> Option<&QueueItem> {
        StepKind::PRIORITY
            .iter()
            .find_map(|kind| self.queues.get(kind).and_then(|queue| queue.first()))
    }

    pub fn current_item(&self) -> Option<(&QueueItem, &StudyItem)> {
        let step = self.current()?;
        self.items_by_uuid.get(&step.item_uuid).map(|item| (step, item))
    }

    pub fn queue(&self, kind: StepKind) -> &[QueueItem] {
        self.queues.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn step(&self, step_uuid: Uuid) -> Option<&QueueItem> {
        self.queues
            .values()
            .flat_map(|queue| queue.iter())
            .find(|step| step.step_uuid == step_uuid)
    }

    pub fn item(&self, item_uuid: Uuid) -> Option<&StudyItem> {
        self.items_by_uuid.get(&item_uuid)
    }

    pub fn recording(&self, step_uuid: Uuid) -> Option<&AudioRef> {
        self.pending_recordings.get(&step_uuid)
    }

    pub fn grade_result(&self, item_uuid: Uuid) -> Option<&GradingResult> {
        self.pending_grades.get(&item_uuid)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    /// Steps still queued across all stages.
    pub fn remaining(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.current().is_none()
    }

    fn replace(&mut self, items: Vec<StudyItem>) {
        *self = Self::default();
        for item in items {
            let item_uuid = Uuid::new_v4();
            for kind in StepKind::for_item(&item) {
                self.queues
                    .entry(*kind)
                    .or_default()
                    .push(QueueItem::new(item_uuid, *kind));
            }
            self.items_by_uuid.insert(item_uuid, item);
        }
    }

    fn purge_item(&mut self, item_uuid: Uuid) -> usize {
        let mut removed = Vec::new();
        for queue in self.queues.values_mut() {
            queue.retain(|step| {
                let keep = step.item_uuid != item_uuid;
                if !keep {
                    removed.push(step.step_uuid);
                }
                keep
            });
        }
        for step_uuid in &removed {
            self.pending_recordings.remove(step_uuid);
        }
        removed.len()
    }

    fn check_invariants(&self) -> Result<(), ReviewError> {
        let mut seen = HashSet::new();
        for step in self.queues.values().flat_map(|queue| queue.iter()) {
            if !seen.insert(step.step_uuid) {
                return Err(ReviewError::Invariant(format!(
                    "step {} ({}) is queued twice",
                    step.step_uuid, step.step_kind
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{LessonKind, Skill};
    use crate::testing::item;

    fn new_items(n: i64) -> Vec<StudyItem> {
        (1..=n).map(|i| item(i, i, Skill::Speaking)).collect()
    }

    fn session(items: Vec<StudyItem>) -> SessionState {
        let mut state = SessionState::new();
        state.apply(Action::Replace(items)).unwrap();
        state
    }

    fn grading(correct: bool) -> GradingResult {
        GradingResult {
            transcription: "annyeong".into(),
            is_correct: correct,
            feedback: String::new(),
        }
    }

    #[test]
    fn replace_expands_new_items_into_intro_and_outro() {
        let state = session(new_items(3));
        assert_eq!(state.remaining(), 6);
        assert_eq!(state.queue(StepKind::NewIntro).len(), 3);
        assert_eq!(state.queue(StepKind::NewOutro).len(), 3);

        for (intro, outro) in state
            .queue(StepKind::NewIntro)
            .iter()
            .zip(state.queue(StepKind::NewOutro))
        {
            assert_eq!(intro.item_uuid, outro.item_uuid);
            assert_ne!(intro.step_uuid, outro.step_uuid);
        }
    }

    #[test]
    fn steps_are_served_in_priority_order() {
        let items = vec![
            item(1, 1, Skill::Speaking).with_lesson(LessonKind::Review),
            item(2, 2, Skill::Listening).with_lesson(LessonKind::Review),
            item(3, 3, Skill::Listening).remedial(),
            item(4, 4, Skill::Speaking),
        ];
        let mut state = session(items);

        let mut served = Vec::new();
        while let Some(step) = state.current().copied() {
            served.push(step.step_kind);
            state
                .apply(Action::CompleteItem {
                    step_uuid: step.step_uuid,
                })
                .unwrap();
        }

        assert_eq!(
            served,
            vec![
                StepKind::NewIntro,
                StepKind::RemedialIntro,
                StepKind::Listening,
                StepKind::Speaking,
                StepKind::NewOutro,
                StepKind::RemedialOutro,
            ]
        );
        assert_eq!(state.completed_count(), 6);
        assert!(state.is_finished());
    }

    #[test]
    fn skip_removes_every_step_of_the_item() {
        let mut state = session(new_items(2));
        let (first, _) = state.current_item().unwrap();
        let skipped = first.item_uuid;

        state.apply(Action::Skip { item_uuid: skipped }).unwrap();

        for kind in StepKind::PRIORITY {
            assert!(state.queue(kind).iter().all(|s| s.item_uuid != skipped));
        }
        assert_eq!(state.remaining(), 2);
        assert_ne!(state.current().unwrap().item_uuid, skipped);
        assert_eq!(state.completed_count(), 0);
    }

    #[test]
    fn give_up_purges_like_skip() {
        let mut state = session(new_items(1));
        let item_uuid = state.current().unwrap().item_uuid;
        let step_uuid = state.current().unwrap().step_uuid;
        state
            .apply(Action::RecordingCaptured {
                step_uuid,
                audio: AudioRef("a.wav".into()),
            })
            .unwrap();

        state.apply(Action::GiveUp { item_uuid }).unwrap();

        assert!(state.is_finished());
        assert!(state.recording(step_uuid).is_none());
        // The item stays readable so the caller can schedule the failure.
        assert!(state.item(item_uuid).is_some());
    }

    #[test]
    fn complete_item_twice_is_a_no_op() {
        let mut state = session(new_items(2));
        let step_uuid = state.current().unwrap().step_uuid;

        state.apply(Action::CompleteItem { step_uuid }).unwrap();
        let remaining = state.remaining();
        let current = state.current().copied();

        state.apply(Action::CompleteItem { step_uuid }).unwrap();
        assert_eq!(state.remaining(), remaining);
        assert_eq!(state.current().copied(), current);
        assert_eq!(state.completed_count(), 1);
    }

    #[test]
    fn complete_item_removes_only_that_step() {
        let mut state = session(new_items(1));
        let intro = state.queue(StepKind::NewIntro)[0];

        state
            .apply(Action::CompleteItem {
                step_uuid: intro.step_uuid,
            })
            .unwrap();

        let outro = state.current().unwrap();
        assert_eq!(outro.step_kind, StepKind::NewOutro);
        assert_eq!(outro.item_uuid, intro.item_uuid);
    }

    #[test]
    fn recording_overwrites_without_advancing() {
        let mut state = session(new_items(1));
        let step = *state.current().unwrap();

        for name in ["first.wav", "second.wav"] {
            state
                .apply(Action::RecordingCaptured {
                    step_uuid: step.step_uuid,
                    audio: AudioRef(name.into()),
                })
                .unwrap();
        }

        assert_eq!(
            state.recording(step.step_uuid),
            Some(&AudioRef("second.wav".into()))
        );
        assert_eq!(state.current(), Some(&step));
    }

    #[test]
    fn grade_results_are_upserted_per_item() {
        let mut state = session(new_items(2));
        let item_uuid = state.current().unwrap().item_uuid;

        state
            .apply(Action::StoreGradeResult {
                item_uuid,
                result: grading(false),
            })
            .unwrap();
        state
            .apply(Action::StoreGradeResult {
                item_uuid,
                result: grading(true),
            })
            .unwrap();

        assert!(state.grade_result(item_uuid).unwrap().is_correct);
        assert_eq!(state.remaining(), 4);
    }

    #[test]
    fn late_results_for_a_replaced_session_are_dropped() {
        let mut state = session(new_items(1));
        let old_step = *state.current().unwrap();

        state.apply(Action::Replace(new_items(1))).unwrap();
        state
            .apply(Action::StoreGradeResult {
                item_uuid: old_step.item_uuid,
                result: grading(true),
            })
            .unwrap();
        state
            .apply(Action::RecordingCaptured {
                step_uuid: old_step.step_uuid,
                audio: AudioRef("late.wav".into()),
            })
            .unwrap();

        assert!(state.grade_result(old_step.item_uuid).is_none());
        assert!(state.recording(old_step.step_uuid).is_none());
        assert!(state.item(old_step.item_uuid).is_none());
    }

    #[test]
    fn replace_resets_counters_and_maps() {
        let mut state = session(new_items(1));
        let step_uuid = state.current().unwrap().step_uuid;
        state.apply(Action::CompleteItem { step_uuid }).unwrap();
        assert_eq!(state.completed_count(), 1);

        state.apply(Action::Replace(Vec::new())).unwrap();
        assert_eq!(state.completed_count(), 0);
        assert!(state.is_finished());
    }

    #[test]
    fn duplicate_step_is_an_invariant_violation() {
        let mut state = session(new_items(1));
        let step = state.queue(StepKind::NewIntro)[0];
        state.queues.entry(StepKind::Speaking).or_default().push(step);

        let err = state.apply(Action::Skip {
            item_uuid: Uuid::new_v4(),
        });
        assert!(matches!(err, Err(ReviewError::Invariant(_))));
    }
}
