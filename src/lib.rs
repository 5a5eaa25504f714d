//! Lesson orchestration for a spaced-repetition trainer.
//!
//! A session flows selector → queue → grading → scheduler: [`selector`] picks
//! due, new and failed items, [`queue`] stages them into intro and drill steps,
//! [`grading`] judges attempts and [`scheduler`] computes the next review.
//! [`lesson::Lesson`] ties them to a [`store::CardStore`].

pub mod anthropic;
pub mod config;
pub mod error;
pub mod grading;
pub mod item;
pub mod lesson;
pub mod queue;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;
