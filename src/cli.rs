//! Command-line interface built on clap.
//!
//! Subcommands map one-to-one onto the lesson calls, plus `demo`, which walks
//! an in-memory deck through a whole session.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Reprise: spaced-repetition lesson engine.
#[derive(Debug, Parser)]
#[command(name = "reprise", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// User the calls are made for.
    #[arg(long, global = true, default_value = "local")]
    pub user: String,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Select the next batch of items from a deck.
    Session {
        /// JSON deck file.
        #[arg(long)]
        deck: PathBuf,

        #[arg(long, default_value_t = 1)]
        deck_id: i64,

        /// Number of items to select.
        #[arg(long, default_value_t = 10)]
        take: usize,
    },

    /// Submit a perceived difficulty (1 = again .. 4 = easy) for an item.
    Grade {
        #[arg(long)]
        deck: PathBuf,

        #[arg(long, allow_negative_numbers = true)]
        item: i64,

        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=4))]
        difficulty: i64,
    },

    /// Grade an attempt at an item.
    Speak {
        #[arg(long)]
        deck: PathBuf,

        #[arg(long, allow_negative_numbers = true)]
        item: i64,

        /// What the learner said or typed.
        #[arg(long)]
        attempt: String,
    },

    /// Run a session over a built-in deck without network access.
    Demo,
}
