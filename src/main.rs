mod cli;
mod ui;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::task::JoinHandle;

use cli::{Cli, Command};
use reprise::anthropic::AnthropicClient;
use reprise::config::RepriseConfig;
use reprise::grading::{ChannelTrainingLog, Evaluator, LlmJudge};
use reprise::item::{DAY_MS, HOUR_MS, LessonKind, ScheduleRecord, Skill, StudyItem};
use reprise::lesson::{GradeRequest, Lesson, SessionRequest, SpeakingRequest};
use reprise::queue::{Action, AudioRef, SessionState, StepKind};
use reprise::store::{DeckFile, MemoryStore, StoredItem, UserSettings};
use reprise::users::ApprovedUsers;

type CliLesson = Lesson<MemoryStore, LlmJudge<AnthropicClient>, Option<ChannelTrainingLog>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = RepriseConfig::load()?;
    let now = Utc::now().timestamp_millis();

    match cli.command {
        Command::Session {
            deck,
            deck_id,
            take,
        } => {
            let lesson = build_lesson(&config, load_store(&deck)?, None)?;
            let session = lesson
                .fetch_session(&cli.user, &SessionRequest { deck_id, take }, now)
                .await?;
            ui::print_session(&session);
        }
        Command::Grade {
            deck,
            item,
            difficulty,
        } => {
            let lesson = build_lesson(&config, load_store(&deck)?, None)?;
            let req = GradeRequest {
                item_id: item,
                perceived_difficulty: difficulty,
            };
            let record = lesson.submit_grade(&cli.user, &req, now).await?;
            lesson.store().save(&deck)?;
            ui::print_schedule(item.abs(), &record, now);
        }
        Command::Speak {
            deck,
            item,
            attempt,
        } => {
            if config.api_key.is_empty() {
                log::warn!("no API key configured; only exact answers can be graded");
            }
            let (training, writer) = spawn_training_log(&config);
            let lesson = build_lesson(&config, load_store(&deck)?, training)?;

            let progress = ui::GradingProgress::start(&attempt);
            let req = SpeakingRequest {
                attempt_text: attempt,
                item_id: item,
            };
            let outcome = lesson.grade_speaking(&cli.user, &req, now).await;
            match outcome {
                Ok(response) => {
                    progress.complete(&response);
                    lesson.store().save(&deck)?;
                }
                Err(e) if e.is_retryable() => progress.ungraded(&e.to_string()),
                Err(e) => {
                    progress.ungraded("internal error");
                    return Err(e.into());
                }
            }

            drop(lesson);
            if let Some(writer) = writer {
                writer.await.context("training log writer panicked")?;
            }
        }
        Command::Demo => run_demo(&config, &cli.user, now).await?,
    }

    Ok(())
}

fn load_store(path: &Path) -> Result<MemoryStore> {
    MemoryStore::load(path).with_context(|| format!("failed to load deck {}", path.display()))
}

fn spawn_training_log(
    config: &RepriseConfig,
) -> (Option<ChannelTrainingLog>, Option<JoinHandle<()>>) {
    match &config.training_log {
        Some(path) => {
            let (log, writer) = ChannelTrainingLog::spawn_jsonl(path.clone());
            (Some(log), Some(writer))
        }
        None => (None, None),
    }
}

fn build_lesson(
    config: &RepriseConfig,
    store: MemoryStore,
    training: Option<ChannelTrainingLog>,
) -> Result<CliLesson> {
    let client = AnthropicClient::new(config.api_key.clone(), config.request_timeout())?;
    let judge = LlmJudge::new(client, config.grading_model.clone());
    Ok(Lesson::new(
        store,
        Evaluator::new(judge, training),
        config.scheduler(),
        config.selector(),
        ApprovedUsers::from_env(&config.approved_users),
    ))
}

/// Runs one session over a small built-in deck. Every attempt is answered
/// exactly, so no remote call is made.
async fn run_demo(config: &RepriseConfig, user_id: &str, now: i64) -> Result<()> {
    let lesson = build_lesson(config, MemoryStore::new(demo_deck(user_id, now)), None)?;
    let session = lesson
        .fetch_session(user_id, &SessionRequest { deck_id: 1, take: 10 }, now)
        .await?;
    ui::print_session(&session);
    println!();

    let mut state = SessionState::new();
    state.apply(Action::Replace(session.items))?;

    while let Some((step, item)) = state.current_item().map(|(s, i)| (*s, i.clone())) {
        ui::print_step(&step, &item);

        if !step.step_kind.is_graded() {
            state.apply(Action::CompleteItem {
                step_uuid: step.step_uuid,
            })?;
            continue;
        }

        // The remedial drill is abandoned to show the give-up path.
        if step.step_kind == StepKind::RemedialOutro {
            let record = lesson.give_up(user_id, item.id, now).await?;
            state.apply(Action::GiveUp {
                item_uuid: step.item_uuid,
            })?;
            ui::print_schedule(item.quiz_id, &record, now);
            continue;
        }

        state.apply(Action::RecordingCaptured {
            step_uuid: step.step_uuid,
            audio: AudioRef(format!("demo://{}", step.step_uuid)),
        })?;

        let attempt = match item.skill {
            Skill::Speaking => item.term.clone(),
            Skill::Listening => item.definition.clone(),
        };
        let req = SpeakingRequest {
            attempt_text: attempt.clone(),
            item_id: item.id,
        };
        let progress = ui::GradingProgress::start(&attempt);
        let response = lesson.grade_speaking(user_id, &req, now).await?;
        progress.complete(&response);
        state.apply(Action::StoreGradeResult {
            item_uuid: step.item_uuid,
            result: response.grading_result(&attempt),
        })?;

        let req = GradeRequest {
            item_id: item.id,
            perceived_difficulty: 3,
        };
        let record = lesson.submit_grade(user_id, &req, now).await?;
        ui::print_schedule(item.quiz_id, &record, now);

        state.apply(Action::CompleteItem {
            step_uuid: step.step_uuid,
        })?;
    }

    println!(
        "\nSession finished: {} steps completed, {} left.",
        state.completed_count(),
        state.remaining()
    );
    Ok(())
}

fn demo_deck(user_id: &str, now: i64) -> DeckFile {
    let cards = [
        ("안녕하세요", "hello", Skill::Speaking),
        ("감사합니다", "thank you", Skill::Listening),
        ("물", "water", Skill::Speaking),
        ("학교", "school", Skill::Listening),
        ("사과", "apple", Skill::Speaking),
    ];
    let items = cards
        .iter()
        .enumerate()
        .map(|(i, (term, definition, skill))| {
            let id = i as i64 + 1;
            let mut item = StudyItem {
                id,
                quiz_id: id,
                card_id: id,
                deck_id: 1,
                skill: *skill,
                term: term.to_string(),
                definition: definition.to_string(),
                lang_code: "ko".into(),
                gender: "F".into(),
                schedule: ScheduleRecord::default(),
                last_failure: 0,
                lesson: LessonKind::New,
            };
            // Cards 3 and 4 are due reviews; card 4 also failed last time.
            if (3..=4).contains(&id) {
                item.schedule = ScheduleRecord {
                    difficulty: 5.0,
                    stability: 2.5,
                    repetitions: 2,
                    lapses: 0,
                    first_review_at: now - 10 * DAY_MS,
                    last_review_at: now - 3 * DAY_MS,
                    next_review_at: now - HOUR_MS,
                };
            }
            if id == 4 {
                item.last_failure = now - 2 * HOUR_MS;
            }
            StoredItem {
                user_id: user_id.to_string(),
                item,
            }
        })
        .collect();

    DeckFile {
        users: vec![UserSettings {
            user_id: user_id.to_string(),
            per_day_max: 5,
        }],
        items,
    }
}
