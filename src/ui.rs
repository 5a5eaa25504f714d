//! Terminal output: a spinner while grading and colored results.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use reprise::item::{DAY_MS, HOUR_MS, MINUTE_MS, ScheduleRecord, StudyItem};
use reprise::lesson::SpeakingResponse;
use reprise::queue::QueueItem;
use reprise::selector::SessionResponse;

/// Spinner shown while an attempt is being graded remotely.
pub struct GradingProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl GradingProgress {
    pub fn start(attempt: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("Grading \"{attempt}\""));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn complete(&self, response: &SpeakingResponse) {
        self.pb.finish_and_clear();
        if response.is_correct {
            println!("  {} {}", self.green.apply_to("✓"), response.feedback);
        } else {
            println!("  {} {}", self.red.apply_to("✗"), response.feedback);
        }
    }

    /// The attempt was not graded and can be retried.
    pub fn ungraded(&self, reason: &str) {
        self.pb.finish_and_clear();
        println!("  {} Not graded: {reason}", self.yellow.apply_to("↻"));
    }
}

pub fn print_session(session: &SessionResponse) {
    let dim = Style::new().dim();
    let bold = Style::new().bold();
    println!(
        "{} {} items selected ({} in deck, {} due, {} new)",
        bold.apply_to("Session:"),
        session.items.len(),
        session.total_items,
        session.items_due,
        session.new_items
    );
    for item in &session.items {
        println!(
            "  {:>5}  {:<9} {:<9} {}  {}",
            item.id,
            item.skill,
            format!("{:?}", item.lesson).to_lowercase(),
            item.term,
            dim.apply_to(&item.definition)
        );
    }
}

pub fn print_step(step: &QueueItem, item: &StudyItem) {
    let cyan = Style::new().cyan().bold();
    println!(
        "{} {} ({} / {})",
        cyan.apply_to(format!("[{}]", step.step_kind)),
        item.term,
        item.definition,
        item.lang_code
    );
}

pub fn print_schedule(quiz_id: i64, record: &ScheduleRecord, now: i64) {
    let green = Style::new().green();
    println!(
        "  quiz {quiz_id}: next review {} (stability {:.2}, difficulty {:.2}, {} reps, {} lapses)",
        green.apply_to(format_due(now, record.next_review_at)),
        record.stability,
        record.difficulty,
        record.repetitions,
        record.lapses
    );
}

/// Coarse human form of how far ahead `next` is.
pub fn format_due(now: i64, next: i64) -> String {
    let ahead = next - now;
    if ahead <= 0 {
        "now".to_string()
    } else if ahead < HOUR_MS {
        format!("in {}m", (ahead + MINUTE_MS - 1) / MINUTE_MS)
    } else if ahead < DAY_MS {
        format!("in {:.1}h", ahead as f64 / HOUR_MS as f64)
    } else {
        format!("in {:.1}d", ahead as f64 / DAY_MS as f64)
    }
}
