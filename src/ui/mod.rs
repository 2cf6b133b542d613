//! Terminal output for the command-line interface.
//!
//! Colour is applied only when stdout is a terminal, so piped output stays
//! plain.

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Table};
use is_terminal::IsTerminal;
use owo_colors::{OwoColorize, Style};
use std::fmt::Display;
use std::time::Duration;

use crate::models::{ArticleClassification, ScreeningRun, TopicRelevanceScore};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status kinds for one-line messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Pending,
}

pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Pending => "○",
    }
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Success => Style::new().green().bold(),
        Status::Error => Style::new().red().bold(),
        Status::Warning => Style::new().yellow().bold(),
        Status::Info => Style::new().cyan().bold(),
        Status::Pending => Style::new().white().dimmed(),
    }
}

/// Apply `style` when writing to a terminal.
pub fn paint(text: impl Display, style: Style) -> String {
    if is_terminal() {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

/// Print a message prefixed with a coloured status icon.
pub fn print_status(status: Status, msg: impl Display) {
    println!("{} {}", paint(status_icon(status), status_style(status)), msg);
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", paint(format!("━━━ {} ━━━", title), Style::new().bold().cyan()));
}

/// Format a number with thousands separators.
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Screening totals and per-filter exclusion counts.
pub fn summary_table(run: &ScreeningRun) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Records").add_attribute(Attribute::Bold),
    ]);

    let count = |n: usize| Cell::new(format_number(n)).set_alignment(CellAlignment::Right);
    table.add_row(vec![Cell::new("Total"), count(run.total_records)]);
    table.add_row(vec![
        Cell::new("Included").add_attribute(Attribute::Bold),
        count(run.included_records),
    ]);
    table.add_row(vec![Cell::new("Excluded"), count(run.excluded_records)]);

    for (key, value) in &run.statistics {
        table.add_row(vec![Cell::new(key.replace('_', " ")), count(*value)]);
    }
    table
}

/// Print an article classification.
pub fn print_classification(classification: &ArticleClassification) {
    print_section("Article classification");
    println!(
        "Primary type: {}",
        paint(classification.primary_type, Style::new().bold())
    );

    let join = |types: &[crate::models::ArticleType]| {
        if types.is_empty() {
            "-".to_string()
        } else {
            types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        }
    };
    println!("All types:    {}", join(&classification.all_types));
    println!("Methodology:  {}", join(&classification.methodological_types));
    println!("Scope:        {}", join(&classification.scope_types));

    if !classification.type_scores.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Type", "Score"]);
        for (article_type, score) in &classification.type_scores {
            table.add_row(vec![
                Cell::new(article_type.as_str()),
                Cell::new(format!("{:.1}", score)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }
}

/// Print a topic relevance score.
pub fn print_relevance(score: &TopicRelevanceScore) {
    print_section("Topic relevance");
    let verdict = if score.is_relevant {
        paint("relevant", Style::new().green().bold())
    } else {
        paint("not relevant", Style::new().red().bold())
    };
    println!("Overall:    {:.3} ({})", score.overall_score, verdict);
    println!("Confidence: {:.3}", score.confidence);
    println!(
        "Components: keyword {:.3}, concept {:.3}, field {:.3}",
        score.component_scores.keyword_match,
        score.component_scores.concept_match,
        score.component_scores.field_relevance
    );
    if !score.matched_keywords.is_empty() {
        println!("Keywords:   {}", score.matched_keywords.join(", "));
    }
    if !score.matched_concepts.is_empty() {
        println!("Concepts:   {}", score.matched_concepts.join(", "));
    }
}

fn spinner_style(template: &str) -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
}

/// Spinner shown while filters run.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    pub fn new(msg: &str) -> Self {
        let pb = if is_terminal() {
            indicatif::ProgressBar::new_spinner()
        } else {
            indicatif::ProgressBar::hidden()
        };
        pb.set_style(spinner_style("{spinner:.cyan} {msg}").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    /// Print a line above the spinner without disturbing it.
    pub fn println(&self, msg: &str) {
        self.pb.println(msg);
    }

    pub fn finish_with_success(&self, msg: &str) {
        self.pb
            .set_style(spinner_style("{spinner:.green} {msg}").tick_chars("✓✓"));
        self.pb.finish_with_message(msg.to_string());
    }

    pub fn finish_with_error(&self, msg: &str) {
        self.pb
            .set_style(spinner_style("{spinner:.red} {msg}").tick_chars("✗✗"));
        self.pb.finish_with_message(msg.to_string());
    }
}
