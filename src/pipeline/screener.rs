//! End-to-end screening: config in, result file out.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{Pipeline, StageEvent};
use crate::config::{ConfigError, LogLevel, ScreeningConfig};
use crate::extraction::{AiAssist, ExtractionError, ExtractionService, OpenAiExtractor};
use crate::filters::FilterError;
use crate::io::{load_table, write_results, LoadError, OutputError};
use crate::models::ScreeningRun;

/// Top-level error for a screening invocation
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Extraction service error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// What a finished screening produced.
#[derive(Debug)]
pub struct ScreeningReport {
    pub run: ScreeningRun,
    pub output_path: PathBuf,
    /// Written only at `log_level = "high"`
    pub detail_log_path: Option<PathBuf>,
}

/// Runs a whole screening from a [`ScreeningConfig`].
///
/// Without an explicit service, AI-assisted filters talk to
/// [`OpenAiExtractor`] using the configured `[[filters.llm]]` models.
#[derive(Debug, Default)]
pub struct Screener {
    service: Option<Arc<dyn ExtractionService>>,
    cooldown: Option<Duration>,
}

impl Screener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `service` for every AI-assisted filter.
    pub fn with_service(mut self, service: Arc<dyn ExtractionService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Override `filters.ai_cooldown_secs`.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    fn ai_assist(&self, config: &ScreeningConfig) -> Result<Option<AiAssist>, ScreeningError> {
        let filters = &config.filters;
        let wants_ai = (filters.deduplication.enabled && filters.deduplication.use_ai)
            || (filters.language.enabled && filters.language.use_ai)
            || (filters.article_type.enabled && filters.article_type.use_ai)
            || (filters.topic_relevance.enabled && filters.topic_relevance.use_ai);

        if !wants_ai || filters.llm.is_empty() {
            return Ok(None);
        }

        let service: Arc<dyn ExtractionService> = match &self.service {
            Some(service) => Arc::clone(service),
            None => Arc::new(OpenAiExtractor::new()?),
        };
        Ok(Some(AiAssist::new(service, filters.llm.clone())))
    }

    /// Validate, load, filter and write.
    pub async fn screen(&self, config: &ScreeningConfig) -> Result<ScreeningReport, ScreeningError> {
        self.screen_with_events(config, |_| {}).await
    }

    /// Like [`screen`](Self::screen), reporting pipeline progress.
    pub async fn screen_with_events<F>(
        &self,
        config: &ScreeningConfig,
        on_event: F,
    ) -> Result<ScreeningReport, ScreeningError>
    where
        F: FnMut(StageEvent),
    {
        config.validate()?;
        let project = &config.project;

        let table = load_table(Path::new(&project.input_file), &project.text_column)?;

        let mut pipeline = Pipeline::from_config(&config.filters, self.ai_assist(config)?)?;
        if let Some(cooldown) = self.cooldown {
            pipeline = pipeline.with_cooldown(cooldown);
        }
        let run = pipeline
            .run_with_events(table.records, on_event)
            .await?
            .with_columns(table.columns);

        let output_path = project.output_path();
        write_results(&run, &output_path, project.output_format)?;

        log_summary(&run, project.log_level);
        let detail_log_path = if project.log_level == LogLevel::High {
            let path = project.detail_log_path();
            write_detail_log(&run, &path)?;
            info!("Detailed log saved to {}", path.display());
            Some(path)
        } else {
            None
        };

        Ok(ScreeningReport {
            run,
            output_path,
            detail_log_path,
        })
    }
}

/// Log totals, plus per-filter counters from `medium` upwards.
pub fn log_summary(run: &ScreeningRun, level: LogLevel) {
    info!(
        total = run.total_records,
        included = run.included_records,
        excluded = run.excluded_records,
        "Screening summary"
    );

    if level >= LogLevel::Medium {
        for (key, count) in &run.statistics {
            info!("{}: {}", key, count);
        }
    }
}

/// Per-record listing of id, decision and tags.
pub fn write_detail_log(run: &ScreeningRun, path: &Path) -> Result<(), OutputError> {
    let mut file = fs::File::create(path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    render_detail_log(run, &mut file)
}

fn render_detail_log<W: Write>(run: &ScreeningRun, out: &mut W) -> Result<(), OutputError> {
    writeln!(out, "Detailed Screening Log")?;
    writeln!(out, "======================")?;
    writeln!(out)?;

    for record in &run.records {
        writeln!(out, "ID: {}", record.id())?;
        writeln!(out, "Include: {}", record.is_included())?;
        if let Some(reason) = record.exclusion_reason() {
            writeln!(out, "Exclusion Reason: {}", reason)?;
        }
        writeln!(out, "Tags: {}", serde_json::to_string(record.tags())?)?;
        writeln!(out)?;
    }
    Ok(())
}
