//! Screening pipeline orchestration.
//!
//! [`Pipeline`] applies the enabled filters in their fixed order over one
//! batch of records and collects per-filter exclusion counts into a
//! [`ScreeningRun`]. [`Screener`] wraps it with configuration validation,
//! record loading and result writing.

mod screener;

pub use screener::{log_summary, ScreeningError, ScreeningReport, Screener};

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::FiltersConfig;
use crate::extraction::AiAssist;
use crate::filters::{
    ArticleTypeFilter, DeduplicationFilter, Filter, FilterError, LanguageFilter,
    TopicRelevanceFilter,
};
use crate::models::{ManuscriptRecord, ScreeningRun};

/// Progress notifications emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// A filter is about to run
    Started { filter: &'static str, uses_ai: bool },
    /// Waiting between two AI-assisted filters
    CoolingDown(Duration),
    /// A filter finished
    Finished { filter: &'static str, excluded: usize },
}

/// Ordered set of filters plus the pause between AI-assisted stages.
#[derive(Debug)]
pub struct Pipeline {
    filters: Vec<Box<dyn Filter>>,
    cooldown: Duration,
}

impl Pipeline {
    /// Pipeline over explicit filters, applied in the order given.
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self {
            filters,
            cooldown: Duration::ZERO,
        }
    }

    /// Build the enabled filters from configuration.
    ///
    /// The order is always deduplication, language, article type, topic
    /// relevance. `ai` is shared by every filter that asks for AI assistance.
    pub fn from_config(config: &FiltersConfig, ai: Option<AiAssist>) -> Result<Self, FilterError> {
        let mut filters: Vec<Box<dyn Filter>> = Vec::new();

        if config.deduplication.enabled {
            filters.push(Box::new(DeduplicationFilter::new(
                config.deduplication.clone(),
                ai.clone(),
            )));
        }
        if config.language.enabled {
            filters.push(Box::new(LanguageFilter::new(config.language.clone(), ai.clone())));
        }
        if config.article_type.enabled {
            filters.push(Box::new(ArticleTypeFilter::new(
                config.article_type.clone(),
                ai.clone(),
            )));
        }
        if config.topic_relevance.enabled {
            filters.push(Box::new(TopicRelevanceFilter::new(
                config.topic_relevance.clone(),
                ai,
            )?));
        }

        if filters.is_empty() {
            return Err(FilterError::Config(
                "at least one filter must be enabled".to_string(),
            ));
        }

        Ok(Self::new(filters).with_cooldown(Duration::from_secs(config.ai_cooldown_secs)))
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Names of the filters in execution order.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }

    /// Run every filter over `records`.
    ///
    /// Records are consumed; on error nothing of the partially tagged batch
    /// is returned.
    pub async fn run(&self, records: Vec<ManuscriptRecord>) -> Result<ScreeningRun, FilterError> {
        self.run_with_events(records, |_| {}).await
    }

    /// Like [`run`](Self::run), reporting progress to `on_event`.
    pub async fn run_with_events<F>(
        &self,
        records: Vec<ManuscriptRecord>,
        mut on_event: F,
    ) -> Result<ScreeningRun, FilterError>
    where
        F: FnMut(StageEvent),
    {
        let mut run = ScreeningRun::new(records);
        info!(
            "Screening {} records with filters: {}",
            run.total_records,
            self.filter_names().join(", ")
        );

        let mut previous_used_ai = false;
        for filter in &self.filters {
            let uses_ai = filter.uses_ai();

            if uses_ai && previous_used_ai && !self.cooldown.is_zero() {
                info!(
                    "Waiting {}s before {} to respect provider rate limits",
                    self.cooldown.as_secs_f64(),
                    filter.name()
                );
                on_event(StageEvent::CoolingDown(self.cooldown));
                sleep(self.cooldown).await;
            }

            on_event(StageEvent::Started {
                filter: filter.name(),
                uses_ai,
            });
            debug!(filter = filter.name(), uses_ai, "Applying filter");

            let excluded = filter.apply(&mut run.records).await?;
            run.record_statistic(filter.statistic_key(), excluded);

            on_event(StageEvent::Finished {
                filter: filter.name(),
                excluded,
            });
            previous_used_ai = uses_ai;
        }

        run.finalize();
        info!(
            "Screening finished: {} included, {} excluded",
            run.included_records, run.excluded_records
        );
        Ok(run)
    }
}

/// Build a pipeline from `config` and run it over `records`.
pub async fn run_pipeline(
    records: Vec<ManuscriptRecord>,
    config: &FiltersConfig,
    ai: Option<AiAssist>,
) -> Result<ScreeningRun, FilterError> {
    Pipeline::from_config(config, ai)?.run(records).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, Provider};
    use crate::extraction::MockExtractor;
    use crate::models::{DUPLICATES_FOUND, LANGUAGE_EXCLUDED};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Tags every included record it sees, excluding those whose text matches.
    #[derive(Debug)]
    struct Marker {
        name: &'static str,
        exclude_text: &'static str,
        ai: bool,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Marker {
        fn boxed(
            name: &'static str,
            exclude_text: &'static str,
            ai: bool,
            seen: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn Filter> {
            Box::new(Self {
                name,
                exclude_text,
                ai,
                seen: Arc::clone(seen),
            })
        }
    }

    #[async_trait]
    impl Filter for Marker {
        fn name(&self) -> &'static str {
            self.name
        }

        fn statistic_key(&self) -> &'static str {
            self.name
        }

        fn uses_ai(&self) -> bool {
            self.ai
        }

        async fn apply(&self, records: &mut [ManuscriptRecord]) -> Result<usize, FilterError> {
            let mut excluded = 0;
            for record in records.iter_mut().filter(|r| r.is_included()) {
                self.seen
                    .lock()
                    .unwrap()
                    .push(format!("{}:{}", self.name, record.id()));
                record.add_tag(self.name, true);
                if record.text() == self.exclude_text && record.exclude(format!("{} says no", self.name)) {
                    excluded += 1;
                }
            }
            Ok(excluded)
        }
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl Filter for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn statistic_key(&self) -> &'static str {
            "broken"
        }

        fn uses_ai(&self) -> bool {
            false
        }

        async fn apply(&self, _records: &mut [ManuscriptRecord]) -> Result<usize, FilterError> {
            Err(FilterError::Config("broken filter".to_string()))
        }
    }

    fn records() -> Vec<ManuscriptRecord> {
        ["alpha", "beta", "gamma"]
            .iter()
            .enumerate()
            .map(|(i, text)| ManuscriptRecord::from_pairs((i + 1).to_string(), &[("abstract", *text)], *text))
            .collect()
    }

    #[tokio::test]
    async fn test_excluded_records_skip_later_filters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Marker::boxed("first", "beta", false, &seen),
            Marker::boxed("second", "gamma", false, &seen),
        ]);

        let run = pipeline.run(records()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:1", "first:2", "first:3", "second:1", "second:3"]
        );
        let beta = run.find("2").unwrap();
        assert_eq!(beta.exclusion_reason(), Some("first says no"));
        assert!(beta.tag("second").is_none());
        assert_eq!(run.find("3").unwrap().exclusion_reason(), Some("second says no"));
        assert_eq!(run.statistic("first"), Some(1));
        assert_eq!(run.statistic("second"), Some(1));
        assert_eq!(run.included_records, 1);
        assert_eq!(run.excluded_records, 2);
    }

    #[tokio::test]
    async fn test_cooldown_only_between_ai_filters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Marker::boxed("a", "", true, &seen),
            Marker::boxed("b", "", true, &seen),
            Marker::boxed("c", "", false, &seen),
            Marker::boxed("d", "", true, &seen),
        ])
        .with_cooldown(Duration::from_millis(1));

        let mut events = Vec::new();
        pipeline
            .run_with_events(records(), |event| events.push(event))
            .await
            .unwrap();

        let cooldowns: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, StageEvent::CoolingDown(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(cooldowns.len(), 1);
        assert_eq!(
            events[cooldowns[0] + 1],
            StageEvent::Started {
                filter: "b",
                uses_ai: true
            }
        );
    }

    #[tokio::test]
    async fn test_zero_cooldown_is_skipped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Marker::boxed("a", "", true, &seen),
            Marker::boxed("b", "", true, &seen),
        ]);

        let mut events = Vec::new();
        pipeline
            .run_with_events(records(), |event| events.push(event))
            .await
            .unwrap();
        assert!(!events.iter().any(|e| matches!(e, StageEvent::CoolingDown(_))));
    }

    #[tokio::test]
    async fn test_filter_error_aborts_run() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Marker::boxed("first", "", false, &seen),
            Box::new(Broken),
            Marker::boxed("never", "", false, &seen),
        ]);

        let result = pipeline.run(records()).await;
        assert!(matches!(result, Err(FilterError::Config(_))));
        assert!(seen.lock().unwrap().iter().all(|s| !s.starts_with("never")));
    }

    #[test]
    fn test_from_config_orders_enabled_filters() {
        let mut config = FiltersConfig::default();
        config.topic_relevance.enabled = true;
        config.topic_relevance.topics = vec!["soil carbon".to_string()];
        config.deduplication.enabled = true;
        config.language.enabled = true;

        let pipeline = Pipeline::from_config(&config, None).unwrap();
        assert_eq!(
            pipeline.filter_names(),
            vec!["deduplication", "language", "topic relevance"]
        );
        assert_eq!(pipeline.cooldown(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_config_requires_a_filter() {
        assert!(matches!(
            Pipeline::from_config(&FiltersConfig::default(), None),
            Err(FilterError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_run_pipeline_with_mock_ai() {
        let mut config = FiltersConfig::default();
        config.ai_cooldown_secs = 0;
        config.deduplication.enabled = true;
        config.deduplication.compare_fields = vec!["title".to_string()];
        config.language.enabled = true;
        config.language.use_ai = true;
        config.language.accepted_languages = vec!["en".to_string()];

        let mock = Arc::new(MockExtractor::with_responder(|prompt| {
            if prompt.prompt_content.contains("Klimawandel") {
                Some("{\"language\": \"de\"}".to_string())
            } else {
                Some("{\"language\": \"en\"}".to_string())
            }
        }));
        let ai = AiAssist::new(
            mock.clone(),
            vec![ModelConfig::new(Provider::OpenAi, "gpt-4o-mini").with_api_key("k")],
        );

        let records = vec![
            ManuscriptRecord::from_pairs("1", &[("title", "Soil carbon dynamics")], "Soil carbon"),
            ManuscriptRecord::from_pairs("2", &[("title", "Soil carbon dynamics")], "Soil carbon"),
            ManuscriptRecord::from_pairs("3", &[("title", "Klimawandel in Bayern")], "Klimawandel"),
        ];

        let run = run_pipeline(records, &config, Some(ai)).await.unwrap();

        assert_eq!(run.statistic(DUPLICATES_FOUND), Some(1));
        assert_eq!(run.statistic(LANGUAGE_EXCLUDED), Some(1));
        assert_eq!(run.included_records, 1);
        // Only the two records still included reach the language batch.
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.requests()[0].prompts.len(), 2);
    }
}
