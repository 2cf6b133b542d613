//! Integration tests for the screening pipeline
//!
//! These tests drive the public API end to end: loading, filtering and
//! writing results, with rule-based and mocked AI-assisted filters.

use manuscript_screener::config::{
    load_config, ModelConfig, OutputFormat, Provider, ScreeningConfig,
};
use manuscript_screener::extraction::{AiAssist, MockExtractor};
use manuscript_screener::io::{load_records, write_results};
use manuscript_screener::models::{
    ManuscriptRecord, ARTICLE_TYPE_EXCLUDED, DUPLICATES_FOUND, LANGUAGE_EXCLUDED,
    TOPIC_RELEVANCE_EXCLUDED,
};
use manuscript_screener::{run_pipeline, Screener};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const FOUR_ROWS: &str = "\
title,abstract,year
Climate change effects on coastal cities,The impact of sea level rise on the infrastructure of coastal cities is assessed with data from 40 sites.,2021
Climate change effects on coastal cities,The impact of sea level rise on the infrastructure of coastal cities is assessed with data from 40 sites.,2021
Die Auswirkungen des Klimawandels auf die Landwirtschaft und der Boden,Die Studie untersucht die Folgen für den Boden und die Ernte.,2020
Soil carbon storage in boreal forests,We measured the carbon stock in the soil of 25 forest plots and found that storage depends on the age of the stand.,2019
";

fn gpt() -> Vec<ModelConfig> {
    vec![ModelConfig::new(Provider::OpenAi, "gpt-4o-mini").with_api_key("sk-test")]
}

fn write_input(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

fn base_config(dir: &Path, input: &str) -> ScreeningConfig {
    let mut config = ScreeningConfig::default();
    config.project.input_file = write_input(dir, "records.csv", input);
    config.project.output_file = dir.join("screened").display().to_string();
    config.project.text_column = "abstract".to_string();
    config.filters.ai_cooldown_secs = 0;
    config
}

fn enable_dedup_and_language(config: &mut ScreeningConfig) {
    config.filters.deduplication.enabled = true;
    config.filters.deduplication.compare_fields =
        vec!["title".to_string(), "abstract".to_string()];
    config.filters.language.enabled = true;
    config.filters.language.accepted_languages = vec!["en".to_string()];
}

#[tokio::test]
async fn test_four_row_screening() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), FOUR_ROWS);
    enable_dedup_and_language(&mut config);

    let report = Screener::new().screen(&config).await.unwrap();
    let run = &report.run;

    assert_eq!(run.total_records, 4);
    assert_eq!(run.included_records, 2);
    assert_eq!(run.excluded_records, 2);
    assert!(run.find("1").unwrap().is_included());
    assert!(run.find("4").unwrap().is_included());

    let duplicate = run.find("2").unwrap();
    assert_eq!(duplicate.exclusion_reason(), Some("Duplicate of 1"));
    assert_eq!(duplicate.tag("duplicate_of"), Some(&serde_json::json!("1")));

    let german = run.find("3").unwrap();
    assert!(german
        .exclusion_reason()
        .unwrap()
        .contains("Language not accepted"));
    assert_eq!(german.tag("detected_language"), Some(&serde_json::json!("de")));

    assert_eq!(run.find("1").unwrap().tag("detected_language"), Some(&serde_json::json!("en")));
    assert_eq!(run.statistic(DUPLICATES_FOUND), Some(1));
    assert_eq!(run.statistic(LANGUAGE_EXCLUDED), Some(1));
    assert!(report.output_path.ends_with("screened.csv"));
}

#[tokio::test]
async fn test_reordered_duplicates_flag_the_later_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = "title,abstract\nSoil carbon,Text\nOcean acidification,Other\nSoil carbon,Text\n";
    let mut config = base_config(dir.path(), input);
    config.filters.deduplication.enabled = true;
    config.filters.deduplication.compare_fields = vec!["title".to_string()];

    let report = Screener::new().screen(&config).await.unwrap();
    assert!(report.run.find("1").unwrap().is_included());
    assert_eq!(
        report.run.find("3").unwrap().exclusion_reason(),
        Some("Duplicate of 1")
    );
}

#[tokio::test]
async fn test_excluded_records_receive_no_later_tags() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), FOUR_ROWS);
    enable_dedup_and_language(&mut config);
    config.filters.article_type.enabled = true;

    let report = Screener::new().screen(&config).await.unwrap();
    let run = &report.run;

    for record in &run.records {
        assert_eq!(record.is_included(), record.exclusion_reason().is_none());
    }

    let duplicate = run.find("2").unwrap();
    assert!(duplicate.tag("detected_language").is_none());
    assert!(duplicate.tag("article_type").is_none());

    let german = run.find("3").unwrap();
    assert!(german.tag("detected_language").is_some());
    assert!(german.tag("article_type").is_none());

    assert!(run.find("1").unwrap().tag("article_type").is_some());
    assert!(run.find("4").unwrap().tag("article_type").is_some());
}

#[tokio::test]
async fn test_article_type_exclusion_with_rules() {
    let records = vec![
        ManuscriptRecord::from_pairs(
            "1",
            &[("title", "Editorial")],
            "Editorial. In this issue the editor's note welcomes readers to the special issue.",
        ),
        ManuscriptRecord::from_pairs(
            "2",
            &[("title", "Survey of farmers")],
            "Introduction. We recruited 120 participants for this study. Methods: data were \
             collected using a questionnaire. Results: statistical analysis showed a significant \
             correlation (p-value < 0.05). Discussion follows.",
        ),
    ];

    let mut config = ScreeningConfig::default().filters;
    config.article_type.enabled = true;
    config.article_type.exclude_editorials = true;

    let run = run_pipeline(records, &config, None).await.unwrap();

    let research = run.find("2").unwrap();
    assert!(research.is_included());
    assert_eq!(
        research.tag("article_type"),
        Some(&serde_json::json!("research_article"))
    );

    let editorial = run.find("1").unwrap();
    assert_eq!(editorial.tag("article_type"), Some(&serde_json::json!("editorial")));
    assert!(editorial
        .exclusion_reason()
        .unwrap()
        .starts_with("Article type excluded: editorial"));
    assert_eq!(run.statistic(ARTICLE_TYPE_EXCLUDED), Some(1));
}

#[tokio::test]
async fn test_topic_relevance_threshold() {
    let records = vec![
        ManuscriptRecord::from_pairs(
            "1",
            &[
                ("title", "Climate change and biodiversity loss"),
                (
                    "abstract",
                    "We study how climate change impacts biodiversity in alpine regions.",
                ),
            ],
            "We study how climate change impacts biodiversity in alpine regions.",
        ),
        ManuscriptRecord::from_pairs(
            "2",
            &[
                ("title", "Rhyme in medieval verse"),
                ("abstract", "A close reading of rhyme schemes in medieval poetry."),
            ],
            "A close reading of rhyme schemes in medieval poetry.",
        ),
    ];

    let mut config = ScreeningConfig::default().filters;
    config.topic_relevance.enabled = true;
    config.topic_relevance.topics = vec!["Climate change impacts on biodiversity".to_string()];

    let run = run_pipeline(records, &config, None).await.unwrap();

    let relevant = run.find("1").unwrap();
    assert!(relevant.is_included());
    let score = relevant.tag("topic_relevance_score").unwrap().as_f64().unwrap();
    assert!(score >= 0.5);

    let unrelated = run.find("2").unwrap();
    let reason = unrelated.exclusion_reason().unwrap();
    assert!(reason.starts_with("Topic relevance score ("));
    assert!(reason.ends_with("below minimum threshold (0.50)"));
    assert_eq!(run.statistic(TOPIC_RELEVANCE_EXCLUDED), Some(1));
}

#[tokio::test]
async fn test_ai_assisted_article_type_with_reordered_replies() {
    let mock = Arc::new(
        MockExtractor::with_responder(|prompt| {
            if prompt.prompt_content.contains("Letter to the editor") {
                Some(r#"{"primary_type": "letter", "all_types": ["letter"]}"#.to_string())
            } else {
                Some(
                    "```json\n{\"primary_type\": \"research_article\", \"all_types\": [\"research_article\", \"empirical_study\"], \"methodological_types\": [\"empirical_study\"]}\n```"
                        .to_string(),
                )
            }
        })
        .reversed(),
    );

    let records = vec![
        ManuscriptRecord::from_pairs("1", &[("title", "Letter to the editor")], "Short reply."),
        ManuscriptRecord::from_pairs("2", &[("title", "Field trial")], "We measured yields."),
        ManuscriptRecord::from_pairs("3", &[("title", "Greenhouse trial")], "We measured growth."),
    ];

    let mut config = ScreeningConfig::default().filters;
    config.article_type.enabled = true;
    config.article_type.use_ai = true;
    config.article_type.exclude_letters = true;

    let ai = AiAssist::new(mock.clone(), gpt());
    let run = run_pipeline(records, &config, Some(ai)).await.unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(
        run.find("1").unwrap().exclusion_reason(),
        Some("Article type excluded: letter")
    );
    for id in ["2", "3"] {
        let record = run.find(id).unwrap();
        assert!(record.is_included());
        assert_eq!(
            record.tag("article_type"),
            Some(&serde_json::json!("research_article"))
        );
    }
}

#[tokio::test]
async fn test_failed_ai_service_degrades_per_filter() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), FOUR_ROWS);
    enable_dedup_and_language(&mut config);
    config.filters.deduplication.use_ai = true;
    config.filters.language.use_ai = true;
    config.filters.llm = gpt();

    let mock = Arc::new(MockExtractor::failing("service down"));
    let report = Screener::new()
        .with_service(mock.clone())
        .with_cooldown(Duration::ZERO)
        .screen(&config)
        .await
        .unwrap();
    let run = &report.run;

    // Deduplication falls back to rules, language to "unknown".
    assert_eq!(run.find("2").unwrap().exclusion_reason(), Some("Duplicate of 1"));
    assert!(run.find("3").unwrap().is_included());
    assert_eq!(
        run.find("3").unwrap().tag("detected_language"),
        Some(&serde_json::json!("unknown"))
    );
    assert_eq!(run.included_records, 3);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_json_output_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), FOUR_ROWS);
    enable_dedup_and_language(&mut config);
    config.project.output_format = OutputFormat::Json;

    let report = Screener::new().screen(&config).await.unwrap();
    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report.output_path).unwrap()).unwrap();

    assert_eq!(doc["total_records"], 4);
    assert_eq!(doc["included_records"], 2);
    assert_eq!(doc["excluded_records"], 2);
    assert_eq!(doc["statistics"]["duplicates_found"], 1);
    assert_eq!(doc["statistics"]["language_excluded"], 1);

    let records = doc["records"].as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1]["id"], "2");
    assert_eq!(records[1]["include"], false);
    assert_eq!(records[1]["exclusion_reason"], "Duplicate of 1");
    assert_eq!(records[0]["original_data"]["year"], "2021");
}

#[tokio::test]
async fn test_csv_output_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), FOUR_ROWS);
    enable_dedup_and_language(&mut config);

    let report = Screener::new().screen(&config).await.unwrap();
    let mut reader = csv::Reader::from_path(&report.output_path).unwrap();

    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(&header[..3], &["title", "abstract", "year"]);
    assert!(header.iter().any(|h| h == "tag_duplicate_of"));
    assert!(header.iter().any(|h| h == "tag_detected_language"));
    assert_eq!(&header[header.len() - 2..], &["include", "exclusion_reason"]);
    assert_eq!(
        header.iter().filter(|h| h.as_str() == "tag_is_duplicate").count(),
        1
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 4);
    let include = header.len() - 2;
    let included: Vec<&str> = rows.iter().map(|row| &row[include]).collect();
    assert_eq!(included, vec!["true", "false", "false", "true"]);
}

#[tokio::test]
async fn test_header_only_input_writes_input_columns() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), "title,abstract,year\n");
    enable_dedup_and_language(&mut config);

    let report = Screener::new().screen(&config).await.unwrap();
    assert_eq!(report.run.total_records, 0);
    assert_eq!(
        fs::read_to_string(&report.output_path).unwrap(),
        "title,abstract,year,include,exclusion_reason\n"
    );
}

#[tokio::test]
async fn test_tsv_input_and_text_files() {
    let dir = tempfile::tempdir().unwrap();
    let paper = dir.path().join("paper.txt");
    fs::write(&paper, "Full text of the manuscript about soil carbon.").unwrap();

    let input = format!(
        "Title\tManuscript\nSoil carbon\t{}\nOther\tInline text\n",
        paper.display()
    );
    let path = write_input(dir.path(), "records.tsv", &input);

    let records = load_records(Path::new(&path), "manuscript").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].text(), "Full text of the manuscript about soil carbon.");
    assert_eq!(records[1].text(), "Inline text");

    let mut config = ScreeningConfig::default().filters;
    config.deduplication.enabled = true;
    config.deduplication.compare_fields = vec!["title".to_string()];
    let run = run_pipeline(records, &config, None).await.unwrap();

    let out = dir.path().join("out.json");
    write_results(&run, &out, OutputFormat::Json).unwrap();
    assert!(fs::read_to_string(out).unwrap().contains("\"Manuscript\""));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("screening.toml");

    let starter = ScreeningConfig::starter();
    starter.save(&path).unwrap();

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.project.text_column, starter.project.text_column);
    assert!(loaded.filters.deduplication.enabled);
    assert!(loaded.filters.article_type.exclude_editorials);
    assert!(loaded.validate().is_ok());
}
