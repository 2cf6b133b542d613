//! Article type taxonomy and the multi-label classification value object.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every category the classifier can assign.
///
/// Three dimensions share this enum: publication type, methodological type
/// and study scope. A manuscript may carry types from all three at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleType {
    // Publication types
    ResearchArticle,
    Review,
    Editorial,
    Letter,
    CaseReport,
    Commentary,
    Perspective,
    MetaAnalysis,
    SystematicReview,
    // Methodological types
    EmpiricalStudy,
    TheoreticalPaper,
    MethodsPaper,
    // Study scope
    SingleCaseStudy,
    SampleStudy,
    #[serde(other)]
    Unknown,
}

impl ArticleType {
    /// Order used to pick the primary type. Earlier wins ties.
    pub const PRIORITY: [ArticleType; 14] = [
        ArticleType::MetaAnalysis,
        ArticleType::SystematicReview,
        ArticleType::Review,
        ArticleType::MethodsPaper,
        ArticleType::ResearchArticle,
        ArticleType::CaseReport,
        ArticleType::Editorial,
        ArticleType::Letter,
        ArticleType::Commentary,
        ArticleType::Perspective,
        ArticleType::EmpiricalStudy,
        ArticleType::TheoreticalPaper,
        ArticleType::SingleCaseStudy,
        ArticleType::SampleStudy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleType::ResearchArticle => "research_article",
            ArticleType::Review => "review",
            ArticleType::Editorial => "editorial",
            ArticleType::Letter => "letter",
            ArticleType::CaseReport => "case_report",
            ArticleType::Commentary => "commentary",
            ArticleType::Perspective => "perspective",
            ArticleType::MetaAnalysis => "meta_analysis",
            ArticleType::SystematicReview => "systematic_review",
            ArticleType::EmpiricalStudy => "empirical_study",
            ArticleType::TheoreticalPaper => "theoretical_paper",
            ArticleType::MethodsPaper => "methods_paper",
            ArticleType::SingleCaseStudy => "single_case_study",
            ArticleType::SampleStudy => "sample_study",
            ArticleType::Unknown => "unknown",
        }
    }

    /// Lenient label parsing; anything unrecognised becomes `Unknown`.
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "research_article" => ArticleType::ResearchArticle,
            "review" => ArticleType::Review,
            "editorial" => ArticleType::Editorial,
            "letter" => ArticleType::Letter,
            "case_report" => ArticleType::CaseReport,
            "commentary" => ArticleType::Commentary,
            "perspective" => ArticleType::Perspective,
            "meta_analysis" => ArticleType::MetaAnalysis,
            "systematic_review" => ArticleType::SystematicReview,
            "empirical_study" => ArticleType::EmpiricalStudy,
            "theoretical_paper" => ArticleType::TheoreticalPaper,
            "methods_paper" => ArticleType::MethodsPaper,
            "single_case_study" => ArticleType::SingleCaseStudy,
            "sample_study" => ArticleType::SampleStudy,
            _ => ArticleType::Unknown,
        }
    }

    pub fn is_methodological(&self) -> bool {
        matches!(
            self,
            ArticleType::EmpiricalStudy | ArticleType::TheoreticalPaper | ArticleType::MethodsPaper
        )
    }

    pub fn is_scope(&self) -> bool {
        matches!(self, ArticleType::SingleCaseStudy | ArticleType::SampleStudy)
    }

    /// Short human description for CLI output.
    pub fn description(&self) -> &'static str {
        match self {
            ArticleType::ResearchArticle => "Original research with methods, results and conclusions",
            ArticleType::Review => "Literature review without a systematic protocol",
            ArticleType::Editorial => "Opinion piece written by editors",
            ArticleType::Letter => "Brief correspondence to the editor",
            ArticleType::CaseReport => "Report of a single patient, case or instance",
            ArticleType::Commentary => "Comment on previously published work",
            ArticleType::Perspective => "Author viewpoint or opinion",
            ArticleType::MetaAnalysis => "Statistical synthesis of multiple studies",
            ArticleType::SystematicReview => "Review following a structured protocol such as PRISMA",
            ArticleType::EmpiricalStudy => "Study based on observation or experiment with data collection",
            ArticleType::TheoreticalPaper => "Conceptual work without empirical data",
            ArticleType::MethodsPaper => "Presents a new method, technique or protocol",
            ArticleType::SingleCaseStudy => "In-depth analysis of one case (n=1)",
            ArticleType::SampleStudy => "Study of multiple subjects such as a cohort or survey",
            ArticleType::Unknown => "Could not be classified",
        }
    }
}

impl fmt::Display for ArticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ArticleType::parse_label(s))
    }
}

/// Multi-label classification result for one manuscript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleClassification {
    pub primary_type: ArticleType,
    pub all_types: Vec<ArticleType>,
    pub methodological_types: Vec<ArticleType>,
    pub scope_types: Vec<ArticleType>,
    pub type_scores: IndexMap<ArticleType, f64>,
}

impl ArticleClassification {
    /// Classification used when nothing could be determined.
    pub fn unknown() -> Self {
        Self {
            primary_type: ArticleType::Unknown,
            all_types: vec![ArticleType::Unknown],
            methodological_types: Vec::new(),
            scope_types: Vec::new(),
            type_scores: IndexMap::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.primary_type == ArticleType::Unknown
            && self.all_types.iter().all(|t| *t == ArticleType::Unknown)
            && self.methodological_types.is_empty()
            && self.scope_types.is_empty()
    }

    /// True when the type appears in any of the three dimensions.
    pub fn has_type(&self, article_type: ArticleType) -> bool {
        self.primary_type == article_type
            || self.all_types.contains(&article_type)
            || self.methodological_types.contains(&article_type)
            || self.scope_types.contains(&article_type)
    }

    pub fn has_any_type(&self, types: &[ArticleType]) -> bool {
        types.iter().any(|t| self.has_type(*t))
    }

    /// Distinct known types across all dimensions, primary first.
    pub fn distinct_types(&self) -> Vec<ArticleType> {
        let mut types = Vec::new();
        let all = std::iter::once(&self.primary_type)
            .chain(&self.all_types)
            .chain(&self.methodological_types)
            .chain(&self.scope_types);
        for t in all {
            if *t != ArticleType::Unknown && !types.contains(t) {
                types.push(*t);
            }
        }
        types
    }

    fn labels(types: &[ArticleType]) -> Vec<&'static str> {
        types.iter().map(ArticleType::as_str).collect()
    }

    /// Attach the classification to a record's tags.
    pub fn tag_values(&self) -> Vec<(&'static str, serde_json::Value)> {
        let scores: serde_json::Map<String, serde_json::Value> = self
            .type_scores
            .iter()
            .map(|(t, score)| (t.as_str().to_string(), serde_json::json!(score)))
            .collect();

        vec![
            ("article_type", serde_json::json!(self.primary_type.as_str())),
            ("all_article_types", serde_json::json!(Self::labels(&self.all_types))),
            (
                "methodological_types",
                serde_json::json!(Self::labels(&self.methodological_types)),
            ),
            ("scope_types", serde_json::json!(Self::labels(&self.scope_types))),
            ("type_scores", serde_json::Value::Object(scores)),
        ]
    }
}
