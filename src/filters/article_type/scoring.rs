//! Rule-based article-type scoring and primary-type selection.
//!
//! Scoring and selection are kept apart so that either can be tested on its
//! own: [`score_article`] turns text into per-type scores and
//! [`select_classification`] turns scores into an
//! [`ArticleClassification`].

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::models::{ArticleClassification, ArticleType};
use crate::utils::text::char_prefix;

/// Characters treated as the abstract/introduction sample.
pub const SAMPLE_CHARS: usize = 2000;

/// Scores above this are significant enough to list a type.
pub const SIGNIFICANT_SCORE: f64 = 5.0;

const METHODOLOGICAL_ORDER: [ArticleType; 3] = [
    ArticleType::EmpiricalStudy,
    ArticleType::TheoreticalPaper,
    ArticleType::MethodsPaper,
];

const SCOPE_ORDER: [ArticleType; 2] = [ArticleType::SingleCaseStudy, ArticleType::SampleStudy];

/// Lowercased text plus its leading sample.
struct Text<'a> {
    sample: &'a str,
    full: &'a str,
}

impl Text<'_> {
    /// `in_sample` for phrases in the sample, otherwise `in_full` when present anywhere.
    fn tiered(&self, phrases: &[&str], in_sample: f64, in_full: f64) -> f64 {
        phrases
            .iter()
            .map(|phrase| {
                if self.sample.contains(phrase) {
                    in_sample
                } else if self.full.contains(phrase) {
                    in_full
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// `weight` for every phrase found anywhere in the text.
    fn each(&self, phrases: &[&str], weight: f64) -> f64 {
        phrases.iter().filter(|p| self.full.contains(*p)).count() as f64 * weight
    }

    fn has(&self, phrase: &str) -> bool {
        self.full.contains(phrase)
    }

    fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.full.contains(p))
    }

    fn len(&self) -> usize {
        self.full.chars().count()
    }
}

fn systematic_review(t: &Text) -> f64 {
    t.tiered(
        &[
            "systematic review",
            "prisma",
            "cochrane",
            "prospero",
            "systematic literature review",
            "systematic search",
        ],
        10.0,
        5.0,
    ) + t.each(
        &[
            "inclusion criteria",
            "exclusion criteria",
            "database search",
            "search strategy",
            "quality assessment",
            "risk of bias",
            "data extraction",
        ],
        3.0,
    )
}

fn meta_analysis(t: &Text) -> f64 {
    let mut score = 0.0;
    if ["meta-analysis", "meta analysis", "metaanalysis"]
        .iter()
        .any(|p| t.sample.contains(p))
    {
        score += 15.0;
    }
    score += t.each(
        &[
            "pooled",
            "forest plot",
            "funnel plot",
            "heterogeneity",
            "random effects",
            "fixed effects",
            "effect size",
            "pooled estimate",
            "combined results",
            "statistical synthesis",
        ],
        4.0,
    );
    if score > 0.0 && t.has("systematic review") {
        score += 5.0;
    }
    score
}

fn review(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "literature review",
            "narrative review",
            "scoping review",
            "integrative review",
            "critical review",
            "review of",
            "reviews the",
            "we review",
            "this review",
        ],
        8.0,
        4.0,
    );
    if t.has("review") && !t.has_any(&["data collection", "participants", "subjects"]) {
        score += 3.0;
    }
    score
}

fn research_article(t: &Text) -> f64 {
    let mut score = t.each(
        &[
            "methods",
            "methodology",
            "data collection",
            "participants",
            "subjects",
            "sample",
            "procedure",
            "materials",
        ],
        2.0,
    ) + t.each(
        &[
            "results",
            "findings",
            "analysis",
            "statistical",
            "significant",
            "p-value",
            "correlation",
            "regression",
        ],
        2.0,
    );
    if t.has("introduction") && t.has("discussion") {
        score += 3.0;
    }
    score
}

fn editorial(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "editorial",
            "editor's",
            "from the editor",
            "guest editorial",
            "this issue",
            "in this issue",
            "special issue",
        ],
        10.0,
        5.0,
    );
    if score > 0.0 && t.len() < 3000 {
        score += 3.0;
    }
    score
}

fn letter(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "letter to",
            "dear editor",
            "to the editor",
            "correspondence",
            "we read with interest",
            "response to",
            "reply to",
            "comment on",
        ],
        10.0,
        5.0,
    );
    if score > 0.0 && t.len() < 2000 {
        score += 3.0;
    }
    score
}

fn case_report(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "case report",
            "case presentation",
            "case study",
            "patient presentation",
            "clinical case",
            "case description",
            "we report",
            "we present a case",
            "year-old",
            "presented with",
            "chief complaint",
            "medical history",
            "clinical findings",
            "diagnosis",
            "treatment",
            "follow-up",
        ],
        4.0,
        2.0,
    );
    if t.has("patient") && t.has("diagnosis") {
        score += 3.0;
    }
    score
}

fn commentary(t: &Text) -> f64 {
    t.tiered(
        &[
            "commentary",
            "comment",
            "viewpoint",
            "opinion",
            "we comment",
            "authors comment",
            "invited commentary",
        ],
        8.0,
        4.0,
    )
}

fn perspective(t: &Text) -> f64 {
    t.tiered(
        &[
            "perspective",
            "point of view",
            "personal view",
            "author's perspective",
            "our perspective",
        ],
        8.0,
        4.0,
    )
}

fn empirical_study(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "data collection",
            "data were collected",
            "collected data",
            "gathered data",
            "survey",
            "experiment",
            "observation",
            "measurement",
            "empirical",
            "fieldwork",
            "interviews",
            "questionnaire",
        ],
        4.0,
        2.0,
    ) + t.each(
        &[
            "statistical analysis",
            "data analysis",
            "analyzed",
            "tested",
            "measured",
            "calculated",
            "regression",
            "correlation",
            "anova",
            "t-test",
        ],
        2.0,
    );
    if t.has("results") && t.has_any(&["data", "participants", "sample"]) {
        score += 3.0;
    }
    score
}

fn theoretical_paper(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "theoretical",
            "conceptual",
            "framework",
            "model",
            "theory",
            "proposition",
            "hypothesis",
            "conceptualize",
            "theorize",
            "theoretical framework",
            "conceptual model",
            "theoretical model",
        ],
        4.0,
        2.0,
    ) + t.each(
        &[
            "we propose",
            "we argue",
            "we posit",
            "we theorize",
            "this paper argues",
            "we conceptualize",
            "philosophical",
            "epistemological",
            "ontological",
        ],
        3.0,
    );
    if t.has_any(&["data collection", "empirical"]) {
        score -= 5.0;
    }
    score
}

fn methods_paper(t: &Text) -> f64 {
    t.tiered(
        &[
            "novel method",
            "new method",
            "method for",
            "technique for",
            "algorithm",
            "protocol",
            "procedure",
            "methodology",
            "methodological",
            "we present a method",
            "we introduce",
            "we develop",
        ],
        5.0,
        2.0,
    )
}

fn single_case_study(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "single case",
            "one case",
            "individual case",
            "one patient",
            "single patient",
            "one company",
            "single company",
            "one organization",
            "single organization",
            "n=1",
            "n = 1",
            "single subject",
            "individual subject",
        ],
        10.0,
        5.0,
    );
    if t.has_any(&["case study", "case analysis"]) && !t.has_any(&["multiple", "cases", "comparative"])
    {
        score += 5.0;
    }
    score
}

fn sample_study(t: &Text) -> f64 {
    let mut score = t.tiered(
        &[
            "participants",
            "subjects",
            "respondents",
            "patients",
            "sample",
            "cohort",
            "population",
            "cases",
            "companies",
            "organizations",
            "individuals",
        ],
        3.0,
        1.5,
    ) + t.each(
        &[
            "cross-sectional",
            "longitudinal",
            "cohort study",
            "case-control",
            "randomized",
            "controlled trial",
            "survey",
            "questionnaire",
            "recruited",
            "enrolled",
            "sampled",
        ],
        4.0,
    );
    if t.has_any(&["n=", "n ="]) && !t.has_any(&["n=1", "n = 1"]) {
        score += 5.0;
    }
    score
}

/// Score every category for `text`.
///
/// Publication types are kept when their score is positive. Methodological
/// and scope types are kept only above [`SIGNIFICANT_SCORE`], and scope is
/// scored only when empirical, research or case signals are present. The
/// map is ordered by [`ArticleType::PRIORITY`].
pub fn score_article(text: &str) -> IndexMap<ArticleType, f64> {
    let full = text.to_lowercase();
    let t = Text {
        sample: char_prefix(&full, SAMPLE_CHARS),
        full: &full,
    };

    let mut kept: HashMap<ArticleType, f64> = HashMap::new();

    let publication: [(ArticleType, fn(&Text) -> f64); 9] = [
        (ArticleType::SystematicReview, systematic_review),
        (ArticleType::MetaAnalysis, meta_analysis),
        (ArticleType::Review, review),
        (ArticleType::Editorial, editorial),
        (ArticleType::Letter, letter),
        (ArticleType::CaseReport, case_report),
        (ArticleType::Commentary, commentary),
        (ArticleType::Perspective, perspective),
        (ArticleType::ResearchArticle, research_article),
    ];
    for (article_type, score_fn) in publication {
        let score = score_fn(&t);
        if score > 0.0 {
            kept.insert(article_type, score);
        }
    }

    let methodological: [(ArticleType, fn(&Text) -> f64); 3] = [
        (ArticleType::EmpiricalStudy, empirical_study),
        (ArticleType::TheoreticalPaper, theoretical_paper),
        (ArticleType::MethodsPaper, methods_paper),
    ];
    for (article_type, score_fn) in methodological {
        let score = score_fn(&t);
        if score > SIGNIFICANT_SCORE {
            kept.insert(article_type, score);
        }
    }

    let scoped = [
        ArticleType::EmpiricalStudy,
        ArticleType::ResearchArticle,
        ArticleType::CaseReport,
    ]
    .iter()
    .any(|article_type| kept.get(article_type).is_some_and(|s| *s > 0.0));

    if scoped {
        let scope: [(ArticleType, fn(&Text) -> f64); 2] = [
            (ArticleType::SingleCaseStudy, single_case_study),
            (ArticleType::SampleStudy, sample_study),
        ];
        for (article_type, score_fn) in scope {
            let score = score_fn(&t);
            if score > SIGNIFICANT_SCORE {
                kept.insert(article_type, score);
            }
        }
    }

    ArticleType::PRIORITY
        .iter()
        .filter_map(|article_type| kept.get(article_type).map(|s| (*article_type, *s)))
        .collect()
}

/// Build a classification from per-type scores.
///
/// The primary type is the highest score in priority order; a later type
/// replaces the current choice only when strictly higher.
pub fn select_classification(type_scores: IndexMap<ArticleType, f64>) -> ArticleClassification {
    let score_of = |article_type: &ArticleType| type_scores.get(article_type).copied().unwrap_or(0.0);

    let mut primary_type = ArticleType::Unknown;
    let mut best = 0.0;
    for article_type in &ArticleType::PRIORITY {
        let score = score_of(article_type);
        if score > best {
            best = score;
            primary_type = *article_type;
        }
    }

    if primary_type == ArticleType::Unknown {
        return ArticleClassification {
            type_scores,
            ..ArticleClassification::unknown()
        };
    }

    let mut all_types: Vec<ArticleType> = ArticleType::PRIORITY
        .iter()
        .copied()
        .filter(|t| score_of(t) > SIGNIFICANT_SCORE)
        .collect();
    if !all_types.contains(&primary_type) {
        all_types.insert(0, primary_type);
    }

    let significant = |order: &[ArticleType]| -> Vec<ArticleType> {
        order
            .iter()
            .copied()
            .filter(|t| score_of(t) > SIGNIFICANT_SCORE)
            .collect()
    };

    ArticleClassification {
        primary_type,
        all_types,
        methodological_types: significant(&METHODOLOGICAL_ORDER),
        scope_types: significant(&SCOPE_ORDER),
        type_scores,
    }
}

/// Rule-based classification of a manuscript's text.
pub fn classify(text: &str) -> ArticleClassification {
    select_classification(score_article(text))
}
