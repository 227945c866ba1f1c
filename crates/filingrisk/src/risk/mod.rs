//! Risk aggregation: pure scoring functions and summary statistics over
//! stored assessments.

pub mod views;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyzer::RISK_CATEGORIES;
use crate::db::{analysis_repo, company_repo, filing_repo, Database, DatabaseError};

/// Three-level severity label derived from a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Buckets a score: >= 7 high, >= 4 medium, below that low. The
    /// boundaries hold for fractional scores too (6.9 is medium).
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Rounds to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Arithmetic mean of the given scores rounded to one decimal place.
/// Returns 0.0 (not an error) when no scores are present.
pub fn overall(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    round1(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Latest risk scores for a company: a category → score mapping with an
/// `overall` entry appended.
///
/// Returns `None` when the company has no completed filing, or when its
/// latest completed filing has no assessment rows — distinct from an
/// all-zero result.
pub fn company_risk_scores(
    db: &Database,
    company_id: i64,
) -> Result<Option<BTreeMap<String, f64>>, DatabaseError> {
    let Some(filing) = filing_repo::latest_completed_for_company(db, company_id)? else {
        return Ok(None);
    };

    let assessments = analysis_repo::assessments_for_filing(db, filing.id)?;
    if assessments.is_empty() {
        return Ok(None);
    }

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for row in &assessments {
        if let Some(score) = row.score {
            scores.insert(row.category.clone(), score);
        }
    }

    let values: Vec<f64> = scores.values().copied().collect();
    scores.insert("overall".to_string(), overall(&values));
    Ok(Some(scores))
}

/// Aggregated risk picture across all companies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub total_companies: u64,
    pub analyzed_companies: u64,
    pub high_risk_count: u64,
    pub medium_risk_count: u64,
    pub low_risk_count: u64,
    /// Mean of the per-filing mean scores; absent when nothing has been
    /// analyzed (never reported as zero).
    pub average_risk_score: Option<f64>,
    pub risk_by_category: BTreeMap<String, Option<f64>>,
}

/// Computes the cross-company risk summary.
///
/// Severity counts are tallied per completed filing, not per company: a
/// company with several completed filings contributes several counts.
pub fn risk_summary(db: &Database) -> Result<RiskSummary, DatabaseError> {
    let total_companies = company_repo::count(db)?;
    let analyzed_companies = company_repo::count_analyzed(db)?;

    let assessments = analysis_repo::assessments_for_completed_filings(db)?;

    let mut category_scores: BTreeMap<&str, Vec<f64>> =
        RISK_CATEGORIES.iter().map(|c| (*c, Vec::new())).collect();
    let mut filing_scores: BTreeMap<i64, Vec<f64>> = BTreeMap::new();

    for row in &assessments {
        let Some(score) = row.score else { continue };
        if let Some(bucket) = category_scores.get_mut(row.category.as_str()) {
            bucket.push(score);
        }
        filing_scores.entry(row.filing_id).or_default().push(score);
    }

    let risk_by_category: BTreeMap<String, Option<f64>> = category_scores
        .into_iter()
        .map(|(category, scores)| {
            let mean = if scores.is_empty() {
                None
            } else {
                Some(round1(scores.iter().sum::<f64>() / scores.len() as f64))
            };
            (category.to_string(), mean)
        })
        .collect();

    let mut high_risk_count = 0;
    let mut medium_risk_count = 0;
    let mut low_risk_count = 0;
    let mut filing_means = Vec::new();

    for scores in filing_scores.values() {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        filing_means.push(mean);
        match Severity::from_score(mean.round()) {
            Severity::High => high_risk_count += 1,
            Severity::Medium => medium_risk_count += 1,
            Severity::Low => low_risk_count += 1,
        }
    }

    let average_risk_score = if filing_means.is_empty() {
        None
    } else {
        Some(round1(
            filing_means.iter().sum::<f64>() / filing_means.len() as f64,
        ))
    };

    Ok(RiskSummary {
        total_companies,
        analyzed_companies,
        high_risk_count,
        medium_risk_count,
        low_risk_count,
        average_risk_score,
        risk_by_category,
    })
}
