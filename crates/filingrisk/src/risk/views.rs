//! Presentation queries: read-only views assembled from stored rows.
//!
//! These return `None` for unknown entities so callers can report
//! not-found distinctly from internal failures.

use std::collections::BTreeMap;

use serde::Serialize;

use super::company_risk_scores;
use crate::db::{analysis_repo, company_repo, filing_repo, Database, DatabaseError};

/// Display cap for section text in the filing analysis view.
const SECTION_PREVIEW_CHARS: usize = 1_000;

/// One company with its latest filing date and current risk scores.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOverview {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub cik: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_filing_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_scores: Option<BTreeMap<String, f64>>,
}

/// Paginated company overview listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyListing {
    pub companies: Vec<CompanyOverview>,
    pub total: u64,
}

/// A filing without its raw content, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingSummary {
    pub id: i64,
    pub company_id: i64,
    pub filing_type: String,
    pub filing_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accession_number: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl FilingSummary {
    fn from_row(row: &filing_repo::FilingRow) -> Self {
        Self {
            id: row.id,
            company_id: row.company_id,
            filing_type: row.filing_type.clone(),
            filing_date: row.filing_date.clone(),
            fiscal_year: row.fiscal_year,
            accession_number: row.accession_number.clone(),
            status: row.status.clone(),
            created_at: row.created_at.clone(),
        }
    }
}

/// One category's stored assessment in a view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub severity: String,
    pub risks: Vec<String>,
}

/// A stored analysis with per-category detail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetail {
    pub id: i64,
    pub filing_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub risk_assessment: BTreeMap<String, CategoryDetail>,
    pub created_at: String,
}

/// Full analysis view for one filing, with previewed section text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingAnalysisView {
    #[serde(flatten)]
    pub analysis: AnalysisDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_factors_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mda_text: Option<String>,
}

/// Detailed view of one company.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub overview: CompanyOverview,
    pub filings: Vec<FilingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_analysis: Option<AnalysisDetail>,
}

fn overview_for(
    db: &Database,
    company: &company_repo::CompanyRow,
) -> Result<CompanyOverview, DatabaseError> {
    let filings = filing_repo::list_for_company(db, company.id)?;
    let latest_filing_date = filings.first().map(|f| f.filing_date.clone());
    let risk_scores = company_risk_scores(db, company.id)?;

    Ok(CompanyOverview {
        id: company.id,
        ticker: company.ticker.clone(),
        name: company.name.clone(),
        cik: company.cik.clone(),
        sector: company.sector.clone(),
        created_at: company.created_at.clone(),
        latest_filing_date,
        risk_scores,
    })
}

/// Lists companies with their latest filing date and risk scores.
pub fn company_overviews(
    db: &Database,
    sector: Option<&str>,
    limit: u64,
    offset: u64,
) -> Result<CompanyListing, DatabaseError> {
    let (rows, total) = company_repo::list(db, sector, limit, offset)?;
    let mut companies = Vec::with_capacity(rows.len());
    for row in &rows {
        companies.push(overview_for(db, row)?);
    }
    Ok(CompanyListing { companies, total })
}

fn assessment_details(
    db: &Database,
    filing_id: i64,
) -> Result<BTreeMap<String, CategoryDetail>, DatabaseError> {
    let mut detail = BTreeMap::new();
    for row in analysis_repo::assessments_for_filing(db, filing_id)? {
        let risks: Vec<String> = row
            .key_risks
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        detail.insert(
            row.category.clone(),
            CategoryDetail {
                score: row.score,
                severity: row.severity.clone(),
                risks,
            },
        );
    }
    Ok(detail)
}

/// Detailed company view: filings newest-first, the latest completed
/// analysis, and current risk scores. `None` for an unknown ticker.
pub fn company_detail(db: &Database, ticker: &str) -> Result<Option<CompanyDetail>, DatabaseError> {
    let Some(company) = company_repo::find_by_ticker(db, &ticker.to_uppercase())? else {
        return Ok(None);
    };

    let filings = filing_repo::list_for_company(db, company.id)?;

    let mut latest_analysis = None;
    if let Some(completed) = filings.iter().find(|f| f.status == "completed") {
        if let Some(analysis) = analysis_repo::find_for_filing(db, completed.id)? {
            latest_analysis = Some(AnalysisDetail {
                id: analysis.id,
                filing_id: analysis.filing_id,
                summary: analysis.summary.clone(),
                risk_assessment: assessment_details(db, completed.id)?,
                created_at: analysis.created_at.clone(),
            });
        }
    }

    let overview = overview_for(db, &company)?;
    Ok(Some(CompanyDetail {
        overview,
        filings: filings.iter().map(FilingSummary::from_row).collect(),
        latest_analysis,
    }))
}

/// Truncates text for display, appending an ellipsis when shortened.
fn preview(text: &str) -> String {
    if text.chars().count() > SECTION_PREVIEW_CHARS {
        let mut cut: String = text.chars().take(SECTION_PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

/// Analysis view for one filing: summary, previewed section text, and
/// per-category detail. `None` when the filing or its analysis is
/// missing.
pub fn filing_analysis(
    db: &Database,
    filing_id: i64,
) -> Result<Option<FilingAnalysisView>, DatabaseError> {
    if filing_repo::find_by_id(db, filing_id)?.is_none() {
        return Ok(None);
    }
    let Some(analysis) = analysis_repo::find_for_filing(db, filing_id)? else {
        return Ok(None);
    };

    Ok(Some(FilingAnalysisView {
        analysis: AnalysisDetail {
            id: analysis.id,
            filing_id: analysis.filing_id,
            summary: analysis.summary.clone(),
            risk_assessment: assessment_details(db, filing_id)?,
            created_at: analysis.created_at.clone(),
        },
        risk_factors_text: analysis.risk_factors_text.as_deref().map(preview),
        mda_text: analysis.mda_text.as_deref().map(preview),
    }))
}

/// All distinct sectors present in the store.
pub fn list_sectors(db: &Database) -> Result<Vec<String>, DatabaseError> {
    company_repo::list_sectors(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::analysis_repo::{NewAnalysis, NewAssessment};
    use crate::db::company_repo::NewCompany;
    use crate::db::filing_repo::NewFiling;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn seed_company(db: &Database, ticker: &str, sector: Option<&str>) -> i64 {
        company_repo::insert(
            db,
            &NewCompany {
                cik: format!("cik-{}", ticker),
                ticker: ticker.to_string(),
                name: format!("{} Inc.", ticker),
                sector: sector.map(|s| s.to_string()),
            },
            "2026-01-01",
        )
        .unwrap()
    }

    fn seed_completed_filing(db: &Database, company_id: i64, date: &str) -> i64 {
        let id = filing_repo::insert(
            db,
            &NewFiling {
                company_id,
                filing_type: "10-K".to_string(),
                filing_date: date.to_string(),
                fiscal_year: Some(2025),
                accession_number: Some(format!("acc-{}-{}", company_id, date)),
                filing_url: None,
                raw_content: None,
            },
            "2026-01-01",
        )
        .unwrap();
        filing_repo::update_status(db, id, "completed").unwrap();
        id
    }

    fn seed_analysis(db: &Database, filing_id: i64, section_len: usize) {
        analysis_repo::insert_analysis(
            db,
            &NewAnalysis {
                filing_id,
                summary: "Summary.".to_string(),
                risk_factors_text: "r".repeat(section_len),
                mda_text: "m".repeat(section_len),
                analysis_json: "{}".to_string(),
            },
            "2026-01-02",
        )
        .unwrap();
        analysis_repo::insert_assessment(
            db,
            &NewAssessment {
                filing_id,
                category: "operational".to_string(),
                severity: "medium".to_string(),
                score: 5.0,
                key_risks: r#"["supply chain", "cyber"]"#.to_string(),
            },
            "2026-01-02",
        )
        .unwrap();
    }

    #[test]
    fn test_company_overviews_with_and_without_scores() {
        let db = test_db();
        let with = seed_company(&db, "AAPL", Some("Technology"));
        seed_company(&db, "XOM", Some("Energy"));
        let filing_id = seed_completed_filing(&db, with, "2025-02-01");
        seed_analysis(&db, filing_id, 10);

        let listing = company_overviews(&db, None, 100, 0).unwrap();
        assert_eq!(listing.total, 2);

        let apple = listing
            .companies
            .iter()
            .find(|c| c.ticker == "AAPL")
            .unwrap();
        assert_eq!(apple.latest_filing_date.as_deref(), Some("2025-02-01"));
        assert!(apple.risk_scores.is_some());

        let exxon = listing.companies.iter().find(|c| c.ticker == "XOM").unwrap();
        assert!(exxon.latest_filing_date.is_none());
        assert!(exxon.risk_scores.is_none());
    }

    #[test]
    fn test_company_overviews_sector_filter() {
        let db = test_db();
        seed_company(&db, "AAPL", Some("Technology"));
        seed_company(&db, "XOM", Some("Energy"));

        let listing = company_overviews(&db, Some("Energy"), 100, 0).unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.companies[0].ticker, "XOM");
    }

    #[test]
    fn test_company_detail_unknown_ticker() {
        let db = test_db();
        assert!(company_detail(&db, "ZZZZ").unwrap().is_none());
    }

    #[test]
    fn test_company_detail_lowercase_ticker_matches() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL", None);
        let filing_id = seed_completed_filing(&db, company_id, "2025-02-01");
        seed_analysis(&db, filing_id, 10);

        let detail = company_detail(&db, "aapl").unwrap().unwrap();
        assert_eq!(detail.overview.ticker, "AAPL");
        assert_eq!(detail.filings.len(), 1);

        let analysis = detail.latest_analysis.unwrap();
        assert_eq!(analysis.filing_id, filing_id);
        let operational = &analysis.risk_assessment["operational"];
        assert_eq!(operational.score, Some(5.0));
        assert_eq!(operational.risks.len(), 2);
    }

    #[test]
    fn test_filing_analysis_previews_long_sections() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL", None);
        let filing_id = seed_completed_filing(&db, company_id, "2025-02-01");
        seed_analysis(&db, filing_id, 5_000);

        let view = filing_analysis(&db, filing_id).unwrap().unwrap();
        let risk_text = view.risk_factors_text.unwrap();
        assert_eq!(risk_text.chars().count(), SECTION_PREVIEW_CHARS + 3);
        assert!(risk_text.ends_with("..."));
    }

    #[test]
    fn test_filing_analysis_short_sections_untouched() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL", None);
        let filing_id = seed_completed_filing(&db, company_id, "2025-02-01");
        seed_analysis(&db, filing_id, 10);

        let view = filing_analysis(&db, filing_id).unwrap().unwrap();
        assert_eq!(view.risk_factors_text.as_deref(), Some("rrrrrrrrrr"));
    }

    #[test]
    fn test_filing_analysis_missing() {
        let db = test_db();
        assert!(filing_analysis(&db, 42).unwrap().is_none());

        let company_id = seed_company(&db, "AAPL", None);
        let filing_id = seed_completed_filing(&db, company_id, "2025-02-01");
        // Filing exists but has no analysis yet.
        assert!(filing_analysis(&db, filing_id).unwrap().is_none());
    }

    #[test]
    fn test_list_sectors() {
        let db = test_db();
        seed_company(&db, "AAPL", Some("Technology"));
        seed_company(&db, "MSFT", Some("Technology"));
        seed_company(&db, "XOM", Some("Energy"));

        let sectors = list_sectors(&db).unwrap();
        assert_eq!(sectors, vec!["Energy".to_string(), "Technology".to_string()]);
    }
}
