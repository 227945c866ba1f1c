//! Analysis repository — `analysis_results` and `risk_assessments` tables.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A stored analysis result row (1:1 with a filing).
#[derive(Debug, Clone)]
pub struct AnalysisRow {
    pub id: i64,
    pub filing_id: i64,
    pub summary: Option<String>,
    pub risk_factors_text: Option<String>,
    pub mda_text: Option<String>,
    pub analysis_json: Option<String>,
    pub created_at: String,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filing_id: row.get("filing_id")?,
            summary: row.get("summary")?,
            risk_factors_text: row.get("risk_factors_text")?,
            mda_text: row.get("mda_text")?,
            analysis_json: row.get("analysis_json")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields for creating a new analysis result.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub filing_id: i64,
    pub summary: String,
    pub risk_factors_text: String,
    pub mda_text: String,
    pub analysis_json: String,
}

/// A stored per-category risk assessment row.
#[derive(Debug, Clone)]
pub struct AssessmentRow {
    pub id: i64,
    pub filing_id: i64,
    pub category: String,
    pub severity: String,
    pub score: Option<f64>,
    pub key_risks: Option<String>,
    pub created_at: String,
}

impl AssessmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filing_id: row.get("filing_id")?,
            category: row.get("category")?,
            severity: row.get("severity")?,
            score: row.get("score")?,
            key_risks: row.get("key_risks")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields for creating a new risk assessment.
#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub filing_id: i64,
    pub category: String,
    pub severity: String,
    pub score: f64,
    pub key_risks: String,
}

/// Inserts a new analysis result and returns its id.
pub fn insert_analysis(
    db: &Database,
    analysis: &NewAnalysis,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO analysis_results (filing_id, summary, risk_factors_text, mda_text,
             analysis_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                analysis.filing_id,
                analysis.summary,
                analysis.risk_factors_text,
                analysis.mda_text,
                analysis.analysis_json,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Inserts a new risk assessment row.
pub fn insert_assessment(
    db: &Database,
    assessment: &NewAssessment,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO risk_assessments (filing_id, category, severity, score, key_risks,
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                assessment.filing_id,
                assessment.category,
                assessment.severity,
                assessment.score,
                assessment.key_risks,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds the analysis result for a filing.
pub fn find_for_filing(db: &Database, filing_id: i64) -> Result<Option<AnalysisRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM analysis_results WHERE filing_id = ?1",
                params![filing_id],
                AnalysisRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns all risk assessments for a filing.
pub fn assessments_for_filing(
    db: &Database,
    filing_id: i64,
) -> Result<Vec<AssessmentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM risk_assessments WHERE filing_id = ?1 ORDER BY id")?;
        let rows: Vec<AssessmentRow> = stmt
            .query_map(params![filing_id], AssessmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns all risk assessments belonging to completed filings.
pub fn assessments_for_completed_filings(
    db: &Database,
) -> Result<Vec<AssessmentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT ra.* FROM risk_assessments ra
             JOIN filings f ON f.id = ra.filing_id
             WHERE f.status = 'completed'
             ORDER BY ra.id",
        )?;
        let rows: Vec<AssessmentRow> = stmt
            .query_map([], AssessmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes the analysis result and all risk assessments for a filing.
pub fn delete_for_filing(db: &Database, filing_id: i64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM risk_assessments WHERE filing_id = ?1",
            params![filing_id],
        )?;
        conn.execute(
            "DELETE FROM analysis_results WHERE filing_id = ?1",
            params![filing_id],
        )?;
        Ok(())
    })
}
