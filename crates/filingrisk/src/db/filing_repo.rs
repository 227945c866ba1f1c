//! Filing repository — CRUD operations for the `filings` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw filing row from the database.
#[derive(Debug, Clone)]
pub struct FilingRow {
    pub id: i64,
    pub company_id: i64,
    pub filing_type: String,
    pub filing_date: String,
    pub fiscal_year: Option<i32>,
    pub accession_number: Option<String>,
    pub filing_url: Option<String>,
    pub raw_content: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl FilingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            company_id: row.get("company_id")?,
            filing_type: row.get("filing_type")?,
            filing_date: row.get("filing_date")?,
            fiscal_year: row.get("fiscal_year")?,
            accession_number: row.get("accession_number")?,
            filing_url: row.get("filing_url")?,
            raw_content: row.get("raw_content")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields for creating a new filing.
#[derive(Debug, Clone)]
pub struct NewFiling {
    pub company_id: i64,
    pub filing_type: String,
    pub filing_date: String,
    pub fiscal_year: Option<i32>,
    pub accession_number: Option<String>,
    pub filing_url: Option<String>,
    pub raw_content: Option<String>,
}

/// Inserts a new filing with status `pending` and returns its id.
pub fn insert(db: &Database, filing: &NewFiling, created_at: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO filings (company_id, filing_type, filing_date, fiscal_year,
             accession_number, filing_url, raw_content, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
            params![
                filing.company_id,
                filing.filing_type,
                filing.filing_date,
                filing.fiscal_year,
                filing.accession_number,
                filing.filing_url,
                filing.raw_content,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a filing by its id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<FilingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM filings WHERE id = ?1",
                params![id],
                FilingRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns true if the company already has a filing of the given type.
pub fn exists_for_company(
    db: &Database,
    company_id: i64,
    filing_type: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM filings WHERE company_id = ?1 AND filing_type = ?2",
            params![company_id, filing_type],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Returns all filings with the given status, oldest first (insertion order).
pub fn list_by_status(db: &Database, status: &str) -> Result<Vec<FilingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM filings WHERE status = ?1 ORDER BY id")?;
        let rows: Vec<FilingRow> = stmt
            .query_map(params![status], FilingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists filings newest-first with an optional status filter.
pub fn list(
    db: &Database,
    status: Option<&str>,
    limit: u64,
    offset: u64,
) -> Result<Vec<FilingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let rows = if let Some(status) = status {
            let mut stmt = conn.prepare(
                "SELECT * FROM filings WHERE status = ?1
                 ORDER BY filing_date DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![status, limit as i64, offset as i64], FilingRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn
                .prepare("SELECT * FROM filings ORDER BY filing_date DESC LIMIT ?1 OFFSET ?2")?;
            let rows = stmt
                .query_map(params![limit as i64, offset as i64], FilingRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        Ok(rows)
    })
}

/// Returns all filings for a company, newest filing date first.
pub fn list_for_company(db: &Database, company_id: i64) -> Result<Vec<FilingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM filings WHERE company_id = ?1 ORDER BY filing_date DESC")?;
        let rows: Vec<FilingRow> = stmt
            .query_map(params![company_id], FilingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns the most recent completed filing for a company, if any.
pub fn latest_completed_for_company(
    db: &Database,
    company_id: i64,
) -> Result<Option<FilingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM filings WHERE company_id = ?1 AND status = 'completed'
                 ORDER BY filing_date DESC LIMIT 1",
                params![company_id],
                FilingRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Updates only the status of a filing.
pub fn update_status(db: &Database, id: i64, status: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE filings SET status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(())
    })
}

/// Counts filings with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM filings WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::company_repo::{self, NewCompany};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn seed_company(db: &Database, ticker: &str) -> i64 {
        company_repo::insert(
            db,
            &NewCompany {
                cik: format!("cik-{}", ticker),
                ticker: ticker.to_string(),
                name: format!("{} Inc.", ticker),
                sector: None,
            },
            "2026-01-01T00:00:00+00:00",
        )
        .unwrap()
    }

    fn sample_filing(company_id: i64, accession: &str, date: &str) -> NewFiling {
        NewFiling {
            company_id,
            filing_type: "10-K".to_string(),
            filing_date: date.to_string(),
            fiscal_year: Some(2025),
            accession_number: Some(accession.to_string()),
            filing_url: None,
            raw_content: Some(r#"{"risk_factors": "risks", "mda": "mda"}"#.to_string()),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL");
        let id = insert(&db, &sample_filing(company_id, "acc-1", "2026-01-15"), "2026-01-16")
            .unwrap();

        let found = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(found.company_id, company_id);
        assert_eq!(found.status, "pending");
        assert_eq!(found.fiscal_year, Some(2025));
        assert_eq!(found.accession_number.as_deref(), Some("acc-1"));
    }

    #[test]
    fn test_exists_for_company() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL");
        assert!(!exists_for_company(&db, company_id, "10-K").unwrap());

        insert(&db, &sample_filing(company_id, "acc-1", "2026-01-15"), "2026-01-16").unwrap();
        assert!(exists_for_company(&db, company_id, "10-K").unwrap());
        assert!(!exists_for_company(&db, company_id, "10-Q").unwrap());
    }

    #[test]
    fn test_list_by_status_insertion_order() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL");
        let first = insert(&db, &sample_filing(company_id, "a", "2026-03-01"), "2026-01-01")
            .unwrap();
        let second = insert(&db, &sample_filing(company_id, "b", "2026-01-01"), "2026-01-02")
            .unwrap();

        let pending = list_by_status(&db, "pending").unwrap();
        assert_eq!(pending.len(), 2);
        // Query order is insertion order, not filing-date order.
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[1].id, second);
    }

    #[test]
    fn test_update_status() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL");
        let id = insert(&db, &sample_filing(company_id, "a", "2026-01-01"), "2026-01-01").unwrap();

        update_status(&db, id, "processing").unwrap();
        assert_eq!(find_by_id(&db, id).unwrap().unwrap().status, "processing");

        update_status(&db, id, "completed").unwrap();
        assert_eq!(find_by_id(&db, id).unwrap().unwrap().status, "completed");
        assert_eq!(count_by_status(&db, "completed").unwrap(), 1);
        assert_eq!(count_by_status(&db, "pending").unwrap(), 0);
    }

    #[test]
    fn test_latest_completed_for_company() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL");
        assert!(latest_completed_for_company(&db, company_id)
            .unwrap()
            .is_none());

        let older = insert(&db, &sample_filing(company_id, "a", "2024-02-01"), "2026-01-01")
            .unwrap();
        let newer = insert(&db, &sample_filing(company_id, "b", "2025-02-01"), "2026-01-01")
            .unwrap();
        update_status(&db, older, "completed").unwrap();
        update_status(&db, newer, "completed").unwrap();

        let latest = latest_completed_for_company(&db, company_id).unwrap().unwrap();
        assert_eq!(latest.id, newer);
    }

    #[test]
    fn test_list_newest_first() {
        let db = test_db();
        let company_id = seed_company(&db, "AAPL");
        insert(&db, &sample_filing(company_id, "a", "2024-02-01"), "2026-01-01").unwrap();
        insert(&db, &sample_filing(company_id, "b", "2025-02-01"), "2026-01-01").unwrap();

        let rows = list(&db, None, 100, 0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].filing_date, "2025-02-01");

        let pending = list(&db, Some("pending"), 1, 0).unwrap();
        assert_eq!(pending.len(), 1);
    }
}
