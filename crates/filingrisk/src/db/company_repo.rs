//! Company repository — CRUD operations for the `companies` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw company row from the database.
#[derive(Debug, Clone)]
pub struct CompanyRow {
    pub id: i64,
    pub cik: String,
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub created_at: String,
}

impl CompanyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            cik: row.get("cik")?,
            ticker: row.get("ticker")?,
            name: row.get("name")?,
            sector: row.get("sector")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields for creating a new company.
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub cik: String,
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
}

/// Inserts a new company and returns its id.
pub fn insert(db: &Database, company: &NewCompany, created_at: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO companies (cik, ticker, name, sector, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                company.cik,
                company.ticker,
                company.name,
                company.sector,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a company by its ticker symbol.
pub fn find_by_ticker(db: &Database, ticker: &str) -> Result<Option<CompanyRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM companies WHERE ticker = ?1",
                params![ticker],
                CompanyRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds a company by its id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<CompanyRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM companies WHERE id = ?1",
                params![id],
                CompanyRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists companies ordered by ticker, optionally filtered by sector.
pub fn list(
    db: &Database,
    sector: Option<&str>,
    limit: u64,
    offset: u64,
) -> Result<(Vec<CompanyRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let (total, rows) = if let Some(sector) = sector {
            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM companies WHERE sector = ?1",
                params![sector],
                |r| r.get(0),
            )?;
            let mut stmt = conn.prepare(
                "SELECT * FROM companies WHERE sector = ?1 ORDER BY ticker LIMIT ?2 OFFSET ?3",
            )?;
            let rows: Vec<CompanyRow> = stmt
                .query_map(params![sector, limit as i64, offset as i64], CompanyRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            (total, rows)
        } else {
            let total: u64 = conn.query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
            let mut stmt =
                conn.prepare("SELECT * FROM companies ORDER BY ticker LIMIT ?1 OFFSET ?2")?;
            let rows: Vec<CompanyRow> = stmt
                .query_map(params![limit as i64, offset as i64], CompanyRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            (total, rows)
        };
        Ok((rows, total))
    })
}

/// Counts all companies.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Counts companies that have at least one completed filing.
pub fn count_analyzed(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(DISTINCT c.id) FROM companies c
             JOIN filings f ON f.company_id = c.id
             WHERE f.status = 'completed'",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Lists distinct non-null sectors.
pub fn list_sectors(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT sector FROM companies WHERE sector IS NOT NULL ORDER BY sector",
        )?;
        let sectors: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sectors)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_company(ticker: &str, cik: &str) -> NewCompany {
        NewCompany {
            cik: cik.to_string(),
            ticker: ticker.to_string(),
            name: format!("{} Inc.", ticker),
            sector: Some("Technology".to_string()),
        }
    }

    #[test]
    fn test_insert_and_find_by_ticker() {
        let db = test_db();
        let id = insert(&db, &sample_company("AAPL", "0000320193"), "2026-01-01T00:00:00+00:00")
            .unwrap();
        assert!(id > 0);

        let found = find_by_ticker(&db, "AAPL").unwrap();
        assert!(found.is_some());
        let found = found.unwrap();
        assert_eq!(found.cik, "0000320193");
        assert_eq!(found.name, "AAPL Inc.");
        assert_eq!(found.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_ticker(&db, "ZZZZ").unwrap().is_none());
        assert!(find_by_id(&db, 999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_cik_rejected() {
        let db = test_db();
        insert(&db, &sample_company("AAPL", "0000320193"), "2026-01-01").unwrap();
        let dup = insert(&db, &sample_company("AAPL2", "0000320193"), "2026-01-01");
        assert!(dup.is_err());
    }

    #[test]
    fn test_list_with_sector_filter() {
        let db = test_db();
        insert(&db, &sample_company("AAPL", "1"), "2026-01-01").unwrap();
        let mut energy = sample_company("XOM", "2");
        energy.sector = Some("Energy".to_string());
        insert(&db, &energy, "2026-01-01").unwrap();

        let (rows, total) = list(&db, Some("Energy"), 100, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].ticker, "XOM");

        let (rows, total) = list(&db, None, 100, 0).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_count_analyzed_requires_completed_filing() {
        let db = test_db();
        let company_id = insert(&db, &sample_company("AAPL", "1"), "2026-01-01").unwrap();
        assert_eq!(count(&db).unwrap(), 1);
        assert_eq!(count_analyzed(&db).unwrap(), 0);

        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO filings (company_id, filing_type, filing_date, status, created_at)
                 VALUES (?1, '10-K', '2026-01-01', 'completed', '2026-01-01')",
                params![company_id],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count_analyzed(&db).unwrap(), 1);
    }

    #[test]
    fn test_list_sectors_distinct() {
        let db = test_db();
        insert(&db, &sample_company("A", "1"), "2026-01-01").unwrap();
        insert(&db, &sample_company("B", "2"), "2026-01-01").unwrap();
        let mut no_sector = sample_company("C", "3");
        no_sector.sector = None;
        insert(&db, &no_sector, "2026-01-01").unwrap();

        let sectors = list_sectors(&db).unwrap();
        assert_eq!(sectors, vec!["Technology".to_string()]);
    }
}
