//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_companies_table",
        sql: include_str!("sql/001_create_companies.sql"),
    },
    Migration {
        version: 2,
        description: "create_filings_table",
        sql: include_str!("sql/002_create_filings.sql"),
    },
    Migration {
        version: 3,
        description: "create_analysis_results_table",
        sql: include_str!("sql/003_create_analysis_results.sql"),
    },
    Migration {
        version: 4,
        description: "create_risk_assessments_table",
        sql: include_str!("sql/004_create_risk_assessments.sql"),
    },
    Migration {
        version: 5,
        description: "create_jobs_table",
        sql: include_str!("sql/005_create_jobs.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    // Create the migrations tracking table.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        // Running again should be a no-op.
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_all_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        for table in [
            "companies",
            "filings",
            "analysis_results",
            "risk_assessments",
            "jobs",
        ] {
            let count: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_accession_number_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO companies (cik, ticker, name, created_at) VALUES ('1', 'T', 'Test', '2026-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO filings (company_id, filing_type, filing_date, accession_number, created_at)
             VALUES (1, '10-K', '2026-01-01', '0000000001-26-000001', '2026-01-01')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO filings (company_id, filing_type, filing_date, accession_number, created_at)
             VALUES (1, '10-K', '2026-01-02', '0000000001-26-000001', '2026-01-02')",
            [],
        );
        assert!(dup.is_err());
    }
}
