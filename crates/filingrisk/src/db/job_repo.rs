//! Job repository — CRUD operations for the `jobs` table.
//!
//! Jobs are orchestration records, never deleted; the table doubles as
//! the audit trail of every pipeline run.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub total_items: u64,
    pub completed_items: u64,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_type: row.get("job_type")?,
            status: row.get("status")?,
            total_items: row.get("total_items")?,
            completed_items: row.get("completed_items")?,
            error_message: row.get("error_message")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new job row with status `pending` and zeroed counters.
pub fn insert(db: &Database, id: &str, job_type: &str, created_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, job_type, status, total_items, completed_items, created_at)
             VALUES (?1, ?2, 'pending', 0, 0, ?3)",
            params![id, job_type, created_at],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds an active (pending or running) job of the given type.
///
/// Pending counts as active: a job row exists before its pipeline
/// thread has marked it running, and that window must not admit a
/// second start of the same type.
pub fn find_active_by_type(db: &Database, job_type: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE job_type = ?1 AND status IN ('pending', 'running')
                 ORDER BY created_at DESC LIMIT 1",
                params![job_type],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Marks a job running and records its start time.
pub fn mark_running(db: &Database, id: &str, started_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = 'running', started_at = ?2 WHERE id = ?1",
            params![id, started_at],
        )?;
        Ok(())
    })
}

/// Marks a job completed and records its end time.
pub fn mark_completed(db: &Database, id: &str, completed_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = 'completed', completed_at = ?2 WHERE id = ?1",
            params![id, completed_at],
        )?;
        Ok(())
    })
}

/// Marks a job failed with an error message and records its end time.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error_message: &str,
    completed_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = ?2, completed_at = ?3 WHERE id = ?1",
            params![id, error_message, completed_at],
        )?;
        Ok(())
    })
}

/// Sets the total item count for a job.
pub fn set_total_items(db: &Database, id: &str, total: u64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET total_items = ?2 WHERE id = ?1",
            params![id, total],
        )?;
        Ok(())
    })
}

/// Sets the completed item count for a job.
pub fn set_completed_items(db: &Database, id: &str, completed: u64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET completed_items = ?2 WHERE id = ?1",
            params![id, completed],
        )?;
        Ok(())
    })
}

/// Returns the most recently created job, if any.
pub fn latest(db: &Database) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns recent jobs, most recent first.
pub fn history(db: &Database, limit: u64) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?1")?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts all jobs of the given type.
pub fn count_by_type(db: &Database, job_type: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE job_type = ?1",
            params![job_type],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, "job-1", "fetch", "2026-01-01T00:00:00+00:00").unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.job_type, "fetch");
        assert_eq!(found.status, "pending");
        assert_eq!(found.total_items, 0);
        assert_eq!(found.completed_items, 0);
        assert!(found.started_at.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_find_active_by_type() {
        let db = test_db();
        assert!(find_active_by_type(&db, "fetch").unwrap().is_none());

        insert(&db, "job-1", "fetch", "2026-01-01T00:00:00+00:00").unwrap();
        // Pending jobs count as active.
        assert!(find_active_by_type(&db, "fetch").unwrap().is_some());
        assert!(find_active_by_type(&db, "analyze").unwrap().is_none());

        mark_running(&db, "job-1", "2026-01-01T00:00:01+00:00").unwrap();
        assert!(find_active_by_type(&db, "fetch").unwrap().is_some());

        mark_completed(&db, "job-1", "2026-01-01T00:01:00+00:00").unwrap();
        assert!(find_active_by_type(&db, "fetch").unwrap().is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let db = test_db();
        insert(&db, "job-1", "analyze", "2026-01-01T00:00:00+00:00").unwrap();

        mark_running(&db, "job-1", "2026-01-01T00:00:01+00:00").unwrap();
        let row = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(row.status, "running");
        assert!(row.started_at.is_some());

        set_total_items(&db, "job-1", 5).unwrap();
        set_completed_items(&db, "job-1", 3).unwrap();
        let row = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(row.total_items, 5);
        assert_eq!(row.completed_items, 3);

        mark_failed(&db, "job-1", "boom", "2026-01-01T00:02:00+00:00").unwrap();
        let row = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert_eq!(row.error_message.as_deref(), Some("boom"));
        assert!(row.completed_at.is_some());
    }

    #[test]
    fn test_latest_and_history_order() {
        let db = test_db();
        insert(&db, "job-1", "fetch", "2026-01-01T00:00:00+00:00").unwrap();
        insert(&db, "job-2", "analyze", "2026-01-02T00:00:00+00:00").unwrap();
        insert(&db, "job-3", "fetch", "2026-01-03T00:00:00+00:00").unwrap();

        assert_eq!(latest(&db).unwrap().unwrap().id, "job-3");

        let recent = history(&db, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "job-3");
        assert_eq!(recent[1].id, "job-2");

        assert_eq!(count_by_type(&db, "fetch").unwrap(), 2);
    }

    #[test]
    fn test_latest_empty() {
        let db = test_db();
        assert!(latest(&db).unwrap().is_none());
        assert!(history(&db, 10).unwrap().is_empty());
    }
}
