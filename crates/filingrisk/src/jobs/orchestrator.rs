//! The job orchestrator: runs the fetch and analyze pipelines as
//! background threads with single-flight control per job type.
//!
//! Each pipeline walks its backlog strictly sequentially, persists
//! progress after every item, and isolates per-item failures so one bad
//! item never aborts the batch. An error escaping the per-item scope
//! (roster loading, store unavailable) marks the whole job failed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::{JobType, JobView, OrchestratorError};
use crate::analyzer::{ModelTransport, RiskAnalyzer, RiskAnalysis};
use crate::config::{load_roster, RosterEntry, Settings};
use crate::db::analysis_repo::{self, NewAnalysis, NewAssessment};
use crate::db::company_repo::{self, NewCompany};
use crate::db::filing_repo::{self, FilingRow, NewFiling};
use crate::db::{job_repo, Database};
use crate::edgar::{truncate_chars, EdgarClient, FilingSource, RISK_SECTION_CAP};
use crate::risk::{self, RiskSummary, Severity};

/// The only filing form the fetch pipeline retrieves.
const FETCH_FORM_TYPE: &str = "10-K";

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Orchestrates the two background pipelines against one store.
pub struct JobOrchestrator {
    db: Database,
    roster_path: PathBuf,
    source: Arc<dyn FilingSource>,
    transport: Option<Arc<dyn ModelTransport>>,
    /// Serializes job-start requests: the availability check and the
    /// job-row insert must not interleave across callers.
    start_lock: Mutex<()>,
}

impl JobOrchestrator {
    pub fn new(
        db: Database,
        roster_path: PathBuf,
        source: Arc<dyn FilingSource>,
        transport: Option<Arc<dyn ModelTransport>>,
    ) -> Self {
        Self {
            db,
            roster_path,
            source,
            transport,
            start_lock: Mutex::new(()),
        }
    }

    /// Builds an orchestrator with the production collaborators.
    pub fn from_settings(db: Database, settings: &Settings) -> Self {
        let source = Arc::new(EdgarClient::new(&settings.sec_user_agent));
        let transport: Option<Arc<dyn ModelTransport>> = settings
            .gemini_api_key
            .as_deref()
            .map(|key| Arc::new(crate::analyzer::GeminiClient::new(key)) as Arc<dyn ModelTransport>);
        Self::new(db, settings.roster_path.clone(), source, transport)
    }

    /// Starts a fetch job in the background, returning its id
    /// immediately. Rejects when a fetch job is already active.
    pub fn start_fetch(self: &Arc<Self>) -> Result<String, OrchestratorError> {
        let job_id = self.create_job(JobType::Fetch)?;
        info!(job_id, "Fetch job queued");

        let orchestrator = Arc::clone(self);
        let id = job_id.clone();
        self.spawn_pipeline("filingrisk-fetch", &job_id, move || {
            orchestrator.run_fetch(&id)
        })?;
        Ok(job_id)
    }

    /// Starts an analyze job in the background, returning its id
    /// immediately. Rejects when an analyze job is already active.
    pub fn start_analyze(self: &Arc<Self>) -> Result<String, OrchestratorError> {
        let job_id = self.create_job(JobType::Analyze)?;
        info!(job_id, "Analyze job queued");

        let orchestrator = Arc::clone(self);
        let id = job_id.clone();
        self.spawn_pipeline("filingrisk-analyze", &job_id, move || {
            orchestrator.run_analyze(&id)
        })?;
        Ok(job_id)
    }

    /// Returns the job with the given id, or the most recent job when
    /// no id is given. `None` when no such job exists.
    pub fn get_status(&self, job_id: Option<&str>) -> Result<Option<JobView>, OrchestratorError> {
        let row = match job_id {
            Some(id) => job_repo::find_by_id(&self.db, id)?,
            None => job_repo::latest(&self.db)?,
        };
        Ok(row.map(JobView::from))
    }

    /// Returns recent jobs, most recent first.
    pub fn get_history(&self, limit: u64) -> Result<Vec<JobView>, OrchestratorError> {
        let rows = job_repo::history(&self.db, limit)?;
        Ok(rows.into_iter().map(JobView::from).collect())
    }

    /// Computes the cross-company risk summary.
    pub fn risk_summary(&self) -> Result<RiskSummary, OrchestratorError> {
        Ok(risk::risk_summary(&self.db)?)
    }

    /// Returns a terminal filing to `pending` and removes its stored
    /// analysis, making it eligible for the next analyze run. The
    /// pipelines themselves never leave a terminal state.
    pub fn reset_filing(&self, filing_id: i64) -> Result<(), OrchestratorError> {
        if filing_repo::find_by_id(&self.db, filing_id)?.is_none() {
            return Err(OrchestratorError::FilingNotFound(filing_id));
        }
        analysis_repo::delete_for_filing(&self.db, filing_id)?;
        filing_repo::update_status(&self.db, filing_id, "pending")?;
        info!(filing_id, "Filing reset to pending");
        Ok(())
    }

    /// Creates a new pending job row, enforcing single-flight per type.
    fn create_job(&self, job_type: JobType) -> Result<String, OrchestratorError> {
        let _guard = self
            .start_lock
            .lock()
            .map_err(|_| crate::db::DatabaseError::LockPoisoned)?;

        if let Some(existing) = job_repo::find_active_by_type(&self.db, job_type.as_str())? {
            warn!(
                job_type = %job_type,
                existing_job_id = existing.id,
                "Job already running"
            );
            return Err(OrchestratorError::JobAlreadyRunning(job_type));
        }

        let job_id = Uuid::new_v4().to_string();
        job_repo::insert(&self.db, &job_id, job_type.as_str(), &now_rfc3339())?;
        Ok(job_id)
    }

    fn spawn_pipeline<F>(
        &self,
        thread_name: &str,
        job_id: &str,
        body: F,
    ) -> Result<(), OrchestratorError>
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = thread::Builder::new().name(thread_name.into()).spawn(body) {
            // The job row exists but nothing will run it; fail it so it
            // does not block future starts.
            let _ = job_repo::mark_failed(
                &self.db,
                job_id,
                &format!("Failed to spawn pipeline thread: {}", e),
                &now_rfc3339(),
            );
            return Err(OrchestratorError::Spawn(e.to_string()));
        }
        Ok(())
    }

    fn run_fetch(&self, job_id: &str) {
        if let Err(e) = self.fetch_pipeline(job_id) {
            error!(job_id, error = %e, "Fetch job failed");
            if let Err(persist) =
                job_repo::mark_failed(&self.db, job_id, &e.to_string(), &now_rfc3339())
            {
                error!(job_id, error = %persist, "Failed to record job failure");
            }
        }
    }

    fn run_analyze(&self, job_id: &str) {
        if let Err(e) = self.analyze_pipeline(job_id) {
            error!(job_id, error = %e, "Analyze job failed");
            if let Err(persist) =
                job_repo::mark_failed(&self.db, job_id, &e.to_string(), &now_rfc3339())
            {
                error!(job_id, error = %persist, "Failed to record job failure");
            }
        }
    }

    // ─── Fetch pipeline ─────────────────────────────────────────────

    fn fetch_pipeline(&self, job_id: &str) -> Result<(), OrchestratorError> {
        job_repo::mark_running(&self.db, job_id, &now_rfc3339())?;
        info!(job_id, "Fetch job started");

        let roster = load_roster(&self.roster_path)?;
        job_repo::set_total_items(&self.db, job_id, roster.len() as u64)?;

        for (i, entry) in roster.iter().enumerate() {
            let _span = info_span!("fetch_company", ticker = %entry.ticker).entered();
            info!(
                ticker = %entry.ticker,
                progress = format!("{}/{}", i + 1, roster.len()),
                "Processing company"
            );

            // Per-item isolation: a failed entry is logged and counted,
            // never allowed to abort the roster walk.
            if let Err(e) = self.fetch_company(entry) {
                warn!(ticker = %entry.ticker, error = %e, "Error processing company");
            }
            if let Err(e) = job_repo::set_completed_items(&self.db, job_id, (i + 1) as u64) {
                warn!(job_id, error = %e, "Failed to persist job progress");
            }
        }

        job_repo::mark_completed(&self.db, job_id, &now_rfc3339())?;
        info!(job_id, total_processed = roster.len(), "Fetch job completed");
        Ok(())
    }

    fn fetch_company(&self, entry: &RosterEntry) -> Result<(), OrchestratorError> {
        let ticker = entry.ticker.as_str();

        let company = match company_repo::find_by_ticker(&self.db, ticker)? {
            Some(company) => Some(company),
            None => match self.source.company_info(ticker) {
                Some(info) => {
                    let id = company_repo::insert(
                        &self.db,
                        &NewCompany {
                            cik: info.cik,
                            ticker: info.ticker,
                            name: info.name,
                            // The roster's sector hint wins over the
                            // registry's classification.
                            sector: entry.sector.clone().or(info.sector),
                        },
                        &now_rfc3339(),
                    )?;
                    info!(ticker, company_id = id, "Company created");
                    company_repo::find_by_id(&self.db, id)?
                }
                None => {
                    // Lookup produced nothing: skip the filing fetch but
                    // still count the entry as processed.
                    None
                }
            },
        };

        let Some(company) = company else {
            return Ok(());
        };

        if filing_repo::exists_for_company(&self.db, company.id, FETCH_FORM_TYPE)? {
            debug!(ticker, "Filing already exists");
            return Ok(());
        }

        let Some(handle) = self.source.latest_filing(ticker, FETCH_FORM_TYPE) else {
            return Ok(());
        };
        let sections = self.source.sections(&handle);

        let filing_date = match sections.filing_date {
            Some(date) => date,
            None => {
                let today = Utc::now().date_naive();
                warn!(
                    ticker,
                    fallback_date = %today,
                    "Filing metadata has no date, falling back to today"
                );
                today
            }
        };

        let raw_content = json!({
            "risk_factors": sections.risk_factors,
            "mda": sections.mda,
            "business": sections.business,
            "accession_number": sections.accession_number,
            "filing_date": sections.filing_date.map(|d| d.to_string()),
            "fiscal_year": sections.fiscal_year,
        });

        let filing_id = filing_repo::insert(
            &self.db,
            &NewFiling {
                company_id: company.id,
                filing_type: FETCH_FORM_TYPE.to_string(),
                filing_date: filing_date.to_string(),
                fiscal_year: sections.fiscal_year,
                accession_number: sections.accession_number.clone(),
                filing_url: self.source.filing_url(&handle),
                raw_content: Some(raw_content.to_string()),
            },
            &now_rfc3339(),
        )?;
        info!(
            ticker,
            filing_id,
            accession_number = sections.accession_number.as_deref().unwrap_or(""),
            "Filing saved"
        );
        Ok(())
    }

    // ─── Analyze pipeline ───────────────────────────────────────────

    fn analyze_pipeline(&self, job_id: &str) -> Result<(), OrchestratorError> {
        job_repo::mark_running(&self.db, job_id, &now_rfc3339())?;
        info!(job_id, "Analyze job started");

        // Fatal, non-retryable configuration error: no model credential.
        let Some(transport) = self.transport.clone() else {
            error!(job_id, "Gemini API key not configured");
            job_repo::mark_failed(
                &self.db,
                job_id,
                "Gemini API key not configured",
                &now_rfc3339(),
            )?;
            return Ok(());
        };
        let analyzer = RiskAnalyzer::new(transport);

        let pending = filing_repo::list_by_status(&self.db, "pending")?;
        job_repo::set_total_items(&self.db, job_id, pending.len() as u64)?;
        info!(count = pending.len(), "Found pending filings");

        for (i, filing) in pending.iter().enumerate() {
            let _span = info_span!("analyze_filing", filing_id = filing.id).entered();
            info!(
                filing_id = filing.id,
                progress = format!("{}/{}", i + 1, pending.len()),
                "Analyzing filing"
            );

            if let Err(e) = self.analyze_filing(&analyzer, filing) {
                warn!(filing_id = filing.id, error = %e, "Error analyzing filing");
                if let Err(persist) = filing_repo::update_status(&self.db, filing.id, "error") {
                    warn!(filing_id = filing.id, error = %persist, "Failed to mark filing error");
                }
            }
            if let Err(e) = job_repo::set_completed_items(&self.db, job_id, (i + 1) as u64) {
                warn!(job_id, error = %e, "Failed to persist job progress");
            }
        }

        job_repo::mark_completed(&self.db, job_id, &now_rfc3339())?;
        info!(job_id, total_analyzed = pending.len(), "Analyze job completed");
        Ok(())
    }

    fn analyze_filing(
        &self,
        analyzer: &RiskAnalyzer<dyn ModelTransport>,
        filing: &FilingRow,
    ) -> Result<(), OrchestratorError> {
        let raw = filing.raw_content.as_deref().unwrap_or("");
        if raw.is_empty() {
            // Nothing refetches content once the filing row exists, so
            // an empty payload can never become analyzable.
            warn!(filing_id = filing.id, "Filing has no content");
            filing_repo::update_status(&self.db, filing.id, "error")?;
            return Ok(());
        }

        let sections: Value = serde_json::from_str(raw)
            .map_err(|e| crate::analyzer::AnalyzerError::Parse(e.to_string()))?;
        let risk_factors = sections
            .get("risk_factors")
            .and_then(Value::as_str)
            .unwrap_or("");
        let mda = sections.get("mda").and_then(Value::as_str).unwrap_or("");

        if risk_factors.is_empty() && mda.is_empty() {
            warn!(filing_id = filing.id, "Filing has no analyzable content");
            filing_repo::update_status(&self.db, filing.id, "error")?;
            return Ok(());
        }

        // Visible mid-flight state for observers polling filing status.
        filing_repo::update_status(&self.db, filing.id, "processing")?;

        let analysis = analyzer.analyze(risk_factors, mda)?;
        self.store_analysis(filing, risk_factors, mda, &analysis)?;

        filing_repo::update_status(&self.db, filing.id, "completed")?;
        Ok(())
    }

    fn store_analysis(
        &self,
        filing: &FilingRow,
        risk_factors: &str,
        mda: &str,
        analysis: &RiskAnalysis,
    ) -> Result<(), OrchestratorError> {
        let now = now_rfc3339();

        // Extract categories before writing anything: a malformed
        // risk_assessment shape fails the filing without leaving a
        // partial analysis row behind.
        let assessments = analysis.category_assessments()?;

        analysis_repo::insert_analysis(
            &self.db,
            &NewAnalysis {
                filing_id: filing.id,
                summary: analysis.summary().to_string(),
                risk_factors_text: truncate_chars(risk_factors, RISK_SECTION_CAP),
                mda_text: truncate_chars(mda, RISK_SECTION_CAP),
                analysis_json: analysis.to_json_string(),
            },
            &now,
        )?;

        let mut scores = Vec::with_capacity(assessments.len());
        for assessment in &assessments {
            scores.push(assessment.score);
            analysis_repo::insert_assessment(
                &self.db,
                &NewAssessment {
                    filing_id: filing.id,
                    category: assessment.category.clone(),
                    severity: Severity::from_score(assessment.score).as_str().to_string(),
                    score: assessment.score,
                    key_risks: serde_json::to_string(&assessment.risks)
                        .unwrap_or_else(|_| "[]".to_string()),
                },
                &now,
            )?;
        }

        info!(
            filing_id = filing.id,
            overall_score = risk::overall(&scores),
            "Filing analyzed successfully"
        );
        Ok(())
    }
}
