//! SEC EDGAR boundary: company lookup, filing retrieval, section extraction.
//!
//! Everything the registry returns is modeled as fixed-shape records with
//! optional fields. Downstream code treats any absent field as "not
//! provided" rather than an error.

pub mod client;

pub use client::EdgarClient;

use chrono::NaiveDate;

/// Character cap applied to the risk-factors and MD&A sections.
pub const RISK_SECTION_CAP: usize = 50_000;

/// Character cap applied to the business-description section.
pub const BUSINESS_SECTION_CAP: usize = 20_000;

/// Basic company information from the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyInfo {
    pub ticker: String,
    pub name: String,
    /// Zero-padded 10-digit CIK registry identifier.
    pub cik: String,
    pub sector: Option<String>,
}

/// A reference to one filing submission. Every field is optional: the
/// registry's metadata is not guaranteed complete for older filings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingHandle {
    pub cik: Option<String>,
    pub accession_number: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub fiscal_year: Option<i32>,
    pub primary_document: Option<String>,
}

/// Named narrative sections extracted from one filing, each capped and
/// empty when the underlying document lacks the section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingSections {
    pub risk_factors: String,
    pub mda: String,
    pub business: String,
    pub accession_number: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub fiscal_year: Option<i32>,
}

/// Source of filings and company metadata.
///
/// All lookups are fallible by returning `None` / empty sections; the
/// caller decides whether that is a skip or an error.
pub trait FilingSource: Send + Sync {
    /// Looks up company identity for a ticker.
    fn company_info(&self, ticker: &str) -> Option<CompanyInfo>;

    /// Returns the latest filing of the given form type for a ticker.
    fn latest_filing(&self, ticker: &str, form_type: &str) -> Option<FilingHandle>;

    /// Extracts the narrative sections for a filing.
    fn sections(&self, handle: &FilingHandle) -> FilingSections;

    /// Returns the public archive URL for a filing.
    fn filing_url(&self, handle: &FilingHandle) -> Option<String> {
        filing_url(handle)
    }
}

/// Truncates a string to at most `max` characters. Counts characters,
/// not bytes, so multi-byte content never splits mid-codepoint.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Builds the EDGAR archive URL for a filing: the accession number with
/// hyphens stripped, combined with the registry identifier.
pub fn filing_url(handle: &FilingHandle) -> Option<String> {
    let cik = handle.cik.as_deref()?;
    let accession = handle.accession_number.as_deref()?;
    Some(format!(
        "https://www.sec.gov/Archives/edgar/data/{}/{}",
        cik.trim_start_matches('0'),
        accession.replace('-', "")
    ))
}
