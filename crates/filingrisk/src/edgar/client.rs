//! EDGAR HTTP client over the data.sec.gov JSON APIs.
//!
//! The section extraction here is intentionally shallow: tags are
//! stripped and item headings located by text search. Good enough to
//! hand capped narrative text to the analyzer; not a filing parser.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    truncate_chars, CompanyInfo, FilingHandle, FilingSections, FilingSource, BUSINESS_SECTION_CAP,
    RISK_SECTION_CAP,
};

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// Client for SEC EDGAR company and filing metadata.
pub struct EdgarClient {
    http: reqwest::blocking::Client,
}

impl EdgarClient {
    /// Creates a client. The SEC requires a contact address in the
    /// User-Agent header; requests without one are rejected.
    pub fn new(user_agent: &str) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    fn get_json(&self, url: &str) -> Option<Value> {
        match self.http.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(resp) => match resp.json::<Value>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(url, error = %e, "EDGAR response was not valid JSON");
                    None
                }
            },
            Err(e) => {
                let text = e.to_string();
                if text.contains("429") || text.to_lowercase().contains("rate") {
                    warn!(url, error = %text, "EDGAR rate limit exceeded");
                } else {
                    warn!(url, error = %text, "EDGAR request failed");
                }
                None
            }
        }
    }

    fn get_text(&self, url: &str) -> Option<String> {
        match self.http.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(resp) => resp.text().ok(),
            Err(e) => {
                warn!(url, error = %e, "EDGAR document fetch failed");
                None
            }
        }
    }

    /// Resolves a ticker to its zero-padded 10-digit CIK.
    fn lookup_cik(&self, ticker: &str) -> Option<String> {
        let tickers = self.get_json(TICKERS_URL)?;
        let wanted = ticker.to_uppercase();
        let entries = tickers.as_object()?;
        for entry in entries.values() {
            if entry.get("ticker").and_then(Value::as_str) == Some(wanted.as_str()) {
                let cik = entry.get("cik_str").and_then(Value::as_u64)?;
                return Some(format!("{:010}", cik));
            }
        }
        debug!(ticker, "Ticker not present in registry index");
        None
    }

    fn submissions(&self, cik: &str) -> Option<Value> {
        self.get_json(&format!("https://data.sec.gov/submissions/CIK{}.json", cik))
    }
}

impl FilingSource for EdgarClient {
    fn company_info(&self, ticker: &str) -> Option<CompanyInfo> {
        let cik = self.lookup_cik(ticker)?;
        let submissions = self.submissions(&cik)?;

        let name = submissions
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(ticker)
            .to_string();
        let sector = submissions
            .get("sicDescription")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        Some(CompanyInfo {
            ticker: ticker.to_uppercase(),
            name,
            cik,
            sector,
        })
    }

    fn latest_filing(&self, ticker: &str, form_type: &str) -> Option<FilingHandle> {
        let cik = self.lookup_cik(ticker)?;
        let submissions = self.submissions(&cik)?;
        let recent = submissions.get("recent").or_else(|| {
            submissions
                .get("filings")
                .and_then(|f| f.get("recent"))
        })?;

        let forms = recent.get("form").and_then(Value::as_array)?;
        let index = forms
            .iter()
            .position(|f| f.as_str() == Some(form_type))?;

        let field = |name: &str| {
            recent
                .get(name)
                .and_then(Value::as_array)
                .and_then(|a| a.get(index))
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };

        let filing_date = field("filingDate")
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
        let fiscal_year = field("reportDate")
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .map(|d| {
                use chrono::Datelike;
                d.year()
            });

        Some(FilingHandle {
            cik: Some(cik),
            accession_number: field("accessionNumber"),
            filing_date,
            fiscal_year,
            primary_document: field("primaryDocument"),
        })
    }

    fn sections(&self, handle: &FilingHandle) -> FilingSections {
        let mut sections = FilingSections {
            accession_number: handle.accession_number.clone(),
            filing_date: handle.filing_date,
            fiscal_year: handle.fiscal_year,
            ..Default::default()
        };

        let document = match (&handle.cik, &handle.accession_number, &handle.primary_document)
        {
            (Some(cik), Some(accession), Some(doc)) => {
                let url = format!(
                    "https://www.sec.gov/Archives/edgar/data/{}/{}/{}",
                    cik.trim_start_matches('0'),
                    accession.replace('-', ""),
                    doc
                );
                self.get_text(&url)
            }
            _ => {
                debug!("Filing handle missing fields needed for document fetch");
                None
            }
        };

        let Some(document) = document else {
            return sections;
        };

        let text = strip_markup(&document);
        sections.risk_factors = truncate_chars(
            &extract_item(&text, "item 1a", &["item 1b", "item 2"]),
            RISK_SECTION_CAP,
        );
        sections.mda = truncate_chars(
            &extract_item(&text, "item 7", &["item 7a", "item 8"]),
            RISK_SECTION_CAP,
        );
        sections.business = truncate_chars(
            &extract_item(&text, "item 1", &["item 1a", "item 2"]),
            BUSINESS_SECTION_CAP,
        );

        debug!(
            risk_factors_len = sections.risk_factors.len(),
            mda_len = sections.mda.len(),
            "Sections extracted"
        );
        sections
    }
}

/// Strips markup tags and decodes the handful of entities common in
/// EDGAR documents, collapsing runs of whitespace.
fn strip_markup(document: &str) -> String {
    let mut out = String::with_capacity(document.len() / 2);
    let mut in_tag = false;
    for c in document.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#160;", " ")
        .replace("&#8217;", "'");

    let mut collapsed = String::with_capacity(decoded.len());
    let mut last_was_space = false;
    for c in decoded.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }
    collapsed
}

/// Returns true if the character after a heading match keeps it from
/// being the heading we want (e.g. "item 7a" when searching "item 7").
fn continues_heading(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .map(|c| c.is_ascii_alphanumeric())
        .unwrap_or(false)
}

/// Finds byte offsets of every heading occurrence, boundary-checked.
fn heading_positions(lower: &str, heading: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(rel) = lower[from..].find(heading) {
        let start = from + rel;
        let end = start + heading.len();
        if !continues_heading(lower, end) {
            positions.push(start);
        }
        from = end;
    }
    positions
}

/// Extracts the text between the last occurrence of `start_heading` and
/// the first following end heading. The last occurrence skips tables of
/// contents, where every item heading appears once near the top.
fn extract_item(text: &str, start_heading: &str, end_headings: &[&str]) -> String {
    // ASCII lowercasing keeps byte offsets aligned with the original.
    let lower = text.to_ascii_lowercase();
    let starts = heading_positions(&lower, start_heading);
    let Some(&start) = starts.last() else {
        return String::new();
    };

    let body_from = start + start_heading.len();
    let end = end_headings
        .iter()
        .flat_map(|h| heading_positions(&lower[body_from..], h).into_iter().next())
        .min()
        .map(|rel| body_from + rel)
        .unwrap_or(text.len());

    text[body_from..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_removes_tags_and_entities() {
        let html = "<html><body><b>Risk&nbsp;Factors</b> are &amp; stay <i>real</i></body></html>";
        let text = strip_markup(html);
        assert!(text.contains("Risk Factors"));
        assert!(text.contains("& stay"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_strip_markup_collapses_whitespace() {
        let text = strip_markup("a\n\n\t  b");
        assert_eq!(text, "a b");
    }

    #[test]
    fn test_extract_item_between_headings() {
        let text = "Item 1A. Risk Factors The sky could fall. Item 1B. Unresolved Staff Comments";
        let section = extract_item(text, "item 1a", &["item 1b", "item 2"]);
        assert!(section.contains("The sky could fall"));
        assert!(!section.contains("Unresolved"));
    }

    #[test]
    fn test_extract_item_skips_table_of_contents() {
        let text = "Item 1A Risk Factors ..... 12 Item 7 MD&A ..... 30 \
                    Item 1A. Risk Factors Actual risk narrative here. Item 1B. Other";
        let section = extract_item(text, "item 1a", &["item 1b", "item 2"]);
        assert!(section.contains("Actual risk narrative"));
        assert!(!section.contains("..... 12"));
    }

    #[test]
    fn test_extract_item_boundary_check() {
        // "item 7a" must not satisfy a search for "item 7".
        let text = "Item 7A. Quantitative Disclosures only";
        assert_eq!(extract_item(text, "item 7", &["item 8"]), "");
    }

    #[test]
    fn test_extract_item_missing_returns_empty() {
        assert_eq!(extract_item("no headings here", "item 1a", &["item 2"]), "");
    }

    #[test]
    fn test_extract_item_runs_to_end_without_end_heading() {
        let text = "Item 7. Management's Discussion continues to the end";
        let section = extract_item(text, "item 7", &["item 7a", "item 8"]);
        assert!(section.contains("continues to the end"));
    }
}
