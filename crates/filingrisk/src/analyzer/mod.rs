//! Risk analyzer: builds the analysis prompt, sends it through a model
//! transport, and repairs the model's free-text reply into a validated
//! structured result.

pub mod transport;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use transport::{GeminiClient, ModelTransport, TransportError};

/// The fixed set of risk categories, in presentation order.
pub const RISK_CATEGORIES: [&str; 5] = [
    "operational",
    "financial",
    "regulatory",
    "strategic",
    "reputational",
];

/// Character cap applied to each section before embedding in the prompt.
/// Tighter than the storage cap; applied independently per section.
const PROMPT_SECTION_CAP: usize = 15_000;

/// Placeholder when the model omits the summary.
const DEFAULT_SUMMARY: &str = "Analysis summary not available.";

/// Placeholder risk when a category could not be assessed.
const DEFAULT_RISK_NOTE: &str = "Unable to assess";

/// Score given to a category the model did not score.
const DEFAULT_SCORE: f64 = 5.0;

/// Errors surfaced by the analyzer. Both kinds are recoverable at the
/// per-filing level and are handled identically by the orchestrator.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The reply held no decodable JSON object, or a decodable one with
    /// an unusable shape.
    #[error("Failed to parse model response: {0}")]
    Parse(String),

    /// The model call itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One category's extracted assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAssessment {
    pub category: String,
    pub score: f64,
    pub risks: Vec<String>,
}

/// The repaired structured result of one analysis.
#[derive(Debug, Clone)]
pub struct RiskAnalysis {
    value: Value,
}

impl RiskAnalysis {
    /// The executive summary (placeholder-substituted when absent).
    pub fn summary(&self) -> &str {
        self.value
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SUMMARY)
    }

    /// The full repaired result, serialized for storage.
    pub fn to_json_string(&self) -> String {
        self.value.to_string()
    }

    /// Extracts per-category assessments from the result, in fixed
    /// category order, keeping only the known categories.
    ///
    /// A `risk_assessment` that is present but not an object is an
    /// error here rather than at parse time: repair only covers total
    /// absence, never a wrong shape.
    pub fn category_assessments(&self) -> Result<Vec<CategoryAssessment>, AnalyzerError> {
        let assessment = self
            .value
            .get("risk_assessment")
            .ok_or_else(|| AnalyzerError::Parse("risk_assessment missing".to_string()))?;
        let entries = assessment.as_object().ok_or_else(|| {
            AnalyzerError::Parse("risk_assessment is not a JSON object".to_string())
        })?;

        let mut result = Vec::new();
        for category in RISK_CATEGORIES {
            let Some(entry) = entries.get(category) else {
                continue;
            };
            if !entry.is_object() {
                return Err(AnalyzerError::Parse(format!(
                    "risk_assessment entry '{}' is not a JSON object",
                    category
                )));
            }
            let score = entry
                .get("score")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_SCORE);
            let risks = entry
                .get("risks")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default();
            result.push(CategoryAssessment {
                category: category.to_string(),
                score,
                risks,
            });
        }
        Ok(result)
    }
}

/// Analyzer bound to a model transport.
pub struct RiskAnalyzer<T: ModelTransport + ?Sized> {
    transport: std::sync::Arc<T>,
}

impl<T: ModelTransport + ?Sized> RiskAnalyzer<T> {
    pub fn new(transport: std::sync::Arc<T>) -> Self {
        Self { transport }
    }

    /// Analyzes the two narrative sections and returns the repaired
    /// structured result.
    pub fn analyze(&self, risk_factors: &str, mda: &str) -> Result<RiskAnalysis, AnalyzerError> {
        let prompt = build_prompt(risk_factors, mda);

        info!(
            risk_factors_len = risk_factors.len(),
            mda_len = mda.len(),
            "Starting analysis"
        );

        let reply = self.transport.generate(&prompt)?;
        let result = parse_response(&reply)?;

        info!(summary_len = result.summary().len(), "Analysis completed");
        Ok(result)
    }
}

/// Builds the fixed analysis prompt. Sections are capped independently
/// before embedding; the combined prompt is not capped again.
pub fn build_prompt(risk_factors: &str, mda: &str) -> String {
    let risk_factors: String = risk_factors.chars().take(PROMPT_SECTION_CAP).collect();
    let mda: String = mda.chars().take(PROMPT_SECTION_CAP).collect();

    format!(
        r#"Analyze this SEC 10-K filing and return a JSON response with the following structure:

{{
    "summary": "A 3-paragraph executive summary covering: 1) Company overview and business performance, 2) Key financial highlights and trends, 3) Major challenges and outlook",
    "risk_assessment": {{
        "operational": {{
            "score": <number 1-10>,
            "risks": ["risk1", "risk2", "risk3"]
        }},
        "financial": {{
            "score": <number 1-10>,
            "risks": ["risk1", "risk2", "risk3"]
        }},
        "regulatory": {{
            "score": <number 1-10>,
            "risks": ["risk1", "risk2", "risk3"]
        }},
        "strategic": {{
            "score": <number 1-10>,
            "risks": ["risk1", "risk2", "risk3"]
        }},
        "reputational": {{
            "score": <number 1-10>,
            "risks": ["risk1", "risk2", "risk3"]
        }}
    }}
}}

Risk Categories:
- Operational: Supply chain, cybersecurity, process failures, labor issues
- Financial: FX exposure, interest rates, liquidity, debt levels
- Regulatory: Compliance, environmental, data privacy, industry regulations
- Strategic: Competition, market disruption, concentration, M&A risks
- Reputational: ESG, climate, social responsibility, brand risks

Score Guide:
- 1-3: Low risk
- 4-6: Medium risk
- 7-10: High risk

IMPORTANT: Return ONLY valid JSON, no markdown formatting or extra text.

--- RISK FACTORS SECTION ---
{risk_factors}

--- MD&A SECTION ---
{mda}
"#
    )
}

/// Parses the model reply into a repaired structured result.
///
/// Handles the ways the model bends the JSON-only instruction: leading
/// prose, markdown fences, trailing commentary. Missing top-level keys
/// are repaired; a present key with the wrong shape is not.
pub fn parse_response(text: &str) -> Result<RiskAnalysis, AnalyzerError> {
    debug!(response_len = text.len(), "Parsing model response");

    let mut cleaned = text.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    let cleaned = cleaned.trim();

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if e >= s => (s, e),
        _ => {
            warn!(
                preview = &text[..text.len().min(200)],
                "No JSON object found in response"
            );
            return Err(AnalyzerError::Parse(
                "No JSON object found in response".to_string(),
            ));
        }
    };

    let value: Value = serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| AnalyzerError::Parse(e.to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(AnalyzerError::Parse(
            "Response is not a JSON object".to_string(),
        ));
    };

    if !object.contains_key("summary") {
        warn!("Summary missing from response, using default");
        object.insert("summary".to_string(), Value::String(DEFAULT_SUMMARY.into()));
    }
    if !object.contains_key("risk_assessment") {
        warn!("Risk assessment missing from response, using default");
        object.insert("risk_assessment".to_string(), default_risk_assessment());
    }

    Ok(RiskAnalysis {
        value: Value::Object(object),
    })
}

/// Builds a fresh default risk-assessment object. A new value is
/// constructed on every call so callers can never share mutable state
/// through the default.
fn default_risk_assessment() -> Value {
    let mut map = Map::new();
    for category in RISK_CATEGORIES {
        map.insert(
            category.to_string(),
            json!({"score": DEFAULT_SCORE as i64, "risks": [DEFAULT_RISK_NOTE]}),
        );
    }
    Value::Object(map)
}
