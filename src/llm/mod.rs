pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::models::{Business, DocumentType, Jurisdiction};

/// Fixed system message establishing the assistant's role.
pub const SYSTEM_PROMPT: &str = "You are a legal document generator AI specializing in privacy policies and terms of service for startups. You must generate legally compliant documents based on the provided business information. Always respond in JSON format with the exact structure requested.";

// Generation runs for minutes on large documents; the request timeout has to
// cover that.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Generation failed: {0}")]
    Upstream(String),
    #[error("Invalid model reply: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub gdpr: bool,
    pub ccpa: bool,
    pub dpdp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub content: String,
    pub compliance: ComplianceCheck,
    pub recommendations: Vec<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One two-message exchange; returns the raw completion text.
    async fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Fails at construction if the HTTP client cannot be built, rather
    /// than continuing with one that lacks the request timeout.
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        model: String,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        // Credential check happens before any network I/O.
        let api_key = self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            GenerationError::Configuration(
                "OpenAI API key not configured. Please set OPENAI_API_KEY environment variable."
                    .to_string(),
            )
        })?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user}
                ],
                "response_format": {"type": "json_object"},
                "temperature": 0.3,
                "max_tokens": 4000
            }))
            .send()
            .await
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream(format!("HTTP {status}: {body}")));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        envelope["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                GenerationError::InvalidResponse("completion is missing message content".to_string())
            })
    }
}

/// Boundary wrapper around the completion service: builds the prompt, issues
/// the call, and validates the structured reply. No caching, no retries.
pub struct GenerationClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String) -> Self {
        Self { provider, model }
    }

    /// Identifier recorded in document metadata as generation provenance.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(
        &self,
        business: &Business,
        doc_type: DocumentType,
    ) -> Result<GeneratedDocument, GenerationError> {
        let user_prompt = prompt::build_prompt(business, doc_type);
        let raw = self.provider.chat(SYSTEM_PROMPT, &user_prompt).await?;
        parse_generated(&raw)
    }
}

/// Strict on the three top-level keys, lenient on their sub-fields: missing
/// compliance flags coerce to false and malformed recommendations collapse
/// to an empty list.
pub fn parse_generated(raw: &str) -> Result<GeneratedDocument, GenerationError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| GenerationError::InvalidResponse(format!("reply is not valid JSON: {e}")))?;

    let content = value
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_structure("content"))?
        .to_string();
    let compliance = value
        .get("compliance")
        .ok_or_else(|| invalid_structure("compliance"))?;
    let recommendations = value
        .get("recommendations")
        .ok_or_else(|| invalid_structure("recommendations"))?;

    Ok(GeneratedDocument {
        content,
        compliance: ComplianceCheck {
            gdpr: compliance["gdpr"].as_bool().unwrap_or(false),
            ccpa: compliance["ccpa"].as_bool().unwrap_or(false),
            dpdp: compliance["dpdp"].as_bool().unwrap_or(false),
        },
        recommendations: recommendations
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn invalid_structure(key: &str) -> GenerationError {
    GenerationError::InvalidResponse(format!("reply is missing required key '{key}'"))
}

/// Textual heuristic, not legal verification: a jurisdiction passes only if
/// the business selected it and the generated text carries that
/// jurisdiction's marker phrase.
pub fn validate_compliance(business: &Business, content: &str) -> ComplianceCheck {
    let listed = |j| business.jurisdictions.contains(&j);

    ComplianceCheck {
        gdpr: listed(Jurisdiction::Gdpr) && content.contains("right to rectification"),
        ccpa: listed(Jurisdiction::Ccpa) && content.contains("California residents"),
        dpdp: listed(Jurisdiction::Dpdp) && content.contains("Digital Personal Data Protection"),
    }
}

/// Fixed rule list, evaluated in a fixed order: jurisdiction gaps
/// (gdpr, ccpa, dpdp), then payment data, then third-party sharing, then a
/// missing website.
pub fn compliance_recommendations(
    business: &Business,
    compliance: &ComplianceCheck,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    let listed = |j| business.jurisdictions.contains(&j);

    if listed(Jurisdiction::Gdpr) && !compliance.gdpr {
        recommendations.push(
            "Add explicit GDPR compliance sections including user rights and consent mechanisms"
                .to_string(),
        );
    }
    if listed(Jurisdiction::Ccpa) && !compliance.ccpa {
        recommendations.push(
            "Include CCPA-specific language for California residents' privacy rights".to_string(),
        );
    }
    if listed(Jurisdiction::Dpdp) && !compliance.dpdp {
        recommendations.push(
            "Add India DPDP Act compliance clauses for data processing transparency".to_string(),
        );
    }

    if business.data_practices.collects_payment_data {
        recommendations.push(
            "Ensure PCI DSS compliance sections are included for payment data processing"
                .to_string(),
        );
    }
    if business.data_practices.shares_data_with_third_parties {
        recommendations
            .push("Include comprehensive third-party data sharing disclosure".to_string());
    }
    if business.website.is_none() {
        recommendations.push(
            "Add website URL to business information for complete legal documentation".to_string(),
        );
    }

    recommendations
}
