//! Collaborator service clients
//!
//! Two remote services sit outside the capture engine: a codebase Q&A service
//! that answers natural-language questions about a repository, and an LLM
//! extractor that pulls structured URLs/integrations out of the prose answer.
//! Both are single-shot request/response calls with no state of their own.
//!
//! Transport and auth failures surface as errors; malformed model output from
//! the extractor degrades to an empty result instead of failing the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};

const QA_BASE_URL: &str = "https://api.greptile.com/v2";
const EXTRACTOR_BASE_URL: &str = "https://api.x.ai/v1";
const EXTRACTOR_MODEL: &str = "grok-4-1-fast";

/// A URL the extractor found in free text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedUrl {
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// A third-party integration the extractor identified in a Q&A answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredIntegration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Client for the codebase Q&A service (Greptile-compatible REST API)
pub struct QaClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl QaClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: QA_BASE_URL.to_string(),
        }
    }

    /// Read the API key from `GREPTILE_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GREPTILE_API_KEY")
            .map_err(|_| Error::MissingConfig("GREPTILE_API_KEY".into()))?;
        Ok(Self::new(api_key))
    }

    /// Point the client at a different endpoint (tests, self-hosted)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Submit a repository for indexing. Run once before querying it.
    pub async fn index_repo(&self, repo: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/repositories", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "remote": "github",
                "repository": repo,
                "branch": "main",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(
                "codebase Q&A",
                format!("indexing failed with HTTP {}: {}", status, body),
            ));
        }

        tracing::info!("Submitted {} for indexing", repo);
        Ok(())
    }

    /// Ask a natural-language question about a repository.
    /// Returns the service's free-text answer.
    pub async fn ask_about_code(&self, question: &str, repo: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "messages": [{"role": "user", "content": question}],
                "repositories": [{"remote": "github", "repository": repo, "branch": "main"}],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(
                "codebase Q&A",
                format!("query failed with HTTP {}: {}", status, body),
            ));
        }

        #[derive(Deserialize)]
        struct QueryResponse {
            #[serde(default)]
            message: Option<String>,
        }

        let parsed: QueryResponse = response.json().await?;
        Ok(parsed
            .message
            .unwrap_or_else(|| "No answer found.".to_string()))
    }
}

/// Client for the LLM text extractor (xAI-style chat completions API)
pub struct ExtractorClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExtractorClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: EXTRACTOR_BASE_URL.to_string(),
        }
    }

    /// Read the API key from `XAI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("XAI_API_KEY").map_err(|_| Error::MissingConfig("XAI_API_KEY".into()))?;
        Ok(Self::new(api_key))
    }

    /// Point the client at a different endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": EXTRACTOR_MODEL,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt},
                ],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(
                "extractor",
                format!("completion failed with HTTP {}: {}", status, body),
            ));
        }

        #[derive(Deserialize)]
        struct Completion {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            #[serde(default)]
            content: String,
        }

        let parsed: Completion = response.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Extract resource URLs from free text.
    ///
    /// Best-effort: if the model returns something that isn't the requested
    /// JSON shape, this logs a warning and returns an empty list rather than
    /// failing the whole pipeline.
    pub async fn extract_urls(&self, text: &str) -> Result<Vec<ExtractedUrl>> {
        let system = r#"You are a URL extractor. Given text, extract all URLs that appear to be:
- Script URLs (.js files)
- API endpoints
- Asset URLs (images, CSS, etc.)
- Any other relevant resource URLs

Return a JSON object with this exact structure:
{
    "urls": [
        {
            "url": "https://example.com/script.js",
            "type": "script",
            "description": "Brief description of what this URL is for"
        }
    ]
}

If no URLs are found, return: {"urls": []}
Only include complete, valid URLs (starting with http:// or https://)."#;

        let content = self
            .complete(
                system,
                &format!("Extract all relevant URLs from this text:\n\n{}", text),
            )
            .await?;

        #[derive(Deserialize)]
        struct Urls {
            #[serde(default)]
            urls: Vec<ExtractedUrl>,
        }

        match serde_json::from_str::<Urls>(strip_code_fences(&content)) {
            Ok(parsed) => Ok(parsed.urls),
            Err(e) => {
                tracing::warn!("Extractor returned malformed URL JSON: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Extract structured integration records from a Q&A answer.
    /// Same best-effort contract as [`extract_urls`](Self::extract_urls).
    pub async fn extract_integrations(&self, text: &str) -> Result<Vec<DiscoveredIntegration>> {
        let system = r#"You are an integration parser. Given text describing API integrations, extract them into structured JSON.

Return a JSON object with this exact structure:
{
    "integrations": [
        {
            "name": "stripe",
            "description": "Payment processing for subscriptions",
            "urls": ["https://js.stripe.com/v3/", "https://api.stripe.com"]
        }
    ]
}

Rules:
- Use lowercase names (e.g., "stripe" not "Stripe")
- Include all relevant URLs (API endpoints, JS files, etc.)
- If no URLs are mentioned, use an empty array []
- If no integrations found, return: {"integrations": []}"#;

        let content = self
            .complete(
                system,
                &format!("Extract integrations from this text:\n\n{}", text),
            )
            .await?;

        #[derive(Deserialize)]
        struct Integrations {
            #[serde(default)]
            integrations: Vec<DiscoveredIntegration>,
        }

        match serde_json::from_str::<Integrations>(strip_code_fences(&content)) {
            Ok(parsed) => Ok(parsed.integrations),
            Err(e) => {
                tracing::warn!("Extractor returned malformed integration JSON: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

/// Models often wrap JSON answers in Markdown code fences; unwrap them
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
