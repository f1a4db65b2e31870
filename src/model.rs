use crate::types::{DigestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Settings used for per-item digest generation.
    pub fn for_digest() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }

    /// Settings used for the shorter introduction/curation completions.
    pub fn for_email() -> Self {
        Self {
            max_output_tokens: 512,
            ..Self::for_digest()
        }
    }
}

/// Trait for LLM backends that can complete a prompt.
///
/// One call maps to one network request; retries, if any, belong to the
/// orchestrator, never to implementations of this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Name of the backing model/provider, for diagnostics.
    fn model_name(&self) -> String;

    /// Complete `prompt` and return the generated text.
    ///
    /// Errors with `Transport` on network/timeout failure and
    /// `EmptyResponse` when the call succeeds but carries no text.
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Client for the Google Generative Language API (Gemini).
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout_seconds: u64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-news-digest/0.1")
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Point the client at a different endpoint (local test servers).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
                max_output_tokens: params.max_output_tokens,
            },
        };

        debug!("Sending completion request to {}", self.model);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(DigestError::EmptyResponse);
        }

        Ok(text)
    }
}

/// A scripted response for `MockModelClient`.
pub enum MockResponse {
    Text(String),
    Failure(DigestError),
}

/// Deterministic model stub for tests and dry runs.
///
/// Pops scripted responses in order; once the script is exhausted it keeps
/// returning the last text response, or `EmptyResponse` if there is none.
pub struct MockModelClient {
    script: Mutex<Vec<MockResponse>>,
    last_text: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            last_text: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .expect("poisoned script lock")
            .push(MockResponse::Text(text.into()));
        self
    }

    pub fn with_failure(self, error: DigestError) -> Self {
        self.script
            .lock()
            .expect("poisoned script lock")
            .push(MockResponse::Failure(error));
        self
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockModelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    fn model_name(&self) -> String {
        "mock".to_string()
    }

    async fn complete(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().expect("poisoned script lock");
        if script.is_empty() {
            let last = self.last_text.lock().expect("poisoned last lock");
            return match last.as_ref() {
                Some(text) => Ok(text.clone()),
                None => Err(DigestError::EmptyResponse),
            };
        }

        match script.remove(0) {
            MockResponse::Text(text) => {
                *self.last_text.lock().expect("poisoned last lock") = Some(text.clone());
                Ok(text)
            }
            MockResponse::Failure(error) => Err(error),
        }
    }
}
