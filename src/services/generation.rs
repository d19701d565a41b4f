// SPDX-License-Identifier: MIT

//! Client for the Gemini content-generation API.
//!
//! Handles:
//! - Prompted generation with a configurable model id
//! - Bounded retry with exponential backoff for transient overload
//! - Error classification (overload vs. everything else)

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Generation request parameters.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationInput {
    /// Prompt or topic text.
    pub prompt: String,
    /// Structured feature-specific parameters, passed through verbatim.
    pub params: Option<serde_json::Value>,
    /// BCP-47 output language tag, e.g. "hi" or "en".
    pub output_language: Option<String>,
}

/// Typed response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPayload {
    /// Generated text of the first candidate.
    pub text: String,
    /// Model id that produced it.
    pub model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
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

/// Gemini API client.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl GenerationClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            api_key,
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    /// Client with a custom retry schedule, so tests do not sleep for
    /// the production backoff.
    #[cfg(test)]
    fn with_retry(
        base_url: String,
        api_key: String,
        max_attempts: u32,
        initial_backoff: Duration,
    ) -> Self {
        let mut client = Self::new(base_url, api_key);
        client.max_attempts = max_attempts;
        client.initial_backoff = initial_backoff;
        client
    }

    /// Generate content with the given concrete model id.
    ///
    /// Transient overload (HTTP 429/503) is retried up to 3 attempts with
    /// doubling backoff starting at 1s. Anything else propagates
    /// immediately.
    pub async fn generate(
        &self,
        model_id: &str,
        input: &GenerationInput,
    ) -> Result<GenerationPayload, AppError> {
        let mut prompt = input.prompt.clone();
        if let Some(lang) = &input.output_language {
            prompt = format!("{}\n\nRespond in language: {}", prompt, lang);
        }
        if let Some(params) = &input.params {
            prompt = format!("{}\n\nParameters: {}", prompt, params);
        }

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model_id, self.api_key
        );

        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.try_generate(&url, &body).await {
                Ok(text) => {
                    return Ok(GenerationPayload {
                        text,
                        model: model_id.to_string(),
                    })
                }
                Err(GenerateError::Overloaded(status)) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        status,
                        backoff_secs = backoff.as_secs(),
                        "Generation API overloaded, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(GenerateError::Overloaded(status)) => {
                    return Err(AppError::GenerationApi(format!(
                        "Overloaded after {} attempts (HTTP {})",
                        self.max_attempts, status
                    )));
                }
                Err(GenerateError::Fatal(msg)) => return Err(AppError::GenerationApi(msg)),
            }
        }
    }

    async fn try_generate(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, GenerateError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerateError::Fatal(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 503 {
            return Err(GenerateError::Overloaded(status.as_u16()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerateError::Fatal(format!("HTTP {}: {}", status, text)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Fatal(format!("JSON parse error: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GenerateError::Fatal("Empty generation response".to_string()))?;

        Ok(text)
    }
}

enum GenerateError {
    /// 429/503: safe to retry with backoff.
    Overloaded(u16),
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State, http::StatusCode, response::IntoResponse, Json, Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Per-call response plan: the status for each call in order, then
    /// success with a canned candidate once the plan is exhausted.
    #[derive(Clone)]
    struct MockPlan {
        statuses: Arc<Vec<u16>>,
        calls: Arc<AtomicUsize>,
    }

    async fn mock_generate(State(plan): State<MockPlan>) -> axum::response::Response {
        let call = plan.calls.fetch_add(1, Ordering::SeqCst);
        match plan.statuses.get(call) {
            Some(&status) => (
                StatusCode::from_u16(status).unwrap(),
                Json(serde_json::json!({"error": "mock failure"})),
            )
                .into_response(),
            None => Json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "generated text"}]}}]
            }))
            .into_response(),
        }
    }

    /// Serve the plan on an ephemeral port; returns the base URL and the
    /// shared call counter.
    async fn spawn_mock(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let plan = MockPlan {
            statuses: Arc::new(statuses),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let calls = plan.calls.clone();
        let app = Router::new().fallback(mock_generate).with_state(plan);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), calls)
    }

    fn fast_client(base_url: String) -> GenerationClient {
        GenerationClient::with_retry(
            base_url,
            "test_key".to_string(),
            3,
            Duration::from_millis(1),
        )
    }

    fn input(prompt: &str) -> GenerationInput {
        GenerationInput {
            prompt: prompt.to_string(),
            params: None,
            output_language: None,
        }
    }

    #[tokio::test]
    async fn test_generate_parses_first_candidate() {
        let (base_url, calls) = spawn_mock(vec![]).await;
        let payload = fast_client(base_url)
            .generate("gemini-2.0-flash", &input("hello"))
            .await
            .unwrap();

        assert_eq!(payload.text, "generated text");
        assert_eq!(payload.model, "gemini-2.0-flash");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overload_retried_until_success() {
        // A 503 then a 429: both transient, third attempt succeeds.
        let (base_url, calls) = spawn_mock(vec![503, 429]).await;
        let payload = fast_client(base_url)
            .generate("gemini-2.0-flash", &input("hello"))
            .await
            .unwrap();

        assert_eq!(payload.text, "generated text");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_overload_gives_up_after_max_attempts() {
        let (base_url, calls) = spawn_mock(vec![503, 503, 503, 503]).await;
        let err = fast_client(base_url)
            .generate("gemini-2.0-flash", &input("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GenerationApi(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        // 400 is not transient: it propagates after a single attempt.
        let (base_url, calls) = spawn_mock(vec![400]).await;
        let err = fast_client(base_url)
            .generate("gemini-2.0-flash", &input("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GenerationApi(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
