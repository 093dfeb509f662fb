use crate::config::ApiKey;
use crate::recommend::{RecommendError, RecommendationGenerator};
use crate::util::{retry_with_backoff, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone)]
pub struct GeminiRecommender {
    client: Client,
    api_key: ApiKey,
    endpoint: Url,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiRecommender {
    pub fn with_model(api_key: ApiKey, model: &str) -> Result<Self, RecommendError> {
        let base = Url::parse(DEFAULT_BASE_URL)?;
        Self::with_base_url(api_key, &base, model)
    }

    pub fn with_base_url(
        api_key: ApiKey,
        base: &Url,
        model: &str,
    ) -> Result<Self, RecommendError> {
        let endpoint = base.join(&format!("models/{model}:generateContent"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint,
            retry: RetryConfig::default(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send_once(&self, prompt: &str) -> Result<String, RecommendError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_owned());
            return Err(RecommendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RecommendError::InvalidResponse(format!("failed to parse json: {e}")))?;
        extract_text(parsed)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, RecommendError> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(RecommendError::Blocked(
            block_reason.unwrap_or_else(|| "no candidates".to_owned()),
        ));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = block_reason
            .or(candidate.finish_reason)
            .unwrap_or_else(|| "empty text".to_owned());
        return Err(RecommendError::Blocked(reason));
    }
    Ok(text)
}

impl RecommendationGenerator for GeminiRecommender {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, RecommendError>> {
        async move {
            tracing::info!(
                endpoint = %self.endpoint,
                prompt_chars = prompt.len(),
                "requesting recommendations"
            );
            retry_with_backoff(
                &self.retry,
                "gemini.generate",
                || self.send_once(prompt),
                RecommendError::is_retryable,
            )
            .await
        }
        .boxed()
    }
}
