//! HTTP Gateway Backend
//!
//! Backend for the generation gateway's HTTP contract.
//!
//! # Gateway API
//!
//! - `POST /llm/generate` - Blocking completion: `{content, success, error?}`
//! - `POST /llm/stream` - Event stream of `data: {content?, error?, done}`
//!
//! Both take `{model, temperature, maxTokens, systemPrompt,
//! conversationHistory}`. When the stream endpoint answers 404 the backend
//! falls back to the blocking endpoint and replays the result one character
//! at a time, so callers see the same event sequence either way.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::GenerationError;
use super::providers::ProviderRegistry;
use super::traits::{HistoryEntry, LlmBackend, LlmRequest, LlmResponse, StreamingToken};
use crate::streaming::split_units;

/// Default gateway location
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Channel capacity for streamed tokens
const STREAM_BUFFER: usize = 100;

/// Where and how to reach the gateway
#[derive(Clone, Debug, PartialEq)]
pub struct BackendSettings {
    /// Base URL (without the `/llm/...` path)
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Model-id → provider table
    pub providers: ProviderRegistry,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            providers: ProviderRegistry::default(),
        }
    }
}

/// Request body shared by both endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    system_prompt: &'a str,
    conversation_history: &'a [HistoryEntry],
}

/// Blocking endpoint response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireResponse {
    content: Option<String>,
    success: Option<bool>,
    error: Option<String>,
}

/// One event-stream frame
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct StreamFrame {
    content: Option<String>,
    error: Option<String>,
    done: Option<bool>,
}

impl StreamFrame {
    /// End-of-stream marker; a missing or null `done` is not the end
    fn is_done(&self) -> bool {
        self.done == Some(true)
    }
}

/// A request resolved against the provider registry
#[derive(Debug)]
struct PreparedRequest {
    base_url: String,
    model: String,
    credential: Option<String>,
    request: LlmRequest,
}

/// HTTP gateway client
#[derive(Clone)]
pub struct HttpBackend {
    /// Default base URL
    base_url: String,
    /// Provider table
    providers: ProviderRegistry,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new backend for a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_settings(&BackendSettings {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    /// Create from [`BackendSettings`]
    #[must_use]
    pub fn from_settings(settings: &BackendSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            base_url: settings.base_url.clone(),
            providers: settings.providers.clone(),
            http_client,
        }
    }

    /// Replace the provider table
    #[must_use]
    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Get the default base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an endpoint URL
    fn endpoint(base_url: &str, path: &str) -> String {
        format!("{}/llm/{path}", base_url.trim_end_matches('/'))
    }

    /// Resolve the model and pick the endpoint
    fn prepare(&self, request: &LlmRequest) -> Result<PreparedRequest, GenerationError> {
        let resolved = self.providers.resolve(&request.model)?;
        tracing::debug!(
            provider = %resolved.provider,
            model = %resolved.model,
            "Resolved model"
        );

        Ok(PreparedRequest {
            base_url: resolved.base_url.unwrap_or_else(|| self.base_url.clone()),
            model: resolved.model,
            credential: resolved.credential,
            request: request.clone(),
        })
    }

    /// Build a POST to one of the endpoints
    fn post(&self, prepared: &PreparedRequest, path: &str) -> reqwest::RequestBuilder {
        let body = WireRequest {
            model: &prepared.model,
            temperature: prepared.request.temperature,
            max_tokens: prepared.request.max_tokens,
            system_prompt: &prepared.request.system_prompt,
            conversation_history: &prepared.request.history,
        };

        let builder = self
            .http_client
            .post(Self::endpoint(&prepared.base_url, path))
            .json(&body);

        match prepared.credential {
            Some(ref credential) => builder.bearer_auth(credential),
            None => builder,
        }
    }

    /// Blocking call for an already prepared request
    async fn generate_prepared(&self, prepared: &PreparedRequest) -> LlmResponse {
        match self.call_generate(prepared).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Generation request failed");
                LlmResponse::failure(&e)
            }
        }
    }

    async fn call_generate(&self, prepared: &PreparedRequest) -> Result<LlmResponse, GenerationError> {
        let response = self.post(prepared, "generate").send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Transport(format!(
                "Backend returned {status}: {body}"
            )));
        }

        let data: WireResponse = response.json().await.map_err(|e| {
            GenerationError::Transport(format!("Malformed backend response: {e}"))
        })?;

        let success = data
            .success
            .unwrap_or(data.error.is_none() && data.content.is_some());

        if success {
            Ok(LlmResponse::success(data.content.unwrap_or_default()))
        } else {
            // Backend-reported failures are passed through verbatim; they
            // carry the remediation text (e.g. which key is missing).
            Ok(LlmResponse {
                content: String::new(),
                success: false,
                error: Some(
                    data.error
                        .unwrap_or_else(|| "Backend reported a failed generation".to_string()),
                ),
                duration_ms: None,
            })
        }
    }

    /// Stream a prepared request into `tx`, ending with exactly one terminal
    async fn run_stream(self, prepared: PreparedRequest, tx: mpsc::Sender<StreamingToken>) {
        let response = match self.post(&prepared, "stream").send().await {
            Ok(response) => response,
            Err(e) => {
                let _ = tx
                    .send(StreamingToken::Error(GenerationError::from(e).to_string()))
                    .await;
                return;
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(model = %prepared.model, "Stream endpoint unavailable, replaying blocking result");
            self.replay_blocking(&prepared, &tx).await;
            return;
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::Transport(format!("Backend returned {status}: {body}"));
            let _ = tx.send(StreamingToken::Error(error.to_string())).await;
            return;
        }

        let mut stream = response.bytes_stream();
        let mut decoder = EventStreamDecoder::default();
        let mut full_response = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for frame in decoder.push(&bytes) {
                        if apply_frame(frame, &mut full_response, &tx).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let error = GenerationError::from(e);
                    let _ = tx.send(StreamingToken::Error(error.to_string())).await;
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            if apply_frame(frame, &mut full_response, &tx).await {
                return;
            }
        }

        // Stream closed without a done frame
        let _ = tx
            .send(StreamingToken::Complete {
                message: full_response,
            })
            .await;
    }

    /// Blocking call whose result is emitted as a unit-by-unit stream
    async fn replay_blocking(&self, prepared: &PreparedRequest, tx: &mpsc::Sender<StreamingToken>) {
        let response = self.generate_prepared(prepared).await;

        if !response.success {
            let error = response
                .error
                .unwrap_or_else(|| "Generation failed".to_string());
            let _ = tx.send(StreamingToken::Error(error)).await;
            return;
        }

        for unit in split_units(&response.content) {
            if tx.send(StreamingToken::Token(unit)).await.is_err() {
                return;
            }
        }

        let _ = tx
            .send(StreamingToken::Complete {
                message: response.content,
            })
            .await;
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Forward one frame; returns true once the stream has terminated
async fn apply_frame(
    mut frame: StreamFrame,
    full_response: &mut String,
    tx: &mpsc::Sender<StreamingToken>,
) -> bool {
    if let Some(content) = frame.content.take().filter(|c| !c.is_empty()) {
        full_response.push_str(&content);
        if tx.send(StreamingToken::Token(content)).await.is_err() {
            // Receiver dropped, stop streaming
            return true;
        }
    }

    if let Some(error) = frame.error.take() {
        let _ = tx.send(StreamingToken::Error(error)).await;
        return true;
    }

    if frame.is_done() {
        let _ = tx
            .send(StreamingToken::Complete {
                message: std::mem::take(full_response),
            })
            .await;
        return true;
    }

    false
}

/// Incremental `data:` line decoder
///
/// Bytes are buffered until a newline so multi-byte characters split across
/// network chunks decode correctly.
#[derive(Debug, Default)]
struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    /// Feed bytes, returning every complete frame
    fn push(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = parse_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Parse whatever remains after the stream closed
    fn finish(&mut self) -> Option<StreamFrame> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
    }
}

/// Parse one event-stream line; non-data and malformed lines yield `None`
fn parse_line(line: &str) -> Option<StreamFrame> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(StreamFrame {
            done: Some(true),
            ..Default::default()
        });
    }

    match serde_json::from_str::<StreamFrame>(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!(error = %e, payload, "Skipping malformed stream frame");
            None
        }
    }
}

#[async_trait]
impl LlmBackend for HttpBackend {
    fn name(&self) -> &str {
        "HTTP gateway"
    }

    async fn generate(&self, request: &LlmRequest) -> LlmResponse {
        let start = Instant::now();

        let mut response = match self.prepare(request) {
            Ok(prepared) => self.generate_prepared(&prepared).await,
            Err(e) => LlmResponse::failure(&e),
        };

        response.duration_ms = Some(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX));
        response
    }

    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, GenerationError> {
        let prepared = self.prepare(request)?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        // Network work runs detached; the caller only sees the channel
        tokio::spawn(self.clone().run_stream(prepared, tx));

        Ok(rx)
    }
}
