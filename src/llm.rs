//! Completion client abstraction
//!
//! The interview core only depends on "chat messages in, text out". The
//! production implementation speaks the `OpenAI`-compatible wire format.

mod config;
mod error;
mod openai;
mod sse;
mod types;

#[cfg(test)]
mod proptests;

pub use config::LlmConfig;
pub use error::{FailureClass, LlmError, LlmErrorKind};
pub use openai::OpenAiCompatService;
pub use types::*;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Lazily produced text fragments of a streamed completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Common interface for completion providers
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Make a single, non-streamed completion request
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Start a streamed completion; fragments arrive through the returned stream
    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        (**self).stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for completion clients
pub struct LoggingService {
    inner: Arc<dyn CompletionClient>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl CompletionClient for LoggingService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let start = Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Completion failed"
                );
            }
        }

        result
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream(request).await;

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    first_byte_ms = %start.elapsed().as_millis(),
                    messages = request.messages.len(),
                    "Completion stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Completion stream failed to open"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
