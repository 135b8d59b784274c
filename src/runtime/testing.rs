//! Mock implementations for testing
//!
//! These mocks enable runtime and API tests without real I/O.

use crate::llm::{
    CompletionClient, CompletionRequest, CompletionResponse, LlmError, TextStream, Usage,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted answer of the mock
#[derive(Debug)]
enum Scripted {
    /// Fragments, optionally followed by a mid-stream error
    Stream(Vec<String>, Option<LlmError>),
    Response(String),
    Error(LlmError),
}

/// Mock completion client that answers from a queue.
///
/// Streamed and non-streamed calls share one queue; a scripted stream
/// answers `complete` with its joined text and a scripted response answers
/// `stream` as a single fragment.
pub struct MockCompletionClient {
    script: Mutex<VecDeque<Scripted>>,
    delay: Option<Duration>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay every call before it answers
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a streamed reply
    pub fn queue_stream<I, S>(&self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.push(Scripted::Stream(fragments, None));
    }

    /// Queue a stream that fails after yielding some fragments
    pub fn queue_stream_then_error<I, S>(&self, fragments: I, error: LlmError)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.push(Scripted::Stream(fragments, Some(error)));
    }

    /// Queue a successful non-streamed response
    pub fn queue_response(&self, content: impl Into<String>) {
        self.push(Scripted::Response(content.into()));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.push(Scripted::Error(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, scripted: Scripted) {
        self.script.lock().unwrap().push_back(scripted);
    }

    async fn next(&self, request: &CompletionRequest) -> Scripted {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Error(LlmError::network("No mock response queued")))
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = match self.next(request).await {
            Scripted::Response(content) => content,
            Scripted::Stream(fragments, None) => fragments.concat(),
            Scripted::Stream(_, Some(error)) | Scripted::Error(error) => return Err(error),
        };
        Ok(CompletionResponse {
            content,
            usage: Usage::default(),
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let (fragments, tail) = match self.next(request).await {
            Scripted::Stream(fragments, tail) => (fragments, tail),
            Scripted::Response(content) => (vec![content], None),
            Scripted::Error(error) => return Err(error),
        };
        let items = fragments
            .into_iter()
            .map(Ok)
            .chain(tail.map(Err))
            .collect::<Vec<_>>();
        Ok(futures::stream::iter(items).boxed())
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}
