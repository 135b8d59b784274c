//! `OpenAI`-compatible chat-completions provider
//!
//! Works against any endpoint speaking the `chat/completions` wire format,
//! including Gemini's `OpenAI` compatibility layer.

use super::sse::{parse_delta, SseDecoder, SseFrame};
use super::types::{ChatMessage, CompletionRequest, CompletionResponse, Usage};
use super::{CompletionClient, LlmConfig, LlmError, TextStream};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `OpenAI`-compatible service implementation
pub struct OpenAiCompatService {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl OpenAiCompatService {
    /// Build the service. The credential is resolved here, once.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::auth("No API key configured"))?;

        // The overall bound is enforced per call by the runtime so that it
        // also covers streamed bodies.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url: config.completions_url(),
            model: config.model.clone(),
        })
    }

    fn translate_request(&self, request: &CompletionRequest, stream: bool) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = self.translate_request(request, stream);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }

    fn normalize_response(resp: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::malformed("No choices in response"))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| LlmError::malformed("Response message has no content"))?;

        let usage = resp.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u64::from(u.prompt_tokens),
            output_tokens: u64::from(u.completion_tokens),
        });

        Ok(CompletionResponse { content, usage })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self.send(request, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        let parsed: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::malformed(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(parsed)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let response = self.send(request, true).await?;
        Ok(fragment_stream(response.bytes_stream()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Turn a raw SSE byte stream into a stream of text fragments.
///
/// Ends at `[DONE]` or when the body ends; the first error terminates it.
pub(crate) fn fragment_stream<S, B, E>(bytes: S) -> TextStream
where
    S: futures::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    struct Decoding<S> {
        bytes: Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<SseFrame>,
        finished: bool,
    }

    let state = Decoding {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(frame) = st.pending.pop_front() {
                match frame {
                    SseFrame::Done => return None,
                    SseFrame::Data(payload) => match parse_delta(&payload) {
                        Ok(Some(text)) => return Some((Ok(text), st)),
                        Ok(None) => continue,
                        Err(e) => {
                            st.finished = true;
                            return Some((Err(e), st));
                        }
                    },
                }
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = st.decoder.push(chunk.as_ref());
                    st.pending.extend(frames);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => match st.decoder.finish() {
                    Some(frame) => st.pending.push_back(frame),
                    None => return None,
                },
            }
        }
    });

    Box::pin(stream)
}

fn error_from_body(status: u16, body: &str) -> LlmError {
    // Some providers wrap the error object in a one-element array
    let message = serde_json::from_str::<OpenAIErrorResponse>(body)
        .map(|r| r.error.message)
        .or_else(|_| {
            serde_json::from_str::<Vec<OpenAIErrorResponse>>(body)
                .map_err(|_| ())
                .and_then(|v| v.into_iter().next().map(|r| r.error.message).ok_or(()))
        })
        .unwrap_or_else(|()| body.to_string());
    LlmError::from_status(status, &message)
}

// OpenAI API types

#[derive(Debug, Serialize)]
pub(crate) struct OpenAIRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
    pub(crate) stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OpenAIMessage {
    pub(crate) role: String,
    #[serde(default)]
    pub(crate) content: Option<String>,
}

impl From<&ChatMessage> for OpenAIMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
