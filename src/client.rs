//! Terminal client for the chat endpoint: posts the conversation and
//! folds the SSE answer stream back into it.

use futures_util::StreamExt;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::chat::{ConversationRequest, Message, StreamFrame};

/// What the user sees when an exchange fails. Rate limits surface the
/// server's own message; everything else collapses to a generic one
/// with the detail kept for diagnostics.
#[derive(Debug, Error)]
pub enum ChatFailure {
    #[error("{0}")]
    RateLimited(String),

    #[error("An unexpected error occurred. Please try again later.")]
    Failed(String),
}

/// Incremental SSE frame decoder.
///
/// Transport chunks split anywhere, including inside a JSON payload or
/// a multi-byte character, so bytes are buffered until a newline
/// completes the line.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            match serde_json::from_str::<StreamFrame>(payload) {
                Ok(frame) => frames.push(frame),
                Err(err) => {
                    tracing::warn!("Skipping malformed stream frame: {}", err);
                }
            }
        }

        frames
    }
}

/// The conversation as the client renders it.
#[derive(Debug, Default)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: &str) -> String {
        let message = Message::user(content.to_string());
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn begin_assistant(&mut self) -> String {
        let message = Message::assistant();
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Replace the message's content wholesale; stream frames carry the
    /// full answer so far, not deltas.
    pub fn set_content(&mut self, id: &str, content: String) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.content = content;
        }
    }

    pub fn content_of(&self, id: &str) -> String {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Send the conversation and stream the assistant's answer into it.
    ///
    /// The request snapshot is taken before the assistant placeholder is
    /// added, so the server never sees the empty turn. On failure any
    /// partial answer stays in the conversation.
    pub async fn send(&self, conversation: &mut Conversation) -> Result<String, ChatFailure> {
        let request = ConversationRequest {
            messages: conversation.messages.clone(),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatFailure::Failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.as_str())
                        .map(|s| s.to_string())
                })
                .unwrap_or(body);
            if status == StatusCode::TOO_MANY_REQUESTS && !detail.is_empty() {
                return Err(ChatFailure::RateLimited(detail));
            }
            return Err(ChatFailure::Failed(detail));
        }

        let assistant_id = conversation.begin_assistant();
        let mut decoder = FrameDecoder::new();
        let mut stream = response.bytes_stream();
        let mut finished = false;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ChatFailure::Failed(format!("stream failed: {}", e)))?;
            for frame in decoder.push(&chunk) {
                match frame {
                    StreamFrame::Chunk { text, done } => {
                        if !finished {
                            conversation.set_content(&assistant_id, text);
                        }
                        if done {
                            finished = true;
                        }
                    }
                    StreamFrame::Error { error } => {
                        return Err(ChatFailure::Failed(error));
                    }
                }
            }
            if finished {
                break;
            }
        }

        if !finished {
            return Err(ChatFailure::Failed(
                "stream ended before completion".to_string(),
            ));
        }

        Ok(conversation.content_of(&assistant_id))
    }
}
