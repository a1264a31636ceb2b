//! Answer streaming: turns provider text deltas into the cumulative
//! frames the wire protocol promises clients.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// One frame of the answer stream.
///
/// `Chunk` carries the full answer so far, not a delta; clients replace
/// their assistant message with `text` wholesale. The final chunk of a
/// successful stream has `done: true` and is sent exactly once. `Error`
/// ends the stream without a done marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Chunk { text: String, done: bool },
    Error { error: String },
}

pub struct AnswerStreamer {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl AnswerStreamer {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    /// Wall-clock budget for one request, shared by retrieval and
    /// generation.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }

    /// Start a completion for the conversation and re-emit its deltas as
    /// cumulative frames. Errors raised before the first upstream byte
    /// propagate as `Err`; anything later arrives in-band as an `Error`
    /// frame.
    pub async fn stream_answer(
        &self,
        system: ChatMessage,
        history: Vec<ChatMessage>,
    ) -> Result<mpsc::Receiver<StreamFrame>, ApiError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(system);
        messages.extend(history);

        let mut request = ChatRequest::new(messages);
        request.temperature = Some(self.settings.temperature);
        request.max_tokens = Some(self.settings.max_tokens);
        request.presence_penalty = self.settings.presence_penalty;
        request.frequency_penalty = self.settings.frequency_penalty;

        let mut upstream = self
            .provider
            .stream_chat(request, &self.settings.chat_model)
            .await?;

        let deadline = Instant::now() + self.deadline();
        let (tx, rx) = mpsc::channel::<StreamFrame>(32);

        tokio::spawn(async move {
            let mut accumulated = String::new();

            loop {
                let next = match tokio::time::timeout_at(deadline, upstream.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::error!("Answer generation timed out");
                        let _ = tx
                            .send(StreamFrame::Error {
                                error: "Answer generation timed out".to_string(),
                            })
                            .await;
                        return;
                    }
                };

                match next {
                    Some(Ok(delta)) => {
                        if delta.is_empty() {
                            continue;
                        }
                        accumulated.push_str(&delta);
                        let frame = StreamFrame::Chunk {
                            text: accumulated.clone(),
                            done: false,
                        };
                        if tx.send(frame).await.is_err() {
                            // client went away
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        tracing::error!("Completion stream failed: {}", err);
                        let message = match err {
                            ApiError::RateLimited { .. } => {
                                "Rate limit exceeded. Please try again later."
                            }
                            _ => "Answer generation failed",
                        };
                        let _ = tx
                            .send(StreamFrame::Error {
                                error: message.to_string(),
                            })
                            .await;
                        return;
                    }
                    None => break,
                }
            }

            let _ = tx
                .send(StreamFrame::Chunk {
                    text: accumulated,
                    done: true,
                })
                .await;
        });

        Ok(rx)
    }
}
