use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};

use crate::chat::ConversationRequest;
use crate::core::errors::ApiError;
use crate::llm::ChatMessage;
use crate::rag::build_system_message;
use crate::state::AppState;

/// POST /api/chat. Retrieves passages for the latest message, then
/// streams the grounded answer as SSE frames.
///
/// Failures before the stream opens map to plain JSON error responses;
/// once streaming has begun, errors arrive as in-band `error` frames.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConversationRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Some(latest) = payload.messages.last() else {
        return Err(ApiError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    };
    let query = latest.content.clone();
    tracing::info!("Chat query: {}", query);

    let retrieval = tokio::time::timeout(
        state.streamer.deadline(),
        state.retriever.retrieve(&query),
    )
    .await
    .map_err(|_| ApiError::Internal("retrieval timed out".to_string()))??;

    if retrieval.is_empty() {
        return Err(ApiError::RetrievalEmpty);
    }

    let system = build_system_message(retrieval.passages());
    let history: Vec<ChatMessage> = payload
        .messages
        .iter()
        .map(|message| ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        })
        .collect();

    let mut frames = state.streamer.stream_answer(system, history).await?;

    let stream = futures_util::stream::poll_fn(move |cx| frames.poll_recv(cx)).map(|frame| {
        let payload = serde_json::to_string(&frame)
            .unwrap_or_else(|_| r#"{"error":"Internal Server Error"}"#.to_string());
        Ok(Event::default().data(payload))
    });

    Ok(Sse::new(stream))
}
