//! Producer recipes: the fixed event sequence behind each endpoint.
//!
//! Every streaming handler follows the same shape: spawn one producer task
//! driving a [`RunEmitter`](crate::emitter::RunEmitter) into a channel, and
//! return the receiving side as the SSE response. A dropped response stream
//! closes the channel, which the emitter observes as client disconnect.

pub mod chat;
pub mod generative_ui;
pub mod haiku;
pub mod human_loop;
pub mod predictive;
pub mod shared;
pub mod tools;

use std::convert::Infallible;

use agui_core::{encode_frame, SseFrame};
use axum::body::Body;
use axum::http::header;
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Channel depth between a producer task and its SSE response.
pub(crate) const RESPONSE_BUFFER: usize = 100;

/// Wrap a frame channel as an SSE response.
///
/// This is the writer side of the wire format: the protocol headers, one
/// encoded frame per body chunk, and a flush per chunk (hyper writes each
/// streamed chunk as it is produced).
pub(crate) fn sse_response(rx: mpsc::Receiver<SseFrame>) -> impl IntoResponse {
    let frames =
        ReceiverStream::new(rx).map(|frame| Ok::<_, Infallible>(encode_frame(&frame)));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
}

/// Pull `threadId`/`runId` out of a run input, generating them if absent.
pub(crate) fn run_identity(thread_id: &str, run_id: &str) -> (String, String) {
    let thread_id = if thread_id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        thread_id.to_string()
    };
    let run_id = if run_id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        run_id.to_string()
    };
    (thread_id, run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_identity_preserves_present_ids() {
        let (thread_id, run_id) = run_identity("t1", "r1");
        assert_eq!(thread_id, "t1");
        assert_eq!(run_id, "r1");
    }

    #[test]
    fn test_run_identity_generates_missing_ids() {
        let (thread_id, run_id) = run_identity("", "");
        assert!(!thread_id.is_empty());
        assert!(!run_id.is_empty());
        assert_ne!(thread_id, run_id);
    }
}
