//! Typed event stream over an SSE connection.
//!
//! Feeds the raw response body through the shared frame parser and yields
//! decoded protocol events. Frames that are not JSON are logged and
//! skipped, never fatal; unknown event types pass through as
//! [`Event::Unknown`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use agui_core::{Event, FrameParser, SseFrame};
use futures::stream::{BoxStream, Stream};
use futures::StreamExt;

use crate::error::ClientError;

/// A stream of decoded protocol events.
pub struct EventStream {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    parser: FrameParser,
    pending: VecDeque<SseFrame>,
    failed: bool,
}

impl EventStream {
    /// Wrap a successful streaming response.
    ///
    /// The transport has already checked status and content type; from
    /// here on, framing and JSON tolerance are this stream's job.
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self {
            body,
            parser: FrameParser::new(),
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Decode the next buffered frame, skipping empty and non-JSON data.
    fn next_pending(&mut self) -> Option<Event> {
        while let Some(frame) = self.pending.pop_front() {
            if frame.data.trim().is_empty() {
                continue;
            }
            match Event::decode(frame.data.as_bytes()) {
                Ok(event) => return Some(event),
                Err(err) => {
                    tracing::warn!(%err, data = %frame.data, "skipping non-JSON frame");
                }
            }
        }
        None
    }
}

impl Stream for EventStream {
    type Item = Result<Event, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        loop {
            if let Some(event) = this.next_pending() {
                return Poll::Ready(Some(Ok(event)));
            }
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let frames = this.parser.push(&chunk);
                    this.pending.extend(frames);
                }
                Poll::Ready(Some(Err(err))) => {
                    // EOF and resets mid-stream surface once; the stream is
                    // done after that.
                    this.failed = true;
                    return Poll::Ready(Some(Err(ClientError::from_reqwest_error(err))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
