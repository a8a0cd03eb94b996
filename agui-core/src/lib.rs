//! # agui-core
//!
//! Shared machinery for the AG-UI agent↔UI event protocol: the closed
//! event union, SSE framing, state-delta application, and the data types
//! both halves of the protocol exchange.
//!
//! The producer half lives in `agui-server`, the consumer half in
//! `agui-client`; both build on this crate so the wire contract is defined
//! exactly once.
//!
//! ## Decoding events
//!
//! ```
//! use agui_core::Event;
//!
//! let event = Event::decode(br#"{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}"#).unwrap();
//! assert_eq!(event.event_type(), "RUN_STARTED");
//!
//! // Unknown types are preserved, never fatal.
//! let event = Event::decode(br#"{"type":"SOMETHING_NEW","x":1}"#).unwrap();
//! assert_eq!(event.event_type(), "SOMETHING_NEW");
//! ```

pub mod error;
pub mod event;
pub mod patch;
pub mod sse;
pub mod types;

pub use error::{ProtocolError, Result};
pub use event::{now_ms, Event};
pub use patch::{apply_patch, merge_at_path, merge_object, PatchOp};
pub use sse::{encode_frame, escape_data, FrameParser, SseFrame};
pub use types::{FunctionCall, Message, Role, RunInput, ToolCall, ToolDescriptor};
