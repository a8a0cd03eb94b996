//! Server-Sent Events framing.
//!
//! The protocol uses only `event:` (optional) and `data:` lines; a frame
//! ends at a blank line. Parsers must accept and discard the other SSE
//! fields (`id:`, `retry:`, comment lines starting with `:`), buffer
//! `data:` continuations, and only hand the payload out at the blank-line
//! boundary.

/// One SSE frame: an optional event name plus the accumulated data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if one was present.
    pub event: Option<String>,
    /// Joined `data:` payload.
    pub data: String,
}

impl SseFrame {
    /// A `data:`-only frame.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// A frame with an explicit event name.
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// Escape literal newlines so the payload fits on one logical `data:` line.
///
/// serde_json never emits raw control characters inside strings, so this
/// only matters for payloads built by hand.
pub fn escape_data(data: &str) -> String {
    if !data.contains(['\n', '\r']) {
        return data.to_string();
    }
    data.replace('\r', "\\r").replace('\n', "\\n")
}

/// Encode a frame as wire bytes, terminated by the blank line.
pub fn encode_frame(frame: &SseFrame) -> String {
    let data = escape_data(&frame.data);
    match &frame.event {
        Some(event) => format!("event: {}\ndata: {}\n\n", event, data),
        None => format!("data: {}\n\n", data),
    }
}

/// Incremental SSE frame parser.
///
/// Feed arbitrary byte chunks with [`FrameParser::push`]; complete frames
/// come back as soon as their terminating blank line has been seen.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the byte stream, returning any completed frames.
    ///
    /// Invalid UTF-8 is replaced rather than fatal; a malformed line never
    /// poisons the frames that follow it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.finish_frame() {
                    frames.push(frame);
                }
            } else {
                self.consume_line(line);
            }
        }
        frames
    }

    /// Frames with no `data:` lines (comment-only or `id:`-only) are
    /// dispatch noise and are dropped here.
    fn finish_frame(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseFrame { event, data })
    }

    fn consume_line(&mut self, line: &str) {
        // Comment line.
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            // A field name with no colon has an empty value.
            None => (line, ""),
        };

        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id: and retry: are valid SSE but unused by this protocol.
            _ => {}
        }
    }
}
