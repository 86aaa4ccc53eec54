//! Server-Sent-Events frame parsing.
//!
//! Upstream bodies arrive in arbitrary chunks. Text is accumulated in a
//! [`FrameBuffer`] and complete frames (terminated by a blank line) are split
//! off the front. A frame is either fully parsed and removed, or left intact
//! until the next chunk completes it.

/// Separator between frames.
pub const FRAME_TERMINATOR: &str = "\n\n";

/// Event type used when a frame has no `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Event type of upstream keepalive frames.
pub const PING_EVENT_TYPE: &str = "ping";

/// Largest partial frame kept between chunks before it is discarded.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// One parsed SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event_type: String,
    pub data: String,
}

impl SseFrame {
    /// Keepalive frames carry no payload for the decoder.
    pub fn is_ping(&self) -> bool {
        self.event_type == PING_EVENT_TYPE
    }
}

/// Split every complete frame off `buffer`.
///
/// Returns the parsed frames in order and the unconsumed remainder, which the
/// caller keeps for the next chunk. Frames without `data:` lines (comments,
/// bare pings) are dropped.
pub fn parse_frames(buffer: &str) -> (Vec<SseFrame>, &str) {
    let mut frames = Vec::new();
    let mut rest = buffer;

    while let Some(end) = rest.find(FRAME_TERMINATOR) {
        let raw = &rest[..end];
        rest = &rest[end + FRAME_TERMINATOR.len()..];
        if let Some(frame) = parse_frame(raw) {
            frames.push(frame);
        }
    }

    (frames, rest)
}

/// Parse the lines of a single frame (without its terminator).
fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event_type: Option<&str> = None;
    let mut data: Option<String> = None;

    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        if let Some(value) = field_value(line, "event") {
            event_type = Some(value);
        } else if let Some(value) = field_value(line, "data") {
            match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }

    let data = data?;
    let event_type = event_type
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_EVENT_TYPE)
        .to_string();

    Some(SseFrame { event_type, data })
}

/// Value of a `field: value` line, with one leading space removed.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Accumulates decoded text between chunks.
///
/// A partial frame longer than the pending limit is dropped with a warning,
/// so an upstream that never terminates a frame cannot grow it without bound.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    carry: Vec<u8>,
    max_pending: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING_BYTES)
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: String::new(),
            carry: Vec::new(),
            max_pending,
        }
    }

    /// Append raw body bytes and return every frame they complete.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.decode_utf8(chunk);
        self.drain_frames()
    }

    /// Append already-decoded text and return every frame it completes.
    pub fn push_str(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.pending.push_str(chunk);
        self.drain_frames()
    }

    /// Text received but not yet part of a complete frame.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Discard partial input, e.g. when a new connection starts.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.carry.clear();
    }

    fn drain_frames(&mut self) -> Vec<SseFrame> {
        let (frames, consumed) = {
            let (frames, rest) = parse_frames(&self.pending);
            (frames, self.pending.len() - rest.len())
        };
        self.pending.drain(..consumed);

        if self.pending.len() > self.max_pending {
            tracing::warn!(
                target: "inboxlink.bridge",
                pending_bytes = self.pending.len(),
                limit = self.max_pending,
                "Discarding oversized partial frame"
            );
            self.pending.clear();
        }
        frames
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let mut input: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.pending.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, after) = input.split_at(err.valid_up_to());
                    self.pending.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            input = &after[len..];
                        }
                        None => {
                            self.carry = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}
