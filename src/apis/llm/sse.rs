/// Server-sent-event decoding for streamed completions.
///
/// The router node emits frames separated by a blank line, each frame made
/// of `data:` / `event:` / `id:` lines. Chunk boundaries from the HTTP
/// body are arbitrary, so incoming text is buffered and only complete
/// frames are released; the trailing partial frame stays in the buffer for
/// the next chunk. A `data` payload equal to `[DONE]` ends the stream.
use serde_json::Value;

/// Terminal sentinel carried in a frame's data payload
pub const DONE_SENTINEL: &str = "[DONE]";

/// Delimiter between frames
const FRAME_DELIMITER: &str = "\n\n";

/// One parsed SSE frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseEvent {
    pub data: Option<String>,
    pub event: Option<String>,
    pub id: Option<String>,
}

/// Parse a single complete frame. Returns None when the frame carries no
/// recognized field. Repeated fields keep the last occurrence.
pub fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();

    for line in frame.split('\n') {
        if let Some(rest) = line.strip_prefix("data: ") {
            event.data = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("event: ") {
            event.event = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("id: ") {
            event.id = Some(rest.to_string());
        }
    }

    if event.data.is_none() && event.event.is_none() && event.id.is_none() {
        None
    } else {
        Some(event)
    }
}

/// Incremental frame splitter over arbitrarily chunked input
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: String,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of body text, returning every frame completed by it
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..pos];
            if !frame.trim().is_empty() {
                if let Some(event) = parse_frame(frame) {
                    frames.push(event);
                }
            }
        }

        frames
    }
}

/// Extract the streamed text fragment from a decoded data payload.
/// Aliases in priority order: `choices[0].delta.content`, `response`,
/// `text`. Empty fragments count as absent.
fn extract_stream_text(value: &Value) -> Option<&str> {
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            value
                .get("response")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            value
                .get("text")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
}

/// Accumulates the full completion text out of a streamed body
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    decoder: SseFrameDecoder,
    text: String,
    finished: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one body chunk. Returns true once the `[DONE]` sentinel has
    /// been observed; frames after the sentinel are ignored.
    pub fn push_chunk(&mut self, chunk: &str) -> bool {
        if self.finished {
            return true;
        }

        for event in self.decoder.feed(chunk) {
            let data = match event.data {
                Some(data) => data,
                None => continue,
            };

            if data == DONE_SENTINEL {
                self.finished = true;
                return true;
            }

            match serde_json::from_str::<Value>(&data) {
                Ok(payload) => {
                    if let Some(fragment) = extract_stream_text(&payload) {
                        self.text.push_str(fragment);
                    }
                }
                // Non-JSON payloads are literal text chunks
                Err(_) => self.text.push_str(&data),
            }
        }

        false
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"symbol\\\":\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"\\\"PUP\\\"}\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn accumulate(chunks: &[&str]) -> (String, bool) {
        let mut accumulator = StreamAccumulator::new();
        let mut done = false;
        for chunk in chunks {
            if accumulator.push_chunk(chunk) {
                done = true;
                break;
            }
        }
        let finished = accumulator.is_finished();
        (accumulator.into_text(), done && finished)
    }

    #[test]
    fn frame_fields_parse_and_last_occurrence_wins() {
        let event = parse_frame("event: delta\nid: 7\ndata: first\ndata: second").unwrap();
        assert_eq!(event.event.as_deref(), Some("delta"));
        assert_eq!(event.id.as_deref(), Some("7"));
        assert_eq!(event.data.as_deref(), Some("second"));

        assert!(parse_frame(": comment only\nretry: 500").is_none());
    }

    #[test]
    fn partial_frames_are_retained_across_feeds() {
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.feed("data: {\"resp").is_empty());
        assert!(decoder.feed("onse\":\"hi\"}").is_empty());
        let frames = decoder.feed("\n\ndata: tail");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data.as_deref(), Some("{\"response\":\"hi\"}"));
        // "tail" stays buffered until its delimiter arrives
        let frames = decoder.feed("\n\n");
        assert_eq!(frames[0].data.as_deref(), Some("tail"));
    }

    #[test]
    fn arbitrary_chunk_splits_reassemble_identically() {
        let (single, done_single) = accumulate(&[STREAM_BODY]);
        assert!(done_single);
        assert_eq!(single, "{\"symbol\":\"PUP\"}");

        // Split the same body at every offset and require identical output
        for split in 1..STREAM_BODY.len() {
            let (head, tail) = STREAM_BODY.split_at(split);
            let (text, done) = accumulate(&[head, tail]);
            assert!(done, "split at {} missed the sentinel", split);
            assert_eq!(text, single, "split at {} changed the text", split);
        }
    }

    #[test]
    fn done_terminates_exactly_once_and_later_frames_are_ignored() {
        let mut accumulator = StreamAccumulator::new();
        assert!(!accumulator.push_chunk("data: {\"response\":\"before\"}\n\n"));
        assert!(accumulator.push_chunk("data: [DONE]\n\ndata: {\"response\":\"after\"}\n\n"));
        assert!(accumulator.push_chunk("data: {\"response\":\"later\"}\n\n"));
        assert!(accumulator.is_finished());
        assert_eq!(accumulator.into_text(), "before");
    }

    #[test]
    fn non_json_payloads_append_verbatim() {
        let mut accumulator = StreamAccumulator::new();
        accumulator.push_chunk("data: plain text piece\n\n");
        accumulator.push_chunk("data: {\"text\":\" and json\"}\n\n");
        assert_eq!(accumulator.into_text(), "plain text piece and json");
    }

    #[test]
    fn empty_fragments_fall_through_aliases() {
        let mut accumulator = StreamAccumulator::new();
        accumulator
            .push_chunk("data: {\"choices\":[{\"delta\":{\"content\":\"\"}}],\"response\":\"fallback\"}\n\n");
        assert_eq!(accumulator.into_text(), "fallback");
    }
}
