//! Wire frame delimiting for the JSON hub protocol.
//!
//! Wire format:
//! ```text
//! [JSON document:N][0x1E]  [JSON document:M][0x1E]  ...
//! ```
//! Every message is one JSON document terminated by a single record
//! separator byte. This module finds those boundaries in a byte stream. A
//! payload is never handed upstream before its terminating separator has
//! been observed, and no bytes are consumed from input that cannot be fully
//! delimited, so callers may retry with a grown buffer at any time.

use thiserror::Error;

/// Record separator terminating every frame (ASCII RS).
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Errors that can occur while delimiting frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// No record separator observed yet; buffer more bytes and retry.
    #[error("incomplete frame: no record separator in {available} buffered bytes")]
    Incomplete { available: usize },
}

/// Scans `input` for the next complete frame.
///
/// On success returns the payload (exclusive of the separator) and the total
/// number of bytes consumed, separator included. When no separator is
/// present nothing is consumed and [`FrameError::Incomplete`] tells the
/// caller to buffer more bytes.
pub fn split_frame(input: &[u8]) -> Result<(&[u8], usize), FrameError> {
    match input.iter().position(|&b| b == RECORD_SEPARATOR) {
        Some(pos) => Ok((&input[..pos], pos + 1)),
        None => Err(FrameError::Incomplete {
            available: input.len(),
        }),
    }
}

/// Appends `payload` followed by the terminating separator to `out`.
pub fn write_frame(out: &mut Vec<u8>, payload: &[u8]) {
    out.reserve(payload.len() + 1);
    out.extend_from_slice(payload);
    out.push(RECORD_SEPARATOR);
}

/// Accumulation buffer for transport read loops.
///
/// Bytes arrive from the transport in arbitrary chunks. [`FrameBuffer::push`]
/// appends them; [`FrameBuffer::next_frame`] drains one complete payload at a
/// time, leaving any trailing partial frame buffered for the next read.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends freshly received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete frame payload, if one is
    /// buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        match split_frame(&self.buf) {
            Ok((payload, consumed)) => {
                let frame = payload.to_vec();
                self.buf.drain(..consumed);
                Some(frame)
            }
            Err(FrameError::Incomplete { .. }) => None,
        }
    }

    /// Number of buffered bytes not yet delimited into a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discards all buffered bytes. Used when a connection is torn down so a
    /// partial frame from the old transport never leaks into the next one.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects every complete frame currently extractable from `buf`.
    fn drain_all(buf: &mut FrameBuffer) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Some(frame) = buf.next_frame() {
            frames.push(frame);
        }
        frames
    }

    // ── split_frame ───────────────────────────────────────────────────────────

    #[test]
    fn test_split_frame_returns_payload_and_consumed() {
        let input = b"{\"type\":6}\x1e";

        let (payload, consumed) = split_frame(input).unwrap();

        assert_eq!(payload, b"{\"type\":6}");
        assert_eq!(consumed, input.len(), "separator must be consumed too");
    }

    #[test]
    fn test_split_frame_without_separator_is_incomplete() {
        let result = split_frame(b"{\"type\":6}");

        assert_eq!(result, Err(FrameError::Incomplete { available: 10 }));
    }

    #[test]
    fn test_split_frame_empty_input_is_incomplete() {
        assert_eq!(split_frame(b""), Err(FrameError::Incomplete { available: 0 }));
    }

    #[test]
    fn test_split_frame_empty_payload() {
        // A lone separator delimits a zero-length payload.
        let (payload, consumed) = split_frame(b"\x1e").unwrap();

        assert!(payload.is_empty());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_split_frame_stops_at_first_separator() {
        let input = b"first\x1esecond\x1e";

        let (payload, consumed) = split_frame(input).unwrap();

        assert_eq!(payload, b"first");
        assert_eq!(consumed, 6);
        // The remainder still delimits cleanly.
        let (next, _) = split_frame(&input[consumed..]).unwrap();
        assert_eq!(next, b"second");
    }

    // ── write_frame ───────────────────────────────────────────────────────────

    #[test]
    fn test_write_frame_appends_separator() {
        let mut out = Vec::new();

        write_frame(&mut out, b"{\"type\":6}");

        assert_eq!(out, b"{\"type\":6}\x1e");
    }

    #[test]
    fn test_write_then_split_round_trip() {
        let mut out = Vec::new();
        write_frame(&mut out, b"{\"protocol\":\"json\",\"version\":1}");

        let (payload, consumed) = split_frame(&out).unwrap();

        assert_eq!(payload, b"{\"protocol\":\"json\",\"version\":1}");
        assert_eq!(consumed, out.len());
    }

    // ── FrameBuffer ───────────────────────────────────────────────────────────

    #[test]
    fn test_frame_buffer_holds_partial_frame() {
        let mut buf = FrameBuffer::new();

        buf.push(b"{\"type\"");
        assert_eq!(buf.next_frame(), None, "partial frame must not surface");

        buf.push(b":6}\x1e");
        assert_eq!(buf.next_frame(), Some(b"{\"type\":6}".to_vec()));
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_frame_buffer_multiple_frames_in_one_push() {
        let mut buf = FrameBuffer::new();

        buf.push(b"one\x1etwo\x1ethree\x1e");

        assert_eq!(
            drain_all(&mut buf),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[test]
    fn test_frame_buffer_split_points_do_not_change_frames() {
        // Feeding the same stream split at every possible byte boundary must
        // yield the same frame sequence as feeding it whole.
        let stream = b"{\"a\":1}\x1e{\"b\":[2,3]}\x1e{\"c\":\"x\"}\x1e";

        let mut whole = FrameBuffer::new();
        whole.push(stream);
        let expected = drain_all(&mut whole);

        for split_at in 0..=stream.len() {
            let mut buf = FrameBuffer::new();
            buf.push(&stream[..split_at]);
            let mut frames = drain_all(&mut buf);
            buf.push(&stream[split_at..]);
            frames.extend(drain_all(&mut buf));

            assert_eq!(frames, expected, "split at byte {split_at} diverged");
        }
    }

    #[test]
    fn test_frame_buffer_byte_at_a_time() {
        let stream = b"alpha\x1ebeta\x1e";
        let mut buf = FrameBuffer::new();
        let mut frames = Vec::new();

        for &byte in stream.iter() {
            buf.push(&[byte]);
            frames.extend(drain_all(&mut buf));
        }

        assert_eq!(frames, vec![b"alpha".to_vec(), b"beta".to_vec()]);
    }

    #[test]
    fn test_frame_buffer_clear_discards_partial() {
        let mut buf = FrameBuffer::new();
        buf.push(b"torn-frame-without-separator");

        buf.clear();
        buf.push(b"fresh\x1e");

        assert_eq!(buf.next_frame(), Some(b"fresh".to_vec()));
    }
}
