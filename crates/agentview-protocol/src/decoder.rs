use agentview_types::StreamFrame;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mapper::map_record;
use crate::schema::WireRecord;

const DATA_PREFIX: &str = "data:";

/// Incremental decoder for the newline-delimited frame protocol.
///
/// Chunks may arrive split at arbitrary byte offsets: mid-line, and even
/// mid-character. The decoder carries unconsumed bytes across `push` calls
/// and only decodes complete lines, so a UTF-8 sequence straddling a chunk
/// boundary is reassembled before it is ever interpreted as text.
///
/// Malformed payloads are logged and skipped; nothing the decoder sees can
/// abort the stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the next chunk and drain every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(frame) = decode_line(&line[..pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush at end of stream: a trailing line without a final newline is
    /// still a complete frame once no more bytes can arrive.
    pub fn finish(self) -> Option<StreamFrame> {
        decode_line(&self.pending)
    }
}

/// Decode an entire buffer at once. Test and batch convenience.
pub fn decode_all(bytes: &[u8]) -> Vec<StreamFrame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push(bytes);
    frames.extend(decoder.finish());
    frames
}

fn decode_line(raw: &[u8]) -> Option<StreamFrame> {
    let raw = strip_carriage_return(raw);

    match parse_line(raw) {
        Ok(frame) => frame,
        Err(Error::Unrecognized(reason)) => {
            debug!(%reason, "skipping unrecognized frame");
            None
        }
        Err(err) => {
            warn!(%err, "skipping malformed frame line");
            None
        }
    }
}

fn parse_line(raw: &[u8]) -> Result<Option<StreamFrame>> {
    let line = std::str::from_utf8(raw)?.trim();

    // Blank lines and non-data lines (comments, other SSE fields) are
    // not frames and not errors.
    if line.is_empty() {
        return Ok(None);
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        debug!(line, "ignoring non-data line");
        return Ok(None);
    };

    let record: WireRecord = serde_json::from_str(payload.trim_start())?;
    map_record(record).map(Some)
}

fn strip_carriage_return(raw: &[u8]) -> &[u8] {
    match raw.split_last() {
        Some((b'\r', rest)) => rest,
        _ => raw,
    }
}
