//! Wire framing: version 0 end-tag scanning and the version 1 codec seam.

use crate::constants::{EVENT_END_TAG, MAX_FRAME};

/// TAK protocol payload version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TakProto {
    /// Plain-text XML, self-delimited by `</event>`.
    #[default]
    V0,
    /// Length/marker-delimited binary payloads, encoded by an external
    /// [`BinaryCodec`].
    V1,
}

impl TakProto {
    pub fn from_version(version: u8) -> Self {
        if version > 0 { TakProto::V1 } else { TakProto::V0 }
    }
}

/// Version 1 sub-framing. Multicast destinations use the mesh variant,
/// unicast streams the stream variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoVariant {
    Mesh,
    Stream,
}

impl ProtoVariant {
    pub fn for_destination(multicast: bool) -> Self {
        if multicast { ProtoVariant::Mesh } else { ProtoVariant::Stream }
    }
}

/// External codec for the version 1 binary protocol.
///
/// The pipeline only decides *which* framing is active; the byte-level
/// codec is supplied by the application. Without one, transmission falls
/// back to version 0.
pub trait BinaryCodec: Send + Sync {
    /// Converts version 0 XML bytes into a version 1 payload.
    fn encode(&self, xml: &[u8], variant: ProtoVariant) -> Result<Vec<u8>, FrameError>;

    /// Attempts to decode a version 1 payload back to XML bytes.
    /// Returns `None` when the data is not a version 1 frame.
    fn decode(&self, data: &[u8]) -> Option<Vec<u8>>;
}

/// Framing errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Scanned past the window without finding `</event>`. Non-fatal:
    /// the partial data has been discarded and scanning continues.
    #[error("frame too long: no terminator within {scanned} bytes")]
    TooLong { scanned: usize },

    #[error("codec error: {0}")]
    Codec(String),
}

/// Incremental scanner that splits a byte stream into version 0 frames.
///
/// Feed raw reads with [`extend`](Self::extend) and drain complete events
/// with [`next_frame`](Self::next_frame).
#[derive(Debug)]
pub struct FrameScanner {
    buf: Vec<u8>,
    max: usize,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new(MAX_FRAME)
    }
}

impl FrameScanner {
    pub fn new(max: usize) -> Self {
        Self {
            buf: Vec::new(),
            max,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns the next complete frame, `Ok(None)` if more data is
    /// needed, or [`FrameError::TooLong`] after discarding an oversized
    /// partial frame.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if let Some(pos) = find(&self.buf, EVENT_END_TAG) {
            let end = pos + EVENT_END_TAG.len();
            let frame = self.buf.drain(..end).collect();
            return Ok(Some(frame));
        }
        if self.buf.len() > self.max {
            let scanned = self.buf.len();
            self.buf.clear();
            return Err(FrameError::TooLong { scanned });
        }
        Ok(None)
    }

    /// Bytes currently buffered without a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
