//! Channel pair: the (reader, writer) halves a pipeline owns.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::warn;

use cotwire_protocol::{FrameError, FrameScanner};

/// Largest datagram we accept in one read.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Write half of a channel. Stream writers flush after every frame so an
/// event is never left sitting in a buffer.
pub enum FrameWriter {
    Stream(Box<dyn AsyncWrite + Send + Unpin>),
    /// Connected datagram socket; one send per frame.
    Datagram(Arc<UdpSocket>),
}

impl FrameWriter {
    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            FrameWriter::Stream(w) => {
                w.write_all(data).await?;
                w.flush().await
            }
            FrameWriter::Datagram(sock) => sock.send(data).await.map(|_| ()),
        }
    }

    /// Gracefully shuts down a stream writer. Datagram sockets close on
    /// drop.
    pub async fn shutdown(&mut self) {
        if let FrameWriter::Stream(w) = self {
            let _ = w.shutdown().await;
        }
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameWriter::Stream(_) => f.write_str("FrameWriter::Stream"),
            FrameWriter::Datagram(_) => f.write_str("FrameWriter::Datagram"),
        }
    }
}

/// Read half of a channel, yielding one frame per call.
pub enum FrameReader {
    /// Byte stream scanned for `</event>` boundaries.
    Stream {
        inner: Box<dyn AsyncRead + Send + Unpin>,
        scanner: FrameScanner,
    },
    /// Bound datagram socket; one datagram is one frame.
    Datagram(Arc<UdpSocket>),
}

impl FrameReader {
    pub fn stream(inner: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        FrameReader::Stream {
            inner,
            scanner: FrameScanner::default(),
        }
    }

    /// Reads the next complete frame. Returns `Ok(None)` at end of
    /// stream. Oversized version 0 frames are discarded with a warning
    /// and scanning continues with the following bytes.
    pub async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self {
            FrameReader::Stream { inner, scanner } => {
                let mut chunk = [0u8; 4096];
                loop {
                    match scanner.next_frame() {
                        Ok(Some(frame)) => return Ok(Some(frame)),
                        Ok(None) => {}
                        Err(FrameError::TooLong { scanned }) => {
                            warn!(scanned, "frame too long, discarding partial event");
                            continue;
                        }
                        Err(FrameError::Codec(e)) => {
                            warn!("frame scan error: {e}");
                            continue;
                        }
                    }
                    let n = inner.read(&mut chunk).await?;
                    if n == 0 {
                        return Ok(None);
                    }
                    scanner.extend(&chunk[..n]);
                }
            }
            FrameReader::Datagram(sock) => {
                let mut buf = vec![0u8; MAX_DATAGRAM];
                let (n, _peer) = sock.recv_from(&mut buf).await?;
                buf.truncate(n);
                Ok(Some(buf))
            }
        }
    }
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameReader::Stream { .. } => f.write_str("FrameReader::Stream"),
            FrameReader::Datagram(_) => f.write_str("FrameReader::Datagram"),
        }
    }
}

/// An ownership-scoped (reader, writer) pair. The pipeline exclusively
/// owns both ends; write-only transports carry no reader.
#[derive(Debug)]
pub struct ChannelPair {
    pub reader: Option<FrameReader>,
    pub writer: FrameWriter,
}

impl ChannelPair {
    pub fn write_only(writer: FrameWriter) -> Self {
        Self {
            reader: None,
            writer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_reader_frames_on_end_tag() {
        let data = b"<event uid=\"1\"></event><event uid=\"2\"></event>".to_vec();
        let mut reader = FrameReader::stream(Box::new(std::io::Cursor::new(data)));
        let first = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(first, b"<event uid=\"1\"></event>");
        let second = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(second, b"<event uid=\"2\"></event>");
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stream_writer_passes_bytes_through() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::Stream(Box::new(client));
        writer.send(b"<event></event>").await.unwrap();
        writer.shutdown().await;

        let mut reader = FrameReader::stream(Box::new(server));
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame, b"<event></event>");
    }
}
