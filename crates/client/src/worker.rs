//! Transmit and receive workers.
//!
//! Symmetric loops in opposite directions: the transmit worker drains
//! the outbound queue onto the channel, the receive worker drains the
//! channel into the inbound queue. Both stop cooperatively at loop
//! boundaries when cancelled.

use std::sync::Arc;
use std::time::Duration;

use cotwire_protocol::{BinaryCodec, ProtoVariant, TakProto};
use cotwire_transport::{FrameReader, FrameWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ClientError;
use crate::pacing::Pacing;
use crate::queue::EventQueue;

/// How long a transmit iteration waits on the queue before looping.
const QUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Chooses the on-wire representation of each payload.
pub struct Framing {
    proto: TakProto,
    variant: ProtoVariant,
    codec: Option<Arc<dyn BinaryCodec>>,
    warned_fallback: bool,
}

impl Framing {
    pub fn new(
        proto: TakProto,
        variant: ProtoVariant,
        codec: Option<Arc<dyn BinaryCodec>>,
    ) -> Self {
        Self {
            proto,
            variant,
            codec,
            warned_fallback: false,
        }
    }

    /// Encodes an outbound payload. Version 1 without a working codec
    /// falls back to version 0 with a one-time warning.
    pub fn encode(&mut self, xml: &[u8]) -> Vec<u8> {
        if self.proto == TakProto::V1 {
            match &self.codec {
                Some(codec) => match codec.encode(xml, self.variant) {
                    Ok(frame) => return frame,
                    Err(e) => self.warn_fallback(&format!("binary encode failed: {e}")),
                },
                None => self.warn_fallback("no binary codec installed"),
            }
        }
        xml.to_vec()
    }

    /// Decodes an inbound frame, lazily detecting binary payloads.
    /// Unrecognized data passes through untouched.
    pub fn decode(&self, data: Vec<u8>) -> Vec<u8> {
        match &self.codec {
            Some(codec) => codec.decode(&data).unwrap_or(data),
            None => data,
        }
    }

    fn warn_fallback(&mut self, reason: &str) {
        if !self.warned_fallback {
            warn!("{reason}; transmitting plain XML instead");
            self.warned_fallback = true;
        }
    }
}

/// Drains the outbound queue onto the channel.
pub struct TxWorker {
    queue: Arc<EventQueue>,
    writer: FrameWriter,
    framing: Framing,
    pacing: Pacing,
}

impl TxWorker {
    pub fn new(
        queue: Arc<EventQueue>,
        writer: FrameWriter,
        framing: Framing,
        pacing: Pacing,
    ) -> Self {
        Self {
            queue,
            writer,
            framing,
            pacing,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ClientError> {
        info!("transmit worker running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.writer.shutdown().await;
                    return Ok(());
                }
                item = self.queue.get(QUEUE_TIMEOUT) => {
                    // A queue-wait timeout is not an error.
                    let Some(data) = item else { continue };
                    let frame = self.framing.encode(&data);
                    self.writer.send(&frame).await?;
                    self.pacing.pause().await;
                }
            }
        }
    }
}

/// Drains the channel into the inbound queue.
pub struct RxWorker {
    queue: Arc<EventQueue>,
    reader: FrameReader,
    framing: Framing,
}

impl RxWorker {
    pub fn new(queue: Arc<EventQueue>, reader: FrameReader, framing: Framing) -> Self {
        Self {
            queue,
            reader,
            framing,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ClientError> {
        info!("receive worker running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                frame = self.reader.read_frame() => match frame? {
                    Some(data) if !data.is_empty() => {
                        self.queue.put_dropping(self.framing.decode(data)).await;
                        tokio::task::yield_now().await;
                    }
                    Some(_) => {}
                    None => {
                        debug!("channel closed by peer");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotwire_protocol::FrameError;
    use tokio::io::AsyncReadExt;

    struct TagCodec;

    impl BinaryCodec for TagCodec {
        fn encode(&self, xml: &[u8], _variant: ProtoVariant) -> Result<Vec<u8>, FrameError> {
            let mut framed = vec![0xbf];
            framed.extend_from_slice(xml);
            Ok(framed)
        }

        fn decode(&self, data: &[u8]) -> Option<Vec<u8>> {
            data.strip_prefix(&[0xbf]).map(<[u8]>::to_vec)
        }
    }

    struct FailingCodec;

    impl BinaryCodec for FailingCodec {
        fn encode(&self, _xml: &[u8], _variant: ProtoVariant) -> Result<Vec<u8>, FrameError> {
            Err(FrameError::Codec("broken".into()))
        }

        fn decode(&self, _data: &[u8]) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn v1_without_codec_falls_back_to_xml() {
        let mut framing = Framing::new(TakProto::V1, ProtoVariant::Stream, None);
        assert_eq!(framing.encode(b"<event/>"), b"<event/>");
        assert!(framing.warned_fallback);
    }

    #[test]
    fn v1_with_codec_produces_binary_frames() {
        let mut framing = Framing::new(
            TakProto::V1,
            ProtoVariant::Mesh,
            Some(Arc::new(TagCodec)),
        );
        assert_eq!(framing.encode(b"<event/>"), b"\xbf<event/>");
        assert_eq!(framing.decode(b"\xbf<event/>".to_vec()), b"<event/>");
        // Plain XML passes through undecoded.
        assert_eq!(framing.decode(b"<event/>".to_vec()), b"<event/>");
    }

    #[test]
    fn failing_codec_falls_back_to_xml() {
        let mut framing = Framing::new(
            TakProto::V1,
            ProtoVariant::Stream,
            Some(Arc::new(FailingCodec)),
        );
        assert_eq!(framing.encode(b"<event/>"), b"<event/>");
        assert!(framing.warned_fallback);
    }

    #[tokio::test]
    async fn tx_worker_writes_queued_frames() {
        let (client, mut server) = tokio::io::duplex(4096);
        let queue = Arc::new(EventQueue::bounded(8));
        let worker = TxWorker::new(
            queue.clone(),
            FrameWriter::Stream(Box::new(client)),
            Framing::new(TakProto::V0, ProtoVariant::Stream, None),
            Pacing::Yield,
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        queue.put(b"<event uid=\"x\"></event>".to_vec()).await.unwrap();
        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"<event uid=\"x\"></event>");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn rx_worker_queues_each_frame() {
        let (client, server) = tokio::io::duplex(4096);
        let queue = Arc::new(EventQueue::bounded(8));
        let worker = RxWorker::new(
            queue.clone(),
            FrameReader::stream(Box::new(server)),
            Framing::new(TakProto::V0, ProtoVariant::Stream, None),
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let mut writer = FrameWriter::Stream(Box::new(client));
        writer.send(b"<event uid=\"a\"></event><event uid=\"b\"></event>").await.unwrap();

        let first = queue.get(Duration::from_secs(1)).await.unwrap();
        let second = queue.get(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first, b"<event uid=\"a\"></event>");
        assert_eq!(second, b"<event uid=\"b\"></event>");

        // Dropping the writer closes the stream; the worker exits cleanly.
        writer.shutdown().await;
        drop(writer);
        handle.await.unwrap().unwrap();
        cancel.cancel();
    }
}
