//! Client pipeline: configuration, bounded queues, transmit/receive
//! workers, and the runtime that wires them onto a resolved channel.

use std::io;

use thiserror::Error;

mod config;
mod pacing;
mod queue;
mod runtime;
mod worker;

pub use config::Config;
pub use pacing::Pacing;
pub use queue::EventQueue;
pub use runtime::ClientRuntime;
pub use worker::{Framing, RxWorker, TxWorker};

/// Errors surfaced by the client pipeline. Queue-wait timeouts and
/// oversized frames are absorbed inside the workers and never appear
/// here; everything below is fatal for the run.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] cotwire_transport::TransportError),

    #[error(transparent)]
    Tls(#[from] cotwire_transport::TlsError),

    #[error(transparent)]
    Package(#[from] cotwire_package::PackageError),

    #[error("channel i/o failed: {0}")]
    ChannelIo(#[from] io::Error),

    #[error("event queue closed")]
    QueueClosed,

    #[error("worker task failed: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
