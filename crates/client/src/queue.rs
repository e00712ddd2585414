//! Bounded event queues feeding the transmit and receive workers.
//!
//! Each queue has one producer role and one consumer role, so the only
//! synchronization is the queue's own. The polled variant exists for
//! cross-process producers that cannot share an async channel; its get
//! is a bounded-wait poll, but the contract (absence after timeout) is
//! identical.

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::warn;

use crate::ClientError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A depth-bounded FIFO of raw event payloads.
pub struct EventQueue {
    inner: Inner,
}

enum Inner {
    Bounded {
        tx: mpsc::Sender<Vec<u8>>,
        rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    },
    Unbounded {
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    },
    Polled {
        tx: std_mpsc::SyncSender<Vec<u8>>,
        rx: std::sync::Mutex<std_mpsc::Receiver<Vec<u8>>>,
    },
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Inner::Bounded { .. } => f.write_str("EventQueue::Bounded"),
            Inner::Unbounded { .. } => f.write_str("EventQueue::Unbounded"),
            Inner::Polled { .. } => f.write_str("EventQueue::Polled"),
        }
    }
}

impl EventQueue {
    /// In-process queue. A capacity of zero means unbounded.
    pub fn bounded(capacity: usize) -> Self {
        let inner = if capacity == 0 {
            let (tx, rx) = mpsc::unbounded_channel();
            Inner::Unbounded {
                tx,
                rx: AsyncMutex::new(rx),
            }
        } else {
            let (tx, rx) = mpsc::channel(capacity);
            Inner::Bounded {
                tx,
                rx: AsyncMutex::new(rx),
            }
        };
        Self { inner }
    }

    /// Cross-process-friendly queue whose get is a bounded-wait poll.
    pub fn polled(capacity: usize) -> Self {
        let (tx, rx) = std_mpsc::sync_channel(capacity.max(1));
        Self {
            inner: Inner::Polled {
                tx,
                rx: std::sync::Mutex::new(rx),
            },
        }
    }

    /// Enqueues, waiting for room in a bounded queue.
    pub async fn put(&self, data: Vec<u8>) -> Result<(), ClientError> {
        match &self.inner {
            Inner::Bounded { tx, .. } => {
                tx.send(data).await.map_err(|_| ClientError::QueueClosed)
            }
            Inner::Unbounded { tx, .. } => {
                tx.send(data).map_err(|_| ClientError::QueueClosed)
            }
            Inner::Polled { tx, .. } => {
                let mut data = data;
                loop {
                    match tx.try_send(data) {
                        Ok(()) => return Ok(()),
                        Err(std_mpsc::TrySendError::Full(returned)) => {
                            data = returned;
                            tokio::time::sleep(POLL_INTERVAL).await;
                        }
                        Err(std_mpsc::TrySendError::Disconnected(_)) => {
                            return Err(ClientError::QueueClosed);
                        }
                    }
                }
            }
        }
    }

    /// Enqueues without waiting for room. When the queue is full the
    /// oldest entry is dropped to make room, with a warning. The new
    /// entry always lands unless the queue has closed.
    pub async fn put_dropping(&self, data: Vec<u8>) {
        match &self.inner {
            Inner::Bounded { tx, rx } => {
                let mut data = data;
                loop {
                    match tx.try_send(data) {
                        Ok(()) => return,
                        Err(mpsc::error::TrySendError::Full(returned)) => {
                            warn!("queue full, dropping oldest entry; consider raising MAX_IN_QUEUE or MAX_OUT_QUEUE");
                            data = returned;
                            // The consumer holds this lock only across
                            // individual recv polls, so waiting here is
                            // brief and the eviction always happens.
                            let _ = rx.lock().await.try_recv();
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => return,
                    }
                }
            }
            Inner::Unbounded { tx, .. } => {
                let _ = tx.send(data);
            }
            Inner::Polled { tx, rx } => {
                let mut data = data;
                loop {
                    match tx.try_send(data) {
                        Ok(()) => return,
                        Err(std_mpsc::TrySendError::Full(returned)) => {
                            warn!("queue full, dropping oldest entry; consider raising MAX_IN_QUEUE or MAX_OUT_QUEUE");
                            data = returned;
                            match rx.lock() {
                                Ok(rx) => {
                                    let _ = rx.try_recv();
                                }
                                Err(_) => return,
                            }
                        }
                        Err(std_mpsc::TrySendError::Disconnected(_)) => return,
                    }
                }
            }
        }
    }

    /// Dequeues one entry, waiting up to `timeout`. `None` means the
    /// timeout elapsed or the queue closed; neither is an error.
    pub async fn get(&self, timeout: Duration) -> Option<Vec<u8>> {
        match &self.inner {
            Inner::Bounded { rx, .. } => {
                tokio::time::timeout(timeout, async { rx.lock().await.recv().await })
                    .await
                    .ok()
                    .flatten()
            }
            Inner::Unbounded { rx, .. } => {
                tokio::time::timeout(timeout, async { rx.lock().await.recv().await })
                    .await
                    .ok()
                    .flatten()
            }
            Inner::Polled { rx, .. } => {
                let deadline = tokio::time::Instant::now() + timeout;
                loop {
                    {
                        let guard = rx.lock().ok()?;
                        match guard.try_recv() {
                            Ok(data) => return Some(data),
                            Err(std_mpsc::TryRecvError::Empty) => {}
                            Err(std_mpsc::TryRecvError::Disconnected) => return None,
                        }
                    }
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
                }
            }
        }
    }
}
