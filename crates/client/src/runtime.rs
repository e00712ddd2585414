//! Client runtime: resolves the destination, binds workers to queues,
//! and drives everything until the first task finishes or the caller
//! cancels.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cotwire_protocol::{BinaryCodec, ProtoVariant, hello_event};
use cotwire_transport::{
    ChannelPair, ConfiguredPassphrase, CotUrl, Scheme, tls, resolve,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::queue::EventQueue;
use crate::worker::{Framing, RxWorker, TxWorker};
use crate::ClientError;

type TaskFuture = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'static>>;

/// Orchestrator for one client connection.
pub struct ClientRuntime {
    config: Config,
    tx_queue: Arc<EventQueue>,
    rx_queue: Arc<EventQueue>,
    codec: Option<Arc<dyn BinaryCodec>>,
    cancel: CancellationToken,
    tasks: Vec<TaskFuture>,
}

impl ClientRuntime {
    pub fn new(config: Config) -> Self {
        let tx_queue = Arc::new(EventQueue::bounded(config.max_out_queue));
        let rx_queue = Arc::new(EventQueue::bounded(config.max_in_queue));
        Self::with_queues(config, tx_queue, rx_queue)
    }

    /// Builds a runtime around caller-supplied queues, for swapping in
    /// an unbounded or cross-process variant.
    pub fn with_queues(
        config: Config,
        tx_queue: Arc<EventQueue>,
        rx_queue: Arc<EventQueue>,
    ) -> Self {
        Self {
            config,
            tx_queue,
            rx_queue,
            codec: None,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Installs a binary codec for version 1 payloads.
    pub fn set_codec(&mut self, codec: Arc<dyn BinaryCodec>) {
        self.codec = Some(codec);
    }

    /// Queue applications push outbound events onto.
    pub fn tx_queue(&self) -> Arc<EventQueue> {
        self.tx_queue.clone()
    }

    /// Queue applications read inbound events from.
    pub fn rx_queue(&self) -> Arc<EventQueue> {
        self.rx_queue.clone()
    }

    /// Token that stops all workers when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers an application task to run alongside the workers.
    pub fn add_task(
        &mut self,
        task: impl Future<Output = Result<(), ClientError>> + Send + 'static,
    ) {
        self.tasks.push(Box::pin(task));
    }

    /// Resolves the destination and registers the transmit and receive
    /// workers. Write-only destinations get no receive worker.
    pub async fn setup(&mut self) -> Result<(), ClientError> {
        if let Some(package) = self.config.pref_package.clone() {
            let imported = cotwire_package::import(&package)?;
            self.config.merge_package(&imported);
        }

        let url = CotUrl::parse(self.config.effective_url())?;
        info!(url = self.config.effective_url(), "connecting");
        let pair = Self::connect(&self.config, &url).await?;

        let variant = ProtoVariant::for_destination(url.is_multicast());
        let ChannelPair { reader, writer } = pair;

        let tx = TxWorker::new(
            self.tx_queue.clone(),
            writer,
            Framing::new(self.config.tak_proto, variant, self.codec.clone()),
            self.config.pacing(),
        );
        let cancel = self.cancel.clone();
        self.add_task(async move { tx.run(cancel).await });

        match reader {
            Some(reader) => {
                let rx = RxWorker::new(
                    self.rx_queue.clone(),
                    reader,
                    Framing::new(self.config.tak_proto, variant, self.codec.clone()),
                );
                let cancel = self.cancel.clone();
                self.add_task(async move { rx.run(cancel).await });
            }
            None => debug!("write-only destination, no receive worker"),
        }

        Ok(())
    }

    async fn connect(config: &Config, url: &CotUrl) -> Result<ChannelPair, ClientError> {
        match url.scheme {
            Scheme::Tls => {
                let passphrases = ConfiguredPassphrase(config.tls.passphrase.clone());
                Ok(tls::connect(url, &config.tls, &passphrases).await?)
            }
            _ => Ok(resolve(url, &config.transport).await?),
        }
    }

    /// Enqueues the greeting event unless suppressed.
    ///
    /// Returns an owned future so callers can await it without holding
    /// a runtime borrow across the suspension.
    pub fn hello_event(
        &self,
    ) -> impl Future<Output = Result<(), ClientError>> + Send + 'static + use<> {
        let queue = self.tx_queue.clone();
        let greeting = hello_event(&self.config.host_id);
        async move { queue.put(greeting).await }
    }

    /// Runs all registered tasks until the first one finishes, any one
    /// fails, or the cancel token fires.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        if !self.config.no_hello {
            self.hello_event().await?;
        }

        let mut running: JoinSet<Result<(), ClientError>> = JoinSet::new();
        for task in self.tasks.drain(..) {
            running.spawn(task);
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            joined = running.join_next() => match joined {
                Some(Ok(result)) => result,
                Some(Err(e)) => Err(ClientError::Task(e.to_string())),
                None => Ok(()),
            },
        };

        // First completion ends the run; remaining workers stop at
        // their next loop boundary.
        self.cancel.cancel();
        running.shutdown().await;
        info!("client run complete");
        result
    }
}
