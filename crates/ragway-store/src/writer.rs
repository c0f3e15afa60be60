//! Bounded write-behind queue drained by a dedicated thread.
//!
//! Enqueueing never blocks: a full queue drops the item with a warning.
//! The thread exits once every sender has been dropped.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::sqlite::SqliteStore;
use ragway_core::{Error, Result};

enum Command<T> {
    Write(T),
    Flush(oneshot::Sender<()>),
}

pub(crate) struct BackgroundWriter<T> {
    tx: mpsc::Sender<Command<T>>,
    label: &'static str,
}

impl<T: Send + 'static> BackgroundWriter<T> {
    pub(crate) fn spawn<F>(
        label: &'static str,
        capacity: usize,
        store: Arc<SqliteStore>,
        write: F,
    ) -> Result<Self>
    where
        F: Fn(&SqliteStore, &T) -> Result<()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Command<T>>(capacity.max(1));

        std::thread::Builder::new()
            .name(format!("ragway-{}-writer", label))
            .spawn(move || {
                debug!("{} writer started", label);
                while let Some(command) = rx.blocking_recv() {
                    match command {
                        Command::Write(item) => {
                            if let Err(e) = write(&store, &item) {
                                warn!("{} write failed, dropping: {}", label, e);
                            }
                        }
                        Command::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("{} writer stopped", label);
            })?;

        Ok(Self { tx, label })
    }

    /// Queue an item without waiting. Returns false if it was dropped.
    pub(crate) fn try_enqueue(&self, item: T) -> bool {
        match self.tx.try_send(Command::Write(item)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("{} queue full, dropping write", self.label);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("{} writer stopped, dropping write", self.label);
                false
            }
        }
    }

    /// Wait until everything queued before this call has been written.
    pub(crate) async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(done_tx))
            .await
            .map_err(|_| Error::QueueClosed(self.label.to_string()))?;
        done_rx
            .await
            .map_err(|_| Error::QueueClosed(self.label.to_string()))
    }
}
