//! Status hand-off between launch workers and the control thread.
//!
//! Workers hold a cloned [`StatusSink`] and only ever send. The control thread owns
//! the single [`StatusSlot`]; it applies pending updates on its own schedule and keeps
//! just the latest one for display. Per-request ordering is preserved because the
//! channel is FIFO and each request is emitted by a single worker.

use crate::model::StatusUpdate;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Create a connected sink/slot pair.
pub fn channel() -> (StatusSink, StatusSlot) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StatusSink { tx },
        StatusSlot {
            rx,
            current: None,
        },
    )
}

#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: UnboundedSender<StatusUpdate>,
}

impl StatusSink {
    /// Send an update. A closed slot (UI gone) is not an error for the worker.
    pub fn emit(&self, update: StatusUpdate) {
        if self.tx.send(update).is_err() {
            tracing::debug!("status slot closed, dropping update");
        }
    }
}

/// Single-slot current status, owned by the control thread.
#[derive(Debug)]
pub struct StatusSlot {
    rx: UnboundedReceiver<StatusUpdate>,
    current: Option<StatusUpdate>,
}

impl StatusSlot {
    /// Apply every pending update without blocking. Returns the updates applied, in
    /// arrival order, so callers can react to terminal events; the slot itself keeps
    /// only the last one.
    pub fn drain(&mut self) -> Vec<StatusUpdate> {
        let mut applied = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            self.current = Some(update.clone());
            applied.push(update);
        }
        applied
    }

    /// Wait for the next update. `None` once every sink has been dropped.
    pub async fn recv(&mut self) -> Option<StatusUpdate> {
        let update = self.rx.recv().await?;
        self.current = Some(update.clone());
        Some(update)
    }

    pub fn current(&self) -> Option<&StatusUpdate> {
        self.current.as_ref()
    }
}
