//! Live collection snapshot streams.
//!
//! A listener receives the full current snapshot of one collection: once
//! immediately on registration, then again after every committed batch that
//! touches the collection. Dead listeners are pruned on the next delivery.

use tokio::sync::mpsc;

use super::Document;

/// A registered listener entry.
#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub(crate) id: u64,
    pub(crate) order_by: Option<String>,
    pub(crate) tx: mpsc::UnboundedSender<Vec<Document>>,
}

/// A live snapshot stream for one collection.
///
/// Ends (yields `None`) when the store is closed.
#[derive(Debug)]
pub struct ChangeStream {
    pub(crate) rx: mpsc::UnboundedReceiver<Vec<Document>>,
}

impl ChangeStream {
    /// Receive the next full snapshot of the collection.
    pub async fn recv(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }
}
