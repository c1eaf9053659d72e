//! Hand-off from concurrent capture paths to the single writer.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::error_handling::types::CaptureError;
use crate::warc::types::RecordBatch;

use super::observer::CaptureObserver;
use super::transcoder::transcode;
use super::types::Exchange;

/// Submits one record batch per completed exchange to the writer queue.
///
/// Cloned into every connection task; instances share nothing but the queue.
/// `submit` awaits when the queue is full, which is the backpressure valve
/// that slows capture paths down to what the writer can sustain. A batch is
/// never dropped silently: if the queue has closed (shutdown), the drop is
/// logged and reported to the observer, and the exchange itself proceeds.
#[derive(Clone)]
pub struct CaptureDispatcher {
    tx: mpsc::Sender<RecordBatch>,
    observer: Option<Arc<dyn CaptureObserver>>,
}

impl CaptureDispatcher {
    pub fn new(tx: mpsc::Sender<RecordBatch>, observer: Option<Arc<dyn CaptureObserver>>) -> Self {
        Self { tx, observer }
    }

    /// Transcodes the exchange and enqueues its batch.
    ///
    /// Both error cases are scoped to this exchange: a truncated exchange
    /// skips archival, and a closed queue discards the built batch.
    pub async fn submit(&self, exchange: Exchange) -> Result<(), CaptureError> {
        let batch = match transcode(&exchange) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("skipping archival of {}: {}", exchange.target_uri, e);
                if let Some(observer) = &self.observer {
                    observer.batch_discarded(&exchange.target_uri);
                }
                return Err(e);
            }
        };
        match self.tx.send(batch).await {
            Ok(()) => {
                debug!("archived exchange for {}", exchange.target_uri);
                if let Some(observer) = &self.observer {
                    observer.exchange_archived(&exchange.target_uri);
                }
                Ok(())
            }
            Err(_) => {
                warn!(
                    "archive queue closed, discarding batch for {}",
                    exchange.target_uri
                );
                if let Some(observer) = &self.observer {
                    observer.batch_discarded(&exchange.target_uri);
                }
                Err(CaptureError::QueueClosed)
            }
        }
    }
}
