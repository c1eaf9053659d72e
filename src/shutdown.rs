//! Graceful close of the archival pipeline.

use std::time::Duration;

use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::error_handling::types::WarcError;
use crate::warc::rotator::RotatorSummary;
use crate::warc::types::RecordBatch;

/// Drains the writer and finalizes the last archive file on shutdown.
///
/// Holds one queue sender; the queue closes once this one and every
/// dispatcher clone (dropped when their connection tasks end) are gone. The
/// grace period only bounds how long we wait before complaining: archival
/// correctness wins over a fast exit, so after the warning we keep waiting
/// for the writer. A crash before completion leaves the newest file under
/// its `.open` name, which is how an unclean close stays distinguishable.
pub struct ShutdownCoordinator {
    tx: mpsc::Sender<RecordBatch>,
    done: oneshot::Receiver<Result<RotatorSummary, WarcError>>,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        tx: mpsc::Sender<RecordBatch>,
        done: oneshot::Receiver<Result<RotatorSummary, WarcError>>,
        grace: Duration,
    ) -> Self {
        Self { tx, done, grace }
    }

    /// Closes the queue and waits for the writer's completion signal, which
    /// fires exactly once, only after every submitted batch is on disk.
    pub async fn shutdown(self) -> Result<RotatorSummary, WarcError> {
        let Self { tx, mut done, grace } = self;
        drop(tx);
        info!("archive queue closing, waiting for writer to drain");

        match tokio::time::timeout(grace, &mut done).await {
            Ok(result) => result.unwrap_or(Err(WarcError::WorkerLost)),
            Err(_) => {
                warn!(
                    "writer still draining after {:?}, waiting for it to finish",
                    grace
                );
                done.await.unwrap_or(Err(WarcError::WorkerLost))
            }
        }
    }
}
