//! Serial WARC writer with size-based file rotation.
//!
//! One blocking worker drains a bounded queue of [`RecordBatch`] values and
//! is the only component that touches archive files. Producers block on the
//! queue when the worker falls behind disk IO, which bounds memory use.
//!
//! Files are written under an `.open` suffix and renamed to their final name
//! when cleanly finalized. After a crash or a fatal write error the newest
//! file keeps its `.open` name; operators should inspect it, as its tail may
//! be truncated. Finalized files are never reopened or rewritten.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::Utc;
use flate2::write::GzEncoder;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};

use crate::error_handling::types::WarcError;

use super::types::{Compression, RecordBatch, RotatorSettings, WarcRecord};

/// Capacity of the inbound batch queue. Producers block once this many
/// batches are waiting on the writer.
pub const QUEUE_CAPACITY: usize = 512;

/// Totals reported once the writer has drained its queue and closed its
/// last file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatorSummary {
    pub files: u64,
    pub records: u64,
    pub bytes: u64,
}

/// Handle used to start the rotating writer.
pub struct WarcRotator;

impl WarcRotator {
    /// Opens the output directory and the first archive file, then spawns the
    /// writer worker.
    ///
    /// Returns the batch submission endpoint and a completion signal. The
    /// signal resolves exactly once, after the queue has been closed (all
    /// senders dropped) and every previously submitted batch is on disk —
    /// `Ok` with totals on a clean close, `Err` if a write or finalization
    /// failed. After an `Err` the writer is gone and further submissions fail.
    pub fn open(
        settings: RotatorSettings,
    ) -> Result<
        (
            mpsc::Sender<RecordBatch>,
            oneshot::Receiver<Result<RotatorSummary, WarcError>>,
        ),
        WarcError,
    > {
        fs::create_dir_all(&settings.output_directory)?;
        let worker = Worker::start(settings)?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let result = worker.run(rx);
            if let Err(ref e) = result {
                error!("WARC writer failed: {}", e);
            }
            let _ = done_tx.send(result);
        });
        Ok((tx, done_rx))
    }
}

/// `Write` adapter that counts bytes reaching the underlying file, so the
/// size accumulator sees post-compression sizes.
struct CountingWriter {
    inner: File,
    written: u64,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct OpenFile {
    out: CountingWriter,
    open_path: PathBuf,
    final_path: PathBuf,
}

impl OpenFile {
    fn create(settings: &RotatorSettings, serial: u64) -> Result<Self, WarcError> {
        let name = format!(
            "{}-{}-{:05}.{}",
            settings.prefix,
            Utc::now().format("%Y%m%d%H%M%S"),
            serial,
            settings.compression.extension()
        );
        let final_path = settings.output_directory.join(&name);
        let open_path = settings.output_directory.join(format!("{}.open", name));
        let file = File::create(&open_path)?;
        debug!("opened archive file {}", open_path.display());
        Ok(Self {
            out: CountingWriter {
                inner: file,
                written: 0,
            },
            open_path,
            final_path,
        })
    }

    /// Serializes one record through the configured compression. Each record
    /// becomes its own gzip member / zstd frame, so readers can decompress it
    /// without the rest of the file.
    fn write_record(&mut self, record: &WarcRecord, compression: Compression) -> Result<(), WarcError> {
        let wire = record.to_wire();
        match compression {
            Compression::None => self.out.write_all(&wire)?,
            Compression::Gzip => {
                let mut enc = GzEncoder::new(&mut self.out, flate2::Compression::default());
                enc.write_all(&wire)?;
                enc.finish()?;
            }
            Compression::Zstd => {
                let mut enc = zstd::Encoder::new(&mut self.out, 0)
                    .map_err(|e| WarcError::Compression(e.to_string()))?;
                enc.write_all(&wire)?;
                enc.finish()
                    .map_err(|e| WarcError::Compression(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Flushes, fsyncs and renames `.open` to the final name.
    fn finalize(mut self) -> Result<u64, WarcError> {
        self.out.flush().map_err(WarcError::Finalize)?;
        self.out.inner.sync_all().map_err(WarcError::Finalize)?;
        fs::rename(&self.open_path, &self.final_path).map_err(WarcError::Finalize)?;
        info!(
            "finalized archive file {} ({} bytes)",
            self.final_path.display(),
            self.out.written
        );
        Ok(self.out.written)
    }
}

struct Worker {
    settings: RotatorSettings,
    file: OpenFile,
    serial: u64,
    records: u64,
    bytes_finalized: u64,
}

impl Worker {
    fn start(settings: RotatorSettings) -> Result<Self, WarcError> {
        let mut worker = Self {
            file: OpenFile::create(&settings, 0)?,
            settings,
            serial: 0,
            records: 0,
            bytes_finalized: 0,
        };
        worker
            .file
            .write_record(&WarcRecord::warcinfo(), worker.settings.compression)?;
        Ok(worker)
    }

    fn run(mut self, mut rx: mpsc::Receiver<RecordBatch>) -> Result<RotatorSummary, WarcError> {
        while let Some(batch) = rx.blocking_recv() {
            // A batch is written whole: rotation only happens between batches,
            // so one exchange's records never span two files.
            for record in &batch.records {
                self.file.write_record(record, self.settings.compression)?;
                self.records += 1;
            }
            debug!(
                "wrote batch of {} record(s), current file at {} bytes",
                batch.len(),
                self.file.out.written
            );
            if self.file.out.written > self.settings.size_threshold_bytes {
                self.rotate()?;
            }
        }
        // Queue closed and drained: close out the last file.
        self.bytes_finalized += self.file.finalize()?;
        Ok(RotatorSummary {
            files: self.serial + 1,
            records: self.records,
            bytes: self.bytes_finalized,
        })
    }

    fn rotate(&mut self) -> Result<(), WarcError> {
        self.serial += 1;
        let next = OpenFile::create(&self.settings, self.serial)?;
        let full = std::mem::replace(&mut self.file, next);
        self.bytes_finalized += full.finalize()?;
        self.file
            .write_record(&WarcRecord::warcinfo(), self.settings.compression)?;
        Ok(())
    }
}
