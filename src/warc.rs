pub mod digest;
pub mod rotator;
pub mod types;

pub use digest::payload_digest;
pub use rotator::{RotatorSummary, WarcRotator, QUEUE_CAPACITY};
pub use types::{Compression, RecordBatch, RecordType, RotatorSettings, WarcRecord};
