//! cire — a WARC-writing HTTP/S archiving proxy.
//!
//! Every exchange that passes through the proxy is transcoded into a pair of
//! WARC/1.0 records and handed over a bounded queue to a single writer that
//! owns the rotating, optionally compressed archive files on disk.

pub mod capture;
pub mod configuration;
pub mod error_handling;
pub mod proxy;
pub mod shutdown;
pub mod warc;
