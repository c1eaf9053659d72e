//! Common data types for the WARC subsystem.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use uuid::Uuid;

use crate::error_handling::types::ConfigError;

use super::digest::payload_digest;

/// Compression applied to archive output.
///
/// `Gzip` and `Zstd` compress each record as its own member/frame, so any
/// record can be decompressed without reading the rest of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// File extension for archives written with this compression.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "warc",
            Compression::Gzip => "warc.gz",
            Compression::Zstd => "warc.zst",
        }
    }
}

impl FromStr for Compression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Compression::None),
            "GZIP" => Ok(Compression::Gzip),
            "ZSTD" => Ok(Compression::Zstd),
            other => Err(ConfigError::BadCompression(format!(
                "expected NONE, GZIP or ZSTD, got {:?}",
                other
            ))),
        }
    }
}

/// WARC record types emitted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Warcinfo,
    Request,
    Response,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Warcinfo => "warcinfo",
            RecordType::Request => "request",
            RecordType::Response => "response",
        }
    }
}

/// One WARC/1.0 record: an ordered header mapping plus an immutable payload.
///
/// The payload of request/response records is the raw serialized HTTP message
/// (start line, headers, body) exactly as seen on the wire, so replay stays
/// byte-faithful. `WARC-Payload-Digest` is always computed over those exact
/// bytes.
#[derive(Debug, Clone)]
pub struct WarcRecord {
    pub record_type: RecordType,
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl WarcRecord {
    fn base(record_type: RecordType, payload: Vec<u8>) -> Self {
        let headers = vec![
            ("WARC-Type".to_string(), record_type.as_str().to_string()),
            (
                "WARC-Record-ID".to_string(),
                format!("<urn:uuid:{}>", Uuid::new_v4()),
            ),
            (
                "WARC-Date".to_string(),
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ),
        ];
        Self {
            record_type,
            headers,
            payload,
        }
    }

    /// Builds a `request` record for the raw HTTP request `payload`.
    ///
    /// The host is carried as a dedicated WARC header for downstream indexing
    /// even though it also appears inside the HTTP headers.
    pub fn request(target_uri: &str, host: &str, payload: Vec<u8>) -> Self {
        let digest = payload_digest(&payload);
        let mut record = Self::base(RecordType::Request, payload);
        record.push_header("WARC-Target-URI", target_uri);
        record.push_header("WARC-Payload-Digest", &digest);
        record.push_header("Host", host);
        record.push_header("Content-Type", "application/http; msgtype=request");
        record
    }

    /// Builds a `response` record for the raw HTTP response `payload`.
    pub fn response(target_uri: &str, payload: Vec<u8>) -> Self {
        let digest = payload_digest(&payload);
        let mut record = Self::base(RecordType::Response, payload);
        record.push_header("WARC-Target-URI", target_uri);
        record.push_header("WARC-Payload-Digest", &digest);
        record.push_header("Content-Type", "application/http; msgtype=response");
        record
    }

    /// Builds the `warcinfo` record written at the head of every file.
    pub fn warcinfo() -> Self {
        let payload = format!(
            "software: cire/{}\r\nformat: WARC File Format 1.0\r\n",
            env!("CARGO_PKG_VERSION")
        )
        .into_bytes();
        let mut record = Self::base(RecordType::Warcinfo, payload);
        record.push_header("Content-Type", "application/warc-fields");
        record
    }

    fn push_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Returns the first value for a header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the record to its WARC wire form:
    /// version line, headers, blank line, payload, two trailing CRLFs.
    /// `Content-Length` is computed here and always emitted last.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 256);
        out.extend_from_slice(b"WARC/1.0\r\n");
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("Content-Length: {}\r\n", self.payload.len()).as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(b"\r\n\r\n");
        out
    }
}

/// The records produced by one exchange.
///
/// A batch is the unit of write atomicity: its records land in the output
/// file consecutively, never interleaved with another batch, and rotation
/// only happens between batches.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub records: Vec<WarcRecord>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Rotation policy for the WARC writer.
#[derive(Debug, Clone)]
pub struct RotatorSettings {
    /// Directory archive files are written into (created if missing).
    pub output_directory: PathBuf,
    /// Filename prefix for every archive file.
    pub prefix: String,
    /// Compression applied per record.
    pub compression: Compression,
    /// Rotate to a new file once the current one grows past this many bytes.
    pub size_threshold_bytes: u64,
}

impl Default for RotatorSettings {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("warcs"),
            prefix: "WARC".to_string(),
            compression: Compression::Gzip,
            size_threshold_bytes: 1000 * 1024 * 1024,
        }
    }
}
