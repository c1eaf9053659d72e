use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    BadCompression(String),
    BadAddress(String),
    EmptyPrefix,
    SizeNotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadCompression(e) => write!(f, "Compression setting error: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Listen address error: {}", e),
            ConfigError::EmptyPrefix => write!(f, "WARC prefix must not be empty"),
            ConfigError::SizeNotInRange(e) => write!(f, "WARC size out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub enum WarcError {
    Io(std::io::Error),
    Compression(String),
    Finalize(std::io::Error),
    WorkerLost,
}

impl fmt::Display for WarcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarcError::Io(e) => write!(f, "WARC write error: {}", e),
            WarcError::Compression(e) => write!(f, "WARC compression error: {}", e),
            WarcError::Finalize(e) => write!(f, "WARC file finalization error: {}", e),
            WarcError::WorkerLost => write!(f, "WARC writer worker terminated abnormally"),
        }
    }
}

impl std::error::Error for WarcError {}

impl From<std::io::Error> for WarcError {
    fn from(err: std::io::Error) -> Self {
        WarcError::Io(err)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    TruncatedExchange(String),
    QueueClosed,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::TruncatedExchange(e) => write!(f, "Truncated exchange: {}", e),
            CaptureError::QueueClosed => write!(f, "Archive queue closed"),
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug)]
pub enum ProxyError {
    Io(std::io::Error),
    BadRequest(String),
    Truncated,
    Upstream(std::io::Error),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Io(e) => write!(f, "Proxy IO error: {}", e),
            ProxyError::BadRequest(e) => write!(f, "Malformed request: {}", e),
            ProxyError::Truncated => write!(f, "Connection closed mid-message"),
            ProxyError::Upstream(e) => write!(f, "Upstream connection error: {}", e),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(err)
    }
}
