pub mod types;
pub use types::{CaptureError, ConfigError, ProxyError, WarcError};
