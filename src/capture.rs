pub mod dispatcher;
pub mod observer;
pub mod transcoder;
pub mod types;

pub use dispatcher::CaptureDispatcher;
pub use observer::{CaptureObserver, RateCounter};
pub use transcoder::transcode;
pub use types::Exchange;
