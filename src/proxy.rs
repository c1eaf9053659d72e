pub mod http;
pub mod listener;
pub mod tunnel;

pub use listener::run;
