//! Common data types for the capture subsystem.

/// One completed HTTP exchange as seen on the wire.
///
/// The proxy layer hands an `Exchange` to the dispatcher exactly once per
/// intercepted call; after submission nothing else holds a reference to it.
/// `request` and `response` are the full serialized messages (start line,
/// headers, body) byte for byte as sent and received.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Absolute target URI of the request, e.g. `http://example.com/path`.
    pub target_uri: String,
    /// Host the request was addressed to, without scheme.
    pub host: String,
    /// Raw request bytes exactly as the client sent them.
    pub request: Vec<u8>,
    /// Raw response bytes exactly as the origin returned them.
    pub response: Vec<u8>,
}
