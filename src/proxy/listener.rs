//! Accept loop and per-connection proxying.
//!
//! One task per client connection. Plain HTTP requests are forwarded to the
//! origin and the completed exchange is handed to the capture dispatcher;
//! CONNECT requests become blind tunnels and are not archived. Archival is a
//! pure side channel: relayed bytes are never altered, and a capture failure
//! never fails the client's request.

use std::net::SocketAddr;

use log::{debug, info, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::capture::dispatcher::CaptureDispatcher;
use crate::capture::types::Exchange;
use crate::error_handling::types::ProxyError;

use super::http::{parse_target, read_body, read_head, Head};
use super::tunnel;

/// Binds `address` and serves until the surrounding task is cancelled.
///
/// Connection tasks live in a `JoinSet` owned by this future, so cancelling
/// it tears the connections down too and releases their queue senders.
pub async fn run(address: SocketAddr, dispatcher: CaptureDispatcher) -> Result<(), ProxyError> {
    let listener = TcpListener::bind(address).await?;
    info!("proxy listening on {}", address);

    let mut connections = JoinSet::new();
    loop {
        let (stream, peer) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        connections.spawn(async move {
            match handle_connection(stream, dispatcher).await {
                Ok(()) => debug!("[{}] connection closed", peer),
                Err(e) => debug!("[{}] connection ended: {}", peer, e),
            }
        });
        // Reap finished connection tasks so the set does not grow unbounded.
        while connections.try_join_next().is_some() {}
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: CaptureDispatcher,
) -> Result<(), ProxyError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let head = match read_head(&mut reader).await? {
            Some(head) => head,
            None => return Ok(()),
        };
        let mut parts = head.start_line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| ProxyError::BadRequest("missing method".to_string()))?
            .to_string();
        let target = parts
            .next()
            .ok_or_else(|| ProxyError::BadRequest("missing request target".to_string()))?
            .to_string();
        let version = parts.next().unwrap_or("HTTP/1.1").to_string();

        if method == "CONNECT" {
            return tunnel::relay(reader, write_half, &target).await;
        }

        let target = parse_target(&target, head.header("host"))?;
        let request_body = read_body(&mut reader, &head, false).await?;

        let mut upstream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(|e| {
                warn!("cannot reach {}: {}", target.authority, e);
                ProxyError::Upstream(e)
            })?;
        upstream
            .write_all(&forwarded_head(&head, &method, &target.origin_form, &version))
            .await
            .map_err(ProxyError::Upstream)?;
        upstream
            .write_all(&request_body)
            .await
            .map_err(ProxyError::Upstream)?;

        let mut upstream_reader = BufReader::new(upstream);
        let response_head = read_head(&mut upstream_reader)
            .await?
            .ok_or(ProxyError::Truncated)?;
        let close_delimited = !response_head.is_chunked() && response_head.content_length().is_none();
        let response_body = if bodyless(&method, &response_head) {
            Vec::new()
        } else {
            read_body(&mut upstream_reader, &response_head, true).await?
        };

        write_half.write_all(&response_head.raw).await?;
        write_half.write_all(&response_body).await?;

        let exchange = Exchange {
            target_uri: target.uri,
            host: target.authority,
            request: [head.raw.as_slice(), request_body.as_slice()].concat(),
            response: [response_head.raw.as_slice(), response_body.as_slice()].concat(),
        };
        // Archival failures stay out of the client's path.
        let _ = dispatcher.submit(exchange).await;

        if head.connection_close() || response_head.connection_close() || close_delimited {
            return Ok(());
        }
    }
}

/// The head forwarded upstream: the request line rewritten to origin-form,
/// every following header byte untouched.
fn forwarded_head(head: &Head, method: &str, origin_form: &str, version: &str) -> Vec<u8> {
    let mut out = format!("{} {} {}\r\n", method, origin_form, version).into_bytes();
    if let Some(pos) = head.raw.iter().position(|&b| b == b'\n') {
        out.extend_from_slice(&head.raw[pos + 1..]);
    }
    out
}

/// Responses that carry no body regardless of their framing headers.
fn bodyless(method: &str, response_head: &Head) -> bool {
    if method == "HEAD" {
        return true;
    }
    let status = response_head
        .start_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    status == 204 || status == 304 || (100..200).contains(&status)
}
