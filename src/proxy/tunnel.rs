//! Blind relay for CONNECT tunnels.
//!
//! TLS interception is somebody else's job: a CONNECT tunnel is relayed byte
//! for byte in both directions and nothing from it is archived.

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::error_handling::types::ProxyError;

/// Connects to `authority` (host:port from the CONNECT target), confirms the
/// tunnel to the client, then relays both directions until either side
/// closes. EOF on one side shuts down the opposite writer so the peer task
/// terminates instead of hanging.
pub async fn relay<R>(
    client_reader: R,
    mut client_writer: OwnedWriteHalf,
    authority: &str,
) -> Result<(), ProxyError>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let upstream = match TcpStream::connect(authority).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = client_writer
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n")
                .await;
            return Err(ProxyError::Upstream(e));
        }
    };
    client_writer
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;
    debug!("tunnel established to {}", authority);

    let (upstream_reader, upstream_writer) = upstream.into_split();
    let mut set = JoinSet::new();
    set.spawn(copy_half(client_reader, upstream_writer));
    set.spawn(copy_half(upstream_reader, client_writer));

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(bytes)) => trace!("tunnel half done after {} bytes", bytes),
            Ok(Err(e)) => {
                set.abort_all();
                return Err(ProxyError::Io(e));
            }
            Err(_) => return Err(ProxyError::Truncated),
        }
    }
    Ok(())
}

async fn copy_half<R, W>(mut reader: R, mut writer: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; 16 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            // Propagate EOF so the peer half wakes up and finishes.
            let _ = writer.shutdown().await;
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn relays_both_directions_and_propagates_eof() {
        let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream_listener.local_addr().unwrap();
        let upstream_echo = tokio::spawn(async move {
            let (mut sock, _) = upstream_listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            let n = sock.read(&mut buf).await.unwrap();
            sock.write_all(&buf[..n]).await.unwrap();
            sock.shutdown().await.unwrap();
        });

        let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = proxy_listener.local_addr().unwrap();
        let tunnel = tokio::spawn(async move {
            let (client, _) = proxy_listener.accept().await.unwrap();
            let (reader, writer) = client.into_split();
            relay(reader, writer, &upstream_addr.to_string()).await
        });

        let client = TcpStream::connect(proxy_addr).await.unwrap();
        let mut reader = BufReader::new(client);
        let mut status = String::new();
        // The caller of relay() has already consumed the CONNECT head, so the
        // first thing the client sees is the 200.
        reader.read_line(&mut status).await.unwrap();
        assert_eq!(status, "HTTP/1.1 200 Connection Established\r\n");
        let mut blank = String::new();
        reader.read_line(&mut blank).await.unwrap();

        reader.get_mut().write_all(b"ping").await.unwrap();
        reader.get_mut().shutdown().await.unwrap();
        let mut echoed = Vec::new();
        reader.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"ping");

        upstream_echo.await.unwrap();
        tunnel.await.unwrap().unwrap();
    }
}
