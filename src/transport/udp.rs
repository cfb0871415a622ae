//! UDP transport for DNS queries.
//!
//! Each exchange binds a fresh ephemeral socket, connects it to the server
//! so stray datagrams from other peers are dropped, and reads one reply.
//! Replies longer than the read buffer are truncated by the OS; there is no
//! TCP fallback.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use super::{DNS_PORT, Transport};
use crate::dns::MAX_MESSAGE_SIZE;
use crate::error::TransportError;

/// UDP transport to nameservers on a fixed port.
pub struct UdpTransport {
    port: u16,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self { port: DNS_PORT }
    }

    /// Talk to servers on `port` instead of 53.
    pub fn with_port(port: u16) -> Self {
        Self { port }
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(
        &self,
        server: Ipv4Addr,
        query: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let addr = SocketAddr::from((server, self.port));

        let exchange = async {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
                .await
                .map_err(TransportError::Bind)?;
            socket.connect(addr).await.map_err(TransportError::Send)?;
            socket.send(query).await.map_err(TransportError::Send)?;

            let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
            let len = socket.recv(&mut buf).await.map_err(TransportError::Recv)?;
            buf.truncate(len);
            Ok::<_, TransportError>(buf)
        };

        let reply = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        debug!(server = %addr, sent = query.len(), received = reply.len(), "UDP exchange");
        Ok(reply)
    }
}
