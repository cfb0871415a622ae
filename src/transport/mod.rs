//! Transport used by the resolver to reach nameservers.
//!
//! The resolver only needs one capability: deliver query bytes to a server
//! and hand back the reply bytes, or fail within a deadline.

pub mod udp;

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

pub use udp::UdpTransport;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// A single query/reply exchange with a nameserver.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        server: Ipv4Addr,
        query: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}
