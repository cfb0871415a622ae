//! Error types for the codec, transport and resolver layers.

use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

/// A DNS message (or a name inside one) that cannot be encoded or decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("message too short for header: {len} bytes")]
    ShortHeader { len: usize },

    #[error("truncated question at offset {offset}")]
    TruncatedQuestion { offset: usize },

    #[error("truncated record at offset {offset}")]
    TruncatedRecord { offset: usize },

    #[error("truncated rdata at offset {offset}: rdlength {rdlength} exceeds buffer")]
    TruncatedRdata { offset: usize, rdlength: u16 },

    #[error("truncated name at offset {offset}")]
    TruncatedName { offset: usize },

    #[error("compression pointer at {offset} targets {target}, outside the message")]
    PointerOutOfRange { offset: usize, target: usize },

    #[error("compression pointer at {offset} does not point backwards (target {target})")]
    ForwardPointer { offset: usize, target: usize },

    #[error("name exceeds {limit} compression hops")]
    TooManyHops { limit: usize },

    #[error("reserved label type {byte:#04x} at offset {offset}")]
    BadLabelType { offset: usize, byte: u8 },

    #[error("label of {len} bytes exceeds 63")]
    LabelTooLong { len: usize },

    #[error("name of {len} bytes exceeds 255")]
    NameTooLong { len: usize },
}

/// A record type string that is neither a known mnemonic nor `TYPE<n>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown record type: {0}")]
pub struct UnknownType(pub String);

/// Failure to exchange a datagram with a nameserver.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind: {0}")]
    Bind(#[source] io::Error),

    #[error("send: {0}")]
    Send(#[source] io::Error),

    #[error("recv: {0}")]
    Recv(#[source] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A single query round-trip failed.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed reply: {0}")]
    Malformed(#[from] WireError),
}

/// Terminal failure of a resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("query {server}: {source}")]
    Query {
        server: Ipv4Addr,
        #[source]
        source: QueryError,
    },

    #[error("too deep: delegation depth {depth} exceeds limit")]
    TooDeep { depth: usize },

    #[error("stuck resolving {name}, no NS found")]
    Stuck { name: String },

    #[error("cannot encode {name}: {source}")]
    InvalidName {
        name: String,
        #[source]
        source: WireError,
    },

    #[error("no root servers configured")]
    NoRootServers,
}
