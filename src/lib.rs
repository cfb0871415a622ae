//! Rootwalk - an iterative DNS resolver.
//!
//! Resolves names by querying authoritative nameservers directly, starting
//! at the root and following referrals, glue and CNAMEs.

pub mod cache;
pub mod dns;
pub mod error;
pub mod resolver;
pub mod stats;
pub mod transport;

pub use dns::{Record, RecordType};
pub use error::ResolveError;
pub use resolver::{Resolver, ResolverConfig, TraceEvent, TraceSink};
