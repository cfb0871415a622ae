//! Iterative resolution from the root.
//!
//! Each step sends one query and decides from the reply what to do next:
//! 1. Return the answer section, or restart at the root for a CNAME target
//! 2. Follow a referral using glue from the additional section
//! 3. Without glue, look up the first nameserver's address from the root
//!
//! Steps run strictly one after another. The delegation depth ceiling is the
//! only guard against cyclic referrals and CNAME chains.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info};

use crate::cache::{AnswerCache, cache_key};
use crate::dns::{Message, Record, RecordType, build_query, canonical_name};
use crate::error::ResolveError;
use crate::stats::{Stats, StatsSnapshot};
use crate::transport::Transport;

/// Deepest delegation step allowed before giving up.
pub const MAX_DEPTH: usize = 10;

pub const DEFAULT_ROOT_SERVERS: [Ipv4Addr; 4] = [
    Ipv4Addr::new(198, 41, 0, 4),
    Ipv4Addr::new(199, 9, 14, 201),
    Ipv4Addr::new(192, 33, 4, 12),
    Ipv4Addr::new(199, 7, 91, 13),
];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for a resolver instance.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Root servers in order. The first one is where every walk starts.
    pub root_servers: Vec<Ipv4Addr>,
    /// Deadline for a single query round-trip.
    pub timeout: Duration,
    /// Upper bound on how long an answer stays cached.
    pub max_cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_servers: DEFAULT_ROOT_SERVERS.to_vec(),
            timeout: DEFAULT_TIMEOUT,
            max_cache_ttl: Duration::from_secs(86400),
        }
    }
}

/// Progress of a resolution, reported when tracing is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// About to query `server`.
    Query {
        name: String,
        qtype: RecordType,
        server: Ipv4Addr,
        depth: usize,
    },
    /// Answered from the cache without a query.
    CacheHit {
        name: String,
        qtype: RecordType,
        depth: usize,
    },
    /// Restarting at the root for the CNAME target.
    Cname {
        name: String,
        target: String,
        depth: usize,
    },
    /// Descending to the next nameserver.
    Referral {
        nameserver: String,
        server: Ipv4Addr,
        glue: bool,
        depth: usize,
    },
}

/// Receives trace events.
pub trait TraceSink: Send + Sync {
    fn event(&self, event: &TraceEvent);
}

/// Forwards trace events to the `tracing` subscriber.
pub struct LogSink;

impl TraceSink for LogSink {
    fn event(&self, event: &TraceEvent) {
        info!(?event, "trace");
    }
}

/// Iterative resolver over an injected transport.
pub struct Resolver {
    config: ResolverConfig,
    root: Ipv4Addr,
    transport: Arc<dyn Transport>,
    cache: AnswerCache,
    stats: Stats,
    trace: bool,
    sink: Arc<dyn TraceSink>,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ResolveError> {
        let root = *config
            .root_servers
            .first()
            .ok_or(ResolveError::NoRootServers)?;
        Ok(Self {
            config,
            root,
            transport,
            cache: AnswerCache::new(),
            stats: Stats::new(),
            trace: false,
            sink: Arc::new(LogSink),
        })
    }

    /// Deliver trace events to `sink` instead of the log.
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve `name` to records of `qtype`, starting at the first root server.
    ///
    /// The name is canonicalized first, so `Example.com.` and `example.com`
    /// share one cache entry.
    pub async fn resolve(
        &self,
        name: &str,
        qtype: RecordType,
    ) -> Result<Vec<Record>, ResolveError> {
        let result = self.lookup(canonical_name(name), qtype, 0).await;
        if let Err(e) = &result {
            debug!(name, %qtype, error = %e, "resolution failed");
            self.stats.record_failure();
        }
        result
    }

    /// A walk from the root, answered from and stored into the cache.
    fn lookup(
        &self,
        name: String,
        qtype: RecordType,
        depth: usize,
    ) -> BoxFuture<'_, Result<Vec<Record>, ResolveError>> {
        async move {
            if depth > MAX_DEPTH {
                return Err(ResolveError::TooDeep { depth });
            }

            let key = cache_key(&name, qtype);
            if let Some(records) = self.cache.get(&key) {
                self.stats.record_cache_hit();
                self.emit(TraceEvent::CacheHit { name, qtype, depth });
                return Ok(records);
            }
            self.stats.record_cache_miss();

            let records = self.step(name, qtype, self.root, depth).await?;
            if let Some(ttl) = self.answer_ttl(&records) {
                self.cache.set(key, records.clone(), ttl);
            }
            Ok(records)
        }
        .boxed()
    }

    /// Query `server` and act on the reply.
    fn step(
        &self,
        name: String,
        qtype: RecordType,
        server: Ipv4Addr,
        depth: usize,
    ) -> BoxFuture<'_, Result<Vec<Record>, ResolveError>> {
        async move {
            if depth > MAX_DEPTH {
                return Err(ResolveError::TooDeep { depth });
            }

            self.emit(TraceEvent::Query {
                name: name.clone(),
                qtype,
                server,
                depth,
            });
            debug!(%name, %qtype, %server, depth, "query");

            let reply = self.query(server, &name, qtype).await?;

            if !reply.answers.is_empty() {
                if qtype != RecordType::CNAME {
                    let target = reply
                        .answers
                        .iter()
                        .find(|r| r.rtype == RecordType::CNAME)
                        .and_then(|r| r.target.clone());
                    if let Some(target) = target {
                        self.emit(TraceEvent::Cname {
                            name,
                            target: target.clone(),
                            depth,
                        });
                        return self.lookup(target, qtype, depth + 1).await;
                    }
                }
                return Ok(reply.answers);
            }

            match self.next_nameserver(&reply, depth).await {
                Some(next) => self.step(name, qtype, next, depth + 1).await,
                None => Err(ResolveError::Stuck { name }),
            }
        }
        .boxed()
    }

    /// Pick the server to descend to from a referral.
    ///
    /// Glue for any listed nameserver wins; otherwise the first nameserver's
    /// address is looked up from the root. A failed lookup leaves the walk
    /// without a next server.
    async fn next_nameserver(&self, reply: &Message, depth: usize) -> Option<Ipv4Addr> {
        let nameservers: Vec<&str> = reply
            .authority
            .iter()
            .filter(|r| r.rtype == RecordType::NS)
            .filter_map(|r| r.target.as_deref())
            .collect();

        for ns in &nameservers {
            let glue = reply
                .additional
                .iter()
                .filter(|r| r.name.eq_ignore_ascii_case(ns))
                .find_map(Record::ipv4);
            if let Some(server) = glue {
                self.emit(TraceEvent::Referral {
                    nameserver: ns.to_string(),
                    server,
                    glue: true,
                    depth,
                });
                return Some(server);
            }
        }

        let first = nameservers.first()?.to_string();
        match self.lookup(first.clone(), RecordType::A, depth + 1).await {
            Ok(records) => {
                let server = records.iter().find_map(Record::ipv4)?;
                self.emit(TraceEvent::Referral {
                    nameserver: first,
                    server,
                    glue: false,
                    depth,
                });
                Some(server)
            }
            Err(e) => {
                debug!(nameserver = %first, error = %e, "nameserver address lookup failed");
                None
            }
        }
    }

    async fn query(
        &self,
        server: Ipv4Addr,
        name: &str,
        qtype: RecordType,
    ) -> Result<Message, ResolveError> {
        let packet = build_query(name, qtype).map_err(|source| ResolveError::InvalidName {
            name: name.to_string(),
            source,
        })?;

        self.stats.record_query();
        let bytes = self
            .transport
            .send(server, &packet, self.config.timeout)
            .await
            .map_err(|e| ResolveError::Query {
                server,
                source: e.into(),
            })?;

        Message::parse(&bytes).map_err(|e| ResolveError::Query {
            server,
            source: e.into(),
        })
    }

    /// Lowest TTL in the answer, capped by configuration.
    fn answer_ttl(&self, records: &[Record]) -> Option<Duration> {
        let min = records.iter().map(|r| r.ttl).min()?;
        Some(Duration::from_secs(u64::from(min)).min(self.config.max_cache_ttl))
    }

    fn emit(&self, event: TraceEvent) {
        if self.trace {
            self.sink.event(&event);
        }
    }
}
