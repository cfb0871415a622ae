#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rootwalk::dns::{Header, Message, encode_name};
use rootwalk::error::TransportError;
use rootwalk::transport::Transport;
use rootwalk::{RecordType, TraceEvent, TraceSink};

type Handler = dyn Fn(Ipv4Addr, &str, RecordType, &[u8]) -> Option<Vec<u8>> + Send + Sync;

/// In-memory transport answering from a closure and logging every query.
///
/// A `None` from the handler is reported as a timeout.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    log: Mutex<Vec<(Ipv4Addr, String, RecordType)>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Ipv4Addr, &str, RecordType, &[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<(Ipv4Addr, String, RecordType)> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        server: Ipv4Addr,
        query: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let parsed = Message::parse(query).expect("resolver sent a malformed query");
        let q = &parsed.questions[0];
        self.log
            .lock()
            .unwrap()
            .push((server, q.name.clone(), q.qtype));
        (self.handler)(server, &q.name, q.qtype, query).ok_or(TransportError::Timeout(timeout))
    }
}

/// Collects trace events for later inspection.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<TraceEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TraceSink for Recorder {
    fn event(&self, event: &TraceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Builds a reply to a query. Owners equal to the question name are
/// written as a pointer to offset 12.
pub struct ReplyBuilder {
    id: u16,
    qname: String,
    question: Vec<u8>,
    answers: Vec<Vec<u8>>,
    authority: Vec<Vec<u8>>,
    additional: Vec<Vec<u8>>,
}

impl ReplyBuilder {
    pub fn to(query: &[u8]) -> Self {
        let parsed = Message::parse(query).unwrap();
        Self {
            id: parsed.header.id,
            qname: parsed.questions[0].name.clone(),
            question: query[12..].to_vec(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    fn rr(&self, name: &str, rtype: RecordType, ttl: u32, rdata: &[u8]) -> Vec<u8> {
        let mut rr = if name == self.qname {
            vec![0xC0, 0x0C]
        } else {
            encode_name(name).unwrap()
        };
        rr.extend_from_slice(&rtype.0.to_be_bytes());
        rr.extend_from_slice(&1u16.to_be_bytes());
        rr.extend_from_slice(&ttl.to_be_bytes());
        rr.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        rr.extend_from_slice(rdata);
        rr
    }

    pub fn a(mut self, name: &str, ip: [u8; 4], ttl: u32) -> Self {
        let rr = self.rr(name, RecordType::A, ttl, &ip);
        self.answers.push(rr);
        self
    }

    pub fn cname(mut self, name: &str, target: &str, ttl: u32) -> Self {
        let rr = self.rr(name, RecordType::CNAME, ttl, &encode_name(target).unwrap());
        self.answers.push(rr);
        self
    }

    pub fn ns(mut self, zone: &str, nameserver: &str) -> Self {
        let rr = self.rr(zone, RecordType::NS, 172800, &encode_name(nameserver).unwrap());
        self.authority.push(rr);
        self
    }

    pub fn glue(mut self, nameserver: &str, ip: [u8; 4]) -> Self {
        let rr = self.rr(nameserver, RecordType::A, 172800, &ip);
        self.additional.push(rr);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let header = Header {
            id: self.id,
            flags: 0x8000,
            qd_count: 1,
            an_count: self.answers.len() as u16,
            ns_count: self.authority.len() as u16,
            ar_count: self.additional.len() as u16,
        };
        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(&self.question);
        for rr in self.answers.iter().chain(&self.authority).chain(&self.additional) {
            out.extend_from_slice(rr);
        }
        out
    }
}
