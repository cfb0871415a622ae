//! DNS message parsing and construction.
//!
//! Queries are built without compression. Replies are untrusted input: every
//! read is bounds-checked and compression pointers are followed under a hop
//! ceiling, so malformed data yields a [`WireError`] instead of a panic.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{UnknownType, WireError};

pub const HEADER_LEN: usize = 12;

/// Largest reply read from a single datagram.
pub const MAX_MESSAGE_SIZE: usize = 1024;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// Pointer jumps allowed while decoding a single name.
const MAX_POINTER_HOPS: usize = 64;

const CLASS_IN: u16 = 1;

/// Standard query with recursion desired.
const FLAGS_STANDARD_QUERY: u16 = 0x0100;

/// A resource record type, shown as its mnemonic where one is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordType(pub u16);

impl RecordType {
    pub const A: Self = Self(1);
    pub const NS: Self = Self(2);
    pub const CNAME: Self = Self(5);
    pub const SOA: Self = Self(6);
    pub const MX: Self = Self(15);
    pub const TXT: Self = Self(16);
    pub const AAAA: Self = Self(28);

    fn mnemonic(self) -> Option<&'static str> {
        match self {
            Self::A => Some("A"),
            Self::NS => Some("NS"),
            Self::CNAME => Some("CNAME"),
            Self::SOA => Some("SOA"),
            Self::MX => Some("MX"),
            Self::TXT => Some("TXT"),
            Self::AAAA => Some("AAAA"),
            _ => None,
        }
    }

    /// Types whose record data is a single (possibly compressed) name.
    pub fn is_name_valued(self) -> bool {
        matches!(self, Self::NS | Self::CNAME)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(m) => f.write_str(m),
            None => write!(f, "TYPE{}", self.0),
        }
    }
}

impl FromStr for RecordType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let known = [
            Self::A,
            Self::NS,
            Self::CNAME,
            Self::SOA,
            Self::MX,
            Self::TXT,
            Self::AAAA,
        ];
        if let Some(t) = known.into_iter().find(|t| t.mnemonic() == Some(upper.as_str())) {
            return Ok(t);
        }
        upper
            .strip_prefix("TYPE")
            .and_then(|n| n.parse::<u16>().ok())
            .map(Self)
            .ok_or_else(|| UnknownType(s.to_string()))
    }
}

/// The fixed 12-byte message header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
}

impl Header {
    /// Encode the header in network byte order.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let fields = [
            self.id,
            self.flags,
            self.qd_count,
            self.an_count,
            self.ns_count,
            self.ar_count,
        ];
        for (chunk, field) in buf.chunks_exact_mut(2).zip(fields) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
        buf
    }

    /// Parse the header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < HEADER_LEN {
            return Err(WireError::ShortHeader { len: data.len() });
        }
        let field = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        Ok(Self {
            id: field(0),
            flags: field(2),
            qd_count: field(4),
            an_count: field(6),
            ns_count: field(8),
            ar_count: field(10),
        })
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: u16,
}

impl Question {
    fn parse(data: &[u8], offset: usize) -> Result<(Self, usize), WireError> {
        let (name, pos) = decode_name(data, offset)?;
        let tail = data
            .get(pos..pos + 4)
            .ok_or(WireError::TruncatedQuestion { offset: pos })?;
        let question = Self {
            name,
            qtype: RecordType(u16::from_be_bytes([tail[0], tail[1]])),
            qclass: u16::from_be_bytes([tail[2], tail[3]]),
        };
        Ok((question, pos + 4))
    }
}

/// A resource record.
///
/// `target` holds the decoded name for NS and CNAME records. It is decoded
/// against the whole message, since the record data may contain pointers
/// to anywhere earlier in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: RecordType,
    pub class: u16,
    pub ttl: u32,
    pub data: Vec<u8>,
    pub target: Option<String>,
}

impl Record {
    fn parse(data: &[u8], offset: usize) -> Result<(Self, usize), WireError> {
        let (name, pos) = decode_name(data, offset)?;
        let fixed = data
            .get(pos..pos + 10)
            .ok_or(WireError::TruncatedRecord { offset: pos })?;
        let rtype = RecordType(u16::from_be_bytes([fixed[0], fixed[1]]));
        let class = u16::from_be_bytes([fixed[2], fixed[3]]);
        let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]);

        let rdata_start = pos + 10;
        let rdata_end = rdata_start + rdlength as usize;
        let rdata = data
            .get(rdata_start..rdata_end)
            .ok_or(WireError::TruncatedRdata {
                offset: rdata_start,
                rdlength,
            })?;

        let target = if rtype.is_name_valued() {
            let (target, end) = decode_name(data, rdata_start)?;
            if end > rdata_end {
                return Err(WireError::TruncatedRdata {
                    offset: rdata_start,
                    rdlength,
                });
            }
            Some(target)
        } else {
            None
        };

        let record = Self {
            name,
            rtype,
            class,
            ttl,
            data: rdata.to_vec(),
            target,
        };
        Ok((record, rdata_end))
    }

    /// The address carried by an A record, if the data is well formed.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.rtype != RecordType::A {
            return None;
        }
        let octets: [u8; 4] = self.data.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    /// Human-readable rendering of the record data.
    pub fn display_data(&self) -> String {
        match self.rtype {
            RecordType::A => {
                if let Some(ip) = self.ipv4() {
                    return ip.to_string();
                }
            }
            RecordType::AAAA => {
                if let Ok(octets) = <[u8; 16]>::try_from(self.data.as_slice()) {
                    return Ipv6Addr::from(octets).to_string();
                }
            }
            _ => {
                if let Some(target) = self.target.as_deref().filter(|t| !t.is_empty()) {
                    return target.to_string();
                }
            }
        }
        format!("({} bytes)", self.data.len())
    }
}

/// A fully parsed DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub additional: Vec<Record>,
}

impl Message {
    /// Parse a complete message, walking every section with one cursor.
    ///
    /// Fails if any section holds fewer entries than the header declares.
    /// Bytes after the last declared record are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, WireError> {
        let header = Header::parse(data)?;
        let mut pos = HEADER_LEN;

        let mut questions = Vec::new();
        for _ in 0..header.qd_count {
            let (question, next) = Question::parse(data, pos)?;
            questions.push(question);
            pos = next;
        }

        let answers = parse_records(data, &mut pos, header.an_count)?;
        let authority = parse_records(data, &mut pos, header.ns_count)?;
        let additional = parse_records(data, &mut pos, header.ar_count)?;

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

fn parse_records(data: &[u8], pos: &mut usize, count: u16) -> Result<Vec<Record>, WireError> {
    let mut records = Vec::new();
    for _ in 0..count {
        let (record, next) = Record::parse(data, *pos)?;
        records.push(record);
        *pos = next;
    }
    Ok(records)
}

/// Encode a dotted name as uncompressed wire labels.
///
/// Empty labels are skipped, so `"example.com."` and `"example.com"`
/// encode identically.
pub fn encode_name(name: &str) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(name.len() + 2);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        if label.len() > MAX_LABEL_LEN {
            return Err(WireError::LabelTooLong { len: label.len() });
        }
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
    if buf.len() > MAX_NAME_LEN {
        return Err(WireError::NameTooLong { len: buf.len() });
    }
    Ok(buf)
}

/// Lowercase `name` and drop empty labels, so every spelling of the same
/// wire name maps to one string.
pub fn canonical_name(name: &str) -> String {
    name.split('.')
        .filter(|l| !l.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(".")
}

/// Decode a possibly compressed name starting at `offset`.
///
/// Returns the dotted name and the offset just past the name as it appears
/// at `offset`: past the terminator, or past the first pointer if one was
/// followed. Pointers must point strictly backwards and at most
/// [`MAX_POINTER_HOPS`] of them are followed.
pub fn decode_name(data: &[u8], offset: usize) -> Result<(String, usize), WireError> {
    let mut name = String::new();
    let mut pos = offset;
    let mut resume = None;
    let mut hops = 0;
    let mut wire_len = 1;

    loop {
        let len = *data.get(pos).ok_or(WireError::TruncatedName { offset: pos })?;
        match len & 0xC0 {
            0x00 if len == 0 => {
                return Ok((name, resume.unwrap_or(pos + 1)));
            }
            0x00 => {
                let start = pos + 1;
                let end = start + len as usize;
                let label = data
                    .get(start..end)
                    .ok_or(WireError::TruncatedName { offset: pos })?;
                wire_len += label.len() + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(WireError::NameTooLong { len: wire_len });
                }
                if !name.is_empty() {
                    name.push('.');
                }
                name.push_str(&String::from_utf8_lossy(label));
                pos = end;
            }
            0xC0 => {
                let low = *data
                    .get(pos + 1)
                    .ok_or(WireError::TruncatedName { offset: pos })?;
                let target = (((len & 0x3F) as usize) << 8) | low as usize;
                if target >= data.len() {
                    return Err(WireError::PointerOutOfRange { offset: pos, target });
                }
                if target >= pos {
                    return Err(WireError::ForwardPointer { offset: pos, target });
                }
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(WireError::TooManyHops {
                        limit: MAX_POINTER_HOPS,
                    });
                }
                resume.get_or_insert(pos + 2);
                pos = target;
            }
            _ => return Err(WireError::BadLabelType { offset: pos, byte: len }),
        }
    }
}

/// Build a single-question query with a random transaction id.
pub fn build_query(name: &str, qtype: RecordType) -> Result<Vec<u8>, WireError> {
    build_query_with_id(rand::random(), name, qtype)
}

/// Build a single-question query with the given transaction id.
pub fn build_query_with_id(id: u16, name: &str, qtype: RecordType) -> Result<Vec<u8>, WireError> {
    let header = Header {
        id,
        flags: FLAGS_STANDARD_QUERY,
        qd_count: 1,
        ..Header::default()
    };
    let qname = encode_name(name)?;

    let mut buf = Vec::with_capacity(HEADER_LEN + qname.len() + 4);
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(&qname);
    buf.extend_from_slice(&qtype.0.to_be_bytes());
    buf.extend_from_slice(&CLASS_IN.to_be_bytes());
    Ok(buf)
}
