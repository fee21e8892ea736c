//! Interpretation of RDATA.  The codec keeps RDATA as opaque octets;
//! this module turns the octets of the record types it understands
//! into typed values, and leaves everything else opaque.

use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::protocol::types::*;

/// RDATA, interpreted according to its record type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RecordData {
    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// Where `ADDRESS` is a 32 bit Internet address.
    A { address: Ipv4Addr },

    /// Where `ADDRESS` is a 128 bit Internet address (RFC 3596).
    AAAA { address: Ipv6Addr },

    /// Any other record.
    Opaque { rtype: RecordType, octets: Bytes },
}

impl RecordData {
    /// # Errors
    ///
    /// If the record is of a known fixed-size type but the RDATA is
    /// the wrong size.
    pub fn interpret(rtype: RecordType, rdata: &Bytes) -> Result<Self, RdataError> {
        match rtype {
            RecordType::A => {
                let octets: [u8; 4] = rdata[..]
                    .try_into()
                    .map_err(|_| RdataError::wrong_length(rtype, 4, rdata))?;
                Ok(RecordData::A {
                    address: Ipv4Addr::from(octets),
                })
            }
            RecordType::AAAA => {
                let octets: [u8; 16] = rdata[..]
                    .try_into()
                    .map_err(|_| RdataError::wrong_length(rtype, 16, rdata))?;
                Ok(RecordData::AAAA {
                    address: Ipv6Addr::from(octets),
                })
            }
            _ => Ok(RecordData::Opaque {
                rtype,
                octets: rdata.clone(),
            }),
        }
    }

    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::AAAA { .. } => RecordType::AAAA,
            RecordData::Opaque { rtype, .. } => *rtype,
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordData::A { address } => write!(f, "{address}"),
            RecordData::AAAA { address } => write!(f, "{address}"),
            RecordData::Opaque { octets, .. } => write!(f, "{}", escape_octets(octets)),
        }
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// See `RecordData::interpret`.
    pub fn data(&self) -> Result<RecordData, RdataError> {
        RecordData::interpret(self.rtype, &self.rdata)
    }
}

/// The record holding the address, going by the order servers
/// usually send answers in: any CNAME chain first, then the records
/// for the final name.  So this is just the last record.
///
/// This is a heuristic.  Nothing requires a server to order its
/// answers this way, and the last record need not be an address
/// record at all.
pub fn last_record(rrs: &[ResourceRecord]) -> Option<&ResourceRecord> {
    rrs.last()
}

/// Errors that can arise when interpreting RDATA.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RdataError {
    WrongLength {
        rtype: RecordType,
        expected: usize,
        actual: usize,
    },
}

impl RdataError {
    fn wrong_length(rtype: RecordType, expected: usize, rdata: &Bytes) -> Self {
        RdataError::WrongLength {
            rtype,
            expected,
            actual: rdata.len(),
        }
    }
}

impl fmt::Display for RdataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RdataError::WrongLength {
                rtype,
                expected,
                actual,
            } => write!(
                f,
                "{rtype} RDATA must be {expected} octets, got {actual}"
            ),
        }
    }
}

impl std::error::Error for RdataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Render octets as a quoted string, escaping anything which is not
/// printable ASCII as `\DDD`.
fn escape_octets(octets: &[u8]) -> String {
    let mut out = String::with_capacity(2 + octets.len());

    out.push('"');
    for octet in octets {
        if *octet == b'"' || *octet == b'\\' {
            out.push('\\');
            out.push(*octet as char);
        } else if *octet < 32 || *octet > 126 {
            out.push('\\');
            out.push_str(&format!("{octet:03}"));
        } else {
            out.push(*octet as char);
        }
    }
    out.push('"');

    out
}
