//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.
//!
//! Everything here is fed bytes from a remote server, so every read
//! is bounds-checked and every failure is a typed `Error`.

use bytes::Bytes;
use std::fmt;

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// Parse a message.  The question and answer sections must be
    /// complete.  The authority and additional sections are parsed
    /// if possible, but a damaged record there just ends those
    /// sections early.
    ///
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let wire_header = WireHeader::deserialise(buffer)?;
        let mut questions = Vec::with_capacity(capacity_hint(
            wire_header.qdcount,
            buffer,
            QUESTION_MIN_LEN,
        ));
        let mut answers = Vec::with_capacity(capacity_hint(
            wire_header.ancount,
            buffer,
            RESOURCE_RECORD_MIN_LEN,
        ));
        let mut authority = Vec::new();
        let mut additional = Vec::new();

        for i in 0..wire_header.qdcount {
            if buffer.is_exhausted() {
                return Err(Error::CountMismatch {
                    section: Section::Question,
                    expected: wire_header.qdcount,
                    actual: i,
                });
            }
            questions.push(Question::deserialise(buffer)?);
        }
        for i in 0..wire_header.ancount {
            if buffer.is_exhausted() {
                return Err(Error::CountMismatch {
                    section: Section::Answer,
                    expected: wire_header.ancount,
                    actual: i,
                });
            }
            answers.push(ResourceRecord::deserialise(buffer)?);
        }

        if deserialise_records(buffer, wire_header.nscount, &mut authority).is_ok() {
            let _ = deserialise_records(buffer, wire_header.arcount, &mut additional);
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

/// Smallest encoding of a question: a root name, QTYPE, and QCLASS.
const QUESTION_MIN_LEN: usize = 5;

/// Smallest encoding of a resource record: a root name, TYPE, CLASS,
/// TTL, and RDLENGTH.
const RESOURCE_RECORD_MIN_LEN: usize = 11;

/// How many entries to allocate for up front.  The counts come from
/// the peer, so never more than the rest of the buffer could hold.
fn capacity_hint(count: u16, buffer: &ConsumableBuffer, min_len: usize) -> usize {
    usize::from(count).min(buffer.remaining() / min_len)
}

/// Parse up to `count` records, stopping at the first bad one.
fn deserialise_records(
    buffer: &mut ConsumableBuffer,
    count: u16,
    rrs: &mut Vec<ResourceRecord>,
) -> Result<(), Error> {
    for _ in 0..count {
        rrs.push(ResourceRecord::deserialise(buffer)?);
    }
    Ok(())
}

impl WireHeader {
    /// # Errors
    ///
    /// If the header is too short.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::HeaderTooShort)?;
        let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort)?;
        let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort)?;
        let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort)?;
        let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort)?;
        let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort)?;
        let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort)?;

        Ok(Self {
            header: Header {
                id,
                is_response: flags1 & HEADER_MASK_QR != 0,
                opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
                is_authoritative: flags1 & HEADER_MASK_AA != 0,
                is_truncated: flags1 & HEADER_MASK_TC != 0,
                recursion_desired: flags1 & HEADER_MASK_RD != 0,
                recursion_available: flags2 & HEADER_MASK_RA != 0,
                rcode: Rcode::from((flags2 & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE),
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(buffer)?;
        let qtype = buffer.next_u16().ok_or(Error::QuestionTooShort)?;
        let qclass = buffer.next_u16().ok_or(Error::QuestionTooShort)?;

        Ok(Self {
            name,
            qtype: QueryType::from(qtype),
            qclass: QueryClass::from(qclass),
        })
    }
}

impl ResourceRecord {
    /// Parse a record.  The RDATA is copied out of the buffer as-is:
    /// any domain names inside it are not expanded.
    ///
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(buffer)?;
        let rtype = buffer.next_u16().ok_or(Error::ResourceRecordTooShort)?;
        let rclass = buffer.next_u16().ok_or(Error::ResourceRecordTooShort)?;
        let ttl = buffer.next_u32().ok_or(Error::ResourceRecordTooShort)?;
        let rdlength = buffer.next_u16().ok_or(Error::ResourceRecordTooShort)?;
        let rdata = buffer
            .take(rdlength.into())
            .ok_or(Error::ResourceRecordTooShort)?;

        Ok(Self {
            name,
            rtype: RecordType::from(rtype),
            rclass: RecordClass::from(rclass),
            ttl,
            rdata: Bytes::copy_from_slice(rdata),
        })
    }
}

impl DomainName {
    /// Parse a possibly-compressed name.
    ///
    /// Pointers are followed in a loop, not by recursion.  Each
    /// pointer must point strictly before the start of the run of
    /// labels it ends (RFC 1035 section 4.1.4 says "a prior
    /// occurrence"), so offsets only ever decrease and a pointer can
    /// never reach itself or anything after it.  The number of hops
    /// is capped as well.
    ///
    /// # Errors
    ///
    /// If the domain cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let mut labels = Vec::<Label>::with_capacity(5);
        let mut len = 0;
        let mut pointers = 0;

        let mut cursor = buffer.at_offset(buffer.position);
        let mut run_start = cursor.position;
        let mut resume_at = None;

        loop {
            let size = cursor.next_u8().ok_or(Error::DomainTooShort)?;

            if size & LABEL_MASK_POINTER == LABEL_MASK_POINTER {
                let hi = size & !LABEL_MASK_POINTER;
                let lo = cursor.next_u8().ok_or(Error::DomainTooShort)?;
                let pointer = usize::from(u16::from_be_bytes([hi, lo]));

                if pointer >= run_start {
                    return Err(Error::DomainPointerInvalid { pointer });
                }

                pointers += 1;
                if pointers > DOMAINNAME_MAX_POINTERS {
                    return Err(Error::DomainPointerLimit);
                }

                // the name ends at the first pointer, as far as the
                // caller's buffer is concerned
                if resume_at.is_none() {
                    resume_at = Some(cursor.position);
                }

                cursor = buffer.at_offset(pointer);
                run_start = pointer;
            } else if usize::from(size) <= LABEL_MAX_LEN {
                len += 1 + usize::from(size);
                if len > DOMAINNAME_MAX_LEN {
                    return Err(Error::DomainTooLong);
                }

                if size == 0 {
                    labels.push(Label::new());
                    break;
                }

                let octets = cursor.take(size.into()).ok_or(Error::DomainTooShort)?;
                let label =
                    Label::try_from(octets).map_err(|_| Error::DomainLabelInvalid { octet: size })?;
                labels.push(label);
            } else {
                // 0b01 and 0b10 prefixes are reserved
                return Err(Error::DomainLabelInvalid { octet: size });
            }
        }

        buffer.position = resume_at.unwrap_or(cursor.position);

        Ok(DomainName { labels, len })
    }
}

/// Errors encountered when parsing a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The header is missing one or more required fields.
    HeaderTooShort,

    /// A question ends with an incomplete field.
    QuestionTooShort,

    /// A resource record ends with an incomplete field, or its RDATA
    /// is shorter than its RDLENGTH.
    ResourceRecordTooShort,

    /// A domain is incomplete.
    DomainTooShort,

    /// A domain is over 255 octets in size.
    DomainTooLong,

    /// A domain pointer points to or after the labels it ends.  This
    /// includes pointers beyond the end of the message.
    DomainPointerInvalid { pointer: usize },

    /// A domain followed too many pointers.
    DomainPointerLimit,

    /// A length octet is over 63, but is not a pointer.
    DomainLabelInvalid { octet: u8 },

    /// The message ended before all of the entries its header
    /// promised in a required section.
    CountMismatch {
        section: Section,
        expected: u16,
        actual: u16,
    },
}

impl Error {
    pub fn kind(self) -> ErrorKind {
        match self {
            Error::HeaderTooShort
            | Error::QuestionTooShort
            | Error::ResourceRecordTooShort
            | Error::DomainTooShort => ErrorKind::Truncated,
            Error::DomainPointerInvalid { .. } | Error::DomainPointerLimit => {
                ErrorKind::InvalidPointer
            }
            Error::CountMismatch { .. } => ErrorKind::CountMismatch,
            Error::DomainTooLong | Error::DomainLabelInvalid { .. } => ErrorKind::Malformed,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::HeaderTooShort => write!(f, "truncated message: header too short"),
            Error::QuestionTooShort => write!(f, "truncated message: question too short"),
            Error::ResourceRecordTooShort => {
                write!(f, "truncated message: resource record too short")
            }
            Error::DomainTooShort => write!(f, "truncated message: domain name too short"),
            Error::DomainTooLong => write!(f, "domain name over {DOMAINNAME_MAX_LEN} octets"),
            Error::DomainPointerInvalid { pointer } => {
                write!(f, "invalid domain name pointer to offset {pointer}")
            }
            Error::DomainPointerLimit => write!(
                f,
                "domain name follows over {DOMAINNAME_MAX_POINTERS} pointers"
            ),
            Error::DomainLabelInvalid { octet } => {
                write!(f, "invalid domain label length octet {octet:#04x}")
            }
            Error::CountMismatch {
                section,
                expected,
                actual,
            } => write!(
                f,
                "count mismatch: header declares {expected} {section} entries but message has {actual}"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Broad categories of `Error`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Truncated,
    InvalidPointer,
    CountMismatch,
    Malformed,
}

/// A section of a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Section {
    Question,
    Answer,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Section::Question => write!(f, "question"),
            Section::Answer => write!(f, "answer"),
        }
    }
}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    /// Number of octets not yet consumed.
    pub fn remaining(&self) -> usize {
        self.octets.len().saturating_sub(self.position)
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.octets.len()
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        let octet = *self.octets.get(self.position)?;
        self.position += 1;
        Some(octet)
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        let octets = self.take(2)?;
        Some(u16::from_be_bytes([octets[0], octets[1]]))
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let octets = self.take(4)?;
        Some(u32::from_be_bytes([
            octets[0], octets[1], octets[2], octets[3],
        ]))
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(size)?;
        let slice = self.octets.get(self.position..end)?;
        self.position = end;
        Some(slice)
    }

    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}
