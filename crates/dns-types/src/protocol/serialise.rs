//! Serialisation of DNS messages to the wire format.  See the `types`
//! module for details of the format.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn to_octets(&self) -> Result<BytesMut, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let qdcount = usize_to_u16(self.questions.len())?;
        let ancount = usize_to_u16(self.answers.len())?;
        let nscount = usize_to_u16(self.authority.len())?;
        let arcount = usize_to_u16(self.additional.len())?;

        self.header.serialise(buffer);
        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);

        for question in &self.questions {
            question.serialise(buffer)?;
        }
        for rr in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            rr.serialise(buffer)?;
        }

        Ok(())
    }
}

impl Header {
    /// Writes the ID and the two flag octets.  The Z bits are always
    /// zero.
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        // octet 1
        let flag_qr = if self.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(self.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if self.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if self.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if self.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        // octet 2
        let flag_ra = if self.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let field_rcode = HEADER_MASK_RCODE & (u8::from(self.rcode) << HEADER_OFFSET_RCODE);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd);
        buffer.write_u8(flag_ra | field_rcode);
    }
}

impl Question {
    /// # Errors
    ///
    /// If the name is too long.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        self.name.serialise(buffer, true)?;
        buffer.write_u16(self.qtype.into());
        buffer.write_u16(self.qclass.into());
        Ok(())
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the name or the RDATA is too long.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let rdlength = usize_to_u16(self.rdata.len())?;

        self.name.serialise(buffer, true)?;
        buffer.write_u16(self.rtype.into());
        buffer.write_u16(self.rclass.into());
        buffer.write_u32(self.ttl);
        buffer.write_u16(rdlength);
        buffer.write_octets(&self.rdata);

        Ok(())
    }
}

impl DomainName {
    /// Write the name as a sequence of length-prefixed labels.  If
    /// `compress` is set and the same name has already been written to
    /// this buffer, a pointer to it is written instead.
    ///
    /// # Errors
    ///
    /// If the name is over 255 octets.  `DomainName`'s fields are
    /// public, so this is checked again here.
    pub fn serialise(&self, buffer: &mut WritableBuffer, compress: bool) -> Result<(), Error> {
        let len = self.labels.len()
            + self
                .labels
                .iter()
                .map(|label| usize::from(label.len()))
                .sum::<usize>();
        if len > DOMAINNAME_MAX_LEN {
            return Err(Error::DomainTooLong { len });
        }

        if compress {
            if let Some(ptr) = buffer.name_pointer(self) {
                buffer.write_u16(ptr);
                return Ok(());
            }
        }

        buffer.memoise_name(self);
        for label in &self.labels {
            buffer.write_u8(label.len());
            buffer.write_octets(label.octets());
        }

        Ok(())
    }
}

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A counter does not fit in the desired width.
    CounterTooLarge { counter: usize, bits: u32 },

    /// A domain name is over 255 octets.
    DomainTooLong { len: usize },

    /// A domain name given as text could not be turned into labels.
    InvalidName(DomainNameFromStr),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CounterTooLarge { counter, bits } => {
                write!(f, "'{counter}' cannot be converted to a u{bits}")
            }
            Error::DomainTooLong { len } => write!(
                f,
                "domain name is {len} octets long (maximum {DOMAINNAME_MAX_LEN})"
            ),
            Error::InvalidName(err) => write!(f, "invalid domain name: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidName(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomainNameFromStr> for Error {
    fn from(err: DomainNameFromStr) -> Self {
        Error::InvalidName(err)
    }
}

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: BytesMut,
    name_pointers: HashMap<DomainName, u16>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: BytesMut::with_capacity(512),
            name_pointers: HashMap::new(),
        }
    }
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    /// Remember where this name starts, so later occurrences can point
    /// at it.  Offsets beyond the 14 bits a pointer can hold are not
    /// remembered.
    pub fn memoise_name(&mut self, name: &DomainName) {
        if !name.is_root() && !self.name_pointers.contains_key(name) {
            if let Ok(index) = u16::try_from(self.index()) {
                if index <= 0b0011_1111_1111_1111 {
                    let [hi, lo] = index.to_be_bytes();
                    self.name_pointers
                        .insert(name.clone(), u16::from_be_bytes([hi | LABEL_MASK_POINTER, lo]));
                }
            }
        }
    }

    pub fn name_pointer(&self, name: &DomainName) -> Option<u16> {
        self.name_pointers.get(name).copied()
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.put_u8(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.octets.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.octets.put_u32(value);
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.put_slice(octets);
    }
}

/// Helper function to convert a `usize` into a `u16` (or return an error).
///
/// # Errors
///
/// If the value cannot be converted.
fn usize_to_u16(counter: usize) -> Result<u16, Error> {
    if let Ok(t) = u16::try_from(counter) {
        Ok(t)
    } else {
        Err(Error::CounterTooLarge {
            counter,
            bits: u16::BITS,
        })
    }
}
