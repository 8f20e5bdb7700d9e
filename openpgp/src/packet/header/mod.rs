//! OpenPGP packet headers.
//!
//! See [Section 4.2 of RFC 4880] for more details.
//!
//!   [Section 4.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2

use std::io;

use buffered_reader::BufferedReader;

use crate::{
    Error,
    Result,
};
use crate::packet::Tag;

const TRACE : bool = false;

/// The size of the largest packet the reader accepts by default.
///
/// Key packets may be up to 1 MiB; signatures are bounded by two
/// 64 KiB subpacket areas plus the MPIs.
pub const DEFAULT_MAX_PACKET_LENGTH: u32 = 1024 * 1024 + 64 * 1024;

/// The size of a packet's body.
///
/// See [Section 4.2.2 of RFC 4880].
///
///   [Section 4.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    /// The packet's size is known.
    Full(u32),
    /// The packet's body is chunked; this is the size of the first
    /// chunk.  Only valid for new-format packets.
    Partial(u32),
    /// The packet extends until the end of the stream.  Only valid
    /// for old-format packets.
    Indeterminate,
}

/// How an old-format CTB encodes the packet's length.
///
/// See [Section 4.2.1 of RFC 4880].
///
///   [Section 4.2.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLengthType {
    /// A one-octet length follows.
    OneOctet,
    /// A two-octet length follows.
    TwoOctets,
    /// A four-octet length follows.
    FourOctets,
    /// The packet extends until the end of the stream.
    Indeterminate,
}

impl From<u8> for PacketLengthType {
    fn from(u: u8) -> Self {
        match u & 0b11 {
            0 => PacketLengthType::OneOctet,
            1 => PacketLengthType::TwoOctets,
            2 => PacketLengthType::FourOctets,
            _ => PacketLengthType::Indeterminate,
        }
    }
}

/// The Cipher Type Byte, the first octet of every packet.
///
/// OpenPGP defines two packet formats: the old and the new format.
/// They both include the packet's so-called tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CTB {
    /// A new-format CTB.
    New {
        /// The packet's tag.
        tag: Tag,
    },
    /// An old-format CTB.
    Old {
        /// The packet's tag.
        tag: Tag,
        /// How the length is encoded.
        length_type: PacketLengthType,
    },
}

impl CTB {
    /// Decodes a CTB.
    ///
    /// Fails if the most significant bit is not set, which is the
    /// usual sign of a stream that is not OpenPGP at all.
    pub fn from_ptag(ptag: u8) -> Result<CTB> {
        if ptag & 0b1000_0000 == 0 {
            return Err(Error::MalformedPacketStream(
                format!("Malformed CTB: MSB of ptag ({:#010b}) not set",
                        ptag)).into());
        }

        if ptag & 0b0100_0000 != 0 {
            Ok(CTB::New { tag: (ptag & 0b0011_1111).into() })
        } else {
            Ok(CTB::Old {
                tag: ((ptag & 0b0011_1100) >> 2).into(),
                length_type: ptag.into(),
            })
        }
    }

    /// Returns the packet's tag.
    pub fn tag(&self) -> Tag {
        match self {
            CTB::New { tag } => *tag,
            CTB::Old { tag, .. } => *tag,
        }
    }
}

/// An OpenPGP packet's header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// The packet's CTB.
    ctb: CTB,
    /// The packet's length.
    length: BodyLength,
}

impl Header {
    /// Creates a new header.
    pub fn new(ctb: CTB, length: BodyLength) -> Self {
        Header { ctb, length }
    }

    /// Returns the packet's CTB.
    pub fn ctb(&self) -> &CTB {
        &self.ctb
    }

    /// Returns the packet's length.
    pub fn length(&self) -> &BodyLength {
        &self.length
    }

    /// Parses an OpenPGP packet's header.
    pub(crate) fn parse<R>(bio: &mut R) -> Result<Header>
        where R: BufferedReader<()> + ?Sized
    {
        tracer!(TRACE, "Header::parse", 0);
        let ptag = bio.data_consume_hard(1).map_err(truncated)?[0];
        let ctb = CTB::from_ptag(ptag)?;
        let length = match ctb {
            CTB::New { .. } => BodyLength::parse_new_format(bio)?,
            CTB::Old { length_type, .. } =>
                BodyLength::parse_old_format(bio, length_type)?,
        };
        t!("{:?}, {:?}", ctb, length);
        Ok(Header::new(ctb, length))
    }

    /// Checks the header against a maximum body size.
    ///
    /// Reserved tags are never valid, and neither are partial body
    /// chunks or definite lengths larger than `max_length`.  The
    /// content of the packet is not looked at.
    pub fn valid(&self, max_length: u32) -> Result<()> {
        let tag = self.ctb.tag();
        if tag == Tag::Reserved {
            return Err(Error::MalformedPacketStream(
                "Packet with reserved tag 0".into()).into());
        }

        match self.length {
            BodyLength::Full(l) | BodyLength::Partial(l) if l > max_length =>
                Err(Error::MalformedPacketStream(
                    format!("{} of {} bytes exceeds the limit of {} bytes",
                            tag, l, max_length)).into()),
            _ => Ok(()),
        }
    }

    /// Returns the new-format header for a packet with the given tag
    /// and body size.
    ///
    /// This is the canonical encoding used for uuids and when
    /// re-serializing packets.  Tags above 63 cannot be expressed and
    /// are truncated to their low six bits.
    pub fn canonical(tag: Tag, len: u32) -> Vec<u8> {
        let tag: u8 = tag.into();
        let mut header = Vec::with_capacity(6);
        header.push(0b1100_0000u8 | (tag & 0b0011_1111));
        full_length_octets(len, &mut header);
        header
    }
}

// Appends the shortest new-format encoding of a definite length.
fn full_length_octets(l: u32, o: &mut Vec<u8>) {
    if l <= 191 {
        o.push(l as u8);
    } else if l <= 8383 {
        let v = l - 192;
        o.push((v >> 8) as u8 + 192);
        o.push((v & 0xff) as u8);
    } else {
        o.push(0xff);
        o.extend_from_slice(&l.to_be_bytes());
    }
}

fn truncated(e: io::Error) -> anyhow::Error {
    Error::MalformedPacketStream(format!("Truncated packet header: {}", e))
        .into()
}

impl BodyLength {
    /// Decodes a new format body length as described in [Section
    /// 4.2.2 of RFC 4880].
    ///
    ///   [Section 4.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.2
    pub(crate) fn parse_new_format<R>(bio: &mut R) -> Result<BodyLength>
        where R: BufferedReader<()> + ?Sized
    {
        let octet1 : u8 = bio.data_consume_hard(1).map_err(truncated)?[0];
        match octet1 {
            0..=191 => // One octet.
                Ok(BodyLength::Full(octet1 as u32)),
            192..=223 => { // Two octets length.
                let octet2 = bio.data_consume_hard(1).map_err(truncated)?[0];
                Ok(BodyLength::Full(((octet1 as u32 - 192) << 8)
                                    + octet2 as u32 + 192))
            },
            224..=254 => // Partial body length.
                Ok(BodyLength::Partial(1 << (octet1 & 0x1F))),
            255 => // Five octets.
                Ok(BodyLength::Full(bio.read_be_u32().map_err(truncated)?)),
        }
    }

    /// Decodes an old format body length as described in [Section
    /// 4.2.1 of RFC 4880].
    ///
    ///   [Section 4.2.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.1
    pub(crate) fn parse_old_format<R>(bio: &mut R,
                                      length_type: PacketLengthType)
                                      -> Result<BodyLength>
        where R: BufferedReader<()> + ?Sized
    {
        match length_type {
            PacketLengthType::OneOctet =>
                Ok(BodyLength::Full(
                    bio.data_consume_hard(1).map_err(truncated)?[0] as u32)),
            PacketLengthType::TwoOctets =>
                Ok(BodyLength::Full(
                    bio.read_be_u16().map_err(truncated)? as u32)),
            PacketLengthType::FourOctets =>
                Ok(BodyLength::Full(bio.read_be_u32().map_err(truncated)?)),
            PacketLengthType::Indeterminate =>
                Ok(BodyLength::Indeterminate),
        }
    }

    /// Emits the length encoded for use with new-style CTBs.
    ///
    /// Uses the shortest encoding.  Partial and indeterminate lengths
    /// have no canonical form and are rejected.
    pub fn serialize<W: io::Write>(&self, o: &mut W) -> Result<()> {
        match *self {
            BodyLength::Full(l) => {
                let mut buf = Vec::with_capacity(5);
                full_length_octets(l, &mut buf);
                o.write_all(&buf)?;
            }
            BodyLength::Partial(_) | BodyLength::Indeterminate =>
                return Err(Error::InvalidArgument(
                    format!("{:?} has no canonical encoding", self)).into()),
        }
        Ok(())
    }
}
