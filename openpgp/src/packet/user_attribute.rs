//! User Attribute subpackets.
//!
//! See [Section 5.12 of RFC 4880] for details.
//!
//!   [Section 5.12 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.12

use crate::{
    Error,
    Result,
};
use crate::packet::signature::subpacket_length;

/// A decoded User Attribute subpacket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Subpacket {
    /// An image, see [Section 5.12.1 of RFC 4880].
    ///
    ///   [Section 5.12.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.12.1
    Image(Image),
    /// Any other subpacket type, with its body.
    Unknown(u8, Box<[u8]>),
}

/// An embedded image, keyed by its encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Image {
    /// JFIF-encoded JPEG.
    JPEG(Box<[u8]>),
    /// An encoding from the experimental range 100 to 110.
    Private(u8, Box<[u8]>),
    /// Any other encoding.
    Unknown(u8, Box<[u8]>),
}

// Little-endian header length (16), header version (1).
const IMAGE_HEADER_PREFIX: [u8; 3] = [0x10, 0x00, 0x01];
const IMAGE_HEADER_LEN: usize = 16;

impl Image {
    /// Returns the image data, without the image header.
    pub fn data(&self) -> &[u8] {
        match self {
            Image::JPEG(d) | Image::Private(_, d) | Image::Unknown(_, d) => d,
        }
    }

    fn from_subpacket(body: &[u8]) -> Result<Self> {
        if body.len() < IMAGE_HEADER_LEN
            || body[..3] != IMAGE_HEADER_PREFIX
            || body[4..IMAGE_HEADER_LEN].iter().any(|&b| b != 0)
        {
            return Err(Error::MalformedPacket(
                "Malformed image subpacket".into()).into());
        }

        let data: Box<[u8]> = body[IMAGE_HEADER_LEN..].into();
        Ok(match body[3] {
            1 => Image::JPEG(data),
            n @ 100..=110 => Image::Private(n, data),
            n => Image::Unknown(n, data),
        })
    }
}

/// Iterates over the subpackets of a User Attribute packet's body.
pub struct SubpacketIterator<'a> {
    reader: buffered_reader::Memory<'a, ()>,
}

impl<'a> SubpacketIterator<'a> {
    /// Returns an iterator over the subpackets in `body`.
    pub fn new(body: &'a [u8]) -> Self {
        SubpacketIterator {
            reader: buffered_reader::Memory::new(body),
        }
    }

    fn read_subpacket(&mut self) -> Result<Subpacket> {
        use buffered_reader::BufferedReader;

        let length = subpacket_length(&mut self.reader)
            .map_err(|e| Error::MalformedPacket(
                format!("Truncated subpacket length: {}", e)))? as usize;
        let raw = self.reader.data_consume_hard(length)
            .map_err(|e| Error::MalformedPacket(
                format!("Truncated subpacket: {}", e)))?;

        match raw[..length].split_first() {
            Some((&1, body)) => Ok(Subpacket::Image(Image::from_subpacket(body)?)),
            Some((&typ, body)) => Ok(Subpacket::Unknown(typ, body.into())),
            None => Err(Error::MalformedPacket(
                "Subpacket without type octet".into()).into()),
        }
    }
}

impl<'a> Iterator for SubpacketIterator<'a> {
    type Item = Result<Subpacket>;

    fn next(&mut self) -> Option<Self::Item> {
        use buffered_reader::BufferedReader;

        match self.reader.data(1) {
            Ok(d) if d.is_empty() => None,
            Ok(_) => Some(self.read_subpacket()),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Returns the images embedded in a User Attribute packet's body.
///
/// Fails if any subpacket is malformed.
pub fn images(body: &[u8]) -> Result<Vec<Image>> {
    SubpacketIterator::new(body)
        .filter_map(|sp| match sp {
            Ok(Subpacket::Image(image)) => Some(Ok(image)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}
