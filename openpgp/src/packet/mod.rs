//! Packet-related types.
//!
//! The key server treats every packet first as an [`OpaquePacket`],
//! a `(tag, contents)` pair, and only interprets the few packet types
//! the key grammar needs: keys, signatures, User IDs and User
//! Attributes.
//!
//! See [Section 4 of RFC 4880] for more details.
//!
//!   [`OpaquePacket`]: struct.OpaquePacket.html
//!   [Section 4 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

use sha1::{Digest, Sha1};

mod tag;
pub use self::tag::Tag;
pub mod header;
pub use self::header::Header;

pub mod key;
pub mod signature;
pub mod user_attribute;

/// An uninterpreted OpenPGP packet.
///
/// Holds the packet's tag and its body, without the header.  Two
/// opaque packets are equal if and only if their canonical encodings
/// are byte-identical.
///
/// Opaque packets are ordered canonically: first by tag, then by the
/// length of the contents, and finally by the contents themselves.
/// Sorting a list of packets therefore produces the layout the SKS
/// digest is computed over.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpaquePacket {
    tag: Tag,
    contents: Vec<u8>,
}

impl fmt::Debug for OpaquePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let threshold = 16;
        let prefix = &self.contents[..std::cmp::min(threshold,
                                                    self.contents.len())];
        let mut prefix_fmt = hex::encode(prefix);
        if self.contents.len() > threshold {
            prefix_fmt.push_str("...");
        }
        prefix_fmt.push_str(&format!(" ({} bytes)", self.contents.len()));

        f.debug_struct("OpaquePacket")
            .field("tag", &self.tag)
            .field("contents", &prefix_fmt)
            .finish()
    }
}

impl Ord for OpaquePacket {
    fn cmp(&self, other: &OpaquePacket) -> Ordering {
        self.tag.cmp(&other.tag)
            .then_with(|| self.contents.len().cmp(&other.contents.len()))
            .then_with(|| self.contents.cmp(&other.contents))
    }
}

impl PartialOrd for OpaquePacket {
    fn partial_cmp(&self, other: &OpaquePacket) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl OpaquePacket {
    /// Returns a new opaque packet.
    pub fn new(tag: Tag, contents: Vec<u8>) -> Self {
        OpaquePacket { tag, contents }
    }

    /// Gets the packet's tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Gets the packet's body.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Returns the packet's body, consuming the packet.
    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }

    /// Returns the body length as it is written in the header.
    pub(crate) fn length(&self) -> u32 {
        u32::try_from(self.contents.len()).unwrap_or(std::u32::MAX)
    }

    /// Returns the canonical header: new format, shortest length.
    pub(crate) fn canonical_header(&self) -> Vec<u8> {
        Header::canonical(self.tag, self.length())
    }

    /// Computes the packet's uuid.
    ///
    /// The uuid is the lower case hex SHA-1 digest of the packet's
    /// canonical encoding.  It depends only on the packet's bytes,
    /// not on where the packet was found.
    pub fn uuid(&self) -> String {
        let mut h = Sha1::new();
        h.update(&self.canonical_header());
        h.update(&self.contents);
        hex::encode(h.finalize())
    }
}

/// Fields shared by all nodes of a key tree.
#[derive(Clone, PartialEq, Eq)]
pub struct Common {
    packet: OpaquePacket,
    uuid: String,
    count: usize,
}

impl fmt::Debug for Common {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Common")
            .field("uuid", &self.uuid)
            .field("tag", &self.packet.tag())
            .field("count", &self.count)
            .finish()
    }
}

impl From<OpaquePacket> for Common {
    fn from(packet: OpaquePacket) -> Self {
        let uuid = packet.uuid();
        Common { packet, uuid, count: 0 }
    }
}

impl Common {
    /// Returns the node's packet.
    pub fn packet(&self) -> &OpaquePacket {
        &self.packet
    }

    /// Returns the node's packet tag.
    pub fn tag(&self) -> Tag {
        self.packet.tag()
    }

    /// Returns the node's uuid, see [`OpaquePacket::uuid`].
    ///
    ///   [`OpaquePacket::uuid`]: struct.OpaquePacket.html#method.uuid
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns how many extra copies of this packet were collapsed
    /// into this node when collecting duplicates.
    pub fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn add_count(&mut self, n: usize) {
        self.count = self.count.saturating_add(n);
    }

    pub(crate) fn reset_count(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};

    impl Arbitrary for OpaquePacket {
        fn arbitrary(g: &mut Gen) -> Self {
            OpaquePacket::new(Tag::arbitrary(g), Vec::<u8>::arbitrary(g))
        }
    }

    #[test]
    fn canonical_order() {
        let a = OpaquePacket::new(Tag::Signature, vec![9, 9]);
        let b = OpaquePacket::new(Tag::Signature, vec![1, 2, 3]);
        let c = OpaquePacket::new(Tag::Signature, vec![1, 2, 4]);
        let d = OpaquePacket::new(Tag::PublicKey, vec![]);
        let mut v = vec![d.clone(), c.clone(), b.clone(), a.clone()];
        v.sort();
        assert_eq!(v, vec![a, b, c, d]);
    }

    #[test]
    fn uuid() {
        // SHA-1 of c2 00, an empty signature packet.
        let p = OpaquePacket::new(Tag::Signature, vec![]);
        let mut h = Sha1::new();
        h.update(&[0xc2u8, 0x00]);
        assert_eq!(p.uuid(), hex::encode(h.finalize()));
        assert_eq!(p.uuid().len(), 40);
        assert_eq!(Common::from(p.clone()).uuid(), p.uuid());
    }

    quickcheck! {
        fn uuid_depends_on_bytes(a: OpaquePacket, b: OpaquePacket) -> bool {
            (a.uuid() == b.uuid()) == (a == b)
        }
    }

    quickcheck! {
        fn order_is_total(a: OpaquePacket, b: OpaquePacket) -> bool {
            (a.cmp(&b) == Ordering::Equal) == (a == b)
                && a.cmp(&b) == b.cmp(&a).reverse()
        }
    }

    #[test]
    fn counts() {
        let mut c = Common::from(OpaquePacket::new(Tag::UserID, b"x".to_vec()));
        assert_eq!(c.count(), 0);
        c.add_count(2);
        c.add_count(1);
        assert_eq!(c.count(), 3);
        c.reset_count();
        assert_eq!(c.count(), 0);
    }
}
