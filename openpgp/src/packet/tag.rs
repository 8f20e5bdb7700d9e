use std::cmp::Ordering;

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

code_points! {
    /// A packet tag, see [Section 4.3 of RFC 4880].
    ///
    /// Key servers store whatever they are sent, so every tag has a
    /// value, and converting to `u8` and back is lossless.  Tags order
    /// by that value, which is the first criterion of the canonical
    /// packet order.
    ///
    ///   [Section 4.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.3
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum Tag {
        /// Tag 0, which no packet may carry.
        Reserved = 0, "reserved tag";
        /// An encrypted session key for a public key.
        PKESK = 1, "PKESK";
        /// A signature.
        Signature = 2, "signature";
        /// A password-encrypted session key.
        SKESK = 3, "SKESK";
        /// Precedes signed data.
        OnePassSig = 4, "one-pass signature";
        /// A primary key with its secret parts.
        SecretKey = 5, "secret key";
        /// A primary key.
        PublicKey = 6, "public key";
        /// A subkey with its secret parts.
        SecretSubkey = 7, "secret subkey";
        /// Compressed data.
        CompressedData = 8, "compressed data";
        /// Encrypted data without integrity protection.
        SED = 9, "SED";
        /// The obsolete marker packet.
        Marker = 10, "marker";
        /// Literal data.
        Literal = 11, "literal data";
        /// Implementation-specific trust information.
        Trust = 12, "trust";
        /// A User ID.
        UserID = 13, "User ID";
        /// A subkey.
        PublicSubkey = 14, "public subkey";
        /// A User Attribute.
        UserAttribute = 17, "User Attribute";
        /// Integrity protected encrypted data.
        SEIP = 18, "SEIP";
        /// A modification detection code.
        MDC = 19, "MDC";
    }
    /// A tag from the experimental range 60 to 63.
    Private(60..=63) => "private packet {}";
    /// A tag not assigned by RFC 4880.
    Unknown(_) => "unknown packet {}";
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        u8::from(*self).cmp(&u8::from(*other))
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
impl Arbitrary for Tag {
    fn arbitrary(g: &mut Gen) -> Self {
        // New-format headers carry six bits of tag.
        (u8::arbitrary(g) & 0x3f).into()
    }
}
