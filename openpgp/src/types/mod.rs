//! Primitive types.
//!
//! This module provides the enumerations and time types the key
//! tree is described in.

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

mod timestamp;
pub use timestamp::{Timestamp, Duration};

code_points! {
    /// A public key algorithm, see [Section 9.1 of RFC 4880] and
    /// [Section 5 of RFC 6637].
    ///
    /// Only version 3 keys make the key server look at this: their
    /// Key ID is taken from the RSA modulus.
    ///
    ///   [Section 9.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-9.1
    ///   [Section 5 of RFC 6637]: https://tools.ietf.org/html/rfc6637
    #[non_exhaustive]
    #[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
    pub enum PublicKeyAlgorithm {
        /// RSA, usable for both encryption and signing.
        RSAEncryptSign = 1, "RSA";
        /// Deprecated encryption-only RSA.
        RSAEncrypt = 2, "RSA (encryption only)";
        /// Deprecated signing-only RSA.
        RSASign = 3, "RSA (signing only)";
        /// Encryption-only ElGamal.
        ElGamalEncrypt = 16, "ElGamal";
        /// The Digital Signature Algorithm.
        DSA = 17, "DSA";
        /// Elliptic curve Diffie-Hellman.
        ECDH = 18, "ECDH";
        /// Elliptic curve DSA.
        ECDSA = 19, "ECDSA";
        /// ElGamal for signing; no longer allowed.
        ElGamalEncryptSign = 20, "ElGamal (sign)";
        /// Edwards curve DSA.
        EdDSA = 22, "EdDSA";
    }
    /// One of the identifiers reserved for experiments.
    Private(100..=110) => "private algorithm {}";
    /// An identifier this crate does not know.
    Unknown(_) => "algorithm {}";
}

impl PublicKeyAlgorithm {
    /// Returns whether this is one of the RSA variants.
    pub fn is_rsa(&self) -> bool {
        use self::PublicKeyAlgorithm::*;
        matches!(self, RSAEncryptSign | RSAEncrypt | RSASign)
    }
}

code_points! {
    /// What a signature is about, see [Section 5.2.1 of RFC 4880].
    ///
    /// The tree builder uses this to decide which component a
    /// signature belongs to, and the resolver to tell bindings from
    /// revocations.
    ///
    ///   [Section 5.2.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.1
    #[non_exhaustive]
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub enum SignatureType {
        /// Over a binary document.
        Binary = 0x00, "binary document";
        /// Over a canonicalized text document.
        Text = 0x01, "text document";
        /// Over its own subpackets only.
        Standalone = 0x02, "standalone";

        /// Certifies a User ID without saying how it was checked.
        GenericCertification = 0x10, "generic certification";
        /// Certifies a User ID without checking it.
        PersonaCertification = 0x11, "persona certification";
        /// Certifies a User ID after some checking.
        CasualCertification = 0x12, "casual certification";
        /// Certifies a User ID after substantial checking.
        PositiveCertification = 0x13, "positive certification";

        /// Binds a subkey to the primary key.
        SubkeyBinding = 0x18, "subkey binding";
        /// Made by a signing subkey over the primary key.
        PrimaryKeyBinding = 0x19, "primary key binding";
        /// Made directly over the primary key.
        DirectKey = 0x1f, "direct key";

        /// Revokes the primary key.
        KeyRevocation = 0x20, "key revocation";
        /// Revokes a subkey binding.
        SubkeyRevocation = 0x28, "subkey revocation";
        /// Revokes a User ID or User Attribute certification.
        CertificationRevocation = 0x30, "certification revocation";

        /// Attests to the existence of a signature at a time.
        Timestamp = 0x40, "timestamp";
        /// Confirms another signature.
        Confirmation = 0x50, "third-party confirmation";
    }
    /// A signature type this crate does not know.
    Unknown(_) => "signature type {:#04x}";
}

impl SignatureType {
    /// Returns whether this certifies a User ID or User Attribute.
    pub fn is_certification(&self) -> bool {
        (0x10..=0x13).contains(&u8::from(*self))
    }

    /// Returns whether this is any kind of revocation.
    pub fn is_revocation(&self) -> bool {
        use self::SignatureType::*;
        matches!(self,
                 KeyRevocation | SubkeyRevocation | CertificationRevocation)
    }
}

#[cfg(test)]
impl Arbitrary for SignatureType {
    fn arbitrary(g: &mut Gen) -> Self {
        u8::arbitrary(g).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    quickcheck! {
        fn sigtype_roundtrip(t: SignatureType) -> bool {
            let val: u8 = t.into();
            t == SignatureType::from(val)
        }
    }

    quickcheck! {
        fn pk_roundtrip(u: u8) -> bool {
            u8::from(PublicKeyAlgorithm::from(u)) == u
        }
    }

    #[test]
    fn classification() {
        assert!(SignatureType::PositiveCertification.is_certification());
        assert!(!SignatureType::SubkeyBinding.is_certification());
        assert!(!SignatureType::Unknown(0x14).is_certification());
        assert!(SignatureType::CertificationRevocation.is_revocation());
        assert!(SignatureType::SubkeyRevocation.is_revocation());
        assert!(!SignatureType::DirectKey.is_revocation());
        assert!(PublicKeyAlgorithm::from(3).is_rsa());
        assert!(!PublicKeyAlgorithm::from(17).is_rsa());
    }

    #[test]
    fn display() {
        assert_eq!(SignatureType::from(0x18).to_string(), "subkey binding");
        assert_eq!(SignatureType::from(0x77).to_string(),
                   "signature type 0x77");
        assert_eq!(PublicKeyAlgorithm::from(101).to_string(),
                   "private algorithm 101");
        assert_eq!(PublicKeyAlgorithm::from(22).to_string(), "EdDSA");
    }
}
