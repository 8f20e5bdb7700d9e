use std::fmt;

use crate::KeyID;

/// A long identifier for keys.
///
/// A `Fingerprint` uniquely identifies a public key.  A *v4*
/// fingerprint is a SHA-1 hash over the key's public key packet; a
/// *v3* fingerprint is an MD5 hash over the RSA modulus and
/// exponent.  For details, see [Section 12.2 of RFC 4880].
///
/// The merger refuses to combine two keys whose fingerprints differ.
///
///   [Section 12.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-12.2
#[non_exhaustive]
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub enum Fingerprint {
    /// A 20 byte SHA-1 hash of the public key packet.
    V4([u8; 20]),
    /// A 16 byte MD5 hash of a version 3 RSA key's MPIs, along with
    /// the key ID, which is not derived from the fingerprint.
    V3([u8; 16], KeyID),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Fingerprint")
            .field(&self.to_hex())
            .finish()
    }
}

impl Fingerprint {
    /// Returns a reference to the raw Fingerprint.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Fingerprint::V4(fp) => fp,
            Fingerprint::V3(fp, _) => fp,
        }
    }

    /// Converts the fingerprint to lower case hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Converts the fingerprint to a key ID.
    pub fn to_keyid(&self) -> KeyID {
        match self {
            Fingerprint::V4(fp) => {
                let mut id = [0u8; 8];
                id.copy_from_slice(&fp[12..]);
                KeyID::from(u64::from_be_bytes(id))
            }
            Fingerprint::V3(_, keyid) => *keyid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_keyid() {
        let mut raw = [0u8; 20];
        raw.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        let fp = Fingerprint::V4(raw);
        assert_eq!(fp.to_hex(), "000102030405060708090a0b0c0d0e0f10111213");
        assert_eq!(fp.to_keyid().to_hex(), "0c0d0e0f10111213");
        assert_eq!(KeyID::from(&fp), fp.to_keyid());
    }

    #[test]
    fn v3_keyid() {
        let keyid = KeyID::from(0x93228d3b46fd0670);
        let fp = Fingerprint::V3([0xab; 16], keyid);
        assert_eq!(fp.to_keyid(), keyid);
        assert_eq!(fp.as_bytes().len(), 16);
    }
}
