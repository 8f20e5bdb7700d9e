use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::Fingerprint;
use crate::Result;

/// A short identifier for keys.
///
/// A `KeyID` is the low 64 bits of a key's [`Fingerprint`] (version 4
/// keys) or of its RSA modulus (version 3 keys).  Signatures name
/// their issuer by `KeyID`; the tree builder and the resolver match
/// those against the primary key's `KeyID` to find self-signatures.
///
/// Key servers traditionally print key IDs in lower case hex, and so
/// does this type.
///
///   [`Fingerprint`]: ./enum.Fingerprint.html
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct KeyID([u8; 8]);

impl fmt::Display for KeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for KeyID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("KeyID")
            .field(&self.to_hex())
            .finish()
    }
}

impl FromStr for KeyID {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<&Fingerprint> for KeyID {
    fn from(fp: &Fingerprint) -> Self {
        fp.to_keyid()
    }
}

impl From<u64> for KeyID {
    fn from(id: u64) -> Self {
        KeyID(id.to_be_bytes())
    }
}

impl KeyID {
    /// Reads a binary key ID.
    ///
    /// Only the last eight bytes are used if `raw` is longer, which
    /// is how a key ID is derived from a fingerprint or a modulus.
    /// Fails if `raw` is shorter than eight bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<KeyID> {
        if raw.len() < 8 {
            return Err(Error::InvalidArgument(
                format!("A key ID needs 8 bytes, got {}", raw.len())).into());
        }
        let mut keyid = [0u8; 8];
        keyid.copy_from_slice(&raw[raw.len() - 8..]);
        Ok(KeyID(keyid))
    }

    /// Reads a hex-encoded Key ID.
    pub fn from_hex(s: &str) -> Result<KeyID> {
        let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&s)
            .map_err(|e| Error::InvalidArgument(
                format!("Invalid key ID {:?}: {}", s, e)))?;
        if bytes.len() != 8 {
            return Err(Error::InvalidArgument(
                format!("Invalid key ID {:?}: expected 8 bytes", s)).into());
        }
        KeyID::from_bytes(&bytes)
    }

    /// Returns a reference to the raw KeyID.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Converts the key ID to a u64.
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Returns true if this is the wildcard ID.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Converts the key ID to lower case hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Returns the last four bytes as lower case hex, the "short ID"
    /// shown by key servers.
    pub fn to_short_hex(&self) -> String {
        hex::encode(&self.0[4..])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    quickcheck! {
        fn u64_roundtrip(id: u64) -> bool {
            KeyID::from(id).as_u64() == id
        }
    }

    quickcheck! {
        fn hex_roundtrip(id: u64) -> bool {
            let k = KeyID::from(id);
            k.to_hex().parse::<KeyID>().unwrap() == k
        }
    }

    #[test]
    fn parse() {
        let k: KeyID = "5BF0 4676 D10A EA26".parse().unwrap();
        assert_eq!(k.to_hex(), "5bf04676d10aea26");
        assert_eq!(k.to_short_hex(), "d10aea26");
        assert!("5bf04676d10aea".parse::<KeyID>().is_err());
        assert!("not hex at all!!".parse::<KeyID>().is_err());
        assert!(KeyID::from(0).is_wildcard());
    }

    #[test]
    fn from_long_bytes() {
        let raw = (0u8..20).collect::<Vec<u8>>();
        assert_eq!(KeyID::from_bytes(&raw).unwrap().as_bytes(),
                   &[12, 13, 14, 15, 16, 17, 18, 19]);
        assert!(KeyID::from_bytes(&raw[..7]).is_err());
    }
}
