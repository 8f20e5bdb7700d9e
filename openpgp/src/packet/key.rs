//! Public key and subkey packets.
//!
//! The key server only needs a key's identity: its fingerprint and
//! key ID.  The key material itself is carried opaquely.
//!
//! See [Section 5.5 of RFC 4880] for details.
//!
//!   [Section 5.5 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.5

use std::io;

use buffered_reader::BufferedReader;
use md5::Md5;
use sha1::{Digest, Sha1};

use crate::{
    Error,
    Fingerprint,
    KeyID,
    Result,
};
use crate::types::{PublicKeyAlgorithm, Timestamp};

/// The fields of a public key or public subkey packet that determine
/// the key's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFields {
    version: u8,
    creation_time: Timestamp,
    pk_algo: PublicKeyAlgorithm,
    /// Validity period in days, version 3 keys only.
    validity_days: Option<u16>,
    fingerprint: Fingerprint,
    keyid: KeyID,
}

fn malformed(e: io::Error) -> anyhow::Error {
    Error::MalformedPacket(format!("Truncated key packet: {}", e)).into()
}

// Reads an MPI and returns its value without the length prefix.
fn mpi<'a, R>(bio: &'a mut R) -> Result<&'a [u8]>
    where R: BufferedReader<()> + ?Sized
{
    let bits = bio.read_be_u16().map_err(malformed)? as usize;
    let bytes = (bits + 7) / 8;
    Ok(&bio.data_consume_hard(bytes).map_err(malformed)?[..bytes])
}

impl KeyFields {
    /// Parses the body of a key packet.
    ///
    /// Version 4 keys are identified by a SHA-1 hash over the packet.
    /// Version 2 and 3 keys are RSA keys identified by an MD5 hash
    /// over their modulus and exponent; their key ID is the low 64
    /// bits of the modulus.  Other versions are malformed.
    pub fn parse(body: &[u8]) -> Result<KeyFields> {
        let mut bio = buffered_reader::Memory::new(body);
        let version = bio.data_consume_hard(1).map_err(malformed)?[0];
        match version {
            4 => {
                let creation_time = bio.read_be_u32().map_err(malformed)?;
                let pk_algo = bio.data_consume_hard(1).map_err(malformed)?[0];

                if body.len() > std::u16::MAX as usize {
                    return Err(Error::MalformedPacket(
                        format!("Key packet of {} bytes is too large",
                                body.len())).into());
                }
                let mut h = Sha1::new();
                h.update(&[0x99u8]);
                h.update(&(body.len() as u16).to_be_bytes());
                h.update(body);
                let mut fp = [0u8; 20];
                fp.copy_from_slice(&h.finalize());
                let fingerprint = Fingerprint::V4(fp);

                Ok(KeyFields {
                    version,
                    creation_time: creation_time.into(),
                    pk_algo: pk_algo.into(),
                    validity_days: None,
                    keyid: fingerprint.to_keyid(),
                    fingerprint,
                })
            }
            2 | 3 => {
                let creation_time = bio.read_be_u32().map_err(malformed)?;
                let validity_days = bio.read_be_u16().map_err(malformed)?;
                let pk_algo: PublicKeyAlgorithm =
                    bio.data_consume_hard(1).map_err(malformed)?[0].into();
                if !pk_algo.is_rsa() {
                    return Err(Error::MalformedPacket(
                        format!("Version {} key uses {}, expected RSA",
                                version, pk_algo)).into());
                }

                let n = mpi(&mut bio)?.to_vec();
                let e = mpi(&mut bio)?;
                let keyid = KeyID::from_bytes(&n)?;

                let mut h = Md5::new();
                h.update(&n);
                h.update(e);
                let mut fp = [0u8; 16];
                fp.copy_from_slice(&h.finalize());

                Ok(KeyFields {
                    version,
                    creation_time: creation_time.into(),
                    pk_algo,
                    validity_days: Some(validity_days),
                    fingerprint: Fingerprint::V3(fp, keyid),
                    keyid,
                })
            }
            v => Err(Error::MalformedPacket(
                format!("Unsupported key version {}", v)).into()),
        }
    }

    /// Returns the key packet's version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the key's creation time.
    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    /// Returns the key's public key algorithm.
    pub fn pk_algo(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    /// Returns the validity period of a version 3 key, in days.
    ///
    /// Zero means that the key does not expire.
    pub fn validity_days(&self) -> Option<u16> {
        self.validity_days
    }

    /// Returns the key's fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the key's key ID.
    pub fn keyid(&self) -> KeyID {
        self.keyid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A v4 EdDSA key body: version, creation time, algorithm, curve
    // OID and a 263 bit point.
    fn v4_body() -> Vec<u8> {
        let mut body = vec![4, 0x5a, 0x5e, 0x4d, 0x00, 22];
        body.push(9);
        body.extend_from_slice(&[0x2b, 0x06, 0x01, 0x04, 0x01,
                                 0xda, 0x47, 0x0f, 0x01]);
        body.extend_from_slice(&[0x01, 0x07, 0x40]);
        body.extend((0..32).map(|i| i as u8));
        body
    }

    #[test]
    fn v4() {
        let body = v4_body();
        let k = KeyFields::parse(&body).unwrap();
        assert_eq!(k.version(), 4);
        assert_eq!(k.creation_time(), Timestamp::from(0x5a5e4d00));
        assert_eq!(k.pk_algo(), PublicKeyAlgorithm::EdDSA);

        let mut h = Sha1::new();
        h.update(&[0x99u8, 0, body.len() as u8]);
        h.update(&body);
        let expected = hex::encode(h.finalize());
        assert_eq!(k.fingerprint().to_hex(), expected);
        assert_eq!(k.keyid().to_hex(), &expected[24..]);
    }

    #[test]
    fn v3() {
        // n = 0x0102...10 (16 bytes, 121 bits), e = 65537.
        let n: Vec<u8> = (1..=16).collect();
        let mut body = vec![3, 0x36, 0x5e, 0x4d, 0x00, 0, 30, 1];
        body.extend_from_slice(&[0, 121]);
        body.extend_from_slice(&n);
        body.extend_from_slice(&[0, 17, 1, 0, 1]);

        let k = KeyFields::parse(&body).unwrap();
        assert_eq!(k.version(), 3);
        assert_eq!(k.validity_days(), Some(30));
        assert_eq!(k.keyid().to_hex(), "090a0b0c0d0e0f10");

        let mut h = Md5::new();
        h.update(&n);
        h.update(&[1u8, 0, 1]);
        assert_eq!(k.fingerprint().to_hex(), hex::encode(h.finalize()));
        assert_eq!(k.fingerprint().to_keyid(), k.keyid());
    }

    #[test]
    fn rejects_malformed() {
        // Truncated.
        assert!(KeyFields::parse(&[4, 0, 0]).is_err());
        assert!(KeyFields::parse(&[]).is_err());
        // Unknown version.
        assert!(KeyFields::parse(&[5, 0, 0, 0, 0, 1]).is_err());
        // v3 DSA.
        let e = KeyFields::parse(&[3, 0, 0, 0, 0, 0, 0, 17, 0, 8, 1, 0, 8, 1])
            .unwrap_err();
        assert!(destructures_to!(
            Some(Error::MalformedPacket(_)) = e.downcast_ref::<Error>()));
    }
}
