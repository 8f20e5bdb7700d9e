//! Signature packets.
//!
//! Signatures are interpreted structurally: the key server extracts
//! the signature's type, creation time, issuer and expiration times,
//! but never verifies it.
//!
//! See [Section 5.2 of RFC 4880] for details.
//!
//!   [Section 5.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2

use std::io;

use buffered_reader::BufferedReader;

use crate::{
    Error,
    KeyID,
    Result,
};
use crate::types::{
    Duration,
    PublicKeyAlgorithm,
    SignatureType,
    Timestamp,
};

const TRACE : bool = false;

/// Signature subpacket types the key server interprets.
///
/// See [Section 5.2.3.1 of RFC 4880] for details.
///
///   [Section 5.2.3.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpacketTag {
    /// The time the signature was made.
    SignatureCreationTime,
    /// The validity period of the signature.
    SignatureExpirationTime,
    /// The validity period of the key.
    KeyExpirationTime,
    /// The key ID of the key issuing the signature.
    Issuer,
    /// Whether the User ID is the primary one for this key.
    PrimaryUserID,
    /// The fingerprint of the key issuing the signature.
    IssuerFingerprint,
    /// Any other subpacket.
    Other(u8),
}

impl From<u8> for SubpacketTag {
    fn from(u: u8) -> Self {
        match u {
            2 => SubpacketTag::SignatureCreationTime,
            3 => SubpacketTag::SignatureExpirationTime,
            9 => SubpacketTag::KeyExpirationTime,
            16 => SubpacketTag::Issuer,
            25 => SubpacketTag::PrimaryUserID,
            33 => SubpacketTag::IssuerFingerprint,
            u => SubpacketTag::Other(u),
        }
    }
}

/// The semantic fields of a version 3 or version 4 signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureFields {
    version: u8,
    typ: SignatureType,
    pk_algo: PublicKeyAlgorithm,
    hash_algo: u8,
    creation_time: Option<Timestamp>,
    issuer: Option<KeyID>,
    signature_expiration_time: Option<Duration>,
    key_expiration_time: Option<Duration>,
    primary_userid: Option<bool>,
}

fn malformed(e: io::Error) -> anyhow::Error {
    Error::MalformedPacket(format!("Truncated signature packet: {}", e))
        .into()
}

/// Reads a subpacket length.
///
/// Unlike packet lengths, subpacket lengths have no partial form.
/// See [Section 5.2.3.1 of RFC 4880].
///
///   [Section 5.2.3.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3.1
pub(crate) fn subpacket_length<R>(bio: &mut R) -> io::Result<u32>
    where R: BufferedReader<()> + ?Sized
{
    let octet1 = bio.data_consume_hard(1)?[0];
    if octet1 < 192 {
        Ok(octet1 as u32)
    } else if octet1 < 255 {
        let octet2 = bio.data_consume_hard(1)?[0];
        Ok(((octet1 as u32 - 192) << 8) + octet2 as u32 + 192)
    } else {
        bio.read_be_u32()
    }
}

/// Iterates over the subpackets in a subpacket area.
///
/// Yields the subpacket's type, with the critical bit cleared, and
/// its body.
pub(crate) struct SubpacketIter<'a> {
    reader: buffered_reader::Memory<'a, ()>,
}

impl<'a> SubpacketIter<'a> {
    pub(crate) fn new(area: &'a [u8]) -> Self {
        SubpacketIter { reader: buffered_reader::Memory::new(area) }
    }
}

impl<'a> Iterator for SubpacketIter<'a> {
    type Item = Result<(u8, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.data(1) {
            Ok(d) if d.is_empty() => return None,
            Ok(_) => (),
            Err(e) => return Some(Err(malformed(e))),
        }

        let len = match subpacket_length(&mut self.reader) {
            Ok(len) => len as usize,
            Err(e) => return Some(Err(malformed(e))),
        };
        if len == 0 {
            return Some(Err(Error::MalformedPacket(
                "Subpacket without type octet".into()).into()));
        }
        let raw = match self.reader.data_consume_hard(len) {
            Ok(raw) => &raw[..len],
            Err(e) => return Some(Err(malformed(e))),
        };
        Some(Ok((raw[0] & 0x7f, raw[1..].to_vec())))
    }
}

// Checks a fixed-size subpacket body.
fn fixed<'a>(tag: SubpacketTag, body: &'a [u8], len: usize)
             -> Result<&'a [u8]> {
    if body.len() != len {
        return Err(Error::MalformedPacket(
            format!("{:?} subpacket has {} bytes, expected {}",
                    tag, body.len(), len)).into());
    }
    Ok(body)
}

fn be_u32(body: &[u8]) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&body[..4]);
    u32::from_be_bytes(b)
}

/// Looks for the issuer of a signature that does not decode.
///
/// Scans as much of the packet as is intact, skipping malformed
/// subpackets other than the issuer ones.  Returns `None` if no
/// issuer can be found.
pub(crate) fn issuer_hint(body: &[u8]) -> Option<KeyID> {
    match body.first()? {
        // Version, hashed length, type and creation time precede it.
        3 => KeyID::from_bytes(body.get(7..15)?).ok(),
        4 => {
            let mut areas = Vec::with_capacity(2);
            let mut rest = body.get(4..)?;
            while areas.len() < 2 && rest.len() >= 2 {
                let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                let end = std::cmp::min(2 + len, rest.len());
                areas.push(&rest[2..end]);
                rest = &rest[end..];
            }

            areas.into_iter()
                .flat_map(|area| SubpacketIter::new(area)
                          .take_while(|sp| sp.is_ok())
                          .filter_map(|sp| sp.ok()))
                .find_map(|(typ, body)| match SubpacketTag::from(typ) {
                    SubpacketTag::Issuer if body.len() == 8 =>
                        KeyID::from_bytes(&body).ok(),
                    SubpacketTag::IssuerFingerprint if body.len() >= 9 =>
                        KeyID::from_bytes(&body[1..]).ok(),
                    _ => None,
                })
        }
        _ => None,
    }
}

impl SignatureFields {
    /// Parses the body of a signature packet.
    ///
    /// Returns `Ok(None)` for signature versions other than 3 and 4,
    /// which are carried without interpretation.  Truncated or
    /// otherwise undecodable version 3 and 4 signatures are errors.
    pub fn parse(body: &[u8]) -> Result<Option<SignatureFields>> {
        tracer!(TRACE, "SignatureFields::parse", 0);
        let mut bio = buffered_reader::Memory::new(body);
        let version = bio.data_consume_hard(1).map_err(malformed)?[0];
        let fields = match version {
            3 => Self::parse_v3(&mut bio)?,
            4 => Self::parse_v4(&mut bio)?,
            v => {
                t!("Ignoring version {} signature", v);
                return Ok(None);
            }
        };
        t!("{:?}", fields);
        Ok(Some(fields))
    }

    fn parse_v3(bio: &mut buffered_reader::Memory<()>)
                -> Result<SignatureFields> {
        let hashed_len = bio.data_consume_hard(1).map_err(malformed)?[0];
        if hashed_len != 5 {
            return Err(Error::MalformedPacket(
                format!("Version 3 signature with hashed length {}",
                        hashed_len)).into());
        }
        let typ = bio.data_consume_hard(1).map_err(malformed)?[0];
        let creation_time = bio.read_be_u32().map_err(malformed)?;
        let issuer = KeyID::from_bytes(
            &bio.data_consume_hard(8).map_err(malformed)?[..8])?;
        let algos = bio.data_consume_hard(2).map_err(malformed)?;
        let (pk_algo, hash_algo) = (algos[0], algos[1]);
        // Left 16 bits of the hash.
        bio.data_consume_hard(2).map_err(malformed)?;

        Ok(SignatureFields {
            version: 3,
            typ: typ.into(),
            pk_algo: pk_algo.into(),
            hash_algo,
            creation_time: Some(creation_time.into()),
            issuer: Some(issuer),
            signature_expiration_time: None,
            key_expiration_time: None,
            primary_userid: None,
        })
    }

    fn parse_v4(bio: &mut buffered_reader::Memory<()>)
                -> Result<SignatureFields> {
        let head = bio.data_consume_hard(3).map_err(malformed)?;
        let (typ, pk_algo, hash_algo) = (head[0], head[1], head[2]);

        let hashed_len = bio.read_be_u16().map_err(malformed)? as usize;
        let hashed = bio.steal(hashed_len).map_err(malformed)?;
        let unhashed_len = bio.read_be_u16().map_err(malformed)? as usize;
        let unhashed = bio.steal(unhashed_len).map_err(malformed)?;
        // Left 16 bits of the hash.
        bio.data_consume_hard(2).map_err(malformed)?;

        let mut fields = SignatureFields {
            version: 4,
            typ: typ.into(),
            pk_algo: pk_algo.into(),
            hash_algo,
            creation_time: None,
            issuer: None,
            signature_expiration_time: None,
            key_expiration_time: None,
            primary_userid: None,
        };

        // Only the hashed area is authoritative, but the issuer is a
        // hint and is commonly found in the unhashed area.
        for sp in SubpacketIter::new(&hashed) {
            let (typ, body) = sp?;
            fields.apply(typ.into(), &body, true)?;
        }
        for sp in SubpacketIter::new(&unhashed) {
            let (typ, body) = sp?;
            fields.apply(typ.into(), &body, false)?;
        }

        Ok(fields)
    }

    // Records a subpacket's value.  The first occurrence wins.
    fn apply(&mut self, tag: SubpacketTag, body: &[u8], hashed: bool)
             -> Result<()> {
        match tag {
            SubpacketTag::SignatureCreationTime if hashed => {
                let v = be_u32(fixed(tag, body, 4)?);
                self.creation_time.get_or_insert(v.into());
            }
            SubpacketTag::SignatureExpirationTime if hashed => {
                let v = be_u32(fixed(tag, body, 4)?);
                self.signature_expiration_time.get_or_insert(v.into());
            }
            SubpacketTag::KeyExpirationTime if hashed => {
                let v = be_u32(fixed(tag, body, 4)?);
                self.key_expiration_time.get_or_insert(v.into());
            }
            SubpacketTag::PrimaryUserID if hashed => {
                let v = fixed(tag, body, 1)?[0] != 0;
                self.primary_userid.get_or_insert(v);
            }
            SubpacketTag::Issuer => {
                let id = KeyID::from_bytes(fixed(tag, body, 8)?)?;
                self.issuer.get_or_insert(id);
            }
            SubpacketTag::IssuerFingerprint => {
                // A version octet followed by the fingerprint.
                if body.len() < 9 {
                    return Err(Error::MalformedPacket(
                        format!("Issuer fingerprint of {} bytes",
                                body.len())).into());
                }
                let id = KeyID::from_bytes(&body[1..])?;
                self.issuer.get_or_insert(id);
            }
            _ => (),
        }
        Ok(())
    }

    /// Returns the signature packet's version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the signature's type.
    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    /// Returns the signature's public key algorithm.
    pub fn pk_algo(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    /// Returns the signature's hash algorithm identifier.
    pub fn hash_algo(&self) -> u8 {
        self.hash_algo
    }

    /// Returns the signature's creation time.
    ///
    /// For version 4 signatures this is only taken from the hashed
    /// subpacket area.
    pub fn creation_time(&self) -> Option<Timestamp> {
        self.creation_time
    }

    /// Returns the key ID of the key that claims to have made the
    /// signature.
    pub fn issuer(&self) -> Option<KeyID> {
        self.issuer
    }

    /// Returns the signature's validity period, relative to its
    /// creation time.
    ///
    /// A value of zero means that the signature does not expire and
    /// is normalized to `None`.
    pub fn signature_expiration_time(&self) -> Option<Duration> {
        self.signature_expiration_time.filter(|d| d.as_secs() > 0)
    }

    /// Returns the key's validity period, relative to the key's
    /// creation time.
    ///
    /// A value of zero means that the key does not expire and is
    /// normalized to `None`.
    pub fn key_expiration_time(&self) -> Option<Duration> {
        self.key_expiration_time.filter(|d| d.as_secs() > 0)
    }

    /// Returns whether the signature marks its User ID as primary.
    pub fn primary_userid(&self) -> Option<bool> {
        self.primary_userid
    }

    /// Returns the time at which the signature expires, if it does.
    pub fn signature_expires_at(&self) -> Option<Timestamp> {
        match (self.creation_time, self.signature_expiration_time()) {
            (Some(t), Some(d)) =>
                Some(t.checked_add(d).unwrap_or_else(
                    || Timestamp::from(std::u32::MAX))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subpacket(typ: u8, body: &[u8]) -> Vec<u8> {
        let mut sp = vec![(body.len() + 1) as u8, typ];
        sp.extend_from_slice(body);
        sp
    }

    fn v4(typ: u8, hashed: &[u8], unhashed: &[u8]) -> Vec<u8> {
        let mut sig = vec![4, typ, 22, 10];
        sig.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
        sig.extend_from_slice(hashed);
        sig.extend_from_slice(&(unhashed.len() as u16).to_be_bytes());
        sig.extend_from_slice(unhashed);
        sig.extend_from_slice(&[0xab, 0xcd]);
        sig.extend_from_slice(&[0, 8, 0xff]);
        sig
    }

    #[test]
    fn v4_fields() {
        let mut hashed = subpacket(2, &1388534400u32.to_be_bytes());
        hashed.extend(subpacket(3, &86400u32.to_be_bytes()));
        hashed.extend(subpacket(9, &0u32.to_be_bytes()));
        // Critical bit set.
        hashed.extend(subpacket(25 | 0x80, &[1]));
        let unhashed = subpacket(16, &[1, 2, 3, 4, 5, 6, 7, 8]);

        let sig = SignatureFields::parse(&v4(0x13, &hashed, &unhashed))
            .unwrap().unwrap();
        assert_eq!(sig.version(), 4);
        assert_eq!(sig.typ(), SignatureType::PositiveCertification);
        assert_eq!(sig.pk_algo(), PublicKeyAlgorithm::EdDSA);
        assert_eq!(sig.hash_algo(), 10);
        assert_eq!(sig.creation_time(), Some(Timestamp::from(1388534400)));
        assert_eq!(sig.signature_expiration_time(),
                   Some(Duration::seconds(86400)));
        assert_eq!(sig.signature_expires_at(),
                   Some(Timestamp::from(1388534400 + 86400)));
        assert_eq!(sig.key_expiration_time(), None);
        assert_eq!(sig.primary_userid(), Some(true));
        assert_eq!(sig.issuer(), Some(KeyID::from(0x0102030405060708)));
    }

    #[test]
    fn issuer_fingerprint() {
        let mut fp = vec![4];
        fp.extend(0u8..20);
        let hashed = subpacket(33, &fp);
        let sig = SignatureFields::parse(&v4(0x18, &hashed, &[]))
            .unwrap().unwrap();
        assert_eq!(sig.issuer().unwrap().to_hex(), "0c0d0e0f10111213");
        assert_eq!(sig.creation_time(), None);
    }

    #[test]
    fn unhashed_creation_time_ignored() {
        let unhashed = subpacket(2, &1u32.to_be_bytes());
        let sig = SignatureFields::parse(&v4(0x10, &[], &unhashed))
            .unwrap().unwrap();
        assert_eq!(sig.creation_time(), None);
    }

    #[test]
    fn v3_fields() {
        let mut body = vec![3, 5, 0x20];
        body.extend_from_slice(&1293840000u32.to_be_bytes());
        body.extend_from_slice(&[9, 9, 9, 9, 1, 2, 3, 4]);
        body.extend_from_slice(&[1, 2, 0xab, 0xcd, 0, 1, 1]);
        let sig = SignatureFields::parse(&body).unwrap().unwrap();
        assert_eq!(sig.version(), 3);
        assert_eq!(sig.typ(), SignatureType::KeyRevocation);
        assert_eq!(sig.creation_time(), Some(Timestamp::from(1293840000)));
        assert_eq!(sig.issuer().unwrap().to_hex(), "0909090901020304");
    }

    #[test]
    fn other_versions() {
        assert_eq!(SignatureFields::parse(&[5, 1, 2, 3]).unwrap(), None);
    }

    #[test]
    fn truncated() {
        let mut sig = v4(0x13, &subpacket(2, &[0, 0, 0, 1]), &[]);
        // Claim a longer hashed area than there is.
        sig[5] = 200;
        assert!(SignatureFields::parse(&sig).is_err());
        assert!(SignatureFields::parse(&[4, 0x13]).is_err());
        assert!(SignatureFields::parse(&[3, 5, 0x10, 0, 0]).is_err());
        assert!(SignatureFields::parse(&[]).is_err());
    }

    #[test]
    fn bad_subpackets() {
        // Creation time with 3 bytes.
        let hashed = subpacket(2, &[0, 0, 1]);
        assert!(SignatureFields::parse(&v4(0x13, &hashed, &[])).is_err());
        // Subpacket without a type.
        assert!(SignatureFields::parse(&v4(0x13, &[0], &[])).is_err());
    }

    #[test]
    fn issuer_of_undecodable_signature() {
        // Expiration time with 3 bytes, issuer in the unhashed area.
        let hashed = subpacket(3, &[0, 0, 1]);
        let unhashed = subpacket(16, &[7; 8]);
        let sig = v4(0x10, &hashed, &unhashed);
        assert!(SignatureFields::parse(&sig).is_err());
        assert_eq!(issuer_hint(&sig), Some(KeyID::from_bytes(&[7; 8]).unwrap()));

        let mut fp = vec![4];
        fp.extend(0u8..20);
        let mut hashed = subpacket(33, &fp);
        hashed.extend(subpacket(2, &[0]));
        assert_eq!(issuer_hint(&v4(0x13, &hashed, &[])).unwrap().to_hex(),
                   "0c0d0e0f10111213");

        // Truncated version 3 signature, but the issuer is intact.
        let mut body = vec![3, 5, 0x10, 0, 0, 0, 1];
        body.extend_from_slice(&[9; 8]);
        assert_eq!(issuer_hint(&body), Some(KeyID::from_bytes(&[9; 8]).unwrap()));

        assert_eq!(issuer_hint(&v4(0x13, &subpacket(2, &[0]), &[])), None);
        assert_eq!(issuer_hint(&[4, 0x13]), None);
        assert_eq!(issuer_hint(&[]), None);
    }

    #[test]
    fn subpacket_lengths() {
        fn test(input: &[u8], expected: u32) {
            let mut bio = buffered_reader::Memory::new(input);
            assert_eq!(subpacket_length(&mut bio).unwrap(), expected);
        }
        test(&[100], 100);
        test(&[0xC5, 0xFB], 1723);
        // No partial lengths in subpacket areas.
        test(&[0xEF, 0x00], ((0xEF - 192) << 8) + 192);
        test(&[0xFF, 0x00, 0x01, 0x86, 0xA0], 100000);
    }
}
