//! Writing packets.
//!
//! Packets are always written with new-format headers using the
//! shortest definite length encoding, which is also the encoding
//! their uuids are computed over.  Armoring is left to the caller.

use std::io;

use crate::{
    Error,
    Result,
};
use crate::keyring::{
    PrimaryKey,
    Signature,
};
use crate::packet::{OpaquePacket, Tag};
use crate::parse::OpaqueKeyring;

/// Packet serialization.
///
/// This interfaces serializes packets and packet trees.
pub trait Serialize {
    /// Writes a serialized version of the object to `o`.
    fn serialize<W: io::Write>(&self, o: &mut W) -> Result<()>;

    /// Serializes the object to a vector.
    fn to_vec(&self) -> Result<Vec<u8>> {
        let mut o = Vec::with_capacity(4096);
        self.serialize(&mut o)?;
        Ok(o)
    }
}

impl Serialize for OpaquePacket {
    /// Writes the packet with its canonical header.
    ///
    /// Fails for packets with the reserved tag 0, which no reader
    /// accepts.
    fn serialize<W: io::Write>(&self, o: &mut W) -> Result<()> {
        if self.tag() == Tag::Reserved {
            return Err(Error::InvalidArgument(
                "Cannot write a packet with reserved tag 0".into()).into());
        }
        o.write_all(&self.canonical_header())?;
        o.write_all(self.contents())?;
        Ok(())
    }

    fn to_vec(&self) -> Result<Vec<u8>> {
        let mut o = Vec::with_capacity(6 + self.contents().len());
        self.serialize(&mut o)?;
        Ok(o)
    }
}

impl Serialize for OpaqueKeyring {
    /// Writes the keyring's packets in their current order.
    fn serialize<W: io::Write>(&self, o: &mut W) -> Result<()> {
        for p in self.packets() {
            p.serialize(o)?;
        }
        Ok(())
    }
}

fn serialize_signatures<W: io::Write>(sigs: &[Signature], o: &mut W)
                                      -> Result<()> {
    for s in sigs {
        s.packet().serialize(o)?;
    }
    Ok(())
}

fn serialize_others<W: io::Write>(others: &[OpaquePacket], o: &mut W)
                                  -> Result<()> {
    for p in others {
        p.serialize(o)?;
    }
    Ok(())
}

impl Serialize for PrimaryKey {
    /// Writes the key tree in insertion order.
    ///
    /// Each container is followed by its signatures, then by its
    /// uninterpreted packets.  Duplicate counts are not expanded:
    /// every node is written once.
    fn serialize<W: io::Write>(&self, o: &mut W) -> Result<()> {
        self.packet().serialize(o)?;
        serialize_signatures(self.signatures(), o)?;
        serialize_others(self.others(), o)?;

        for u in self.userids() {
            u.packet().serialize(o)?;
            serialize_signatures(u.signatures(), o)?;
            serialize_others(u.others(), o)?;
        }
        for u in self.user_attributes() {
            u.packet().serialize(o)?;
            serialize_signatures(u.signatures(), o)?;
            serialize_others(u.others(), o)?;
        }
        for k in self.subkeys() {
            k.packet().serialize(o)?;
            serialize_signatures(k.signatures(), o)?;
            serialize_others(k.others(), o)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::PacketReader;

    quickcheck! {
        fn packet_roundtrip(tag: u8, body: Vec<u8>) -> bool {
            let p = OpaquePacket::new(Tag::from(tag & 0x3f), body);
            match p.to_vec() {
                Ok(bytes) => {
                    let q = PacketReader::from_bytes(&bytes)
                        .collect::<Result<Vec<_>>>().unwrap();
                    q == vec![p]
                }
                // Whatever cannot be read back is not written.
                Err(_) => p.tag() == Tag::Reserved,
            }
        }
    }

    #[test]
    fn reserved_tag() {
        let p = OpaquePacket::new(Tag::Reserved, vec![]);
        let mut bytes = vec![];
        let err = p.serialize(&mut bytes).unwrap_err();
        assert!(destructures_to!(Some(Error::InvalidArgument(_))
                                 = err.downcast_ref::<Error>()));
        assert!(bytes.is_empty());
        assert!(PacketReader::from_bytes(&[0xc0, 0x00])
                .next().unwrap().is_err());
    }

    #[test]
    fn keyring_roundtrip() {
        let bytes = crate::tests::key("alice-signed.pgp");
        let keyring = crate::parse::read_opaque_keyrings(bytes)
            .next().unwrap();
        assert_eq!(keyring.to_vec().unwrap(), bytes);

        let key = keyring.parse().unwrap();
        assert_eq!(key.to_vec().unwrap(), bytes);
    }

    #[test]
    fn tree_order() {
        // Old-format input is rewritten with new-format headers.
        let old = crate::tests::key("alice-old-format.pgp");
        let new = crate::tests::key("alice-unsigned.pgp");
        let key = PrimaryKey::from_bytes(old).unwrap();
        assert_eq!(key.to_vec().unwrap(), new);
    }
}
