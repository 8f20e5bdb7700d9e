//! The SKS digest.
//!
//! Key servers reconcile their databases by exchanging digests of the
//! keys they hold.  Two servers only agree if they compute the same
//! digest for the same key material, so the digest must not depend
//! on the order in which packets arrived, on how often a packet was
//! seen, or on which component a duplicated signature ended up
//! attached to.
//!
//! The digest is computed as follows:
//!
//!   1. The key is flattened into its packets.  A node with a
//!      duplicate count of `n` contributes `n + 1` occurrences.
//!   2. The occurrences are reduced to the set of distinct packets.
//!   3. The set is sorted by tag, then by body length, then by body.
//!   4. For each packet, the tag and the body length are hashed as
//!      four octet big endian integers, followed by the body.
//!
//! The result is the lower case hex encoding of the hash.  The hash
//! algorithm is chosen by the caller; SKS uses MD5.
//!
//! Packets retained in `others` lists are not part of the key and do
//! not contribute to the digest.

use std::collections::BTreeSet;

use ::digest::Digest;

use crate::keyring::PrimaryKey;
use crate::packet::OpaquePacket;

const TRACE : bool = false;

/// Computes the SKS digest of a key tree.
///
/// # Examples
///
/// ```rust
/// # fn main() -> sks_openpgp::Result<()> {
/// use sks_openpgp as openpgp;
/// use openpgp::PrimaryKey;
///
/// # let bytes = include_bytes!("../tests/data/keys/dupsig.pgp");
/// let mut key = PrimaryKey::from_bytes(&bytes[..])?;
/// let before = openpgp::digest::sks_digest(&key, md5::Md5::default());
///
/// openpgp::dedup::drop_duplicates(&mut key);
/// let after = openpgp::digest::sks_digest(&key, md5::Md5::default());
/// assert_eq!(before, after);
/// # Ok(()) }
/// ```
pub fn sks_digest<D: Digest>(key: &PrimaryKey, hash: D) -> String {
    tracer!(TRACE, "sks_digest", 0);

    // A node stands for `count + 1` occurrences of its packet, but
    // they all collapse into one set entry, so one insert suffices.
    let set: BTreeSet<&OpaquePacket> =
        key.contents().map(|node| node.packet()).collect();
    t!("{}: {} distinct packets", key.fingerprint(), set.len());
    hash_packets(set, hash)
}

/// Computes the SKS digest of a list of packets.
///
/// This is the digest of the key the packets make up, without
/// building the key tree first.  The packets' order and multiplicity
/// do not matter.
pub fn sks_digest_opaque<D: Digest>(packets: &[OpaquePacket], hash: D)
                                    -> String {
    tracer!(TRACE, "sks_digest_opaque", 0);

    let set: BTreeSet<&OpaquePacket> = packets.iter().collect();
    t!("{} packets, {} distinct", packets.len(), set.len());
    hash_packets(set, hash)
}

// Hashes the packets in the set's order, which is the canonical
// packet order.
fn hash_packets<D: Digest>(set: BTreeSet<&OpaquePacket>, mut hash: D)
                           -> String {
    for p in set {
        hash.update(&(u8::from(p.tag()) as u32).to_be_bytes());
        hash.update(&(p.contents().len() as u32).to_be_bytes());
        hash.update(p.contents());
    }
    hex::encode(hash.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use md5::{Digest, Md5};
    use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

    use crate::dedup::{collect_duplicates, drop_duplicates};
    use crate::packet::Tag;
    use crate::parse::read_opaque_keyrings;
    use crate::tests::key;

    fn opaque(name: &str) -> Vec<OpaquePacket> {
        read_opaque_keyrings(key(name)).next().unwrap().into_packets()
    }

    #[test]
    fn known_digests() {
        for (name, digest) in &[
            ("alice-unsigned.pgp", "e0855020998dc324fb7f211ad9c91ef5"),
            ("alice-old-format.pgp", "e0855020998dc324fb7f211ad9c91ef5"),
            ("alice-signed.pgp", "8eb4aa5590221c524f64ea60fd047e09"),
            ("nine-uids.pgp", "30ff3b4d66c2c37e7795686a7e9b25ba"),
            ("dupsig.pgp", "8df5a6d1fd34f112a3305787e2a0faf0"),
        ] {
            let k = PrimaryKey::from_bytes(key(name)).unwrap();
            assert_eq!(sks_digest(&k, Md5::new()), *digest, "{}", name);
            assert_eq!(sks_digest_opaque(&opaque(name), Md5::new()), *digest,
                       "{}", name);
        }
    }

    #[test]
    fn duplicates() {
        let expected = "8df5a6d1fd34f112a3305787e2a0faf0";
        assert_eq!(sks_digest_opaque(&opaque("dupsig.pgp"), Md5::new()),
                   expected);

        let k = PrimaryKey::from_bytes(key("dupsig.pgp")).unwrap();

        let mut dropped = k.clone();
        drop_duplicates(&mut dropped);
        assert!(dropped.contents().count() < k.contents().count());
        assert_eq!(sks_digest(&dropped, Md5::new()), expected);

        // Counts are expanded, then collapsed again.
        let mut collected = k.clone();
        collect_duplicates(&mut collected);
        assert!(collected.contents().any(|n| n.count() > 0));
        assert_eq!(sks_digest(&collected, Md5::new()), expected);
    }

    #[test]
    fn saturated_count() {
        let mut k = PrimaryKey::from_bytes(key("alice-signed.pgp")).unwrap();
        let expected = sks_digest(&k, Md5::new());

        k.userids[0].signatures[0].common.add_count(usize::MAX);
        assert_eq!(k.userids[0].signatures()[0].count(), usize::MAX);
        assert_eq!(sks_digest(&k, Md5::new()), expected);
    }

    #[test]
    fn contextual_duplicate() {
        let mut k = PrimaryKey::from_bytes(key("alice-signed.pgp")).unwrap();
        let expected = sks_digest(&k, Md5::new());

        // Attach a copy of the User ID's certification to the subkey.
        let sig = k.userids[0].signatures[0].clone();
        k.subkeys[0].signatures.push(sig);
        assert_eq!(sks_digest(&k, Md5::new()), expected);
    }

    #[test]
    fn others_are_ignored() {
        let with = PrimaryKey::from_bytes(key("trust.pgp")).unwrap();
        let without = crate::parse::KeyParserBuilder::from_bytes(
            key("trust.pgp"))
            .ignore_trust_packets(true)
            .build()
            .next().unwrap().unwrap();
        assert!(! with.notices().is_empty());
        assert_eq!(sks_digest(&with, Md5::new()),
                   sks_digest(&without, Md5::new()));

        let packets = opaque("trust.pgp").into_iter()
            .filter(|p| p.tag() != Tag::Trust)
            .collect::<Vec<_>>();
        assert_eq!(sks_digest(&with, Md5::new()),
                   sks_digest_opaque(&packets, Md5::new()));
    }

    #[test]
    fn hash_input() {
        let p = OpaquePacket::new(Tag::UserID, b"abc".to_vec());
        let mut h = Md5::new();
        h.update(b"\x00\x00\x00\x0d\x00\x00\x00\x03abc");
        assert_eq!(sks_digest_opaque(&[p], Md5::new()),
                   hex::encode(h.finalize()));

        // The empty set hashes nothing.
        assert_eq!(sks_digest_opaque(&[], Md5::new()),
                   hex::encode(Md5::new().finalize()));
    }

    #[test]
    fn order_independent() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut packets = opaque("sorting.pgp");
        let expected = sks_digest_opaque(&packets, Md5::new());
        for _ in 0..16 {
            packets.shuffle(&mut rng);
            assert_eq!(sks_digest_opaque(&packets, Md5::new()), expected);
        }
    }

    quickcheck! {
        fn multiplicity(packets: Vec<OpaquePacket>, extra: Vec<usize>)
                        -> bool {
            let mut more = packets.clone();
            if ! packets.is_empty() {
                for i in extra {
                    more.push(packets[i % packets.len()].clone());
                }
            }
            sks_digest_opaque(&packets, Md5::new())
                == sks_digest_opaque(&more, Md5::new())
        }
    }
}
