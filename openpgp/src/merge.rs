//! Merging two copies of a key.
//!
//! Different servers, and different users, hold different subsets of
//! a key's packets.  Merging unions them: every User ID, User
//! Attribute, subkey and signature of either copy is present in the
//! result.  Nothing is removed or replaced, so merging is monotonic,
//! and merging the same copy twice has no further effect.
//!
//! Components and signatures are identified by their uuids.  A
//! component that is only present in the source copy is appended,
//! together with its signatures.  For a component present in both, the
//! source's signatures that the destination lacks are appended.

use std::collections::{HashMap, HashSet};

use crate::{
    Error,
    Result,
};
use crate::keyring::{Container, PrimaryKey};

const TRACE : bool = false;

/// Merges `src` into `dst`.
///
/// Fails with [`Error::MergeKeyMismatch`] if the keys have different
/// primary keys; `dst` is left unchanged in that case.
///
///   [`Error::MergeKeyMismatch`]: ../enum.Error.html#variant.MergeKeyMismatch
///
/// # Examples
///
/// ```rust
/// # fn main() -> sks_openpgp::Result<()> {
/// use sks_openpgp as openpgp;
/// use openpgp::PrimaryKey;
///
/// # let ours = include_bytes!("../tests/data/keys/alice-unsigned.pgp");
/// # let theirs = include_bytes!("../tests/data/keys/alice-signed.pgp");
/// let mut key = PrimaryKey::from_bytes(&ours[..])?;
/// let update = PrimaryKey::from_bytes(&theirs[..])?;
/// assert_eq!(key.userids()[0].signatures().len(), 1);
///
/// openpgp::merge::merge(&mut key, &update)?;
/// assert_eq!(key.userids()[0].signatures().len(), 2);
/// # Ok(()) }
/// ```
pub fn merge(dst: &mut PrimaryKey, src: &PrimaryKey) -> Result<()> {
    tracer!(TRACE, "merge", 0);

    if dst.fingerprint() != src.fingerprint() {
        return Err(Error::MergeKeyMismatch(dst.fingerprint().clone(),
                                           src.fingerprint().clone())
                   .into());
    }
    t!("Merging into {}", dst.fingerprint());

    merge_children(dst, src);
    merge_containers(&mut dst.userids, &src.userids);
    merge_containers(&mut dst.user_attributes, &src.user_attributes);
    merge_containers(&mut dst.subkeys, &src.subkeys);
    Ok(())
}

impl PrimaryKey {
    /// Merges `other` into this key.
    ///
    /// See the [`merge`] module for details.
    ///
    ///   [`merge`]: ../merge/index.html
    pub fn merge(mut self, other: &PrimaryKey) -> Result<Self> {
        merge(&mut self, other)?;
        Ok(self)
    }
}

fn merge_containers<C: Container + Clone>(dst: &mut Vec<C>, src: &[C]) {
    tracer!(TRACE, "merge_containers", 1);

    let mut index: HashMap<String, usize> = dst.iter().enumerate()
        .map(|(i, c)| (c.common().uuid().to_string(), i))
        .collect();

    for c in src {
        match index.get(c.common().uuid()) {
            Some(&i) => merge_children(&mut dst[i], c),
            None => {
                t!("Adding {} {}", c.common().tag(), c.common().uuid());
                index.insert(c.common().uuid().to_string(), dst.len());
                dst.push(c.clone());
            }
        }
    }
}

// Unions the signatures and uninterpreted packets of two copies of
// the same component.
fn merge_children<C: Container>(dst: &mut C, src: &C) {
    tracer!(TRACE, "merge_children", 1);

    let mut have: HashSet<String> = dst.signatures_ref().iter()
        .map(|s| s.uuid().to_string())
        .collect();
    for s in src.signatures_ref() {
        if have.insert(s.uuid().to_string()) {
            t!("Adding signature {}", s.uuid());
            dst.signatures_mut().push(s.clone());
        }
    }

    let mut have: HashSet<String> = dst.others_ref().iter()
        .map(|p| p.uuid())
        .collect();
    for p in src.others_ref() {
        if have.insert(p.uuid()) {
            dst.others_mut().push(p.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::key;

    fn uuids(key: &PrimaryKey) -> HashSet<String> {
        key.contents().map(|n| n.uuid().to_string()).collect()
    }

    #[test]
    fn add_signature() {
        let unsigned = PrimaryKey::from_bytes(key("alice-unsigned.pgp")).unwrap();
        let signed = PrimaryKey::from_bytes(key("alice-signed.pgp")).unwrap();

        let mut k = unsigned.clone();
        merge(&mut k, &signed).unwrap();
        assert_eq!(k, signed);

        // Merging a subset changes nothing.
        let mut k = signed.clone();
        merge(&mut k, &unsigned).unwrap();
        assert_eq!(k, signed);
    }

    #[test]
    fn idempotent() {
        let a = PrimaryKey::from_bytes(key("sorting.pgp")).unwrap();
        let b = PrimaryKey::from_bytes(key("sorting-partial.pgp")).unwrap();

        let once = a.clone().merge(&b).unwrap();
        let twice = once.clone().merge(&b).unwrap();
        assert_eq!(once, twice);

        let again = once.clone().merge(&once).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn monotonic() {
        let a = PrimaryKey::from_bytes(key("sorting.pgp")).unwrap();
        let b = PrimaryKey::from_bytes(key("sorting-partial.pgp")).unwrap();
        let merged = a.clone().merge(&b).unwrap();

        assert_eq!(merged.userids().len(), 6);
        assert_eq!(merged.subkeys().len(), 4);
        assert_eq!(merged.userids()[5].email().as_deref(),
                   Some("phil.pennock@globnix.net"));
        assert_eq!(merged.contents().count(), a.contents().count() + 2);

        let all = uuids(&merged);
        assert!(uuids(&a).is_subset(&all));
        assert!(uuids(&b).is_subset(&all));

        // The existing components keep their place.
        for (x, y) in a.userids().iter().zip(merged.userids()) {
            assert_eq!(x.uuid(), y.uuid());
        }
    }

    #[test]
    fn others() {
        let with = PrimaryKey::from_bytes(key("trust.pgp")).unwrap();
        let without = crate::parse::KeyParserBuilder::from_bytes(
            key("trust.pgp"))
            .ignore_trust_packets(true)
            .build()
            .next().unwrap().unwrap();
        assert!(without.notices().is_empty());

        let merged = without.merge(&with).unwrap();
        assert_eq!(merged.notices(), with.notices());
    }

    #[test]
    fn mismatch() {
        let mut a = PrimaryKey::from_bytes(key("alice-signed.pgp")).unwrap();
        let b = PrimaryKey::from_bytes(key("nine-uids.pgp")).unwrap();
        let before = a.clone();

        let err = merge(&mut a, &b).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::MergeKeyMismatch(x, y)) => {
                assert_eq!(x, before.fingerprint());
                assert_eq!(y, b.fingerprint());
            }
            e => panic!("Unexpected error: {:?}", e),
        }
        assert_eq!(a, before);
    }
}
