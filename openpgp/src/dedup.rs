//! Removing duplicate packets.
//!
//! Key servers receive the same key from many sources, and the
//! copies accumulate duplicated packets: the same signature appended
//! twice, the same User ID exported by two tools.  Two packets are
//! duplicates if their uuids are equal.
//!
//! Deduplication works on each list of siblings in the tree: the
//! User IDs, User Attributes and subkeys of the primary key, and the
//! signatures and uninterpreted packets of each container.  The first
//! occurrence of a packet keeps its position; later occurrences are
//! removed.  When two containers are duplicates, the later one's
//! signatures and packets are moved to the first before the
//! signatures are deduplicated.
//!
//! In *collect* mode, the surviving node additionally records how
//! many copies it absorbed in its `count`.  Tags that are structural
//! singletons, by default the primary key packet, are exempt from
//! counting; see [`DuplicatePolicy`].
//!
//! A signature that is attached to two different containers stays in
//! both places, since each attachment is a fact of its own.  Collect
//! mode still counts it: copies are counted over the whole tree, in
//! stream order, and the first occurrence absorbs the counts of the
//! later ones.  The [SKS digest] collapses both copies into one.
//!
//!   [`DuplicatePolicy`]: struct.DuplicatePolicy.html
//!   [SKS digest]: ../digest/index.html

use std::collections::{HashMap, HashSet};

use crate::keyring::{Container, PrimaryKey, Signature};
use crate::packet::{OpaquePacket, Tag};

const TRACE : bool = false;

/// Determines which tags are counted in collect mode.
///
/// # Examples
///
/// ```rust
/// use sks_openpgp::dedup::DuplicatePolicy;
/// use sks_openpgp::packet::Tag;
///
/// let p = DuplicatePolicy::default();
/// assert!(! p.is_counted(Tag::PublicKey));
/// assert!(p.is_counted(Tag::Signature));
///
/// let p = p.exempt(Tag::PublicSubkey);
/// assert!(! p.is_counted(Tag::PublicSubkey));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicatePolicy {
    exempt: HashSet<Tag>,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        let mut exempt = HashSet::new();
        exempt.insert(Tag::PublicKey);
        exempt.insert(Tag::SecretKey);
        DuplicatePolicy { exempt }
    }
}

impl DuplicatePolicy {
    /// Returns a policy that counts every tag.
    pub fn count_all() -> Self {
        DuplicatePolicy { exempt: HashSet::new() }
    }

    /// Never counts duplicates of packets with the given tag.
    pub fn exempt(mut self, tag: Tag) -> Self {
        self.exempt.insert(tag);
        self
    }

    /// Returns whether duplicates of packets with the given tag are
    /// counted.
    pub fn is_counted(&self, tag: Tag) -> bool {
        ! self.exempt.contains(&tag)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Drop,
    Collect,
}

/// Removes duplicate packets from the tree.
pub fn drop_duplicates(key: &mut PrimaryKey) {
    dedup(key, Mode::Drop, &DuplicatePolicy::default())
}

/// Removes duplicate packets from the tree, recording in each
/// surviving node how many copies it absorbed.
pub fn collect_duplicates(key: &mut PrimaryKey) {
    collect_duplicates_with(key, &DuplicatePolicy::default())
}

/// Like [`drop_duplicates`], with an explicit policy.
///
/// Dropping is independent of the policy.  The variant exists for
/// symmetry with [`collect_duplicates_with`].
///
///   [`drop_duplicates`]: fn.drop_duplicates.html
///   [`collect_duplicates_with`]: fn.collect_duplicates_with.html
pub fn drop_duplicates_with(key: &mut PrimaryKey, policy: &DuplicatePolicy) {
    dedup(key, Mode::Drop, policy)
}

/// Like [`collect_duplicates`], with an explicit policy.
///
///   [`collect_duplicates`]: fn.collect_duplicates.html
pub fn collect_duplicates_with(key: &mut PrimaryKey,
                               policy: &DuplicatePolicy) {
    dedup(key, Mode::Collect, policy)
}

fn dedup(key: &mut PrimaryKey, mode: Mode, policy: &DuplicatePolicy) {
    tracer!(TRACE, "dedup", 0);
    t!("{:?} on {}", mode, key.fingerprint());

    dedup_containers(&mut key.userids, mode, policy);
    dedup_containers(&mut key.user_attributes, mode, policy);
    dedup_containers(&mut key.subkeys, mode, policy);

    dedup_children(key, mode, policy);
    for c in key.userids.iter_mut() {
        dedup_children(c, mode, policy);
    }
    for c in key.user_attributes.iter_mut() {
        dedup_children(c, mode, policy);
    }
    for c in key.subkeys.iter_mut() {
        dedup_children(c, mode, policy);
    }

    if mode == Mode::Collect && policy.is_counted(Tag::Signature) {
        count_attached_elsewhere(key);
    }

    // The primary key is the keyring; it is never a duplicate.
    key.common_mut().reset_count();
}

// Credits signatures that survive under more than one container to
// their first occurrence in the tree.
fn count_attached_elsewhere(key: &mut PrimaryKey) {
    tracer!(TRACE, "count_attached_elsewhere", 1);

    let mut sigs: Vec<&mut Signature> = key.signatures.iter_mut()
        .chain(key.userids.iter_mut().flat_map(|c| c.signatures.iter_mut()))
        .chain(key.user_attributes.iter_mut()
               .flat_map(|c| c.signatures.iter_mut()))
        .chain(key.subkeys.iter_mut().flat_map(|c| c.signatures.iter_mut()))
        .collect();

    let mut first: HashMap<String, usize> = HashMap::new();
    for i in 0..sigs.len() {
        match first.get(sigs[i].uuid()) {
            Some(&j) => {
                t!("Signature {} is attached more than once", sigs[i].uuid());
                let n = sigs[i].count().saturating_add(1);
                sigs[j].common.add_count(n);
            }
            None => {
                first.insert(sigs[i].uuid().to_string(), i);
            }
        }
    }
}

// Collapses containers with equal uuids into the first occurrence.
fn dedup_containers<C: Container>(list: &mut Vec<C>, mode: Mode,
                                  policy: &DuplicatePolicy) {
    tracer!(TRACE, "dedup_containers", 1);

    let mut first: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<C> = Vec::with_capacity(list.len());
    for mut c in list.drain(..) {
        match first.get(c.common().uuid()) {
            Some(&i) => {
                t!("Merging duplicate {}", c.common().uuid());
                let target = &mut kept[i];
                if mode == Mode::Collect
                    && policy.is_counted(c.common().tag())
                {
                    target.common_mut().add_count(
                        c.common().count().saturating_add(1));
                }
                target.signatures_mut().append(c.signatures_mut());
                target.others_mut().append(c.others_mut());
            }
            None => {
                first.insert(c.common().uuid().to_string(), kept.len());
                kept.push(c);
            }
        }
    }
    *list = kept;
}

// Deduplicates a container's signatures and uninterpreted packets.
fn dedup_children<C: Container>(c: &mut C, mode: Mode,
                                policy: &DuplicatePolicy) {
    tracer!(TRACE, "dedup_children", 1);

    let sigs = c.signatures_mut();
    let mut first: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<Signature> = Vec::with_capacity(sigs.len());
    for s in sigs.drain(..) {
        match first.get(s.uuid()) {
            Some(&i) => {
                t!("Dropping duplicate signature {}", s.uuid());
                if mode == Mode::Collect && policy.is_counted(s.tag()) {
                    kept[i].common.add_count(s.count().saturating_add(1));
                }
            }
            None => {
                first.insert(s.uuid().to_string(), kept.len());
                kept.push(s);
            }
        }
    }
    *sigs = kept;

    let mut seen: HashSet<OpaquePacket> = HashSet::new();
    c.others_mut().retain(|p| seen.insert(p.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::key;

    fn counts(key: &PrimaryKey) -> Vec<usize> {
        key.contents().map(|n| n.count()).collect()
    }

    #[test]
    fn drop() {
        let mut k = PrimaryKey::from_bytes(key("dupsig.pgp")).unwrap();
        assert_eq!(k.contents().count(), 18);
        drop_duplicates(&mut k);
        // pk, direct, u1 s1 third, u2 s2 third, u3 s3, k1 b1, k2 b2.
        assert_eq!(k.contents().count(), 14);
        assert!(counts(&k).iter().all(|c| *c == 0));
        assert_eq!(k.userids()[0].signatures().len(), 2);
        assert_eq!(k.userids()[2].signatures().len(), 1);
        assert_eq!(k.subkeys()[1].signatures().len(), 1);

        // Idempotent.
        let before = k.clone();
        drop_duplicates(&mut k);
        assert_eq!(k, before);
    }

    #[test]
    fn collect() {
        let mut k = PrimaryKey::from_bytes(key("dupsig.pgp")).unwrap();
        collect_duplicates(&mut k);
        assert_eq!(k.contents().count(), 14);
        assert_eq!(k.count(), 0);
        assert_eq!(k.userids()[0].signatures()[0].count(), 1);
        // The third-party certification on the second User ID is
        // credited to its first occurrence, and stays attached.
        assert_eq!(k.userids()[0].signatures()[1].count(), 1);
        assert_eq!(k.userids()[1].signatures()[1].count(), 0);
        assert_eq!(k.userids()[0].signatures()[1].uuid(),
                   k.userids()[1].signatures()[1].uuid());
        assert_eq!(k.userids()[2].signatures()[0].count(), 2);
        assert_eq!(k.subkeys()[1].signatures()[0].count(), 1);
    }

    #[test]
    fn attached_to_two_user_ids() {
        let mut k = PrimaryKey::from_bytes(key("alice-signed.pgp")).unwrap();
        let sig = k.userids[0].signatures[0].clone();
        let mut other = k.userids[0].clone();
        other.common = OpaquePacket::new(Tag::UserID, b"Bob".to_vec()).into();
        other.signatures = vec![sig.clone(), sig];
        k.userids.push(other);
        let before = k.contents().count();

        let mut dropped = k.clone();
        drop_duplicates(&mut dropped);
        assert_eq!(dropped.contents().count(), before - 1);
        assert_eq!(dropped.userids()[1].signatures().len(), 1);

        collect_duplicates(&mut k);
        assert_eq!(k.contents().count(), before - 1);
        // Two more copies were seen after the first one.
        assert_eq!(k.userids()[0].signatures()[0].count(), 2);
        assert_eq!(k.userids()[1].signatures()[0].count(), 1);
        assert_eq!(k.userids()[0].signatures()[1].count(), 0);
    }

    #[test]
    fn duplicate_containers() {
        let bytes = key("alice-signed.pgp");
        let mut k = PrimaryKey::from_bytes(bytes).unwrap();
        let extra_uid = k.userids[0].clone();
        let extra_subkey = k.subkeys[0].clone();
        k.userids.push(extra_uid.clone());
        k.userids.push(extra_uid);
        k.subkeys.push(extra_subkey);

        let mut dropped = k.clone();
        drop_duplicates(&mut dropped);
        assert_eq!(dropped, PrimaryKey::from_bytes(bytes).unwrap());

        collect_duplicates(&mut k);
        assert_eq!(k.userids().len(), 1);
        assert_eq!(k.userids()[0].count(), 2);
        assert_eq!(k.userids()[0].signatures().len(), 2);
        assert!(k.userids()[0].signatures().iter().all(|s| s.count() == 2));
        assert_eq!(k.subkeys()[0].count(), 1);
    }

    #[test]
    fn policy() {
        let bytes = key("alice-signed.pgp");
        let mut k = PrimaryKey::from_bytes(bytes).unwrap();
        let extra = k.subkeys[0].clone();
        k.subkeys.push(extra);

        let policy = DuplicatePolicy::default().exempt(Tag::PublicSubkey);
        collect_duplicates_with(&mut k, &policy);
        assert_eq!(k.subkeys().len(), 1);
        assert_eq!(k.subkeys()[0].count(), 0);
        // The subkey's binding was still collected.
        assert_eq!(k.subkeys()[0].signatures()[0].count(), 1);

        let mut k = PrimaryKey::from_bytes(bytes).unwrap();
        k.subkeys.push(k.subkeys[0].clone());
        drop_duplicates_with(&mut k, &DuplicatePolicy::count_all());
        assert_eq!(k.subkeys().len(), 1);
        assert_eq!(k.subkeys()[0].count(), 0);
    }

    #[test]
    fn others() {
        let mut k = PrimaryKey::from_bytes(key("trust.pgp")).unwrap();
        let before = k.notices().len();
        let extra = k.userids[0].others[0].clone();
        k.userids[0].others.push(extra);
        assert_eq!(k.notices().len(), before + 1);
        drop_duplicates(&mut k);
        assert_eq!(k.notices().len(), before);
    }
}
