//! Ranking components by their self-signatures.
//!
//! A key server presents a key's User IDs and subkeys best first:
//! components with a current self-signature precede revoked, expired
//! and unbound ones, and among the current ones, the most recently
//! certified comes first.
//!
//! Only self-signatures are considered, that is signatures whose
//! issuer is the primary key.  Signatures are matched structurally;
//! they are not verified.  All decisions are relative to an explicit
//! reference time, and self-signatures created after the reference
//! time are ignored.

use std::cmp::Reverse;
use std::time::SystemTime;

use crate::KeyID;
use crate::keyring::{
    PrimaryKey,
    Signature,
    SubKey,
    UserAttribute,
    UserID,
};
use crate::types::{SignatureType, Timestamp};

const TRACE : bool = false;

/// The state of a component at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
    /// The component is bound by a self-signature created at `since`.
    Valid {
        /// The creation time of the applicable self-signature.
        since: Timestamp,
        /// When the binding, or for subkeys the key, expires.
        expires: Option<Timestamp>,
    },
    /// The newest self-signature, or the key it binds, expired at
    /// `at`.
    Expired {
        /// The expiration time.
        at: Timestamp,
    },
    /// The component was revoked at `at`.
    Revoked {
        /// The creation time of the revocation.
        at: Timestamp,
    },
    /// The component has no self-signature.
    Unbound,
}

impl Validity {
    /// Returns whether the component is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid { .. })
    }
}

/// A component's self-signatures, newest first.
#[derive(Clone, Debug)]
pub struct SelfSigs<'a> {
    certifications: Vec<&'a Signature>,
    revocations: Vec<&'a Signature>,
}

impl<'a> SelfSigs<'a> {
    // Splits the signatures issued by `keyid` into bindings and
    // revocations.  Signatures without a creation time cannot be
    // ordered and are skipped.
    fn new(sigs: &'a [Signature], keyid: &KeyID,
           binding: fn(SignatureType) -> bool, revocation: SignatureType)
           -> Self
    {
        let mut certifications = Vec::new();
        let mut revocations = Vec::new();
        for s in sigs.iter().filter(|s| s.issued_by(keyid)) {
            match (s.typ(), s.creation_time()) {
                (Some(typ), Some(_)) if binding(typ) =>
                    certifications.push(s),
                (Some(typ), Some(_)) if typ == revocation =>
                    revocations.push(s),
                _ => (),
            }
        }
        certifications.sort_by_key(|s| Reverse(s.creation_time()));
        revocations.sort_by_key(|s| Reverse(s.creation_time()));
        SelfSigs { certifications, revocations }
    }

    fn for_userid(sigs: &'a [Signature], keyid: &KeyID) -> Self {
        Self::new(sigs, keyid, |t| t.is_certification(),
                  SignatureType::CertificationRevocation)
    }

    fn for_subkey(sigs: &'a [Signature], keyid: &KeyID) -> Self {
        Self::new(sigs, keyid, |t| t == SignatureType::SubkeyBinding,
                  SignatureType::SubkeyRevocation)
    }

    /// Returns the certifications or binding signatures, newest
    /// first.
    pub fn certifications(&self) -> &[&'a Signature] {
        &self.certifications
    }

    /// Returns the revocations, newest first.
    pub fn revocations(&self) -> &[&'a Signature] {
        &self.revocations
    }

    /// Determines the component's validity at time `t`.
    ///
    /// The newest certification created at or before `t` applies.
    /// A revocation created at or before `t` that is at least as new
    /// as that certification revokes the component.  The
    /// certification's signature expiration, and for subkey bindings
    /// the key expiration, are measured from its creation time.
    pub fn validity_at<T>(&self, t: T) -> Validity
        where T: Into<Timestamp>
    {
        let t = t.into();
        let not_after = |s: &&&'a Signature| {
            s.creation_time().map(|c| c <= t).unwrap_or(false)
        };
        let cert = self.certifications.iter().find(not_after);
        let rev = self.revocations.iter().find(not_after);

        let cert = match (cert, rev) {
            (None, None) => return Validity::Unbound,
            (None, Some(r)) =>
                return Validity::Revoked { at: created(r) },
            (Some(c), Some(r)) if created(r) >= created(c) =>
                return Validity::Revoked { at: created(r) },
            (Some(c), _) => c,
        };

        let since = created(cert);
        let mut expires = cert.fields().and_then(|f| f.signature_expires_at());
        if cert.typ() == Some(SignatureType::SubkeyBinding) {
            let key_expires = cert.fields()
                .and_then(|f| f.key_expiration_time())
                .map(|d| since.checked_add(d)
                     .unwrap_or_else(|| Timestamp::from(std::u32::MAX)));
            expires = match (expires, key_expires) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }

        match expires {
            Some(at) if at <= t => Validity::Expired { at },
            _ => Validity::Valid { since, expires },
        }
    }
}

fn created(s: &Signature) -> Timestamp {
    s.creation_time().unwrap_or_default()
}

impl UserID {
    /// Returns this User ID's self-signatures.
    pub fn self_sigs<'a>(&'a self, primary: &PrimaryKey) -> SelfSigs<'a> {
        SelfSigs::for_userid(self.signatures(), &primary.keyid())
    }
}

impl UserAttribute {
    /// Returns this User Attribute's self-signatures.
    pub fn self_sigs<'a>(&'a self, primary: &PrimaryKey) -> SelfSigs<'a> {
        SelfSigs::for_userid(self.signatures(), &primary.keyid())
    }
}

impl SubKey {
    /// Returns this subkey's binding signatures and revocations.
    pub fn self_sigs<'a>(&'a self, primary: &PrimaryKey) -> SelfSigs<'a> {
        SelfSigs::for_subkey(self.signatures(), &primary.keyid())
    }
}

// Valid components first, most recent first; everything else keeps
// its relative order.
fn rank(v: Validity) -> (u8, Reverse<Timestamp>) {
    match v {
        Validity::Valid { since, .. } => (0, Reverse(since)),
        _ => (1, Reverse(Timestamp::default())),
    }
}

/// Orders the key's User IDs, User Attributes and subkeys by their
/// validity at `reference_time`.
///
/// Valid components come first, the one with the most recent
/// self-signature leading.  They are followed by the revoked,
/// expired and unbound components in their previous order.  The
/// sort is stable.
///
/// # Examples
///
/// ```rust
/// # fn main() -> sks_openpgp::Result<()> {
/// use std::time::{Duration, UNIX_EPOCH};
/// use sks_openpgp as openpgp;
/// use openpgp::PrimaryKey;
///
/// # let bytes = include_bytes!("../tests/data/keys/nine-uids.pgp");
/// let mut key = PrimaryKey::from_bytes(&bytes[..])?;
/// openpgp::resolve::sort(&mut key, UNIX_EPOCH + Duration::new(1388534400, 0));
/// assert_eq!(key.userids()[0].email().as_deref(), Some("nine8@example.org"));
/// # Ok(()) }
/// ```
pub fn sort(key: &mut PrimaryKey, reference_time: SystemTime) {
    tracer!(TRACE, "sort", 0);

    let t = Timestamp::saturating_from(reference_time);
    let keyid = key.keyid();
    t!("Sorting {} at {}", keyid, t);

    key.userids.sort_by_cached_key(|u| {
        let v = SelfSigs::for_userid(u.signatures(), &keyid).validity_at(t);
        t!("{}: {:?}", u.keywords(), v);
        rank(v)
    });
    key.user_attributes.sort_by_cached_key(|u| {
        rank(SelfSigs::for_userid(u.signatures(), &keyid).validity_at(t))
    });
    key.subkeys.sort_by_cached_key(|k| {
        let v = SelfSigs::for_subkey(k.signatures(), &keyid).validity_at(t);
        t!("{}: {:?}", k.keyid(), v);
        rank(v)
    });
}
