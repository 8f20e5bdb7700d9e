//! Test data.
//!
//! This module includes the test data from `openpgp/tests/data` in a
//! structured way.

use std::fmt;

pub struct Test {
    path: &'static str,
    pub bytes: &'static [u8],
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "openpgp/tests/data/{}", self.path)
    }
}

macro_rules! t {
    ( $path: expr ) => {
        &Test {
            path: $path,
            bytes: include_bytes!(concat!("../tests/data/", $path)),
        }
    }
}

pub const KEYS: &[&Test] = &[
    t!("keys/alice-old-format.pgp"),
    t!("keys/alice-signed.pgp"),
    t!("keys/alice-unsigned.pgp"),
    t!("keys/bad-selfsig.pgp"),
    t!("keys/dupsig.pgp"),
    t!("keys/nine-uids.pgp"),
    t!("keys/revocation-cert.pgp"),
    t!("keys/sorting-partial.pgp"),
    t!("keys/sorting.pgp"),
    t!("keys/trust.pgp"),
    t!("keys/uat.pgp"),
];

/// Returns the content of the given file below `openpgp/tests/data/keys`.
pub fn key(name: &str) -> &'static [u8] {
    let path = format!("keys/{}", name);
    KEYS.iter().find(|t| t.path == path)
        .map(|t| t.bytes)
        .unwrap_or_else(|| panic!("No such test key: {}", name))
}

#[test]
fn every_key_is_readable() {
    for t in KEYS {
        let keyrings = crate::parse::read_opaque_keyrings(t.bytes)
            .collect::<Vec<_>>();
        assert!(!keyrings.is_empty(), "{}", t);
        assert!(keyrings.iter().all(|k| k.error().is_none()), "{}", t);
    }
}
