//! Canonicalization core for OpenPGP key servers.
//!
//! A key server exchanges key material with its peers and has to
//! decide, cheaply and without looking at the cryptography, whether
//! two copies of a key are the same.  This crate provides the
//! machinery for that:
//!
//!   - an [opaque packet reader] that splits an unarmored byte
//!     stream of [RFC 4880] packets into `(tag, contents)` pairs and
//!     groups them into keyrings,
//!   - a [tree builder] that imposes the transferable public key
//!     grammar on those packets and yields one result per key,
//!   - a [deduplicator] that collapses byte-identical packets,
//!   - the [SKS digest], a hash over the sorted set of distinct
//!     packets that is stable under reordering and duplication,
//!   - a [merger] that unions two views of the same key, and
//!   - a [resolver] that ranks User IDs and subkeys by their
//!     currently applicable self-signatures.
//!
//! Signatures are interpreted structurally: their type, creation
//! time and issuer are used, but they are never verified.  Armor,
//! storage and the reconciliation protocol are the caller's business.
//!
//! # Examples
//!
//! ```rust
//! # fn main() -> sks_openpgp::Result<()> {
//! use sks_openpgp as openpgp;
//! use openpgp::keyring::KeyParser;
//!
//! # let bytes = include_bytes!("../tests/data/keys/alice-signed.pgp");
//! for key in KeyParser::from_bytes(&bytes[..]) {
//!     let mut key = key?;
//!     openpgp::dedup::drop_duplicates(&mut key);
//!     let digest = openpgp::digest::sks_digest(&key, md5::Md5::default());
//!     println!("{} {}", key.fingerprint(), digest);
//! }
//! # Ok(()) }
//! ```
//!
//! [RFC 4880]: https://tools.ietf.org/html/rfc4880
//! [opaque packet reader]: parse/index.html
//! [tree builder]: keyring/index.html
//! [deduplicator]: dedup/index.html
//! [SKS digest]: digest/index.html
//! [merger]: merge/index.html
//! [resolver]: resolve/index.html

#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

#[macro_use]
mod macros;

pub mod types;

mod keyid;
pub use keyid::KeyID;
mod fingerprint;
pub use fingerprint::Fingerprint;

pub mod packet;
use packet::Tag;

pub mod parse;
pub mod serialize;

pub mod keyring;
pub use keyring::PrimaryKey;

pub mod dedup;
pub mod digest;
pub mod merge;
pub mod resolve;

#[cfg(test)]
mod tests;

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

/// Errors returned by this crate.
///
/// Functions return these wrapped in an [`anyhow::Error`]; use
/// `downcast_ref::<Error>()` to inspect them.
///
///   [`anyhow::Error`]: https://docs.rs/anyhow/*/anyhow/struct.Error.html
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A packet header or length could not be decoded.
    ///
    /// This terminates the keyring that was being read.
    #[error("Malformed packet stream: {0}")]
    MalformedPacketStream(String),

    /// A keyring does not start with a public key packet.
    #[error("primary public key not found")]
    MissingPrimaryKey,

    /// A signature on a component of the key could not be
    /// interpreted.
    #[error("Invalid self-signature: {0}")]
    InvalidSelfSignature(String),

    /// Two keys with different primary keys were merged.
    #[error("Primary key mismatch: {0} is not {1}")]
    MergeKeyMismatch(Fingerprint, Fingerprint),

    /// A packet's body could not be decoded.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Outcomes worth reporting that are not errors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A packet the tree builder does not interpret was kept in the
    /// `others` list of the container identified by `owner`.
    UnsupportedPacketRetained {
        /// The packet's tag.
        tag: Tag,
        /// The uuid of the container holding the packet.
        owner: String,
    },
}
