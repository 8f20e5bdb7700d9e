use std::io;

use crate::{
    Error,
    Result,
};
use crate::keyring::{
    PrimaryKey,
    Signature,
    SubKey,
    UserAttribute,
    UserID,
};
use crate::packet::{
    OpaquePacket,
    Tag,
    signature::{SignatureFields, issuer_hint},
};
use crate::parse::{
    KeyParserBuilder,
    KeyParserSettings,
    OpaqueKeyrings,
};

const TRACE : bool = false;

/// The container that signatures and unknown packets currently
/// attach to.
#[derive(Clone, Copy, Debug)]
enum Current {
    PrimaryKey,
    UserID(usize),
    UserAttribute(usize),
    SubKey(usize),
}

/// Builds a key tree from a keyring's packets.
///
/// The grammar is: a public key packet, then any number of User ID,
/// User Attribute and subkey packets, each followed by signatures.
/// Signatures that precede the first component belong to the primary
/// key.  Any other packet is kept in the `others` list of the
/// current container, unless it is a trust packet and the settings
/// say to ignore those.
pub(crate) fn build(packets: Vec<OpaquePacket>, settings: &KeyParserSettings)
                    -> Result<PrimaryKey> {
    tracer!(TRACE, "build", 0);

    let mut packets = packets.into_iter();
    let mut key = match packets.next() {
        Some(p) if p.tag() == Tag::PublicKey => PrimaryKey::new(p)?,
        p => {
            t!("Keyring starts with {:?}", p.map(|p| p.tag()));
            return Err(Error::MissingPrimaryKey.into());
        }
    };
    let keyid = key.keyid();
    t!("Primary key {}", keyid);

    let mut current = Current::PrimaryKey;
    for p in packets {
        match p.tag() {
            Tag::Signature => {
                let sig = match SignatureFields::parse(p.contents()) {
                    Ok(fields) => Signature::from_parts(p, fields),
                    // Only the key's own signatures must decode.
                    Err(e) => match issuer_hint(p.contents()) {
                        Some(issuer) if issuer != keyid => {
                            t!("Keeping undecodable signature by {} on {:?}: {}",
                               issuer, current, e);
                            Signature::from_parts(p, None)
                        }
                        _ => return Err(Error::InvalidSelfSignature(
                            format!("Undecodable signature on {:?}: {}",
                                    current, e)).into()),
                    },
                };

                let is_component = !destructures_to!(
                    Current::PrimaryKey = current);
                if is_component && sig.issued_by(&keyid)
                    && sig.creation_time().is_none()
                {
                    return Err(Error::InvalidSelfSignature(
                        format!("Self-signature on {:?} lacks a creation time",
                                current)).into());
                }

                match current {
                    Current::PrimaryKey => key.signatures.push(sig),
                    Current::UserID(i) => key.userids[i].signatures.push(sig),
                    Current::UserAttribute(i) =>
                        key.user_attributes[i].signatures.push(sig),
                    Current::SubKey(i) => key.subkeys[i].signatures.push(sig),
                }
            }
            Tag::UserID => {
                key.userids.push(UserID::new(p));
                current = Current::UserID(key.userids.len() - 1);
            }
            Tag::UserAttribute => {
                key.user_attributes.push(UserAttribute::new(p));
                current = Current::UserAttribute(key.user_attributes.len() - 1);
            }
            Tag::PublicSubkey => {
                key.subkeys.push(SubKey::new(p)?);
                current = Current::SubKey(key.subkeys.len() - 1);
            }
            Tag::PublicKey =>
                return Err(Error::MalformedPacket(
                    "Second primary key in keyring".into()).into()),
            Tag::Trust if settings.ignore_trust_packets => {
                t!("Ignoring trust packet on {:?}", current);
            }
            tag => {
                t!("Retaining {} on {:?}", tag, current);
                match current {
                    Current::PrimaryKey => key.others.push(p),
                    Current::UserID(i) => key.userids[i].others.push(p),
                    Current::UserAttribute(i) =>
                        key.user_attributes[i].others.push(p),
                    Current::SubKey(i) => key.subkeys[i].others.push(p),
                }
            }
        }
    }

    t!("{} User IDs, {} User Attributes, {} subkeys, {} signatures",
       key.userids.len(), key.user_attributes.len(), key.subkeys.len(),
       key.signatures.len());
    Ok(key)
}

/// An iterator over the keys in a packet stream.
///
/// Yields one result per key: either the key's tree or the error
/// that prevented building it.  An error never stops the iteration;
/// only a corrupt packet header ends the stream early, after
/// reporting it.
///
/// # Examples
///
/// ```rust
/// # fn main() -> sks_openpgp::Result<()> {
/// use sks_openpgp::keyring::KeyParser;
///
/// # let bytes = include_bytes!("../../tests/data/keys/nine-uids.pgp");
/// for key in KeyParser::from_bytes(&bytes[..]) {
///     match key {
///         Ok(key) => println!("{}: {} User IDs", key, key.userids().len()),
///         Err(err) => eprintln!("Skipping key: {}", err),
///     }
/// }
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct KeyParser<'a> {
    keyrings: OpaqueKeyrings<'a>,
}

impl<'a> KeyParser<'a> {
    pub(crate) fn new(keyrings: OpaqueKeyrings<'a>) -> Self {
        KeyParser { keyrings }
    }

    /// Returns a parser for the keys stored in `bytes`, using the
    /// default settings.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        KeyParserBuilder::from_bytes(bytes).build()
    }

    /// Returns a parser for the keys read from `reader`, using the
    /// default settings.
    pub fn from_reader<R>(reader: R) -> Self
        where R: io::Read + Send + Sync + 'a
    {
        KeyParserBuilder::from_reader(reader).build()
    }
}

impl<'a> Iterator for KeyParser<'a> {
    type Item = Result<PrimaryKey>;

    fn next(&mut self) -> Option<Self::Item> {
        tracer!(TRACE, "KeyParser::next", 0);
        let keyring = self.keyrings.next()?;
        let r = keyring.parse();
        match &r {
            Ok(key) => { t!(" => {}", key.fingerprint()); }
            Err(e) => { t!(" => {}", e); }
        }
        Some(r)
    }
}

/// Returns the keys found in `reader`, using the default settings.
pub fn read_keys<'a, R>(reader: R) -> KeyParser<'a>
    where R: io::Read + Send + Sync + 'a
{
    KeyParser::from_reader(reader)
}
