//! Key trees.
//!
//! A [`PrimaryKey`] is the root of a tree that owns the key's User
//! IDs, User Attributes and subkeys, each of which owns the
//! signatures that follow it in the packet stream.  Packets the key
//! grammar does not interpret, such as trust packets, are kept in
//! the `others` list of the container they follow.
//!
//! Every node remembers its [`OpaquePacket`], its uuid, and a
//! duplicate count (see the [`dedup`] module).  Children never point
//! back to their parents: algorithms that need the primary key, such
//! as self-signature matching, take it as an argument.
//!
//! Trees are produced by [`KeyParser`], which applies the
//! transferable public key grammar of [Section 11.1 of RFC 4880] to
//! each [`OpaqueKeyring`] in a stream.
//!
//!   [`PrimaryKey`]: struct.PrimaryKey.html
//!   [`OpaquePacket`]: ../packet/struct.OpaquePacket.html
//!   [`dedup`]: ../dedup/index.html
//!   [`KeyParser`]: struct.KeyParser.html
//!   [Section 11.1 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-11.1
//!   [`OpaqueKeyring`]: ../parse/struct.OpaqueKeyring.html

use std::borrow::Cow;
use std::fmt;
use std::iter;
use std::ops::Deref;

use crate::{
    Fingerprint,
    KeyID,
    Notice,
    Result,
};
use crate::packet::{
    Common,
    OpaquePacket,
    key::KeyFields,
    signature::SignatureFields,
    user_attribute::{self, Image},
};
use crate::types::{SignatureType, Timestamp};

mod builder;
pub(crate) use builder::build;
pub use builder::{KeyParser, read_keys};

/// Access to the parts every container node has.
///
/// Deduplication and merging treat all containers alike through
/// this trait.
pub(crate) trait Container {
    fn common(&self) -> &Common;
    fn common_mut(&mut self) -> &mut Common;
    fn signatures_ref(&self) -> &[Signature];
    fn signatures_mut(&mut self) -> &mut Vec<Signature>;
    fn others_ref(&self) -> &[OpaquePacket];
    fn others_mut(&mut self) -> &mut Vec<OpaquePacket>;
}

// Implements `Deref<Target = Common>`, the signature and others
// accessors, and `Container`.
macro_rules! impl_container {
    ($typ:ident) => {
        impl Deref for $typ {
            type Target = Common;

            fn deref(&self) -> &Self::Target {
                &self.common
            }
        }

        impl $typ {
            /// Returns the signatures attached to this component, in
            /// stream order.
            pub fn signatures(&self) -> &[Signature] {
                &self.signatures
            }

            /// Returns the uninterpreted packets that followed this
            /// component, in stream order.
            pub fn others(&self) -> &[OpaquePacket] {
                &self.others
            }
        }

        impl Container for $typ {
            fn common(&self) -> &Common {
                &self.common
            }

            fn common_mut(&mut self) -> &mut Common {
                &mut self.common
            }

            fn signatures_ref(&self) -> &[Signature] {
                &self.signatures
            }

            fn signatures_mut(&mut self) -> &mut Vec<Signature> {
                &mut self.signatures
            }

            fn others_ref(&self) -> &[OpaquePacket] {
                &self.others
            }

            fn others_mut(&mut self) -> &mut Vec<OpaquePacket> {
                &mut self.others
            }
        }
    };
}

/// A signature node.
///
/// The signature's fields are decoded for version 3 and version 4
/// signatures.  Other versions, and third-party signatures that do
/// not decode, are carried without interpretation, and all of their
/// accessors return `None`.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    pub(crate) common: Common,
    fields: Option<SignatureFields>,
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Signature")
            .field("uuid", &self.uuid())
            .field("typ", &self.typ())
            .field("issuer", &self.issuer())
            .field("creation_time", &self.creation_time())
            .field("count", &self.count())
            .finish()
    }
}

impl Deref for Signature {
    type Target = Common;

    fn deref(&self) -> &Self::Target {
        &self.common
    }
}

impl Signature {
    /// Decodes a signature packet.
    pub fn new(packet: OpaquePacket) -> Result<Self> {
        let fields = SignatureFields::parse(packet.contents())?;
        Ok(Signature::from_parts(packet, fields))
    }

    pub(crate) fn from_parts(packet: OpaquePacket,
                             fields: Option<SignatureFields>) -> Self {
        Signature { common: packet.into(), fields }
    }

    /// Returns the decoded fields, if the version is supported.
    pub fn fields(&self) -> Option<&SignatureFields> {
        self.fields.as_ref()
    }

    /// Returns the signature's type.
    pub fn typ(&self) -> Option<SignatureType> {
        self.fields.as_ref().map(|f| f.typ())
    }

    /// Returns the key ID of the key that claims to have made the
    /// signature.
    pub fn issuer(&self) -> Option<KeyID> {
        self.fields.as_ref().and_then(|f| f.issuer())
    }

    /// Returns the signature's creation time.
    pub fn creation_time(&self) -> Option<Timestamp> {
        self.fields.as_ref().and_then(|f| f.creation_time())
    }

    /// Returns whether the signature claims to be made by `keyid`.
    ///
    /// This is a structural check: the signature is not verified.
    pub fn issued_by(&self, keyid: &KeyID) -> bool {
        self.issuer().as_ref() == Some(keyid)
    }
}

/// A User ID node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserID {
    pub(crate) common: Common,
    pub(crate) signatures: Vec<Signature>,
    pub(crate) others: Vec<OpaquePacket>,
}
impl_container!(UserID);

impl UserID {
    pub(crate) fn new(packet: OpaquePacket) -> Self {
        UserID {
            common: packet.into(),
            signatures: Vec::new(),
            others: Vec::new(),
        }
    }

    /// Returns the raw User ID.
    pub fn value(&self) -> &[u8] {
        self.packet().contents()
    }

    /// Returns the User ID as text, typically `Name (Comment)
    /// <email>`.
    ///
    /// User IDs are supposed to be UTF-8, but key servers see
    /// everything; invalid sequences are replaced.
    pub fn keywords(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.value())
    }

    /// Returns the email address, i.e. the text between the last
    /// pair of angle brackets, if any.
    pub fn email(&self) -> Option<String> {
        let keywords = self.keywords();
        let start = keywords.rfind('<')?;
        let end = start + keywords[start..].find('>')?;
        Some(keywords[start + 1..end].to_string())
    }

    /// Returns the User ID and its signatures.
    pub fn contents(&self) -> impl Iterator<Item = Node<'_>> {
        iter::once(Node::UserID(self))
            .chain(self.signatures.iter().map(Node::Signature))
    }
}

/// A User Attribute node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAttribute {
    pub(crate) common: Common,
    pub(crate) signatures: Vec<Signature>,
    pub(crate) others: Vec<OpaquePacket>,
}
impl_container!(UserAttribute);

impl UserAttribute {
    pub(crate) fn new(packet: OpaquePacket) -> Self {
        UserAttribute {
            common: packet.into(),
            signatures: Vec::new(),
            others: Vec::new(),
        }
    }

    /// Returns the images embedded in the User Attribute.
    ///
    /// Fails if the attribute's subpackets are malformed.
    pub fn images(&self) -> Result<Vec<Image>> {
        user_attribute::images(self.packet().contents())
    }

    /// Returns the User Attribute and its signatures.
    pub fn contents(&self) -> impl Iterator<Item = Node<'_>> {
        iter::once(Node::UserAttribute(self))
            .chain(self.signatures.iter().map(Node::Signature))
    }
}

/// A subkey node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubKey {
    pub(crate) common: Common,
    fields: KeyFields,
    pub(crate) signatures: Vec<Signature>,
    pub(crate) others: Vec<OpaquePacket>,
}
impl_container!(SubKey);

impl SubKey {
    pub(crate) fn new(packet: OpaquePacket) -> Result<Self> {
        let fields = KeyFields::parse(packet.contents())?;
        Ok(SubKey {
            common: packet.into(),
            fields,
            signatures: Vec::new(),
            others: Vec::new(),
        })
    }

    /// Returns the subkey's decoded key fields.
    pub fn fields(&self) -> &KeyFields {
        &self.fields
    }

    /// Returns the subkey's fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        self.fields.fingerprint()
    }

    /// Returns the subkey's key ID.
    pub fn keyid(&self) -> KeyID {
        self.fields.keyid()
    }

    /// Returns the subkey and its signatures.
    pub fn contents(&self) -> impl Iterator<Item = Node<'_>> {
        iter::once(Node::SubKey(self))
            .chain(self.signatures.iter().map(Node::Signature))
    }
}

/// The root of a key tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryKey {
    pub(crate) common: Common,
    fields: KeyFields,
    pub(crate) signatures: Vec<Signature>,
    pub(crate) others: Vec<OpaquePacket>,
    pub(crate) userids: Vec<UserID>,
    pub(crate) user_attributes: Vec<UserAttribute>,
    pub(crate) subkeys: Vec<SubKey>,
}
impl_container!(PrimaryKey);

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

impl PrimaryKey {
    pub(crate) fn new(packet: OpaquePacket) -> Result<Self> {
        let fields = KeyFields::parse(packet.contents())?;
        Ok(PrimaryKey {
            common: packet.into(),
            fields,
            signatures: Vec::new(),
            others: Vec::new(),
            userids: Vec::new(),
            user_attributes: Vec::new(),
            subkeys: Vec::new(),
        })
    }

    /// Parses exactly one key from `bytes`.
    ///
    /// Fails if `bytes` holds no key, or more than one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut keys = KeyParser::from_bytes(bytes);
        let key = match keys.next() {
            Some(key) => key?,
            None => return Err(crate::Error::MissingPrimaryKey.into()),
        };
        if keys.next().is_some() {
            return Err(crate::Error::InvalidArgument(
                "Expected a single key, found more".into()).into());
        }
        Ok(key)
    }

    /// Returns the primary key's decoded key fields.
    pub fn fields(&self) -> &KeyFields {
        &self.fields
    }

    /// Returns the key's fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        self.fields.fingerprint()
    }

    /// Returns the key's key ID.
    pub fn keyid(&self) -> KeyID {
        self.fields.keyid()
    }

    /// Returns the key's short ID, the last eight hex digits of its
    /// key ID.
    pub fn short_id(&self) -> String {
        self.keyid().to_short_hex()
    }

    /// Returns the User IDs in insertion order.
    pub fn userids(&self) -> &[UserID] {
        &self.userids
    }

    /// Returns the User Attributes in insertion order.
    pub fn user_attributes(&self) -> &[UserAttribute] {
        &self.user_attributes
    }

    /// Returns the subkeys in insertion order.
    pub fn subkeys(&self) -> &[SubKey] {
        &self.subkeys
    }

    /// Iterates over every node of the tree.
    ///
    /// The order is: the primary key and its signatures, then each
    /// User ID, User Attribute, and subkey, each followed by its
    /// signatures.  Packets in `others` lists are not nodes and are
    /// not included.
    ///
    /// The iterator borrows the tree; call `contents` again to start
    /// over.
    pub fn contents(&self) -> impl Iterator<Item = Node<'_>> {
        iter::once(Node::PrimaryKey(self))
            .chain(self.signatures.iter().map(Node::Signature))
            .chain(self.userids.iter().flat_map(|u| u.contents()))
            .chain(self.user_attributes.iter().flat_map(|u| u.contents()))
            .chain(self.subkeys.iter().flat_map(|k| k.contents()))
    }

    /// Lists the packets that were retained without interpretation.
    pub fn notices(&self) -> Vec<Notice> {
        fn retained<C: Container>(c: &C, notices: &mut Vec<Notice>) {
            let owner = c.common().uuid();
            for p in c.others_ref() {
                notices.push(Notice::UnsupportedPacketRetained {
                    tag: p.tag(),
                    owner: owner.to_string(),
                });
            }
        }

        let mut notices = Vec::new();
        retained(self, &mut notices);
        self.userids.iter().for_each(|c| retained(c, &mut notices));
        self.user_attributes.iter().for_each(|c| retained(c, &mut notices));
        self.subkeys.iter().for_each(|c| retained(c, &mut notices));
        notices
    }
}

/// A reference to a node of a key tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node<'a> {
    /// The primary key.
    PrimaryKey(&'a PrimaryKey),
    /// A subkey.
    SubKey(&'a SubKey),
    /// A User ID.
    UserID(&'a UserID),
    /// A User Attribute.
    UserAttribute(&'a UserAttribute),
    /// A signature.
    Signature(&'a Signature),
}

impl<'a> Deref for Node<'a> {
    type Target = Common;

    fn deref(&self) -> &Self::Target {
        match self {
            Node::PrimaryKey(n) => &n.common,
            Node::SubKey(n) => &n.common,
            Node::UserID(n) => &n.common,
            Node::UserAttribute(n) => &n.common,
            Node::Signature(n) => &n.common,
        }
    }
}

impl<'a> Node<'a> {
    /// Returns the node's packet.
    ///
    /// Unlike the method reached through `Deref`, the reference
    /// lives as long as the tree.
    pub fn packet(&self) -> &'a OpaquePacket {
        match *self {
            Node::PrimaryKey(n) => n.common.packet(),
            Node::SubKey(n) => n.common.packet(),
            Node::UserID(n) => n.common.packet(),
            Node::UserAttribute(n) => n.common.packet(),
            Node::Signature(n) => n.common.packet(),
        }
    }
}
