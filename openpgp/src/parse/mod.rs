//! Reading packets.
//!
//! This module contains the opaque packet reader, which splits an
//! unarmored byte stream into [`OpaquePacket`]s, and groups them into
//! [`OpaqueKeyring`]s, one per key.  It does not interpret the
//! packets beyond their headers: packets with unknown tags are
//! passed through.
//!
//! The [`KeyParserBuilder`] configures both the opaque reader and the
//! [tree builder] that turns opaque keyrings into [`PrimaryKey`]s.
//!
//!   [`OpaquePacket`]: ../packet/struct.OpaquePacket.html
//!   [`OpaqueKeyring`]: struct.OpaqueKeyring.html
//!   [`KeyParserBuilder`]: struct.KeyParserBuilder.html
//!   [tree builder]: ../keyring/index.html
//!   [`PrimaryKey`]: ../keyring/struct.PrimaryKey.html

use std::fmt;
use std::io;

use buffered_reader::BufferedReader;

use crate::{
    Error,
    Result,
};
use crate::keyring::{KeyParser, PrimaryKey};
use crate::packet::{
    header::{BodyLength, DEFAULT_MAX_PACKET_LENGTH},
    Header,
    OpaquePacket,
    Tag,
};

const TRACE : bool = false;

/// Settings shared by the opaque reader and the tree builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct KeyParserSettings {
    /// The largest packet body accepted.
    pub(crate) max_packet_length: u32,
    /// Whether trust packets are skipped instead of retained.
    pub(crate) ignore_trust_packets: bool,
}

impl Default for KeyParserSettings {
    fn default() -> Self {
        KeyParserSettings {
            max_packet_length: DEFAULT_MAX_PACKET_LENGTH,
            ignore_trust_packets: false,
        }
    }
}

/// Converts an error into this crate's `Error`, treating anything
/// unexpected as stream corruption.
fn into_stream_error(e: anyhow::Error) -> Error {
    match e.downcast::<Error>() {
        Ok(e) => e,
        Err(e) => Error::MalformedPacketStream(e.to_string()),
    }
}

fn truncated_body(tag: Tag) -> impl Fn(io::Error) -> anyhow::Error {
    move |e| Error::MalformedPacketStream(
        format!("Truncated {}: {}", tag, e)).into()
}

/// Reads opaque packets from a byte stream.
///
/// The reader stops at the end of the stream, or after returning the
/// first error.  Partial body chunks are concatenated, and old-format
/// packets with indeterminate length extend to the end of the stream.
pub struct PacketReader<'a> {
    bio: Box<dyn BufferedReader<()> + 'a>,
    max_packet_length: u32,
    done: bool,
}

impl<'a> fmt::Debug for PacketReader<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PacketReader")
            .field("max_packet_length", &self.max_packet_length)
            .field("done", &self.done)
            .finish()
    }
}

impl<'a> PacketReader<'a> {
    pub(crate) fn new(bio: Box<dyn BufferedReader<()> + 'a>,
                      max_packet_length: u32) -> Self {
        PacketReader { bio, max_packet_length, done: false }
    }

    /// Returns a reader for packets stored in `bytes`.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(Box::new(buffered_reader::Memory::new(bytes)),
                  DEFAULT_MAX_PACKET_LENGTH)
    }

    /// Returns a reader for packets read from `reader`.
    pub fn from_reader<R>(reader: R) -> Self
        where R: io::Read + Send + Sync + 'a
    {
        Self::new(Box::new(buffered_reader::Generic::new(reader, None)),
                  DEFAULT_MAX_PACKET_LENGTH)
    }

    fn read_packet(&mut self) -> Result<Option<OpaquePacket>> {
        tracer!(TRACE, "PacketReader::read_packet", 0);

        if self.bio.data(1)?.is_empty() {
            t!("EOF");
            return Ok(None);
        }

        let header = Header::parse(&mut *self.bio)?;
        header.valid(self.max_packet_length)?;
        let tag = header.ctb().tag();
        let max = self.max_packet_length as usize;

        let contents = match *header.length() {
            BodyLength::Full(l) =>
                self.bio.steal(l as usize).map_err(truncated_body(tag))?,
            BodyLength::Partial(l) => {
                let mut contents = Vec::new();
                let mut chunk = l;
                loop {
                    if contents.len() + chunk as usize > max {
                        return Err(Error::MalformedPacketStream(
                            format!("{} exceeds {} bytes", tag, max))
                                   .into());
                    }
                    contents.extend_from_slice(
                        &self.bio.steal(chunk as usize)
                            .map_err(truncated_body(tag))?);
                    match BodyLength::parse_new_format(&mut *self.bio)? {
                        BodyLength::Partial(l) => chunk = l,
                        BodyLength::Full(l) => {
                            if contents.len() + l as usize > max {
                                return Err(Error::MalformedPacketStream(
                                    format!("{} exceeds {} bytes", tag, max))
                                           .into());
                            }
                            contents.extend_from_slice(
                                &self.bio.steal(l as usize)
                                    .map_err(truncated_body(tag))?);
                            break;
                        }
                        BodyLength::Indeterminate =>
                            return Err(Error::MalformedPacketStream(
                                "Indeterminate length in partial body".into())
                                       .into()),
                    }
                }
                contents
            }
            BodyLength::Indeterminate => {
                // `data` only returns less than asked for at EOF.
                let available = self.bio.data(max.saturating_add(1))
                    .map_err(truncated_body(tag))?.len();
                if available > max {
                    return Err(Error::MalformedPacketStream(
                        format!("{} exceeds {} bytes", tag, max)).into());
                }
                self.bio.steal_eof().map_err(truncated_body(tag))?
            }
        };

        if contents.len() > max {
            return Err(Error::MalformedPacketStream(
                format!("{} of {} bytes exceeds {} bytes",
                        tag, contents.len(), max)).into());
        }

        t!("{}, {} bytes", tag, contents.len());
        Ok(Some(OpaquePacket::new(tag, contents)))
    }
}

impl<'a> Iterator for PacketReader<'a> {
    type Item = Result<OpaquePacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_packet() {
            Ok(Some(p)) => Some(Ok(p)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// The packets of one key, as found in the stream.
///
/// An opaque keyring starts at a public key packet and extends up to
/// the next one.  Packets preceding the first public key of a stream
/// form a keyring of their own.
///
/// If the stream was corrupt, the keyring holds the packets read
/// before the corruption was detected, and the error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpaqueKeyring {
    packets: Vec<OpaquePacket>,
    error: Option<Error>,
    settings: Option<KeyParserSettings>,
}

impl From<Vec<OpaquePacket>> for OpaqueKeyring {
    fn from(packets: Vec<OpaquePacket>) -> Self {
        OpaqueKeyring { packets, error: None, settings: None }
    }
}

impl OpaqueKeyring {
    /// Returns the keyring's packets in stream order.
    pub fn packets(&self) -> &[OpaquePacket] {
        &self.packets
    }

    /// Returns the keyring's packets, consuming the keyring.
    pub fn into_packets(self) -> Vec<OpaquePacket> {
        self.packets
    }

    /// Returns the error that terminated reading this keyring, if
    /// any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Sorts the packets into canonical order.
    pub fn sort(&mut self) {
        self.packets.sort();
    }

    /// Builds the key tree.
    ///
    /// Fails with the keyring's error if reading was cut short, and
    /// otherwise with the first grammar violation.
    pub fn parse(self) -> Result<PrimaryKey> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        let settings = self.settings.unwrap_or_default();
        crate::keyring::build(self.packets, &settings)
    }
}

/// Iterates over the keyrings in a stream.
///
/// Created by [`read_opaque_keyrings`] or
/// [`KeyParserBuilder::into_opaque_keyrings`].  A corrupt packet
/// header ends the stream: the keyring being read is returned with
/// the error, and no further keyrings are produced.
///
///   [`read_opaque_keyrings`]: fn.read_opaque_keyrings.html
///   [`KeyParserBuilder::into_opaque_keyrings`]: struct.KeyParserBuilder.html#method.into_opaque_keyrings
#[derive(Debug)]
pub struct OpaqueKeyrings<'a> {
    reader: PacketReader<'a>,
    pending: Option<OpaquePacket>,
    settings: KeyParserSettings,
}

impl<'a> OpaqueKeyrings<'a> {
    pub(crate) fn new(bio: Box<dyn BufferedReader<()> + 'a>,
                      settings: KeyParserSettings) -> Self {
        OpaqueKeyrings {
            reader: PacketReader::new(bio, settings.max_packet_length),
            pending: None,
            settings,
        }
    }
}

impl<'a> Iterator for OpaqueKeyrings<'a> {
    type Item = OpaqueKeyring;

    fn next(&mut self) -> Option<Self::Item> {
        tracer!(TRACE, "OpaqueKeyrings::next", 0);

        let mut keyring = OpaqueKeyring {
            packets: Vec::new(),
            error: None,
            settings: Some(self.settings),
        };
        keyring.packets.extend(self.pending.take());

        loop {
            match self.reader.next() {
                None => break,
                Some(Ok(p)) => {
                    if p.tag() == Tag::PublicKey
                        && ! keyring.packets.is_empty()
                    {
                        self.pending = Some(p);
                        break;
                    }
                    keyring.packets.push(p);
                }
                Some(Err(e)) => {
                    let e = into_stream_error(e);
                    t!("Keyring of {} packets cut short: {}",
                       keyring.packets.len(), e);
                    keyring.error = Some(e);
                    return Some(keyring);
                }
            }
        }

        if keyring.packets.is_empty() {
            None
        } else {
            t!("Keyring of {} packets", keyring.packets.len());
            Some(keyring)
        }
    }
}

/// Returns the opaque keyrings found in `reader`, using the default
/// settings.
pub fn read_opaque_keyrings<'a, R>(reader: R) -> OpaqueKeyrings<'a>
    where R: io::Read + Send + Sync + 'a
{
    KeyParserBuilder::from_reader(reader).into_opaque_keyrings()
}

/// A builder for configuring a [`KeyParser`].
///
/// Since the default settings are usually appropriate, this mechanism
/// will only be needed in exceptional circumstances.  Instead use,
/// for instance, [`KeyParser::from_bytes`] or [`read_keys`].
///
///   [`KeyParser`]: ../keyring/struct.KeyParser.html
///   [`KeyParser::from_bytes`]: ../keyring/struct.KeyParser.html#method.from_bytes
///   [`read_keys`]: ../keyring/fn.read_keys.html
///
/// # Examples
///
/// ```rust
/// # fn main() -> sks_openpgp::Result<()> {
/// use sks_openpgp::parse::KeyParserBuilder;
///
/// # let bytes = include_bytes!("../../tests/data/keys/trust.pgp");
/// let keys = KeyParserBuilder::from_bytes(&bytes[..])
///     .max_packet_length(64 * 1024)
///     .ignore_trust_packets(true)
///     .build()
///     .collect::<sks_openpgp::Result<Vec<_>>>()?;
/// assert_eq!(keys.len(), 1);
/// assert!(keys[0].notices().is_empty());
/// # Ok(()) }
/// ```
pub struct KeyParserBuilder<'a> {
    bio: Box<dyn BufferedReader<()> + 'a>,
    settings: KeyParserSettings,
}

impl<'a> fmt::Debug for KeyParserBuilder<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyParserBuilder")
            .field("settings", &self.settings)
            .finish()
    }
}

impl<'a> KeyParserBuilder<'a> {
    /// Creates a `KeyParserBuilder` for keys stored in a
    /// `std::io::Read` object.
    pub fn from_reader<R>(reader: R) -> Self
        where R: io::Read + Send + Sync + 'a
    {
        KeyParserBuilder {
            bio: Box::new(buffered_reader::Generic::new(reader, None)),
            settings: KeyParserSettings::default(),
        }
    }

    /// Creates a `KeyParserBuilder` for keys stored in the specified
    /// buffer.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        KeyParserBuilder {
            bio: Box::new(buffered_reader::Memory::new(bytes)),
            settings: KeyParserSettings::default(),
        }
    }

    /// Sets the largest packet body accepted.
    ///
    /// A packet declaring a larger body is treated as stream
    /// corruption.  The default is 1 MiB plus 64 KiB.
    pub fn max_packet_length(mut self, value: u32) -> Self {
        self.settings.max_packet_length = value;
        self
    }

    /// Controls whether trust packets are skipped.
    ///
    /// By default, trust packets are retained in the `others` list
    /// of the enclosing container, like any other packet the key
    /// grammar does not interpret.
    pub fn ignore_trust_packets(mut self, value: bool) -> Self {
        self.settings.ignore_trust_packets = value;
        self
    }

    /// Finishes configuring the parser and returns an iterator over
    /// the keys.
    pub fn build(self) -> KeyParser<'a> {
        KeyParser::new(self.into_opaque_keyrings())
    }

    /// Finishes configuring the parser and returns an iterator over
    /// the opaque keyrings.
    pub fn into_opaque_keyrings(self) -> OpaqueKeyrings<'a> {
        OpaqueKeyrings::new(self.bio, self.settings)
    }
}
