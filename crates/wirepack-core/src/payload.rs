use std::fmt;

use serde::ser::{Serialize, Serializer};

use crate::error::PacketError;
use crate::hex;
use crate::packet::Packet;

/// Data following a packet header, exclusively owned by that packet.
///
/// # Examples
/// ```
/// use wirepack_core::Payload;
///
/// let payload = Payload::from("hello");
/// assert_eq!(payload.len(), 5);
/// assert_eq!(payload.to_bytes().unwrap(), b"hello".to_vec());
/// ```
#[derive(Clone, PartialEq)]
pub enum Payload {
    /// Opaque bytes, packed as-is.
    Raw(Vec<u8>),
    /// Text, packed as UTF-8.
    Text(String),
    /// Another packet, packed with its own `pack`.
    Nested(Box<Packet>),
}

impl Payload {
    /// Byte length of the packed form.
    pub fn len(&self) -> usize {
        match self {
            Payload::Raw(bytes) => bytes.len(),
            Payload::Text(text) => text.len(),
            Payload::Nested(packet) => packet.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_packet(&self) -> Option<&Packet> {
        match self {
            Payload::Nested(packet) => Some(packet),
            _ => None,
        }
    }

    pub fn as_packet_mut(&mut self) -> Option<&mut Packet> {
        match self {
            Payload::Nested(packet) => Some(packet),
            _ => None,
        }
    }

    /// Append the byte form to `out`.
    ///
    /// # Errors
    /// A nested packet that cannot be packed fails the whole operation; the
    /// payload never silently packs to nothing.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), PacketError> {
        match self {
            Payload::Raw(bytes) => out.extend_from_slice(bytes),
            Payload::Text(text) => out.extend_from_slice(text.as_bytes()),
            Payload::Nested(packet) => packet.pack_into(out)?,
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PacketError> {
        let mut out = Vec::with_capacity(self.len());
        self.write_to(&mut out)?;
        Ok(out)
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Raw(Vec::new())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Raw(bytes) => write!(f, "b\"{}\"", bytes.escape_ascii()),
            Payload::Text(text) => write!(f, "{text:?}"),
            Payload::Nested(packet) => write!(f, "{packet:?}"),
        }
    }
}

/// JSON form, tagged by variant: `{"raw": "0x.."}`, `{"text": ".."}` or
/// `{"packet": {..}}`.
impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Raw(bytes) => serializer.serialize_newtype_variant(
                "Payload",
                0,
                "raw",
                &format!("0x{}", hex::encode(bytes)),
            ),
            Payload::Text(text) => serializer.serialize_newtype_variant("Payload", 1, "text", text),
            Payload::Nested(packet) => {
                serializer.serialize_newtype_variant("Payload", 2, "packet", packet.as_ref())
            }
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Raw(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Raw(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(value: &[u8; N]) -> Self {
        Payload::Raw(value.to_vec())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<Packet> for Payload {
    fn from(value: Packet) -> Self {
        Payload::Nested(Box::new(value))
    }
}
