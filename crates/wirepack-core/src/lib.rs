//! Wirepack core library: declarative binary packet types.
//!
//! A packet type is an ordered table of header fields, each with a name, a
//! struct-style type code and a default value, followed by a variable-length
//! payload. The table is derived once into an immutable `Layout`; `Packet`
//! instances share it and carry their own field values and payload. The
//! crate is organised in layers:
//! - `format`: type codes, byte orders, low-level encode/decode
//! - `layout`: derivation of the header descriptor from a field table
//! - `packet` / `payload`: instances, pack/unpack, named field access
//! - `packet_type!`: statically declared packet types
//! - `schema`: packet types declared at runtime from JSON
//! - `stream`: buffering policy over the `NeedData` signal
//!
//! Invariants:
//! - Every instance of a type packs to exactly `header_len` header bytes.
//! - `pack(from_bytes(b))` reproduces the header bytes of `b` exactly.
//! - Decoding never reads past the buffer; a short buffer is `NeedData`.
//! - Defaults are copied per instance, never shared mutably.
//!
//! Version française (résumé):
//! Un type de paquet est une table ordonnée de champs (nom, code de type,
//! valeur par défaut) suivie d'une charge utile. La table est dérivée une
//! seule fois en `Layout` immuable, partagée par toutes les instances.
//! Garanties : longueur d'en-tête fixe, aller-retour octet pour octet,
//! `NeedData` quand le tampon est trop court.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use wirepack_core::{ByteOrder, Layout, Packet, Value};
//!
//! let layout = Arc::new(Layout::derive(
//!     "T",
//!     ByteOrder::Big,
//!     [("a", "H", 0u16), ("b", "B", 0xffu16)],
//! )?);
//! assert_eq!(Packet::new(&layout).pack()?, vec![0x00, 0x00, 0xff]);
//!
//! let packet = Packet::from_bytes(&layout, b"\x00\x05\x2apayload")?;
//! assert_eq!(packet["a"], Value::UInt(5));
//! assert_eq!(packet["b"], Value::UInt(0x2a));
//! assert_eq!(format!("{packet:?}"), "T(a=5, b=42, payload=b\"payload\")");
//! # Ok::<(), wirepack_core::PacketError>(())
//! ```

pub mod format;
pub mod hex;

mod error;
mod layout;
mod macros;
mod packet;
mod packet_type;
mod payload;
mod schema;
mod stream;
mod value;

pub use error::PacketError;
pub use format::{ByteOrder, FormatError};
pub use layout::{FieldLayout, FieldSpec, Layout};
pub use packet::Packet;
pub use packet_type::PacketType;
pub use payload::Payload;
pub use schema::{FieldSchema, LayoutSchema, SchemaError, parse_field_value};
pub use stream::{FrameLength, StreamDecoder};
pub use value::Value;
