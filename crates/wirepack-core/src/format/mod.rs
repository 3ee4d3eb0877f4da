//! Struct-style binary format descriptors.
//!
//! A format is a byte-order marker followed by type codes (`>H4s2B`). This
//! module follows a layered structure:
//! - `codes`: byte-order markers and code sizes (source of truth)
//! - `parser`: turns a code string into `FormatItem`s and measures them
//! - `reader`: decodes items from a byte slice into `Value`s
//! - `writer`: encodes `Value` arguments into bytes
//! - `error`: explicit, actionable errors
//!
//! Layouts are always packed: standard sizes, no padding or alignment.
//!
//! Version française (résumé):
//! Les formats reprennent les codes de type « struct » (`>H4s2B`), sans
//! alignement. Les tailles sont dans `codes`, l'analyse dans `parser`, le
//! décodage dans `reader` et l'encodage dans `writer`.

pub mod codes;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

pub use codes::ByteOrder;
pub use error::FormatError;
pub use parser::{FormatItem, Kind, element_kinds, packed_size, parse_format};
pub use reader::FormatReader;
pub use writer::encode;
