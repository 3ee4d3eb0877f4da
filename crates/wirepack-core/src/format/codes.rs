use serde::{Deserialize, Serialize};

pub const BIG_ENDIAN_MARKER: char = '>';
pub const LITTLE_ENDIAN_MARKER: char = '<';
pub const NETWORK_MARKER: char = '!';
pub const NATIVE_MARKER: char = '=';
pub const NATIVE_ALIGNED_MARKER: char = '@';

pub const BYTE_ORDER_MARKERS: [char; 5] = [
    BIG_ENDIAN_MARKER,
    LITTLE_ENDIAN_MARKER,
    NETWORK_MARKER,
    NATIVE_MARKER,
    NATIVE_ALIGNED_MARKER,
];

/// Codes whose size only exists with native alignment.
pub const NATIVE_ONLY_CODES: [char; 4] = ['n', 'N', 'P', 'e'];

pub const PAD_CODE: char = 'x';
pub const CHAR_CODE: char = 'c';
pub const BYTES_CODE: char = 's';
pub const PASCAL_CODE: char = 'p';

pub const PASCAL_MAX_LEN: usize = u8::MAX as usize;

/// Byte order applied to every multi-byte field of a layout.
///
/// # Examples
/// ```
/// use wirepack_core::ByteOrder;
///
/// assert_eq!(ByteOrder::default(), ByteOrder::Big);
/// assert_eq!(ByteOrder::Network.marker(), '!');
/// assert!(ByteOrder::Network.is_big_endian());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Big-endian (`>`), the network-protocol default.
    #[default]
    Big,
    /// Little-endian (`<`).
    Little,
    /// Network order (`!`), identical to big-endian.
    Network,
    /// Host order (`=`) with standard sizes.
    Native,
}

impl ByteOrder {
    /// Marker character used as the format descriptor prefix.
    pub fn marker(self) -> char {
        match self {
            ByteOrder::Big => BIG_ENDIAN_MARKER,
            ByteOrder::Little => LITTLE_ENDIAN_MARKER,
            ByteOrder::Network => NETWORK_MARKER,
            ByteOrder::Native => NATIVE_MARKER,
        }
    }

    /// Parse a format prefix marker. `@` is rejected: layouts are never aligned.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            BIG_ENDIAN_MARKER => Some(ByteOrder::Big),
            LITTLE_ENDIAN_MARKER => Some(ByteOrder::Little),
            NETWORK_MARKER => Some(ByteOrder::Network),
            NATIVE_MARKER => Some(ByteOrder::Native),
            _ => None,
        }
    }

    pub fn is_big_endian(self) -> bool {
        match self {
            ByteOrder::Big | ByteOrder::Network => true,
            ByteOrder::Little => false,
            ByteOrder::Native => cfg!(target_endian = "big"),
        }
    }
}
