use super::codes;
use super::error::FormatError;

/// Primitive kind behind a single format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Pad,
    Char,
    I8,
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bytes,
    Pascal,
}

impl Kind {
    pub fn from_code(code: char) -> Option<Self> {
        let kind = match code {
            'x' => Kind::Pad,
            'c' => Kind::Char,
            'b' => Kind::I8,
            'B' => Kind::U8,
            '?' => Kind::Bool,
            'h' => Kind::I16,
            'H' => Kind::U16,
            'i' | 'l' => Kind::I32,
            'I' | 'L' => Kind::U32,
            'q' => Kind::I64,
            'Q' => Kind::U64,
            'f' => Kind::F32,
            'd' => Kind::F64,
            's' => Kind::Bytes,
            'p' => Kind::Pascal,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical code letter, used in error messages.
    pub fn code(self) -> char {
        match self {
            Kind::Pad => codes::PAD_CODE,
            Kind::Char => codes::CHAR_CODE,
            Kind::I8 => 'b',
            Kind::U8 => 'B',
            Kind::Bool => '?',
            Kind::I16 => 'h',
            Kind::U16 => 'H',
            Kind::I32 => 'i',
            Kind::U32 => 'I',
            Kind::I64 => 'q',
            Kind::U64 => 'Q',
            Kind::F32 => 'f',
            Kind::F64 => 'd',
            Kind::Bytes => codes::BYTES_CODE,
            Kind::Pascal => codes::PASCAL_CODE,
        }
    }

    /// Standard size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Kind::Pad | Kind::Char | Kind::I8 | Kind::U8 | Kind::Bool => 1,
            Kind::Bytes | Kind::Pascal => 1,
            Kind::I16 | Kind::U16 => 2,
            Kind::I32 | Kind::U32 | Kind::F32 => 4,
            Kind::I64 | Kind::U64 | Kind::F64 => 8,
        }
    }

    /// Inclusive integer range for integer kinds.
    pub fn int_range(self) -> Option<(i128, i128)> {
        let range = match self {
            Kind::I8 => (i8::MIN as i128, i8::MAX as i128),
            Kind::U8 => (0, u8::MAX as i128),
            Kind::I16 => (i16::MIN as i128, i16::MAX as i128),
            Kind::U16 => (0, u16::MAX as i128),
            Kind::I32 => (i32::MIN as i128, i32::MAX as i128),
            Kind::U32 => (0, u32::MAX as i128),
            Kind::I64 => (i64::MIN as i128, i64::MAX as i128),
            Kind::U64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }
}

/// One repeat count + code pair of a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatItem {
    pub count: usize,
    pub kind: Kind,
}

impl FormatItem {
    pub fn new(count: usize, kind: Kind) -> Self {
        Self { count, kind }
    }

    pub fn size(&self) -> Result<usize, FormatError> {
        self.count
            .checked_mul(self.kind.size())
            .ok_or(FormatError::SizeOverflow)
    }

    /// Number of values this item produces or consumes. `s` and `p` read as
    /// one value whatever their count; pad bytes carry none.
    pub fn arity(&self) -> usize {
        match self.kind {
            Kind::Pad => 0,
            Kind::Bytes | Kind::Pascal => 1,
            _ => self.count,
        }
    }
}

/// Parse the code part of a format (no byte-order prefix).
///
/// # Examples
/// ```
/// use wirepack_core::format::{FormatItem, Kind, parse_format};
///
/// let items = parse_format("H 4B 6s").unwrap();
/// assert_eq!(
///     items,
///     vec![
///         FormatItem::new(1, Kind::U16),
///         FormatItem::new(4, Kind::U8),
///         FormatItem::new(6, Kind::Bytes),
///     ]
/// );
/// ```
///
/// # Errors
/// Returns `FormatError` for unknown or native-only codes, a byte-order
/// marker inside the codes, or a dangling repeat count.
pub fn parse_format(codes: &str) -> Result<Vec<FormatItem>, FormatError> {
    let mut items = Vec::new();
    let mut count: Option<usize> = None;

    for ch in codes.chars() {
        if let Some(digit) = ch.to_digit(10) {
            let next = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|value| value.checked_add(digit as usize))
                .ok_or(FormatError::CountOverflow)?;
            count = Some(next);
            continue;
        }
        if ch.is_whitespace() {
            if count.is_some() {
                return Err(FormatError::MissingCode);
            }
            continue;
        }
        if codes::BYTE_ORDER_MARKERS.contains(&ch) {
            return Err(FormatError::MisplacedByteOrder(ch));
        }
        if codes::NATIVE_ONLY_CODES.contains(&ch) {
            return Err(FormatError::NativeOnly(ch));
        }
        let kind = Kind::from_code(ch).ok_or(FormatError::UnsupportedCode(ch))?;
        items.push(FormatItem::new(count.take().unwrap_or(1), kind));
    }

    if count.is_some() {
        return Err(FormatError::MissingCode);
    }
    Ok(items)
}

/// Total packed size of a sequence of items.
pub fn packed_size(items: &[FormatItem]) -> Result<usize, FormatError> {
    items.iter().try_fold(0usize, |total, item| {
        total
            .checked_add(item.size()?)
            .ok_or(FormatError::SizeOverflow)
    })
}

/// Kind of every value the items produce, in order.
pub fn element_kinds(items: &[FormatItem]) -> Vec<Kind> {
    items
        .iter()
        .flat_map(|item| std::iter::repeat_n(item.kind, item.arity()))
        .collect()
}
