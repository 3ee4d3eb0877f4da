use thiserror::Error;

/// Errors returned while parsing, encoding or decoding a binary format.
///
/// # Examples
/// ```
/// use wirepack_core::format::{FormatError, parse_format};
///
/// let err = parse_format("H4z").unwrap_err();
/// assert_eq!(err, FormatError::UnsupportedCode('z'));
/// assert!(err.to_string().contains("unsupported format code"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("unsupported format code '{0}'")]
    UnsupportedCode(char),
    #[error("format code '{0}' needs native alignment, layouts are always packed")]
    NativeOnly(char),
    #[error("byte order marker '{0}' is only allowed as the format prefix")]
    MisplacedByteOrder(char),
    #[error("repeat count given without format code")]
    MissingCode,
    #[error("repeat count too large")]
    CountOverflow,
    #[error("format size overflows usize")]
    SizeOverflow,
    #[error("pack expected {expected} items for packing, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("required argument for '{code}' is not an integer (got {found})")]
    NotAnInteger { code: char, found: &'static str },
    #[error("required argument for '{code}' is not a float (got {found})")]
    NotAFloat { code: char, found: &'static str },
    #[error("argument for '{code}' must be a bytes object (got {found})")]
    NotBytes { code: char, found: &'static str },
    #[error("argument for '?' must be a scalar (got {found})")]
    NotABool { found: &'static str },
    #[error("char format requires a bytes object of length 1, got {len}")]
    CharLength { len: usize },
    #[error("'{code}' format requires {min} <= number <= {max}, got {value}")]
    OutOfRange {
        code: char,
        min: i128,
        max: i128,
        value: i128,
    },
    #[error("float {value} is out of range for '{code}'")]
    FloatOutOfRange { code: char, value: f64 },
    #[error("buffer too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("pascal string length {declared} exceeds field capacity {capacity}")]
    PascalLength { declared: usize, capacity: usize },
}
