//! Lowercase hex helpers shared by the JSON value form and the CLI.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("odd number of hex digits: {0}")]
    OddLength(usize),
    #[error("invalid hex digit '{ch}' at position {index}")]
    InvalidDigit { ch: char, index: usize },
}

pub fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode hex text; an optional `0x` prefix and ASCII whitespace are ignored.
///
/// # Examples
/// ```
/// use wirepack_core::hex;
///
/// assert_eq!(hex::decode("0x00 05 2a").unwrap(), vec![0x00, 0x05, 0x2a]);
/// assert!(hex::decode("abc").is_err());
/// ```
pub fn decode(text: &str) -> Result<Vec<u8>, HexError> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    let mut digits = Vec::with_capacity(text.len());
    for (index, ch) in text.char_indices() {
        if ch.is_ascii_whitespace() {
            continue;
        }
        let digit = ch.to_digit(16).ok_or(HexError::InvalidDigit { ch, index })?;
        digits.push(digit as u8);
    }
    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength(digits.len()));
    }
    Ok(digits
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}
