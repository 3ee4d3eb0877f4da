use thiserror::Error;

use crate::format::FormatError;

/// Errors returned by layout derivation and packet construction, packing and
/// field lookup.
///
/// `NeedData` is the recoverable "supply more bytes and retry" signal; every
/// other variant is final for the input or declaration that caused it.
///
/// # Examples
/// ```
/// use wirepack_core::PacketError;
///
/// let err = PacketError::NeedData {
///     packet: "Udp".to_string(),
///     needed: 8,
///     actual: 3,
/// };
/// assert!(err.is_need_data());
/// assert!(err.is_unpack());
/// assert!(err.to_string().contains("need 8 bytes"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacketError {
    #[error("{packet}: need {needed} bytes to unpack header, got {actual}")]
    NeedData {
        packet: String,
        needed: usize,
        actual: usize,
    },
    #[error("invalid {packet}: {reason} ({} byte buffer)", .buf.len())]
    Unpack {
        packet: String,
        buf: Vec<u8>,
        reason: String,
    },
    #[error("cannot pack {packet}: {reason}")]
    Pack { packet: String, reason: String },
    #[error("malformed layout for {packet}: {reason}")]
    Layout { packet: String, reason: String },
    #[error("{packet} has no field named '{name}'")]
    MissingField { packet: String, name: String },
}

impl PacketError {
    pub fn is_need_data(&self) -> bool {
        matches!(self, PacketError::NeedData { .. })
    }

    /// True for every decode failure, including `NeedData`.
    pub fn is_unpack(&self) -> bool {
        matches!(
            self,
            PacketError::NeedData { .. } | PacketError::Unpack { .. }
        )
    }

    /// Name of the packet type the error is about.
    pub fn packet(&self) -> &str {
        match self {
            PacketError::NeedData { packet, .. }
            | PacketError::Unpack { packet, .. }
            | PacketError::Pack { packet, .. }
            | PacketError::Layout { packet, .. }
            | PacketError::MissingField { packet, .. } => packet,
        }
    }

    pub(crate) fn layout(packet: &str, reason: impl Into<String>) -> Self {
        PacketError::Layout {
            packet: packet.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn pack(packet: &str, err: FormatError) -> Self {
        PacketError::Pack {
            packet: packet.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn unpack(packet: &str, buf: &[u8], reason: impl Into<String>) -> Self {
        PacketError::Unpack {
            packet: packet.to_string(),
            buf: buf.to_vec(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_field(packet: &str, name: &str) -> Self {
        PacketError::MissingField {
            packet: packet.to_string(),
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PacketError;
    use crate::format::FormatError;

    #[test]
    fn unpack_error_reports_buffer_size() {
        let err = PacketError::unpack("Ip", &[1, 2, 3], "bad length");
        assert!(err.is_unpack());
        assert!(!err.is_need_data());
        assert_eq!(err.to_string(), "invalid Ip: bad length (3 byte buffer)");
    }

    #[test]
    fn pack_error_carries_format_reason() {
        let err = PacketError::pack("T", FormatError::CharLength { len: 2 });
        assert_eq!(err.packet(), "T");
        assert!(err.to_string().contains("bytes object of length 1"));
    }
}
