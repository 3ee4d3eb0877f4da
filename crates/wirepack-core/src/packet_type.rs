use std::sync::Arc;

use crate::error::PacketError;
use crate::layout::Layout;
use crate::packet::Packet;
use crate::value::Value;

/// A named packet type with a layout derived once and shared by every
/// instance.
///
/// Implementations are generated by [`packet_type!`](crate::packet_type);
/// the generated struct wraps a [`Packet`] and dereferences to it.
///
/// # Examples
/// ```
/// use wirepack_core::{PacketType, Value, packet_type};
///
/// packet_type! {
///     /// Tiny test header.
///     pub struct Tlv: Network {
///         kind: "B" = 1,
///         length: "H" = 0,
///     }
/// }
///
/// let mut tlv = Tlv::new()?;
/// tlv.set("length", 4u16)?;
/// assert_eq!(tlv.pack()?, vec![0x01, 0x00, 0x04]);
/// assert_eq!(tlv.length(), &Value::UInt(4));
/// # Ok::<(), wirepack_core::PacketError>(())
/// ```
pub trait PacketType: Sized {
    /// The derived layout, or the derivation error, computed on first use.
    fn layout() -> Result<&'static Arc<Layout>, PacketError>;

    #[doc(hidden)]
    fn wrap(packet: Packet) -> Self;

    fn as_packet(&self) -> &Packet;

    fn into_packet(self) -> Packet;

    fn new() -> Result<Self, PacketError> {
        Ok(Self::wrap(Packet::new(Self::layout()?)))
    }

    fn with_fields<I, K, V>(overrides: I) -> Result<Self, PacketError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Packet::with_fields(Self::layout()?, overrides).map(Self::wrap)
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, PacketError> {
        Packet::from_bytes(Self::layout()?, buf).map(Self::wrap)
    }

    /// Re-type a generic packet; gives it back when the layouts differ.
    fn try_from_packet(packet: Packet) -> Result<Self, Packet> {
        match Self::layout() {
            Ok(layout) if Arc::ptr_eq(layout, packet.layout()) || **layout == **packet.layout() => {
                Ok(Self::wrap(packet))
            }
            _ => Err(packet),
        }
    }
}
