//! Stream decoding.
//!
//! `Packet::from_bytes` reports a short buffer as `NeedData` and never waits.
//! `StreamDecoder` is the caller-side policy on top of it: bytes are buffered
//! until a whole frame is available, then the frame is split off and decoded.
//! The frame length comes from a `FrameLength` rule, usually a length field
//! of the header.
//!
//! Version française (résumé):
//! `StreamDecoder` accumule les octets d'un flux et ne décode un paquet que
//! lorsque la trame complète est disponible ; `Ok(None)` signifie « attendre
//! plus de données ».

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::PacketError;
use crate::layout::Layout;
use crate::packet::Packet;

/// How many bytes one whole packet occupies, read from its decoded header.
pub enum FrameLength {
    /// The frame is the header alone.
    HeaderOnly,
    /// Total length is the integer value of header field `name` plus `adjust`.
    Field { name: String, adjust: i64 },
    /// Caller-computed total length; `None` marks the header as invalid.
    Custom(Box<dyn Fn(&Packet) -> Option<usize> + Send + Sync>),
}

impl FrameLength {
    pub fn field(name: impl Into<String>) -> Self {
        FrameLength::Field {
            name: name.into(),
            adjust: 0,
        }
    }

    pub fn custom<F>(rule: F) -> Self
    where
        F: Fn(&Packet) -> Option<usize> + Send + Sync + 'static,
    {
        FrameLength::Custom(Box::new(rule))
    }

    fn resolve(&self, header: &Packet) -> Result<usize, String> {
        match self {
            FrameLength::HeaderOnly => Ok(header.header_len()),
            FrameLength::Field { name, adjust } => {
                let value = header
                    .get(name)
                    .ok_or_else(|| format!("no length field named '{name}'"))?;
                let length = value
                    .as_i128()
                    .ok_or_else(|| format!("length field '{name}' is not an integer ({value})"))?;
                usize::try_from(length + i128::from(*adjust))
                    .map_err(|_| format!("frame length {length}{adjust:+} is negative"))
            }
            FrameLength::Custom(rule) => {
                rule(header).ok_or_else(|| "frame length rule rejected the header".to_string())
            }
        }
    }
}

impl fmt::Debug for FrameLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameLength::HeaderOnly => f.write_str("HeaderOnly"),
            FrameLength::Field { name, adjust } => f
                .debug_struct("Field")
                .field("name", name)
                .field("adjust", adjust)
                .finish(),
            FrameLength::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Buffers a byte stream and yields whole packets of one layout.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use wirepack_core::{ByteOrder, FrameLength, Layout, StreamDecoder, Value};
///
/// let layout = Arc::new(Layout::derive("Tlv", ByteOrder::Big, [("kind", "B", 0u8), ("len", "B", 2u8)])?);
/// let mut stream = StreamDecoder::new(layout, FrameLength::field("len"));
///
/// stream.push(&[1, 4, 0xaa]);
/// assert!(stream.next_packet()?.is_none());
/// stream.push(&[0xbb, 2, 2]);
/// let packet = stream.next_packet()?.unwrap();
/// assert_eq!(packet["kind"], Value::UInt(1));
/// assert_eq!(packet.payload().as_bytes(), Some(&[0xaa, 0xbb][..]));
/// assert_eq!(stream.buffered(), 2);
/// # Ok::<(), wirepack_core::PacketError>(())
/// ```
#[derive(Debug)]
pub struct StreamDecoder {
    layout: Arc<Layout>,
    frame: FrameLength,
    buf: BytesMut,
}

impl StreamDecoder {
    pub fn new(layout: Arc<Layout>, frame: FrameLength) -> Self {
        Self {
            layout,
            frame,
            buf: BytesMut::new(),
        }
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        trace!(added = bytes.len(), buffered = self.buf.len(), "buffered stream bytes");
    }

    /// Number of bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Drop `count` buffered bytes, e.g. to resynchronise after an error.
    pub fn skip(&mut self, count: usize) {
        let count = count.min(self.buf.len());
        self.buf.advance(count);
    }

    /// Decode the next whole frame.
    ///
    /// Returns `Ok(None)` while the buffer holds less than a header or less
    /// than the frame length. On error the buffer is left as it was.
    ///
    /// # Errors
    /// Returns `PacketError::Unpack` when the header does not decode or the
    /// frame length is invalid or shorter than the header.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, PacketError> {
        let header_len = self.layout.header_len();
        let header = match Packet::from_bytes(&self.layout, &self.buf[..header_len.min(self.buf.len())]) {
            Ok(header) => header,
            Err(err) if err.is_need_data() => {
                trace!(packet = self.layout.name(), buffered = self.buf.len(), header_len, "waiting for header");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let frame_len = self
            .frame
            .resolve(&header)
            .map_err(|reason| PacketError::unpack(self.layout.name(), &self.buf[..header_len], reason))?;
        if frame_len < header_len {
            return Err(PacketError::unpack(
                self.layout.name(),
                &self.buf[..header_len],
                format!("frame length {frame_len} is shorter than the {header_len} byte header"),
            ));
        }
        if self.buf.len() < frame_len {
            trace!(packet = self.layout.name(), buffered = self.buf.len(), frame_len, "waiting for frame");
            return Ok(None);
        }

        let frame = self.buf.split_to(frame_len);
        let packet = Packet::from_bytes(&self.layout, &frame)?;
        debug!(packet = self.layout.name(), frame_len, remaining = self.buf.len(), "decoded frame");
        Ok(Some(packet))
    }

    /// Decode every whole frame currently buffered.
    pub fn decode_all(&mut self) -> Result<Vec<Packet>, PacketError> {
        let mut packets = Vec::new();
        while let Some(packet) = self.next_packet()? {
            packets.push(packet);
        }
        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{FrameLength, StreamDecoder};
    use crate::error::PacketError;
    use crate::format::ByteOrder;
    use crate::layout::Layout;
    use crate::value::Value;

    fn length_prefixed() -> Arc<Layout> {
        Arc::new(
            Layout::derive("Msg", ByteOrder::Big, [("kind", "B", 0u16), ("len", "H", 0u16)]).unwrap(),
        )
    }

    #[test]
    fn header_only_frames() {
        let mut stream = StreamDecoder::new(length_prefixed(), FrameLength::HeaderOnly);
        stream.push(&[1, 0, 9, 2, 0]);
        let packets = stream.decode_all().unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0]["len"], Value::UInt(9));
        assert!(packets[0].payload().is_empty());
        assert_eq!(stream.buffered(), 2);
    }

    #[test]
    fn split_reads_with_adjusted_length() {
        let frame = FrameLength::Field {
            name: "len".to_string(),
            adjust: 3,
        };
        let mut stream = StreamDecoder::new(length_prefixed(), frame);
        let bytes = [7, 0, 2, b'h', b'i', 8, 0, 0];
        for byte in &bytes[..4] {
            stream.push(std::slice::from_ref(byte));
            assert!(stream.next_packet().unwrap().is_none());
        }
        stream.push(&bytes[4..]);
        let packets = stream.decode_all().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload().as_bytes(), Some(&b"hi"[..]));
        assert_eq!(packets[1]["kind"], Value::UInt(8));
        assert_eq!(stream.buffered(), 0);
    }

    #[test]
    fn short_frame_length_is_an_unpack_error() {
        let mut stream = StreamDecoder::new(length_prefixed(), FrameLength::field("len"));
        stream.push(&[1, 0, 2, 0xff]);
        let err = stream.next_packet().unwrap_err();
        assert!(matches!(err, PacketError::Unpack { .. }));
        assert_eq!(stream.buffered(), 4);
        stream.skip(4);
        assert!(stream.next_packet().unwrap().is_none());
    }

    #[test]
    fn custom_rule() {
        let frame = FrameLength::custom(|header| {
            header.get("kind").and_then(|kind| kind.as_u64()).map(|kind| 3 + kind as usize)
        });
        let mut stream = StreamDecoder::new(length_prefixed(), frame);
        stream.push(&[1, 0, 0, 0xab, 0, 0, 0]);
        let packets = stream.decode_all().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload().as_bytes(), Some(&[0xab][..]));
    }

    #[test]
    fn unknown_length_field() {
        let mut stream = StreamDecoder::new(length_prefixed(), FrameLength::field("size"));
        stream.push(&[0, 0, 0]);
        let err = stream.next_packet().unwrap_err();
        assert!(err.to_string().contains("no length field named 'size'"));
    }
}
