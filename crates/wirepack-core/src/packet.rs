//! Packet instances.
//!
//! A `Packet` pairs the shared `Layout` of its type with its own field values
//! and payload. Instances are built either by decoding a buffer or from the
//! layout defaults plus overrides; both paths are atomic, so a failed
//! construction never leaves a half-populated packet behind.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::PacketError;
use crate::layout::Layout;
use crate::packet_type::PacketType;
use crate::payload::Payload;
use crate::value::Value;

#[derive(Clone)]
pub struct Packet {
    layout: Arc<Layout>,
    fields: Vec<Value>,
    payload: Payload,
}

impl Packet {
    /// Build a packet from the layout defaults, with an empty payload.
    ///
    /// Each instance gets its own copy of every default.
    pub fn new(layout: &Arc<Layout>) -> Self {
        Self {
            layout: Arc::clone(layout),
            fields: layout.default_values(),
            payload: Payload::default(),
        }
    }

    /// Build a packet from the defaults, then apply `overrides` in order.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use wirepack_core::{ByteOrder, Layout, Packet};
    ///
    /// let layout = Arc::new(Layout::derive("T", ByteOrder::Big, [("a", "H", 0u16), ("b", "B", 0xffu16)])?);
    /// let packet = Packet::with_fields(&layout, [("a", 1u16), ("a", 2u16)])?;
    /// assert_eq!(packet["a"], 2u16.into());
    /// assert_eq!(packet.pack()?, vec![0x00, 0x02, 0xff]);
    /// # Ok::<(), wirepack_core::PacketError>(())
    /// ```
    ///
    /// # Errors
    /// Returns `PacketError::MissingField` when an override names no field.
    pub fn with_fields<I, K, V>(layout: &Arc<Layout>, overrides: I) -> Result<Self, PacketError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut packet = Self::new(layout);
        for (name, value) in overrides {
            packet.set(name.as_ref(), value)?;
        }
        Ok(packet)
    }

    /// Decode a packet: the header from the front of `buf`, the rest as a raw
    /// payload.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use wirepack_core::{ByteOrder, Layout, Packet, Payload};
    ///
    /// let layout = Arc::new(Layout::derive("T", ByteOrder::Big, [("a", "H", 0u16), ("b", "B", 0xffu16)])?);
    /// let packet = Packet::from_bytes(&layout, b"\x00\x05\x2apayload")?;
    /// assert_eq!(packet["a"], 5u16.into());
    /// assert_eq!(packet["b"], 0x2au8.into());
    /// assert_eq!(packet.payload(), &Payload::from(&b"payload"[..]));
    ///
    /// let err = Packet::from_bytes(&layout, b"\x00\x05").unwrap_err();
    /// assert!(err.is_need_data());
    /// # Ok::<(), wirepack_core::PacketError>(())
    /// ```
    ///
    /// # Errors
    /// Returns `PacketError::NeedData` when `buf` is shorter than the header,
    /// and `PacketError::Unpack` when the header bytes do not decode.
    pub fn from_bytes(layout: &Arc<Layout>, buf: &[u8]) -> Result<Self, PacketError> {
        let (fields, payload) = decode_parts(layout, buf)?;
        Ok(Self {
            layout: Arc::clone(layout),
            fields,
            payload,
        })
    }

    /// Re-decode this packet in place from `buf`. On error the packet is
    /// left unchanged.
    pub fn unpack(&mut self, buf: &[u8]) -> Result<(), PacketError> {
        let (fields, payload) = decode_parts(&self.layout, buf)?;
        self.fields = fields;
        self.payload = payload;
        Ok(())
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Packet type name.
    pub fn name(&self) -> &str {
        self.layout.name()
    }

    pub fn header_len(&self) -> usize {
        self.layout.header_len()
    }

    /// Header length plus payload length.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.layout.header_len() + self.payload.len()
    }

    /// Field values in declared order.
    pub fn values(&self) -> &[Value] {
        &self.fields
    }

    /// `(name, value)` pairs in declared order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.layout.field_names().zip(self.fields.iter())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layout.index_of(name).map(|index| &self.fields[index])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.layout.index_of(name).map(|index| &mut self.fields[index])
    }

    /// Mapping-style lookup.
    ///
    /// # Errors
    /// Returns `PacketError::MissingField` for a name the layout does not
    /// declare.
    pub fn field(&self, name: &str) -> Result<&Value, PacketError> {
        self.get(name)
            .ok_or_else(|| PacketError::missing_field(self.name(), name))
    }

    /// Assign a field. Values are checked against the field code at pack time.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), PacketError> {
        let index = self
            .layout
            .index_of(name)
            .ok_or_else(|| PacketError::missing_field(self.layout.name(), name))?;
        self.fields[index] = value.into();
        Ok(())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = payload.into();
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.set_payload(payload);
        self
    }

    pub fn take_payload(&mut self) -> Payload {
        std::mem::take(&mut self.payload)
    }

    /// Encode the header fields in declared order.
    ///
    /// Every field is first passed as one argument; if that fails, tuple
    /// values are expanded into their elements and the encode is retried.
    ///
    /// # Errors
    /// Returns `PacketError::Pack` when the retried encode still fails.
    pub fn pack_header(&self) -> Result<Vec<u8>, PacketError> {
        self.layout
            .encode(&self.fields)
            .map_err(|err| PacketError::pack(self.name(), err))
    }

    /// Header bytes followed by the payload's byte form.
    ///
    /// # Errors
    /// Returns `PacketError::Pack` for this header or any nested packet.
    pub fn pack(&self) -> Result<Vec<u8>, PacketError> {
        let mut out = Vec::with_capacity(self.len());
        self.pack_into(&mut out)?;
        Ok(out)
    }

    /// Append the packed form to `out`. `out` is untouched on error.
    pub fn pack_into(&self, out: &mut Vec<u8>) -> Result<(), PacketError> {
        let start = out.len();
        out.extend_from_slice(&self.pack_header()?);
        if let Err(err) = self.payload.write_to(out) {
            out.truncate(start);
            return Err(err);
        }
        Ok(())
    }

    /// Replace the payload with a nested packet decoded from its byte form.
    ///
    /// # Errors
    /// Returns the nested decode error; the payload is unchanged on error.
    pub fn decode_payload(&mut self, layout: &Arc<Layout>) -> Result<(), PacketError> {
        let bytes = self.payload.to_bytes()?;
        let nested = Packet::from_bytes(layout, &bytes)?;
        self.payload = Payload::Nested(Box::new(nested));
        Ok(())
    }

    /// `decode_payload` with the layout of a declared packet type.
    pub fn decode_payload_as<T: PacketType>(&mut self) -> Result<(), PacketError> {
        self.decode_payload(T::layout()?)
    }
}

fn decode_parts(layout: &Layout, buf: &[u8]) -> Result<(Vec<Value>, Payload), PacketError> {
    let header_len = layout.header_len();
    let Some((header, rest)) = buf.split_at_checked(header_len) else {
        return Err(PacketError::NeedData {
            packet: layout.name().to_string(),
            needed: header_len,
            actual: buf.len(),
        });
    };
    let fields = layout
        .decode(header)
        .map_err(|err| PacketError::unpack(layout.name(), buf, err.to_string()))?;
    Ok((fields, Payload::Raw(rest.to_vec())))
}

impl Index<&str> for Packet {
    type Output = Value;

    /// Panics when the field does not exist; see `Packet::field`.
    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(value) => value,
            None => panic!("{} has no field named '{}'", self.name(), name),
        }
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.layout, &other.layout) || self.layout == other.layout)
            && self.fields == other.fields
            && self.payload == other.payload
    }
}

/// `Name(field=value, ..., payload=...)`, listing only fields that differ
/// from their default.
impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        let mut first = true;
        for (field, value) in self.layout.fields().iter().zip(&self.fields) {
            if value == field.default() {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={}", field.name(), value)?;
        }
        if !self.payload.is_empty() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "payload={:?}", self.payload)?;
        }
        f.write_str(")")
    }
}

/// JSON form: `{"name": ..., "fields": {...}, "payload": {...}}`, fields in
/// declared order.
impl Serialize for Packet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Fields<'a>(&'a Packet);

        impl Serialize for Fields<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_map(self.0.fields())
            }
        }

        let mut state = serializer.serialize_struct("Packet", 3)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("fields", &Fields(self))?;
        state.serialize_field("payload", &self.payload)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Packet;
    use crate::error::PacketError;
    use crate::format::ByteOrder;
    use crate::layout::{FieldSpec, Layout};
    use crate::payload::Payload;
    use crate::value::Value;

    fn t_layout() -> Arc<Layout> {
        Arc::new(
            Layout::derive("T", ByteOrder::Big, [("a", "H", 0u16), ("b", "B", 0xffu16)]).unwrap(),
        )
    }

    fn addr_layout() -> Arc<Layout> {
        Arc::new(
            Layout::derive(
                "Addr",
                ByteOrder::Big,
                vec![
                    FieldSpec::new("kind", "B", 1u8),
                    FieldSpec::new("addr", "4B", Value::tuple([127u8, 0, 0, 1])),
                    FieldSpec::new("tag", "3s", *b"abc"),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn defaults_pack_to_header() {
        let packet = Packet::new(&t_layout());
        assert_eq!(packet.pack().unwrap(), vec![0x00, 0x00, 0xff]);
        assert_eq!(packet.len(), 3);
    }

    #[test]
    fn decode_splits_header_and_payload() {
        let packet = Packet::from_bytes(&t_layout(), b"\x00\x05\x2apayload").unwrap();
        assert_eq!(packet["a"], Value::UInt(5));
        assert_eq!(packet["b"], Value::UInt(0x2a));
        assert_eq!(packet.payload().as_bytes(), Some(&b"payload"[..]));
        assert_eq!(packet.len(), 10);
    }

    #[test]
    fn need_data_boundary() {
        let layout = t_layout();
        let err = Packet::from_bytes(&layout, &[0, 1]).unwrap_err();
        assert_eq!(
            err,
            PacketError::NeedData {
                packet: "T".to_string(),
                needed: 3,
                actual: 2
            }
        );
        let packet = Packet::from_bytes(&layout, &[0, 1, 2]).unwrap();
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn pascal_overflow_is_an_unpack_error() {
        let layout =
            Arc::new(Layout::derive("P", ByteOrder::Big, [("name", "4p", &b""[..])]).unwrap());
        let err = Packet::from_bytes(&layout, &[7, b'a', b'b', b'c', 0xee]).unwrap_err();
        match err {
            PacketError::Unpack { packet, buf, .. } => {
                assert_eq!(packet, "P");
                assert_eq!(buf, vec![7, b'a', b'b', b'c', 0xee]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unpack_in_place_is_atomic() {
        let mut packet = Packet::with_fields(&t_layout(), [("a", 9u16)]).unwrap();
        assert!(packet.unpack(&[1]).is_err());
        assert_eq!(packet["a"], Value::UInt(9));
        packet.unpack(&[0, 2, 3, 4]).unwrap();
        assert_eq!(packet["a"], Value::UInt(2));
        assert_eq!(packet.payload(), &Payload::from(vec![4]));
    }

    #[test]
    fn overrides_apply_in_order() {
        let packet = Packet::with_fields(&t_layout(), [("b", 1u8), ("b", 2u8)]).unwrap();
        assert_eq!(packet["b"], Value::UInt(2));
        let err = Packet::with_fields(&t_layout(), [("zz", 1u8)]).unwrap_err();
        assert!(matches!(err, PacketError::MissingField { ref name, .. } if name == "zz"));
    }

    #[test]
    fn defaults_are_not_shared() {
        let layout = addr_layout();
        let mut first = Packet::new(&layout);
        let second = Packet::new(&layout);
        if let Some(Value::Tuple(items)) = first.get_mut("addr") {
            items[0] = Value::UInt(10);
        }
        assert_eq!(first["addr"], Value::tuple([10u8, 0, 0, 1]));
        assert_eq!(second["addr"], Value::tuple([127u8, 0, 0, 1]));
        assert_eq!(layout.default("addr"), Some(&Value::tuple([127u8, 0, 0, 1])));
    }

    #[test]
    fn tuple_field_round_trips() {
        let layout = addr_layout();
        let mut packet = Packet::new(&layout);
        packet.set("addr", (192u8, 168u8, 0u8, 1u8)).unwrap();
        let bytes = packet.pack().unwrap();
        assert_eq!(bytes, vec![1, 192, 168, 0, 1, b'a', b'b', b'c']);
        let decoded = Packet::from_bytes(&layout, &bytes).unwrap();
        assert_eq!(decoded["addr"], Value::tuple([192u8, 168, 0, 1]));
        assert_eq!(decoded, packet);
    }

    #[test]
    fn pack_error_after_flattening() {
        let mut packet = Packet::new(&t_layout());
        packet.set("b", 256u16).unwrap();
        let err = packet.pack().unwrap_err();
        assert!(matches!(err, PacketError::Pack { .. }));
        assert!(err.to_string().contains("0 <= number <= 255"));

        packet.set("b", Value::tuple([1u8, 2])).unwrap();
        let err = packet.pack_header().unwrap_err();
        assert!(err.to_string().contains("pack expected 2 items"));
    }

    #[test]
    fn text_payload_is_encoded() {
        let packet = Packet::new(&t_layout()).with_payload("hi");
        assert_eq!(packet.pack().unwrap(), vec![0, 0, 0xff, b'h', b'i']);
    }

    #[test]
    fn nested_payload_packs_recursively() {
        let inner = Packet::with_fields(&t_layout(), [("a", 7u16)])
            .unwrap()
            .with_payload(&b"!"[..]);
        let outer = Packet::new(&addr_layout()).with_payload(inner);
        assert_eq!(outer.len(), 8 + 4);
        let bytes = outer.pack().unwrap();
        assert_eq!(&bytes[8..], &[0, 7, 0xff, b'!']);
    }

    #[test]
    fn nested_pack_failure_surfaces() {
        let mut inner = Packet::new(&t_layout());
        inner.set("a", -1i32).unwrap();
        let outer = Packet::new(&addr_layout()).with_payload(inner);
        let mut out = vec![0xaa];
        let err = outer.pack_into(&mut out).unwrap_err();
        assert_eq!(err.packet(), "T");
        assert_eq!(out, vec![0xaa]);
    }

    #[test]
    fn decode_payload_nests_packet() {
        let mut outer = Packet::from_bytes(&addr_layout(), b"\x01\x7f\0\0\x01abc\x00\x09\x01rest").unwrap();
        outer.decode_payload(&t_layout()).unwrap();
        let inner = outer.payload().as_packet().unwrap();
        assert_eq!(inner["a"], Value::UInt(9));
        assert_eq!(inner.payload().as_bytes(), Some(&b"rest"[..]));
    }

    #[test]
    fn field_lookup_signals_missing_key() {
        let packet = Packet::new(&t_layout());
        assert!(packet.get("nope").is_none());
        let err = packet.field("nope").unwrap_err();
        assert_eq!(err.to_string(), "T has no field named 'nope'");
    }

    #[test]
    #[should_panic(expected = "no field named 'nope'")]
    fn index_panics_on_missing_field() {
        let packet = Packet::new(&t_layout());
        let _ = &packet["nope"];
    }

    #[test]
    fn repr_lists_changed_fields_only() {
        let layout = t_layout();
        assert_eq!(format!("{:?}", Packet::new(&layout)), "T()");
        let packet = Packet::from_bytes(&layout, b"\x00\x05\xffpayload").unwrap();
        assert_eq!(format!("{packet:?}"), "T(a=5, payload=b\"payload\")");
        let nested = Packet::new(&layout).with_payload(packet);
        assert_eq!(
            format!("{nested:?}"),
            "T(payload=T(a=5, payload=b\"payload\"))"
        );
    }

    #[test]
    fn serializes_fields_and_payload() {
        let packet = Packet::from_bytes(&addr_layout(), b"\x02\x0a\0\0\x01xyz\xff").unwrap();
        assert_eq!(
            serde_json::to_value(&packet).unwrap(),
            serde_json::json!({
                "name": "Addr",
                "fields": { "kind": 2, "addr": [10, 0, 0, 1], "tag": "0x78797a" },
                "payload": { "raw": "0xff" }
            })
        );
    }

    #[test]
    fn fields_iterate_in_declared_order() {
        let packet = Packet::new(&addr_layout());
        let names: Vec<&str> = packet.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["kind", "addr", "tag"]);
    }
}
