//! Layout derivation.
//!
//! A packet type is declared as an ordered table of `FieldSpec`s. Deriving a
//! `Layout` from the table happens once per type: it fixes the field order,
//! the combined format descriptor, the header length and the defaults. The
//! result is immutable and shared read-only by every instance of the type.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::PacketError;
use crate::format::{self, ByteOrder, FormatError, FormatItem, FormatReader};
use crate::value::Value;

/// One header field declaration: name, type code and default value.
///
/// # Examples
/// ```
/// use wirepack_core::{FieldSpec, Value};
///
/// let spec = FieldSpec::from(("ttl", "B", 64u8));
/// assert_eq!(spec.name(), "ttl");
/// assert_eq!(spec.code(), "B");
/// assert_eq!(spec.default(), &Value::UInt(64));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    code: String,
    default: Value,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, code: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            default: default.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn default(&self) -> &Value {
        &self.default
    }
}

impl<N, C, V> From<(N, C, V)> for FieldSpec
where
    N: Into<String>,
    C: Into<String>,
    V: Into<Value>,
{
    fn from((name, code, default): (N, C, V)) -> Self {
        FieldSpec::new(name, code, default)
    }
}

/// A field's place in the derived header.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    name: String,
    code: String,
    items: Vec<FormatItem>,
    offset: usize,
    size: usize,
    arity: usize,
    default: Value,
}

impl FieldLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn items(&self) -> &[FormatItem] {
        &self.items
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    /// True when the field holds a tuple (its code yields other than one value).
    pub fn is_multi(&self) -> bool {
        self.arity != 1
    }

    pub fn default(&self) -> &Value {
        &self.default
    }
}

/// Derived, immutable layout of one packet type.
///
/// # Examples
/// ```
/// use wirepack_core::{ByteOrder, Layout};
///
/// let layout = Layout::derive("T", ByteOrder::Big, [("a", "H", 0u16), ("b", "B", 0xffu16)]).unwrap();
/// assert_eq!(layout.format(), ">HB");
/// assert_eq!(layout.header_len(), 3);
/// assert_eq!(layout.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    name: String,
    byte_order: ByteOrder,
    format: String,
    header_len: usize,
    items: Vec<FormatItem>,
    fields: Vec<FieldLayout>,
    index: HashMap<String, usize>,
}

impl Layout {
    /// Derive the layout of a packet type from its field table.
    ///
    /// # Errors
    /// Returns `PacketError::Layout` when a code is unsupported, a name is
    /// empty or repeated, the header size overflows, or a default cannot be
    /// encoded by its own field code.
    pub fn derive<I, S>(
        name: impl Into<String>,
        byte_order: ByteOrder,
        specs: I,
    ) -> Result<Self, PacketError>
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldSpec>,
    {
        let name = name.into();
        let mut format = String::from(byte_order.marker());
        let mut items = Vec::new();
        let mut fields = Vec::new();
        let mut index = HashMap::new();
        let mut offset = 0usize;

        for spec in specs {
            let FieldSpec {
                name: field_name,
                code,
                default,
            } = spec.into();
            if field_name.is_empty() {
                return Err(PacketError::layout(&name, "empty field name"));
            }
            if index.contains_key(&field_name) {
                return Err(PacketError::layout(
                    &name,
                    format!("duplicate field '{field_name}'"),
                ));
            }

            let field_items = format::parse_format(&code).map_err(|err| {
                PacketError::layout(&name, format!("field '{field_name}': {err}"))
            })?;
            let size = format::packed_size(&field_items).map_err(|err| {
                PacketError::layout(&name, format!("field '{field_name}': {err}"))
            })?;
            let arity = field_items.iter().map(FormatItem::arity).sum();

            encode_values(byte_order, &field_items, std::slice::from_ref(&default)).map_err(
                |err| {
                    PacketError::layout(
                        &name,
                        format!("default for field '{field_name}' does not fit '{code}': {err}"),
                    )
                },
            )?;

            format.push_str(&code);
            items.extend(field_items.iter().copied());
            index.insert(field_name.clone(), fields.len());
            fields.push(FieldLayout {
                name: field_name,
                code,
                items: field_items,
                offset,
                size,
                arity,
                default,
            });
            offset = offset
                .checked_add(size)
                .ok_or_else(|| PacketError::layout(&name, FormatError::SizeOverflow.to_string()))?;
        }

        Ok(Self {
            name,
            byte_order,
            format,
            header_len: offset,
            items,
            fields,
            index,
        })
    }

    /// Packet type name, used in errors and the repr.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Byte-order marker followed by every field code, in declared order.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldLayout::name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.index_of(name).map(|index| &self.fields[index])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn default(&self, name: &str) -> Option<&Value> {
        self.field(name).map(FieldLayout::default)
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|field| (field.name(), field.default()))
    }

    /// Fresh copies of every default, in declared order.
    pub(crate) fn default_values(&self) -> Vec<Value> {
        self.fields
            .iter()
            .map(|field| field.default.clone())
            .collect()
    }

    /// Encode one value per field, flattening tuple values if the direct
    /// encode fails.
    pub(crate) fn encode(&self, values: &[Value]) -> Result<Vec<u8>, FormatError> {
        encode_values(self.byte_order, &self.items, values)
    }

    /// Decode exactly `header_len` bytes into one value per field.
    pub(crate) fn decode(&self, header: &[u8]) -> Result<Vec<Value>, FormatError> {
        let mut reader = FormatReader::new(header, self.byte_order);
        reader.require_len(self.header_len)?;

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let mut elements = Vec::with_capacity(field.arity);
            for item in &field.items {
                reader.read_item(item, &mut elements)?;
            }
            // Exactly one element only happens for arity-1 (scalar) fields.
            let value = match <[Value; 1]>::try_from(elements) {
                Ok([single]) => single,
                Err(elements) => Value::Tuple(elements),
            };
            values.push(value);
        }
        Ok(values)
    }
}

/// Two-phase encode: every value as one argument first; on failure, expand
/// tuple values in place and try once more.
fn encode_values(
    order: ByteOrder,
    items: &[FormatItem],
    values: &[Value],
) -> Result<Vec<u8>, FormatError> {
    let direct: Vec<&Value> = values.iter().collect();
    format::encode(order, items, &direct).or_else(|_| {
        let mut flattened = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::Tuple(elements) => flattened.extend(elements.iter()),
                scalar => flattened.push(scalar),
            }
        }
        format::encode(order, items, &flattened)
    })
}

#[cfg(test)]
mod tests {
    use super::{FieldSpec, Layout};
    use crate::error::PacketError;
    use crate::format::ByteOrder;
    use crate::value::Value;

    fn ip_like() -> Layout {
        Layout::derive(
            "IpLike",
            ByteOrder::Network,
            vec![
                FieldSpec::new("v_hl", "B", 0x45u8),
                FieldSpec::new("len", "H", 20u16),
                FieldSpec::new("src", "4B", Value::tuple([0u8; 4])),
                FieldSpec::new("dst", "4s", [0u8; 4]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn derives_format_and_offsets() {
        let layout = ip_like();
        assert_eq!(layout.format(), "!BH4B4s");
        assert_eq!(layout.header_len(), 11);
        let src = layout.field("src").unwrap();
        assert_eq!(src.range(), 3..7);
        assert!(src.is_multi());
        assert!(!layout.field("dst").unwrap().is_multi());
        assert_eq!(layout.index_of("dst"), Some(3));
    }

    #[test]
    fn little_endian_marker() {
        let layout = Layout::derive("L", ByteOrder::Little, [("a", "I", 0u32)]).unwrap();
        assert_eq!(layout.format(), "<I");
    }

    #[test]
    fn empty_table_is_a_zero_length_header() {
        let layout = Layout::derive("Empty", ByteOrder::Big, Vec::<FieldSpec>::new()).unwrap();
        assert_eq!(layout.header_len(), 0);
        assert_eq!(layout.format(), ">");
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Layout::derive("D", ByteOrder::Big, [("a", "B", 0u8), ("a", "B", 0u8)])
            .unwrap_err();
        assert!(matches!(err, PacketError::Layout { .. }));
        assert!(err.to_string().contains("duplicate field 'a'"));
    }

    #[test]
    fn rejects_unsupported_code() {
        let err = Layout::derive("U", ByteOrder::Big, [("a", "Z", 0u8)]).unwrap_err();
        assert!(err.to_string().contains("unsupported format code 'Z'"));
    }

    #[test]
    fn rejects_default_that_does_not_fit() {
        let err = Layout::derive("W", ByteOrder::Big, [("a", "B", 300u16)]).unwrap_err();
        assert!(matches!(err, PacketError::Layout { .. }));
        let err = Layout::derive("W", ByteOrder::Big, [("a", "4B", 0u8)]).unwrap_err();
        assert!(err.to_string().contains("default for field 'a'"));
    }

    #[test]
    fn decode_groups_multi_element_fields() {
        let layout = ip_like();
        let header = [0x45, 0x00, 0x1c, 10, 0, 0, 1, 10, 0, 0, 2];
        let values = layout.decode(&header).unwrap();
        assert_eq!(values[0], Value::UInt(0x45));
        assert_eq!(values[1], Value::UInt(28));
        assert_eq!(values[2], Value::tuple([10u8, 0, 0, 1]));
        assert_eq!(values[3], Value::Bytes(vec![10, 0, 0, 2]));
    }

    #[test]
    fn single_count_repeat_is_still_scalar() {
        let layout = Layout::derive("S", ByteOrder::Big, [("a", "1H", 7u16)]).unwrap();
        let values = layout.decode(&[0, 9]).unwrap();
        assert_eq!(values, vec![Value::UInt(9)]);
    }

    #[test]
    fn encode_flattens_tuples_only_on_failure() {
        let layout = ip_like();
        let values = layout.default_values();
        let bytes = layout.encode(&values).unwrap();
        assert_eq!(bytes, vec![0x45, 0x00, 0x14, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn defaults_in_declared_order() {
        let layout = ip_like();
        let names: Vec<&str> = layout.defaults().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["v_hl", "len", "src", "dst"]);
        assert_eq!(layout.default("len"), Some(&Value::UInt(20)));
    }
}
