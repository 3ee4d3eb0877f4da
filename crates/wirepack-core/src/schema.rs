//! Layout schemas: packet types declared at runtime from JSON.
//!
//! A schema names the type, its byte order and its field table. Default
//! values are converted from JSON according to each field's code, so
//! `"0x0a000001"` fills a `4s` field with four bytes while `[10, 0, 0, 1]`
//! fills a `4B` field with a tuple.
//!
//! Version française (résumé):
//! Un schéma JSON décrit un type de paquet (nom, ordre des octets, champs).
//! Les valeurs par défaut sont converties selon le code de chaque champ ;
//! sans défaut, la valeur nulle du code est utilisée.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PacketError;
use crate::format::{self, ByteOrder, FormatItem, Kind};
use crate::hex;
use crate::layout::{FieldSpec, Layout};
use crate::value::Value;

/// JSON description of a packet type.
///
/// # Examples
/// ```
/// use wirepack_core::{LayoutSchema, Value};
///
/// let schema = LayoutSchema::from_json(
///     r#"{ "name": "udp", "fields": [
///         { "name": "sport", "format": "H", "default": 53 },
///         { "name": "dport", "format": "H" } ] }"#,
/// )?;
/// let layout = schema.to_layout()?;
/// assert_eq!(layout.format(), ">HH");
/// assert_eq!(layout.default("dport"), Some(&Value::UInt(0)));
/// # Ok::<(), wirepack_core::SchemaError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSchema {
    pub name: String,
    #[serde(default)]
    pub byte_order: ByteOrder,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid layout schema: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field '{field}': {reason}")]
    Value { field: String, reason: String },
    #[error(transparent)]
    Packet(#[from] PacketError),
}

impl SchemaError {
    fn value(field: &str, reason: impl Into<String>) -> Self {
        SchemaError::Value {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl LayoutSchema {
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Derive the layout, converting every default by its field code.
    ///
    /// # Errors
    /// Returns `SchemaError::Value` for a default of the wrong JSON shape and
    /// `SchemaError::Packet` when the layout itself does not derive.
    pub fn to_layout(&self) -> Result<Layout, SchemaError> {
        let mut specs = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let items = format::parse_format(&field.format).map_err(|err| {
                PacketError::layout(&self.name, format!("field '{}': {err}", field.name))
            })?;
            let slots = slots(&items);
            let default = match &field.default {
                Some(json) => json_to_value(&field.name, &slots, json)?,
                None => zero_value(&slots),
            };
            specs.push(FieldSpec::new(field.name.as_str(), field.format.as_str(), default));
        }
        Ok(Layout::derive(self.name.as_str(), self.byte_order, specs)?)
    }
}

/// Convert command-line text into a value for field `name` of `layout`.
///
/// Integers are decimal or `0x` hex, multi-element fields take
/// comma-separated elements, and byte fields take `0x` hex or plain text.
///
/// # Examples
/// ```
/// use wirepack_core::{ByteOrder, FieldSpec, Layout, Value, parse_field_value};
///
/// let layout = Layout::derive(
///     "Ip",
///     ByteOrder::Network,
///     vec![FieldSpec::new("ttl", "B", 64u8), FieldSpec::new("src", "4B", Value::tuple([0u8; 4]))],
/// )?;
/// assert_eq!(parse_field_value(&layout, "ttl", "0x40")?, Value::UInt(64));
/// assert_eq!(parse_field_value(&layout, "src", "10,0,0,1")?, Value::tuple([10u8, 0, 0, 1]));
/// # Ok::<(), wirepack_core::SchemaError>(())
/// ```
pub fn parse_field_value(layout: &Layout, name: &str, text: &str) -> Result<Value, SchemaError> {
    let field = layout
        .field(name)
        .ok_or_else(|| PacketError::missing_field(layout.name(), name))?;
    let slots = slots(field.items());
    match slots.as_slice() {
        [slot] => parse_element(name, *slot, text.trim()),
        _ => {
            let parts: Vec<&str> = if text.trim().is_empty() {
                Vec::new()
            } else {
                text.split(',').map(str::trim).collect()
            };
            if parts.len() != slots.len() {
                return Err(SchemaError::value(
                    name,
                    format!("expected {} comma-separated values, got {}", slots.len(), parts.len()),
                ));
            }
            slots
                .iter()
                .zip(parts)
                .map(|(slot, part)| parse_element(name, *slot, part))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple)
        }
    }
}

/// One value position of a field: the kind and, for `s`/`p`, the byte count.
#[derive(Debug, Clone, Copy)]
struct Slot {
    kind: Kind,
    count: usize,
}

fn slots(items: &[FormatItem]) -> Vec<Slot> {
    let mut slots = Vec::new();
    for item in items {
        match item.kind {
            Kind::Pad => {}
            Kind::Bytes | Kind::Pascal => slots.push(Slot {
                kind: item.kind,
                count: item.count,
            }),
            kind => slots.extend(std::iter::repeat_n(Slot { kind, count: 1 }, item.count)),
        }
    }
    slots
}

fn zero_value(slots: &[Slot]) -> Value {
    match slots {
        [slot] => zero_element(*slot),
        _ => Value::Tuple(slots.iter().map(|slot| zero_element(*slot)).collect()),
    }
}

fn zero_element(slot: Slot) -> Value {
    match slot.kind {
        Kind::Char => Value::Bytes(vec![0]),
        Kind::Bytes => Value::Bytes(vec![0; slot.count]),
        Kind::Pascal => Value::Bytes(Vec::new()),
        Kind::Bool => Value::Bool(false),
        Kind::F32 | Kind::F64 => Value::Float(0.0),
        Kind::I8 | Kind::I16 | Kind::I32 | Kind::I64 => Value::Int(0),
        Kind::Pad | Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64 => Value::UInt(0),
    }
}

fn json_to_value(field: &str, slots: &[Slot], json: &serde_json::Value) -> Result<Value, SchemaError> {
    if let [slot] = slots {
        return json_element(field, *slot, json);
    }
    let items = json
        .as_array()
        .ok_or_else(|| SchemaError::value(field, format!("expected an array of {} values", slots.len())))?;
    if items.len() != slots.len() {
        return Err(SchemaError::value(
            field,
            format!("expected {} values, got {}", slots.len(), items.len()),
        ));
    }
    slots
        .iter()
        .zip(items)
        .map(|(slot, item)| json_element(field, *slot, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Tuple)
}

fn json_element(field: &str, slot: Slot, json: &serde_json::Value) -> Result<Value, SchemaError> {
    let value = match slot.kind {
        Kind::Char | Kind::Bytes | Kind::Pascal => json
            .as_str()
            .map(|text| bytes_from_text(field, text))
            .transpose()?,
        Kind::Bool => json.as_bool().map(Value::Bool),
        Kind::F32 | Kind::F64 => json.as_f64().map(Value::Float),
        _ => json
            .as_u64()
            .map(Value::UInt)
            .or_else(|| json.as_i64().map(Value::Int)),
    };
    value.ok_or_else(|| {
        SchemaError::value(
            field,
            format!("'{}' expects {}, got {json}", slot.kind.code(), expected(slot.kind)),
        )
    })
}

fn parse_element(field: &str, slot: Slot, text: &str) -> Result<Value, SchemaError> {
    let value = match slot.kind {
        Kind::Char | Kind::Bytes | Kind::Pascal => Some(bytes_from_text(field, text)?),
        Kind::Bool => match text {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Kind::F32 | Kind::F64 => text.parse::<f64>().ok().map(Value::Float),
        _ => parse_int(text),
    };
    value.ok_or_else(|| {
        SchemaError::value(
            field,
            format!("'{}' expects {}, got '{text}'", slot.kind.code(), expected(slot.kind)),
        )
    })
}

fn parse_int(text: &str) -> Option<Value> {
    if text.starts_with('-') {
        return text.parse::<i64>().ok().map(Value::Int);
    }
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16).ok(),
        None => text.parse::<u64>().ok(),
    }
    .map(Value::UInt)
}

fn bytes_from_text(field: &str, text: &str) -> Result<Value, SchemaError> {
    if text.starts_with("0x") || text.starts_with("0X") {
        let bytes = hex::decode(text).map_err(|err| SchemaError::value(field, err.to_string()))?;
        return Ok(Value::Bytes(bytes));
    }
    Ok(Value::Bytes(text.as_bytes().to_vec()))
}

fn expected(kind: Kind) -> &'static str {
    match kind {
        Kind::Char | Kind::Bytes | Kind::Pascal => "a hex or text string",
        Kind::Bool => "a boolean",
        Kind::F32 | Kind::F64 => "a number",
        _ => "an integer",
    }
}
