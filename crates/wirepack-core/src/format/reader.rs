use super::codes::ByteOrder;
use super::error::FormatError;
use super::parser::{FormatItem, Kind};
use crate::value::Value;

/// Cursor over a header buffer that decodes format items in order.
pub struct FormatReader<'a> {
    payload: &'a [u8],
    order: ByteOrder,
    offset: usize,
}

impl<'a> FormatReader<'a> {
    pub fn new(payload: &'a [u8], order: ByteOrder) -> Self {
        Self {
            payload,
            order,
            offset: 0,
        }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), FormatError> {
        if self.payload.len() < needed {
            return Err(FormatError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(FormatError::SizeOverflow)?;
        let bytes = self.payload.get(self.offset..end).ok_or(FormatError::TooShort {
            needed: end,
            actual: self.payload.len(),
        })?;
        self.offset = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let bytes = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        if !self.order.is_big_endian() {
            out.reverse();
        }
        Ok(out)
    }

    /// Decode one item, appending its values to `out`.
    pub fn read_item(&mut self, item: &FormatItem, out: &mut Vec<Value>) -> Result<(), FormatError> {
        match item.kind {
            Kind::Pad => {
                self.read_slice(item.count)?;
            }
            Kind::Bytes => {
                let bytes = self.read_slice(item.count)?;
                out.push(Value::Bytes(bytes.to_vec()));
            }
            Kind::Pascal => out.push(self.read_pascal(item.count)?),
            kind => {
                for _ in 0..item.count {
                    out.push(self.read_scalar(kind)?);
                }
            }
        }
        Ok(())
    }

    fn read_pascal(&mut self, capacity: usize) -> Result<Value, FormatError> {
        let bytes = self.read_slice(capacity)?;
        let Some((&declared, data)) = bytes.split_first() else {
            return Ok(Value::Bytes(Vec::new()));
        };
        let declared = declared as usize;
        if declared > data.len() {
            return Err(FormatError::PascalLength {
                declared,
                capacity: data.len(),
            });
        }
        Ok(Value::Bytes(data[..declared].to_vec()))
    }

    fn read_scalar(&mut self, kind: Kind) -> Result<Value, FormatError> {
        // Multi-byte reads come back in big-endian order from `read_array`.
        let value = match kind {
            Kind::Char => Value::Bytes(self.read_slice(1)?.to_vec()),
            Kind::I8 => Value::Int(i8::from_be_bytes(self.read_array()?) as i64),
            Kind::U8 => Value::UInt(u8::from_be_bytes(self.read_array()?) as u64),
            Kind::Bool => Value::Bool(self.read_array::<1>()?[0] != 0),
            Kind::I16 => Value::Int(i16::from_be_bytes(self.read_array()?) as i64),
            Kind::U16 => Value::UInt(u16::from_be_bytes(self.read_array()?) as u64),
            Kind::I32 => Value::Int(i32::from_be_bytes(self.read_array()?) as i64),
            Kind::U32 => Value::UInt(u32::from_be_bytes(self.read_array()?) as u64),
            Kind::I64 => Value::Int(i64::from_be_bytes(self.read_array()?)),
            Kind::U64 => Value::UInt(u64::from_be_bytes(self.read_array()?)),
            Kind::F32 => Value::Float(f32::from_be_bytes(self.read_array()?) as f64),
            Kind::F64 => Value::Float(f64::from_be_bytes(self.read_array()?)),
            Kind::Pad | Kind::Bytes | Kind::Pascal => {
                return Err(FormatError::UnsupportedCode(kind.code()));
            }
        };
        Ok(value)
    }
}
