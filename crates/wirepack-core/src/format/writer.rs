use super::codes::{ByteOrder, PASCAL_MAX_LEN};
use super::error::FormatError;
use super::parser::{FormatItem, Kind, packed_size};
use crate::value::Value;

/// Encode `args` with `items`, one argument per value slot.
///
/// The argument count must match the items' total arity exactly; a tuple
/// where a scalar is expected is an error, never an implicit expansion.
///
/// # Examples
/// ```
/// use wirepack_core::Value;
/// use wirepack_core::format::{ByteOrder, encode, parse_format};
///
/// let items = parse_format("HB").unwrap();
/// let bytes = encode(ByteOrder::Big, &items, &[&Value::UInt(5), &Value::UInt(0x2a)]).unwrap();
/// assert_eq!(bytes, vec![0x00, 0x05, 0x2a]);
/// ```
///
/// # Errors
/// Returns `FormatError` on an argument count mismatch or a value that does
/// not fit its code.
pub fn encode(
    order: ByteOrder,
    items: &[FormatItem],
    args: &[&Value],
) -> Result<Vec<u8>, FormatError> {
    let expected: usize = items.iter().map(FormatItem::arity).sum();
    if args.len() != expected {
        return Err(FormatError::ArgumentCount {
            expected,
            actual: args.len(),
        });
    }

    let mut writer = FormatWriter::with_capacity(order, packed_size(items)?);
    let mut args = args.iter().copied();
    for item in items {
        writer.write_item(item, &mut args)?;
    }
    Ok(writer.into_inner())
}

struct FormatWriter {
    out: Vec<u8>,
    order: ByteOrder,
}

impl FormatWriter {
    fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            order,
        }
    }

    fn into_inner(self) -> Vec<u8> {
        self.out
    }

    fn write_item<'v>(
        &mut self,
        item: &FormatItem,
        args: &mut impl Iterator<Item = &'v Value>,
    ) -> Result<(), FormatError> {
        match item.kind {
            Kind::Pad => {
                self.out.resize(self.out.len() + item.count, 0);
                Ok(())
            }
            Kind::Bytes => {
                let bytes = next_bytes(args, Kind::Bytes)?;
                let take = bytes.len().min(item.count);
                self.out.extend_from_slice(&bytes[..take]);
                self.out.resize(self.out.len() + (item.count - take), 0);
                Ok(())
            }
            Kind::Pascal => {
                let bytes = next_bytes(args, Kind::Pascal)?;
                self.write_pascal(bytes, item.count);
                Ok(())
            }
            kind => {
                for _ in 0..item.count {
                    let value = args.next().ok_or(FormatError::ArgumentCount {
                        expected: item.arity(),
                        actual: 0,
                    })?;
                    self.write_scalar(kind, value)?;
                }
                Ok(())
            }
        }
    }

    fn write_pascal(&mut self, bytes: &[u8], capacity: usize) {
        if capacity == 0 {
            return;
        }
        let len = bytes.len().min(capacity - 1).min(PASCAL_MAX_LEN);
        self.out.push(len as u8);
        self.out.extend_from_slice(&bytes[..len]);
        self.out.resize(self.out.len() + (capacity - 1 - len), 0);
    }

    fn write_ordered(&mut self, be_bytes: &[u8]) {
        if self.order.is_big_endian() {
            self.out.extend_from_slice(be_bytes);
        } else {
            self.out.extend(be_bytes.iter().rev());
        }
    }

    fn write_scalar(&mut self, kind: Kind, value: &Value) -> Result<(), FormatError> {
        match kind {
            Kind::Char => {
                let bytes = value.as_bytes().ok_or(FormatError::NotBytes {
                    code: kind.code(),
                    found: value.kind_name(),
                })?;
                if bytes.len() != 1 {
                    return Err(FormatError::CharLength { len: bytes.len() });
                }
                self.out.push(bytes[0]);
            }
            Kind::Bool => {
                let truth = truthiness(value)?;
                self.out.push(truth as u8);
            }
            Kind::F32 => {
                let float = float_arg(kind, value)?;
                if float.is_finite() && float.abs() > f32::MAX as f64 {
                    return Err(FormatError::FloatOutOfRange {
                        code: kind.code(),
                        value: float,
                    });
                }
                self.write_ordered(&(float as f32).to_be_bytes());
            }
            Kind::F64 => {
                let float = float_arg(kind, value)?;
                self.write_ordered(&float.to_be_bytes());
            }
            kind => {
                let int = int_arg(kind, value)?;
                match kind {
                    Kind::I8 => self.write_ordered(&(int as i8).to_be_bytes()),
                    Kind::U8 => self.write_ordered(&(int as u8).to_be_bytes()),
                    Kind::I16 => self.write_ordered(&(int as i16).to_be_bytes()),
                    Kind::U16 => self.write_ordered(&(int as u16).to_be_bytes()),
                    Kind::I32 => self.write_ordered(&(int as i32).to_be_bytes()),
                    Kind::U32 => self.write_ordered(&(int as u32).to_be_bytes()),
                    Kind::I64 => self.write_ordered(&(int as i64).to_be_bytes()),
                    Kind::U64 => self.write_ordered(&(int as u64).to_be_bytes()),
                    _ => return Err(FormatError::UnsupportedCode(kind.code())),
                }
            }
        }
        Ok(())
    }
}

fn next_bytes<'v>(
    args: &mut impl Iterator<Item = &'v Value>,
    kind: Kind,
) -> Result<&'v [u8], FormatError> {
    let value = args.next().ok_or(FormatError::ArgumentCount {
        expected: 1,
        actual: 0,
    })?;
    value.as_bytes().ok_or(FormatError::NotBytes {
        code: kind.code(),
        found: value.kind_name(),
    })
}

/// Integer argument checked against the kind's range.
fn int_arg(kind: Kind, value: &Value) -> Result<i128, FormatError> {
    let int = value.as_i128().ok_or(FormatError::NotAnInteger {
        code: kind.code(),
        found: value.kind_name(),
    })?;
    let (min, max) = kind
        .int_range()
        .ok_or(FormatError::UnsupportedCode(kind.code()))?;
    if int < min || int > max {
        return Err(FormatError::OutOfRange {
            code: kind.code(),
            min,
            max,
            value: int,
        });
    }
    Ok(int)
}

fn float_arg(kind: Kind, value: &Value) -> Result<f64, FormatError> {
    match value {
        Value::Float(float) => Ok(*float),
        Value::Int(int) => Ok(*int as f64),
        Value::UInt(uint) => Ok(*uint as f64),
        other => Err(FormatError::NotAFloat {
            code: kind.code(),
            found: other.kind_name(),
        }),
    }
}

fn truthiness(value: &Value) -> Result<bool, FormatError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(int) => Ok(*int != 0),
        Value::UInt(uint) => Ok(*uint != 0),
        Value::Float(float) => Ok(*float != 0.0),
        Value::Bytes(bytes) => Ok(!bytes.is_empty()),
        Value::Tuple(_) => Err(FormatError::NotABool {
            found: value.kind_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::encode;
    use crate::format::codes::ByteOrder;
    use crate::format::error::FormatError;
    use crate::format::parser::parse_format;
    use crate::value::Value;

    fn pack(codes: &str, order: ByteOrder, args: &[Value]) -> Result<Vec<u8>, FormatError> {
        let items = parse_format(codes).unwrap();
        let args: Vec<&Value> = args.iter().collect();
        encode(order, &items, &args)
    }

    #[test]
    fn packs_mixed_widths_big_endian() {
        let bytes = pack(
            "HbI",
            ByteOrder::Big,
            &[Value::UInt(0x0102), Value::Int(-2), Value::UInt(7)],
        )
        .unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0xfe, 0, 0, 0, 7]);
    }

    #[test]
    fn packs_little_endian() {
        let bytes = pack("H", ByteOrder::Little, &[Value::UInt(0x0102)]).unwrap();
        assert_eq!(bytes, vec![0x02, 0x01]);
    }

    #[test]
    fn bytes_are_padded_and_truncated() {
        let padded = pack("4s", ByteOrder::Big, &[Value::Bytes(b"ab".to_vec())]).unwrap();
        assert_eq!(padded, b"ab\0\0".to_vec());
        let truncated = pack("2s", ByteOrder::Big, &[Value::Bytes(b"abcd".to_vec())]).unwrap();
        assert_eq!(truncated, b"ab".to_vec());
    }

    #[test]
    fn pascal_string_layout() {
        let bytes = pack("4p", ByteOrder::Big, &[Value::Bytes(b"hello".to_vec())]).unwrap();
        assert_eq!(bytes, vec![3, b'h', b'e', b'l']);
    }

    #[test]
    fn pad_consumes_no_argument() {
        let bytes = pack("2xB", ByteOrder::Big, &[Value::UInt(9)]).unwrap();
        assert_eq!(bytes, vec![0, 0, 9]);
    }

    #[test]
    fn argument_count_mismatch() {
        let err = pack("4B", ByteOrder::Big, &[Value::UInt(1)]).unwrap_err();
        assert_eq!(
            err,
            FormatError::ArgumentCount {
                expected: 4,
                actual: 1
            }
        );
    }

    #[test]
    fn tuple_is_not_a_scalar() {
        let err = pack(
            "B",
            ByteOrder::Big,
            &[Value::Tuple(vec![Value::UInt(1)])],
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::NotAnInteger { code: 'B', .. }));
    }

    #[test]
    fn out_of_range_integer() {
        let err = pack("B", ByteOrder::Big, &[Value::UInt(256)]).unwrap_err();
        assert!(matches!(err, FormatError::OutOfRange { value: 256, .. }));
        let err = pack("H", ByteOrder::Big, &[Value::Int(-1)]).unwrap_err();
        assert!(matches!(err, FormatError::OutOfRange { value: -1, .. }));
    }

    #[test]
    fn char_requires_single_byte() {
        let err = pack("c", ByteOrder::Big, &[Value::Bytes(b"ab".to_vec())]).unwrap_err();
        assert_eq!(err, FormatError::CharLength { len: 2 });
    }

    #[test]
    fn float_range_is_checked() {
        let err = pack("f", ByteOrder::Big, &[Value::Float(1e300)]).unwrap_err();
        assert!(matches!(err, FormatError::FloatOutOfRange { code: 'f', .. }));
        let ok = pack("d", ByteOrder::Big, &[Value::UInt(2)]).unwrap();
        assert_eq!(ok, 2.0f64.to_be_bytes().to_vec());
    }

    #[test]
    fn bool_packs_truthiness() {
        let bytes = pack("??", ByteOrder::Big, &[Value::UInt(7), Value::Bool(false)]).unwrap();
        assert_eq!(bytes, vec![1, 0]);
    }
}
