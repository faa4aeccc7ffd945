//! Low-level packet wire format.
//!
//! Every packet starts with a four byte header followed by the body:
//!
//! ```text
//! [0..2] total length, header included (u16 LE)
//! [2..4] opcode (u16 LE)
//! [4..]  body fields in definition order
//! ```
//!
//! Body encoding per field type:
//! - integers and floats: little-endian, natural width
//! - `bool`: one byte, any nonzero value decodes as true
//! - `vec3`: three `float`s
//! - `string` / `bytes`: `u16` byte length, then the bytes
//! - `array<T>`: `u16` element count, then the elements
//!
//! Decoding never requires the body to be consumed exactly. Leftover bytes
//! surface when the record is encoded again and compared.

use super::definition::{Definition, FieldType};
use super::record::{Record, Value};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Size of the length + opcode header
pub const HEADER_LEN: usize = 4;

/// Reads the opcode out of a packet header
pub fn read_opcode(data: &[u8]) -> Option<u16> {
    let mut header = data.get(2..HEADER_LEN)?;
    Some(header.get_u16_le())
}

/// Decode a raw packet under the given definition.
pub fn decode_packet(definition: &Definition, data: &[u8]) -> Result<Record> {
    if data.len() < HEADER_LEN {
        return Err(Error::decode(
            &definition.name,
            0,
            format!("packet shorter than header ({} bytes)", data.len()),
        ));
    }

    let mut reader = Reader {
        name: &definition.name,
        buf: &data[HEADER_LEN..],
        total: data.len(),
    };

    let mut record = Record::new();
    for field in &definition.fields {
        let value = reader.read(&field.ty)?;
        record.push(field.name.clone(), value);
    }
    Ok(record)
}

/// Encode a record under the given definition, writing `opcode` into the header.
pub fn encode_packet(definition: &Definition, record: &Record, opcode: u16) -> Result<Vec<u8>> {
    let mut writer = Writer {
        name: &definition.name,
        buf: BytesMut::with_capacity(64),
    };
    writer.buf.put_u16_le(0);
    writer.buf.put_u16_le(opcode);

    for field in &definition.fields {
        let value = record.get(&field.name).ok_or_else(|| {
            Error::encode(&definition.name, format!("missing field '{}'", field.name))
        })?;
        writer.write(&field.name, &field.ty, value)?;
    }

    let total = u16::try_from(writer.buf.len()).map_err(|_| {
        Error::encode(
            &definition.name,
            format!("packet too large ({} bytes)", writer.buf.len()),
        )
    })?;
    writer.buf[0..2].copy_from_slice(&total.to_le_bytes());

    Ok(writer.buf.to_vec())
}

struct Reader<'a> {
    name: &'a str,
    buf: &'a [u8],
    total: usize,
}

impl Reader<'_> {
    fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::decode(
                self.name,
                self.offset(),
                format!("need {} bytes, have {}", n, self.buf.remaining()),
            ));
        }
        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    fn read_slice(&mut self) -> Result<&[u8]> {
        let len = self.read_u16()? as usize;
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn read(&mut self, ty: &FieldType) -> Result<Value> {
        let value = match ty {
            FieldType::Bool => {
                self.need(1)?;
                Value::Bool(self.buf.get_u8() != 0)
            }
            FieldType::Byte => {
                self.need(1)?;
                Value::Byte(self.buf.get_u8())
            }
            FieldType::Int8 => {
                self.need(1)?;
                Value::Int8(self.buf.get_i8())
            }
            FieldType::Int16 => {
                self.need(2)?;
                Value::Int16(self.buf.get_i16_le())
            }
            FieldType::UInt16 => Value::UInt16(self.read_u16()?),
            FieldType::Int32 => {
                self.need(4)?;
                Value::Int32(self.buf.get_i32_le())
            }
            FieldType::UInt32 => {
                self.need(4)?;
                Value::UInt32(self.buf.get_u32_le())
            }
            FieldType::Int64 => {
                self.need(8)?;
                Value::Int64(self.buf.get_i64_le())
            }
            FieldType::UInt64 => {
                self.need(8)?;
                Value::UInt64(self.buf.get_u64_le())
            }
            FieldType::Float => {
                self.need(4)?;
                Value::Float(self.buf.get_f32_le())
            }
            FieldType::Double => {
                self.need(8)?;
                Value::Double(self.buf.get_f64_le())
            }
            FieldType::Vec3 => {
                self.need(12)?;
                Value::Vec3([
                    self.buf.get_f32_le(),
                    self.buf.get_f32_le(),
                    self.buf.get_f32_le(),
                ])
            }
            FieldType::String => {
                let start = self.offset();
                let bytes = self.read_slice()?.to_vec();
                let text = String::from_utf8(bytes)
                    .map_err(|e| Error::decode(self.name, start, format!("invalid UTF-8: {}", e)))?;
                Value::String(text)
            }
            FieldType::Bytes => Value::Bytes(self.read_slice()?.to_vec()),
            FieldType::Array(inner) => {
                let count = self.read_u16()? as usize;
                // Every element takes at least one byte
                if count > self.buf.remaining() {
                    return Err(Error::decode(
                        self.name,
                        self.offset(),
                        format!("array count {} exceeds remaining input", count),
                    ));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read(inner)?);
                }
                Value::Array(items)
            }
        };
        Ok(value)
    }
}

struct Writer<'a> {
    name: &'a str,
    buf: BytesMut,
}

impl Writer<'_> {
    fn mismatch(&self, field: &str, ty: &FieldType, value: &Value) -> Error {
        Error::encode(
            self.name,
            format!("field '{}' expects {}, got {:?}", field, ty, value),
        )
    }

    fn put_len(&mut self, field: &str, len: usize) -> Result<()> {
        let len = u16::try_from(len).map_err(|_| {
            Error::encode(self.name, format!("field '{}' too long ({})", field, len))
        })?;
        self.buf.put_u16_le(len);
        Ok(())
    }

    fn write(&mut self, field: &str, ty: &FieldType, value: &Value) -> Result<()> {
        match (ty, value) {
            (FieldType::Bool, Value::Bool(v)) => self.buf.put_u8(u8::from(*v)),
            (FieldType::Byte, Value::Byte(v)) => self.buf.put_u8(*v),
            (FieldType::Int8, Value::Int8(v)) => self.buf.put_i8(*v),
            (FieldType::Int16, Value::Int16(v)) => self.buf.put_i16_le(*v),
            (FieldType::UInt16, Value::UInt16(v)) => self.buf.put_u16_le(*v),
            (FieldType::Int32, Value::Int32(v)) => self.buf.put_i32_le(*v),
            (FieldType::UInt32, Value::UInt32(v)) => self.buf.put_u32_le(*v),
            (FieldType::Int64, Value::Int64(v)) => self.buf.put_i64_le(*v),
            (FieldType::UInt64, Value::UInt64(v)) => self.buf.put_u64_le(*v),
            (FieldType::Float, Value::Float(v)) => self.buf.put_f32_le(*v),
            (FieldType::Double, Value::Double(v)) => self.buf.put_f64_le(*v),
            (FieldType::Vec3, Value::Vec3(v)) => {
                for component in v {
                    self.buf.put_f32_le(*component);
                }
            }
            (FieldType::String, Value::String(v)) => {
                self.put_len(field, v.len())?;
                self.buf.put_slice(v.as_bytes());
            }
            (FieldType::Bytes, Value::Bytes(v)) => {
                self.put_len(field, v.len())?;
                self.buf.put_slice(v);
            }
            (FieldType::Array(inner), Value::Array(items)) => {
                self.put_len(field, items.len())?;
                for item in items {
                    self.write(field, inner, item)?;
                }
            }
            _ => return Err(self.mismatch(field, ty, value)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::definition::Field;
    use pretty_assertions::assert_eq;

    fn definition(fields: &[(&str, FieldType)]) -> Definition {
        let fields = fields
            .iter()
            .map(|(name, ty)| Field {
                name: name.to_string(),
                ty: ty.clone(),
            })
            .collect();
        Definition::new("S_TEST", 1, fields)
    }

    #[test]
    fn test_read_opcode() {
        assert_eq!(read_opcode(&[0x04, 0x00, 0x64, 0x00]), Some(100));
        assert_eq!(read_opcode(&[0x04, 0x00, 0x64]), None);
    }

    #[test]
    fn test_decode_scalars() {
        let def = definition(&[
            ("flag", FieldType::Bool),
            ("hp", FieldType::Int32),
            ("id", FieldType::UInt64),
        ]);
        let mut data = vec![17, 0, 0x34, 0x12, 1];
        data.extend_from_slice(&(-7i32).to_le_bytes());
        data.extend_from_slice(&42u64.to_le_bytes());

        let record = decode_packet(&def, &data).unwrap();
        assert_eq!(record.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(record.get("hp"), Some(&Value::Int32(-7)));
        assert_eq!(record.get("id"), Some(&Value::UInt64(42)));
    }

    #[test]
    fn test_encode_writes_length_and_opcode() {
        let def = definition(&[("name", FieldType::String), ("ids", FieldType::Array(Box::new(FieldType::Byte)))]);
        let record = Record::new()
            .with("name", Value::String("ab".into()))
            .with("ids", Value::Array(vec![Value::Byte(9)]));

        let data = encode_packet(&def, &record, 0x0102).unwrap();
        assert_eq!(data, vec![11, 0, 0x02, 0x01, 2, 0, b'a', b'b', 1, 0, 9]);
        assert_eq!(decode_packet(&def, &data).unwrap(), record);
    }

    #[test]
    fn test_decode_underflow_reports_offset() {
        let def = definition(&[("a", FieldType::UInt16), ("b", FieldType::UInt32)]);
        let err = decode_packet(&def, &[8, 0, 1, 0, 5, 0, 1]).unwrap_err();
        match err {
            Error::Decode { offset, .. } => assert_eq!(offset, 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_short_header() {
        let def = definition(&[]);
        assert!(decode_packet(&def, &[4, 0]).is_err());
        assert!(decode_packet(&def, &[4, 0, 1, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_utf8_and_huge_arrays() {
        let def = definition(&[("s", FieldType::String)]);
        assert!(decode_packet(&def, &[8, 0, 0, 0, 2, 0, 0xff, 0xfe]).is_err());

        let def = definition(&[("xs", FieldType::Array(Box::new(FieldType::UInt32)))]);
        assert!(decode_packet(&def, &[8, 0, 0, 0, 0xff, 0xff, 0, 0]).is_err());
    }

    #[test]
    fn test_encode_type_mismatch_and_missing_field() {
        let def = definition(&[("a", FieldType::UInt16)]);
        let wrong = Record::new().with("a", Value::Int16(1));
        assert!(matches!(encode_packet(&def, &wrong, 1), Err(Error::Encode { .. })));
        assert!(matches!(encode_packet(&def, &Record::new(), 1), Err(Error::Encode { .. })));
    }

    #[test]
    fn test_nonzero_bool_normalizes_on_encode() {
        let def = definition(&[("flag", FieldType::Bool)]);
        let data = [5, 0, 7, 0, 2];
        let record = decode_packet(&def, &data).unwrap();
        assert_eq!(encode_packet(&def, &record, 7).unwrap(), vec![5, 0, 7, 0, 1]);
    }
}
