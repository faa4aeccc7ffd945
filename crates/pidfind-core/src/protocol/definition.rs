//! Text definitions of packet layouts.
//!
//! A definition file lists one field per line as `TYPE NAME`. Blank lines and
//! `#` comments are ignored:
//!
//! ```text
//! # S_LOGIN_RESULT
//! uint32  serverId
//! uint64  playerId
//! string  name
//! array<uint16> skills
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Wire type of a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// One byte boolean
    Bool,
    /// Unsigned byte
    Byte,
    /// Signed byte
    Int8,
    /// Signed 16-bit little-endian
    Int16,
    /// Unsigned 16-bit little-endian
    UInt16,
    /// Signed 32-bit little-endian
    Int32,
    /// Unsigned 32-bit little-endian
    UInt32,
    /// Signed 64-bit little-endian
    Int64,
    /// Unsigned 64-bit little-endian
    UInt64,
    /// IEEE 754 single precision
    Float,
    /// IEEE 754 double precision
    Double,
    /// Three single precision floats
    Vec3,
    /// `u16` byte length followed by UTF-8
    String,
    /// `u16` byte length followed by raw bytes
    Bytes,
    /// `u16` element count followed by the elements
    Array(Box<FieldType>),
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(inner) = s.strip_prefix("array<").and_then(|r| r.strip_suffix('>')) {
            let inner: FieldType = inner.trim().parse()?;
            if matches!(inner, FieldType::Array(_)) {
                return Err(Error::UnknownFieldType(s.to_string()));
            }
            return Ok(FieldType::Array(Box::new(inner)));
        }

        let ty = match s {
            "bool" => FieldType::Bool,
            "byte" | "uint8" => FieldType::Byte,
            "int8" => FieldType::Int8,
            "int16" => FieldType::Int16,
            "uint16" => FieldType::UInt16,
            "int32" => FieldType::Int32,
            "uint32" => FieldType::UInt32,
            "int64" => FieldType::Int64,
            "uint64" => FieldType::UInt64,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "vec3" => FieldType::Vec3,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            _ => return Err(Error::UnknownFieldType(s.to_string())),
        };
        Ok(ty)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::Byte => "byte",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::UInt16 => "uint16",
            FieldType::Int32 => "int32",
            FieldType::UInt32 => "uint32",
            FieldType::Int64 => "int64",
            FieldType::UInt64 => "uint64",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Vec3 => "vec3",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Array(inner) => return write!(f, "array<{}>", inner),
        };
        f.write_str(name)
    }
}

/// A named, typed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name as it appears in decoded records
    pub name: String,
    /// Wire type
    pub ty: FieldType,
}

/// One version of a packet layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Definition name, e.g. `C_LOGIN`
    pub name: String,
    /// Definition version
    pub version: u32,
    /// Body fields in wire order
    pub fields: Vec<Field>,
}

impl Definition {
    /// Creates a definition from already-parsed fields
    pub fn new(name: impl Into<String>, version: u32, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            version,
            fields,
        }
    }

    /// Parses definition text. `path` is only used in error messages.
    pub fn parse(name: &str, version: u32, text: &str, path: &Path) -> Result<Self> {
        let mut fields: Vec<Field> = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line = match raw_line.find('#') {
                Some(idx) => &raw_line[..idx],
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(ty), Some(field_name), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::definition_parse(
                    path,
                    index + 1,
                    format!("expected 'TYPE NAME', found '{}'", line),
                ));
            };

            let ty = ty
                .parse::<FieldType>()
                .map_err(|e| Error::definition_parse(path, index + 1, e.to_string()))?;

            if fields.iter().any(|f| f.name == field_name) {
                return Err(Error::definition_parse(
                    path,
                    index + 1,
                    format!("duplicate field '{}'", field_name),
                ));
            }

            fields.push(Field {
                name: field_name.to_string(),
                ty,
            });
        }

        Ok(Self::new(name, version, fields))
    }
}

/// Splits a `NAME.VERSION.def` file name into its parts
pub fn parse_definition_filename(file_name: &str) -> Option<(&str, u32)> {
    let stem = file_name.strip_suffix(".def")?;
    let (name, version) = stem.rsplit_once('.')?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((name, version.parse().ok()?))
}
