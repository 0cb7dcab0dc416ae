//! Typed protocol values and their binary encoding.
//!
//! Every value on the wire is a single [`TypeTag`] byte followed by the
//! type-specific body. All numerics are fixed-width, big endian.
//!
//! | Tag | Body |
//! |-----|------|
//! | `Integer` | `i32` |
//! | `Double` | `f64` |
//! | `Byte` | `u8` |
//! | `String` | `u32` byte count + UTF-8 bytes |
//! | `StringList` | `u32` item count + that many strings |
//! | `Position2D` | `f64 x, f64 y` |
//! | `Position3D` | `f64 x, f64 y, f64 z` |
//! | `PositionLonLat` | `f64 lon, f64 lat` |
//! | `PositionLonLatAlt` | `f64 lon, f64 lat, f64 alt` |
//! | `BoundingBox` | two `Position2D` bodies (min corner, max corner) |
//! | `Compound` | `u32` item count + that many tagged values |
//!
//! # Example
//!
//! ```
//! use traci_core::value::{decode_value, encode_value, TypeTag, Value};
//!
//! let mut wire = Vec::new();
//! encode_value(&mut wire, &Value::Double(-3.5)).unwrap();
//! assert_eq!(decode_value(&wire, TypeTag::Double).unwrap(), Value::Double(-3.5));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::tag;
use crate::protocol::ProtocolError;

/// Compound values may nest, but not without bound.
const MAX_COMPOUND_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// TypeTag
// ---------------------------------------------------------------------------

/// The kind of a value on the wire.
///
/// The item count of a compound lives in the value body, not in the tag, so
/// two compounds of different arity share [`TypeTag::Compound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Integer,
    Double,
    String,
    StringList,
    Byte,
    Position2D,
    Position3D,
    PositionLonLat,
    PositionLonLatAlt,
    BoundingBox,
    Compound,
}

impl TypeTag {
    /// Try to convert a raw byte into a `TypeTag`.
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            tag::INTEGER => Ok(TypeTag::Integer),
            tag::DOUBLE => Ok(TypeTag::Double),
            tag::STRING => Ok(TypeTag::String),
            tag::STRING_LIST => Ok(TypeTag::StringList),
            tag::UBYTE => Ok(TypeTag::Byte),
            tag::POSITION_2D => Ok(TypeTag::Position2D),
            tag::POSITION_3D => Ok(TypeTag::Position3D),
            tag::POSITION_LON_LAT => Ok(TypeTag::PositionLonLat),
            tag::POSITION_LON_LAT_ALT => Ok(TypeTag::PositionLonLatAlt),
            tag::BOUNDING_BOX => Ok(TypeTag::BoundingBox),
            tag::COMPOUND => Ok(TypeTag::Compound),
            other => Err(ProtocolError::UnknownTypeTag(other)),
        }
    }

    /// The byte written on the wire for this tag.
    pub fn as_u8(self) -> u8 {
        match self {
            TypeTag::Integer => tag::INTEGER,
            TypeTag::Double => tag::DOUBLE,
            TypeTag::String => tag::STRING,
            TypeTag::StringList => tag::STRING_LIST,
            TypeTag::Byte => tag::UBYTE,
            TypeTag::Position2D => tag::POSITION_2D,
            TypeTag::Position3D => tag::POSITION_3D,
            TypeTag::PositionLonLat => tag::POSITION_LON_LAT,
            TypeTag::PositionLonLatAlt => tag::POSITION_LON_LAT_ALT,
            TypeTag::BoundingBox => tag::BOUNDING_BOX,
            TypeTag::Compound => tag::COMPOUND,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Integer => "integer",
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::StringList => "string list",
            TypeTag::Byte => "byte",
            TypeTag::Position2D => "2D position",
            TypeTag::Position3D => "3D position",
            TypeTag::PositionLonLat => "lon/lat position",
            TypeTag::PositionLonLatAlt => "lon/lat/alt position",
            TypeTag::BoundingBox => "bounding box",
            TypeTag::Compound => "compound",
        };
        write!(f, "{name} (0x{:02X})", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// A planar network position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl Position2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A network position with elevation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lon: f64,
    pub lat: f64,
}

/// A geographic position with altitude.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition3D {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
}

/// Axis-aligned rectangle given by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Position2D,
    pub max: Position2D,
}

/// A decoded (or to-be-encoded) protocol value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Integer(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    Byte(u8),
    Position2D(Position2D),
    Position3D(Position3D),
    PositionLonLat(GeoPosition),
    PositionLonLatAlt(GeoPosition3D),
    BoundingBox(BoundingBox),
    Compound(Vec<Value>),
}

impl Value {
    /// The tag this value is written with.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Integer,
            Value::Double(_) => TypeTag::Double,
            Value::String(_) => TypeTag::String,
            Value::StringList(_) => TypeTag::StringList,
            Value::Byte(_) => TypeTag::Byte,
            Value::Position2D(_) => TypeTag::Position2D,
            Value::Position3D(_) => TypeTag::Position3D,
            Value::PositionLonLat(_) => TypeTag::PositionLonLat,
            Value::PositionLonLatAlt(_) => TypeTag::PositionLonLatAlt,
            Value::BoundingBox(_) => TypeTag::BoundingBox,
            Value::Compound(_) => TypeTag::Compound,
        }
    }

    /// A byte flag: `1` for `true`, `0` for `false`.
    pub fn flag(v: bool) -> Self {
        Value::Byte(u8::from(v))
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Value::StringList(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Value::BoundingBox(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::StringList(items) => write!(f, "{}", items.join(" ")),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Position2D(p) => write!(f, "{},{}", p.x, p.y),
            Value::Position3D(p) => write!(f, "{},{},{}", p.x, p.y, p.z),
            Value::PositionLonLat(p) => write!(f, "{},{}", p.lon, p.lat),
            Value::PositionLonLatAlt(p) => write!(f, "{},{},{}", p.lon, p.lat, p.alt),
            Value::BoundingBox(b) => {
                write!(f, "{},{} {},{}", b.min.x, b.min.y, b.max.x, b.max.y)
            }
            Value::Compound(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Convert a collection length to its `u32` wire form.
fn wire_len(len: usize, what: &str) -> Result<u32, ProtocolError> {
    u32::try_from(len)
        .map_err(|_| ProtocolError::Encoding(format!("{what} of {len} items does not fit in u32")))
}

/// Write a length-prefixed UTF-8 string into `buf`.
///
/// Format: `[u32 BE byte_count] [UTF-8 bytes]`
pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&wire_len(bytes.len(), "string")?.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn write_position(buf: &mut Vec<u8>, p: &Position2D) {
    buf.extend_from_slice(&p.x.to_be_bytes());
    buf.extend_from_slice(&p.y.to_be_bytes());
}

/// Append `value` to `buf` as `[TypeTag][body]`.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), ProtocolError> {
    buf.push(value.type_tag().as_u8());
    match value {
        Value::Integer(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Byte(v) => buf.push(*v),
        Value::String(s) => write_string(buf, s)?,
        Value::StringList(items) => {
            buf.extend_from_slice(&wire_len(items.len(), "string list")?.to_be_bytes());
            for item in items {
                write_string(buf, item)?;
            }
        }
        Value::Position2D(p) => write_position(buf, p),
        Value::Position3D(p) => {
            buf.extend_from_slice(&p.x.to_be_bytes());
            buf.extend_from_slice(&p.y.to_be_bytes());
            buf.extend_from_slice(&p.z.to_be_bytes());
        }
        Value::PositionLonLat(p) => {
            buf.extend_from_slice(&p.lon.to_be_bytes());
            buf.extend_from_slice(&p.lat.to_be_bytes());
        }
        Value::PositionLonLatAlt(p) => {
            buf.extend_from_slice(&p.lon.to_be_bytes());
            buf.extend_from_slice(&p.lat.to_be_bytes());
            buf.extend_from_slice(&p.alt.to_be_bytes());
        }
        Value::BoundingBox(b) => {
            write_position(buf, &b.min);
            write_position(buf, &b.max);
        }
        Value::Compound(items) => {
            buf.extend_from_slice(&wire_len(items.len(), "compound")?.to_be_bytes());
            for item in items {
                encode_value(buf, item)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a single tagged value that must be of kind `expected`.
///
/// The whole of `data` must be consumed by the value.
pub fn decode_value(data: &[u8], expected: TypeTag) -> Result<Value, ProtocolError> {
    let mut cur = Cursor::new(data);
    let value = cur.read_expected_value(expected)?;
    if cur.remaining() > 0 {
        return Err(ProtocolError::TrailingBytes(cur.remaining()));
    }
    Ok(value)
}

/// A cursor over a byte slice for sequential big-endian reads.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        if self.remaining() < N {
            return Err(ProtocolError::InsufficientData);
        }
        let bytes: [u8; N] = self.data[self.pos..self.pos + N]
            .try_into()
            .map_err(|_| ProtocolError::InsufficientData)?;
        self.pos += N;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    /// Read a length-prefixed UTF-8 string.
    pub(crate) fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()? as usize;
        if self.remaining() < len {
            return Err(ProtocolError::InsufficientData);
        }
        let s = std::str::from_utf8(&self.data[self.pos..self.pos + len])
            .map_err(|_| ProtocolError::Utf8Error)?;
        self.pos += len;
        Ok(s.to_owned())
    }

    /// Read an item count, rejecting counts that cannot possibly fit in the
    /// rest of the buffer given `min_item_size` bytes per item.
    fn read_count(&mut self, min_item_size: usize) -> Result<usize, ProtocolError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_item_size) > self.remaining() {
            return Err(ProtocolError::InsufficientData);
        }
        Ok(count)
    }

    fn read_position(&mut self) -> Result<Position2D, ProtocolError> {
        Ok(Position2D {
            x: self.read_f64()?,
            y: self.read_f64()?,
        })
    }

    /// Read `[TypeTag][body]`, accepting any tag.
    pub(crate) fn read_tagged_value(&mut self) -> Result<Value, ProtocolError> {
        let tag = TypeTag::from_u8(self.read_u8()?)?;
        self.read_body(tag, 0)
    }

    /// Read `[TypeTag][body]`, failing with `TypeMismatch` before touching the
    /// body if the wire tag is not `expected`.
    pub(crate) fn read_expected_value(&mut self, expected: TypeTag) -> Result<Value, ProtocolError> {
        let actual = TypeTag::from_u8(self.read_u8()?)?;
        if actual != expected {
            return Err(ProtocolError::TypeMismatch { expected, actual });
        }
        self.read_body(actual, 0)
    }

    /// Read the body of a value whose tag has already been consumed.
    pub(crate) fn read_body(&mut self, tag: TypeTag, depth: usize) -> Result<Value, ProtocolError> {
        let value = match tag {
            TypeTag::Integer => Value::Integer(self.read_i32()?),
            TypeTag::Double => Value::Double(self.read_f64()?),
            TypeTag::Byte => Value::Byte(self.read_u8()?),
            TypeTag::String => Value::String(self.read_string()?),
            TypeTag::StringList => {
                let count = self.read_count(4)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_string()?);
                }
                Value::StringList(items)
            }
            TypeTag::Position2D => Value::Position2D(self.read_position()?),
            TypeTag::Position3D => Value::Position3D(Position3D {
                x: self.read_f64()?,
                y: self.read_f64()?,
                z: self.read_f64()?,
            }),
            TypeTag::PositionLonLat => Value::PositionLonLat(GeoPosition {
                lon: self.read_f64()?,
                lat: self.read_f64()?,
            }),
            TypeTag::PositionLonLatAlt => Value::PositionLonLatAlt(GeoPosition3D {
                lon: self.read_f64()?,
                lat: self.read_f64()?,
                alt: self.read_f64()?,
            }),
            TypeTag::BoundingBox => Value::BoundingBox(BoundingBox {
                min: self.read_position()?,
                max: self.read_position()?,
            }),
            TypeTag::Compound => {
                if depth >= MAX_COMPOUND_DEPTH {
                    return Err(ProtocolError::InvalidPayload(format!(
                        "compound nesting deeper than {MAX_COMPOUND_DEPTH}"
                    )));
                }
                let count = self.read_count(2)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    let tag = TypeTag::from_u8(self.read_u8()?)?;
                    items.push(self.read_body(tag, depth + 1)?);
                }
                Value::Compound(items)
            }
        };
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
