//! Compact self-describing binary codec for telemetry and command frames.
//!
//! A frame is a flat sequence of records. Field names never travel on the
//! wire: each name is reduced to a 32-bit FNV-1a hash, and a [`KeyMap`]
//! recovers names on the receiving side when it did not author the frame.
//!
//! ## Wire Format
//! ```text
//! [key_hash(4, BE)] [type_tag(1)] [value(N, BE)] ...
//! ```
//!
//! | tag | value                         |
//! |-----|-------------------------------|
//! | 0   | string: `[len(1)] [utf-8]`    |
//! | 1-4 | signed int, 1/2/4/8 bytes     |
//! | 5   | f32                           |
//! | 6   | f64                           |
//! | 11-14 | unsigned int, 1/2/4/8 bytes |
//!
//! Integer widths are recorded in the tag, so decoding needs no schema for
//! widths, only (optionally) for names.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hard cap imposed by the one-byte string length prefix.
pub const MAX_STRING_LENGTH: usize = u8::MAX as usize;

/// Key hash plus type tag.
pub const RECORD_HEADER_SIZE: usize = 5;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash of a field name.
pub fn key_hash(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Wire type tag of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Str = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    F32 = 5,
    F64 = 6,
    U8 = 11,
    U16 = 12,
    U32 = 13,
    U64 = 14,
}

impl TypeTag {
    /// Detect tag from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TypeTag::Str),
            1 => Some(TypeTag::I8),
            2 => Some(TypeTag::I16),
            3 => Some(TypeTag::I32),
            4 => Some(TypeTag::I64),
            5 => Some(TypeTag::F32),
            6 => Some(TypeTag::F64),
            11 => Some(TypeTag::U8),
            12 => Some(TypeTag::U16),
            13 => Some(TypeTag::U32),
            14 => Some(TypeTag::U64),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Fixed value width in bytes; `None` for length-prefixed strings.
    pub fn width(self) -> Option<usize> {
        match self {
            TypeTag::Str => None,
            TypeTag::I8 | TypeTag::U8 => Some(1),
            TypeTag::I16 | TypeTag::U16 => Some(2),
            TypeTag::I32 | TypeTag::U32 | TypeTag::F32 => Some(4),
            TypeTag::I64 | TypeTag::U64 | TypeTag::F64 => Some(8),
        }
    }

    fn signed(width: u8) -> Result<Self> {
        match width {
            1 => Ok(TypeTag::I8),
            2 => Ok(TypeTag::I16),
            4 => Ok(TypeTag::I32),
            8 => Ok(TypeTag::I64),
            other => Err(ProtocolError::InvalidIntWidth(other)),
        }
    }

    fn unsigned(width: u8) -> Result<Self> {
        match width {
            1 => Ok(TypeTag::U8),
            2 => Ok(TypeTag::U16),
            4 => Ok(TypeTag::U32),
            8 => Ok(TypeTag::U64),
            other => Err(ProtocolError::InvalidIntWidth(other)),
        }
    }
}

/// A decoded (or to-be-encoded) field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v) => u64::try_from(v).ok(),
            Value::UInt(v) => Some(v),
            _ => None,
        }
    }

    /// Floats as-is; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::UInt(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Mapping from key hash back to field name.
///
/// Built once per frame layout and exchanged out-of-band so a peer can decode
/// frames it did not author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap(BTreeMap<u32, String>);

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key map from a list of field names.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for key in keys {
            map.insert(key.as_ref());
        }
        map
    }

    /// Register a name and return its hash. A colliding name replaces the old one.
    pub fn insert(&mut self, key: &str) -> u32 {
        let hash = key_hash(key);
        self.0.insert(hash, key.to_string());
        hash
    }

    pub fn get(&self, hash: u32) -> Option<&str> {
        self.0.get(&hash).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(&key_hash(key))
    }

    pub fn merge(&mut self, other: &KeyMap) {
        self.0
            .extend(other.0.iter().map(|(hash, name)| (*hash, name.clone())));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(hash, name)| (*hash, name.as_str()))
    }
}

#[derive(Debug, Clone)]
struct EncodedField {
    key: String,
    tag: TypeTag,
    value: Value,
}

/// Builds a binary frame field by field.
///
/// Re-adding a key replaces its value but keeps the position of the first add.
#[derive(Debug, Clone)]
pub struct BinaryEncoder {
    fields: Vec<EncodedField>,
    max_string_length: usize,
}

impl Default for BinaryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryEncoder {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            max_string_length: MAX_STRING_LENGTH,
        }
    }

    /// Limit string fields to `max` bytes (never above [`MAX_STRING_LENGTH`]).
    pub fn with_max_string_length(max: usize) -> Self {
        Self {
            fields: Vec::new(),
            max_string_length: max.min(MAX_STRING_LENGTH),
        }
    }

    /// Add an integer using the narrowest width that holds it.
    pub fn add_int(&mut self, key: &str, value: i64) {
        let tag = narrowest_int_tag(i128::from(value));
        self.push(key, tag, Value::Int(value));
    }

    /// Add an unsigned integer using the narrowest width that holds it.
    pub fn add_uint(&mut self, key: &str, value: u64) {
        let tag = narrowest_int_tag(i128::from(value));
        self.push(key, tag, int_value(i128::from(value)));
    }

    /// Add an integer with a caller-chosen width of 1, 2, 4 or 8 bytes.
    ///
    /// The signed form is used when the value fits, otherwise the unsigned form.
    pub fn add_int_with_width(&mut self, key: &str, value: i64, width: u8) -> Result<()> {
        let tag = int_tag_for_width(i128::from(value), width)?;
        self.push(key, tag, Value::Int(value));
        Ok(())
    }

    /// Booleans travel as a one-byte integer.
    pub fn add_bool(&mut self, key: &str, value: bool) {
        self.push(key, TypeTag::I8, Value::Int(i64::from(value)));
    }

    /// Add a single-precision float.
    pub fn add_float(&mut self, key: &str, value: f64) {
        self.push(key, TypeTag::F32, Value::Float(value));
    }

    /// Add a double-precision float.
    pub fn add_double(&mut self, key: &str, value: f64) {
        self.push(key, TypeTag::F64, Value::Float(value));
    }

    /// Add a length-prefixed UTF-8 string. Fails rather than truncating.
    pub fn add_string(&mut self, key: &str, value: &str) -> Result<()> {
        if value.len() > self.max_string_length {
            return Err(ProtocolError::StringTooLong {
                len: value.len(),
                max: self.max_string_length,
            });
        }
        self.push(key, TypeTag::Str, Value::Str(value.to_string()));
        Ok(())
    }

    /// Add a value with its default encoding (f32 for floats).
    pub fn add_value(&mut self, key: &str, value: &Value) -> Result<()> {
        match value {
            Value::Int(v) => self.add_int(key, *v),
            Value::UInt(v) => self.add_uint(key, *v),
            Value::Float(v) => self.add_float(key, *v),
            Value::Str(s) => self.add_string(key, s)?,
        }
        Ok(())
    }

    fn push(&mut self, key: &str, tag: TypeTag, value: Value) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.key == key) {
            existing.tag = tag;
            existing.value = value;
        } else {
            self.fields.push(EncodedField {
                key: key.to_string(),
                tag,
                value,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Key map covering every field added so far.
    pub fn key_map(&self) -> KeyMap {
        KeyMap::from_keys(self.fields.iter().map(|f| f.key.as_str()))
    }

    /// Serialize all fields in insertion order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = self
            .fields
            .iter()
            .map(|f| {
                let value_len = match f.tag.width() {
                    Some(width) => width,
                    None => 1 + f.value.as_str().map_or(0, str::len),
                };
                RECORD_HEADER_SIZE + value_len
            })
            .sum();
        let mut out = Vec::with_capacity(capacity);
        for field in &self.fields {
            out.put_u32(key_hash(&field.key));
            out.put_u8(field.tag.as_byte());
            put_value(&mut out, field.tag, &field.value);
        }
        out
    }
}

fn int_value(value: i128) -> Value {
    match i64::try_from(value) {
        Ok(v) => Value::Int(v),
        Err(_) => Value::UInt(value as u64),
    }
}

fn signed_range(width: u8) -> (i128, i128) {
    let bits = u32::from(width) * 8;
    (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
}

fn unsigned_max(width: u8) -> i128 {
    (1i128 << (u32::from(width) * 8)) - 1
}

fn int_tag_for_width(value: i128, width: u8) -> Result<TypeTag> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(ProtocolError::InvalidIntWidth(width));
    }
    let (min, max) = signed_range(width);
    if (min..=max).contains(&value) {
        TypeTag::signed(width)
    } else if (0..=unsigned_max(width)).contains(&value) {
        TypeTag::unsigned(width)
    } else {
        Err(ProtocolError::IntOutOfRange { value, width })
    }
}

fn narrowest_int_tag(value: i128) -> TypeTag {
    // Every i64 and u64 fits in eight bytes, signed or unsigned.
    [1u8, 2, 4, 8]
        .into_iter()
        .find_map(|width| int_tag_for_width(value, width).ok())
        .unwrap_or(TypeTag::I64)
}

fn put_value(out: &mut Vec<u8>, tag: TypeTag, value: &Value) {
    // Integer tags were chosen from the value's range, so the casts are exact.
    let int = match value {
        Value::Int(v) => i128::from(*v),
        Value::UInt(v) => i128::from(*v),
        _ => 0,
    };
    match tag {
        TypeTag::Str => {
            let bytes = value.as_str().unwrap_or_default().as_bytes();
            out.put_u8(bytes.len() as u8);
            out.put_slice(bytes);
        }
        TypeTag::I8 => out.put_i8(int as i8),
        TypeTag::I16 => out.put_i16(int as i16),
        TypeTag::I32 => out.put_i32(int as i32),
        TypeTag::I64 => out.put_i64(int as i64),
        TypeTag::U8 => out.put_u8(int as u8),
        TypeTag::U16 => out.put_u16(int as u16),
        TypeTag::U32 => out.put_u32(int as u32),
        TypeTag::U64 => out.put_u64(int as u64),
        TypeTag::F32 => out.put_f32(value.as_f64().unwrap_or_default() as f32),
        TypeTag::F64 => out.put_f64(value.as_f64().unwrap_or_default()),
    }
}

/// Encode an ordered list of named values with default widths.
pub fn encode(fields: &[(&str, Value)]) -> Result<Vec<u8>> {
    let mut encoder = BinaryEncoder::new();
    for (key, value) in fields {
        encoder.add_value(key, value)?;
    }
    Ok(encoder.to_bytes())
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key_hash: u32,
    /// Name resolved through the key map, if one was supplied and knew the hash.
    pub name: Option<String>,
    pub tag: TypeTag,
    pub value: Value,
}

impl Record {
    /// Human readable key: the resolved name, or `field_<hash>`.
    pub fn display_key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("field_{:08x}", self.key_hash),
        }
    }
}

/// A decoded frame. Lookups are keyed; on hash collision the last record wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    records: Vec<Record>,
}

impl Frame {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get_by_hash(&self, hash: u32) -> Option<&Value> {
        self.records
            .iter()
            .rev()
            .find(|r| r.key_hash == hash)
            .map(|r| &r.value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.get_by_hash(key_hash(key))
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_uint(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Flatten into a name (or `field_<hash>`) to value map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.records
            .iter()
            .map(|r| (r.display_key(), r.value.clone()))
            .collect()
    }
}

fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ProtocolError::BufferOverrun {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Decode a frame, resolving names through `key_map` when given.
///
/// Every length and width is checked against the remaining buffer; truncated
/// or unknown records produce an error, never an out-of-bounds read.
pub fn decode(bytes: &[u8], key_map: Option<&KeyMap>) -> Result<Frame> {
    let mut buf = bytes;
    let mut records = Vec::new();

    while buf.has_remaining() {
        ensure(buf, RECORD_HEADER_SIZE)?;
        let hash = buf.get_u32();
        let tag_byte = buf.get_u8();
        let tag = TypeTag::from_byte(tag_byte).ok_or(ProtocolError::UnknownTypeTag(tag_byte))?;

        let value = match tag {
            TypeTag::Str => {
                ensure(buf, 1)?;
                let len = usize::from(buf.get_u8());
                ensure(buf, len)?;
                let text = std::str::from_utf8(&buf[..len]).map_err(|_| ProtocolError::InvalidUtf8)?;
                let value = Value::Str(text.to_string());
                buf.advance(len);
                value
            }
            fixed => {
                ensure(buf, fixed.width().unwrap_or_default())?;
                match fixed {
                    TypeTag::I8 => Value::Int(i64::from(buf.get_i8())),
                    TypeTag::I16 => Value::Int(i64::from(buf.get_i16())),
                    TypeTag::I32 => Value::Int(i64::from(buf.get_i32())),
                    TypeTag::I64 => Value::Int(buf.get_i64()),
                    TypeTag::U8 => Value::UInt(u64::from(buf.get_u8())),
                    TypeTag::U16 => Value::UInt(u64::from(buf.get_u16())),
                    TypeTag::U32 => Value::UInt(u64::from(buf.get_u32())),
                    TypeTag::U64 => Value::UInt(buf.get_u64()),
                    TypeTag::F32 => Value::Float(f64::from(buf.get_f32())),
                    TypeTag::F64 => Value::Float(buf.get_f64()),
                    TypeTag::Str => unreachable!("strings handled above"),
                }
            }
        };

        records.push(Record {
            key_hash: hash,
            name: key_map.and_then(|m| m.get(hash)).map(str::to_string),
            tag,
            value,
        });
    }

    Ok(Frame { records })
}
