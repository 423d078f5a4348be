use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, IndexResult};

pub const NULL_TAG: u8 = 0x01;
pub const BOOL_TAG: u8 = 0x02;
pub const INT_TAG: u8 = 0x10;
pub const FLOAT_TAG: u8 = 0x11;
pub const BYTES_TAG: u8 = 0x20;
pub const TEXT_TAG: u8 = 0x21;
pub const TUPLE_TAG: u8 = 0x30;

/// Closes a tuple. Lower than every tag, so a tuple sorts before any longer tuple it prefixes.
const TUPLE_END: u8 = 0x00;

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x00;

const SIGN_BIT: u64 = 1 << 63;

/// A value that can be part of an index key.
///
/// Encoded values compare byte-wise in the same order as the values themselves. Values of
/// different kinds order by kind: null, bool, int, float, bytes, text, tuple. Integers and
/// floats are separate kinds and never interleave.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Tuple(Vec<KeyValue>),
}

impl KeyValue {
    /// Encodes this value into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Appends the encoding of this value to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            KeyValue::Null => out.push(NULL_TAG),
            KeyValue::Bool(value) => {
                out.push(BOOL_TAG);
                out.push(u8::from(*value));
            }
            KeyValue::Int(value) => {
                out.push(INT_TAG);
                out.extend_from_slice(&ordered_i64_bytes(*value));
            }
            KeyValue::Float(value) => {
                out.push(FLOAT_TAG);
                out.extend_from_slice(&ordered_f64_bytes(*value));
            }
            KeyValue::Bytes(value) => {
                out.push(BYTES_TAG);
                push_terminated_bytes(out, value);
            }
            KeyValue::Text(value) => {
                out.push(TEXT_TAG);
                push_terminated_bytes(out, value.as_bytes());
            }
            KeyValue::Tuple(values) => {
                out.push(TUPLE_TAG);
                for value in values {
                    value.encode_into(out);
                }
                out.push(TUPLE_END);
            }
        }
    }

    /// Decodes exactly one value; trailing bytes are an error.
    pub fn decode(bytes: &[u8]) -> IndexResult<KeyValue> {
        let (value, consumed) = Self::decode_prefix(bytes)?;
        if consumed != bytes.len() {
            bail!(
                ErrorKind::KeyDecodingFailed,
                "Trailing bytes after encoded value",
                format!("{} unread bytes", bytes.len() - consumed)
            );
        }

        Ok(value)
    }

    /// Decodes one value from the front of `bytes`, returning it with the number of bytes read.
    pub fn decode_prefix(bytes: &[u8]) -> IndexResult<(KeyValue, usize)> {
        let Some((&tag, payload)) = bytes.split_first() else {
            bail!(ErrorKind::KeyDecodingFailed, "Encoded value is empty");
        };

        match tag {
            NULL_TAG => Ok((KeyValue::Null, 1)),
            BOOL_TAG => match payload.first() {
                Some(0) => Ok((KeyValue::Bool(false), 2)),
                Some(1) => Ok((KeyValue::Bool(true), 2)),
                _ => bail!(ErrorKind::KeyDecodingFailed, "Invalid bool payload"),
            },
            INT_TAG => {
                let bits = fixed_u64(payload)?;
                Ok((KeyValue::Int((bits ^ SIGN_BIT) as i64), 9))
            }
            FLOAT_TAG => {
                let bits = fixed_u64(payload)?;
                let bits = if bits & SIGN_BIT != 0 {
                    bits ^ SIGN_BIT
                } else {
                    !bits
                };
                Ok((KeyValue::Float(f64::from_bits(bits)), 9))
            }
            BYTES_TAG => {
                let (value, read) = read_terminated_bytes(payload)?;
                Ok((KeyValue::Bytes(value), read + 1))
            }
            TEXT_TAG => {
                let (value, read) = read_terminated_bytes(payload)?;
                Ok((KeyValue::Text(String::from_utf8(value)?), read + 1))
            }
            TUPLE_TAG => {
                let mut values = Vec::new();
                let mut offset = 1;
                loop {
                    match bytes.get(offset) {
                        Some(&TUPLE_END) => return Ok((KeyValue::Tuple(values), offset + 1)),
                        Some(_) => {
                            let (value, read) = Self::decode_prefix(&bytes[offset..])?;
                            values.push(value);
                            offset += read;
                        }
                        None => bail!(ErrorKind::KeyDecodingFailed, "Unterminated tuple"),
                    }
                }
            }
            other => bail!(
                ErrorKind::KeyDecodingFailed,
                "Unknown type tag",
                format!("tag 0x{other:02x}")
            ),
        }
    }
}

const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

const fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_BIT == 0 {
        bits ^ SIGN_BIT
    } else {
        !bits
    };

    ordered.to_be_bytes()
}

fn fixed_u64(payload: &[u8]) -> IndexResult<u64> {
    match payload.get(..8).map(<[u8; 8]>::try_from) {
        Some(Ok(raw)) => Ok(u64::from_be_bytes(raw)),
        _ => bail!(ErrorKind::KeyDecodingFailed, "Truncated numeric payload"),
    }
}

// 0x00 is escaped as 0x00 0xFF, so the 0x00 0x00 terminator is unambiguous.
pub(crate) fn push_terminated_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if byte == ESCAPE {
            out.extend_from_slice(&[ESCAPE, ESCAPED_ZERO]);
        } else {
            out.push(byte);
        }
    }

    out.extend_from_slice(&[ESCAPE, TERMINATOR]);
}

fn read_terminated_bytes(payload: &[u8]) -> IndexResult<(Vec<u8>, usize)> {
    let mut value = Vec::new();
    let mut index = 0;

    while index < payload.len() {
        let byte = payload[index];
        if byte != ESCAPE {
            value.push(byte);
            index += 1;
            continue;
        }

        match payload.get(index + 1) {
            Some(&TERMINATOR) => return Ok((value, index + 2)),
            Some(&ESCAPED_ZERO) => {
                value.push(ESCAPE);
                index += 2;
            }
            _ => bail!(ErrorKind::KeyDecodingFailed, "Invalid escape sequence"),
        }
    }

    bail!(ErrorKind::KeyDecodingFailed, "Unterminated byte string")
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Int(i64::from(value))
    }
}

impl From<u32> for KeyValue {
    fn from(value: u32) -> Self {
        KeyValue::Int(i64::from(value))
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<&String> for KeyValue {
    fn from(value: &String) -> Self {
        KeyValue::Text(value.clone())
    }
}

impl From<Vec<u8>> for KeyValue {
    fn from(value: Vec<u8>) -> Self {
        KeyValue::Bytes(value)
    }
}

impl From<&[u8]> for KeyValue {
    fn from(value: &[u8]) -> Self {
        KeyValue::Bytes(value.to_vec())
    }
}

impl From<Vec<KeyValue>> for KeyValue {
    fn from(values: Vec<KeyValue>) -> Self {
        KeyValue::Tuple(values)
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(KeyValue::Null)
    }
}

/// Converts JSON scalars and arrays. Objects have no defined order and are rejected.
impl TryFrom<&Value> for KeyValue {
    type Error = crate::error::IndexError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(KeyValue::Null),
            Value::Bool(value) => Ok(KeyValue::Bool(*value)),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(KeyValue::Int(value))
                } else if let Some(value) = number.as_f64() {
                    Ok(KeyValue::Float(value))
                } else {
                    bail!(
                        ErrorKind::ConversionError,
                        "JSON number cannot be represented",
                        number
                    )
                }
            }
            Value::String(value) => Ok(KeyValue::Text(value.clone())),
            Value::Array(values) => values
                .iter()
                .map(KeyValue::try_from)
                .collect::<IndexResult<Vec<_>>>()
                .map(KeyValue::Tuple),
            Value::Object(_) => bail!(
                ErrorKind::ConversionError,
                "JSON objects cannot be used as index values"
            ),
        }
    }
}
