//! Typed values of decoded fields.

use std::fmt;

use compact_str::CompactString;

use crate::rules::parse_number;
use crate::schema::{Endian, ValueKind};

/// Decoded value of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Unsigned integer
    UInt(u64),
    /// Signed integer, sign-extended from its declared width
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text (lossy UTF-8, cut at the first NUL)
    Str(CompactString),
    /// Integer with its lookup table name, if the table has one
    Enum {
        value: u64,
        name: Option<CompactString>,
    },
    /// Raw bytes: `bytes` fields, partial fields and unassigned tails
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Decode `bytes` as a value of `kind`.
    ///
    /// Numeric kinds need exactly their fixed size; anything shorter comes
    /// back as [`FieldValue::Bytes`].
    pub fn read(kind: ValueKind, bytes: &[u8]) -> Self {
        match kind {
            ValueKind::UInt { width, endian } if bytes.len() == width as usize => {
                FieldValue::UInt(assemble(bytes, endian))
            }
            ValueKind::Int { width, endian } if bytes.len() == width as usize => {
                let shift = 64 - 8 * u32::from(width);
                let raw = assemble(bytes, endian);
                FieldValue::Int(((raw << shift) as i64) >> shift)
            }
            ValueKind::Float32 => match <[u8; 4]>::try_from(bytes) {
                Ok(b) => FieldValue::Float(f64::from(f32::from_le_bytes(b))),
                Err(_) => FieldValue::Bytes(bytes.to_vec()),
            },
            ValueKind::Float64 => match <[u8; 8]>::try_from(bytes) {
                Ok(b) => FieldValue::Float(f64::from_le_bytes(b)),
                Err(_) => FieldValue::Bytes(bytes.to_vec()),
            },
            ValueKind::String => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                FieldValue::Str(CompactString::from_utf8_lossy(&bytes[..end]))
            }
            _ => FieldValue::Bytes(bytes.to_vec()),
        }
    }

    /// Non-negative integer value, usable as a length.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt(v) => Some(*v),
            FieldValue::Int(v) => u64::try_from(*v).ok(),
            FieldValue::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Integer value as compared against switch case values.
    ///
    /// Negative integers keep their two's complement bit pattern, matching
    /// negative case literals.
    pub fn as_match_value(&self) -> Option<u64> {
        match self {
            FieldValue::UInt(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as u64),
            FieldValue::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            FieldValue::Enum { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// Whether this value equals user-entered text.
    ///
    /// Text comparison ignores ASCII case. Numeric values also match a number
    /// literal (`10`, `0x0A`, `-1`) with the same value.
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.trim();
        if let (Some(value), Some(wanted)) = (self.as_match_value(), parse_number(text)) {
            if value == wanted {
                return true;
            }
        }
        if let Some(s) = self.as_str() {
            if s.eq_ignore_ascii_case(text) {
                return true;
            }
        }
        match self {
            FieldValue::Float(v) => text.parse::<f64>().is_ok_and(|wanted| *v == wanted),
            FieldValue::Bytes(_) => self.to_string().eq_ignore_ascii_case(text),
            _ => false,
        }
    }
}

fn assemble(bytes: &[u8], endian: Endian) -> u64 {
    let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
    match endian {
        Endian::Big => bytes.iter().fold(0, fold),
        Endian::Little => bytes.iter().rev().fold(0, fold),
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::UInt(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::Enum {
                value,
                name: Some(name),
            } => write!(f, "{name} ({value})"),
            FieldValue::Enum { value, name: None } => write!(f, "{value}"),
            FieldValue::Bytes(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(token: &str) -> ValueKind {
        ValueKind::from_token(token).unwrap()
    }

    #[test]
    fn test_read_unsigned() {
        assert_eq!(FieldValue::read(kind("u16"), &[0x0A, 0x00]), FieldValue::UInt(10));
        assert_eq!(
            FieldValue::read(kind("u32be"), &[1, 2, 3, 4]),
            FieldValue::UInt(0x0102_0304)
        );
        assert_eq!(
            FieldValue::read(kind("u32"), &[1, 2, 3, 4]),
            FieldValue::UInt(0x0403_0201)
        );
        assert_eq!(
            FieldValue::read(kind("u64"), &[0xFF; 8]),
            FieldValue::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_read_signed() {
        assert_eq!(FieldValue::read(kind("i8"), &[0xFF]), FieldValue::Int(-1));
        assert_eq!(FieldValue::read(kind("i16"), &[0xFE, 0xFF]), FieldValue::Int(-2));
        assert_eq!(
            FieldValue::read(kind("i16be"), &[0x7F, 0xFF]),
            FieldValue::Int(0x7FFF)
        );
        assert_eq!(
            FieldValue::read(kind("i64"), &[0xFF; 8]),
            FieldValue::Int(-1)
        );
    }

    #[test]
    fn test_read_float() {
        assert_eq!(
            FieldValue::read(kind("f32"), &1.5f32.to_le_bytes()),
            FieldValue::Float(1.5)
        );
        assert_eq!(
            FieldValue::read(kind("f64"), &(-0.25f64).to_le_bytes()),
            FieldValue::Float(-0.25)
        );
    }

    #[test]
    fn test_read_string() {
        assert_eq!(
            FieldValue::read(kind("string"), b"Shantotto\0\0\0"),
            FieldValue::Str("Shantotto".into())
        );
        assert_eq!(
            FieldValue::read(kind("string"), &[0x41, 0xFF]),
            FieldValue::Str("A\u{FFFD}".into())
        );
    }

    #[test]
    fn test_read_short_numeric_is_bytes() {
        assert_eq!(
            FieldValue::read(kind("u32"), &[1, 2]),
            FieldValue::Bytes(vec![1, 2])
        );
        assert_eq!(
            FieldValue::read(kind("f64"), &[1]),
            FieldValue::Bytes(vec![1])
        );
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(FieldValue::UInt(5).as_u64(), Some(5));
        assert_eq!(FieldValue::Int(5).as_u64(), Some(5));
        assert_eq!(FieldValue::Int(-1).as_u64(), None);
        assert_eq!(FieldValue::Int(-1).as_match_value(), Some(u64::MAX));
        assert_eq!(FieldValue::Bytes(vec![1]).as_u64(), None);
        assert_eq!(FieldValue::Float(1.0).as_match_value(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::UInt(10).to_string(), "10");
        assert_eq!(FieldValue::Bytes(vec![0x0A, 0x00, 0xFF]).to_string(), "0A 00 FF");
        assert_eq!(
            FieldValue::Enum {
                value: 15,
                name: Some("Valkurm Dunes".into())
            }
            .to_string(),
            "Valkurm Dunes (15)"
        );
        assert_eq!(FieldValue::Enum { value: 3, name: None }.to_string(), "3");
    }

    #[test]
    fn test_matches_text() {
        assert!(FieldValue::UInt(10).matches_text("10"));
        assert!(FieldValue::UInt(10).matches_text("0x0a"));
        assert!(!FieldValue::UInt(10).matches_text("11"));
        assert!(FieldValue::Int(-1).matches_text("-1"));
        assert!(FieldValue::Str("Shantotto".into()).matches_text("shantotto"));
        assert!(FieldValue::Float(1.5).matches_text("1.5"));
        assert!(FieldValue::Bytes(vec![0xAB, 0x01]).matches_text("ab 01"));

        let zone = FieldValue::Enum {
            value: 15,
            name: Some("Valkurm Dunes".into()),
        };
        assert!(zone.matches_text("valkurm dunes"));
        assert!(zone.matches_text("15"));
    }
}
