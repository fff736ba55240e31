//! Field value type definitions.

/// Byte order of a multi-byte integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

/// Value types a rule line can declare.
///
/// Integer types default to little-endian; the `be` suffixed tokens read
/// big-endian. `String` and `Bytes` are variable-width and need a length
/// (fixed or taken from an earlier field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Unsigned integer of `width` bytes (1, 2, 4 or 8)
    UInt { width: u8, endian: Endian },

    /// Signed two's complement integer of `width` bytes
    Int { width: u8, endian: Endian },

    /// IEEE 754 single precision, little-endian
    Float32,

    /// IEEE 754 double precision, little-endian
    Float64,

    /// Text, cut at the first NUL byte
    String,

    /// Opaque bytes
    Bytes,
}

impl ValueKind {
    /// Parse a type token from rule text (case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        use Endian::{Big, Little};

        let kind = match token.to_ascii_lowercase().as_str() {
            "u8" | "byte" => ValueKind::UInt { width: 1, endian: Little },
            "u16" => ValueKind::UInt { width: 2, endian: Little },
            "u32" => ValueKind::UInt { width: 4, endian: Little },
            "u64" => ValueKind::UInt { width: 8, endian: Little },
            "u16be" => ValueKind::UInt { width: 2, endian: Big },
            "u32be" => ValueKind::UInt { width: 4, endian: Big },
            "u64be" => ValueKind::UInt { width: 8, endian: Big },
            "i8" => ValueKind::Int { width: 1, endian: Little },
            "i16" => ValueKind::Int { width: 2, endian: Little },
            "i32" => ValueKind::Int { width: 4, endian: Little },
            "i64" => ValueKind::Int { width: 8, endian: Little },
            "i16be" => ValueKind::Int { width: 2, endian: Big },
            "i32be" => ValueKind::Int { width: 4, endian: Big },
            "i64be" => ValueKind::Int { width: 8, endian: Big },
            "f32" | "float" => ValueKind::Float32,
            "f64" | "double" => ValueKind::Float64,
            "string" | "str" => ValueKind::String,
            "bytes" | "data" => ValueKind::Bytes,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical type token, as accepted by [`ValueKind::from_token`].
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::UInt { width, endian } => match (width, endian) {
                (1, _) => "u8",
                (2, Endian::Little) => "u16",
                (4, Endian::Little) => "u32",
                (2, Endian::Big) => "u16be",
                (4, Endian::Big) => "u32be",
                (_, Endian::Little) => "u64",
                (_, Endian::Big) => "u64be",
            },
            ValueKind::Int { width, endian } => match (width, endian) {
                (1, _) => "i8",
                (2, Endian::Little) => "i16",
                (4, Endian::Little) => "i32",
                (2, Endian::Big) => "i16be",
                (4, Endian::Big) => "i32be",
                (_, Endian::Little) => "i64",
                (_, Endian::Big) => "i64be",
            },
            ValueKind::Float32 => "f32",
            ValueKind::Float64 => "f64",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
        }
    }

    /// Size in bytes for fixed-width types, None for variable-width.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ValueKind::UInt { width, .. } | ValueKind::Int { width, .. } => Some(*width as usize),
            ValueKind::Float32 => Some(4),
            ValueKind::Float64 => Some(8),
            ValueKind::String | ValueKind::Bytes => None,
        }
    }

    /// Whether values of this kind can drive lengths, switches and lookups.
    pub fn is_integer(&self) -> bool {
        matches!(self, ValueKind::UInt { .. } | ValueKind::Int { .. })
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tokens() {
        assert_eq!(
            ValueKind::from_token("u16"),
            Some(ValueKind::UInt { width: 2, endian: Endian::Little })
        );
        assert_eq!(
            ValueKind::from_token("U32BE"),
            Some(ValueKind::UInt { width: 4, endian: Endian::Big })
        );
        assert_eq!(ValueKind::from_token("string"), Some(ValueKind::String));
        assert_eq!(ValueKind::from_token("u24"), None);
        assert_eq!(ValueKind::from_token(""), None);
    }

    #[test]
    fn test_type_names_round_trip() {
        for token in [
            "u8", "u16", "u32", "u64", "u16be", "u32be", "u64be", "i8", "i16", "i32", "i64",
            "i16be", "i32be", "i64be", "f32", "f64", "string", "bytes",
        ] {
            let kind = ValueKind::from_token(token).unwrap();
            assert_eq!(kind.type_name(), token);
        }
    }

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(ValueKind::from_token("u32").unwrap().fixed_size(), Some(4));
        assert_eq!(ValueKind::from_token("i8").unwrap().fixed_size(), Some(1));
        assert_eq!(ValueKind::Float64.fixed_size(), Some(8));
        assert_eq!(ValueKind::String.fixed_size(), None);
        assert_eq!(ValueKind::Bytes.fixed_size(), None);
    }

    #[test]
    fn test_is_integer() {
        assert!(ValueKind::from_token("i16be").unwrap().is_integer());
        assert!(!ValueKind::Float32.is_integer());
        assert!(!ValueKind::Bytes.is_integer());
    }
}
