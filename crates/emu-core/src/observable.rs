//! Observability trait for inspecting component state.
//!
//! Every emulator component exposes its internal state for debugging and
//! for post-mortem inspection of a halted machine. Queries never affect
//! emulation state.

use std::collections::BTreeMap;
use std::fmt;

/// A dynamically-typed value for state queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 8-bit unsigned integer (registers, memory bytes).
    U8(u8),
    /// 16-bit unsigned integer (register pairs, addresses).
    U16(u16),
    /// 64-bit unsigned integer (cycle and frame counters).
    U64(u64),
    /// String value.
    String(String),
    /// Map of string keys to values, ordered by key.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Widen any integer variant to `u64`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "${v:02X}"),
            Value::U16(v) => write!(f, "${v:04X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A component whose state can be inspected.
pub trait Observable {
    /// Query a specific property by path.
    ///
    /// Paths are hierarchical, separated by dots:
    /// - `pc` - Program counter
    /// - `a` - Accumulator
    /// - `flags.z` - Zero flag
    ///
    /// Returns `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// List all available query paths.
    fn query_paths(&self) -> &'static [&'static str];
}

/// Parse an address written as `0x1234`, `$1234` or decimal.
#[must_use]
pub fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_hex_for_registers() {
        assert_eq!(Value::U8(0x0A).to_string(), "$0A");
        assert_eq!(Value::U16(0x0150).to_string(), "$0150");
        assert_eq!(Value::U64(70_224).to_string(), "70224");
    }

    #[test]
    fn map_display_is_key_ordered() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::Bool(true));
        map.insert("a".to_string(), Value::U8(1));
        assert_eq!(Value::Map(map).to_string(), "{a: $01, b: true}");
    }

    #[test]
    fn parse_address_forms() {
        assert_eq!(parse_address("0xFF40"), Some(0xFF40));
        assert_eq!(parse_address("$c000"), Some(0xC000));
        assert_eq!(parse_address("256"), Some(256));
        assert_eq!(parse_address("nope"), None);
    }
}
