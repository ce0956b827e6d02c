//! Serde mirror of the register-map YAML document.
//!
//! Every optional key uses `Option` or an empty default so that "unset" stays
//! distinguishable from "explicitly zero" and can be omitted again on dump.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A block document; the top level of a register-map file is one of these.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct BlockDoc {
    /// Block name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Registers in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registers: Vec<RegisterDoc>,
    /// Nested blocks in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockDoc>,
}

/// A register entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegisterDoc {
    /// Address within its bar.
    pub address: Number,
    /// Register name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Region to read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar: Option<u8>,
    /// Access width in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u8>,
    /// Expected raw value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good: Option<Number>,
    /// Raw value recorded by an earlier probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Number>,
    /// Why the recorded probe could not read this register. Ignored when
    /// `value` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
    /// Fields in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDoc>,
}

/// A field entry. Exactly one of `bits` and `width` must be present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct FieldDoc {
    /// Field name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Source bit indices, in result order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<Vec<u8>>,
    /// Width of a low-bits field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u8>,
    /// Expected field value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good: Option<Number>,
}

/// An unsigned 64-bit number written as a YAML integer or as a string in
/// `0x` hex, `0b` binary, `0o` octal or decimal, with optional `_` separators.
///
/// Always serialized as a `0x` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Number(pub u64);

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Parses the textual number forms accepted by [`Number`].
///
/// # Errors
///
/// Returns a message naming the offending text when it is not a number.
pub fn parse_number(text: &str) -> Result<u64, String> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() {
        return Err("expected a number".to_string());
    }

    let (digits, radix, kind) = if let Some(hex) = strip_radix_prefix(&cleaned, 'x') {
        (hex, 16, "hex")
    } else if let Some(bin) = strip_radix_prefix(&cleaned, 'b') {
        (bin, 2, "binary")
    } else if let Some(oct) = strip_radix_prefix(&cleaned, 'o') {
        (oct, 8, "octal")
    } else {
        (cleaned.as_str(), 10, "decimal")
    };

    u64::from_str_radix(digits, radix).map_err(|_| format!("invalid {kind} number '{text}'"))
}

fn strip_radix_prefix(text: &str, marker: char) -> Option<&str> {
    let rest = text.strip_prefix('0')?;
    rest.strip_prefix(marker)
        .or_else(|| rest.strip_prefix(marker.to_ascii_uppercase()))
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:X}", self.0))
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }
}

struct NumberVisitor;

impl Visitor<'_> for NumberVisitor {
    type Value = Number;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or a numeric string such as \"0x1000\"")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Number, E> {
        Ok(Number(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Number, E> {
        u64::try_from(value)
            .map(Number)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Number, E> {
        parse_number(value).map(Number).map_err(E::custom)
    }
}
