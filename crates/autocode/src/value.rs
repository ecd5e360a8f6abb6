use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single field value on a record.
///
/// This is a closed union of everything a write request can carry. Only
/// text, integers and floats have a code representation; the remaining kinds
/// exist so a record can round-trip without loss and so the unsupported-kind
/// path of [`FieldValue::code_fragment`] is exhaustive.
///
/// Deserializes untagged from plain JSON: `null`, booleans, integers that fit
/// `i64`, larger unsigned integers, floats, strings, arrays and objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Object(BTreeMap<String, FieldValue>),
}

/// What a field value contributes to a code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodeFragment {
    /// Text to append, before upper-casing.
    Present(String),
    /// The value is `null` or an empty string.
    Blank,
    /// The value has no code representation; carries the kind name.
    Unsupported(&'static str),
}

impl FieldValue {
    /// A short name for the value's kind, used in diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }

    /// `true` for `null` and the empty string.
    ///
    /// A blank autocode field counts as "not supplied" and is eligible for
    /// generation.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Converts the value into the text a `field` segment appends.
    ///
    /// Floats are rendered with zero decimal places.
    ///
    /// ```
    /// use autocode::{CodeFragment, FieldValue};
    ///
    /// assert_eq!(FieldValue::from(42).code_fragment(), CodeFragment::Present("42".into()));
    /// assert_eq!(FieldValue::from(41.6).code_fragment(), CodeFragment::Present("42".into()));
    /// assert_eq!(FieldValue::from("").code_fragment(), CodeFragment::Blank);
    /// assert_eq!(FieldValue::Bool(true).code_fragment(), CodeFragment::Unsupported("bool"));
    /// ```
    pub fn code_fragment(&self) -> CodeFragment {
        match self {
            Self::Null => CodeFragment::Blank,
            Self::Text(text) if text.is_empty() => CodeFragment::Blank,
            Self::Text(text) => CodeFragment::Present(text.clone()),
            Self::Int(n) => CodeFragment::Present(n.to_string()),
            Self::UInt(n) => CodeFragment::Present(n.to_string()),
            Self::Float(n) => CodeFragment::Present(format!("{n:.0}")),
            Self::Bool(_) | Self::List(_) | Self::Object(_) => {
                CodeFragment::Unsupported(self.kind())
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interprets the value as a positive row id.
    ///
    /// Accepts positive integers, integral positive floats and strings made
    /// only of ASCII digits. Everything else, including zero, is `None`.
    pub fn as_row_id(&self) -> Option<u64> {
        let id = match self {
            Self::Int(n) => u64::try_from(*n).ok()?,
            Self::UInt(n) => *n,
            Self::Float(n) if n.is_finite() && n.fract() == 0.0 && *n >= 1.0 => {
                if *n > u64::MAX as f64 {
                    return None;
                }
                *n as u64
            }
            Self::Text(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
                text.parse().ok()?
            }
            _ => return None,
        };
        (id > 0).then_some(id)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => Self::Int(n),
            Err(_) => Self::UInt(value),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
