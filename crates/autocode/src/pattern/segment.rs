use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    cycle::Cycle,
    error::{Error, Result},
    pattern::DateFormat,
};

/// Default first value of a fresh sequence.
pub const DEFAULT_START: u64 = 1;

/// Default zero-padded width of a sequence value.
pub const DEFAULT_DIGITS: usize = 5;

/// Largest accepted `digits` option.
///
/// Wider templates are rejected when they are loaded rather than rendered.
/// A `u64` sequence value never needs more than 20 digits, so anything past
/// this only pads with zeros; the cap keeps a mistyped width from producing
/// codes thousands of characters long.
pub const MAX_DIGITS: usize = 32;

/// The wire form of one template segment: a type tag and its options.
///
/// ```
/// use autocode::RawPattern;
///
/// let raw: RawPattern = serde_json::from_str(
///     r#"{"type": "integer", "options": {"cycle": "monthly", "digits": 4}}"#,
/// ).unwrap();
/// assert_eq!(raw.kind, "integer");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPattern {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StringOptions {
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DateOptions {
    pub format: DateFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldOptions {
    pub field_code: String,
}

/// Options of an `integer` segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntegerOptions {
    /// When the sequence restarts.
    pub cycle: Cycle,
    /// First value of every sequence; at least 1.
    pub start: u64,
    /// Zero-padded width; 0 disables padding.
    ///
    /// Widths above [`MAX_DIGITS`] are refused at load time, a deliberate
    /// restriction: templates defined elsewhere without a width limit must
    /// be narrowed before they can be loaded here.
    pub digits: usize,
}

impl Default for IntegerOptions {
    fn default() -> Self {
        Self {
            cycle: Cycle::None,
            start: DEFAULT_START,
            digits: DEFAULT_DIGITS,
        }
    }
}

/// One validated template segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// `string`: literal text.
    Literal(StringOptions),
    /// `date`: the render instant in a token format.
    Date(DateOptions),
    /// `field`: the upper-cased value of a sibling field.
    Field(FieldOptions),
    /// `integer`: the next value of a cycle-scoped counter, zero-padded.
    Sequence(IntegerOptions),
}

impl Segment {
    /// Validates a wire segment. `index` is its position in the template and
    /// is only used in error messages.
    ///
    /// Unknown option keys are ignored. Known keys with the wrong JSON type
    /// are errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an unknown `type`, a missing
    /// required option, or an option of the wrong type or range.
    pub fn parse(index: usize, raw: &RawPattern) -> Result<Self> {
        let options = &raw.options;
        match raw.kind.as_str() {
            "string" => Ok(Self::Literal(StringOptions {
                value: string_option(index, options, "value")?.unwrap_or_default(),
            })),
            "date" => {
                let format = string_option(index, options, "format")?
                    .ok_or_else(|| Error::invalid_pattern(index, "`date` requires `format`"))?;
                Ok(Self::Date(DateOptions {
                    format: DateFormat::parse(&format),
                }))
            }
            "field" => {
                let field_code = string_option(index, options, "fieldCode")?
                    .filter(|code| !code.is_empty())
                    .ok_or_else(|| Error::invalid_pattern(index, "`field` requires `fieldCode`"))?;
                Ok(Self::Field(FieldOptions { field_code }))
            }
            "integer" => {
                let cycle = string_option(index, options, "cycle")?
                    .map_or(Cycle::None, |policy| Cycle::from_policy(&policy));
                let start = unsigned_option(index, options, "start")?.unwrap_or(DEFAULT_START);
                if start == 0 {
                    return Err(Error::invalid_pattern(index, "`start` must be at least 1"));
                }
                let digits = match unsigned_option(index, options, "digits")? {
                    None => DEFAULT_DIGITS,
                    Some(digits) => usize::try_from(digits)
                        .ok()
                        .filter(|digits| *digits <= MAX_DIGITS)
                        .ok_or_else(|| {
                            Error::invalid_pattern(
                                index,
                                format!("`digits` must be at most {MAX_DIGITS}"),
                            )
                        })?,
                };
                Ok(Self::Sequence(IntegerOptions {
                    cycle,
                    start,
                    digits,
                }))
            }
            other => Err(Error::invalid_pattern(
                index,
                format!("unknown segment type `{other}`"),
            )),
        }
    }

    /// Whether rendering this segment touches the counter store.
    pub fn allocates(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }
}

impl TryFrom<&RawPattern> for Segment {
    type Error = Error;

    fn try_from(raw: &RawPattern) -> Result<Self> {
        Self::parse(0, raw)
    }
}

/// Validates a whole template, preserving segment order.
///
/// # Errors
///
/// Returns the error of the first invalid segment.
///
/// # Example
///
/// ```
/// use autocode::{compile, RawPattern, Segment};
///
/// let raw: Vec<RawPattern> = serde_json::from_str(r#"[
///     {"type": "string", "options": {"value": "INV-"}},
///     {"type": "date", "options": {"format": "YYYYMM"}},
///     {"type": "integer", "options": {"cycle": "monthly", "digits": 4}}
/// ]"#).unwrap();
///
/// let segments = compile(&raw).unwrap();
/// assert_eq!(segments.len(), 3);
/// assert!(segments[2].allocates());
/// ```
pub fn compile(raw: &[RawPattern]) -> Result<Vec<Segment>> {
    raw.iter()
        .enumerate()
        .map(|(index, pattern)| Segment::parse(index, pattern))
        .collect()
}

fn string_option(index: usize, options: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(Error::invalid_pattern(
            index,
            format!("`{key}` must be a string, found {}", json_kind(other)),
        )),
    }
}

// JSON producers often emit integral options as floats (`4.0`), so accept
// those as long as they carry no fraction.
fn unsigned_option(index: usize, options: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    let value = match options.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let parsed = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64)
                .map(|n| n as u64)
        }),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| {
        Error::invalid_pattern(
            index,
            format!(
                "`{key}` must be a non-negative integer, found {}",
                json_kind(value)
            ),
        )
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
