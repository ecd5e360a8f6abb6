use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    pattern::{RawPattern, Segment, compile},
};

/// The type of a table field. Only autocode fields matter to this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Autocode,
    #[serde(other)]
    Other,
}

/// Lifecycle status of a table field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldStatus {
    #[default]
    #[serde(rename = "Normal", alias = "active", alias = "Active")]
    Active,
    #[serde(other)]
    Inactive,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableFieldOptions {
    #[serde(default)]
    pub patterns: Vec<RawPattern>,
}

/// A table-field definition as administered outside the engine.
///
/// ```
/// use autocode::{FieldStatus, FieldType, TableField};
///
/// let field: TableField = serde_json::from_str(r#"{
///     "table_code": "invoice",
///     "code": "code",
///     "field_type": "autocode",
///     "status": "Normal",
///     "options": {"patterns": [{"type": "string", "options": {"value": "INV-"}}]}
/// }"#).unwrap();
///
/// assert_eq!(field.field_type, FieldType::Autocode);
/// assert_eq!(field.status, FieldStatus::Active);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableField {
    pub table_code: String,
    pub code: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub status: FieldStatus,
    #[serde(default)]
    pub options: Option<TableFieldOptions>,
}

/// Selects table fields by table, type and status.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldQuery {
    pub table_code: String,
    pub field_type: FieldType,
    pub status: FieldStatus,
}

impl FieldQuery {
    /// Active autocode fields of `table_code`.
    pub fn autocode(table_code: impl Into<String>) -> Self {
        Self {
            table_code: table_code.into(),
            field_type: FieldType::Autocode,
            status: FieldStatus::Active,
        }
    }

    pub fn matches(&self, field: &TableField) -> bool {
        field.table_code == self.table_code
            && field.field_type == self.field_type
            && field.status == self.status
    }
}

/// An autocode field with its validated template.
///
/// An empty template is allowed; such a field is never generated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AutocodeField {
    pub code: String,
    pub patterns: Vec<Segment>,
}

impl AutocodeField {
    pub fn new(code: impl Into<String>, patterns: Vec<Segment>) -> Self {
        Self {
            code: code.into(),
            patterns,
        }
    }
}

impl TryFrom<&TableField> for AutocodeField {
    type Error = Error;

    /// Validates the field's template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldDefinition`] naming the field if any
    /// segment is invalid.
    fn try_from(field: &TableField) -> Result<Self> {
        let raw = field
            .options
            .as_ref()
            .map(|options| options.patterns.as_slice())
            .unwrap_or_default();
        let patterns = compile(raw).map_err(|source| Error::InvalidFieldDefinition {
            field: format!("{}.{}", field.table_code, field.code),
            source: Box::new(source),
        })?;
        Ok(Self::new(field.code.clone(), patterns))
    }
}
