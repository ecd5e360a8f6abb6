use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between the table, field and cycle components.
pub const SEPARATOR: char = ':';

/// The key naming one sequence counter.
///
/// An identifier is `table:field:cycle_key`. For a non-resetting sequence the
/// cycle key is empty and the identifier ends with the separator.
///
/// Table and field codes may not contain [`SEPARATOR`]; cycle keys never do.
/// That keeps the mapping from `(table, field, window)` to identifier
/// injective.
///
/// # Example
///
/// ```
/// use autocode::Identifier;
///
/// let id = Identifier::new("invoice", "code", "2024-03").unwrap();
/// assert_eq!(id.as_str(), "invoice:code:2024-03");
///
/// let id = Identifier::new("asset", "tag", "").unwrap();
/// assert_eq!(id.as_str(), "asset:tag:");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Builds the identifier for a table, field and cycle key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if the table or field code is
    /// empty or contains the separator.
    pub fn new(table_code: &str, field_code: &str, cycle_key: &str) -> Result<Self> {
        check_component(table_code)?;
        check_component(field_code)?;
        Ok(Self(format!(
            "{table_code}{SEPARATOR}{field_code}{SEPARATOR}{cycle_key}"
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_component(component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(Error::InvalidIdentifier {
            component: component.to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }
    if component.contains(SEPARATOR) {
        return Err(Error::InvalidIdentifier {
            component: component.to_owned(),
            reason: format!("must not contain `{SEPARATOR}`"),
        });
    }
    Ok(())
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
