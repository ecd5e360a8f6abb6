//! Read access to table-field metadata and existing rows.
//!
//! The orchestrator needs two lookups it does not own: the autocode fields
//! defined for a table, and the current state of a row addressed by id.
//! Both are traits so the engine can sit on top of any persistence layer;
//! in-memory implementations are provided for embedding and tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{
    error::Result,
    field::{AutocodeField, FieldQuery, FieldType, TableField},
    record::FieldMap,
    store::sync::RwLock,
};

/// Errors a repository lookup can report.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RepositoryError {
    /// The backing store could not be reached.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// The operation failed because a repository lock was poisoned.
    #[cfg(not(feature = "parking-lot"))]
    #[error("repository lock poisoned")]
    LockPoisoned,

    /// Any other backend failure.
    #[error("repository failure: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(not(feature = "parking-lot"))]
impl<T> From<std::sync::PoisonError<T>> for RepositoryError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

/// Looks up autocode field definitions.
pub trait TableFieldRepository: Send + Sync {
    /// Returns the fields matching `query`, in definition order.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read. The orchestrator
    /// treats this as "no autocode fields" and lets the write through.
    fn find(&self, query: &FieldQuery) -> Result<Vec<AutocodeField>, RepositoryError>;
}

/// Looks up existing rows by id.
pub trait EntityRepository: Send + Sync {
    /// Returns the stored fields of row `id` in `table_code`, or `None` if no
    /// such row exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be read.
    fn find_one(&self, table_code: &str, id: u64) -> Result<Option<FieldMap>, RepositoryError>;
}

impl<R: TableFieldRepository + ?Sized> TableFieldRepository for Arc<R> {
    fn find(&self, query: &FieldQuery) -> Result<Vec<AutocodeField>, RepositoryError> {
        (**self).find(query)
    }
}

impl<R: TableFieldRepository + ?Sized> TableFieldRepository for &R {
    fn find(&self, query: &FieldQuery) -> Result<Vec<AutocodeField>, RepositoryError> {
        (**self).find(query)
    }
}

impl<R: EntityRepository + ?Sized> EntityRepository for Arc<R> {
    fn find_one(&self, table_code: &str, id: u64) -> Result<Option<FieldMap>, RepositoryError> {
        (**self).find_one(table_code, id)
    }
}

impl<R: EntityRepository + ?Sized> EntityRepository for &R {
    fn find_one(&self, table_code: &str, id: u64) -> Result<Option<FieldMap>, RepositoryError> {
        (**self).find_one(table_code, id)
    }
}

#[derive(Clone, Debug)]
struct Definition {
    field: TableField,
    autocode: Option<AutocodeField>,
}

/// Table-field definitions held in memory.
///
/// Templates of autocode fields are validated when a definition is inserted,
/// so a malformed template is reported once, at load time, and never reaches
/// the write path.
#[derive(Default)]
pub struct MemoryTableFields {
    definitions: RwLock<Vec<Definition>>,
}

impl MemoryTableFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository from `fields`, stopping at the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldDefinition`] for the first autocode field
    /// whose template does not validate.
    ///
    /// [`Error::InvalidFieldDefinition`]: crate::Error::InvalidFieldDefinition
    pub fn from_fields(fields: impl IntoIterator<Item = TableField>) -> Result<Self> {
        let definitions = fields
            .into_iter()
            .map(Definition::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            definitions: RwLock::new(definitions),
        })
    }

    /// Adds a definition, replacing any previous one for the same table and
    /// code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldDefinition`] if `field` is an autocode
    /// field with an invalid template; the repository is left unchanged.
    ///
    /// [`Error::InvalidFieldDefinition`]: crate::Error::InvalidFieldDefinition
    pub fn insert(&self, field: TableField) -> Result<()> {
        let definition = Definition::new(field)?;
        let mut definitions = {
            #[cfg(feature = "parking-lot")]
            {
                self.definitions.write()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.definitions.write().map_err(RepositoryError::from)?
            }
        };
        match definitions.iter_mut().find(|existing| {
            existing.field.table_code == definition.field.table_code
                && existing.field.code == definition.field.code
        }) {
            Some(existing) => *existing = definition,
            None => definitions.push(definition),
        }
        Ok(())
    }
}

impl Definition {
    fn new(field: TableField) -> Result<Self> {
        let autocode = match field.field_type {
            FieldType::Autocode => Some(AutocodeField::try_from(&field)?),
            FieldType::Other => None,
        };
        Ok(Self { field, autocode })
    }
}

impl TableFieldRepository for MemoryTableFields {
    fn find(&self, query: &FieldQuery) -> Result<Vec<AutocodeField>, RepositoryError> {
        let definitions = {
            #[cfg(feature = "parking-lot")]
            {
                self.definitions.read()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.definitions.read()?
            }
        };
        Ok(definitions
            .iter()
            .filter(|definition| query.matches(&definition.field))
            .filter_map(|definition| definition.autocode.clone())
            .collect())
    }
}

/// Rows held in memory, keyed by table and id.
#[derive(Default)]
pub struct MemoryEntities {
    tables: RwLock<HashMap<String, BTreeMap<u64, FieldMap>>>,
}

impl MemoryEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `fields` as row `id` of `table_code`, returning the previous
    /// row if there was one.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository lock is poisoned.
    pub fn insert(
        &self,
        table_code: impl Into<String>,
        id: u64,
        fields: FieldMap,
    ) -> Result<Option<FieldMap>, RepositoryError> {
        let mut tables = {
            #[cfg(feature = "parking-lot")]
            {
                self.tables.write()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.tables.write()?
            }
        };
        Ok(tables.entry(table_code.into()).or_default().insert(id, fields))
    }
}

impl EntityRepository for MemoryEntities {
    fn find_one(&self, table_code: &str, id: u64) -> Result<Option<FieldMap>, RepositoryError> {
        let tables = {
            #[cfg(feature = "parking-lot")]
            {
                self.tables.read()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.tables.read()?
            }
        };
        Ok(tables
            .get(table_code)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }
}
