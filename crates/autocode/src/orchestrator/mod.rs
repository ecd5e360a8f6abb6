//! Per-write autocode orchestration.
//!
//! For every write request the [`Orchestrator`] makes one three-way decision:
//!
//! - **restore**: the write edits an existing row (`Update` or
//!   `BatchUpdate`), so every autocode field is reset to the value already
//!   persisted on that row and nothing is generated;
//! - **skip**: the write carries the id of a row that already exists, so the
//!   request is a retry of a create that went through;
//! - **generate**: every autocode field the caller left blank is rendered
//!   from its template.
//!
//! Metadata and row lookups fail open: a failed lookup is logged and the
//! write proceeds. Rendering fails closed: the first render error aborts the
//! pass and must block the write.

use serde::Serialize;
use tracing::{Dispatch, debug, dispatcher, error, info, warn};

use crate::{
    error::{Error, Result},
    field::{AutocodeField, FieldQuery},
    record::FieldMap,
    render::Interpreter,
    repository::{EntityRepository, TableFieldRepository},
    store::CounterStore,
    time::TimeSource,
};

#[cfg(test)]
mod tests;

/// What [`Orchestrator::process`] did to a write request.
///
/// This is informational. The contract with the write path is the error
/// return: `Ok` means the record may be persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The table has no active autocode fields.
    NoAutocodeFields,
    /// The field definitions could not be read; the write is let through
    /// untouched.
    MetadataUnavailable,
    /// An update: these fields were reset to their persisted values.
    Restored { fields: Vec<String> },
    /// A create whose row already exists; nothing was generated.
    AlreadyMaterialized,
    /// A create: these fields received freshly rendered codes.
    Generated { fields: Vec<String> },
}

/// Decides, per write, whether autocode fields are generated, restored or
/// left alone, and writes the result back into the request's [`FieldMap`].
///
/// All collaborators are passed in. The orchestrator keeps no state between
/// calls, so one instance can serve concurrent writes; the only shared
/// mutable resource is the interpreter's counter store.
///
/// # Example
///
/// ```
/// use autocode::{
///     AtomicCounterStore, FieldMap, MemoryEntities, MemoryTableFields, Orchestrator,
///     Outcome, SystemClock, TableField, Interpreter,
/// };
///
/// let field: TableField = serde_json::from_str(r#"{
///     "table_code": "asset", "code": "tag", "field_type": "autocode",
///     "options": {"patterns": [
///         {"type": "string", "options": {"value": "A-"}},
///         {"type": "integer", "options": {"digits": 3}}
///     ]}
/// }"#).unwrap();
///
/// let orchestrator = Orchestrator::new(
///     MemoryTableFields::from_fields([field]).unwrap(),
///     MemoryEntities::new(),
///     tracing::Dispatch::none(),
///     Interpreter::new(AtomicCounterStore::new(), SystemClock),
/// );
///
/// let mut fields = FieldMap::new();
/// let outcome = orchestrator.process("asset", &mut fields).unwrap();
/// assert_eq!(outcome, Outcome::Generated { fields: vec!["tag".into()] });
/// assert_eq!(fields.get("tag").and_then(|v| v.as_text()), Some("A-001"));
/// ```
pub struct Orchestrator<F, E, S, T> {
    fields: F,
    entities: E,
    logger: Dispatch,
    interpreter: Interpreter<S, T>,
}

impl<F, E, S, T> Orchestrator<F, E, S, T>
where
    F: TableFieldRepository,
    E: EntityRepository,
    S: CounterStore,
    T: TimeSource,
{
    pub fn new(fields: F, entities: E, logger: Dispatch, interpreter: Interpreter<S, T>) -> Self {
        Self {
            fields,
            entities,
            logger,
            interpreter,
        }
    }

    pub fn interpreter(&self) -> &Interpreter<S, T> {
        &self.interpreter
    }

    /// Runs the autocode pass for one write to `table_code`, mutating
    /// `fields` in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] naming the table and field if any
    /// template fails to render. Fields rendered before the failure may
    /// already have been written into `fields`; the caller must discard the
    /// whole request.
    pub fn process(&self, table_code: &str, fields: &mut FieldMap) -> Result<Outcome> {
        dispatcher::with_default(&self.logger, || {
            let span = tracing::info_span!("autocode", table = table_code);
            let _enter = span.enter();
            self.run(table_code, fields)
        })
    }

    fn run(&self, table_code: &str, fields: &mut FieldMap) -> Result<Outcome> {
        let definitions = match self.fields.find(&FieldQuery::autocode(table_code)) {
            Ok(definitions) => definitions,
            Err(err) => {
                warn!(error = %err, "failed to look up autocode fields; skipping autocode");
                return Ok(Outcome::MetadataUnavailable);
            }
        };
        if definitions.is_empty() {
            return Ok(Outcome::NoAutocodeFields);
        }

        let entity_id = fields.entity_id();

        if let Some(operation) = fields.operation().filter(|op| op.is_update()) {
            info!(%operation, "update detected; restoring autocode fields");
            let restored = match entity_id {
                Some(id) => self.restore(table_code, id, &definitions, fields),
                None => {
                    debug!("update carries no usable entity_id; nothing to restore");
                    Vec::new()
                }
            };
            return Ok(Outcome::Restored { fields: restored });
        }

        if let Some(id) = entity_id {
            match self.entities.find_one(table_code, id) {
                Ok(Some(_)) => {
                    info!(entity_id = id, "row already exists; skipping autocode generation");
                    return Ok(Outcome::AlreadyMaterialized);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(entity_id = id, error = %err, "failed to check for existing row");
                }
            }
        }

        self.generate(table_code, &definitions, fields)
    }

    fn restore(
        &self,
        table_code: &str,
        id: u64,
        definitions: &[AutocodeField],
        fields: &mut FieldMap,
    ) -> Vec<String> {
        let prior = match self.entities.find_one(table_code, id) {
            Ok(Some(prior)) => prior,
            Ok(None) => {
                warn!(entity_id = id, "prior row not found; autocode fields not restored");
                return Vec::new();
            }
            Err(err) => {
                warn!(entity_id = id, error = %err, "failed to read prior row; autocode fields not restored");
                return Vec::new();
            }
        };

        let mut restored = Vec::new();
        for definition in definitions {
            if let Some(value) = prior.get(&definition.code) {
                info!(code = %definition.code, value = ?value, "restored autocode field");
                fields.insert(definition.code.clone(), value.clone());
                restored.push(definition.code.clone());
            }
        }
        restored
    }

    fn generate(
        &self,
        table_code: &str,
        definitions: &[AutocodeField],
        fields: &mut FieldMap,
    ) -> Result<Outcome> {
        let mut generated = Vec::new();
        for definition in definitions {
            if fields.has_value(&definition.code) {
                debug!(code = %definition.code, "field already has a value; skipping");
                continue;
            }
            if definition.patterns.is_empty() {
                continue;
            }

            let code = self
                .interpreter
                .render(table_code, &definition.code, &definition.patterns, fields)
                .map_err(|err| {
                    error!(field = %definition.code, error = %err, "failed to generate autocode");
                    Error::generation(table_code, &definition.code, err)
                })?;
            info!(field = %definition.code, code = %code, "generated autocode");
            fields.insert(definition.code.clone(), code);
            generated.push(definition.code.clone());
        }
        Ok(Outcome::Generated { fields: generated })
    }
}
