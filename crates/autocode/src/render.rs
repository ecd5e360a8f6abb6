use core::fmt::Write;

#[cfg(feature = "instrument")]
use tracing::instrument;

use crate::{
    error::{Error, Result},
    identifier::Identifier,
    pattern::{FieldOptions, IntegerOptions, Segment},
    record::FieldMap,
    store::CounterStore,
    time::TimeSource,
    value::CodeFragment,
};

/// Renders templates into codes.
///
/// The interpreter holds no mutable state of its own: every call samples the
/// time source once and allocates from the counter store, so one interpreter
/// can serve any number of concurrent writes.
///
/// # Example
///
/// ```
/// use autocode::{compile, AtomicCounterStore, FieldMap, FixedClock, Interpreter, RawPattern};
/// use chrono::NaiveDate;
///
/// let march = NaiveDate::from_ymd_opt(2024, 3, 15)
///     .and_then(|d| d.and_hms_opt(9, 30, 0))
///     .unwrap();
/// let interpreter = Interpreter::new(AtomicCounterStore::new(), FixedClock(march));
///
/// let raw: Vec<RawPattern> = serde_json::from_str(r#"[
///     {"type": "string", "options": {"value": "INV-"}},
///     {"type": "date", "options": {"format": "YYYYMM"}},
///     {"type": "string", "options": {"value": "-"}},
///     {"type": "integer", "options": {"cycle": "monthly", "digits": 4, "start": 1}}
/// ]"#).unwrap();
/// let segments = compile(&raw).unwrap();
///
/// let fields = FieldMap::new();
/// assert_eq!(interpreter.render("invoice", "code", &segments, &fields).unwrap(), "INV-202403-0001");
/// assert_eq!(interpreter.render("invoice", "code", &segments, &fields).unwrap(), "INV-202403-0002");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Interpreter<S, T> {
    store: S,
    time: T,
}

impl<S, T> Interpreter<S, T>
where
    S: CounterStore,
    T: TimeSource,
{
    pub fn new(store: S, time: T) -> Self {
        Self { store, time }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    /// Renders `segments` for `table_code.field_code` against `fields`.
    ///
    /// Segments are evaluated in order and concatenated. The result is
    /// all-or-nothing: on error no partial code is returned, although values
    /// already allocated by earlier `integer` segments stay consumed.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingField`] if a `field` segment's source is absent,
    ///   `null` or empty
    /// - [`Error::UnsupportedFieldKind`] if that source is not text or a number
    /// - [`Error::InvalidIdentifier`] if a counter identifier cannot be built
    /// - [`Error::Store`] if the counter store fails
    #[cfg_attr(
        feature = "instrument",
        instrument(level = "debug", skip(self, segments, fields), err)
    )]
    pub fn render(
        &self,
        table_code: &str,
        field_code: &str,
        segments: &[Segment],
        fields: &FieldMap,
    ) -> Result<String> {
        let now = self.time.now();
        let mut code = String::new();

        for segment in segments {
            match segment {
                Segment::Literal(options) => code.push_str(&options.value),
                Segment::Date(options) => options.format.render_into(now, &mut code),
                Segment::Field(options) => code.push_str(&field_text(options, fields)?),
                Segment::Sequence(options) => {
                    let value = self.next_value(table_code, field_code, options, now)?;
                    // Wider values are kept whole rather than truncated.
                    let _ = write!(code, "{value:0width$}", width = options.digits);
                }
            }
        }

        Ok(code)
    }

    fn next_value(
        &self,
        table_code: &str,
        field_code: &str,
        options: &IntegerOptions,
        now: chrono::NaiveDateTime,
    ) -> Result<u64> {
        let cycle_key = options.cycle.resolve(now);
        let identifier = Identifier::new(table_code, field_code, &cycle_key)?;
        self.store.ensure_exists(
            &identifier,
            options.start,
            &format!("autocode: {table_code}.{field_code}"),
        )?;
        Ok(self.store.allocate_next(&identifier)?)
    }
}

fn field_text(options: &FieldOptions, fields: &FieldMap) -> Result<String> {
    let fragment = fields
        .get(&options.field_code)
        .map_or(CodeFragment::Blank, |value| value.code_fragment());
    match fragment {
        CodeFragment::Present(text) => Ok(text.to_uppercase()),
        CodeFragment::Blank => Err(Error::MissingField {
            field: options.field_code.clone(),
        }),
        CodeFragment::Unsupported(kind) => Err(Error::UnsupportedFieldKind {
            field: options.field_code.clone(),
            kind,
        }),
    }
}
