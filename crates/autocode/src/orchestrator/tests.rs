use super::*;
use crate::{
    AtomicCounterStore, FieldValue, FixedClock, Identifier, LockCounterStore, MemoryEntities,
    MemoryTableFields, RepositoryError, StoreError, TableField,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use tracing::{
    Event, Level, Metadata, Subscriber,
    field::{Field, Visit},
    span,
};

fn march() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap()
}

fn definition(value: serde_json::Value) -> TableField {
    serde_json::from_value(value).unwrap()
}

fn invoice_fields() -> MemoryTableFields {
    MemoryTableFields::from_fields([
        definition(json!({
            "table_code": "invoice", "code": "code", "field_type": "autocode", "status": "Normal",
            "options": {"patterns": [
                {"type": "string", "options": {"value": "INV-"}},
                {"type": "date", "options": {"format": "YYYYMM"}},
                {"type": "string", "options": {"value": "-"}},
                {"type": "integer", "options": {"cycle": "monthly", "digits": 4, "start": 1}}
            ]}
        })),
        definition(json!({
            "table_code": "invoice", "code": "ref", "field_type": "autocode", "status": "Normal",
            "options": {"patterns": [
                {"type": "field", "options": {"fieldCode": "dept"}},
                {"type": "integer", "options": {"digits": 3}}
            ]}
        })),
        definition(json!({
            "table_code": "invoice", "code": "memo", "field_type": "autocode", "status": "Normal"
        })),
        definition(json!({
            "table_code": "invoice", "code": "dept", "field_type": "text", "status": "Normal"
        })),
    ])
    .unwrap()
}

type Fixture<E> = Orchestrator<MemoryTableFields, E, Arc<AtomicCounterStore>, FixedClock>;

fn orchestrator<E: EntityRepository>(entities: E, store: Arc<AtomicCounterStore>) -> Fixture<E> {
    Orchestrator::new(
        invoice_fields(),
        entities,
        Dispatch::none(),
        Interpreter::new(store, FixedClock(march())),
    )
}

fn month_counter() -> Identifier {
    Identifier::new("invoice", "code", "2024-03").unwrap()
}

fn text(fields: &FieldMap, code: &str) -> Option<String> {
    fields.get(code).and_then(FieldValue::as_text).map(str::to_owned)
}

struct OfflineFields;

impl TableFieldRepository for OfflineFields {
    fn find(&self, _: &FieldQuery) -> core::result::Result<Vec<AutocodeField>, RepositoryError> {
        Err(RepositoryError::Unavailable("metadata offline".into()))
    }
}

struct OfflineEntities;

impl EntityRepository for OfflineEntities {
    fn find_one(&self, _: &str, _: u64) -> core::result::Result<Option<FieldMap>, RepositoryError> {
        Err(RepositoryError::Unavailable("entities offline".into()))
    }
}

/// Collects `(level, message)` for every event it sees.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl Recorder {
    fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().unwrap().clone()
    }
}

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl Subscriber for Recorder {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _: &span::Attributes<'_>) -> span::Id {
        span::Id::from_u64(1)
    }

    fn record(&self, _: &span::Id, _: &span::Record<'_>) {}

    fn record_follows_from(&self, _: &span::Id, _: &span::Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut message = Message(String::new());
        event.record(&mut message);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), message.0));
    }

    fn enter(&self, _: &span::Id) {}

    fn exit(&self, _: &span::Id) {}
}

#[test]
fn create_generates_blank_fields_in_order() {
    let store = Arc::new(AtomicCounterStore::new());
    let orchestrator = orchestrator(MemoryEntities::new(), Arc::clone(&store));

    let mut fields: FieldMap = [("dept", "ops")].into_iter().collect();
    let outcome = orchestrator.process("invoice", &mut fields).unwrap();

    assert_eq!(
        outcome,
        Outcome::Generated {
            fields: vec!["code".into(), "ref".into()]
        }
    );
    assert_eq!(text(&fields, "code").as_deref(), Some("INV-202403-0001"));
    assert_eq!(text(&fields, "ref").as_deref(), Some("OPS001"));
    // A field without patterns is never generated.
    assert!(!fields.contains_key("memo"));

    let mut second: FieldMap = [("dept", "ops")].into_iter().collect();
    orchestrator.process("invoice", &mut second).unwrap();
    assert_eq!(text(&second, "code").as_deref(), Some("INV-202403-0002"));
}

#[test]
fn caller_value_is_kept_without_allocating() {
    let store = Arc::new(AtomicCounterStore::new());
    let orchestrator = orchestrator(MemoryEntities::new(), Arc::clone(&store));

    let mut fields: FieldMap = [("code", "MANUAL-1"), ("ref", "R-9")].into_iter().collect();
    let outcome = orchestrator.process("invoice", &mut fields).unwrap();

    assert_eq!(outcome, Outcome::Generated { fields: vec![] });
    assert_eq!(text(&fields, "code").as_deref(), Some("MANUAL-1"));
    assert_eq!(store.get(&month_counter()).unwrap(), None);
}

#[test]
fn blank_caller_value_is_replaced() {
    let orchestrator = orchestrator(MemoryEntities::new(), Arc::new(AtomicCounterStore::new()));

    let mut fields: FieldMap = [("code", ""), ("dept", "x")].into_iter().collect();
    fields.insert("ref", FieldValue::Null);
    orchestrator.process("invoice", &mut fields).unwrap();

    assert_eq!(text(&fields, "code").as_deref(), Some("INV-202403-0001"));
    assert_eq!(text(&fields, "ref").as_deref(), Some("X001"));
}

#[test]
fn update_restores_persisted_codes_without_allocating() {
    let entities = MemoryEntities::new();
    entities
        .insert(
            "invoice",
            42,
            [("code", "INV-202401-0007"), ("dept", "ops")].into_iter().collect(),
        )
        .unwrap();
    let store = Arc::new(AtomicCounterStore::new());
    let orchestrator = orchestrator(entities, Arc::clone(&store));

    let mut fields: FieldMap = [
        ("operation", "Update"),
        ("entity_id", "42"),
        ("code", "FORGED-1"),
        ("ref", "CLIENT-REF"),
    ]
    .into_iter()
    .collect();
    let outcome = orchestrator.process("invoice", &mut fields).unwrap();

    assert_eq!(
        outcome,
        Outcome::Restored {
            fields: vec!["code".into()]
        }
    );
    assert_eq!(text(&fields, "code").as_deref(), Some("INV-202401-0007"));
    // The prior row has no `ref`, so the caller's value stays.
    assert_eq!(text(&fields, "ref").as_deref(), Some("CLIENT-REF"));
    assert_eq!(store.get(&month_counter()).unwrap(), None);
}

#[test]
fn batch_update_with_missing_row_restores_nothing() {
    let store = Arc::new(AtomicCounterStore::new());
    let orchestrator = orchestrator(MemoryEntities::new(), Arc::clone(&store));

    let mut fields = FieldMap::new();
    fields.insert("operation", "BatchUpdate");
    fields.insert("entity_id", 404);
    let outcome = orchestrator.process("invoice", &mut fields).unwrap();

    assert_eq!(outcome, Outcome::Restored { fields: vec![] });
    assert!(!fields.contains_key("code"));
    assert_eq!(store.get(&month_counter()).unwrap(), None);
}

#[test]
fn update_without_entity_id_never_generates() {
    let store = Arc::new(AtomicCounterStore::new());
    let orchestrator = orchestrator(OfflineEntities, Arc::clone(&store));

    for id in [FieldValue::Null, "".into(), "abc".into(), 0i64.into(), (-5i64).into()] {
        let mut fields = FieldMap::new();
        fields.insert("operation", "Update");
        fields.insert("entity_id", id);
        assert_eq!(
            orchestrator.process("invoice", &mut fields).unwrap(),
            Outcome::Restored { fields: vec![] }
        );
        assert!(!fields.contains_key("code"));
    }
    assert_eq!(store.get(&month_counter()).unwrap(), None);
}

#[test]
fn update_lookup_failure_is_absorbed() {
    let orchestrator = orchestrator(OfflineEntities, Arc::new(AtomicCounterStore::new()));

    let mut fields: FieldMap = [("operation", "Update"), ("entity_id", "3"), ("code", "KEEP")]
        .into_iter()
        .collect();
    assert_eq!(
        orchestrator.process("invoice", &mut fields).unwrap(),
        Outcome::Restored { fields: vec![] }
    );
    assert_eq!(text(&fields, "code").as_deref(), Some("KEEP"));
}

#[test]
fn retried_create_is_skipped() {
    let entities = MemoryEntities::new();
    entities
        .insert("invoice", 9, [("code", "INV-202403-0001")].into_iter().collect())
        .unwrap();
    let store = Arc::new(AtomicCounterStore::new());
    let orchestrator = orchestrator(entities, Arc::clone(&store));

    let mut fields = FieldMap::new();
    fields.insert("operation", "Create");
    fields.insert("entity_id", 9);
    assert_eq!(
        orchestrator.process("invoice", &mut fields).unwrap(),
        Outcome::AlreadyMaterialized
    );
    assert!(!fields.contains_key("code"));
    assert_eq!(store.get(&month_counter()).unwrap(), None);
}

#[test]
fn create_with_unknown_entity_id_generates() {
    let orchestrator = orchestrator(MemoryEntities::new(), Arc::new(AtomicCounterStore::new()));

    let mut fields: FieldMap = [("entity_id", "10"), ("dept", "hr")].into_iter().collect();
    orchestrator.process("invoice", &mut fields).unwrap();
    assert_eq!(text(&fields, "code").as_deref(), Some("INV-202403-0001"));

    // An entity lookup failure on the create path also falls through.
    let orchestrator = orchestrator_with(OfflineEntities);
    let mut fields: FieldMap = [("entity_id", "10"), ("dept", "hr")].into_iter().collect();
    assert!(matches!(
        orchestrator.process("invoice", &mut fields).unwrap(),
        Outcome::Generated { .. }
    ));
}

fn orchestrator_with<E: EntityRepository>(entities: E) -> Fixture<E> {
    orchestrator(entities, Arc::new(AtomicCounterStore::new()))
}

#[test]
fn metadata_failure_lets_write_through() {
    let store = Arc::new(LockCounterStore::new());
    let orchestrator = Orchestrator::new(
        OfflineFields,
        MemoryEntities::new(),
        Dispatch::none(),
        Interpreter::new(Arc::clone(&store), FixedClock(march())),
    );

    let mut fields: FieldMap = [("dept", "ops")].into_iter().collect();
    let before = fields.clone();
    assert_eq!(
        orchestrator.process("invoice", &mut fields).unwrap(),
        Outcome::MetadataUnavailable
    );
    assert_eq!(fields, before);
    assert_eq!(store.get(&month_counter()).unwrap(), None);
}

#[test]
fn table_without_autocode_fields() {
    let orchestrator = orchestrator_with(OfflineEntities);
    let mut fields = FieldMap::new();
    assert_eq!(
        orchestrator.process("customer", &mut fields).unwrap(),
        Outcome::NoAutocodeFields
    );
}

#[test]
fn render_failure_aborts_whole_pass() {
    let orchestrator = orchestrator_with(MemoryEntities::new());

    let mut fields = FieldMap::new();
    let err = orchestrator.process("invoice", &mut fields).unwrap_err();

    match &err {
        Error::Generation {
            table,
            field,
            source,
        } => {
            assert_eq!(table, "invoice");
            assert_eq!(field, "ref");
            assert!(matches!(**source, Error::MissingField { ref field } if field == "dept"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("invoice.ref"));
    assert!(message.contains("dept"));
}

#[test]
fn store_failure_aborts_whole_pass() {
    struct Offline;

    impl CounterStore for Offline {
        fn insert_if_absent(
            &self,
            _: crate::SequenceCounter,
        ) -> core::result::Result<bool, StoreError> {
            Err(StoreError::Unavailable {
                reason: "offline".into(),
            })
        }
        fn contains(&self, _: &Identifier) -> core::result::Result<bool, StoreError> {
            Err(StoreError::Unavailable {
                reason: "offline".into(),
            })
        }
        fn allocate_next(&self, _: &Identifier) -> core::result::Result<u64, StoreError> {
            Err(StoreError::Unavailable {
                reason: "offline".into(),
            })
        }
        fn get(
            &self,
            _: &Identifier,
        ) -> core::result::Result<Option<crate::SequenceCounter>, StoreError> {
            Ok(None)
        }
        fn snapshot(&self) -> core::result::Result<Vec<crate::SequenceCounter>, StoreError> {
            Ok(Vec::new())
        }
    }

    let orchestrator = Orchestrator::new(
        invoice_fields(),
        MemoryEntities::new(),
        Dispatch::none(),
        Interpreter::new(Offline, FixedClock(march())),
    );
    let mut fields: FieldMap = [("dept", "ops")].into_iter().collect();
    assert!(matches!(
        orchestrator.process("invoice", &mut fields),
        Err(Error::Generation { ref field, .. }) if field == "code"
    ));
}

#[test]
fn diagnostics_go_to_injected_logger() {
    let recorder = Recorder::default();
    let orchestrator = Orchestrator::new(
        OfflineFields,
        MemoryEntities::new(),
        Dispatch::new(recorder.clone()),
        Interpreter::new(AtomicCounterStore::new(), FixedClock(march())),
    );

    orchestrator.process("invoice", &mut FieldMap::new()).unwrap();

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Level::WARN);
    assert!(events[0].1.contains("failed to look up autocode fields"));
}

#[test]
fn generated_codes_are_logged() {
    let recorder = Recorder::default();
    let orchestrator = Orchestrator::new(
        invoice_fields(),
        MemoryEntities::new(),
        Dispatch::new(recorder.clone()),
        Interpreter::new(AtomicCounterStore::new(), FixedClock(march())),
    );

    let mut fields: FieldMap = [("dept", "ops")].into_iter().collect();
    orchestrator.process("invoice", &mut fields).unwrap();

    let generated = recorder
        .events()
        .into_iter()
        .filter(|(level, message)| *level == Level::INFO && message == "generated autocode")
        .count();
    assert_eq!(generated, 2);
}

#[test]
fn concurrent_creates_get_distinct_codes() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let orchestrator = orchestrator_with(MemoryEntities::new());
    let codes = Mutex::new(HashSet::new());

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..PER_THREAD {
                    let mut fields: FieldMap = [("dept", "ops")].into_iter().collect();
                    orchestrator.process("invoice", &mut fields).unwrap();
                    let code = text(&fields, "code").unwrap();
                    assert!(codes.lock().unwrap().insert(code));
                }
            });
        }
    });

    let codes = codes.into_inner().unwrap();
    assert_eq!(codes.len(), THREADS * PER_THREAD);
    assert!(codes.contains("INV-202403-0001"));
    assert!(codes.contains(&format!("INV-202403-{:04}", THREADS * PER_THREAD)));
}
