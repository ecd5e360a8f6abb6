use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use anyhow::{Context, anyhow};
use autocode::{
    AtomicCounterStore, CounterStore, FieldMap, Interpreter, LockCounterStore, MemoryEntities,
    MemoryTableFields, Orchestrator, Outcome, SequenceCounter, TableField, TimeSource,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{Dispatch, info, warn};

use crate::cli::config::StoreKind;

/// One write request from the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub table: String,
    #[serde(default)]
    pub fields: FieldMap,
}

/// One line of output, in input order.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok {
        index: usize,
        table: String,
        outcome: Outcome,
        fields: FieldMap,
    },
    Error {
        index: usize,
        table: String,
        error: String,
    },
}

impl Response {
    pub fn index(&self) -> usize {
        match self {
            Self::Ok { index, .. } | Self::Error { index, .. } => *index,
        }
    }
}

type Engine<T> = Orchestrator<MemoryTableFields, Arc<MemoryEntities>, Arc<dyn CounterStore>, T>;

/// Runs write requests through one shared orchestrator.
///
/// Successful writes are persisted into the in-memory entity repository when
/// they carry an `entity_id`, so a later update in the same batch restores
/// the codes an earlier create generated.
pub struct Batch<T> {
    engine: Engine<T>,
    entities: Arc<MemoryEntities>,
}

impl<T> Batch<T>
where
    T: TimeSource + Sync,
{
    /// Builds a batch whose counter store resumes from `counters`.
    ///
    /// # Errors
    ///
    /// Returns an error if a counter is rejected by the store.
    pub fn new(
        fields: MemoryTableFields,
        entities: MemoryEntities,
        counters: Vec<SequenceCounter>,
        store: StoreKind,
        logger: Dispatch,
        clock: T,
    ) -> anyhow::Result<Self> {
        let store: Arc<dyn CounterStore> = match store {
            StoreKind::Atomic => Arc::new(AtomicCounterStore::from_counters(counters)?),
            StoreKind::Lock => Arc::new(LockCounterStore::from_counters(counters)?),
        };
        let entities = Arc::new(entities);
        let engine = Orchestrator::new(
            fields,
            Arc::clone(&entities),
            logger,
            Interpreter::new(store, clock),
        );
        Ok(Self { engine, entities })
    }

    /// Returns the current state of every counter, for persisting.
    pub fn counters(&self) -> anyhow::Result<Vec<SequenceCounter>> {
        Ok(self.engine.interpreter().store().snapshot()?)
    }

    pub fn process(&self, index: usize, request: Request) -> Response {
        let Request { table, mut fields } = request;
        match self.engine.process(&table, &mut fields) {
            Ok(outcome) => {
                if outcome != Outcome::AlreadyMaterialized {
                    self.persist(&table, &fields);
                }
                Response::Ok {
                    index,
                    table,
                    outcome,
                    fields,
                }
            }
            Err(err) => Response::Error {
                index,
                table,
                error: err.to_string(),
            },
        }
    }

    /// Processes `requests` on `workers` scoped threads and returns the
    /// responses in input order.
    ///
    /// Requests carrying the same `entity_id` go to the same worker and run
    /// in input order there, so an update always sees the row an earlier
    /// create in the batch persisted. Requests without an id are spread by
    /// position.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread panics.
    pub fn run(&self, requests: Vec<Request>, workers: usize) -> anyhow::Result<Vec<Response>> {
        let workers = workers.max(1);
        let total = requests.len();
        let mut lanes: Vec<Vec<(usize, Request)>> = (0..workers).map(|_| Vec::new()).collect();
        for (index, request) in requests.into_iter().enumerate() {
            lanes[lane(index, &request, workers)].push((index, request));
        }

        std::thread::scope(|s| {
            let handles: Vec<_> = lanes
                .into_iter()
                .filter(|lane| !lane.is_empty())
                .map(|lane| {
                    s.spawn(move || {
                        lane.into_iter()
                            .map(|(index, request)| self.process(index, request))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut responses = Vec::with_capacity(total);
            for handle in handles {
                let part = handle.join().map_err(|_| anyhow!("worker thread panicked"))?;
                responses.extend(part);
            }
            responses.sort_unstable_by_key(Response::index);
            Ok(responses)
        })
    }

    fn persist(&self, table: &str, fields: &FieldMap) {
        let Some(id) = fields.entity_id() else {
            return;
        };
        if let Err(err) = self.entities.insert(table, id, fields.clone()) {
            warn!(table, entity_id = id, error = %err, "failed to persist row");
        }
    }
}

fn lane(index: usize, request: &Request, workers: usize) -> usize {
    let key = request.fields.entity_id().unwrap_or(index as u64);
    (key % workers as u64) as usize
}

pub fn load_fields(path: &Path) -> anyhow::Result<MemoryTableFields> {
    fields_from_json(&read(path)?).with_context(|| format!("invalid schema {}", path.display()))
}

pub fn load_entities(path: Option<&Path>) -> anyhow::Result<MemoryEntities> {
    match path {
        Some(path) => entities_from_json(&read(path)?)
            .with_context(|| format!("invalid entities {}", path.display())),
        None => Ok(MemoryEntities::new()),
    }
}

/// Reads persisted counters from `path`.
///
/// A missing file is a first run and yields no counters.
pub fn load_counters(path: Option<&Path>) -> anyhow::Result<Vec<SequenceCounter>> {
    match path {
        Some(path) if path.exists() => {
            parse(&read(path)?).with_context(|| format!("invalid counters {}", path.display()))
        }
        Some(path) => {
            info!(path = %path.display(), "no counters file yet; starting fresh");
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

/// Writes `counters` to `path`, replacing it only once the new contents are
/// fully written.
pub fn save_counters(path: &Path, counters: &[SequenceCounter]) -> anyhow::Result<()> {
    let staging = path.with_extension("tmp");
    let text = serde_json::to_string_pretty(counters).context("failed to encode counters")?;
    fs::write(&staging, text)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

pub fn load_requests(path: &Path) -> anyhow::Result<Vec<Request>> {
    parse(&read(path)?).with_context(|| format!("invalid input {}", path.display()))
}

fn fields_from_json(text: &str) -> anyhow::Result<MemoryTableFields> {
    let fields: Vec<TableField> = parse(text)?;
    Ok(MemoryTableFields::from_fields(fields)?)
}

fn entities_from_json(text: &str) -> anyhow::Result<MemoryEntities> {
    let tables: BTreeMap<String, BTreeMap<u64, FieldMap>> = parse(text)?;
    let entities = MemoryEntities::new();
    for (table, rows) in tables {
        for (id, row) in rows {
            entities.insert(table.clone(), id, row)?;
        }
    }
    Ok(entities)
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocode::FixedClock;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    const SCHEMA: &str = r#"[
        {"table_code": "invoice", "code": "code", "field_type": "autocode", "status": "Normal",
         "options": {"patterns": [
            {"type": "string", "options": {"value": "INV-"}},
            {"type": "date", "options": {"format": "YYYYMM"}},
            {"type": "string", "options": {"value": "-"}},
            {"type": "integer", "options": {"cycle": "monthly", "digits": 4}}
         ]}},
        {"table_code": "asset", "code": "tag", "field_type": "autocode", "status": "Normal",
         "options": {"patterns": [
            {"type": "field", "options": {"fieldCode": "site"}},
            {"type": "integer", "options": {"digits": 3}}
         ]}}
    ]"#;

    fn batch(store: StoreKind, entities: &str) -> Batch<FixedClock> {
        resumed(store, entities, Vec::new()).unwrap()
    }

    fn resumed(
        store: StoreKind,
        entities: &str,
        counters: Vec<SequenceCounter>,
    ) -> anyhow::Result<Batch<FixedClock>> {
        let march = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap();
        Batch::new(
            fields_from_json(SCHEMA).unwrap(),
            entities_from_json(entities).unwrap(),
            counters,
            store,
            Dispatch::none(),
            FixedClock(march),
        )
    }

    fn requests(text: &str) -> Vec<Request> {
        parse(text).unwrap()
    }

    fn code(response: &Response, field: &str) -> String {
        match response {
            Response::Ok { fields, .. } => fields
                .get(field)
                .and_then(|value| value.as_text())
                .unwrap()
                .to_owned(),
            Response::Error { error, .. } => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn responses_keep_input_order() {
        let batch = batch(StoreKind::Atomic, "{}");
        let responses = batch
            .run(
                requests(
                    r#"[
                    {"table": "invoice", "fields": {}},
                    {"table": "asset", "fields": {}},
                    {"table": "asset", "fields": {"site": "sh"}},
                    {"table": "invoice"}
                ]"#,
                ),
                1,
            )
            .unwrap();

        assert_eq!(code(&responses[0], "code"), "INV-202403-0001");
        assert!(matches!(
            &responses[1],
            Response::Error { index: 1, error, .. } if error.contains("site")
        ));
        assert_eq!(code(&responses[2], "tag"), "SH001");
        assert_eq!(code(&responses[3], "code"), "INV-202403-0002");
    }

    #[test]
    fn later_update_restores_earlier_create() {
        let batch = batch(StoreKind::Lock, "{}");
        let responses = batch
            .run(
                requests(
                    r#"[
                    {"table": "invoice", "fields": {"entity_id": 1}},
                    {"table": "invoice", "fields": {"entity_id": 1, "operation": "Update", "code": "X"}}
                ]"#,
                ),
                1,
            )
            .unwrap();

        assert_eq!(code(&responses[0], "code"), "INV-202403-0001");
        assert_eq!(code(&responses[1], "code"), "INV-202403-0001");
    }

    #[test]
    fn existing_rows_come_from_entities_file() {
        let batch = batch(
            StoreKind::Atomic,
            r#"{"invoice": {"5": {"code": "INV-202312-0099"}}}"#,
        );
        let responses = batch
            .run(
                requests(r#"[{"table": "invoice", "fields": {"entity_id": "5"}}]"#),
                1,
            )
            .unwrap();
        assert!(matches!(
            &responses[0],
            Response::Ok {
                outcome: Outcome::AlreadyMaterialized,
                ..
            }
        ));
    }

    #[test]
    fn workers_share_one_counter_store() {
        let batch = batch(StoreKind::Atomic, "{}");
        let input: Vec<Request> = (0..400)
            .map(|_| Request {
                table: "invoice".into(),
                fields: FieldMap::new(),
            })
            .collect();

        let responses = batch.run(input, 8).unwrap();
        assert_eq!(responses.len(), 400);
        for (i, response) in responses.iter().enumerate() {
            assert!(matches!(response, Response::Ok { index, .. } if *index == i));
        }
        let codes: HashSet<_> = responses.iter().map(|r| code(r, "code")).collect();
        assert_eq!(codes.len(), 400);
    }

    #[test]
    fn same_row_requests_stay_ordered_across_workers() {
        let batch = batch(StoreKind::Atomic, "{}");
        let mut input = Vec::new();
        for id in 1..=50 {
            input.extend(requests(&format!(
                r#"[
                    {{"table": "invoice", "fields": {{"entity_id": {id}}}}},
                    {{"table": "asset", "fields": {{"site": "sh"}}}},
                    {{"table": "invoice", "fields": {{"entity_id": {id}, "operation": "Update", "code": "X"}}}}
                ]"#
            )));
        }

        let responses = batch.run(input, 8).unwrap();
        assert_eq!(responses.len(), 150);
        for (i, response) in responses.iter().enumerate() {
            assert_eq!(response.index(), i);
        }
        for row in responses.chunks(3) {
            assert!(matches!(
                &row[2],
                Response::Ok { outcome: Outcome::Restored { fields }, .. } if fields == &["code"]
            ));
            assert_eq!(code(&row[2], "code"), code(&row[0], "code"));
        }
    }

    #[test]
    fn second_run_continues_from_saved_counters() {
        let create = r#"[{"table": "invoice", "fields": {}}, {"table": "asset", "fields": {"site": "sh"}}]"#;

        let first = batch(StoreKind::Atomic, "{}");
        let responses = first.run(requests(create), 1).unwrap();
        assert_eq!(code(&responses[0], "code"), "INV-202403-0001");

        let path = std::env::temp_dir().join(format!("autocode-counters-{}.json", std::process::id()));
        save_counters(&path, &first.counters().unwrap()).unwrap();
        let counters = load_counters(Some(&path)).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(counters.len(), 2);

        let second = resumed(StoreKind::Lock, "{}", counters).unwrap();
        let responses = second.run(requests(create), 1).unwrap();
        assert_eq!(code(&responses[0], "code"), "INV-202403-0002");
        assert_eq!(code(&responses[1], "tag"), "SH002");
    }

    #[test]
    fn missing_counters_file_starts_fresh() {
        let path = std::env::temp_dir().join("autocode-counters-never-written.json");
        assert!(load_counters(Some(&path)).unwrap().is_empty());
        assert!(load_counters(None).unwrap().is_empty());
    }

    #[test]
    fn zero_step_counters_are_rejected() {
        let counters: Vec<SequenceCounter> = parse(
            r#"[{"identifier": "invoice:code:2024-03", "last_allocated": 4, "step": 0,
                 "description": "corrupt"}]"#,
        )
        .unwrap();
        let err = resumed(StoreKind::Atomic, "{}", counters).err().unwrap();
        assert!(err.to_string().contains("invoice:code:2024-03"));
    }

    #[test]
    fn invalid_schema_is_rejected() {
        let err = fields_from_json(
            r#"[{"table_code": "t", "code": "c", "field_type": "autocode",
                 "options": {"patterns": [{"type": "integer", "options": {"start": 0}}]}}]"#,
        )
        .err()
        .unwrap();
        assert!(format!("{err:#}").contains("t.c"));
    }

    #[test]
    fn response_wire_format() {
        let response = Response::Ok {
            index: 0,
            table: "invoice".into(),
            outcome: Outcome::Generated {
                fields: vec!["code".into()],
            },
            fields: [("code", "INV-1")].into_iter().collect(),
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"status":"ok","index":0,"table":"invoice","outcome":{"kind":"generated","fields":["code"]},"fields":{"code":"INV-1"}}"#
        );
    }
}
