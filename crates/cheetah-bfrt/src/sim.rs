//! In-memory pipeline session.
//!
//! [`SimSession`] behaves like a BFRuntime session against a loaded program:
//! empty listings report `BF_OBJECT_NOT_FOUND`, duplicate adds report
//! `BF_ALREADY_EXISTS`, and removing an entry that another entry still
//! references reports `BF_IN_USE`. It also records every call and can inject
//! faults, which is what the reconciler tests are built on. The `cheetah-ctl`
//! binary uses it to rehearse a reconciliation against a recorded snapshot.

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{BfrtError, BfrtResult, BfrtStatus};
use crate::session::BfrtSession;
use crate::types::{ActionSpec, DataplaneObject, Entry, EntryKey, ObjectKind, RegisterCell};

/// A table-like object in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObject {
    #[serde(flatten)]
    pub object: DataplaneObject,
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Pipeline-defined default action; objects without one reject
    /// `reset_default` with `BF_NOT_SUPPORTED`.
    #[serde(default)]
    pub default_action: Option<ActionSpec>,
    /// Default action currently installed; the pipeline default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_default: Option<ActionSpec>,
}

/// A register array in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimRegister {
    pub name: String,
    pub size: u32,
    pub fields: Vec<String>,
    /// Sparse cell contents; absent indices read as zero.
    #[serde(default)]
    pub cells: Vec<RegisterCell>,
}

/// Serializable pipeline state, used to seed and capture a [`SimSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub program: String,
    #[serde(default)]
    pub objects: Vec<SimObject>,
    #[serde(default)]
    pub registers: Vec<SimRegister>,
}

impl SimSnapshot {
    /// Creates an empty program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            objects: Vec::new(),
            registers: Vec::new(),
        }
    }

    /// Declares a table-like object without a default action.
    pub fn table(mut self, name: &str, kind: ObjectKind) -> Self {
        self.objects.push(SimObject {
            object: DataplaneObject::new(name, kind),
            entries: Vec::new(),
            default_action: None,
            current_default: None,
        });
        self
    }

    /// Declares a table-like object with a pipeline-defined default action.
    pub fn table_with_default(mut self, name: &str, kind: ObjectKind, default: ActionSpec) -> Self {
        self.objects.push(SimObject {
            object: DataplaneObject::new(name, kind),
            entries: Vec::new(),
            default_action: Some(default),
            current_default: None,
        });
        self
    }

    /// Declares a register array.
    pub fn register(mut self, name: &str, size: u32, fields: &[&str]) -> Self {
        self.registers.push(SimRegister {
            name: name.to_string(),
            size,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            cells: Vec::new(),
        });
        self
    }

    /// Seeds an entry into a previously declared object.
    ///
    /// Entries for undeclared objects are dropped with a warning.
    pub fn entry(mut self, object: &str, entry: Entry) -> Self {
        match self.objects.iter_mut().find(|o| o.object.name == object) {
            Some(obj) => obj.entries.push(entry),
            None => warn!("sim: dropping entry {} for undeclared object {}", entry, object),
        }
        self
    }

    /// Seeds a register cell value.
    pub fn register_value(mut self, name: &str, index: u32, field: &str, value: u64) -> Self {
        match self.registers.iter_mut().find(|r| r.name == name) {
            Some(reg) => match reg.cells.iter_mut().find(|c| c.index == index) {
                Some(cell) => {
                    cell.fields.insert(field.to_string(), value);
                }
                None => {
                    let mut fields = BTreeMap::new();
                    fields.insert(field.to_string(), value);
                    reg.cells.push(RegisterCell { index, fields });
                }
            },
            None => warn!("sim: dropping value for undeclared register {}", name),
        }
        self
    }
}

/// One recorded call against a [`SimSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Objects,
    Entries(String),
    Add(String),
    Modify(String),
    Remove(String, EntryKey),
    ResetDefault(String),
    BatchBegin,
    BatchEnd,
    WriteRegister(String, u32),
    ReadRegister(String),
}

#[derive(Debug)]
struct TableState {
    object: DataplaneObject,
    entries: BTreeMap<EntryKey, Entry>,
    default_action: Option<ActionSpec>,
    current_default: Option<ActionSpec>,
}

#[derive(Debug)]
struct RegisterState {
    name: String,
    size: u32,
    fields: Vec<String>,
    cells: BTreeMap<u32, BTreeMap<String, u64>>,
}

#[derive(Debug, Default)]
struct Faults {
    list: HashMap<String, BfrtStatus>,
    remove: HashMap<(String, EntryKey), BfrtStatus>,
    add: HashMap<String, BfrtStatus>,
    reset: HashMap<String, BfrtStatus>,
    batch_end: Option<BfrtStatus>,
    disconnected: bool,
}

#[derive(Debug)]
struct SimState {
    tables: Vec<TableState>,
    registers: Vec<RegisterState>,
    batch_open: bool,
    calls: Vec<SessionCall>,
    faults: Faults,
}

impl SimState {
    fn record(&mut self, call: SessionCall) -> BfrtResult<()> {
        self.calls.push(call);
        if self.faults.disconnected {
            return Err(BfrtError::transport("session disconnected"));
        }
        Ok(())
    }

    fn table(&self, name: &str) -> BfrtResult<&TableState> {
        self.tables
            .iter()
            .find(|t| t.object.name == name)
            .ok_or_else(|| BfrtError::status(BfrtStatus::TableNotFound, name))
    }

    fn table_mut(&mut self, name: &str) -> BfrtResult<&mut TableState> {
        self.tables
            .iter_mut()
            .find(|t| t.object.name == name)
            .ok_or_else(|| BfrtError::status(BfrtStatus::TableNotFound, name))
    }

    fn register_mut(&mut self, name: &str) -> BfrtResult<&mut RegisterState> {
        self.registers
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| BfrtError::status(BfrtStatus::TableNotFound, name))
    }

    fn objects(&mut self) -> BfrtResult<Vec<DataplaneObject>> {
        self.record(SessionCall::Objects)?;
        let mut objects: Vec<DataplaneObject> =
            self.tables.iter().map(|t| t.object.clone()).collect();
        objects.extend(
            self.registers
                .iter()
                .map(|r| DataplaneObject::new(r.name.as_str(), ObjectKind::Register)),
        );
        Ok(objects)
    }

    fn entries(&mut self, object: &str) -> BfrtResult<Vec<Entry>> {
        self.record(SessionCall::Entries(object.to_string()))?;
        if let Some(status) = self.faults.list.get(object) {
            return Err(BfrtError::status(*status, object));
        }
        let table = self.table(object)?;
        if table.entries.is_empty() {
            return Err(BfrtError::not_found(object));
        }
        Ok(table.entries.values().cloned().collect())
    }

    fn add_entry(&mut self, object: &str, entry: Entry) -> BfrtResult<()> {
        self.record(SessionCall::Add(object.to_string()))?;
        if let Some(status) = self.faults.add.get(object) {
            return Err(BfrtError::status(*status, object));
        }
        for target in &entry.refs {
            let exists = self
                .table(&target.object)
                .map(|t| t.entries.contains_key(&target.key))
                .unwrap_or(false);
            if !exists {
                return Err(BfrtError::not_found(format!(
                    "{}: referenced {} {}",
                    object, target.object, target.key
                )));
            }
        }
        let table = self.table_mut(object)?;
        if table.entries.contains_key(&entry.key) {
            return Err(BfrtError::already_exists(format!("{} {}", object, entry.key)));
        }
        debug!("sim: add {} {}", object, entry);
        table.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn modify_entry(&mut self, object: &str, entry: Entry) -> BfrtResult<()> {
        self.record(SessionCall::Modify(object.to_string()))?;
        let table = self.table_mut(object)?;
        match table.entries.get_mut(&entry.key) {
            Some(existing) => {
                *existing = entry;
                Ok(())
            }
            None => Err(BfrtError::not_found(format!("{} {}", object, entry.key))),
        }
    }

    fn remove_entry(&mut self, object: &str, key: &EntryKey) -> BfrtResult<()> {
        self.record(SessionCall::Remove(object.to_string(), key.clone()))?;
        if let Some(status) = self.faults.remove.get(&(object.to_string(), key.clone())) {
            return Err(BfrtError::status(*status, format!("{} {}", object, key)));
        }
        let referenced = self.tables.iter().any(|t| {
            t.entries
                .values()
                .any(|e| e.refs.iter().any(|r| r.object == object && &r.key == key))
        });
        if referenced {
            return Err(BfrtError::in_use(format!("{} {}", object, key)));
        }
        let table = self.table_mut(object)?;
        match table.entries.remove(key) {
            Some(_) => {
                debug!("sim: removed {} {}", object, key);
                Ok(())
            }
            None => Err(BfrtError::not_found(format!("{} {}", object, key))),
        }
    }

    fn reset_default(&mut self, object: &str) -> BfrtResult<()> {
        self.record(SessionCall::ResetDefault(object.to_string()))?;
        if let Some(status) = self.faults.reset.get(object) {
            return Err(BfrtError::status(*status, object));
        }
        let table = self.table_mut(object)?;
        match table.default_action.clone() {
            Some(default) => {
                table.current_default = Some(default);
                Ok(())
            }
            None => Err(BfrtError::status(BfrtStatus::NotSupported, object)),
        }
    }

    fn batch_begin(&mut self) -> BfrtResult<()> {
        self.record(SessionCall::BatchBegin)?;
        if self.batch_open {
            return Err(BfrtError::status(BfrtStatus::Unexpected, "batch already open"));
        }
        self.batch_open = true;
        Ok(())
    }

    fn batch_end(&mut self) -> BfrtResult<()> {
        self.record(SessionCall::BatchEnd)?;
        if !self.batch_open {
            return Err(BfrtError::status(BfrtStatus::Unexpected, "no batch open"));
        }
        self.batch_open = false;
        match self.faults.batch_end {
            Some(status) => Err(BfrtError::status(status, "batch_end")),
            None => Ok(()),
        }
    }

    fn write_register(
        &mut self,
        name: &str,
        index: u32,
        fields: &BTreeMap<String, u64>,
    ) -> BfrtResult<()> {
        self.record(SessionCall::WriteRegister(name.to_string(), index))?;
        let reg = self.register_mut(name)?;
        if index >= reg.size {
            return Err(BfrtError::status(
                BfrtStatus::InvalidArg,
                format!("{}[{}] out of range (size {})", name, index, reg.size),
            ));
        }
        if let Some(unknown) = fields.keys().find(|f| !reg.fields.contains(*f)) {
            return Err(BfrtError::status(
                BfrtStatus::InvalidArg,
                format!("{} has no field {}", name, unknown),
            ));
        }
        let cell = reg.cells.entry(index).or_default();
        for (field, value) in fields {
            cell.insert(field.clone(), *value);
        }
        Ok(())
    }

    fn read_register(&mut self, name: &str) -> BfrtResult<Vec<RegisterCell>> {
        self.record(SessionCall::ReadRegister(name.to_string()))?;
        let reg = self.register_mut(name)?;
        let cells = (0..reg.size)
            .map(|index| {
                let stored = reg.cells.get(&index);
                let fields = reg
                    .fields
                    .iter()
                    .map(|f| {
                        let value = stored.and_then(|c| c.get(f)).copied().unwrap_or(0);
                        (f.clone(), value)
                    })
                    .collect();
                RegisterCell { index, fields }
            })
            .collect();
        Ok(cells)
    }
}

/// In-memory [`BfrtSession`].
#[derive(Debug)]
pub struct SimSession {
    program: String,
    state: Mutex<SimState>,
}

impl SimSession {
    /// Loads a program and its state from a snapshot.
    pub fn new(snapshot: SimSnapshot) -> Self {
        let tables = snapshot
            .objects
            .into_iter()
            .map(|o| {
                let mut entries = BTreeMap::new();
                for entry in o.entries {
                    let key = entry.key.clone();
                    if entries.insert(key.clone(), entry).is_some() {
                        warn!(
                            "sim: {} lists key {} more than once, keeping the last",
                            o.object.name, key
                        );
                    }
                }
                TableState {
                    entries,
                    current_default: o.current_default.or_else(|| o.default_action.clone()),
                    default_action: o.default_action,
                    object: o.object,
                }
            })
            .collect();
        let registers = snapshot
            .registers
            .into_iter()
            .map(|r| RegisterState {
                cells: r.cells.into_iter().map(|c| (c.index, c.fields)).collect(),
                name: r.name,
                size: r.size,
                fields: r.fields,
            })
            .collect();

        Self {
            program: snapshot.program,
            state: Mutex::new(SimState {
                tables,
                registers,
                batch_open: false,
                calls: Vec::new(),
                faults: Faults::default(),
            }),
        }
    }

    /// Parses a JSON snapshot.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Captures the current state as a snapshot.
    pub fn snapshot(&self) -> SimSnapshot {
        let state = self.state.lock();
        SimSnapshot {
            program: self.program.clone(),
            objects: state
                .tables
                .iter()
                .map(|t| SimObject {
                    object: t.object.clone(),
                    entries: t.entries.values().cloned().collect(),
                    default_action: t.default_action.clone(),
                    current_default: t.current_default.clone(),
                })
                .collect(),
            registers: state
                .registers
                .iter()
                .map(|r| SimRegister {
                    name: r.name.clone(),
                    size: r.size,
                    fields: r.fields.clone(),
                    cells: r
                        .cells
                        .iter()
                        .map(|(index, fields)| RegisterCell {
                            index: *index,
                            fields: fields.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns the number of entries currently held by `object`.
    pub fn entry_count(&self, object: &str) -> usize {
        self.state
            .lock()
            .table(object)
            .map(|t| t.entries.len())
            .unwrap_or(0)
    }

    /// Returns the entry with `key`, if present.
    pub fn entry(&self, object: &str, key: &EntryKey) -> Option<Entry> {
        self.state
            .lock()
            .table(object)
            .ok()
            .and_then(|t| t.entries.get(key).cloned())
    }

    /// Returns the default action currently installed on `object`.
    pub fn current_default(&self, object: &str) -> Option<ActionSpec> {
        self.state
            .lock()
            .table(object)
            .ok()
            .and_then(|t| t.current_default.clone())
    }

    /// Overrides the default action currently installed on `object`.
    pub fn set_current_default(&self, object: &str, action: ActionSpec) {
        if let Ok(table) = self.state.lock().table_mut(object) {
            table.current_default = Some(action);
        }
    }

    /// Returns a stored register value.
    pub fn register_value(&self, name: &str, index: u32, field: &str) -> Option<u64> {
        let mut state = self.state.lock();
        let reg = state.register_mut(name).ok()?;
        if index >= reg.size || !reg.fields.iter().any(|f| f == field) {
            return None;
        }
        Some(
            reg.cells
                .get(&index)
                .and_then(|c| c.get(field))
                .copied()
                .unwrap_or(0),
        )
    }

    /// Returns true while a batch is open.
    pub fn is_batch_open(&self) -> bool {
        self.state.lock().batch_open
    }

    /// Makes every listing of `object` fail with `status`.
    pub fn fail_list(&self, object: &str, status: BfrtStatus) {
        self.state.lock().faults.list.insert(object.to_string(), status);
    }

    /// Makes removal of one entry fail with `status`.
    pub fn fail_remove(&self, object: &str, key: EntryKey, status: BfrtStatus) {
        self.state
            .lock()
            .faults
            .remove
            .insert((object.to_string(), key), status);
    }

    /// Makes every add into `object` fail with `status`.
    pub fn fail_add(&self, object: &str, status: BfrtStatus) {
        self.state.lock().faults.add.insert(object.to_string(), status);
    }

    /// Makes default-action reset of `object` fail with `status`.
    pub fn fail_reset_default(&self, object: &str, status: BfrtStatus) {
        self.state.lock().faults.reset.insert(object.to_string(), status);
    }

    /// Makes `batch_end` report `status` after closing the batch.
    pub fn fail_batch_end(&self, status: BfrtStatus) {
        self.state.lock().faults.batch_end = Some(status);
    }

    /// Drops the session: every later call fails with a transport error.
    pub fn disconnect(&self) {
        self.state.lock().faults.disconnected = true;
    }
}

#[async_trait]
impl BfrtSession for SimSession {
    fn program(&self) -> &str {
        &self.program
    }

    async fn objects(&self) -> BfrtResult<Vec<DataplaneObject>> {
        self.state.lock().objects()
    }

    async fn entries(&self, object: &str) -> BfrtResult<Vec<Entry>> {
        self.state.lock().entries(object)
    }

    async fn add_entry(&self, object: &str, entry: Entry) -> BfrtResult<()> {
        self.state.lock().add_entry(object, entry)
    }

    async fn modify_entry(&self, object: &str, entry: Entry) -> BfrtResult<()> {
        self.state.lock().modify_entry(object, entry)
    }

    async fn remove_entry(&self, object: &str, key: &EntryKey) -> BfrtResult<()> {
        self.state.lock().remove_entry(object, key)
    }

    async fn reset_default(&self, object: &str) -> BfrtResult<()> {
        self.state.lock().reset_default(object)
    }

    async fn batch_begin(&self) -> BfrtResult<()> {
        self.state.lock().batch_begin()
    }

    async fn batch_end(&self) -> BfrtResult<()> {
        self.state.lock().batch_end()
    }

    async fn write_register(
        &self,
        name: &str,
        index: u32,
        fields: &BTreeMap<String, u64>,
    ) -> BfrtResult<()> {
        self.state.lock().write_register(name, index, fields)
    }

    async fn read_register(&self, name: &str, from_hw: bool) -> BfrtResult<Vec<RegisterCell>> {
        if from_hw {
            debug!("sim: {} read from hardware", name);
        }
        self.state.lock().read_register(name)
    }
}
