#![forbid(unsafe_code)]

//! In-memory [`RemoteStore`] with PostgREST-flavored failures.
//!
//! Rows are kept as typed entities. Writes go through JSON so drafts and
//! patches can be the same loosely typed maps the forms produce:
//!
//! 1. the patch is merged over the stored row (or the draft taken as-is),
//! 2. `id`, `created_at` and `updated_at` are stamped,
//! 3. the derive hook fills computed columns,
//! 4. the result is deserialized into `E` (failure ⇒ `22P02`),
//! 5. unique columns are checked (conflict ⇒ `23505`).
//!
//! Unknown ids fail with `PGRST116`. Any operation can be made to fail
//! once with [`MemoryStore::fail_next`].

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RawError;
use crate::model::{Pca, PcaStatus};
use crate::record::Entity;
use crate::store::{RemoteStore, SingletonStore, StatusChange, StoreOp};
use crate::value::{Fields, compare_values};

type DeriveHook = Box<dyn Fn(&mut Fields)>;

#[derive(Debug, Clone, PartialEq)]
struct SortKey {
    field: String,
    descending: bool,
}

/// In-memory store for one resource kind.
pub struct MemoryStore<E> {
    resource: String,
    rows: RefCell<Vec<E>>,
    next_id: Cell<u64>,
    unique: Vec<String>,
    derive: Option<DeriveHook>,
    order: Option<SortKey>,
    failures: RefCell<BTreeMap<StoreOp, VecDeque<RawError>>>,
    calls: RefCell<Vec<StoreOp>>,
}

impl<E> std::fmt::Debug for MemoryStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("resource", &self.resource)
            .field("rows", &self.rows.borrow().len())
            .field("unique", &self.unique)
            .finish_non_exhaustive()
    }
}

impl<E> MemoryStore<E>
where
    E: Entity + Serialize + DeserializeOwned,
{
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            rows: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            unique: Vec::new(),
            derive: None,
            order: None,
            failures: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Seed the store with existing rows.
    #[must_use]
    pub fn with_rows(self, rows: impl IntoIterator<Item = E>) -> Self {
        self.rows.borrow_mut().extend(rows);
        self
    }

    /// Reject writes that would duplicate `field` across rows.
    #[must_use]
    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    /// Compute columns on every write, after the merge and before
    /// deserialization.
    #[must_use]
    pub fn derive(mut self, hook: impl Fn(&mut Fields) + 'static) -> Self {
        self.derive = Some(Box::new(hook));
        self
    }

    /// Order `get_all` results by a field. Ties keep insertion order.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order = Some(SortKey {
            field: field.into(),
            descending,
        });
        self
    }

    /// Make the next call of `op` fail with `error`. Multiple calls queue.
    pub fn fail_next(&self, op: StoreOp, error: RawError) {
        self.failures
            .borrow_mut()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Operations received so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreOp> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.calls.borrow().iter().filter(|c| **c == op).count()
    }

    /// Current rows in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<E> {
        self.rows.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }

    fn begin(&self, op: StoreOp) -> Result<(), RawError> {
        self.calls.borrow_mut().push(op);
        let injected = self
            .failures
            .borrow_mut()
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        injected.map_or(Ok(()), Err)
    }

    fn next_id(&self) -> String {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        format!("{}-{n}", self.resource)
    }

    fn position(&self, id: &str) -> Result<usize, RawError> {
        self.rows
            .borrow()
            .iter()
            .position(|row| row.id() == id)
            .ok_or_else(no_rows)
    }

    fn materialize(&self, mut fields: Fields, now: DateTime<Utc>) -> Result<E, RawError> {
        fields.insert("updated_at".into(), Value::String(now.to_rfc3339()));
        if let Some(derive) = &self.derive {
            derive(&mut fields);
        }
        serde_json::from_value(Value::Object(fields)).map_err(|err| {
            RawError::with_code("22P02", format!("invalid input syntax: {err}"))
        })
    }

    fn check_unique(&self, candidate: &E, skip: Option<usize>) -> Result<(), RawError> {
        let rows = self.rows.borrow();
        for field in &self.unique {
            let value = candidate.field(field);
            if value.is_null() {
                continue;
            }
            let clash = rows
                .iter()
                .enumerate()
                .any(|(i, row)| Some(i) != skip && row.field(field) == value);
            if clash {
                return Err(RawError::with_code(
                    "23505",
                    format!(
                        "duplicate key value violates unique constraint \"{}_{field}_key\"",
                        self.resource
                    ),
                )
                .details(format!("Key ({field})=({value}) already exists.")));
            }
        }
        Ok(())
    }

    fn to_fields(row: &E) -> Result<Fields, RawError> {
        match serde_json::to_value(row) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(RawError::with_code(
                "22P02",
                format!("row is not an object: {other}"),
            )),
            Err(err) => Err(RawError::with_code("22P02", err.to_string())),
        }
    }

    fn insert(&self, draft: Fields) -> Result<E, RawError> {
        let now = Utc::now();
        let mut fields = draft;
        fields.insert("id".into(), Value::String(self.next_id()));
        fields.insert("created_at".into(), Value::String(now.to_rfc3339()));
        let row = self.materialize(fields, now)?;
        self.check_unique(&row, None)?;
        self.rows.borrow_mut().push(row.clone());
        Ok(row)
    }

    fn patch(&self, id: &str, patch: Fields) -> Result<E, RawError> {
        let index = self.position(id)?;
        let mut fields = Self::to_fields(&self.rows.borrow()[index])?;
        for (key, value) in patch {
            if key != "id" && key != "created_at" {
                fields.insert(key, value);
            }
        }
        let row = self.materialize(fields, Utc::now())?;
        self.check_unique(&row, Some(index))?;
        self.rows.borrow_mut()[index] = row.clone();
        Ok(row)
    }
}

fn no_rows() -> RawError {
    RawError::with_code(
        "PGRST116",
        "JSON object requested, multiple (or no) rows returned",
    )
    .details("The result contains 0 rows")
}

#[async_trait(?Send)]
impl<E> RemoteStore for MemoryStore<E>
where
    E: Entity + Serialize + DeserializeOwned,
{
    type Entity = E;
    type Draft = Fields;
    type Patch = Fields;

    fn resource(&self) -> &str {
        &self.resource
    }

    async fn get_all(&self) -> Result<Vec<E>, RawError> {
        self.begin(StoreOp::GetAll)?;
        let mut rows = self.snapshot();
        if let Some(order) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(&a.field(&order.field), &b.field(&order.field));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        Ok(rows)
    }

    async fn create(&self, draft: Fields) -> Result<E, RawError> {
        self.begin(StoreOp::Create)?;
        self.insert(draft)
    }

    async fn update(&self, id: &str, patch: Fields) -> Result<E, RawError> {
        self.begin(StoreOp::Update)?;
        self.patch(id, patch)
    }

    async fn delete(&self, id: &str) -> Result<(), RawError> {
        self.begin(StoreOp::Delete)?;
        let index = self.position(id)?;
        self.rows.borrow_mut().remove(index);
        Ok(())
    }
}

#[async_trait(?Send)]
impl SingletonStore for MemoryStore<Pca> {
    type Resource = Pca;
    type Key = i32;
    type Status = PcaStatus;

    fn resource(&self) -> &str {
        &self.resource
    }

    async fn fetch(&self, ano: &i32) -> Result<Option<Pca>, RawError> {
        self.begin(StoreOp::Fetch)?;
        let rows = self.rows.borrow();
        let mut matching = rows.iter().filter(|pca| pca.ano == *ano);
        match (matching.next(), matching.next()) {
            (None, _) => Ok(None),
            (Some(pca), None) => Ok(Some(pca.clone())),
            (Some(_), Some(_)) => Err(RawError::with_code(
                "PGRST116",
                "JSON object requested, multiple (or no) rows returned",
            )),
        }
    }

    async fn update_status(
        &self,
        id: &str,
        change: StatusChange<PcaStatus>,
    ) -> Result<Pca, RawError> {
        self.begin(StoreOp::UpdateStatus)?;
        let index = self.position(id)?;
        let mut rows = self.rows.borrow_mut();
        let pca = &mut rows[index];
        pca.status = change.status;
        if let Some(at) = change.completed_at {
            pca.published_at = Some(at);
        }
        Ok(pca.clone())
    }
}

/// Derive hook computing `valor_total = quantidade × valor_unitario`.
///
/// Caller-supplied totals are discarded, matching the generated column on
/// the `demandas` table.
pub fn derive_valor_total(fields: &mut Fields) {
    let quantidade = fields
        .get("quantidade")
        .and_then(crate::value::as_number)
        .unwrap_or(0.0);
    let unitario = fields
        .get("valor_unitario")
        .and_then(crate::value::as_number)
        .unwrap_or(0.0);
    let total = serde_json::Number::from_f64(quantidade * unitario)
        .map_or(Value::Null, Value::Number);
    fields.insert("valor_total".into(), total);
}
