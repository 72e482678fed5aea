//! Tabular data store seam and the in-memory implementation used offline and
//! in tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use dash_core::error::{DashError, Result};
use serde_json::{Map, Value};
use tracing::debug;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Query ─────────────────────────────────────────────────────────────────────

/// A related row pulled in through a foreign key, exposed under `alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    /// Column of the outer row holding the related row's `id`.
    pub foreign_key: String,
    pub columns: Vec<String>,
}

/// Read request against one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub table: String,
    /// Projected columns; empty selects all.
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    /// Equality filters, all of which must hold.
    pub filters: Vec<(String, Value)>,
    /// Column and ascending flag.
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            ..Default::default()
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embed(mut self, alias: &str, table: &str, foreign_key: &str, columns: &[&str]) -> Self {
        self.embeds.push(Embed {
            alias: alias.to_string(),
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// The `select` clause in PostgREST syntax, e.g.
    /// `*,author:users!user(first_name,last_name)`.
    pub fn select_clause(&self) -> String {
        let mut parts: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.clone()
        };
        for embed in &self.embeds {
            parts.push(format!(
                "{}:{}!{}({})",
                embed.alias,
                embed.table,
                embed.foreign_key,
                embed.columns.join(",")
            ));
        }
        parts.join(",")
    }
}

// ── TableStore ────────────────────────────────────────────────────────────────

/// Remote tabular data store.
///
/// Every error is fatal for the calling operation; implementations never
/// retry.
pub trait TableStore: Send + Sync {
    /// Insert `rows` (JSON objects) and return them as stored.
    fn insert<'a>(&'a self, table: &'a str, rows: Vec<Value>) -> BoxFuture<'a, Result<Vec<Value>>>;

    fn select<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Value>>>;

    /// Exactly one row, or [`DashError::NotFound`] when nothing matches.
    fn select_single<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Value>>;
}

/// Select one row from `forums` to prove the store is reachable.
pub async fn test_connection(store: &dyn TableStore) -> Result<Vec<Value>> {
    let query = Query::table("forums").limit(1);
    store.select(&query).await
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// Process-local store with PostgREST-like semantics.
///
/// Inserted rows get an integer `id` and a `created_at` stamp when they do
/// not carry one.
#[derive(Debug)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of rows currently in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Map<String, Value>>>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_rows(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut obj) = row else {
                return Err(DashError::Store(format!(
                    "insert into {} expects JSON objects",
                    table
                )));
            };
            if !obj.contains_key("id") {
                let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
                obj.insert("id".to_string(), Value::from(id));
            }
            if !obj.contains_key("created_at") {
                obj.insert(
                    "created_at".to_string(),
                    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
                );
            }
            prepared.push(obj);
        }

        let mut tables = self.lock();
        let stored = tables.entry(table.to_string()).or_default();
        stored.extend(prepared.iter().cloned());
        debug!(table, rows = prepared.len(), "MemoryStore insert");

        Ok(prepared.into_iter().map(Value::Object).collect())
    }

    fn run_query(&self, query: &Query) -> Vec<Value> {
        let tables = self.lock();
        let empty = Vec::new();
        let rows = tables.get(&query.table).unwrap_or(&empty);

        let mut matched: Vec<&Map<String, Value>> = rows
            .iter()
            .filter(|row| {
                query.filters.iter().all(|(col, want)| {
                    row.get(col)
                        .map(|have| values_match(have, want))
                        .unwrap_or(false)
                })
            })
            .collect();

        if let Some((col, ascending)) = &query.order {
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(col).unwrap_or(&Value::Null),
                    b.get(col).unwrap_or(&Value::Null),
                );
                if *ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(n) = query.limit {
            matched.truncate(n);
        }

        matched
            .into_iter()
            .map(|row| {
                let mut out = project(row, &query.columns);
                for embed in &query.embeds {
                    let related = row
                        .get(&embed.foreign_key)
                        .and_then(|fk| {
                            tables.get(&embed.table).and_then(|target| {
                                target.iter().find(|candidate| {
                                    candidate
                                        .get("id")
                                        .map(|id| values_match(id, fk))
                                        .unwrap_or(false)
                                })
                            })
                        })
                        .map(|found| Value::Object(project(found, &embed.columns)))
                        .unwrap_or(Value::Null);
                    out.insert(embed.alias.clone(), related);
                }
                Value::Object(out)
            })
            .collect()
    }
}

impl TableStore for MemoryStore {
    fn insert<'a>(&'a self, table: &'a str, rows: Vec<Value>) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move { self.insert_rows(table, rows) })
    }

    fn select<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move { Ok(self.run_query(query)) })
    }

    fn select_single<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let mut rows = self.run_query(query);
            match rows.len() {
                1 => Ok(rows.remove(0)),
                0 => Err(DashError::NotFound(format!(
                    "no row in {} matches the query",
                    query.table
                ))),
                n => Err(DashError::Store(format!(
                    "expected a single row from {}, got {}",
                    query.table, n
                ))),
            }
        })
    }
}

fn project(row: &Map<String, Value>, columns: &[String]) -> Map<String, Value> {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Textual equality, the way query-string filters compare (`3` matches `"3"`).
fn values_match(have: &Value, want: &Value) -> bool {
    have == want || value_text(have) == value_text(want)
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numbers numerically, timestamps chronologically, other strings lexically;
/// nulls sort last.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        _ => value_text(a).cmp(&value_text(b)),
    }
}
