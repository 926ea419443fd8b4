use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::domain::GridError;

static NULL: Value = Value::Null;

/// A single cell value.
///
/// Values of different kinds order as `Null < Bool < Int/Float < Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
        }
    }

    /// Three-way comparison on the raw values. Numbers compare numerically,
    /// text lexicographically. NaN sorts after every other number.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => compare_floats(*a as f64, *b),
            (Value::Float(a), Value::Int(b)) => compare_floats(*a, *b as f64),
            (Value::Float(a), Value::Float(b)) => compare_floats(*a, *b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// Total order: all NaNs are equal and greater than any other float
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A row of data, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    // Missing fields read as Null
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Describes one column of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub header: String,
    pub accessor_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl Column {
    pub fn new(id: impl Into<String>, header: impl Into<String>, accessor_key: impl Into<String>) -> Self {
        Column {
            id: id.into(),
            header: header.into(),
            accessor_key: accessor_key.into(),
            hidden: None,
        }
    }

    // Column where id, header and accessor key are all the field name
    pub fn from_field(name: &str) -> Self {
        Column::new(name, name, name)
    }

    pub fn hidden_by_default(mut self) -> Self {
        self.hidden = Some(true);
        self
    }

    pub fn is_hidden_by_default(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    pub fn value<'a>(&self, record: &'a Record) -> &'a Value {
        record.get(&self.accessor_key)
    }
}

/// Columns plus the records they describe.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<Column>, records: Vec<Record>) -> Result<Self, GridError> {
        let mut ids = HashSet::with_capacity(columns.len());
        for column in columns.iter() {
            if !ids.insert(column.id.as_str()) {
                return Err(GridError::DuplicateColumn(column.id.clone()));
            }
        }

        if !records.is_empty() {
            for column in columns.iter() {
                if !records.iter().any(|r| r.contains_field(&column.accessor_key)) {
                    warn!(
                        "Column {:?} reads field {:?} which no record has",
                        column.id, column.accessor_key
                    );
                }
            }
        }

        trace!("Built table with {} columns, {} records", columns.len(), records.len());
        Ok(Table { columns, records })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Field a sort on `id` reads: the column's accessor key, or `id` itself
    /// when no column carries that id.
    pub fn sort_field<'a>(&'a self, id: &'a str) -> &'a str {
        self.column(id).map(|c| c.accessor_key.as_str()).unwrap_or(id)
    }

    pub fn default_hidden(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_hidden_by_default())
            .map(|c| c.id.clone())
            .collect()
    }
}
