//! View state <-> URL query string.
//!
//! Keys: `hiddenColumns` (comma joined ids), `sortBy` (JSON `{"id", "desc"}`),
//! `page`, `pageSize` and `search`. Keys the grid does not own are kept as is.

use std::collections::BTreeSet;
use std::fmt;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::form_urlencoded;

use crate::domain::{DEFAULT_ROWS_PER_PAGE, GridError};

pub const KEY_HIDDEN_COLUMNS: &str = "hiddenColumns";
pub const KEY_SORT_BY: &str = "sortBy";
pub const KEY_PAGE: &str = "page";
pub const KEY_PAGE_SIZE: &str = "pageSize";
pub const KEY_SEARCH: &str = "search";

/// Ordered list of query pairs, behaving like the browser's `URLSearchParams`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        QueryString {
            pairs: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // Replaces the first occurrence in place and drops the rest, appends if missing
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.pairs[idx].1 = value;
                let mut seen = 0;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        f.write_str(&encoded)
    }
}

/// Splits `/path?query` into its path and parsed query.
pub fn split_location(location: &str) -> (&str, QueryString) {
    match location.split_once('?') {
        Some((path, query)) => (path, QueryString::parse(query)),
        None => (location, QueryString::default()),
    }
}

pub fn join_location(path: &str, query: &QueryString) -> String {
    format!("{path}?{query}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub id: String,
    #[serde(rename = "desc", default)]
    pub descending: bool,
}

impl SortBy {
    pub fn ascending(id: impl Into<String>) -> Self {
        SortBy {
            id: id.into(),
            descending: false,
        }
    }

    pub fn descending(id: impl Into<String>) -> Self {
        SortBy {
            id: id.into(),
            descending: true,
        }
    }
}

/// Values used when a key is missing from the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDefaults {
    pub hidden_columns: BTreeSet<String>,
    pub rows_per_page: usize,
}

impl Default for StateDefaults {
    fn default() -> Self {
        StateDefaults {
            hidden_columns: BTreeSet::new(),
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub hidden_columns: BTreeSet<String>,
    pub sort_by: Option<SortBy>,
    pub current_page: usize,
    pub rows_per_page: usize,
    pub search_query: String,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            hidden_columns: BTreeSet::new(),
            sort_by: None,
            current_page: 1,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            search_query: String::new(),
        }
    }
}

impl ViewState {
    pub fn decode(query: &QueryString, defaults: &StateDefaults) -> Result<Self, GridError> {
        let hidden_columns = match query.get(KEY_HIDDEN_COLUMNS) {
            Some(raw) => raw
                .split(',')
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.hidden_columns.clone(),
        };

        let sort_by = query
            .get(KEY_SORT_BY)
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                // JSON `null` reads as unsorted
                serde_json::from_str::<Option<SortBy>>(raw).map_err(|source| GridError::InvalidSortBy {
                    raw: raw.to_string(),
                    source,
                })
            })
            .transpose()?
            .flatten();

        let state = ViewState {
            hidden_columns,
            sort_by,
            current_page: parse_positive(query.get(KEY_PAGE), 1),
            rows_per_page: parse_positive(query.get(KEY_PAGE_SIZE), defaults.rows_per_page),
            search_query: query.get(KEY_SEARCH).unwrap_or_default().to_string(),
        };
        debug!("Decoded view state {:?}", state);
        Ok(state)
    }

    pub fn from_query(query: &str) -> Result<Self, GridError> {
        Self::decode(&QueryString::parse(query), &StateDefaults::default())
    }

    pub fn is_hidden(&self, column_id: &str) -> bool {
        self.hidden_columns.contains(column_id)
    }
}

// Anything that is not a positive integer falls back to the default
fn parse_positive(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

/// A partial change to the view state. Fields left `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Setters)]
#[setters(strip_option)]
pub struct ViewStateUpdate {
    pub hidden_columns: Option<BTreeSet<String>>,
    pub sort_by: Option<Option<SortBy>>,
    pub current_page: Option<usize>,
    pub rows_per_page: Option<usize>,
    #[setters(into)]
    pub search_query: Option<String>,
}

impl ViewStateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ViewStateUpdate::default()
    }

    /// Writes the update onto a copy of `base`.
    ///
    /// An empty hidden set is written as `hiddenColumns=` so that it overrides
    /// the columns hidden by default. A cleared sort and an empty search remove
    /// their keys.
    pub fn encode(&self, base: &QueryString) -> QueryString {
        let mut query = base.clone();

        if let Some(hidden) = &self.hidden_columns {
            let joined = hidden.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            query.set(KEY_HIDDEN_COLUMNS, joined);
        }

        match &self.sort_by {
            Some(Some(sort)) => match serde_json::to_string(sort) {
                Ok(json) => query.set(KEY_SORT_BY, json),
                Err(e) => debug!("Skipping unserializable sort {:?}: {}", sort, e),
            },
            Some(None) => query.remove(KEY_SORT_BY),
            None => {}
        }

        if let Some(page) = self.current_page {
            query.set(KEY_PAGE, page.to_string());
        }

        if let Some(size) = self.rows_per_page {
            query.set(KEY_PAGE_SIZE, size.to_string());
        }

        match self.search_query.as_deref() {
            Some("") => query.remove(KEY_SEARCH),
            Some(search) => query.set(KEY_SEARCH, search),
            None => {}
        }

        trace!("Encoded {:?} into {}", self, query);
        query
    }
}

impl From<&ViewState> for ViewStateUpdate {
    fn from(state: &ViewState) -> Self {
        ViewStateUpdate {
            hidden_columns: Some(state.hidden_columns.clone()),
            sort_by: Some(state.sort_by.clone()),
            current_page: Some(state.current_page),
            rows_per_page: Some(state.rows_per_page),
            search_query: Some(state.search_query.clone()),
        }
    }
}
