use std::collections::BTreeSet;
use std::time::Instant;

use rayon::prelude::*;
use tracing::trace;

use crate::query::{SortBy, ViewState};
use crate::table::{Column, Record, Table};

/// What a view state selects out of a table.
#[derive(Debug, Clone)]
pub struct GridView<'a> {
    pub visible_columns: Vec<&'a Column>,
    /// Sorted and filtered rows, across all pages.
    pub rows: Vec<&'a Record>,
    pub sort_by: Option<SortBy>,
    pub current_page: usize,
    pub rows_per_page: usize,
    pub page_count: usize,
}

impl<'a> GridView<'a> {
    pub fn page(&self) -> &[&'a Record] {
        paginate(&self.rows, self.current_page, self.rows_per_page)
    }

    pub fn filtered_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_prev_page(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.page_count
    }
}

pub fn visible_columns<'a>(columns: &'a [Column], hidden: &BTreeSet<String>) -> Vec<&'a Column> {
    columns.iter().filter(|c| !hidden.contains(&c.id)).collect()
}

// Stable, so equal keys keep their input order in both directions
pub fn sort_records<'a>(records: &'a [Record], field: &str, descending: bool) -> Vec<&'a Record> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    if descending {
        sorted.sort_by(|a, b| b.get(field).compare(a.get(field)));
    } else {
        sorted.sort_by(|a, b| a.get(field).compare(b.get(field)));
    }
    sorted
}

pub fn record_matches(record: &Record, needle: &str) -> bool {
    record
        .values()
        .any(|value| value.to_string().to_lowercase().contains(needle))
}

pub fn filter_records<'a>(rows: Vec<&'a Record>, search: &str) -> Vec<&'a Record> {
    if search.is_empty() {
        return rows;
    }
    let needle = search.to_lowercase();
    rows.into_par_iter()
        .filter(|record| record_matches(record, &needle))
        .collect()
}

pub fn page_count(total: usize, rows_per_page: usize) -> usize {
    if rows_per_page == 0 {
        return 0;
    }
    total.div_ceil(rows_per_page)
}

/// Rows of the 1-based `page`. Pages past the end are empty.
pub fn paginate<T>(rows: &[T], page: usize, rows_per_page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(rows_per_page).min(rows.len());
    let end = start.saturating_add(rows_per_page).min(rows.len());
    &rows[start..end]
}

pub fn run<'a>(table: &'a Table, state: &ViewState) -> GridView<'a> {
    let start_time = Instant::now();

    let visible = visible_columns(table.columns(), &state.hidden_columns);

    let sorted = match &state.sort_by {
        Some(sort) => sort_records(table.records(), table.sort_field(&sort.id), sort.descending),
        None => table.records().iter().collect(),
    };

    let rows = filter_records(sorted, &state.search_query);
    let pages = page_count(rows.len(), state.rows_per_page);

    trace!(
        "Pipeline kept {}/{} rows, {} pages, {} visible columns in {}us",
        rows.len(),
        table.records().len(),
        pages,
        visible.len(),
        start_time.elapsed().as_micros()
    );

    GridView {
        visible_columns: visible,
        rows,
        sort_by: state.sort_by.clone(),
        current_page: state.current_page,
        rows_per_page: state.rows_per_page,
        page_count: pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn users(n: i64) -> Table {
        let columns = vec![
            Column::new("id", "ID", "id"),
            Column::new("name", "Name", "name"),
            Column::new("email", "Email", "email"),
            Column::new("role", "Role", "role"),
        ];
        let records = (1..=n)
            .map(|i| {
                Record::new()
                    .with("id", i)
                    .with("name", format!("User {i}"))
                    .with("email", format!("user{i}@example.com"))
                    .with("role", if i % 2 == 1 { "Admin" } else { "User" })
            })
            .collect();
        Table::new(columns, records).unwrap()
    }

    fn ids(rows: &[&Record]) -> Vec<i64> {
        rows.iter()
            .map(|r| match r.get("id") {
                Value::Int(i) => *i,
                other => panic!("unexpected id {other:?}"),
            })
            .collect()
    }

    #[test]
    fn scores_with_nan_sort_numbers_first() {
        let records: Vec<Record> = (0..200i64)
            .map(|i| {
                let score = if i % 7 == 0 { f64::NAN } else { ((i * 37) % 113) as f64 };
                Record::new().with("id", i).with("score", score)
            })
            .collect();

        let sorted = sort_records(&records, "score", false);
        let scores: Vec<f64> = sorted
            .iter()
            .map(|r| match r.get("score") {
                Value::Float(x) => *x,
                other => panic!("unexpected score {other:?}"),
            })
            .collect();
        let numbers = scores.iter().take_while(|x| !x.is_nan()).count();
        assert_eq!(numbers, 200 - 29);
        assert!(scores[..numbers].windows(2).all(|w| w[0] <= w[1]));
        assert!(scores[numbers..].iter().all(|x| x.is_nan()));
        // NaN rows keep their input order
        let nan_ids = ids(&sorted[numbers..]);
        assert_eq!(nan_ids, (0..200).step_by(7).collect::<Vec<_>>());

        let descending = sort_records(&records, "score", true);
        assert!(descending[..29].iter().all(|r| matches!(r.get("score"), Value::Float(x) if x.is_nan())));
    }

    #[test]
    fn hundred_records_make_five_pages() {
        let table = users(100);
        let view = run(&table, &ViewState::default());
        assert_eq!(view.page_count, 5);
        assert_eq!(ids(view.page()), (1..=20).collect::<Vec<_>>());
        assert!(!view.has_prev_page());
        assert!(view.has_next_page());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let table = users(45);
        let state = ViewState {
            current_page: 4,
            ..ViewState::default()
        };
        let view = run(&table, &state);
        assert_eq!(view.page_count, 3);
        assert!(view.page().is_empty());
    }

    #[test]
    fn last_page_is_partial() {
        let table = users(45);
        let state = ViewState {
            current_page: 3,
            ..ViewState::default()
        };
        assert_eq!(ids(run(&table, &state).page()), (41..=45).collect::<Vec<_>>());
    }

    #[test]
    fn search_is_case_insensitive() {
        let table = users(10);
        let state = ViewState {
            search_query: "admin".to_string(),
            ..ViewState::default()
        };
        let view = run(&table, &state);
        assert_eq!(ids(&view.rows), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn search_matches_hidden_fields() {
        let table = users(10);
        let state = ViewState {
            hidden_columns: ["email".to_string()].into_iter().collect(),
            search_query: "USER7@".to_string(),
            ..ViewState::default()
        };
        let view = run(&table, &state);
        assert_eq!(ids(&view.rows), vec![7]);
        assert!(view.visible_columns.iter().all(|c| c.id != "email"));
    }

    #[test]
    fn descending_sort_keeps_ties_in_input_order() {
        let records = vec![
            Record::new().with("id", 1).with("name", "Bob"),
            Record::new().with("id", 2).with("name", "Amy"),
            Record::new().with("id", 3).with("name", "Bob"),
        ];
        let sorted = sort_records(&records, "name", true);
        assert_eq!(ids(&sorted), vec![1, 3, 2]);

        let sorted = sort_records(&records, "name", false);
        assert_eq!(ids(&sorted), vec![2, 1, 3]);
    }

    #[test]
    fn numeric_sort_is_not_lexicographic() {
        let table = users(12);
        let state = ViewState {
            sort_by: Some(SortBy::descending("id")),
            ..ViewState::default()
        };
        let view = run(&table, &state);
        assert_eq!(ids(&view.rows)[..3], [12, 11, 10]);
    }

    #[test]
    fn sort_then_filter() {
        let table = users(6);
        let state = ViewState {
            sort_by: Some(SortBy::descending("id")),
            search_query: "user".to_string(),
            rows_per_page: 2,
            current_page: 2,
            ..ViewState::default()
        };
        let view = run(&table, &state);
        assert_eq!(view.page_count, 3);
        assert_eq!(ids(view.page()), vec![4, 3]);
    }

    #[test]
    fn visible_columns_keep_input_order() {
        let table = users(1);
        let hidden = ["name".to_string(), "unknown".to_string()].into_iter().collect();
        let visible: Vec<&str> = visible_columns(table.columns(), &hidden)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(visible, vec!["id", "email", "role"]);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(1, 20), 1);
        assert_eq!(page_count(40, 20), 2);
        assert_eq!(page_count(41, 20), 3);
        assert_eq!(page_count(5, 0), 0);
    }
}
