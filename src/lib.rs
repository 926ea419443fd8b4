//! A tabular data grid whose view state (sort, hidden columns, search, page
//! and page size) lives in a URL query string.
//!
//! [`query`] maps the state to and from the query string, [`pipeline`] turns a
//! [`table::Table`] plus a state into the rows to show, and [`export`] writes
//! the filtered rows out as CSV or XLSX.

pub mod controller;
pub mod domain;
pub mod export;
pub mod loader;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod table;
pub mod ui;

pub use domain::{GridConfig, GridError, Message};
pub use export::ExportFormat;
pub use model::{History, Model, Navigator};
pub use pipeline::GridView;
pub use query::{QueryString, SortBy, ViewState, ViewStateUpdate};
pub use table::{Column, Record, Table, Value};
