use std::io::Error;
use std::path::PathBuf;

use polars::error::PolarsError;
use thiserror::Error;

use crate::export::ExportFormat;

pub const DEFAULT_ROWS_PER_PAGE: usize = 20;
pub const PAGE_SIZE_OPTIONS: [usize; 5] = [10, 20, 30, 40, 50];

#[derive(Debug, Error)]
pub enum GridError {
    #[error("I/O error: {0}")]
    IoError(#[from] Error),

    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("xlsx error: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),

    #[error("clipboard error: {0}")]
    ClipboardError(#[from] arboard::Error),

    #[error("loading failed: {0}")]
    LoadingFailed(String),

    #[error("file not found")]
    FileNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("unknown file type")]
    UnknownFileType,

    #[error("duplicate column id {0:?}")]
    DuplicateColumn(String),

    #[error("invalid sortBy value {raw:?}: {source}")]
    InvalidSortBy {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("logging setup failed: {0}")]
    LoggingInit(String),
}

/// Settings shared by the model, controller and CLI.
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub default_rows_per_page: usize,
    pub page_size_options: Vec<usize>,
    pub base_path: String,
    pub export_dir: PathBuf,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            default_rows_per_page: DEFAULT_ROWS_PER_PAGE,
            page_size_options: PAGE_SIZE_OPTIONS.to_vec(),
            base_path: "/".to_string(),
            export_dir: PathBuf::from("."),
        }
    }
}

// User actions on the grid
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Search(String),
    ToggleColumn(String),
    SortColumn(String),
    ClearSort,
    NextPage,
    PrevPage,
    GotoPage(usize),
    SetRowsPerPage(usize),
    Export(ExportFormat),
}
