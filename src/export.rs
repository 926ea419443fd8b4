use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::ValueEnum;
use polars::prelude::{Column as PlColumn, CsvWriter, DataFrame, SerWriter};
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use crate::domain::GridError;
use crate::pipeline::GridView;
use crate::table::Value;

pub const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;charset=UTF-8",
        }
    }

    pub fn filename(&self) -> String {
        format!("export.{}", self.extension())
    }
}

/// Header labels and cell values of an export, one entry per visible column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ExportSheet {
    /// Takes every filtered row of the view, not only the current page.
    ///
    /// Columns sharing a header label collapse into one: the label keeps its
    /// first position and the value of the last such column wins.
    pub fn from_view(view: &GridView) -> Self {
        let mut headers: Vec<String> = Vec::new();
        // Index into headers for each visible column
        let mut slots = Vec::with_capacity(view.visible_columns.len());
        for column in view.visible_columns.iter() {
            match headers.iter().position(|h| *h == column.header) {
                Some(idx) => slots.push(idx),
                None => {
                    slots.push(headers.len());
                    headers.push(column.header.clone());
                }
            }
        }

        let rows = view
            .rows
            .iter()
            .map(|record| {
                let mut row = vec![Value::Null; headers.len()];
                for (column, &slot) in view.visible_columns.iter().zip(slots.iter()) {
                    row[slot] = column.value(record).clone();
                }
                row
            })
            .collect();

        ExportSheet { headers, rows }
    }
}

/// Turns a sheet into file bytes.
pub trait SpreadsheetSerializer {
    fn serialize(&self, sheet: &ExportSheet, format: ExportFormat) -> Result<Vec<u8>, GridError>;
}

/// Delivers exported bytes to the user.
pub trait DownloadSink {
    fn trigger_download(&mut self, bytes: &[u8], filename: &str) -> Result<(), GridError>;
}

/// CSV through polars, XLSX through rust_xlsxwriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetWriter;

impl SpreadsheetWriter {
    fn write_csv(sheet: &ExportSheet) -> Result<Vec<u8>, GridError> {
        let columns: Vec<PlColumn> = sheet
            .headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let values: Vec<Option<String>> = sheet
                    .rows
                    .iter()
                    .map(|row| match &row[idx] {
                        Value::Null => None,
                        value => Some(value.to_string()),
                    })
                    .collect();
                PlColumn::new(header.as_str().into(), values)
            })
            .collect();

        let mut df = DataFrame::new(columns)?;
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buffer)
    }

    fn write_xlsx(sheet: &ExportSheet) -> Result<Vec<u8>, GridError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_num = (idx + 1) as u32;
            for (col, value) in row.iter().enumerate() {
                let col = col as u16;
                match value {
                    Value::Null => {}
                    Value::Bool(b) => {
                        worksheet.write_boolean(row_num, col, *b)?;
                    }
                    Value::Int(i) => {
                        worksheet.write_number(row_num, col, *i as f64)?;
                    }
                    Value::Float(x) => {
                        worksheet.write_number(row_num, col, *x)?;
                    }
                    Value::Text(s) => {
                        worksheet.write_string(row_num, col, s)?;
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

impl SpreadsheetSerializer for SpreadsheetWriter {
    fn serialize(&self, sheet: &ExportSheet, format: ExportFormat) -> Result<Vec<u8>, GridError> {
        match format {
            ExportFormat::Csv => Self::write_csv(sheet),
            ExportFormat::Xlsx => Self::write_xlsx(sheet),
        }
    }
}

/// Saves downloads as files in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    last_saved: Option<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink {
            dir: dir.into(),
            last_saved: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn last_saved(&self) -> Option<&Path> {
        self.last_saved.as_deref()
    }
}

impl DownloadSink for DirectorySink {
    fn trigger_download(&mut self, bytes: &[u8], filename: &str) -> Result<(), GridError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        debug!("Saved {} bytes to {:?}", bytes.len(), path);
        self.last_saved = Some(path);
        Ok(())
    }
}

/// Serializes the view's filtered rows and hands them to `sink` as `export.<ext>`.
/// Returns the number of exported rows.
pub fn export(
    view: &GridView,
    format: ExportFormat,
    serializer: &dyn SpreadsheetSerializer,
    sink: &mut dyn DownloadSink,
) -> Result<usize, GridError> {
    let start_time = Instant::now();
    let sheet = ExportSheet::from_view(view);
    let bytes = serializer.serialize(&sheet, format)?;
    sink.trigger_download(&bytes, &format.filename())?;
    info!(
        "Exported {} rows as {} in {}ms",
        sheet.rows.len(),
        format.filename(),
        start_time.elapsed().as_millis()
    );
    Ok(sheet.rows.len())
}
