use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::GridError;
use crate::table::{Column as GridColumn, Record, Table, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
    JSON,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Loads a data file into a table. Columns come from `columns_path` when
/// given, otherwise one column per field in file order.
pub fn load_table(path: PathBuf, columns_path: Option<PathBuf>) -> Result<Table, GridError> {
    let file_info = get_file_info(path)?;
    debug!(
        "Loading {:?} ({:?}, {} bytes)",
        file_info.path, file_info.file_type, file_info.file_size
    );
    let start_time = Instant::now();

    let (fields, records) = match file_info.file_type {
        FileType::CSV => load_frame(load_csv(&file_info.path)?)?,
        FileType::PARQUET => load_frame(load_parquet(&file_info.path)?)?,
        FileType::ARROW => load_frame(load_arrow(&file_info.path)?)?,
        FileType::JSON => load_json(&file_info.path)?,
    };

    let columns = match columns_path {
        Some(p) => load_columns(&p)?,
        None => fields.iter().map(|f| GridColumn::from_field(f)).collect(),
    };

    info!(
        "Loading {} records took {}ms ...",
        records.len(),
        start_time.elapsed().as_millis()
    );
    Table::new(columns, records)
}

/// Reads a JSON array of column descriptors.
pub fn load_columns(path: &Path) -> Result<Vec<GridColumn>, GridError> {
    let text = fs::read_to_string(path).map_err(map_io_error)?;
    Ok(serde_json::from_str(&text)?)
}

fn load_json(path: &Path) -> Result<(Vec<String>, Vec<Record>), GridError> {
    let text = fs::read_to_string(path).map_err(map_io_error)?;
    let raw: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(&text)?;

    // Field order of first appearance
    let mut fields: Vec<String> = Vec::new();
    for object in raw.iter() {
        for key in object.keys() {
            if !fields.contains(key) {
                fields.push(key.clone());
            }
        }
    }

    let records = raw
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect::<Record>()
        })
        .collect();
    Ok((fields, records))
}

fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        // Nested values are shown as their JSON text
        other => Value::Text(other.to_string()),
    }
}

// Each column is converted in its own thread, then transposed into records.
fn load_frame(frame: LazyFrame) -> Result<(Vec<String>, Vec<Record>), GridError> {
    let df = Arc::new(frame.collect()?);
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let c_: Result<Vec<Vec<Value>>, PolarsError> = names
        .par_iter()
        .map(|name| load_column_values(&df, name))
        .collect();
    let columns = c_?;

    let records = (0..df.height())
        .map(|row| {
            names
                .iter()
                .zip(columns.iter())
                .map(|(name, values)| (name.clone(), values[row].clone()))
                .collect::<Record>()
        })
        .collect();
    Ok((names, records))
}

fn is_integer_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
    )
}

fn is_float_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32 | DataType::Float64 | DataType::UInt64
    )
}

fn load_column_values(df: &DataFrame, col_name: &str) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(col_name)?;
    let dtype = column.dtype().clone();

    let values: Vec<Value> = if is_integer_type(&dtype) {
        let col = column.cast(&DataType::Int64)?;
        let values = col
            .i64()?
            .into_iter()
            .map(|v| v.map(Value::Int).unwrap_or(Value::Null))
            .collect();
        values
    } else if is_float_type(&dtype) {
        let col = column.cast(&DataType::Float64)?;
        let values = col
            .f64()?
            .into_iter()
            .map(|v| v.map(Value::Float).unwrap_or(Value::Null))
            .collect();
        values
    } else if dtype == DataType::Boolean {
        column
            .bool()?
            .into_iter()
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
            .collect()
    } else {
        let col = column.cast(&DataType::String)?;
        let values = col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null))
            .collect();
        values
    };
    Ok(values)
}

fn map_io_error(e: std::io::Error) -> GridError {
    match e.kind() {
        ErrorKind::NotFound => GridError::FileNotFound,
        ErrorKind::PermissionDenied => GridError::PermissionDenied,
        _ => GridError::IoError(e),
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, GridError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Ok(FileType::CSV),
        Some("parquet") | Some("pq") => Ok(FileType::PARQUET),
        Some("arrow") | Some("ipc") | Some("feather") => Ok(FileType::ARROW),
        Some("json") => Ok(FileType::JSON),
        _ => Err(GridError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, GridError> {
    let metadata = fs::metadata(&path).map_err(map_io_error)?;
    if !metadata.is_file() {
        return Err(GridError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("querygrid_loader_tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn detects_file_types() {
        assert_eq!(detect_file_type(Path::new("a.CSV")).unwrap(), FileType::CSV);
        assert_eq!(detect_file_type(Path::new("a.parquet")).unwrap(), FileType::PARQUET);
        assert_eq!(detect_file_type(Path::new("a.arrow")).unwrap(), FileType::ARROW);
        assert_eq!(detect_file_type(Path::new("a.json")).unwrap(), FileType::JSON);
        assert!(matches!(
            detect_file_type(Path::new("a.txt")),
            Err(GridError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let result = load_table(PathBuf::from("/nonexistent/querygrid/data.csv"), None);
        assert!(matches!(result, Err(GridError::FileNotFound)));
    }

    #[test]
    fn loads_json_records_with_inferred_columns() {
        let path = temp_file(
            "people.json",
            r#"[{"id": 1, "name": "Amy", "ctc": 12.5}, {"id": 2, "name": "Bob", "remote": true}]"#,
        );
        let table = load_table(path, None).unwrap();
        let ids: Vec<&str> = table.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["id", "name", "ctc", "remote"]);
        assert_eq!(table.records()[0].get("ctc"), &Value::Float(12.5));
        assert_eq!(table.records()[1].get("remote"), &Value::Bool(true));
        assert!(table.records()[1].get("ctc").is_null());
    }

    #[test]
    fn inferred_json_columns_follow_file_order() {
        let path = temp_file("unsorted_keys.json", r#"[{"zeta": 1, "alpha": 2, "mid": 3}]"#);
        let table = load_table(path, None).unwrap();
        let ids: Vec<&str> = table.columns().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn loads_csv_through_polars() {
        let path = temp_file("people.csv", "id,name,score\n1,Amy,3.5\n2,Bob,\n");
        let table = load_table(path, None).unwrap();
        assert_eq!(table.records().len(), 2);
        assert_eq!(table.records()[0].get("id"), &Value::Int(1));
        assert_eq!(table.records()[1].get("name"), &Value::from("Bob"));
        assert_eq!(table.records()[0].get("score"), &Value::Float(3.5));
        assert!(table.records()[1].get("score").is_null());
    }

    #[test]
    fn csv_nan_cells_sort_after_numbers() {
        let path = temp_file("scores.csv", "id,score\n1,NaN\n2,7.5\n3,-1.0\n");
        let table = load_table(path, None).unwrap();
        assert!(matches!(table.records()[0].get("score"), Value::Float(x) if x.is_nan()));

        let sorted = crate::pipeline::sort_records(table.records(), "score", false);
        let ids: Vec<&Value> = sorted.iter().map(|r| r.get("id")).collect();
        assert_eq!(ids, vec![&Value::Int(3), &Value::Int(2), &Value::Int(1)]);
    }

    #[test]
    fn column_descriptors_override_inferred_columns() {
        let data = temp_file("apps.json", r#"[{"id": 1, "currentWorkType": "Remote"}]"#);
        let columns = temp_file(
            "apps.columns.json",
            r#"[{"id": "id", "header": "ID", "accessorKey": "id"},
                {"id": "work", "header": "Work Type", "accessorKey": "currentWorkType", "hidden": true}]"#,
        );
        let table = load_table(data, Some(columns)).unwrap();
        assert_eq!(table.columns()[1].header, "Work Type");
        assert_eq!(table.default_hidden(), vec!["work".to_string()]);
    }
}
