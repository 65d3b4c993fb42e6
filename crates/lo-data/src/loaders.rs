use std::io::Read;
use std::path::Path;

use lo_types::{Column, DataError, Dataset, LoResult};
use serde_json::Value;

/// Loader that turns CSV and JSON sources into a [`Dataset`].
///
/// A column is numeric when every non-empty cell parses as a float; empty
/// cells then become NaN. Any other column is kept as text.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    delimiter: u8,
}

/// A raw cell before column type inference.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Load a file, picking the parser from its extension.
    pub async fn load_file<P: AsRef<Path>>(&self, file_path: P) -> LoResult<Dataset> {
        let path = file_path.as_ref();
        let format = DataFormat::detect(path).ok_or_else(|| DataError::InvalidFormat {
            message: format!("Unsupported file extension: {}", path.display()),
        })?;

        tracing::info!("Loading {:?} dataset from: {}", format, path.display());

        let bytes = tokio::fs::read(path).await.map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        let dataset = match format {
            DataFormat::Csv => self.load_csv_reader(bytes.as_slice())?,
            DataFormat::Json => {
                let text = String::from_utf8(bytes).map_err(|e| DataError::ParseError {
                    message: format!("{} is not valid UTF-8: {}", path.display(), e),
                })?;
                self.load_json_str(&text)?
            }
            DataFormat::JsonLines => {
                let text = String::from_utf8(bytes).map_err(|e| DataError::ParseError {
                    message: format!("{} is not valid UTF-8: {}", path.display(), e),
                })?;
                self.load_json_lines(&text)?
            }
        };

        tracing::info!(
            "Loaded {} rows x {} columns from {}",
            dataset.n_rows(),
            dataset.n_columns(),
            path.display()
        );
        Ok(dataset)
    }

    /// Parse CSV with a header row.
    pub fn load_csv_reader<R: Read>(&self, reader: R) -> LoResult<Dataset> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() {
            return Err(DataError::InvalidDataset {
                message: "CSV input has no header row".to_string(),
            }
            .into());
        }

        let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];

        for (line_num, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| DataError::ParseError {
                message: format!("Failed to read CSV record at line {}: {}", line_num + 2, e),
            })?;

            for (column, raw) in cells.iter_mut().zip(record.iter()) {
                column.push(Self::parse_cell(raw));
            }
        }

        Self::build_dataset(headers.into_iter().zip(cells).collect())
    }

    pub fn load_csv_str(&self, input: &str) -> LoResult<Dataset> {
        self.load_csv_reader(input.as_bytes())
    }

    /// Parse a JSON document: either `{"col": [..], ..}` or `[{"col": v, ..}, ..]`.
    pub fn load_json_str(&self, input: &str) -> LoResult<Dataset> {
        let value: Value = serde_json::from_str(input).map_err(|e| DataError::ParseError {
            message: format!("Invalid JSON dataset: {}", e),
        })?;
        self.load_json_value(&value)
    }

    /// Parse newline-delimited JSON records.
    pub fn load_json_lines(&self, input: &str) -> LoResult<Dataset> {
        let mut records = Vec::new();
        for (line_num, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Value = serde_json::from_str(line).map_err(|e| DataError::ParseError {
                message: format!("Invalid JSON record at line {}: {}", line_num + 1, e),
            })?;
            records.push(record);
        }
        Self::records_to_dataset(&records)
    }

    pub fn load_json_value(&self, value: &Value) -> LoResult<Dataset> {
        match value {
            Value::Object(map) => {
                let mut columns = Vec::with_capacity(map.len());
                for (name, values) in map {
                    let values = values.as_array().ok_or_else(|| DataError::InvalidFormat {
                        message: format!("Column '{}' must be a JSON array", name),
                    })?;
                    columns.push((name.clone(), values.iter().map(Self::json_cell).collect()));
                }
                Self::build_dataset(columns)
            }
            Value::Array(records) => Self::records_to_dataset(records),
            _ => Err(DataError::InvalidFormat {
                message: "JSON dataset must be an object of columns or an array of records"
                    .to_string(),
            }
            .into()),
        }
    }

    fn records_to_dataset(records: &[Value]) -> LoResult<Dataset> {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            let object = record.as_object().ok_or_else(|| DataError::InvalidFormat {
                message: "Every JSON record must be an object".to_string(),
            })?;
            for key in object.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells = records
                    .iter()
                    .map(|record| record.get(&name).map(Self::json_cell).unwrap_or(Cell::Missing))
                    .collect();
                (name, cells)
            })
            .collect();

        Self::build_dataset(columns)
    }

    fn parse_cell(raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Missing;
        }
        match raw.parse::<f64>() {
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    fn json_cell(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::String(s) if s.is_empty() => Cell::Missing,
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    fn build_dataset(columns: Vec<(String, Vec<Cell>)>) -> LoResult<Dataset> {
        let columns = columns
            .into_iter()
            .map(|(name, cells)| Self::infer_column(name, cells))
            .collect();
        Dataset::new(columns)
    }

    fn infer_column(name: String, cells: Vec<Cell>) -> Column {
        let is_numeric = cells.iter().all(|c| !matches!(c, Cell::Text(_)));

        if is_numeric {
            let values = cells
                .into_iter()
                .map(|c| match c {
                    Cell::Number(v) => v,
                    _ => f64::NAN,
                })
                .collect();
            Column::numeric(name, values)
        } else {
            let values = cells
                .into_iter()
                .map(|c| match c {
                    Cell::Missing => String::new(),
                    Cell::Number(v) => v.to_string(),
                    Cell::Text(s) => s,
                })
                .collect();
            Column::text(name, values)
        }
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataFormat {
    Csv,
    Json,
    JsonLines,
}

impl DataFormat {
    /// Detect file format from extension
    pub fn detect<P: AsRef<Path>>(file_path: P) -> Option<DataFormat> {
        let extension = file_path.as_ref().extension()?.to_str()?;

        match extension.to_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "json" => Some(DataFormat::Json),
            "jsonl" | "ndjson" => Some(DataFormat::JsonLines),
            _ => None,
        }
    }
}
