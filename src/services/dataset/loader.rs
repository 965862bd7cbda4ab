use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;

use super::types::Dataset;
use crate::error::AppError;

const SCHEMA_INFERENCE_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Excel,
}

impl DatasetFormat {
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx") | Some("xls") | Some("xlsm") => DatasetFormat::Excel,
            _ => DatasetFormat::Csv,
        }
    }
}

/// Parses an uploaded file into a [`Dataset`], picking the reader from the file name.
pub fn load_dataset(data: &Bytes, file_name: &str) -> Result<Dataset, AppError> {
    if data.is_empty() {
        return Err(AppError::InvalidInput("Dataset file is empty".to_string()));
    }

    let start = std::time::Instant::now();
    let format = DatasetFormat::from_file_name(file_name);
    tracing::info!("Loading dataset '{}' as {:?} ({}KB)", file_name, format, data.len() / 1024);

    let df = match format {
        DatasetFormat::Csv => read_csv(data)?,
        DatasetFormat::Excel => read_excel(data)?,
    };

    if df.width() == 0 {
        return Err(AppError::InvalidInput("Dataset has no columns".to_string()));
    }

    let dataset = Dataset::from_frame(&df)?;
    tracing::info!(
        "Dataset loaded in {:?}: {} rows, {} columns",
        start.elapsed(),
        dataset.height(),
        dataset.width()
    );
    Ok(dataset)
}

pub fn load_dataset_from_path(path: impl AsRef<Path>) -> Result<Dataset, AppError> {
    let path = path.as_ref();
    let data = Bytes::from(std::fs::read(path)?);
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    load_dataset(&data, file_name)
}

fn read_csv(data: &[u8]) -> Result<DataFrame, AppError> {
    CsvReader::new(Cursor::new(data))
        .has_header(true)
        .infer_schema(Some(SCHEMA_INFERENCE_ROWS))
        .finish()
        .map_err(|e| {
            tracing::error!("Failed to parse CSV: {}", e);
            AppError::FileProcessingError(format!("Failed to parse CSV: {}", e))
        })
}

fn read_excel(data: &Bytes) -> Result<DataFrame, AppError> {
    let cursor = Cursor::new(data.clone());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
        tracing::error!("Failed to open Excel file: {}", e);
        AppError::FileProcessingError(format!("Failed to open Excel file: {}", e))
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::FileProcessingError("No sheets found in workbook".to_string()))?;
    tracing::debug!("Reading worksheet '{}'", sheet_name);

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::FileProcessingError(format!("Failed to read worksheet: {}", e)))?;
    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

    let mut existing_names = HashSet::new();
    let headers = rows
        .first()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, cell)| unique_column_name(&cell.to_string(), idx, &mut existing_names))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    create_dataframe(&rows, &headers)
}

fn create_dataframe(rows: &[Vec<Data>], headers: &[String]) -> Result<DataFrame, AppError> {
    if headers.is_empty() {
        return Err(AppError::InvalidInput("Empty data or headers".to_string()));
    }

    let mut columns = Vec::with_capacity(headers.len());

    for (col_idx, header) in headers.iter().enumerate() {
        let values: Vec<Data> = rows
            .iter()
            .skip(1) // Skip header row
            .map(|row| row.get(col_idx).cloned().unwrap_or(Data::Empty))
            .collect();

        let series = if is_numeric_column(&values) {
            let nums: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    Data::Float(f) => Some(*f),
                    Data::Int(i) => Some(*i as f64),
                    _ => None,
                })
                .collect();
            Series::new(header, nums)
        } else {
            let strings: Vec<Option<String>> = values
                .iter()
                .map(|v| match v {
                    Data::Empty => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Series::new(header, strings)
        };

        columns.push(series);
    }

    DataFrame::new(columns)
        .map_err(|e| AppError::InvalidInput(format!("Failed to create DataFrame: {}", e)))
}

/// Numeric only when every non-empty cell holds a number; a column of blanks stays categorical.
fn is_numeric_column(values: &[Data]) -> bool {
    let mut seen = false;
    for value in values {
        match value {
            Data::Empty => {}
            Data::Float(_) | Data::Int(_) => seen = true,
            _ => return false,
        }
    }
    seen
}

/// Keeps the header text as written, naming blanks `Unnamed: {idx}` and suffixing repeats with `.N`.
pub fn unique_column_name(name: &str, idx: usize, existing_names: &mut HashSet<String>) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() {
        format!("Unnamed: {}", idx)
    } else {
        trimmed.to_string()
    };

    let mut candidate = base.clone();
    let mut counter = 1;
    while !existing_names.insert(candidate.clone()) {
        candidate = format!("{}.{}", base, counter);
        counter += 1;
    }

    candidate
}
