// Delimited table reading/writing shared by the codebook and the datasets

use crate::error::{PlotError, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A single cell interpreted as a survey response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    /// Empty cell or an explicit NaN / NA marker
    Missing,
    Number(f64),
    Text(&'a str),
}

impl<'a> Cell<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || matches!(trimmed, "NA" | "NaN" | "nan" | "N/A") {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Missing,
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(trimmed),
        }
    }

    /// Numeric view of the cell: missing becomes NaN, text is rejected.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Missing => Some(f64::NAN),
            Cell::Number(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }
}

impl CsvData {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Exact-name column lookup
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Raw text of a column; short rows yield empty cells.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }
}

/// Read a delimited table with a header row from any reader.
pub fn read_csv_from_reader<R: Read>(reader: R, delimiter: u8) -> csv::Result<CsvData> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let headers = reader
        .headers()?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        rows.push(row);
    }

    Ok(CsvData { headers, rows })
}

pub fn read_csv_file(path: &Path, delimiter: u8) -> Result<CsvData> {
    let file = File::open(path).map_err(|e| PlotError::io(path, e))?;
    read_csv_from_reader(file, delimiter).map_err(|e| PlotError::csv(path, e))
}

pub fn write_csv_to_writer<W: Write>(writer: W, data: &CsvData) -> csv::Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(&data.headers)?;
    for row in &data.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a comma separated table, creating parent directories as needed.
pub fn write_csv_file(path: &Path, data: &CsvData) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PlotError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| PlotError::io(path, e))?;
    write_csv_to_writer(file, data).map_err(|e| PlotError::csv(path, e))
}
