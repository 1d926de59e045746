//! Tolerant CSV reading for export reports.
//!
//! Columns are typed by inspecting every non-missing cell: a column is boolean,
//! integer or float when all of its cells parse as such, otherwise text. A small
//! set of contract columns have a fixed type regardless of content; cells in those
//! columns that fail to coerce become [`Cell::Missing`] and are counted as warnings
//! instead of failing the read.

use std::fmt;
use std::io::Read;

use serde::Serialize;
use tracing::warn;

use crate::error::WildtraxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Text,
}

/// Columns whose type is fixed by the export contract.
pub const COLUMN_CONTRACT: &[(&str, ColumnType)] = &[
    ("abundance", ColumnType::Text),
    ("image_fire", ColumnType::Boolean),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(value) => Some(*value as f64),
            Cell::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Text(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    name: String,
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Cell>>,
    warnings: usize,
}

impl ReportTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.column_index(column).map(|index| self.types[index])
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of cells that could not be coerced to their column type.
    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &Cell>> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[index])
    }

    /// Keeps only the columns for which `keep` returns true.
    pub fn retain_columns<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let mask = self
            .columns
            .iter()
            .map(|name| keep(name))
            .collect::<Vec<_>>();
        if mask.iter().all(|kept| *kept) {
            return;
        }
        self.columns = apply_mask(std::mem::take(&mut self.columns), &mask);
        self.types = apply_mask(std::mem::take(&mut self.types), &mask);
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| apply_mask(row, &mask))
            .collect();
    }
}

fn apply_mask<T>(values: Vec<T>, mask: &[bool]) -> Vec<T> {
    values
        .into_iter()
        .zip(mask)
        .filter_map(|(value, kept)| kept.then_some(value))
        .collect()
}

/// Reads one CSV export. `name` identifies the table in errors and logs.
pub fn read_table<R: Read>(name: &str, reader: R) -> Result<ReportTable, WildtraxError> {
    let fail = |message: String| WildtraxError::Table {
        file: name.to_string(),
        message,
    };

    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = csv
        .headers()
        .map_err(|err| fail(err.to_string()))?
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let header = if index == 0 {
                header.trim_start_matches('\u{feff}')
            } else {
                header
            };
            header.trim().to_string()
        })
        .collect::<Vec<_>>();

    let mut raw_rows = Vec::new();
    for record in csv.records() {
        let record = record.map_err(|err| fail(err.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() > columns.len() {
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            return Err(fail(format!(
                "line {line} has {} fields, header has {}",
                record.len(),
                columns.len()
            )));
        }
        let mut row = record
            .iter()
            .map(|field| (!is_missing(field)).then(|| field.to_string()))
            .collect::<Vec<_>>();
        row.resize(columns.len(), None);
        raw_rows.push(row);
    }

    let types = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            contract_type(column).unwrap_or_else(|| {
                infer_type(raw_rows.iter().filter_map(|row| row[index].as_deref()))
            })
        })
        .collect::<Vec<_>>();

    let mut warnings = 0usize;
    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(value, column_type)| match value {
                    None => Cell::Missing,
                    Some(value) => coerce(&value, *column_type).unwrap_or_else(|| {
                        warnings += 1;
                        Cell::Missing
                    }),
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    if warnings > 0 {
        warn!(table = name, warnings, "cells could not be coerced and were left missing");
    }

    Ok(ReportTable {
        name: name.to_string(),
        columns,
        types,
        rows,
        warnings,
    })
}

fn contract_type(column: &str) -> Option<ColumnType> {
    COLUMN_CONTRACT
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, column_type)| *column_type)
}

fn is_missing(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty() || trimmed == "NA"
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    let candidates = [ColumnType::Boolean, ColumnType::Integer, ColumnType::Float];
    let mut values = values.peekable();
    if values.peek().is_none() {
        return ColumnType::Text;
    }
    candidates
        .into_iter()
        .find(|candidate| values.clone().all(|value| guess_matches(value, *candidate)))
        .unwrap_or(ColumnType::Text)
}

// 0/1 only read as booleans in contract columns; guessed columns keep them numeric.
fn guess_matches(value: &str, candidate: ColumnType) -> bool {
    match candidate {
        ColumnType::Boolean => matches!(
            value.trim(),
            "T" | "F" | "TRUE" | "FALSE" | "true" | "false" | "True" | "False"
        ),
        other => coerce(value, other).is_some(),
    }
}

fn coerce(value: &str, column_type: ColumnType) -> Option<Cell> {
    let trimmed = value.trim();
    match column_type {
        ColumnType::Boolean => parse_bool(trimmed).map(Cell::Bool),
        ColumnType::Integer => trimmed.parse::<i64>().ok().map(Cell::Integer),
        ColumnType::Float => trimmed
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(Cell::Float),
        ColumnType::Text => Some(Cell::Text(value.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "T" | "TRUE" | "true" | "True" | "1" => Some(true),
        "F" | "FALSE" | "false" | "False" | "0" => Some(false),
        _ => None,
    }
}
