use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;

use super::scalar::Scalar;
use crate::{Result, TrellisError};

/// Named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct non-null values in ascending order
    pub fn unique(&self) -> Vec<Scalar> {
        let mut out: Vec<Scalar> = Vec::new();
        for v in self.values.iter().filter(|v| !v.is_null()) {
            if !out.iter().any(|seen| seen == v) {
                out.push(v.clone());
            }
        }
        out.sort_by(|a, b| a.total_cmp(b));
        out
    }

    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter_map(Scalar::as_f64)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Row selection produced by predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(Vec<bool>);

impl Mask {
    pub fn all(len: usize) -> Self {
        Mask(vec![true; len])
    }

    /// Logical AND; both masks must cover the same rows
    pub fn and(mut self, other: &Mask) -> Self {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = *a && *b;
        }
        self
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|b| **b).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, row: usize) -> bool {
        self.0.get(row).copied().unwrap_or(false)
    }
}

impl FromIterator<bool> for Mask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Mask(iter.into_iter().collect())
    }
}

/// In-memory columnar table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    columns: Vec<Column>,
    rows: usize,
}

impl DataFrame {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        for col in &columns {
            if col.len() != rows {
                return Err(TrellisError::InvalidFrame(format!(
                    "column `{}` has {} rows, expected {}",
                    col.name,
                    col.len(),
                    rows
                )));
            }
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(TrellisError::InvalidFrame(format!(
                    "duplicate column `{}`",
                    col.name
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a frame from row-major data
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Scalar>>) -> Result<Self> {
        let mut columns: Vec<Vec<Scalar>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(TrellisError::InvalidFrame(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    names.len()
                )));
            }
            for (col, cell) in columns.iter_mut().zip(row) {
                col.push(cell);
            }
        }
        Self::new(
            names
                .iter()
                .zip(columns)
                .map(|(name, values)| Column::new(*name, values))
                .collect(),
        )
    }

    /// Read CSV with a header row, inferring one type per column
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let names: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in rdr.records() {
            let record = record?;
            for (col, field) in raw.iter_mut().zip(record.iter()) {
                col.push(field.to_string());
            }
        }
        Self::new(
            names
                .into_iter()
                .zip(raw)
                .map(|(name, cells)| Column::new(name, infer_column(&cells)))
                .collect(),
        )
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Keep the rows selected by `mask`
    pub fn filter(&self, mask: &Mask) -> DataFrame {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: c
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(row, _)| mask.get(*row))
                    .map(|(_, v)| v.clone())
                    .collect(),
            })
            .collect();
        let rows = columns.first().map(Column::len).unwrap_or(0);
        DataFrame { columns, rows }
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.rows)
            .map(|row| {
                let mut obj = Map::new();
                for col in &self.columns {
                    obj.insert(col.name.clone(), col.values[row].to_json());
                }
                Value::Object(obj)
            })
            .collect()
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(self.columns.iter().map(Column::name))?;
        for row in 0..self.rows {
            wtr.write_record(self.columns.iter().map(|c| c.values[row].to_string()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| TrellisError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| TrellisError::InvalidFrame(e.to_string()))
    }
}

// Mixed int/float columns become float; any other mix falls back to text.
fn infer_column(cells: &[String]) -> Vec<Scalar> {
    let parsed: Vec<Scalar> = cells.iter().map(|c| Scalar::parse(c)).collect();
    let non_null = || parsed.iter().filter(|v| !v.is_null());

    if non_null().all(Scalar::is_numeric) {
        if non_null().any(|v| matches!(v, Scalar::Float(_))) {
            return parsed
                .into_iter()
                .map(|v| match v {
                    Scalar::Int(i) => Scalar::Float(i as f64),
                    other => other,
                })
                .collect();
        }
        return parsed;
    }
    if non_null().all(|v| matches!(v, Scalar::Date(_)))
        || non_null().all(|v| matches!(v, Scalar::Bool(_)))
    {
        return parsed;
    }
    cells
        .iter()
        .zip(parsed)
        .map(|(raw, v)| if v.is_null() { v } else { Scalar::Str(raw.clone()) })
        .collect()
}
