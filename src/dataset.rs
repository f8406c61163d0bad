use serde::Serialize;
use std::fmt;

use crate::error::RenderError;

/// Cells the loader treats as missing, in addition to the empty string.
const MISSING_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Empty,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) if value.fract() == 0.0 && value.abs() < 1e16 => {
                write!(f, "{:.1}", value)
            }
            Value::Float(value) => write!(f, "{}", value),
            Value::Text(value) => f.write_str(value),
            Value::Empty => Ok(()),
        }
    }
}

/// Parsed tabular dataset. Built per request; never cached.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    dataset: &'a Dataset,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// `None` when the dataset has no such column.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let col = self.dataset.column_index(column)?;
        self.dataset.rows[self.index].get(col)
    }
}

impl Dataset {
    pub fn parse(bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.iter().all(|byte| byte.is_ascii_whitespace()) {
            return Err(RenderError::Dataset("dataset is empty".to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);
        let columns: Vec<String> = reader
            .headers()
            .map_err(|err| RenderError::Dataset(format!("failed to read header: {}", err)))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        if columns.iter().all(|name| name.is_empty()) {
            return Err(RenderError::Dataset("dataset has no header row".to_string()));
        }

        let mut raw_rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|err| {
                RenderError::Dataset(format!("failed to parse row {}: {}", idx + 1, err))
            })?;
            raw_rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let types: Vec<ColumnType> = (0..columns.len())
            .map(|col| infer_column_type(raw_rows.iter().map(|row| row[col].as_str())))
            .collect();
        let rows = raw_rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(types.iter())
                    .map(|(cell, ty)| typed_value(cell, *ty))
                    .collect()
            })
            .collect();

        Ok(Self {
            columns,
            types,
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.column_index(column).map(|idx| self.types[idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row whose key column equals `key_value` after coercing it to
    /// the column's type. Keys are not unique; later matches are ignored.
    pub fn lookup(&self, key_column: &str, key_value: &str) -> Result<Row<'_>, RenderError> {
        let col = self.require_column(key_column)?;
        let needle = coerce_key(key_value, self.types[col]);
        let found = needle.and_then(|needle| {
            self.rows
                .iter()
                .position(|row| row.get(col).is_some_and(|cell| *cell == needle))
        });
        match found {
            Some(index) => Ok(Row {
                dataset: self,
                index,
            }),
            None => Err(RenderError::NotFound {
                key_column: key_column.to_string(),
                key_value: key_value.to_string(),
            }),
        }
    }

    pub fn first_row(&self) -> Option<Row<'_>> {
        if self.rows.is_empty() {
            return None;
        }
        Some(Row {
            dataset: self,
            index: 0,
        })
    }

    /// Distinct, non-empty key values in first-occurrence order.
    pub fn key_values(&self, key_column: &str) -> Result<Vec<String>, RenderError> {
        let col = self.require_column(key_column)?;
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        for row in &self.rows {
            let Some(cell) = row.get(col).filter(|cell| !cell.is_empty()) else {
                continue;
            };
            let key = cell.to_string();
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    fn require_column(&self, column: &str) -> Result<usize, RenderError> {
        self.column_index(column).ok_or_else(|| {
            RenderError::Dataset(format!("key column '{}' not found in dataset", column))
        })
    }
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || MISSING_MARKERS.contains(&cell)
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut all_int = true;
    let mut all_float = true;
    let mut any_missing = false;
    let mut any_value = false;
    for cell in cells {
        if is_missing(cell) {
            any_missing = true;
            continue;
        }
        any_value = true;
        if cell.trim().parse::<i64>().is_err() {
            all_int = false;
        }
        if parse_float(cell).is_none() {
            all_float = false;
        }
        if !all_int && !all_float {
            return ColumnType::Text;
        }
    }
    if !any_value {
        return ColumnType::Text;
    }
    // Missing cells force an integer column to float, as a dataframe loader would.
    if all_int && !any_missing {
        ColumnType::Integer
    } else if all_float {
        ColumnType::Float
    } else {
        ColumnType::Text
    }
}

fn typed_value(cell: String, ty: ColumnType) -> Value {
    if is_missing(&cell) {
        return Value::Empty;
    }
    match ty {
        ColumnType::Integer => cell
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or(Value::Text(cell)),
        ColumnType::Float => parse_float(&cell)
            .map(Value::Float)
            .unwrap_or(Value::Text(cell)),
        ColumnType::Text => Value::Text(cell),
    }
}

fn coerce_key(key_value: &str, ty: ColumnType) -> Option<Value> {
    match ty {
        ColumnType::Integer => key_value.trim().parse::<i64>().ok().map(Value::Integer),
        ColumnType::Float => parse_float(key_value).map(Value::Float),
        ColumnType::Text => Some(Value::Text(key_value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDENTS: &str = "roll_no,name,score\n101,Asha Rao,91.5\n102,Vikram Das,88\n101,Duplicate,70\n";

    #[test]
    fn lookup_returns_first_matching_row() {
        let dataset = Dataset::parse(STUDENTS.as_bytes()).expect("parse");
        let row = dataset.lookup("roll_no", "101").expect("row");
        assert_eq!(row.index(), 0);
        assert_eq!(row.get("name").map(ToString::to_string).as_deref(), Some("Asha Rao"));
    }

    #[test]
    fn lookup_is_repeatable() {
        let dataset = Dataset::parse(STUDENTS.as_bytes()).expect("parse");
        let first = dataset.lookup("roll_no", "102").expect("row").index();
        let second = dataset.lookup("roll_no", "102").expect("row").index();
        assert_eq!(first, second);
    }

    #[test]
    fn miss_is_not_found() {
        let dataset = Dataset::parse(STUDENTS.as_bytes()).expect("parse");
        let err = dataset.lookup("roll_no", "9999").unwrap_err();
        assert!(err.is_not_found());
        let err = dataset.lookup("roll_no", "abc").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_key_column_is_dataset_error() {
        let dataset = Dataset::parse(STUDENTS.as_bytes()).expect("parse");
        let err = dataset.lookup("student_id", "101").unwrap_err();
        assert_eq!(err.kind(), "dataset_error");
    }

    #[test]
    fn columns_are_typed_like_a_dataframe() {
        let dataset = Dataset::parse(STUDENTS.as_bytes()).expect("parse");
        assert_eq!(dataset.column_type("roll_no"), Some(ColumnType::Integer));
        assert_eq!(dataset.column_type("score"), Some(ColumnType::Float));
        assert_eq!(dataset.column_type("name"), Some(ColumnType::Text));

        let row = dataset.lookup("roll_no", "102").expect("row");
        assert_eq!(row.get("score").map(ToString::to_string).as_deref(), Some("88.0"));
    }

    #[test]
    fn float_key_column_matches_integer_text() {
        let dataset = Dataset::parse(b"id,name\n1.0,A\n2.5,B\n").expect("parse");
        assert_eq!(dataset.lookup("id", "1").expect("row").index(), 0);
        assert_eq!(dataset.lookup("id", "2.5").expect("row").index(), 1);
    }

    #[test]
    fn integer_column_with_gaps_becomes_float() {
        let dataset = Dataset::parse(b"id,marks\n1,40\n2,\n").expect("parse");
        assert_eq!(dataset.column_type("marks"), Some(ColumnType::Float));
        let row = dataset.lookup("id", "2").expect("row");
        assert!(row.get("marks").expect("column").is_empty());
    }

    #[test]
    fn malformed_blobs_are_dataset_errors() {
        assert_eq!(Dataset::parse(b"").unwrap_err().kind(), "dataset_error");
        assert_eq!(
            Dataset::parse(b"a,b\n1,2,3\n").unwrap_err().kind(),
            "dataset_error"
        );
        assert_eq!(
            Dataset::parse(b"a,b\n\xff\xfe,1\n").unwrap_err().kind(),
            "dataset_error"
        );
    }

    #[test]
    fn key_values_are_distinct_in_order() {
        let dataset = Dataset::parse(STUDENTS.as_bytes()).expect("parse");
        assert_eq!(dataset.key_values("roll_no").expect("keys"), vec!["101", "102"]);
    }
}
