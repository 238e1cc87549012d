use crate::error::ParseError;
use crate::models::Tabular;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

/// Cell spellings treated as a missing value regardless of column type.
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
    /// Every cell in the column is missing.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub missing: usize,
}

/// An uploaded table. Every record has exactly one value per column and
/// missing cells are `Value::Null`.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers = reader.headers().map_err(classify_csv_error)?.clone();
        if headers.is_empty() {
            return Err(ParseError::MissingHeader);
        }

        let mut columns = Vec::with_capacity(headers.len());
        let mut seen = HashSet::new();
        for (position, header) in headers.iter().enumerate() {
            let name = match header.trim() {
                "" => format!("Unnamed: {position}"),
                trimmed => trimmed.to_string(),
            };
            if !seen.insert(name.clone()) {
                return Err(ParseError::DuplicateHeader(name));
            }
            columns.push(name);
        }

        let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
        for row in reader.records() {
            let row = row.map_err(classify_csv_error)?;
            raw_rows.push(
                row.iter()
                    .map(|cell| (!is_missing(cell)).then(|| cell.to_string()))
                    .collect(),
            );
        }

        let kinds: Vec<ColumnKind> = (0..columns.len())
            .map(|column| infer_kind(raw_rows.iter().filter_map(|row| row[column].as_deref())))
            .collect();

        let records = raw_rows
            .into_iter()
            .map(|row| Record {
                values: row
                    .into_iter()
                    .zip(kinds.iter())
                    .map(|(cell, kind)| convert_cell(cell, *kind))
                    .collect(),
            })
            .collect();

        Ok(Self {
            columns,
            kinds,
            records,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn kind(&self, column: &str) -> Option<ColumnKind> {
        self.column_index(column).map(|index| self.kinds[index])
    }

    pub fn value<'a>(&self, record: &'a Record, column: &str) -> Option<&'a Value> {
        self.column_index(column).map(|index| &record.values[index])
    }

    /// The record as a JSON object keyed by column name, ready to be indexed.
    pub fn document(&self, record: &Record) -> Map<String, Value> {
        self.columns
            .iter()
            .cloned()
            .zip(record.values.iter().cloned())
            .collect()
    }

    pub fn describe(&self) -> Vec<ColumnSummary> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnSummary {
                name: name.clone(),
                kind: self.kinds[index],
                missing: self
                    .records
                    .iter()
                    .filter(|record| record.values[index].is_null())
                    .count(),
            })
            .collect()
    }

    pub fn preview(&self, rows: usize) -> &[Record] {
        &self.records[..rows.min(self.records.len())]
    }
}

impl Tabular for Dataset {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows(&self) -> Vec<&[Value]> {
        self.records.iter().map(Record::values).collect()
    }
}

/// Renders a cell the way it is written back to CSV.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    if cells.clone().next().is_none() {
        return ColumnKind::Empty;
    }
    if cells.clone().all(|cell| cell.trim().parse::<i64>().is_ok()) {
        ColumnKind::Integer
    } else if cells.clone().all(|cell| parse_float(cell).is_some()) {
        ColumnKind::Float
    } else if cells.clone().all(|cell| parse_bool(cell).is_some()) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}

fn convert_cell(cell: Option<String>, kind: ColumnKind) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };

    let converted = match kind {
        ColumnKind::Integer => cell.trim().parse::<i64>().ok().map(Value::from),
        ColumnKind::Float => parse_float(&cell)
            .and_then(Number::from_f64)
            .map(Value::Number),
        ColumnKind::Boolean => parse_bool(&cell).map(Value::Bool),
        ColumnKind::Text | ColumnKind::Empty => None,
    };

    converted.unwrap_or(Value::String(cell))
}

fn classify_csv_error(error: csv::Error) -> ParseError {
    if let csv::ErrorKind::UnequalLengths {
        pos,
        expected_len,
        len,
    } = error.kind()
    {
        return ParseError::RaggedRow {
            line: pos.as_ref().map(|position| position.line()).unwrap_or_default(),
            expected: *expected_len,
            found: *len,
        };
    }
    ParseError::Csv(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCTS: &str = "id,title,price,in_stock,notes\n\
        1,Red running shoes,59.90,true,\n\
        2,Blue rain jacket,120,false,NA\n\
        3,\"Wool socks, pack of 3\",9.5,true,gift\n";

    #[test]
    fn parse_keeps_every_row_and_column() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(PRODUCTS.as_bytes())?;
        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.columns(),
            &["id", "title", "price", "in_stock", "notes"]
        );
        assert!(dataset
            .records()
            .iter()
            .all(|record| record.values().len() == 5));
        Ok(())
    }

    #[test]
    fn column_kinds_are_inferred_per_column() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(PRODUCTS.as_bytes())?;
        assert_eq!(dataset.kind("id"), Some(ColumnKind::Integer));
        assert_eq!(dataset.kind("title"), Some(ColumnKind::Text));
        assert_eq!(dataset.kind("price"), Some(ColumnKind::Float));
        assert_eq!(dataset.kind("in_stock"), Some(ColumnKind::Boolean));
        assert_eq!(dataset.kind("notes"), Some(ColumnKind::Text));

        let second = &dataset.records()[1];
        assert_eq!(dataset.value(second, "price"), Some(&Value::from(120.0)));
        assert_eq!(dataset.value(second, "in_stock"), Some(&Value::Bool(false)));
        Ok(())
    }

    #[test]
    fn missing_values_become_null_in_every_column_type() -> Result<(), Box<dyn std::error::Error>> {
        let csv = "id,score,label\n1,,x\n,2.5,NaN\n3,null,\n";
        let dataset = Dataset::parse(csv.as_bytes())?;

        let nulls: Vec<usize> = dataset.describe().iter().map(|c| c.missing).collect();
        assert_eq!(nulls, vec![1, 2, 2]);
        assert_eq!(dataset.kind("id"), Some(ColumnKind::Integer));
        assert_eq!(dataset.value(&dataset.records()[1], "id"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn all_missing_column_is_empty_kind() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(b"a,b\n1,\n2,NA\n")?;
        assert_eq!(dataset.kind("b"), Some(ColumnKind::Empty));
        Ok(())
    }

    #[test]
    fn header_only_file_is_an_empty_dataset() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(b"id,text\n")?;
        assert!(dataset.is_empty());
        assert_eq!(dataset.columns().len(), 2);
        Ok(())
    }

    #[test]
    fn empty_file_has_no_header() {
        assert!(matches!(Dataset::parse(b""), Err(ParseError::MissingHeader)));
    }

    #[test]
    fn ragged_rows_are_rejected_with_their_line() {
        let result = Dataset::parse(b"a,b\n1,2\n3\n");
        match result {
            Err(ParseError::RaggedRow {
                line,
                expected,
                found,
            }) => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected ragged row error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        assert!(matches!(
            Dataset::parse(b"id,id\n1,2\n"),
            Err(ParseError::DuplicateHeader(name)) if name == "id"
        ));
    }

    #[test]
    fn blank_headers_get_positional_names() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(b",text\n0,hello\n")?;
        assert_eq!(dataset.columns(), &["Unnamed: 0", "text"]);
        Ok(())
    }

    #[test]
    fn document_maps_column_names_to_values() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(PRODUCTS.as_bytes())?;
        let document = dataset.document(&dataset.records()[2]);
        assert_eq!(document["title"], Value::from("Wool socks, pack of 3"));
        assert_eq!(document["notes"], Value::from("gift"));
        assert_eq!(document.len(), 5);
        Ok(())
    }

    #[test]
    fn preview_is_capped_at_dataset_length() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = Dataset::parse(PRODUCTS.as_bytes())?;
        assert_eq!(dataset.preview(2).len(), 2);
        assert_eq!(dataset.preview(50).len(), 3);
        Ok(())
    }

    #[test]
    fn cell_text_writes_null_as_blank() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&Value::from(2.0)), "2.0");
        assert_eq!(cell_text(&Value::from("x")), "x");
        assert_eq!(cell_text(&Value::Bool(true)), "true");
    }
}
