use crate::dataset::cell_text;
use crate::error::ExportError;
use crate::models::Tabular;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};
use serde_json::{Number, Value};
use tracing::warn;

pub const SHEET_NAME: &str = "Sheet1";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;
/// Longest text a worksheet cell holds, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;
/// Integers beyond this magnitude do not survive the trip through an f64
/// cell, so they are written as text.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// A single-sheet workbook: bold header row, then one row per record in the
/// table's column order. Null cells are left blank and text longer than a
/// cell can hold is cut to [`MAX_CELL_CHARS`]. The document properties carry
/// a fixed creation date so equal tables give equal bytes.
pub fn to_excel<T: Tabular + ?Sized>(table: &T) -> Result<Vec<u8>, ExportError> {
    let columns = table.columns();
    let rows = table.rows();
    if rows.len() + 1 > MAX_ROWS || columns.len() > MAX_COLUMNS {
        return Err(ExportError::SheetTooLarge {
            rows: rows.len(),
            columns: columns.len(),
        });
    }

    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (column, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, column as u16, name, &header)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_number = (index + 1) as u32;
        for (column, value) in row.iter().enumerate() {
            let column = column as u16;
            match value {
                Value::Null => {}
                Value::Bool(flag) => {
                    worksheet.write_boolean(row_number, column, *flag)?;
                }
                Value::Number(number) => match number.as_f64().filter(|_| fits_in_f64(number)) {
                    Some(float) => {
                        worksheet.write_number(row_number, column, float)?;
                    }
                    None => {
                        worksheet.write_string(row_number, column, number.to_string())?;
                    }
                },
                other => {
                    let name = columns.get(usize::from(column)).map_or("", String::as_str);
                    let text = fit_cell(cell_text(other), index, name);
                    worksheet.write_string(row_number, column, text)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn fit_cell(text: String, row: usize, column: &str) -> String {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(row, column, chars = text.chars().count(), "cell truncated to the worksheet limit");
            text[..cut].to_string()
        }
        None => text,
    }
}

fn fits_in_f64(number: &Number) -> bool {
    if let Some(integer) = number.as_i64() {
        return integer.unsigned_abs() <= MAX_EXACT_INTEGER;
    }
    number.as_u64().map_or(true, |integer| integer <= MAX_EXACT_INTEGER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchHit, SearchResult};
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use serde_json::json;
    use std::io::Cursor;

    fn result(hits: Vec<SearchHit>) -> SearchResult {
        SearchResult {
            query: "socks".to_string(),
            columns: vec!["title".to_string(), "price".to_string(), "in_stock".to_string()],
            hits,
        }
    }

    #[test]
    fn workbook_reopens_with_header_and_typed_cells() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = to_excel(&result(vec![
            SearchHit {
                id: "1".to_string(),
                score: 0.9,
                values: vec![json!("Wool socks"), json!(9.5), Value::Null],
            },
            SearchHit {
                id: "2".to_string(),
                score: 0.3,
                values: vec![json!("Cotton socks"), json!(4), json!(true)],
            },
        ]))?;

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook.worksheet_range(SHEET_NAME)?;

        assert_eq!(range.get_size(), (3, 3));
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("title".to_string())));
        assert_eq!(range.get_value((0, 2)), Some(&Data::String("in_stock".to_string())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("Wool socks".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(9.5)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Empty));
        assert_eq!(range.get_value((2, 2)), Some(&Data::Bool(true)));
        Ok(())
    }

    #[test]
    fn zero_rows_still_has_a_header() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = to_excel(&result(Vec::new()))?;

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook.worksheet_range(SHEET_NAME)?;
        assert_eq!(range.get_size(), (1, 3));
        Ok(())
    }

    #[test]
    fn huge_integers_are_kept_as_text() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = to_excel(&result(vec![SearchHit {
            id: "1".to_string(),
            score: 1.0,
            values: vec![json!("x"), json!(9_007_199_254_740_993_i64), json!(false)],
        }]))?;

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook.worksheet_range(SHEET_NAME)?;
        assert_eq!(
            range.get_value((1, 1)),
            Some(&Data::String("9007199254740993".to_string()))
        );
        Ok(())
    }

    #[test]
    fn equal_tables_give_equal_bytes() -> Result<(), ExportError> {
        let table = result(vec![SearchHit {
            id: "1".to_string(),
            score: 0.5,
            values: vec![json!("Wool socks"), json!(9.5), json!(true)],
        }]);

        let first = to_excel(&table)?;
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(first, to_excel(&table)?);
        Ok(())
    }

    #[test]
    fn overlong_text_is_cut_to_the_cell_limit() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = to_excel(&result(vec![SearchHit {
            id: "1".to_string(),
            score: 1.0,
            values: vec![json!("é".repeat(40_000)), json!(1), json!(true)],
        }]))?;

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
        let range = workbook.worksheet_range(SHEET_NAME)?;
        match range.get_value((1, 0)) {
            Some(Data::String(text)) => {
                assert_eq!(text.chars().count(), MAX_CELL_CHARS);
                assert!(text.chars().all(|character| character == 'é'));
            }
            other => panic!("expected text, got {other:?}"),
        }
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(1.0)));
        Ok(())
    }
}
