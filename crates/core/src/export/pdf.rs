use crate::dataset::cell_text;
use crate::error::ExportError;
use crate::models::Tabular;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

// A4 landscape, in points.
const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MARGIN: f32 = 36.0;
const BASE_FONT_SIZE: f32 = 8.0;
/// Courier advance width as a fraction of the font size.
const CHAR_ADVANCE: f32 = 0.6;
const MIN_COLUMN_CHARS: usize = 4;
const GAP_CHARS: usize = 2;

/// Monospaced table layout: how wide each column is (in characters) and the
/// font size that lets all of them fit across the page.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    widths: Vec<usize>,
    font_size: f32,
}

impl Layout {
    fn fit(header: &[String], body: &[Vec<String>]) -> Self {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        let count = header.len().max(1);
        let gaps = GAP_CHARS * (count - 1);

        let minimum_chars = MIN_COLUMN_CHARS * count + gaps;
        let font_size = BASE_FONT_SIZE.min(usable / (minimum_chars as f32 * CHAR_ADVANCE));
        let capacity = (usable / (font_size * CHAR_ADVANCE)).floor() as usize;

        let natural: Vec<usize> = (0..header.len())
            .map(|column| {
                std::iter::once(&header[column])
                    .chain(body.iter().map(|row| &row[column]))
                    .flat_map(|cell| cell.lines().map(|line| line.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .max(MIN_COLUMN_CHARS)
            })
            .collect();

        let mut widths = natural.clone();
        if natural.iter().sum::<usize>() + gaps > capacity {
            let mut order: Vec<usize> = (0..natural.len()).collect();
            order.sort_by_key(|&column| natural[column]);

            let mut remaining = capacity.saturating_sub(gaps);
            for (done, &column) in order.iter().enumerate() {
                let share = remaining / (order.len() - done);
                widths[column] = natural[column].min(share).max(MIN_COLUMN_CHARS);
                remaining = remaining.saturating_sub(widths[column]);
            }
        }

        Self { widths, font_size }
    }

    fn leading(&self) -> f32 {
        self.font_size * 1.25
    }

    fn lines_per_page(&self) -> usize {
        ((PAGE_HEIGHT - 2.0 * MARGIN) / self.leading()).floor() as usize
    }

    /// Wraps every cell to its column width and returns the printed lines
    /// of one table row.
    fn render_row(&self, cells: &[String]) -> Vec<String> {
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(&self.widths)
            .map(|(cell, &width)| wrap(cell, width))
            .collect();
        let height = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);

        (0..height)
            .map(|line| {
                wrapped
                    .iter()
                    .zip(&self.widths)
                    .map(|(pieces, &width)| {
                        let piece = pieces.get(line).map(String::as_str).unwrap_or("");
                        format!("{piece:<width$}")
                    })
                    .collect::<Vec<_>>()
                    .join(&" ".repeat(GAP_CHARS))
                    .trim_end()
                    .to_string()
            })
            .collect()
    }
}

fn wrap(cell: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    for line in cell.split('\n') {
        let chars: Vec<char> = line.trim_end_matches('\r').chars().collect();
        if chars.is_empty() {
            pieces.push(String::new());
            continue;
        }
        pieces.extend(chars.chunks(width.max(1)).map(|chunk| chunk.iter().collect()));
    }
    pieces
}

/// Packs rendered rows onto pages of at most `per_page` lines. A row starts
/// a fresh page when it would not fit on the current one; a row taller than
/// a whole page continues across as many pages as it needs.
fn paginate(rows: impl IntoIterator<Item = Vec<String>>, per_page: usize) -> Vec<Vec<String>> {
    let per_page = per_page.max(1);
    let mut pages: Vec<Vec<String>> = vec![Vec::new()];
    for lines in rows {
        let current = pages.last().map_or(0, Vec::len);
        if current > 0 && current + lines.len() > per_page {
            pages.push(Vec::new());
        }
        for line in lines {
            if pages.last().map_or(0, Vec::len) >= per_page {
                pages.push(Vec::new());
            }
            if let Some(page) = pages.last_mut() {
                page.push(line);
            }
        }
    }
    pages
}

/// Standard PDF fonts only cover WinAnsi; anything outside Latin-1 prints
/// as `?`.
fn encode_latin1(line: &str) -> Vec<u8> {
    line.chars()
        .map(|character| u8::try_from(u32::from(character)).unwrap_or(b'?'))
        .collect()
}

/// Renders `columns` of `table` as a paginated monospaced table. The header
/// is repeated on every page; cells wider than their column wrap onto
/// extra lines instead of being cut.
pub fn to_pdf<T: Tabular + ?Sized>(table: &T, columns: &[String]) -> Result<Vec<u8>, ExportError> {
    let positions = columns
        .iter()
        .map(|column| {
            table
                .columns()
                .iter()
                .position(|candidate| candidate == column)
                .ok_or_else(|| ExportError::UnknownColumn(column.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let body: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| positions.iter().map(|&index| cell_text(&row[index])).collect())
        .collect();

    let layout = Layout::fit(columns, &body);
    let mut header = layout.render_row(columns);
    let rule_width =
        layout.widths.iter().sum::<usize>() + GAP_CHARS * layout.widths.len().saturating_sub(1);
    header.push("-".repeat(rule_width));

    let per_page = layout.lines_per_page().saturating_sub(header.len()).max(1);
    let pages = paginate(body.iter().map(|row| layout.render_row(row)), per_page);

    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page_lines in &pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), layout.font_size.into()]),
            Operation::new("TL", vec![layout.leading().into()]),
            Operation::new(
                "Td",
                vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN - layout.font_size).into()],
            ),
        ];
        for (index, line) in header.iter().chain(page_lines.iter()).enumerate() {
            if index > 0 {
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_latin1(line))],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let page_count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH as i64),
                Object::Integer(PAGE_HEIGHT as i64),
            ],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchHit, SearchResult};
    use serde_json::json;

    fn result(rows: usize) -> SearchResult {
        SearchResult {
            query: "jackets".to_string(),
            columns: vec!["headline".to_string(), "section".to_string(), "rank".to_string()],
            hits: (0..rows)
                .map(|index| SearchHit {
                    id: index.to_string(),
                    score: 1.0 / (index as f64 + 1.0),
                    values: vec![
                        json!(format!("Waterproof jacket review {index}")),
                        json!("outdoors"),
                        json!(index),
                    ],
                })
                .collect(),
        }
    }

    #[test]
    fn pdf_reopens_with_header_text() -> Result<(), Box<dyn std::error::Error>> {
        let table = result(3);
        let bytes = to_pdf(&table, &table.columns)?;

        let document = Document::load_mem(&bytes)?;
        assert_eq!(document.get_pages().len(), 1);
        let text = document.extract_text(&[1])?;
        assert!(text.contains("headline"));
        assert!(text.contains("Waterproof jacket review 2"));
        Ok(())
    }

    #[test]
    fn zero_rows_is_a_valid_one_page_document() -> Result<(), Box<dyn std::error::Error>> {
        let table = result(0);
        let bytes = to_pdf(&table, &table.columns)?;

        let document = Document::load_mem(&bytes)?;
        assert_eq!(document.get_pages().len(), 1);
        assert!(document.extract_text(&[1])?.contains("section"));
        Ok(())
    }

    fn all_text(document: &Document) -> Result<String, lopdf::Error> {
        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        document.extract_text(&pages)
    }

    #[test]
    fn long_results_paginate_and_keep_every_cell() -> Result<(), Box<dyn std::error::Error>> {
        let table = result(200);
        let bytes = to_pdf(&table, &table.columns)?;

        let document = Document::load_mem(&bytes)?;
        assert!(document.get_pages().len() > 1);

        let text = all_text(&document)?;
        for index in 0..200 {
            assert!(text.contains(&format!("Waterproof jacket review {index}")));
        }
        assert_eq!(text.matches("outdoors").count(), 200);
        Ok(())
    }

    #[test]
    fn row_taller_than_a_page_continues_on_the_next() -> Result<(), Box<dyn std::error::Error>> {
        let table = SearchResult {
            query: "long".to_string(),
            columns: vec!["id".to_string(), "body".to_string()],
            hits: vec![SearchHit {
                id: "1".to_string(),
                score: 1.0,
                values: vec![json!("row-1"), json!("x".repeat(20_000))],
            }],
        };

        let body = vec![vec!["row-1".to_string(), "x".repeat(20_000)]];
        let layout = Layout::fit(&table.columns, &body);
        let header_lines = layout.render_row(&table.columns).len() + 1;
        let per_page = layout.lines_per_page() - header_lines;
        let row_lines = layout.render_row(&body[0]).len();
        assert!(row_lines > per_page);

        let bytes = to_pdf(&table, &table.columns)?;
        let document = Document::load_mem(&bytes)?;
        assert_eq!(document.get_pages().len(), row_lines.div_ceil(per_page));

        let text = all_text(&document)?;
        assert_eq!(text.matches('x').count(), 20_000);
        for (_, page) in document.get_pages() {
            let content = document.get_and_decode_page_content(page)?;
            let lines = content
                .operations
                .iter()
                .filter(|operation| operation.operator == "Tj")
                .count();
            assert!(lines <= layout.lines_per_page());
        }
        Ok(())
    }

    #[test]
    fn paginate_never_overfills_a_page() {
        let rows = vec![
            vec!["a".to_string(); 3],
            vec!["b".to_string(); 12],
            vec!["c".to_string(); 2],
        ];
        let pages = paginate(rows, 5);

        assert!(pages.iter().all(|page| page.len() <= 5));
        assert_eq!(pages.iter().map(Vec::len).sum::<usize>(), 17);
        assert_eq!(pages[0], vec!["a"; 3]);
        assert_eq!(pages[1], vec!["b"; 5]);
        assert_eq!(pages[2], vec!["b"; 5]);
        assert_eq!(pages[3], vec!["b", "b", "c", "c"]);
        assert_eq!(pages.len(), 4);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let table = result(1);
        let outcome = to_pdf(&table, &["missing".to_string()]);
        assert!(matches!(outcome, Err(ExportError::UnknownColumn(column)) if column == "missing"));
    }

    #[test]
    fn output_is_deterministic() -> Result<(), ExportError> {
        let table = result(5);
        assert_eq!(to_pdf(&table, &table.columns)?, to_pdf(&table, &table.columns)?);
        Ok(())
    }

    #[test]
    fn wide_cells_wrap_instead_of_truncating() {
        let long = "x".repeat(500);
        let layout = Layout::fit(
            &["a".to_string(), "b".to_string()],
            &[vec![long.clone(), "short".to_string()]],
        );
        let lines = layout.render_row(&[long, "short".to_string()]);

        let printed: usize = lines.iter().map(|line| line.matches('x').count()).sum();
        assert_eq!(printed, 500);
        assert!(lines.len() > 1);
    }

    #[test]
    fn non_latin_text_degrades_to_question_marks() {
        assert_eq!(encode_latin1("café 東"), b"caf\xe9 ?".to_vec());
    }
}
