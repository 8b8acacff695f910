//! Spreadsheet exporter
//!
//! Writes a single-sheet `.xlsx` workbook: bold headers in row 0, data from
//! row 1. Each cell goes through [`CellEncoder`] first, since the writer has
//! no native representation for timestamps with offsets, UUIDs or nested
//! values. Rows and columns beyond the worksheet limits are left out.

use async_trait::async_trait;
use bytes::Bytes;
use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet};
use tracing::{debug, info, warn};

use crate::encoder::{CellConverter, CellEncoder};
use crate::error::{ExportError, Result};
use crate::export::{ExportOptions, ExportOutput, Exporter};
use crate::query::{CellValue, TabularResult};
use crate::utils::slugify;

/// Longest sheet name the workbook format accepts
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Rows in a worksheet, header included
pub const MAX_ROWS: usize = 1_048_576;

/// Columns in a worksheet
pub const MAX_COLS: usize = 16_384;

/// Materialized spreadsheet exporter
pub struct ExcelExporter {
    encoder: CellEncoder,
}

impl ExcelExporter {
    pub fn new() -> Self {
        Self {
            encoder: CellEncoder::new(),
        }
    }

    /// Worksheet name for a query title
    ///
    /// The title is slugified (which drops every character a sheet name may
    /// not contain) and cut to [`MAX_SHEET_NAME_LEN`] characters.
    pub fn sheet_name(title: &str) -> String {
        slugify(title).chars().take(MAX_SHEET_NAME_LEN).collect()
    }

    /// Number of data rows that fit below the header row
    pub fn writable_rows(total: usize) -> usize {
        total.min(MAX_ROWS - 1)
    }

    fn write_cell(
        &self,
        sheet: &mut Worksheet,
        row: RowNum,
        col: ColNum,
        value: &CellValue,
    ) -> Result<()> {
        match value {
            CellValue::Null => {}
            CellValue::Bool(b) => {
                sheet.write_boolean(row, col, *b)?;
            }
            CellValue::Int(n) => {
                sheet.write_number(row, col, *n as f64)?;
            }
            CellValue::Float(f) if f.is_finite() => {
                sheet.write_number(row, col, *f)?;
            }
            CellValue::Float(f) => {
                sheet.write_string(row, col, f.to_string())?;
            }
            CellValue::Decimal(d) => match d.parse::<f64>() {
                Ok(n) if n.is_finite() => {
                    sheet.write_number(row, col, n)?;
                }
                _ => {
                    sheet.write_string(row, col, self.encoder.fit_text(d.clone()))?;
                }
            },
            CellValue::Text(s) => {
                sheet.write_string(row, col, s.as_str())?;
            }
            other => {
                return Err(ExportError::Encoding(format!(
                    "unsupported spreadsheet cell at ({row}, {col}): {other:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExcelExporter {
    fn default() -> Self {
        Self::new()
    }
}

fn row_index(idx: usize) -> Result<RowNum> {
    RowNum::try_from(idx).map_err(|_| ExportError::Encoding(format!("row {idx} out of range")))
}

fn col_index(idx: usize) -> Result<ColNum> {
    ColNum::try_from(idx).map_err(|_| ExportError::Encoding(format!("column {idx} out of range")))
}

#[async_trait]
impl Exporter for ExcelExporter {
    fn name(&self) -> &'static str {
        "Excel"
    }

    fn content_type(&self) -> &'static str {
        "application/vnd.ms-excel"
    }

    fn file_extension(&self) -> &'static str {
        ".xlsx"
    }

    async fn export(&self, mut result: TabularResult, options: &ExportOptions) -> Result<ExportOutput> {
        result.fetch_all().await?;

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let name = Self::sheet_name(&options.title);
        debug!(
            "Exporting {} rows to spreadsheet, sheet {:?}",
            result.data.len(),
            name
        );

        let rows = Self::writable_rows(result.data.len());
        if rows < result.data.len() {
            warn!(
                "Spreadsheet holds {} data rows, dropping {}",
                rows,
                result.data.len() - rows
            );
        }
        if result.headers.len() > MAX_COLS {
            warn!(
                "Spreadsheet holds {} columns, dropping {}",
                MAX_COLS,
                result.headers.len() - MAX_COLS
            );
        }

        {
            let sheet = workbook.add_worksheet();
            if !name.is_empty() {
                sheet.set_name(&name)?;
            }

            for (col, header) in result.header_strings().into_iter().take(MAX_COLS).enumerate() {
                let header = self.encoder.fit_text(header);
                sheet.write_string_with_format(0, col_index(col)?, header, &header_format)?;
            }

            for (idx, data_row) in result.data.iter().take(rows).enumerate() {
                let row = row_index(idx + 1)?;
                for (col, value) in data_row.iter().take(MAX_COLS).enumerate() {
                    let encoded = self.encoder.convert(value);
                    self.write_cell(sheet, row, col_index(col)?, &encoded)?;
                }
            }
        }

        let buf = workbook.save_to_buffer()?;
        info!(
            "Exported {} rows to spreadsheet ({} bytes)",
            rows,
            buf.len()
        );
        Ok(ExportOutput::Materialized(Bytes::from(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MAX_CELL_TEXT_LEN;
    use chrono::DateTime;
    use serde_json::json;
    use std::io::{Cursor, Read};
    use uuid::Uuid;
    use zip::ZipArchive;

    fn every_cell_type() -> TabularResult {
        TabularResult::materialized(
            vec![
                Some("null".into()),
                Some("bool".into()),
                Some("int".into()),
                Some("float".into()),
                Some("nan".into()),
                Some("decimal".into()),
                Some("text".into()),
                Some("ts".into()),
                Some("uuid".into()),
                Some("nested".into()),
                None,
            ],
            vec![vec![
                CellValue::Null,
                CellValue::Bool(true),
                CellValue::Int(7),
                CellValue::Float(1.25),
                CellValue::Float(f64::NAN),
                CellValue::Decimal("9.99".into()),
                CellValue::Text("hello".into()),
                CellValue::Timestamp(DateTime::parse_from_rfc3339("2024-01-02T03:04:05+05:30").unwrap()),
                CellValue::Uuid(Uuid::nil()),
                CellValue::Json(json!({"a": [1, 2]})),
                CellValue::Json(json!("scalar")),
            ]],
        )
    }

    async fn export_bytes(result: TabularResult, title: &str) -> Bytes {
        let options = ExportOptions::new().with_title(title);
        ExcelExporter::new()
            .export(result, &options)
            .await
            .unwrap()
            .into_bytes()
            .await
            .unwrap()
    }

    /// Read one XML part out of the workbook package
    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut xml = String::new();
        part.read_to_string(&mut xml).unwrap();
        xml
    }

    fn unescape(s: &str) -> String {
        s.replace("&quot;", "\"")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    }

    /// Shared string table, in index order
    fn shared_strings(bytes: &[u8]) -> Vec<String> {
        let xml = read_part(bytes, "xl/sharedStrings.xml");
        xml.split("<si>")
            .skip(1)
            .map(|si| {
                let open = si.find("<t").unwrap();
                let start = open + si[open..].find('>').unwrap() + 1;
                let end = si.find("</t>").unwrap();
                unescape(&si[start..end])
            })
            .collect()
    }

    /// Worksheet cell XML by reference, e.g. `B2`
    fn cell<'a>(sheet: &'a str, reference: &str) -> Option<&'a str> {
        let start = sheet.find(&format!("<c r=\"{reference}\""))?;
        let rest = &sheet[start..];
        let end = rest.find("</c>")? + "</c>".len();
        Some(&rest[..end])
    }

    fn cell_value<'a>(cell: &'a str) -> &'a str {
        let start = cell.find("<v>").unwrap() + "<v>".len();
        let end = cell.find("</v>").unwrap();
        &cell[start..end]
    }

    /// Text of a shared-string cell
    fn cell_text(sheet: &str, strings: &[String], reference: &str) -> String {
        let xml = cell(sheet, reference).unwrap();
        assert!(xml.contains("t=\"s\""), "{reference} is not a string cell: {xml}");
        strings[cell_value(xml).parse::<usize>().unwrap()].clone()
    }

    #[test]
    fn test_sheet_name_truncated_and_clean() {
        let title = "Quarterly revenue: [EMEA] / APAC * by region? 2024 edition";
        let name = ExcelExporter::sheet_name(title);
        assert!(name.chars().count() <= MAX_SHEET_NAME_LEN);
        for bad in ['[', ']', ':', '*', '?', '/', '\\'] {
            assert!(!name.contains(bad), "{name} contains {bad}");
        }
        assert!(name.starts_with("quarterly-revenue-emea-apac"));
    }

    #[test]
    fn test_sheet_name_short_title() {
        assert_eq!(ExcelExporter::sheet_name("My Query"), "my-query");
    }

    #[tokio::test]
    async fn test_workbook_sheet_name_written() {
        let bytes = export_bytes(every_cell_type(), "Every cell type").await;
        assert!(bytes.starts_with(b"PK"));

        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains("<sheet name=\"every-cell-type\""), "{workbook}");
    }

    #[tokio::test]
    async fn test_long_title_sheet_name_written_truncated() {
        let title = "Quarterly revenue: [EMEA] / APAC * by region? 2024 edition";
        let bytes = export_bytes(every_cell_type(), title).await;
        let workbook = read_part(&bytes, "xl/workbook.xml");
        let expected = ExcelExporter::sheet_name(title);
        assert_eq!(expected.chars().count(), MAX_SHEET_NAME_LEN);
        assert!(workbook.contains(&format!("<sheet name=\"{expected}\"")), "{workbook}");
    }

    #[tokio::test]
    async fn test_header_row_is_bold_and_matches_headers() {
        let result = every_cell_type();
        let headers = result.header_strings();
        let bytes = export_bytes(result, "Every cell type").await;
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        let strings = shared_strings(&bytes);

        for (col, expected) in headers.iter().enumerate().take(10) {
            let reference = format!("{}1", (b'A' + col as u8) as char);
            assert_eq!(&cell_text(&sheet, &strings, &reference), expected);
            assert!(cell(&sheet, &reference).unwrap().contains("s=\"1\""));
        }
        assert!(read_part(&bytes, "xl/styles.xml").contains("<b/>"));
    }

    #[tokio::test]
    async fn test_data_row_starts_below_header_with_encoded_cells() {
        let bytes = export_bytes(every_cell_type(), "Every cell type").await;
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        let strings = shared_strings(&bytes);

        // Null cells are left empty.
        assert!(cell(&sheet, "A2").is_none());
        let boolean = cell(&sheet, "B2").unwrap();
        assert!(boolean.contains("t=\"b\""));
        assert_eq!(cell_value(boolean), "1");
        assert_eq!(cell_value(cell(&sheet, "C2").unwrap()), "7");
        assert_eq!(cell_value(cell(&sheet, "D2").unwrap()), "1.25");
        assert_eq!(cell_text(&sheet, &strings, "E2"), "NaN");
        assert_eq!(cell_value(cell(&sheet, "F2").unwrap()), "9.99");
        assert_eq!(cell_text(&sheet, &strings, "G2"), "hello");
        assert_eq!(cell_text(&sheet, &strings, "H2"), "2024-01-02 03:04:05+05:30");
        assert_eq!(
            cell_text(&sheet, &strings, "I2"),
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(cell_text(&sheet, &strings, "J2"), r#"{"a":[1,2]}"#);
        assert_eq!(cell_text(&sheet, &strings, "K2"), "scalar");
        assert!(cell(&sheet, "A3").is_none());
    }

    #[tokio::test]
    async fn test_oversized_text_is_truncated_not_rejected() {
        let result = TabularResult::materialized(
            vec![Some("big".into()), Some("blob".into()), Some("h".repeat(40_000))],
            vec![vec![
                CellValue::Text("x".repeat(40_000)),
                CellValue::Json(json!({ "payload": "y".repeat(40_000) })),
                CellValue::Int(1),
            ]],
        );
        let bytes = export_bytes(result, "Big").await;
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        let strings = shared_strings(&bytes);

        assert_eq!(cell_text(&sheet, &strings, "C1").chars().count(), MAX_CELL_TEXT_LEN);
        assert_eq!(cell_text(&sheet, &strings, "A2"), "x".repeat(MAX_CELL_TEXT_LEN));
        let nested = cell_text(&sheet, &strings, "B2");
        assert_eq!(nested.chars().count(), MAX_CELL_TEXT_LEN);
        assert!(nested.starts_with(r#"{"payload":"yyy"#));
    }

    #[test]
    fn test_writable_rows_capped_below_header() {
        assert_eq!(ExcelExporter::writable_rows(0), 0);
        assert_eq!(ExcelExporter::writable_rows(10), 10);
        assert_eq!(ExcelExporter::writable_rows(MAX_ROWS - 1), MAX_ROWS - 1);
        assert_eq!(ExcelExporter::writable_rows(MAX_ROWS + 500), MAX_ROWS - 1);
    }

    #[tokio::test]
    async fn test_xlsx_with_long_hostile_title() {
        let options = ExportOptions::new().with_title("a/b\\c?d*e[f]g:h".repeat(10));
        let result = TabularResult::materialized(vec![Some("x".into())], vec![vec![CellValue::Int(1)]]);
        assert!(ExcelExporter::new().export(result, &options).await.is_ok());
    }

    #[tokio::test]
    async fn test_xlsx_with_empty_title_uses_default_sheet() {
        let result = TabularResult::materialized(vec![Some("x".into())], vec![]);
        let bytes = export_bytes(result, "!!!").await;
        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains("<sheet name=\"Sheet1\""), "{workbook}");
    }

    #[test]
    fn test_exporter_metadata() {
        let exporter = ExcelExporter::new();
        assert_eq!(exporter.content_type(), "application/vnd.ms-excel");
        assert_eq!(exporter.filename("Sales Q1"), "Sales_Q1.xlsx");
    }
}
