//! CSV exporters
//!
//! Both exporters share the delimiter rule in [`resolve_delimiter`] and the
//! record encoding in [`CsvRecordEncoder`], so a streamed export is
//! byte-identical to a materialized one apart from the leading BOM.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use csv::{Terminator, Writer, WriterBuilder};
use tracing::{debug, info};

use crate::encoder::{CellConverter, PlainTextConverter};
use crate::error::{ExportError, Result};
use crate::export::streaming::CsvChunkSource;
use crate::export::{ExportOptions, ExportOutput, Exporter, resolve_delimiter};
use crate::query::{CellValue, FetchMode, TabularResult};

use super::UTF8_BOM;

const CSV_CONTENT_TYPE: &str = "text/csv";
const CSV_EXTENSION: &str = ".csv";

/// Encodes one CSV record at a time
///
/// Fields containing the delimiter, a quote or a line break are quoted and
/// embedded quotes are doubled. Records end with `\r\n`.
pub struct CsvRecordEncoder {
    builder: WriterBuilder,
    converter: PlainTextConverter,
}

impl CsvRecordEncoder {
    /// Create a new record encoder
    ///
    /// # Arguments
    /// * `delimiter` - Field delimiter byte
    pub fn new(delimiter: u8) -> Self {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(delimiter)
            .terminator(Terminator::CRLF)
            .has_headers(false)
            .flexible(true)
            .buffer_capacity(1024);

        Self {
            builder,
            converter: PlainTextConverter::new(),
        }
    }

    /// CSV writer over `out` with this encoder's settings
    pub fn writer<W: io::Write>(&self, out: W) -> Writer<W> {
        self.builder.from_writer(out)
    }

    /// Write a data row through an existing writer
    pub fn write_row<W: io::Write>(&self, writer: &mut Writer<W>, row: &[CellValue]) -> Result<()> {
        writer.write_record(self.converter.convert_row(row))?;
        Ok(())
    }

    /// Encode the header record
    pub fn encode_header(&self, headers: &[String]) -> Result<Bytes> {
        let mut writer = self.writer(Vec::new());
        writer.write_record(headers)?;
        finish(writer).map(Bytes::from)
    }

    /// Encode a data row
    pub fn encode_row(&self, row: &[CellValue]) -> Result<Bytes> {
        let mut writer = self.writer(Vec::new());
        self.write_row(&mut writer, row)?;
        finish(writer).map(Bytes::from)
    }
}

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| ExportError::Encoding(format!("Failed to flush CSV output: {e}")))
}

/// Materialized CSV exporter
///
/// Writes a UTF-8 BOM, the header row and every data row into one buffer.
pub struct CsvExporter {
    default_delimiter: char,
}

impl CsvExporter {
    pub fn new(default_delimiter: char) -> Self {
        Self { default_delimiter }
    }
}

#[async_trait]
impl Exporter for CsvExporter {
    fn name(&self) -> &'static str {
        "CSV"
    }

    fn content_type(&self) -> &'static str {
        CSV_CONTENT_TYPE
    }

    fn file_extension(&self) -> &'static str {
        CSV_EXTENSION
    }

    async fn export(
        &self,
        mut result: TabularResult,
        options: &ExportOptions,
    ) -> Result<ExportOutput> {
        let delimiter = resolve_delimiter(options.delim.as_deref(), self.default_delimiter);
        result.fetch_all().await?;
        debug!(
            "Exporting {} rows to CSV (delimiter {:?})",
            result.data.len(),
            delimiter as char
        );

        let encoder = CsvRecordEncoder::new(delimiter);
        let mut buf = Vec::with_capacity(UTF8_BOM.len() + 64 * (result.data.len() + 1));
        buf.extend_from_slice(UTF8_BOM);

        let mut writer = encoder.writer(buf);
        writer.write_record(result.header_strings())?;
        for row in &result.data {
            encoder.write_row(&mut writer, row)?;
        }
        let buf = finish(writer)?;

        info!(
            "Exported {} rows to CSV ({} bytes)",
            result.data.len(),
            buf.len()
        );
        Ok(ExportOutput::Materialized(Bytes::from(buf)))
    }
}

/// Streaming CSV exporter
///
/// Reads the live cursor row by row and hands out one chunk per record; the
/// result is never held in memory as a whole. No BOM is written.
pub struct StreamingCsvExporter {
    default_delimiter: char,
}

impl StreamingCsvExporter {
    pub fn new(default_delimiter: char) -> Self {
        Self { default_delimiter }
    }
}

#[async_trait]
impl Exporter for StreamingCsvExporter {
    fn name(&self) -> &'static str {
        "Streaming CSV"
    }

    fn content_type(&self) -> &'static str {
        CSV_CONTENT_TYPE
    }

    fn file_extension(&self) -> &'static str {
        CSV_EXTENSION
    }

    fn fetch_mode(&self) -> FetchMode {
        FetchMode::Stream
    }

    async fn export(
        &self,
        mut result: TabularResult,
        options: &ExportOptions,
    ) -> Result<ExportOutput> {
        let delimiter = resolve_delimiter(options.delim.as_deref(), self.default_delimiter);
        let headers = result.header_strings();
        let cursor = result.take_cursor();

        debug!("Starting streamed CSV export of '{}'", options.title);
        Ok(ExportOutput::Streamed(Box::new(CsvChunkSource::new(
            headers, cursor, delimiter,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Row, VecCursor};
    use chrono::DateTime;
    use csv::ReaderBuilder;

    fn headers() -> Vec<Option<String>> {
        vec![Some("name".into()), Some("note".into()), None]
    }

    fn rows() -> Vec<Row> {
        vec![
            vec!["Alice".into(), "likes, commas".into(), CellValue::Int(1)],
            vec![
                "Bob".into(),
                "said \"hi\"\nthen left".into(),
                CellValue::Null,
            ],
            vec!["Carol;Dan".into(), "tab\there".into(), CellValue::Float(2.5)],
        ]
    }

    fn sample() -> TabularResult {
        TabularResult::materialized(headers(), rows())
    }

    async fn materialized_bytes(result: TabularResult, options: &ExportOptions) -> Bytes {
        CsvExporter::new(',')
            .export(result, options)
            .await
            .unwrap()
            .into_bytes()
            .await
            .unwrap()
    }

    fn read_back(bytes: &[u8], delimiter: u8) -> Vec<Vec<String>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_reader(bytes);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_csv_starts_with_bom_and_header() {
        let bytes = materialized_bytes(sample(), &ExportOptions::new()).await;
        assert!(bytes.starts_with(UTF8_BOM));
        let body = &bytes[UTF8_BOM.len()..];
        assert!(body.starts_with(b"name,note,\r\n"));
    }

    #[tokio::test]
    async fn test_csv_round_trip() {
        let bytes = materialized_bytes(sample(), &ExportOptions::new()).await;
        let records = read_back(&bytes[UTF8_BOM.len()..], b',');

        assert_eq!(records.len(), 4);
        assert_eq!(records[0], vec!["name", "note", ""]);
        assert_eq!(records[1], vec!["Alice", "likes, commas", "1"]);
        assert_eq!(records[2], vec!["Bob", "said \"hi\"\nthen left", ""]);
        assert_eq!(records[3], vec!["Carol;Dan", "tab\there", "2.5"]);
    }

    #[tokio::test]
    async fn test_csv_round_trip_with_tab_delimiter() {
        let options = ExportOptions::new().with_delimiter("tab");
        let bytes = materialized_bytes(sample(), &options).await;
        let body = &bytes[UTF8_BOM.len()..];
        assert!(body.starts_with(b"name\tnote\t\r\n"));

        let records = read_back(body, b'\t');
        assert_eq!(records[3], vec!["Carol;Dan", "tab\there", "2.5"]);
    }

    #[tokio::test]
    async fn test_csv_multi_char_delimiter_falls_back() {
        let options = ExportOptions::new().with_delimiter("abc");
        let bytes = materialized_bytes(sample(), &options).await;
        assert!(bytes[UTF8_BOM.len()..].starts_with(b"name,note,"));
    }

    #[tokio::test]
    async fn test_csv_quotes_embedded_quotes() {
        let result = TabularResult::materialized(
            vec![Some("q".into())],
            vec![vec!["Quote: \"test\"".into()]],
        );
        let bytes = materialized_bytes(result, &ExportOptions::new()).await;
        let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        assert_eq!(text, "q\r\n\"Quote: \"\"test\"\"\"\r\n");
    }

    #[tokio::test]
    async fn test_csv_renders_timestamps() {
        let ts = DateTime::parse_from_rfc3339("2024-03-04T05:06:07Z").unwrap();
        let result = TabularResult::materialized(
            vec![Some("at".into())],
            vec![vec![CellValue::Timestamp(ts)]],
        );
        let bytes = materialized_bytes(result, &ExportOptions::new()).await;
        assert!(bytes.ends_with(b"2024-03-04 05:06:07+00:00\r\n"));
    }

    #[tokio::test]
    async fn test_csv_materializes_cursor_results() {
        let result = TabularResult::streaming(headers(), Box::new(VecCursor::new(rows())));
        let bytes = materialized_bytes(result, &ExportOptions::new()).await;
        assert_eq!(bytes, materialized_bytes(sample(), &ExportOptions::new()).await);
    }

    #[tokio::test]
    async fn test_streaming_matches_materialized_without_bom() {
        for delim in [None, Some("tab"), Some(";"), Some("xyz")] {
            let mut options = ExportOptions::new();
            options.delim = delim.map(str::to_string);

            let materialized = materialized_bytes(sample(), &options).await;

            let cursor_result =
                TabularResult::streaming(headers(), Box::new(VecCursor::new(rows())));
            let output = StreamingCsvExporter::new(',')
                .export(cursor_result, &options)
                .await
                .unwrap();
            assert!(output.is_streamed());
            let streamed = output.into_bytes().await.unwrap();

            assert_eq!(&materialized[UTF8_BOM.len()..], &streamed[..]);
        }
    }

    #[tokio::test]
    async fn test_many_rows_materialized_matches_streamed() {
        let many: Vec<Row> = (0..5000)
            .map(|i| {
                vec![
                    CellValue::Int(i),
                    format!("row \"{i}\", with; separators").into(),
                    if i % 7 == 0 { CellValue::Null } else { CellValue::Float(i as f64 / 4.0) },
                ]
            })
            .collect();

        for delim in [None, Some(";")] {
            let mut options = ExportOptions::new();
            options.delim = delim.map(str::to_string);

            let materialized =
                materialized_bytes(TabularResult::materialized(headers(), many.clone()), &options)
                    .await;
            let streamed = StreamingCsvExporter::new(',')
                .export(
                    TabularResult::streaming(headers(), Box::new(VecCursor::new(many.clone()))),
                    &options,
                )
                .await
                .unwrap()
                .into_bytes()
                .await
                .unwrap();

            assert!(materialized.starts_with(UTF8_BOM));
            assert_eq!(&materialized[UTF8_BOM.len()..], &streamed[..]);
            assert_eq!(read_back(&streamed, delim.map_or(b',', |d| d.as_bytes()[0])).len(), 5001);
        }
    }

    #[tokio::test]
    async fn test_streaming_empty_result_is_header_only() {
        let result = TabularResult::streaming(headers(), Box::new(VecCursor::new(vec![])));
        let output = StreamingCsvExporter::new(',')
            .export(result, &ExportOptions::new())
            .await
            .unwrap();
        assert_eq!(output.into_bytes().await.unwrap(), "name,note,\r\n");
    }

    #[test]
    fn test_exporter_metadata() {
        let csv = CsvExporter::new(',');
        assert_eq!(csv.content_type(), "text/csv");
        assert_eq!(csv.file_extension(), ".csv");
        assert_eq!(csv.fetch_mode(), FetchMode::Materialize);
        assert_eq!(StreamingCsvExporter::new(',').fetch_mode(), FetchMode::Stream);
    }

    #[test]
    fn test_filename_has_no_path_separators() {
        let name = CsvExporter::new(',').filename("My Report/2024");
        assert!(name.ends_with(".csv"));
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
    }
}
