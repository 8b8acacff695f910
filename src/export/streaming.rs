//! Pull-driven chunk production for streamed exports
//!
//! A [`ChunkSource`] produces the next chunk only when asked. The HTTP layer
//! adapts it into a body stream with [`into_byte_stream`], so each chunk is
//! generated when the transport polls for it. Dropping the stream (client
//! gone) drops the source and with it the cursor.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tracing::{debug, info};

use crate::error::Result;
use crate::query::RowCursor;

use super::writers::csv::CsvRecordEncoder;

/// Trait for producing a finite, single-pass sequence of byte chunks
#[async_trait]
pub trait ChunkSource: Send {
    /// Produce the next chunk
    ///
    /// # Returns
    /// * `Result<Option<Bytes>>` - Next chunk, or None at end of stream
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Streams a CSV header row followed by one chunk per cursor row
pub struct CsvChunkSource {
    encoder: CsvRecordEncoder,
    /// Header row, pending until the first pull
    headers: Option<Vec<String>>,
    cursor: Option<Box<dyn RowCursor>>,
    rows_sent: u64,
}

impl CsvChunkSource {
    /// Create a new CSV chunk source
    ///
    /// # Arguments
    /// * `headers` - Header strings for the first chunk
    /// * `cursor` - Live cursor; consumed exactly once
    /// * `delimiter` - Resolved delimiter byte
    pub fn new(headers: Vec<String>, cursor: Box<dyn RowCursor>, delimiter: u8) -> Self {
        Self {
            encoder: CsvRecordEncoder::new(delimiter),
            headers: Some(headers),
            cursor: Some(cursor),
            rows_sent: 0,
        }
    }
}

#[async_trait]
impl ChunkSource for CsvChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if let Some(headers) = self.headers.take() {
            return self.encoder.encode_header(&headers).map(Some);
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        match cursor.next_row().await {
            Ok(Some(row)) => {
                self.rows_sent += 1;
                self.encoder.encode_row(&row).map(Some)
            }
            Ok(None) => {
                if let Some(mut cursor) = self.cursor.take() {
                    cursor.close().await?;
                }
                info!("Streamed CSV export finished: {} rows", self.rows_sent);
                Ok(None)
            }
            Err(e) => {
                // Release the cursor; the stream cannot be resumed.
                self.cursor = None;
                Err(e)
            }
        }
    }
}

impl Drop for CsvChunkSource {
    fn drop(&mut self) {
        if self.cursor.is_some() {
            debug!(
                "CSV stream dropped after {} rows, releasing cursor",
                self.rows_sent
            );
            self.cursor = None;
        }
    }
}

/// Adapt a chunk source into a byte stream
///
/// Each poll of the returned stream pulls exactly one chunk. After an error
/// the stream ends.
pub fn into_byte_stream(
    source: Box<dyn ChunkSource>,
) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    futures::stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next_chunk().await {
            Ok(Some(chunk)) => Some((Ok(chunk), Some(source))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Drain a chunk source into one buffer
pub async fn collect_chunks(mut source: Box<dyn ChunkSource>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = source.next_chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}
