//! Forward-only row cursors
//!
//! A cursor hands out one row at a time without loading the whole result
//! into memory. It is consumed exactly once, in order.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;

use super::Row;

/// Trait for pulling rows one at a time from a live result set
#[async_trait]
pub trait RowCursor: Send {
    /// Fetch the next row
    ///
    /// # Returns
    /// * `Result<Option<Row>>` - Next row, or None if exhausted
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release the cursor and the resources behind it
    async fn close(&mut self) -> Result<()>;
}

/// Cursor over rows that are already in memory
pub struct VecCursor {
    rows: Option<std::vec::IntoIter<Row>>,
    fetched: u64,
    closed: bool,
}

impl VecCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Some(rows.into_iter()),
            fetched: 0,
            closed: false,
        }
    }
}

#[async_trait]
impl RowCursor for VecCursor {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }

        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        match rows.next() {
            Some(row) => {
                self.fetched += 1;
                Ok(Some(row))
            }
            None => {
                debug!("Cursor exhausted after {} rows", self.fetched);
                self.rows = None;
                self.closed = true;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.rows = None;
            self.closed = true;
            info!("Closed cursor after fetching {} rows", self.fetched);
        }
        Ok(())
    }
}

impl Drop for VecCursor {
    fn drop(&mut self) {
        if !self.closed {
            debug!("VecCursor dropped without explicit close");
            self.rows = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CellValue;

    #[tokio::test]
    async fn test_vec_cursor_is_single_pass() {
        let mut cursor = VecCursor::new(vec![vec![CellValue::Int(1)]]);
        assert!(cursor.next_row().await.unwrap().is_some());
        assert!(cursor.next_row().await.unwrap().is_none());
        assert!(cursor.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_cursor_yields_nothing() {
        let mut cursor = VecCursor::new(vec![vec![CellValue::Int(1)], vec![CellValue::Int(2)]]);
        cursor.close().await.unwrap();
        assert!(cursor.next_row().await.unwrap().is_none());
    }
}
