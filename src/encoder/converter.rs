//! Core converter trait for cell value conversion

use crate::query::CellValue;

/// Core trait for cell value conversion
///
/// This trait allows different conversion strategies to be implemented
/// for various output formats (string, JSON, spreadsheet cell, etc.)
pub trait CellConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a single cell
    ///
    /// # Arguments
    /// * `value` - Cell value to convert
    ///
    /// # Returns
    /// Converted value in the target format
    fn convert(&self, value: &CellValue) -> Self::Output;

    /// Convert every cell of a row, preserving order
    fn convert_row(&self, row: &[CellValue]) -> Vec<Self::Output> {
        row.iter().map(|value| self.convert(value)).collect()
    }
}
