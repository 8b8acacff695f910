//! Cell value conversion utilities
//!
//! This module provides unified cell conversion with one strategy per
//! target format:
//! - Plain text conversion for delimited text (CSV)
//! - JSON value conversion with rich scalars in canonical text form
//! - Spreadsheet cell encoding ([`CellEncoder`]), which flattens timestamps,
//!   identifiers and nested values into scalars a worksheet can hold
//!
//! # Design
//!
//! The module uses a strategy pattern with a common trait `CellConverter`
//! so exporters can pick the conversion that matches their format.

mod converter;
mod helpers;
mod strategies;

pub use converter::CellConverter;
pub use helpers::{
    date_to_iso_string, naive_timestamp_to_display, naive_timestamp_to_iso_string,
    timestamp_to_display, timestamp_to_iso_string,
};
pub use strategies::{CellEncoder, JsonConverter, MAX_CELL_TEXT_LEN, PlainTextConverter};
