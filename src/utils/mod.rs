//! Utility functions and helpers for query-export
//!
//! This module provides common utility functions used throughout the application:
//! - Filename and sheet-name sanitizing
//! - File system helpers
//! - Conversion utilities

use std::path::PathBuf;

pub use string::{get_valid_filename, slugify};

/// String utilities
pub mod string {
    /// Filename used when a title sanitizes to nothing
    pub const FALLBACK_FILENAME: &str = "export";

    /// Turn a query title into a safe download filename stem
    ///
    /// Leading and trailing whitespace is removed, inner spaces become
    /// underscores, and anything other than alphanumerics, `-`, `_` and `.`
    /// is dropped. The result never contains a path separator.
    ///
    /// # Arguments
    /// * `title` - Query title
    ///
    /// # Returns
    /// * `String` - Filename stem, `export` when nothing usable is left
    pub fn get_valid_filename(title: &str) -> String {
        let cleaned: String = title
            .trim()
            .chars()
            .map(|c| if c == ' ' { '_' } else { c })
            .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();

        match cleaned.as_str() {
            "" | "." | ".." => FALLBACK_FILENAME.to_string(),
            _ => cleaned,
        }
    }

    /// Convert text to a lowercase ASCII slug
    ///
    /// Non-ASCII characters are dropped, as is anything other than
    /// alphanumerics, underscores, hyphens and whitespace. Runs of hyphens
    /// and whitespace collapse to one hyphen; leading and trailing hyphens
    /// and underscores are stripped.
    ///
    /// # Arguments
    /// * `s` - Text to slugify
    ///
    /// # Returns
    /// * `String` - Slug, possibly empty
    pub fn slugify(s: &str) -> String {
        let mut slug = String::with_capacity(s.len());
        let mut pending_sep = false;

        for c in s.chars().filter(char::is_ascii) {
            let c = c.to_ascii_lowercase();
            if c == '-' || c.is_ascii_whitespace() {
                pending_sep = true;
            } else if c.is_ascii_alphanumeric() || c == '_' {
                if pending_sep {
                    slug.push('-');
                    pending_sep = false;
                }
                slug.push(c);
            }
        }

        if pending_sep {
            slug.push('-');
        }

        slug.trim_matches(|c| c == '-' || c == '_').to_string()
    }
}

/// File system utilities
pub mod fs {
    use super::*;

    /// Expand home directory in path
    ///
    /// # Arguments
    /// * `path` - Path potentially starting with ~
    ///
    /// # Returns
    /// * `PathBuf` - Expanded path
    pub fn expand_home(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }
}

/// Conversion utilities
pub mod convert {
    /// Format bytes as human-readable size
    ///
    /// # Arguments
    /// * `bytes` - Number of bytes
    ///
    /// # Returns
    /// * `String` - Formatted size (e.g., "1.5 MB")
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
