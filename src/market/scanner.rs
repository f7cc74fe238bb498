//! Targeted field extraction over raw API response text.
//!
//! Values are located by a marker substring and read from a fixed offset after the
//! marker's start up to the next comma. Nothing here parses JSON: the ticker API repeats
//! every quote field once per currency, and the occurrence that is read decides which
//! currency the number belongs to.

use thiserror::Error;

use crate::config::ExtractionMode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("marker {0} not found")]
    MarkerMissing(String),

    #[error("no comma terminates the value after marker {0}")]
    Unterminated(String),

    #[error("value window after marker {0} is out of bounds")]
    BadWindow(String),
}

/// Value of the first occurrence of `marker`, taken verbatim.
pub fn extract_direct<'a>(text: &'a str, marker: &str, offset: usize) -> Result<&'a str, ScanError> {
    let pos = find_marker(text, marker, 0)?;
    let (start, end) = value_window(text, marker, pos + offset)?;
    Ok(&text[start..end])
}

/// Value of the second occurrence of `marker`, which holds the converted quote.
pub fn extract_converted<'a>(
    text: &'a str,
    marker: &str,
    offset: usize,
) -> Result<&'a str, ScanError> {
    let first = find_marker(text, marker, 0)?;
    let second = find_marker(text, marker, first + marker.len())?;
    let (start, end) = value_window(text, marker, second + offset)?;
    Ok(&text[start..end])
}

fn find_marker(text: &str, marker: &str, from: usize) -> Result<usize, ScanError> {
    text.get(from..)
        .and_then(|rest| rest.find(marker))
        .map(|pos| pos + from)
        .ok_or_else(|| ScanError::MarkerMissing(marker.to_string()))
}

fn value_window(text: &str, marker: &str, start: usize) -> Result<(usize, usize), ScanError> {
    let rest = text
        .get(start..)
        .ok_or_else(|| ScanError::BadWindow(marker.to_string()))?;
    let len = rest
        .find(',')
        .ok_or_else(|| ScanError::Unterminated(marker.to_string()))?;
    Ok((start, start + len))
}

/// Scanner over one response buffer with a forward-only cursor.
///
/// Field lookups search from the cursor and leave it untouched; only [`FieldScanner::name`]
/// moves it, so each record's fields are read after that record's name and the next name
/// lookup lands on the following record.
#[derive(Debug, Clone)]
pub struct FieldScanner<'a> {
    text: &'a str,
    cursor: usize,
}

impl<'a> FieldScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.cursor..]
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.remaining().contains(marker)
    }

    pub fn direct(&self, marker: &str, offset: usize) -> Result<&'a str, ScanError> {
        extract_direct(self.remaining(), marker, offset)
    }

    pub fn converted(&self, marker: &str, offset: usize) -> Result<&'a str, ScanError> {
        extract_converted(self.remaining(), marker, offset)
    }

    pub fn extract(
        &self,
        marker: &str,
        offset: usize,
        mode: ExtractionMode,
    ) -> Result<&'a str, ScanError> {
        match mode {
            ExtractionMode::Direct => self.direct(marker, offset),
            ExtractionMode::Converted => self.converted(marker, offset),
        }
    }

    /// Reads a quoted value (the closing quote is dropped) and moves the cursor just past
    /// the value's first character.
    pub fn name(&mut self, marker: &str, offset: usize) -> Result<&'a str, ScanError> {
        let base = self.cursor;
        let rest = self.remaining();
        let pos = find_marker(rest, marker, 0)?;
        let (start, end) = value_window(rest, marker, pos + offset)?;
        if end <= start {
            return Err(ScanError::BadWindow(marker.to_string()));
        }
        let value = rest
            .get(start..end - 1)
            .ok_or_else(|| ScanError::BadWindow(marker.to_string()))?;
        let first_len = rest[start..].chars().next().map_or(1, char::len_utf8);
        self.cursor = base + start + first_len;
        Ok(value)
    }
}
