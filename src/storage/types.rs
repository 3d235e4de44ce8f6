//! core type-safe wrappers for addressing the backing tabular service.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single row of raw cell values, in column order.
pub type RowValues = Vec<Value>;

/// A validated sheet name.
///
/// Sheet names end up inside A1 range strings, so the characters the
/// service reserves for range syntax are rejected up front.
///
/// Valid names:
/// - 1-100 characters
/// - Not blank
/// - None of `' ! [ ] * ? : / \`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetName(String);

impl SheetName {
    const FORBIDDEN: &'static [char] = &['\'', '!', '[', ']', '*', '?', ':', '/', '\\'];

    /// create a new SheetName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.trim().is_empty() {
            return Err(InvalidNameError::Empty);
        }

        let len = name.chars().count();
        if len > 100 {
            return Err(InvalidNameError::TooLong(len));
        }

        for (i, c) in name.chars().enumerate() {
            if Self::FORBIDDEN.contains(&c) || c.is_control() {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SheetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SheetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for invalid sheet names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}

/// A rectangular block of cells on one sheet.
///
/// Rows and columns are 1-based, matching the service's own addressing.
/// An open `end_row` / `end_col` extends to the last populated row / column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub sheet: SheetName,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: Option<usize>,
    pub end_col: Option<usize>,
}

impl CellRange {
    /// A single row, from `start_col` to the last populated column.
    pub fn row(sheet: SheetName, row: usize) -> Self {
        Self {
            sheet,
            start_row: row,
            start_col: 1,
            end_row: Some(row),
            end_col: None,
        }
    }

    /// Every row from `start_row` down.
    pub fn rows_from(sheet: SheetName, start_row: usize) -> Self {
        Self {
            sheet,
            start_row,
            start_col: 1,
            end_row: None,
            end_col: None,
        }
    }

    /// One column, from `start_row` down.
    pub fn column_from(sheet: SheetName, col: usize, start_row: usize) -> Self {
        Self {
            sheet,
            start_row,
            start_col: col,
            end_row: None,
            end_col: Some(col),
        }
    }

    /// One cell.
    pub fn cell(sheet: SheetName, row: usize, col: usize) -> Self {
        Self {
            sheet,
            start_row: row,
            start_col: col,
            end_row: Some(row),
            end_col: Some(col),
        }
    }

    /// Set the explicit end column.
    pub fn to_col(mut self, end_col: usize) -> Self {
        self.end_col = Some(end_col);
        self
    }

    /// Check the coordinates are 1-based and not inverted.
    pub fn is_valid(&self) -> bool {
        self.start_row >= 1
            && self.start_col >= 1
            && self.end_row.map_or(true, |r| r >= self.start_row)
            && self.end_col.map_or(true, |c| c >= self.start_col)
    }

    /// Render as an A1 reference, e.g. `'Applicants'!A2:F`.
    pub fn to_a1(&self) -> String {
        let start = format!("{}{}", column_letter(self.start_col), self.start_row);
        let end = match (self.end_col, self.end_row) {
            (Some(c), Some(r)) => format!(":{}{}", column_letter(c), r),
            (Some(c), None) => format!(":{}", column_letter(c)),
            (None, Some(r)) => format!(":{}", r),
            (None, None) => String::new(),
        };
        format!("'{}'!{}{}", self.sheet, start, end)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Convert a 1-based column number to its letter form (1 -> A, 27 -> AA).
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Cosmetic formatting applied to a range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFormat {
    pub bold: bool,
    /// freeze rows above and including the range's last row
    pub freeze_rows: bool,
}

impl CellFormat {
    /// The format used for header rows.
    pub fn header() -> Self {
        Self {
            bold: true,
            freeze_rows: true,
        }
    }
}
