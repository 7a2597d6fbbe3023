//! A1-notation helpers for the playground gate.
//!
//! Labeling convention:
//!   - Columns: A, B, C … Z, AA, AB … (base-26, A=1)
//!   - Rows:    1, 2, 3 …             (1-based)
//!
//! Host addresses may carry a sheet qualifier (`Sheet1!A1:D10`) and
//! absolute markers (`$A$1`); both are accepted and ignored.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{SheetPilotError, SheetPilotResult};

/// Last column of a worksheet (`XFD`).
pub const MAX_COLUMNS: u32 = 16_384;
/// Last row of a worksheet.
pub const MAX_ROWS: u32 = 1_048_576;

/// A single cell position. Both coordinates are 1-based.
/// Serialises as its A1 label so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

/// A rectangular block of cells, stored with `start` at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

// ── Column labels ─────────────────────────────────────────────────────────────

/// Convert column letters to a 1-based index: A→1, Z→26, AA→27, XFD→16384.
/// Returns `None` for empty input, non-letters or overflow.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Convert a 1-based column index back to letters: 1→A, 27→AA.
pub fn column_letters(mut index: u32) -> String {
    let mut out = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push(char::from(b'A' + rem as u8));
        index = (index - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Drop an optional `Sheet!` / `'My Sheet'!` qualifier.
fn strip_sheet(reference: &str) -> &str {
    match reference.rfind('!') {
        Some(idx) => &reference[idx + 1..],
        None => reference,
    }
}

// ── CellAddress ───────────────────────────────────────────────────────────────

impl CellAddress {
    pub fn new(col: u32, row: u32) -> Self {
        Self { row, col }
    }

    /// Parse `B2`, `$B$2`, `b2` or `Sheet1!B2`.
    pub fn parse(input: &str) -> SheetPilotResult<Self> {
        let bad = || SheetPilotError::InvalidAddress(input.to_string());
        let label: String = strip_sheet(input.trim())
            .chars()
            .filter(|c| *c != '$')
            .collect();

        let col_str: String = label.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let row_str: String = label.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
        if col_str.is_empty() || row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }

        let col = column_index(&col_str).ok_or_else(bad)?;
        let row = row_str.parse::<u32>().map_err(|_| bad())?;
        if row == 0 || row > MAX_ROWS || col > MAX_COLUMNS {
            return Err(bad());
        }
        Ok(Self { row, col })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl std::str::FromStr for CellAddress {
    type Err = SheetPilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<CellAddress> for String {
    fn from(addr: CellAddress) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for CellAddress {
    type Error = SheetPilotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

// ── CellRange ─────────────────────────────────────────────────────────────────

impl CellRange {
    /// Build a range from any two corners.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.col.min(b.col), a.row.min(b.row)),
            end: CellAddress::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Parse `A1:D10`, `D10:A1`, `Sheet1!$A$1:$D$10` or a single cell `B3`.
    pub fn parse(input: &str) -> SheetPilotResult<Self> {
        let body = strip_sheet(input.trim());
        if body.is_empty() {
            return Err(SheetPilotError::InvalidRange(input.to_string()));
        }
        let mut parts = body.split(':');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(SheetPilotError::InvalidRange(input.to_string()));
        }

        let a = CellAddress::parse(first)
            .map_err(|_| SheetPilotError::InvalidRange(input.to_string()))?;
        let b = match second {
            Some(s) => CellAddress::parse(s)
                .map_err(|_| SheetPilotError::InvalidRange(input.to_string()))?,
            None => a,
        };
        Ok(Self::new(a, b))
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.col >= self.start.col
            && addr.col <= self.end.col
            && addr.row >= self.start.row
            && addr.row <= self.end.row
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn col_count(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.row_count()) * u64::from(self.col_count())
    }

    /// Every address in the range, row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellAddress::new(col, row))
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl From<CellRange> for String {
    fn from(range: CellRange) -> Self {
        range.to_string()
    }
}

impl TryFrom<String> for CellRange {
    type Error = SheetPilotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// True iff `address` lies inside `playground`. Unparseable input on either
/// side is treated as "outside".
pub fn is_cell_in_range(address: &str, playground: &str) -> bool {
    if playground.trim().is_empty() {
        return false;
    }
    let Ok(range) = CellRange::parse(playground) else {
        return false;
    };
    let Ok(addr) = CellAddress::parse(address) else {
        return false;
    };
    range.contains(&addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_index_is_base26() {
        assert_eq!(column_index("A"), Some(1));
        assert_eq!(column_index("Z"), Some(26));
        assert_eq!(column_index("AA"), Some(27));
        assert_eq!(column_index("AZ"), Some(52));
        assert_eq!(column_index("XFD"), Some(16384));
        assert_eq!(column_index("a"), Some(1));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn column_letters_inverts_index() {
        for idx in [1, 26, 27, 52, 53, 702, 703, 16384] {
            assert_eq!(column_index(&column_letters(idx)), Some(idx));
        }
        assert_eq!(column_letters(28), "AB");
    }

    #[test]
    fn parse_address_variants() {
        assert_eq!(CellAddress::parse("B2").unwrap(), CellAddress::new(2, 2));
        assert_eq!(CellAddress::parse("$C$10").unwrap(), CellAddress::new(3, 10));
        assert_eq!(CellAddress::parse("Sheet1!D4").unwrap(), CellAddress::new(4, 4));
        assert_eq!(CellAddress::parse("'My Sheet'!aa1").unwrap(), CellAddress::new(27, 1));
        assert!(CellAddress::parse("B0").is_err());
        assert!(CellAddress::parse("12").is_err());
        assert!(CellAddress::parse("B").is_err());
        assert!(CellAddress::parse("B2x").is_err());
    }

    #[test]
    fn addresses_past_the_sheet_edge_are_rejected() {
        assert_eq!(CellAddress::parse("XFD1048576").unwrap(), CellAddress::new(MAX_COLUMNS, MAX_ROWS));
        assert!(CellAddress::parse("XFE1").is_err());
        assert!(CellAddress::parse("A1048577").is_err());
        assert!(CellRange::parse("A1:ZZZZZZ99999999").is_err());
        assert!(!is_cell_in_range("ZZZZZZ99999999", "A1:ZZZZZZ99999999"));

        let whole = CellRange::parse("A1:XFD1048576").unwrap();
        assert_eq!(whole.cell_count(), 17_179_869_184);
    }

    #[test]
    fn range_normalizes_corners() {
        let r = CellRange::parse("D10:A1").unwrap();
        assert_eq!(r.start, CellAddress::new(1, 1));
        assert_eq!(r.end, CellAddress::new(4, 10));
        assert_eq!(r.to_string(), "A1:D10");
        assert_eq!(r.row_count(), 10);
        assert_eq!(r.col_count(), 4);
    }

    #[test]
    fn single_cell_range_is_one_by_one() {
        let r = CellRange::parse("Sheet1!B3").unwrap();
        assert_eq!(r.cells().collect::<Vec<_>>(), vec![CellAddress::new(2, 3)]);
    }

    #[test]
    fn cells_iterate_row_major() {
        let r = CellRange::parse("B2:C3").unwrap();
        let labels: Vec<String> = r.cells().map(|a| a.to_string()).collect();
        assert_eq!(labels, vec!["B2", "C2", "B3", "C3"]);
    }

    #[test]
    fn membership_check() {
        assert!(is_cell_in_range("B2", "A1:D10"));
        assert!(is_cell_in_range("A1", "A1:D10"));
        assert!(is_cell_in_range("D10", "A1:D10"));
        assert!(is_cell_in_range("C5", "D10:A1"));
        assert!(is_cell_in_range("B2", "Sheet1!$A$1:$D$10"));
        assert!(!is_cell_in_range("E1", "A1:D10"));
        assert!(!is_cell_in_range("A11", "A1:D10"));
        assert!(!is_cell_in_range("B2", ""));
        assert!(!is_cell_in_range("nonsense", "A1:D10"));
        assert!(!is_cell_in_range("B2", "A1:D10:E5"));
    }

    #[test]
    fn address_serializes_as_label() {
        let json = serde_json::to_string(&CellAddress::new(28, 7)).unwrap();
        assert_eq!(json, "\"AB7\"");
        let back: CellAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellAddress::new(28, 7));
        assert!(serde_json::from_str::<CellAddress>("\"7AB\"").is_err());
    }
}
