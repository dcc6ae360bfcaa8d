//! Year/flag tables for the map animator.
//!
//! ```text
//! year,r1,r2,r3,r4,r5
//! 2020,Y,N,N,N,N
//! 2021,N,Y,N,N,N
//! ```
//!
//! The first row is a header and is skipped. Column 0 is the year, the
//! remaining columns are region flags in region order.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    pub year: i32,
    pub flags: Vec<bool>,
}

impl TableRow {
    pub fn new(year: i32, flags: Vec<bool>) -> Self {
        Self { year, flags }
    }

    /// Whether the `region`-th region (0-based) is drawn. Missing columns
    /// read as not drawn.
    pub fn is_shown(&self, region: usize) -> bool {
        self.flags.get(region).copied().unwrap_or(false)
    }
}

/// Only `Y` marks a region as shown; any other cell hides it.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "Y" | "y")
}

pub fn parse_table<R: Read>(reader: R) -> Result<Vec<TableRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let line = row_idx + 2;
        let record = result.with_context(|| format!("table row {}", line))?;

        let year = record
            .get(0)
            .ok_or_else(|| anyhow!("row {}: missing year", line))?
            .trim();
        let year: i32 = year
            .parse()
            .map_err(|e| anyhow!("row {}: bad year '{}': {}", line, year, e))?;

        let flags = record.iter().skip(1).map(parse_flag).collect();

        rows.push(TableRow { year, flags });
    }
    Ok(rows)
}

pub fn read_table(path: &Path) -> Result<Vec<TableRow>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("open table {}", path.display()))?;
    parse_table(std::io::BufReader::new(file))
        .with_context(|| format!("parse table {}", path.display()))
}
