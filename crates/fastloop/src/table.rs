//! src/table.rs
//!
//! In-memory indexed tables: the input rows a run reads its payloads
//! from and the output columns it writes results into.
//!
//! Both tables are addressed by job index. The coordinator is the only
//! writer of an `OutputTable` and writes each index exactly once, in
//! whatever order results arrive; the table enforces the exactly-once
//! part so a bookkeeping bug cannot silently drop or duplicate a row.

use crate::record::Record;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// An input table that stores all payload rows in contiguous memory
/// with atomic reference counting (`Arc<[P]>`).
///
/// Cloning only bumps the `Arc` counter, so the table can be captured by
/// the payload source closure of a run at zero cost. `get` clones the
/// row out so the payload can cross a worker channel by move.
#[derive(Debug, Clone)]
pub struct InputTable<P> {
    rows: Arc<[P]>,
}

impl<P: Clone> InputTable<P> {
    /// Creates a new input table from a vector of payload rows.
    pub fn new(rows: Vec<P>) -> Self {
        Self { rows: rows.into() }
    }

    /// Random-access payload lookup by job index. O(1).
    pub fn get(&self, index: usize) -> Result<P> {
        self.rows
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("Input row {} out of bounds (table has {})", index, self.rows.len()))
    }

    /// Returns the total number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Checks if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An output table of named f64 columns plus a status column,
/// pre-allocated to the batch size before the run starts.
///
/// Each completed result writes one row: every field of its `Record`
/// lands in the matching column at the result's index, together with
/// the status tag. Unwritten cells hold NaN.
#[derive(Debug)]
pub struct OutputTable {
    rows: usize,
    columns: HashMap<String, Vec<f64>>,
    status: Vec<String>,
    written: Vec<bool>,
}

/// Serialized form of a finished table.
#[derive(Serialize)]
struct TableExport<'a> {
    rows: usize,
    columns: &'a HashMap<String, Vec<f64>>,
    status: &'a [String],
}

impl OutputTable {
    /// Creates a table with `rows` NaN-filled entries per named column.
    pub fn new<S: Into<String>>(rows: usize, columns: impl IntoIterator<Item = S>) -> Self {
        let columns = columns
            .into_iter()
            .map(|name| (name.into(), vec![f64::NAN; rows]))
            .collect();
        Self {
            rows,
            columns,
            status: vec![String::new(); rows],
            written: vec![false; rows],
        }
    }

    /// Writes the result for one job index. O(1) per field.
    ///
    /// Writes may arrive in any order, but each index takes exactly one:
    /// a second write to the same index is an error, as is a field name
    /// with no matching column.
    pub fn put(&mut self, index: usize, record: &Record, status: &str) -> Result<()> {
        if index >= self.rows {
            return Err(anyhow!(
                "Result index {} out of bounds (table has {} rows)",
                index,
                self.rows
            ));
        }
        if self.written[index] {
            return Err(anyhow!("Result for index {} written twice", index));
        }
        for (name, &value) in &record.fields {
            let column = self
                .columns
                .get_mut(name)
                .ok_or_else(|| anyhow!("No output column named {:?}", name))?;
            column[index] = value;
        }
        self.status[index] = status.to_owned();
        self.written[index] = true;
        Ok(())
    }

    /// Returns the number of rows the table was allocated for.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Checks if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of rows written so far.
    pub fn written(&self) -> usize {
        self.written.iter().filter(|&&w| w).count()
    }

    /// True once every row has been written.
    pub fn is_complete(&self) -> bool {
        self.written.iter().all(|&w| w)
    }

    /// Returns a column by name.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("No output column named {:?}", name))
    }

    /// Returns the status tag written for `index`, if any.
    pub fn status(&self, index: usize) -> Option<&str> {
        if index < self.rows && self.written[index] {
            Some(self.status[index].as_str())
        } else {
            None
        }
    }

    /// Serializes the table (columns and statuses) as JSON.
    ///
    /// This is the flush hook callers invoke after a run; it makes no
    /// durability promises beyond what the writer provides.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let export = TableExport {
            rows: self.rows,
            columns: &self.columns,
            status: &self.status,
        };
        serde_json::to_writer(writer, &export)?;
        Ok(())
    }
}
