use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `Record` struct holds the named output fields produced for a
/// single job.
///
/// It contains a mapping from field names (e.g., `"bg_amp"`,
/// `"photon_offset"`) to their scalar values.
///
/// Internally, the `fields` map stores:
/// - **Keys** (`String`): Field names
/// - **Values** (`f64`): The value computed for each field
///
/// # Examples:
/// - For an echo computation: `{"value": 42.0}`
/// - For a histogram fit: `{"bg_amp": 983.2, "bg_offset": 3.1, ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fields: HashMap<String, f64>,
}

impl Record {
    /// Creates a new `Record` from a full field map.
    pub fn new(fields: HashMap<String, f64>) -> Self {
        Self { fields }
    }

    /// Creates a `Record` from a single `(field_name, value)` pair.
    ///
    /// Convenience constructor for computations with one output field.
    /// Accepts both `&str` and `String` for the field name via
    /// `Into<String>`. Chain with [`with_field`](Self::with_field) to
    /// add more fields.
    pub fn from_single(name: impl Into<String>, value: f64) -> Self {
        Self {
            fields: HashMap::from([(name.into(), value)]),
        }
    }

    /// Adds or overwrites a field in the `Record`.
    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Returns the value of a field by name.
    pub fn get(&self, field: &str) -> Result<f64> {
        self.fields
            .get(field)
            .copied()
            .ok_or_else(|| anyhow!("Field {} not found", field))
    }

    /// Returns an iterator over all field names in this `Record`.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
