//! Translation of logical row mutations into wire entries.
//!
//! Everything here is pure: the same [`Mutation`] always encodes to the
//! same [`WireEntry`], so entries can be re-encoded or re-submitted on
//! any retry round without coordination.

pub mod bytes;
pub mod encode;
pub mod wire;

pub use bytes::{DecodeOptions, convert_to_bytes, decode_value};
pub use encode::{
    ColumnName, SERVER_ASSIGNED_TIMESTAMP, create_time_range, encode_delete, encode_insert,
    parse_column_name,
};
pub use wire::{TimestampRange, WireEntry, WireOperation};

use crate::core::{CellValue, MutateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Insert,
    Delete,
}

/// Cell time, either a calendar date or raw microseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timestamp {
    Date(DateTime<Utc>),
    Micros(i64),
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(date: DateTime<Utc>) -> Self {
        Self::Date(date)
    }
}

impl From<i64> for Timestamp {
    fn from(micros: i64) -> Self {
        Self::Micros(micros)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    pub timestamp: Option<Timestamp>,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            timestamp: None,
        }
    }

    pub fn at(value: impl Into<CellValue>, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            value: value.into(),
            timestamp: Some(timestamp.into()),
        }
    }
}

macro_rules! cell_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Cell {
                fn from(value: $ty) -> Self {
                    Cell::new(value)
                }
            }
        )*
    };
}

cell_from!(CellValue, i64, i32, &str, String, Vec<u8>, &[u8], bool);

/// Cells to write, keyed by family then qualifier.
///
/// Both levels are ordered maps so encoding order never depends on
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowData {
    families: BTreeMap<String, BTreeMap<String, Cell>>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(
        mut self,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        cell: impl Into<Cell>,
    ) -> Self {
        self.set(family, qualifier, cell);
        self
    }

    pub fn set(
        &mut self,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        cell: impl Into<Cell>,
    ) {
        self.families
            .entry(family.into())
            .or_default()
            .insert(qualifier.into(), cell.into());
    }

    pub fn families(&self) -> &BTreeMap<String, BTreeMap<String, Cell>> {
        &self.families
    }

    pub fn cell_count(&self) -> usize {
        self.families.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// A `"family"` or `"family:qualifier"` to delete, optionally limited
/// to a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTarget {
    pub column: String,
    pub time: Option<TimeRange>,
}

impl DeleteTarget {
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            time: None,
        }
    }

    pub fn within(mut self, time: TimeRange) -> Self {
        self.time = Some(time);
        self
    }
}

impl From<&str> for DeleteTarget {
    fn from(column: &str) -> Self {
        Self::column(column)
    }
}

impl From<String> for DeleteTarget {
    fn from(column: String) -> Self {
        Self::column(column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationData {
    Cells(RowData),
    /// `None` removes the entire row.
    Delete(Option<Vec<DeleteTarget>>),
}

/// A logical insert or delete against a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub key: CellValue,
    pub method: Method,
    pub data: MutationData,
}

impl Mutation {
    pub fn new(key: impl Into<CellValue>, method: Method, data: MutationData) -> Self {
        Self {
            key: key.into(),
            method,
            data,
        }
    }

    pub fn insert(key: impl Into<CellValue>, data: RowData) -> Self {
        Self::new(key, Method::Insert, MutationData::Cells(data))
    }

    pub fn delete_row(key: impl Into<CellValue>) -> Self {
        Self::new(key, Method::Delete, MutationData::Delete(None))
    }

    pub fn delete_cells<T: Into<DeleteTarget>>(
        key: impl Into<CellValue>,
        targets: impl IntoIterator<Item = T>,
    ) -> Self {
        let targets = targets.into_iter().map(Into::into).collect();
        Self::new(key, Method::Delete, MutationData::Delete(Some(targets)))
    }

    /// Encodes this mutation into the entry submitted to the backend.
    pub fn to_wire_entry(&self) -> Result<WireEntry> {
        let row_key = convert_to_bytes(&self.key)?;
        if row_key.is_empty() {
            return Err(MutateError::Encoding("Row key must not be empty".to_string()));
        }

        let mutations = match (self.method, &self.data) {
            (Method::Insert, MutationData::Cells(data)) => encode_insert(data)?,
            (Method::Delete, MutationData::Delete(targets)) => encode_delete(targets.as_deref())?,
            (method, _) => {
                return Err(MutateError::Encoding(format!(
                    "Mutation data for row '{}' does not match method {:?}",
                    self.key, method
                )));
            }
        };

        Ok(WireEntry { row_key, mutations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_round_trips_through_decode() {
        let mutation = Mutation::insert("gwashington", RowData::new().cell("follows", "gwashington", 1));
        let entry = mutation.to_wire_entry().unwrap();
        assert_eq!(entry.row_key, b"gwashington".to_vec());

        let WireOperation::SetCell { value, .. } = &entry.mutations[0] else {
            panic!("expected setCell");
        };
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, value);
        let decoded = decode_value(&encoded, DecodeOptions::default()).unwrap();
        assert_eq!(decoded.as_i64(), Some(1));
    }

    #[test]
    fn delete_row_encodes_single_operation() {
        let entry = Mutation::delete_row("alincoln").to_wire_entry().unwrap();
        assert_eq!(entry.mutations, vec![WireOperation::DeleteFromRow {}]);
    }

    #[test]
    fn integer_keys_encode_as_eight_bytes() {
        let entry = Mutation::delete_row(7i64).to_wire_entry().unwrap();
        assert_eq!(entry.row_key.len(), 8);
    }

    #[test]
    fn mismatched_method_and_data_is_an_encoding_error() {
        let mutation = Mutation::new("k", Method::Insert, MutationData::Delete(None));
        assert!(matches!(mutation.to_wire_entry(), Err(MutateError::Encoding(_))));
    }

    #[test]
    fn empty_or_null_keys_are_rejected() {
        assert!(Mutation::delete_row("").to_wire_entry().is_err());
        assert!(Mutation::delete_row(CellValue::Null).to_wire_entry().is_err());
    }

    #[test]
    fn wire_entry_serializes_with_wire_field_names() {
        let entry = Mutation::delete_cells("k", ["cf"]).to_wire_entry().unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["mutations"][0]["deleteFromFamily"]["familyName"], "cf");
        assert_eq!(json["rowKey"], "aw==");
    }

    #[test]
    fn wire_entry_serializes_bytes_as_base64_and_row_delete_as_object() {
        let json = serde_json::to_value(Mutation::delete_row("k").to_wire_entry().unwrap()).unwrap();
        assert!(json["mutations"][0]["deleteFromRow"].is_object());
        assert_eq!(json["rowKey"], "aw==");

        let insert = Mutation::insert("k", RowData::new().cell("cf", "q", "v"));
        let json = serde_json::to_value(insert.to_wire_entry().unwrap()).unwrap();
        let set_cell = &json["mutations"][0]["setCell"];
        assert_eq!(set_cell["columnQualifier"], "cQ==");
        assert_eq!(set_cell["value"], "dg==");
        assert_eq!(set_cell["timestampMicros"], -1);

        let delete = Mutation::delete_cells("k", ["cf:q"]);
        let json = serde_json::to_value(delete.to_wire_entry().unwrap()).unwrap();
        assert_eq!(json["mutations"][0]["deleteFromColumn"]["columnQualifier"], "cQ==");
    }
}
