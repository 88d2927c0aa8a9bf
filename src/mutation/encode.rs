use super::bytes::convert_to_bytes;
use super::wire::{TimestampRange, WireOperation};
use super::{DeleteTarget, RowData, Timestamp};
use crate::core::{CellValue, MutateError, Result};
use chrono::{DateTime, Utc};

/// Timestamp sent when the server should assign the cell time itself.
pub const SERVER_ASSIGNED_TIMESTAMP: i64 = -1;

/// A `family[:qualifier]` column reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnName {
    pub family: String,
    pub qualifier: Option<String>,
}

/// Splits a column reference on the first `:`.
///
/// An empty qualifier (`"follows:"`) is treated as no qualifier.
pub fn parse_column_name(column: &str) -> ColumnName {
    match column.split_once(':') {
        Some((family, qualifier)) if !qualifier.is_empty() => ColumnName {
            family: family.to_string(),
            qualifier: Some(qualifier.to_string()),
        },
        Some((family, _)) => ColumnName {
            family: family.to_string(),
            qualifier: None,
        },
        None => ColumnName {
            family: column.to_string(),
            qualifier: None,
        },
    }
}

/// Builds a `[start, end)` range from calendar dates.
pub fn create_time_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<TimestampRange> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(MutateError::Encoding(format!(
                "Time range start {} is after end {}",
                start, end
            )));
        }
    }

    Ok(TimestampRange {
        start_timestamp_micros: start.map(date_to_micros),
        end_timestamp_micros: end.map(date_to_micros),
    })
}

/// Calendar dates carry millisecond granularity on the wire.
pub(crate) fn date_to_micros(date: DateTime<Utc>) -> i64 {
    date.timestamp_millis().saturating_mul(1000)
}

fn timestamp_micros(timestamp: Option<&Timestamp>) -> i64 {
    let micros = match timestamp {
        Some(Timestamp::Date(date)) => date_to_micros(*date),
        Some(Timestamp::Micros(micros)) => *micros,
        None => 0,
    };
    if micros == 0 {
        SERVER_ASSIGNED_TIMESTAMP
    } else {
        micros
    }
}

/// Produces one `SetCell` per family/qualifier pair, families first,
/// each in sorted order.
pub fn encode_insert(data: &RowData) -> Result<Vec<WireOperation>> {
    let mut operations = Vec::with_capacity(data.cell_count());

    for (family_name, columns) in data.families() {
        if family_name.is_empty() {
            return Err(MutateError::Encoding(
                "Column family name must not be empty".to_string(),
            ));
        }

        for (qualifier, cell) in columns {
            operations.push(WireOperation::SetCell {
                family_name: family_name.clone(),
                column_qualifier: convert_to_bytes(&CellValue::Text(qualifier.clone()))?,
                timestamp_micros: timestamp_micros(cell.timestamp.as_ref()),
                value: convert_to_bytes(&cell.value)?,
            });
        }
    }

    Ok(operations)
}

/// Encodes delete targets; `None` deletes the whole row.
pub fn encode_delete(targets: Option<&[DeleteTarget]>) -> Result<Vec<WireOperation>> {
    let Some(targets) = targets else {
        return Ok(vec![WireOperation::DeleteFromRow {}]);
    };

    if targets.is_empty() {
        return Err(MutateError::Encoding(
            "Delete mutation must name at least one column or family".to_string(),
        ));
    }

    targets.iter().map(encode_delete_target).collect()
}

fn encode_delete_target(target: &DeleteTarget) -> Result<WireOperation> {
    let column = parse_column_name(&target.column);
    if column.family.is_empty() {
        return Err(MutateError::Encoding(format!(
            "Delete target '{}' has no column family",
            target.column
        )));
    }

    let Some(qualifier) = column.qualifier else {
        return Ok(WireOperation::DeleteFromFamily {
            family_name: column.family,
        });
    };

    let time_range = match &target.time {
        Some(range) => Some(create_time_range(range.start, range.end)?),
        None => None,
    };

    Ok(WireOperation::DeleteFromColumn {
        family_name: column.family,
        column_qualifier: convert_to_bytes(&CellValue::Text(qualifier))?,
        time_range,
    })
}
