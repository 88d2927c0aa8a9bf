use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

/// One row's worth of operations, in the shape the backend's bulk
/// mutate call expects. Byte fields serialize as base64 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntry {
    #[serde(serialize_with = "as_base64")]
    pub row_key: Vec<u8>,
    pub mutations: Vec<WireOperation>,
}

fn as_base64<T: AsRef<[u8]>, S: Serializer>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WireOperation {
    SetCell {
        family_name: String,
        #[serde(serialize_with = "as_base64")]
        column_qualifier: Vec<u8>,
        /// `-1` asks the server to assign its own time.
        timestamp_micros: i64,
        #[serde(serialize_with = "as_base64")]
        value: Vec<u8>,
    },
    DeleteFromColumn {
        family_name: String,
        #[serde(serialize_with = "as_base64")]
        column_qualifier: Vec<u8>,
        time_range: Option<TimestampRange>,
    },
    DeleteFromFamily {
        family_name: String,
    },
    DeleteFromRow {},
}

/// Half-open `[start, end)` range in microseconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp_micros: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp_micros: Option<i64>,
}

impl TimestampRange {
    pub fn contains(&self, micros: i64) -> bool {
        let after_start = self.start_timestamp_micros.is_none_or(|start| micros >= start);
        let before_end = self.end_timestamp_micros.is_none_or(|end| micros < end);
        after_start && before_end
    }
}
