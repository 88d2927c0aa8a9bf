use super::{
    EntryStatus, MutateRowsEvent, MutateRowsRequest, MutateRowsStream, MutateRowsTransport,
    RESPONSE_OK, status,
};
use crate::core::{MutateError, Result};
use crate::mutation::{SERVER_ASSIGNED_TIMESTAMP, WireEntry, WireOperation};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// A canned reply for one submission round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRound {
    /// Emit `code` as the top-level response, then one status per entry
    /// when `entry_codes` is present, then end.
    Respond {
        code: u16,
        entry_codes: Option<Vec<i32>>,
    },
    /// Emit a healthy response and the given statuses, then fail the stream.
    FailMidStream {
        entry_codes: Vec<i32>,
        message: String,
    },
    /// Fail before any stream is produced.
    ConnectFailure(String),
}

impl ScriptedRound {
    pub fn entry_codes(codes: impl Into<Vec<i32>>) -> Self {
        Self::Respond {
            code: RESPONSE_OK,
            entry_codes: Some(codes.into()),
        }
    }

    pub fn response_code(code: u16) -> Self {
        Self::Respond {
            code,
            entry_codes: None,
        }
    }

    pub fn fail_mid_stream(codes: impl Into<Vec<i32>>, message: impl Into<String>) -> Self {
        Self::FailMidStream {
            entry_codes: codes.into(),
            message: message.into(),
        }
    }

    pub fn connect_failure(message: impl Into<String>) -> Self {
        Self::ConnectFailure(message.into())
    }
}

/// What the transport saw for one round.
#[derive(Debug, Clone)]
pub struct Submission {
    pub table_name: String,
    pub row_keys: Vec<Vec<u8>>,
    pub at: Instant,
}

impl Submission {
    pub fn keys_lossy(&self) -> Vec<String> {
        self.row_keys
            .iter()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .collect()
    }
}

type Versions = BTreeMap<i64, Vec<u8>>;
type StoredRow = BTreeMap<String, BTreeMap<Vec<u8>, Versions>>;

#[derive(Default)]
struct InMemoryState {
    script: VecDeque<ScriptedRound>,
    submissions: Vec<Submission>,
    tables: HashMap<String, BTreeMap<Vec<u8>, StoredRow>>,
    last_server_micros: i64,
    max_statuses_per_event: Option<usize>,
}

impl InMemoryState {
    fn server_micros(&mut self) -> i64 {
        let now = Utc::now().timestamp_micros();
        self.last_server_micros = now.max(self.last_server_micros + 1);
        self.last_server_micros
    }

    fn apply_entry(&mut self, table_name: &str, entry: &WireEntry) {
        let mut timestamps = Vec::with_capacity(entry.mutations.len());
        for operation in &entry.mutations {
            timestamps.push(match operation {
                WireOperation::SetCell {
                    timestamp_micros, ..
                } if *timestamp_micros == SERVER_ASSIGNED_TIMESTAMP => self.server_micros(),
                WireOperation::SetCell {
                    timestamp_micros, ..
                } => *timestamp_micros,
                _ => 0,
            });
        }

        let table = self.tables.entry(table_name.to_string()).or_default();
        for (operation, timestamp) in entry.mutations.iter().zip(timestamps) {
            match operation {
                WireOperation::SetCell {
                    family_name,
                    column_qualifier,
                    value,
                    ..
                } => {
                    table
                        .entry(entry.row_key.clone())
                        .or_default()
                        .entry(family_name.clone())
                        .or_default()
                        .entry(column_qualifier.clone())
                        .or_default()
                        .insert(timestamp, value.clone());
                }
                WireOperation::DeleteFromColumn {
                    family_name,
                    column_qualifier,
                    time_range,
                } => {
                    let Some(columns) = table
                        .get_mut(&entry.row_key)
                        .and_then(|row| row.get_mut(family_name))
                    else {
                        continue;
                    };
                    match time_range {
                        Some(range) => {
                            if let Some(versions) = columns.get_mut(column_qualifier) {
                                versions.retain(|micros, _| !range.contains(*micros));
                                if versions.is_empty() {
                                    columns.remove(column_qualifier);
                                }
                            }
                        }
                        None => {
                            columns.remove(column_qualifier);
                        }
                    }
                }
                WireOperation::DeleteFromFamily { family_name } => {
                    if let Some(row) = table.get_mut(&entry.row_key) {
                        row.remove(family_name);
                    }
                }
                WireOperation::DeleteFromRow {} => {
                    table.remove(&entry.row_key);
                }
            }
        }

        if table.get(&entry.row_key).is_some_and(|row| {
            row.values().all(|columns| columns.is_empty())
        }) {
            table.remove(&entry.row_key);
        }
    }

    fn data_events(&self, statuses: Vec<EntryStatus>) -> Vec<Result<MutateRowsEvent>> {
        if statuses.is_empty() {
            return Vec::new();
        }
        let chunk = self.max_statuses_per_event.unwrap_or(statuses.len()).max(1);
        statuses
            .chunks(chunk)
            .map(|chunk| Ok(MutateRowsEvent::Data(chunk.to_vec())))
            .collect()
    }
}

/// A transport backed by an in-process wide-column store.
///
/// Rounds are answered from the script while it lasts; once it is
/// exhausted every entry is applied and reported as successful. Entries
/// that a scripted round marks `0` are applied too, so the store always
/// reflects what a real backend would have persisted.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        let transport = Self::default();
        if let Ok(mut state) = transport.state.lock() {
            state.script.extend(rounds);
        }
        transport
    }

    /// Splits per-entry statuses across several data events.
    pub fn with_max_statuses_per_event(self, max: usize) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.max_statuses_per_event = Some(max);
        }
        self
    }

    pub fn push_round(&self, round: ScriptedRound) -> Result<()> {
        self.state.lock()?.script.push_back(round);
        Ok(())
    }

    pub fn submissions(&self) -> Result<Vec<Submission>> {
        Ok(self.state.lock()?.submissions.clone())
    }

    /// Row keys of every submitted round, as text.
    pub fn submitted_keys(&self) -> Result<Vec<Vec<String>>> {
        Ok(self
            .state
            .lock()?
            .submissions
            .iter()
            .map(Submission::keys_lossy)
            .collect())
    }

    /// Latest version of a cell, if any.
    pub fn read_cell(
        &self,
        table_name: &str,
        row_key: &[u8],
        family: &str,
        qualifier: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock()?;
        Ok(state
            .tables
            .get(table_name)
            .and_then(|table| table.get(row_key))
            .and_then(|row| row.get(family))
            .and_then(|columns| columns.get(qualifier))
            .and_then(|versions| versions.values().next_back().cloned()))
    }

    /// Latest version of a cell, base64 encoded the way read responses carry it.
    pub fn read_cell_encoded(
        &self,
        table_name: &str,
        row_key: &[u8],
        family: &str,
        qualifier: &[u8],
    ) -> Result<Option<String>> {
        Ok(self
            .read_cell(table_name, row_key, family, qualifier)?
            .map(|value| STANDARD.encode(value)))
    }

    pub fn cell_versions(
        &self,
        table_name: &str,
        row_key: &[u8],
        family: &str,
        qualifier: &[u8],
    ) -> Result<usize> {
        let state = self.state.lock()?;
        Ok(state
            .tables
            .get(table_name)
            .and_then(|table| table.get(row_key))
            .and_then(|row| row.get(family))
            .and_then(|columns| columns.get(qualifier))
            .map_or(0, BTreeMap::len))
    }

    pub fn row_exists(&self, table_name: &str, row_key: &[u8]) -> Result<bool> {
        let state = self.state.lock()?;
        Ok(state
            .tables
            .get(table_name)
            .is_some_and(|table| table.contains_key(row_key)))
    }
}

#[async_trait]
impl MutateRowsTransport for InMemoryTransport {
    async fn mutate_rows(&self, request: MutateRowsRequest) -> Result<MutateRowsStream> {
        let mut state = self.state.lock()?;
        state.submissions.push(Submission {
            table_name: request.table_name.clone(),
            row_keys: request.entries.iter().map(|e| e.row_key.clone()).collect(),
            at: Instant::now(),
        });
        let round = state.submissions.len();

        let scripted = state.script.pop_front();
        debug!(
            "in-memory mutate_rows round {} on '{}' with {} entries (scripted: {})",
            round,
            request.table_name,
            request.entries.len(),
            scripted.is_some()
        );

        let (response_code, entry_codes, failure) = match scripted {
            None => (
                RESPONSE_OK,
                Some(vec![status::OK; request.entries.len()]),
                None,
            ),
            Some(ScriptedRound::Respond { code, entry_codes }) => (code, entry_codes, None),
            Some(ScriptedRound::FailMidStream {
                entry_codes,
                message,
            }) => (RESPONSE_OK, Some(entry_codes), Some(message)),
            Some(ScriptedRound::ConnectFailure(message)) => {
                warn!("in-memory mutate_rows round {} refused: {}", round, message);
                return Err(MutateError::Transport(message));
            }
        };

        let codes = entry_codes.unwrap_or_default();
        if codes.len() > request.entries.len() {
            warn!(
                "in-memory mutate_rows round {} scripted {} statuses for {} entries",
                round,
                codes.len(),
                request.entries.len()
            );
        }

        for (entry, code) in request.entries.iter().zip(&codes) {
            if *code == status::OK {
                state.apply_entry(&request.table_name, entry);
            }
        }

        let statuses = codes
            .iter()
            .enumerate()
            .map(|(index, code)| EntryStatus { index, code: *code })
            .collect();

        let mut events = vec![Ok(MutateRowsEvent::Response {
            code: response_code,
        })];
        events.extend(state.data_events(statuses));
        if let Some(message) = failure {
            events.push(Err(MutateError::Transport(message)));
        }

        Ok(stream::iter(events).boxed())
    }
}
