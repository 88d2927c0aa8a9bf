// ============================================================================
// cellwrite: batched row mutations for wide-column stores
// ============================================================================
//
// Logical mutations are encoded into wire entries (`mutation`), submitted
// through a pluggable transport (`transport`), and driven to a final
// outcome by the retry coordinator (`batch`), which resubmits only the
// entries that came back with a retryable status.

pub mod core;
pub mod mutation;
pub mod transport;
pub mod batch;
pub mod config;
pub mod table;

pub use crate::core::{CellValue, DecodedValue, MutateError, Result};
pub use mutation::{
    Cell, DecodeOptions, DeleteTarget, Method, Mutation, MutationData, RowData, TimeRange,
    Timestamp, WireEntry, WireOperation, convert_to_bytes, decode_value, parse_column_name,
};
pub use transport::{
    EntryStatus, InMemoryTransport, MutateRowsEvent, MutateRowsRequest, MutateRowsStream,
    MutateRowsTransport, ScriptedRound, Submission, status,
};
pub use batch::{Backoff, BatchMutator, FailedEntry, FailureCause, PartialFailureError};
pub use config::{MutatorConfig, RetryPolicy};
pub use table::Table;
