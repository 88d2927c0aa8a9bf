//! The submission capability the batch coordinator consumes.
//!
//! A transport takes one round's wire entries and hands back a stream
//! of events: an optional top-level response code, any number of
//! per-entry status batches, then the end of the stream. An `Err` item
//! ends the round abnormally.

pub mod memory;

pub use memory::{InMemoryTransport, ScriptedRound, Submission};

use crate::core::Result;
use crate::mutation::WireEntry;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Per-entry status codes reported by the backend.
pub mod status {
    pub const OK: i32 = 0;
    pub const CANCELLED: i32 = 1;
    pub const INVALID_ARGUMENT: i32 = 3;
    pub const DEADLINE_EXCEEDED: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
    pub const PERMISSION_DENIED: i32 = 7;
    pub const RESOURCE_EXHAUSTED: i32 = 8;
    pub const FAILED_PRECONDITION: i32 = 9;
    pub const ABORTED: i32 = 10;
    pub const INTERNAL: i32 = 13;
    pub const UNAVAILABLE: i32 = 14;
}

/// Top-level response code of a healthy round.
pub const RESPONSE_OK: u16 = 200;

/// Whether a top-level response code lets the round's entry statuses stand.
pub fn is_success_response(code: u16) -> bool {
    (200..300).contains(&code)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateRowsRequest {
    pub table_name: String,
    pub entries: Vec<WireEntry>,
}

/// Outcome of one submitted entry. `index` is the entry's position in
/// the round's request, not in the caller's original list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStatus {
    pub index: usize,
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutateRowsEvent {
    Response { code: u16 },
    Data(Vec<EntryStatus>),
}

pub type MutateRowsStream = BoxStream<'static, Result<MutateRowsEvent>>;

#[async_trait]
pub trait MutateRowsTransport: Send + Sync {
    /// Submits one round. An `Err` here is a connection-level failure.
    async fn mutate_rows(&self, request: MutateRowsRequest) -> Result<MutateRowsStream>;
}

#[async_trait]
impl<T: MutateRowsTransport + ?Sized> MutateRowsTransport for Arc<T> {
    async fn mutate_rows(&self, request: MutateRowsRequest) -> Result<MutateRowsStream> {
        (**self).mutate_rows(request).await
    }
}
