use super::failure::{FailedEntry, FailureCause};
use crate::config::RetryPolicy;
use crate::mutation::{Mutation, WireEntry};
use crate::transport::{
    MutateRowsEvent, MutateRowsRequest, MutateRowsTransport, is_success_response, status,
};
use futures::StreamExt;
use tracing::{Level, event};

/// A mutation still awaiting a terminal outcome, tagged with its
/// position in the caller's list so results survive re-indexing.
#[derive(Debug, Clone)]
pub(crate) struct PendingEntry {
    pub original_index: usize,
    pub mutation: Mutation,
    pub wire: WireEntry,
    pub last_failure: Option<FailureCause>,
}

/// What one submission round reported.
#[derive(Debug)]
pub(crate) enum RoundOutcome {
    /// Per-entry codes by position in the round; `None` when the stream
    /// ended without reporting that entry.
    Completed(Vec<Option<i32>>),
    /// The round failed as a whole.
    Failed(FailureCause),
}

#[derive(Debug, Default)]
pub(crate) struct Reconciled {
    pub retry: Vec<PendingEntry>,
    pub failed: Vec<FailedEntry>,
    pub succeeded: usize,
}

/// Submits the pending entries as one request and drains the response.
///
/// The stream is consumed to its end, or dropped at the first error.
pub(crate) async fn submit_round(
    transport: &dyn MutateRowsTransport,
    table_name: &str,
    pending: &[PendingEntry],
    round: u32,
) -> RoundOutcome {
    let request = MutateRowsRequest {
        table_name: table_name.to_string(),
        entries: pending.iter().map(|entry| entry.wire.clone()).collect(),
    };

    let mut stream = match transport.mutate_rows(request).await {
        Ok(stream) => stream,
        Err(err) => {
            return RoundOutcome::Failed(FailureCause::Transport {
                message: err.to_string(),
            });
        }
    };

    let mut codes: Vec<Option<i32>> = vec![None; pending.len()];
    let mut rejected: Option<u16> = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(MutateRowsEvent::Response { code }) => {
                if !is_success_response(code) {
                    rejected = Some(code);
                }
            }
            Ok(MutateRowsEvent::Data(statuses)) => {
                for entry_status in statuses {
                    match codes.get_mut(entry_status.index) {
                        Some(slot) => *slot = Some(entry_status.code),
                        None => event!(
                            Level::WARN,
                            round,
                            index = entry_status.index,
                            submitted = pending.len(),
                            "status for an index outside the round ignored"
                        ),
                    }
                }
            }
            Err(err) => {
                return RoundOutcome::Failed(FailureCause::Transport {
                    message: err.to_string(),
                });
            }
        }
    }

    match rejected {
        Some(code) => RoundOutcome::Failed(FailureCause::Transport {
            message: format!("response code {}", code),
        }),
        None => RoundOutcome::Completed(codes),
    }
}

/// Splits a round's entries into successes, retries and permanent failures.
///
/// Retries keep their relative order.
pub(crate) fn reconcile(
    pending: Vec<PendingEntry>,
    outcome: RoundOutcome,
    policy: &RetryPolicy,
) -> Reconciled {
    let mut reconciled = Reconciled::default();

    let codes = match outcome {
        RoundOutcome::Completed(codes) => codes,
        RoundOutcome::Failed(cause) => {
            reconciled.retry = pending
                .into_iter()
                .map(|mut entry| {
                    entry.last_failure = Some(cause.clone());
                    entry
                })
                .collect();
            return reconciled;
        }
    };

    for (mut entry, code) in pending.into_iter().zip(codes) {
        match code {
            Some(status::OK) => reconciled.succeeded += 1,
            Some(code) if policy.is_retryable(code) => {
                entry.last_failure = Some(FailureCause::Status { code });
                reconciled.retry.push(entry);
            }
            Some(code) => reconciled.failed.push(FailedEntry {
                index: entry.original_index,
                entry: entry.mutation,
                cause: FailureCause::Status { code },
            }),
            None => {
                entry.last_failure = Some(FailureCause::MissingStatus);
                reconciled.retry.push(entry);
            }
        }
    }

    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::RowData;

    fn pending(keys: &[&str]) -> Vec<PendingEntry> {
        keys.iter()
            .enumerate()
            .map(|(index, key)| {
                let mutation = Mutation::insert(*key, RowData::new());
                PendingEntry {
                    original_index: index,
                    wire: mutation.to_wire_entry().unwrap(),
                    mutation,
                    last_failure: None,
                }
            })
            .collect()
    }

    fn retry_indexes(reconciled: &Reconciled) -> Vec<usize> {
        reconciled.retry.iter().map(|e| e.original_index).collect()
    }

    #[test]
    fn partitions_by_status_code() {
        let policy = RetryPolicy::default();
        let outcome = RoundOutcome::Completed(vec![
            Some(status::OK),
            Some(status::DEADLINE_EXCEEDED),
            Some(status::INVALID_ARGUMENT),
            Some(status::UNAVAILABLE),
        ]);

        let reconciled = reconcile(pending(&["a", "b", "c", "d"]), outcome, &policy);

        assert_eq!(reconciled.succeeded, 1);
        assert_eq!(retry_indexes(&reconciled), vec![1, 3]);
        assert_eq!(reconciled.failed.len(), 1);
        assert_eq!(reconciled.failed[0].index, 2);
        assert_eq!(
            reconciled.failed[0].cause,
            FailureCause::Status {
                code: status::INVALID_ARGUMENT
            }
        );
    }

    #[test]
    fn failed_round_retries_everything() {
        let policy = RetryPolicy::default();
        let cause = FailureCause::Transport {
            message: "response code 429".to_string(),
        };
        let reconciled = reconcile(
            pending(&["a", "b"]),
            RoundOutcome::Failed(cause.clone()),
            &policy,
        );

        assert_eq!(retry_indexes(&reconciled), vec![0, 1]);
        assert!(reconciled
            .retry
            .iter()
            .all(|entry| entry.last_failure.as_ref() == Some(&cause)));
    }

    #[test]
    fn entries_without_status_are_retried() {
        let policy = RetryPolicy::default();
        let reconciled = reconcile(
            pending(&["a", "b"]),
            RoundOutcome::Completed(vec![Some(status::OK), None]),
            &policy,
        );

        assert_eq!(retry_indexes(&reconciled), vec![1]);
        assert_eq!(
            reconciled.retry[0].last_failure,
            Some(FailureCause::MissingStatus)
        );
    }
}
