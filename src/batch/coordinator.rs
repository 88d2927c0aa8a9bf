use super::backoff::Backoff;
use super::failure::{FailedEntry, FailureCause, PartialFailureError};
use super::round::{PendingEntry, RoundOutcome, reconcile, submit_round};
use crate::config::MutatorConfig;
use crate::core::Result;
use crate::mutation::Mutation;
use crate::transport::MutateRowsTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

/// Drives batches of mutations to a final outcome, resubmitting only
/// the entries that failed with a retryable status.
///
/// A mutator holds no per-call state, so one instance can serve any
/// number of concurrent calls.
pub struct BatchMutator {
    transport: Arc<dyn MutateRowsTransport>,
    config: MutatorConfig,
    backoff: Backoff,
}

/// Round bookkeeping for a single top-level call.
#[derive(Debug, Clone, Copy)]
struct RetryState {
    round: u32,
    max_retries: u32,
    started: Instant,
    last_round_at: Option<Instant>,
}

enum Phase {
    Submit,
    Wait(Duration),
    Done,
}

/// Everything one `mutate` call owns while it runs.
struct MutateCall<'a> {
    mutator: &'a BatchMutator,
    pending: Vec<PendingEntry>,
    failures: Vec<FailedEntry>,
    state: RetryState,
    total: usize,
}

impl BatchMutator {
    pub fn new(transport: Arc<dyn MutateRowsTransport>, config: MutatorConfig) -> Result<Self> {
        config.validate()?;
        let backoff = Backoff::from_policy(&config.retry, config.jitter_seed);
        Ok(Self {
            transport,
            config,
            backoff,
        })
    }

    pub fn config(&self) -> &MutatorConfig {
        &self.config
    }

    /// Applies `mutations` with the configured retry ceiling.
    pub async fn mutate(&self, mutations: Vec<Mutation>) -> Result<()> {
        self.mutate_with_retries(mutations, self.config.retry.max_retries)
            .await
    }

    /// Applies `mutations`, allowing at most `max_retries` rounds after the first.
    ///
    /// Resolves once every entry has either succeeded or failed for good.
    /// Encoding problems are reported before anything is submitted; every
    /// other failure is collected into a single
    /// [`PartialFailureError`](crate::MutateError::PartialFailure).
    pub async fn mutate_with_retries(&self, mutations: Vec<Mutation>, max_retries: u32) -> Result<()> {
        let span = info_span!(
            "cellwrite.mutate",
            call_id = %Uuid::new_v4(),
            table = %self.config.table_name,
            entries = mutations.len(),
            max_retries
        );
        self.run_call(mutations, max_retries).instrument(span).await
    }

    async fn run_call(&self, mutations: Vec<Mutation>, max_retries: u32) -> Result<()> {
        let pending = encode_pending(mutations)?;
        if pending.is_empty() {
            event!(Level::DEBUG, "empty batch, nothing to submit");
            return Ok(());
        }

        let call = MutateCall {
            mutator: self,
            total: pending.len(),
            pending,
            failures: Vec::new(),
            state: RetryState {
                round: 0,
                max_retries,
                started: Instant::now(),
                last_round_at: None,
            },
        };
        call.run().await
    }
}

fn encode_pending(mutations: Vec<Mutation>) -> Result<Vec<PendingEntry>> {
    mutations
        .into_iter()
        .enumerate()
        .map(|(original_index, mutation)| {
            Ok(PendingEntry {
                original_index,
                wire: mutation.to_wire_entry()?,
                mutation,
                last_failure: None,
            })
        })
        .collect()
}

impl MutateCall<'_> {
    async fn run(mut self) -> Result<()> {
        let mut phase = Phase::Submit;
        loop {
            phase = match phase {
                Phase::Submit => {
                    self.submit().await;
                    self.decide()
                }
                Phase::Wait(delay) => {
                    sleep(delay).await;
                    Phase::Submit
                }
                Phase::Done => break,
            };
        }
        self.finish()
    }

    async fn submit(&mut self) {
        let round = self.state.round;
        let submitted = self.pending.len();
        let since_previous_ms = self
            .state
            .last_round_at
            .map(|at| at.elapsed().as_millis() as u64);
        event!(
            Level::DEBUG,
            round,
            submitted,
            since_previous_ms,
            "submitting mutate round"
        );

        self.state.last_round_at = Some(Instant::now());
        let outcome = submit_round(
            self.mutator.transport.as_ref(),
            &self.mutator.config.table_name,
            &self.pending,
            round,
        )
        .await;

        if let RoundOutcome::Failed(cause) = &outcome {
            event!(Level::WARN, round, error = %cause, "mutate round failed as a whole");
        }

        let pending = std::mem::take(&mut self.pending);
        let reconciled = reconcile(pending, outcome, &self.mutator.config.retry);
        event!(
            Level::INFO,
            round,
            submitted,
            succeeded = reconciled.succeeded,
            retryable = reconciled.retry.len(),
            failed = reconciled.failed.len(),
            "mutate round reconciled"
        );

        self.failures.extend(reconciled.failed);
        self.pending = reconciled.retry;
    }

    fn decide(&mut self) -> Phase {
        if self.pending.is_empty() {
            return Phase::Done;
        }

        if self.state.round >= self.state.max_retries {
            let rounds = self.state.round + 1;
            self.fail_pending(|last| FailureCause::RetriesExhausted {
                rounds,
                last: Box::new(last),
            });
            return Phase::Done;
        }

        let next_round = self.state.round + 1;
        let delay = self.mutator.backoff.delay_for_round(next_round);

        if let Some(deadline) = self.mutator.config.retry.deadline() {
            let elapsed = self.state.started.elapsed();
            if elapsed + delay > deadline {
                let elapsed_ms = elapsed.as_millis() as u64;
                event!(
                    Level::WARN,
                    next_round,
                    elapsed_ms,
                    delay_ms = delay.as_millis() as u64,
                    "deadline reached before next mutate round"
                );
                self.fail_pending(|last| FailureCause::DeadlineExceeded {
                    elapsed_ms,
                    last: Box::new(last),
                });
                return Phase::Done;
            }
        }

        event!(
            Level::DEBUG,
            next_round,
            delay_ms = delay.as_millis() as u64,
            pending = self.pending.len(),
            "scheduling mutate retry"
        );
        self.state.round = next_round;
        Phase::Wait(delay)
    }

    fn fail_pending(&mut self, wrap: impl Fn(FailureCause) -> FailureCause) {
        for entry in std::mem::take(&mut self.pending) {
            let last = entry.last_failure.unwrap_or(FailureCause::MissingStatus);
            self.failures.push(FailedEntry {
                index: entry.original_index,
                entry: entry.mutation,
                cause: wrap(last),
            });
        }
    }

    fn finish(mut self) -> Result<()> {
        let rounds = self.state.round + 1;
        if self.failures.is_empty() {
            event!(Level::INFO, rounds, "mutate completed");
            return Ok(());
        }

        self.failures.sort_by_key(|failure| failure.index);
        event!(
            Level::WARN,
            rounds,
            failed = self.failures.len(),
            total = self.total,
            "mutate completed with partial failure"
        );
        Err(PartialFailureError {
            failures: self.failures,
            total: self.total,
            rounds,
        }
        .into())
    }
}
