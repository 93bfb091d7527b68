//! Scan Coordinator - the relayer control loop
//!
//! Owns the cursor and the state machine. One cycle at a time: height,
//! window, logs, decode, dispatch, commit.

use crate::algorithms::{compute_window, EventDecoder, WindowDecision};
use crate::config::RelayerConfig;
use crate::domain::{
    invariant_cursor_monotonic, invariant_window_confirmed, Alert, BlockHeight, BridgeEvent,
    DeadLetter, DeadLetterReason, DispatchOutcome, EventKey, RecoveryBreaker, RecoveryEvent,
    RecoveryState, RelayerResult, ScanState, ScanWindow,
};
use crate::ports::inbound::{CycleOutcome, ScanApi};
use crate::ports::outbound::{
    AlertSink, CursorStore, DeadLetterSink, DispatchTransport, LedgerClient,
};
use crate::service::{Dispatcher, LedgerReader};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How [`ScanCoordinator::run`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    /// Shutdown signal observed.
    Terminated,
    /// Recovery budget exhausted.
    Faulted,
}

/// Dead-letter collected during processing, recorded only on commit.
struct PendingDeadLetter {
    key: EventKey,
    reason: DeadLetterReason,
    detail: String,
}

/// The scan coordinator.
pub struct ScanCoordinator<L, T, C, D>
where
    L: LedgerClient,
    T: DispatchTransport,
    C: CursorStore,
    D: DeadLetterSink,
{
    config: RelayerConfig,
    reader: LedgerReader<L>,
    decoder: EventDecoder,
    dispatcher: Dispatcher<T>,
    cursor_store: Arc<C>,
    dead_letters: Arc<D>,
    alerts: Option<Arc<dyn AlertSink>>,
    cursor: BlockHeight,
    state: ScanState,
    breaker: RecoveryBreaker,
    /// Dead-letters already written for the window being committed.
    recorded_letters: HashSet<EventKey>,
}

impl<L, T, C, D> ScanCoordinator<L, T, C, D>
where
    L: LedgerClient + 'static,
    T: DispatchTransport + 'static,
    C: CursorStore + 'static,
    D: DeadLetterSink + 'static,
{
    /// Validate `config`, build the components and determine the starting
    /// cursor: the persisted one, or `head - start_offset` on first run.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal; there is no cursor to recover from.
    pub async fn bootstrap(
        config: RelayerConfig,
        ledger: Arc<L>,
        transport: Arc<T>,
        cursor_store: Arc<C>,
        dead_letters: Arc<D>,
    ) -> RelayerResult<Self> {
        config.validate()?;

        let decoder = EventDecoder::new(config.event_schema.clone(), config.contract_address)?;
        let reader = LedgerReader::new(ledger, config.retry, config.rpc_timeout);
        let dispatcher = Dispatcher::new(
            transport,
            config.retry,
            config.dispatch_timeout,
            config.event_type.clone(),
        );

        let cursor = match cursor_store.load_cursor()? {
            Some(cursor) => {
                info!("[cursor] resuming from persisted cursor {}", cursor);
                cursor
            }
            None => {
                let head = reader.current_height().await?;
                let cursor = head.saturating_sub(config.start_offset);
                info!(
                    "[cursor] no persisted cursor, starting {} block(s) behind head {} at {}",
                    config.start_offset, head, cursor
                );
                cursor
            }
        };

        info!(
            "[scan] watching {} on {} (topic0 {}, depth {})",
            decoder.schema().signature(),
            crate::domain::to_hex(&config.contract_address),
            crate::domain::to_hex(&decoder.topic0()),
            config.confirmation_depth
        );

        let breaker = RecoveryBreaker::new(config.max_cycle_retries);
        Ok(Self {
            config,
            reader,
            decoder,
            dispatcher,
            cursor_store,
            dead_letters,
            alerts: None,
            cursor,
            state: ScanState::Idle,
            breaker,
            recorded_letters: HashSet::new(),
        })
    }

    /// [`Self::bootstrap`], abandoned as soon as `shutdown` fires.
    ///
    /// A first run queries the head with retry and backoff; a signal during
    /// that wait yields `Ok(None)` instead of waiting the retries out.
    ///
    /// # Errors
    ///
    /// As [`Self::bootstrap`].
    pub async fn bootstrap_with_shutdown(
        config: RelayerConfig,
        ledger: Arc<L>,
        transport: Arc<T>,
        cursor_store: Arc<C>,
        dead_letters: Arc<D>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RelayerResult<Option<Self>> {
        tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => {
                info!("[scan] shutdown requested before the starting cursor was known");
                Ok(None)
            }
            result = Self::bootstrap(config, ledger, transport, cursor_store, dead_letters) => {
                result.map(Some)
            }
        }
    }

    /// Raise operator alerts through `alerts`.
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Recovery breaker state.
    pub fn recovery_state(&self) -> RecoveryState {
        self.breaker.state()
    }

    /// Run cycles until shutdown or fault.
    ///
    /// The shutdown signal is observed around every cycle and during every
    /// sleep. A dropped sender counts as shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunExit {
        info!("[scan] loop started at cursor {}", self.cursor);

        loop {
            if *shutdown.borrow() {
                return self.terminate();
            }

            let cycle_id = Uuid::new_v4();
            let span = info_span!("cycle", id = %cycle_id, cursor = self.cursor);

            let result = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => None,
                result = self.run_cycle().instrument(span) => Some(result),
            };
            let Some(result) = result else {
                return self.terminate();
            };

            let delay = match result {
                Ok(outcome) if outcome.is_stalled() => self.record_failure(),
                Err(e) => {
                    error!("[scan] cycle failed at cursor {}: {}", self.cursor, e);
                    self.record_failure()
                }
                Ok(outcome) => {
                    if self.breaker.attempt() > 0 {
                        info!(
                            "[scan] recovered after {} failed cycle(s)",
                            self.breaker.consecutive_failures()
                        );
                    }
                    self.breaker.process_event(RecoveryEvent::CycleSucceeded);
                    match outcome {
                        CycleOutcome::Committed { capped: true, .. } => Some(Duration::ZERO),
                        _ => Some(self.config.poll_interval),
                    }
                }
            };

            let Some(delay) = delay else {
                self.state = ScanState::Faulted;
                return RunExit::Faulted;
            };

            if !delay.is_zero() {
                let interrupted = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if interrupted {
                    return self.terminate();
                }
            }
            self.state = ScanState::Idle;
        }
    }

    /// Feed a failed cycle to the breaker. Returns the retry delay, or
    /// `None` once the breaker opens.
    fn record_failure(&mut self) -> Option<Duration> {
        self.breaker.process_event(RecoveryEvent::CycleFailed);
        if self.breaker.is_faulted() {
            error!(
                "[scan] faulted after {} consecutive failed cycle(s) ({} total) at cursor {}",
                self.breaker.consecutive_failures(),
                self.breaker.total_failures(),
                self.cursor
            );
            self.raise(Alert::critical(format!(
                "relayer faulted at cursor {} after {} consecutive failed cycle(s); \
                 restart required",
                self.cursor,
                self.breaker.consecutive_failures()
            )));
            return None;
        }

        let attempt = self.breaker.attempt();
        let delay = self.config.retry.delay_for_attempt(attempt);
        warn!(
            "[scan] recovery attempt {}/{} in {:?}",
            attempt, self.config.max_cycle_retries, delay
        );
        Some(delay)
    }

    fn raise(&self, alert: Alert) {
        if let Some(alerts) = &self.alerts {
            alerts.raise(&alert);
        }
    }

    fn terminate(&mut self) -> RunExit {
        info!("[scan] shutdown requested, stopping at cursor {}", self.cursor);
        self.state = ScanState::Terminated;
        RunExit::Terminated
    }

    fn transition(&mut self, next: ScanState) {
        debug!("[scan] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn execute_cycle(&mut self) -> RelayerResult<CycleOutcome> {
        self.transition(ScanState::DeterminingWindow);
        let head = self.reader.current_height().await?;
        let depth = self.config.confirmation_depth;

        let (window, capped) = match compute_window(
            self.cursor,
            head,
            depth,
            self.config.max_blocks_per_window,
        ) {
            WindowDecision::NoNewBlocks { confirmed_head } => {
                info!(
                    "[scan] no new confirmed blocks (head {}, confirmed {}, cursor {})",
                    head, confirmed_head, self.cursor
                );
                self.transition(ScanState::Waiting);
                return Ok(CycleOutcome::NoNewBlocks {
                    head,
                    cursor: self.cursor,
                });
            }
            WindowDecision::Scan { window, capped } => (window, capped),
        };
        invariant_window_confirmed(window.to_block, head, depth)?;

        self.transition(ScanState::FetchingLogs);
        let records = self
            .reader
            .logs_in_range(window, self.config.contract_address, self.decoder.topic0())
            .await
            .map_err(|e| {
                error!("[scan] log fetch failed for window {}: {}", window, e);
                e
            })?;

        self.transition(ScanState::ProcessingEvents);
        let mut pending_letters = Vec::new();
        let mut events = Vec::with_capacity(records.len());
        for record in &records {
            match self.decoder.decode(record) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(
                        "[scan] skipping malformed record {} in window {}: {}",
                        record.key(),
                        window,
                        e
                    );
                    pending_letters.push(PendingDeadLetter {
                        key: record.key(),
                        reason: DeadLetterReason::Malformed,
                        detail: e.to_string(),
                    });
                }
            }
        }
        let malformed = pending_letters.len();

        let outcomes = self.dispatch_all(&events).await;

        let mut delivered = 0;
        let mut rejected = 0;
        let mut pending = Vec::new();
        for (event, outcome) in events.iter().zip(outcomes) {
            match outcome {
                DispatchOutcome::Delivered { .. } => delivered += 1,
                DispatchOutcome::RetryableFailure { .. } => pending.push(event.key()),
                DispatchOutcome::PermanentFailure { status, reason } => {
                    rejected += 1;
                    pending_letters.push(PendingDeadLetter {
                        key: event.key(),
                        reason: DeadLetterReason::Rejected { status },
                        detail: reason,
                    });
                }
            }
        }

        if !pending.is_empty() {
            let keys: Vec<String> = pending.iter().map(EventKey::to_string).collect();
            warn!(
                "[scan] window {} stalled, {} event(s) undelivered: [{}]",
                window,
                pending.len(),
                keys.join(", ")
            );
            return Ok(CycleOutcome::Stalled { window, pending });
        }

        self.transition(ScanState::CommittingCursor);
        self.commit(window, pending_letters)?;

        info!(
            "[scan] committed window {}: {} delivered, {} malformed, {} rejected",
            window, delivered, malformed, rejected
        );
        self.transition(ScanState::Idle);
        Ok(CycleOutcome::Committed {
            window,
            delivered,
            malformed,
            rejected,
            capped,
        })
    }

    /// Bounded fan-out; outcomes come back in input order.
    async fn dispatch_all(&self, events: &[BridgeEvent]) -> Vec<DispatchOutcome> {
        let dispatcher = &self.dispatcher;
        let futures: Vec<_> = events.iter().map(|event| dispatcher.dispatch(event)).collect();
        stream::iter(futures)
            .buffered(self.config.max_concurrent_dispatches.max(1))
            .collect()
            .await
    }

    /// Record the window's dead-letters, then persist the new cursor.
    /// No await point: a commit is never cancelled halfway.
    ///
    /// A letter recorded by an earlier attempt whose cursor save failed is
    /// not recorded again.
    fn commit(&mut self, window: ScanWindow, letters: Vec<PendingDeadLetter>) -> RelayerResult<()> {
        invariant_cursor_monotonic(self.cursor, window.to_block)?;

        let recorded_at = Utc::now();
        for letter in letters {
            if self.recorded_letters.contains(&letter.key) {
                debug!("[scan] {} already dead-lettered, not recording again", letter.key);
                continue;
            }
            let dead_letter = DeadLetter {
                key: letter.key,
                reason: letter.reason,
                detail: letter.detail,
                window,
                recorded_at,
            };
            self.dead_letters.record(&dead_letter)?;
            self.recorded_letters.insert(dead_letter.key);
            warn!(
                "[scan] dead-lettered {} ({:?}) in window {}",
                dead_letter.key, dead_letter.reason, window
            );
            self.raise(Alert::warning(format!(
                "dead-lettered {} ({:?}) in window {}: {}",
                dead_letter.key, dead_letter.reason, window, dead_letter.detail
            )));
        }

        self.cursor_store.save_cursor(window.to_block)?;
        self.recorded_letters.clear();
        debug!("[cursor] {} -> {}", self.cursor, window.to_block);
        self.cursor = window.to_block;
        Ok(())
    }
}

#[async_trait]
impl<L, T, C, D> ScanApi for ScanCoordinator<L, T, C, D>
where
    L: LedgerClient + 'static,
    T: DispatchTransport + 'static,
    C: CursorStore + 'static,
    D: DeadLetterSink + 'static,
{
    async fn run_cycle(&mut self) -> RelayerResult<CycleOutcome> {
        let result = self.execute_cycle().await;
        match &result {
            Ok(CycleOutcome::NoNewBlocks { .. }) => {}
            _ => self.state = ScanState::Idle,
        }
        result
    }

    fn cursor(&self) -> BlockHeight {
        self.cursor
    }

    fn state(&self) -> ScanState {
        self.state
    }
}

/// Completes once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
