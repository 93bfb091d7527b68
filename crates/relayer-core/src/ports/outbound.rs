//! # Outbound Ports
//!
//! Traits for external dependencies: source ledger, destination transport,
//! cursor persistence, the dead-letter sink and operator alerts.

use crate::domain::{
    Address, Alert, BlockHeight, DeadLetter, Hash, RawLogRecord, RelayerError, RelayerResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

/// Log query with inclusive bounds, the way ledger nodes take them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    /// First block (inclusive).
    pub from_block: BlockHeight,
    /// Last block (inclusive).
    pub to_block: BlockHeight,
    /// Emitting contract.
    pub address: Address,
    /// Event topic.
    pub topic0: Hash,
}

/// Source ledger client - outbound port.
///
/// Implementations do a single attempt per call; retry and timeouts live in
/// [`crate::service::LedgerReader`]. Network conditions must be reported as
/// [`RelayerError::TransientRead`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current head height.
    async fn block_number(&self) -> RelayerResult<BlockHeight>;

    /// Logs matching `filter`.
    async fn get_logs(&self, filter: &LogFilter) -> RelayerResult<Vec<RawLogRecord>>;
}

/// Destination transport - outbound port.
///
/// One POST per call. Returns the HTTP status; transport failures are
/// [`RelayerError::DispatchRetryable`].
#[async_trait]
pub trait DispatchTransport: Send + Sync {
    /// Send `body` tagged with `idempotency_key`.
    async fn post(&self, body: Vec<u8>, idempotency_key: &str) -> RelayerResult<u16>;
}

/// Durable cursor storage - outbound port.
///
/// Synchronous on purpose: a save runs to completion once started.
pub trait CursorStore: Send + Sync {
    /// Last committed cursor, `None` on first run.
    fn load_cursor(&self) -> RelayerResult<Option<BlockHeight>>;

    /// Persist `height` durably.
    fn save_cursor(&self, height: BlockHeight) -> RelayerResult<()>;
}

/// Dead-letter sink - outbound port.
pub trait DeadLetterSink: Send + Sync {
    /// Record one dead-letter.
    fn record(&self, letter: &DeadLetter) -> RelayerResult<()>;
}

/// A single alert delivery channel (console, chat, pager).
pub trait AlertChannel: Send + Sync {
    /// Deliver `alert` through this channel.
    fn send(&self, alert: &Alert) -> RelayerResult<()>;
}

/// Alert sink - outbound port.
///
/// Raising never fails from the caller's side; delivery problems are the
/// sink's to report.
pub trait AlertSink: Send + Sync {
    /// Raise `alert`.
    fn raise(&self, alert: &Alert);
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Scriptable ledger for testing.
#[derive(Default)]
pub struct MockLedgerClient {
    head: Mutex<BlockHeight>,
    logs: Mutex<Vec<RawLogRecord>>,
    height_failures: Mutex<u32>,
    log_failures: Mutex<u32>,
    height_calls: AtomicU32,
    log_queries: Mutex<Vec<LogFilter>>,
}

impl MockLedgerClient {
    /// Create a ledger at `head`.
    pub fn with_head(head: BlockHeight) -> Self {
        let client = Self::default();
        *client.head.lock() = head;
        client
    }

    /// Move the head.
    pub fn set_head(&self, head: BlockHeight) {
        *self.head.lock() = head;
    }

    /// Add a log record. Records are returned in insertion order.
    pub fn push_log(&self, record: RawLogRecord) {
        self.logs.lock().push(record);
    }

    /// Fail the next `n` height queries transiently.
    pub fn fail_height_times(&self, n: u32) {
        *self.height_failures.lock() = n;
    }

    /// Fail the next `n` log queries transiently.
    pub fn fail_logs_times(&self, n: u32) {
        *self.log_failures.lock() = n;
    }

    /// Height queries seen so far.
    pub fn height_calls(&self) -> u32 {
        self.height_calls.load(Ordering::SeqCst)
    }

    /// Log queries seen so far.
    pub fn log_queries(&self) -> Vec<LogFilter> {
        self.log_queries.lock().clone()
    }

    fn take_failure(counter: &Mutex<u32>) -> bool {
        let mut remaining = counter.lock();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn block_number(&self) -> RelayerResult<BlockHeight> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.height_failures) {
            return Err(RelayerError::TransientRead {
                operation: "block_number".to_string(),
                reason: "Mock failure".to_string(),
            });
        }
        Ok(*self.head.lock())
    }

    async fn get_logs(&self, filter: &LogFilter) -> RelayerResult<Vec<RawLogRecord>> {
        self.log_queries.lock().push(filter.clone());
        if Self::take_failure(&self.log_failures) {
            return Err(RelayerError::TransientRead {
                operation: "get_logs".to_string(),
                reason: "Mock failure".to_string(),
            });
        }
        // Range and emitter only: topic mismatches are left for the decoder
        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|r| r.block_number >= filter.from_block && r.block_number <= filter.to_block)
            .filter(|r| r.address == filter.address)
            .cloned()
            .collect())
    }
}

/// Scripted response for [`MockDispatchTransport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockResponse {
    /// Reply with this HTTP status.
    Status(u16),
    /// Fail at the transport layer.
    NetworkError,
}

/// Scriptable destination for testing.
pub struct MockDispatchTransport {
    scripts: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    default_response: Mutex<MockResponse>,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockDispatchTransport {
    /// Accept everything with 200.
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_response: Mutex::new(MockResponse::Status(200)),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Queue responses for one idempotency key; the default applies after.
    pub fn script(&self, key: impl Into<String>, responses: Vec<MockResponse>) {
        self.scripts.lock().insert(key.into(), responses.into());
    }

    /// Response used when no script entry is left.
    pub fn set_default(&self, response: MockResponse) {
        *self.default_response.lock() = response;
    }

    /// Every request seen, in arrival order.
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().clone()
    }

    /// Requests seen for `key`.
    pub fn sent_count_for(&self, key: &str) -> usize {
        self.sent.lock().iter().filter(|(k, _)| k == key).count()
    }
}

impl Default for MockDispatchTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchTransport for MockDispatchTransport {
    async fn post(&self, body: Vec<u8>, idempotency_key: &str) -> RelayerResult<u16> {
        self.sent.lock().push((idempotency_key.to_string(), body));

        let scripted = self
            .scripts
            .lock()
            .get_mut(idempotency_key)
            .and_then(|queue| queue.pop_front());
        let response = scripted.unwrap_or(*self.default_response.lock());

        match response {
            MockResponse::Status(status) => Ok(status),
            MockResponse::NetworkError => Err(RelayerError::DispatchRetryable {
                key: idempotency_key.to_string(),
                reason: "Mock network failure".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(block: BlockHeight) -> RawLogRecord {
        RawLogRecord {
            block_number: block,
            tx_hash: [block as u8; 32],
            tx_index: 0,
            log_index: 0,
            address: [0u8; 20],
            topics: vec![],
            data: vec![],
            removed: false,
        }
    }

    fn filter(from: BlockHeight, to: BlockHeight) -> LogFilter {
        LogFilter {
            from_block: from,
            to_block: to,
            address: [0u8; 20],
            topic0: [0u8; 32],
        }
    }

    #[tokio::test]
    async fn test_mock_ledger_range_filter() {
        let client = MockLedgerClient::with_head(200);
        client.push_log(make_record(100));
        client.push_log(make_record(150));
        client.push_log(make_record(201));

        let logs = client.get_logs(&filter(100, 200)).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(client.block_number().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_mock_ledger_address_filter() {
        let client = MockLedgerClient::with_head(200);
        client.push_log(make_record(100));
        let mut foreign = make_record(101);
        foreign.address = [0x77; 20];
        client.push_log(foreign);

        let logs = client.get_logs(&filter(100, 200)).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, 100);
    }

    #[tokio::test]
    async fn test_mock_ledger_scripted_failures() {
        let client = MockLedgerClient::with_head(10);
        client.fail_height_times(2);

        assert!(client.block_number().await.is_err());
        assert!(client.block_number().await.is_err());
        assert_eq!(client.block_number().await.unwrap(), 10);
        assert_eq!(client.height_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_script_then_default() {
        let transport = MockDispatchTransport::new();
        transport.script("k", vec![MockResponse::NetworkError, MockResponse::Status(503)]);

        assert!(transport.post(vec![1], "k").await.is_err());
        assert_eq!(transport.post(vec![1], "k").await.unwrap(), 503);
        assert_eq!(transport.post(vec![1], "k").await.unwrap(), 200);
        assert_eq!(transport.sent_count_for("k"), 3);
    }
}
