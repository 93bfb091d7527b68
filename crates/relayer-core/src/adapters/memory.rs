//! In-memory cursor store, dead-letter sink and alert channel.
//!
//! Not durable. Used by tests and dry runs.

use crate::domain::{Alert, BlockHeight, DeadLetter, RelayerError, RelayerResult};
use crate::ports::outbound::{AlertChannel, AlertSink, CursorStore, DeadLetterSink};
use parking_lot::Mutex;

/// Cursor held in memory.
#[derive(Default)]
pub struct InMemoryCursorStore {
    cursor: Mutex<Option<BlockHeight>>,
    history: Mutex<Vec<BlockHeight>>,
    fail_saves: Mutex<u32>,
}

impl InMemoryCursorStore {
    /// Store with no persisted cursor (first run).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `cursor`.
    pub fn with_cursor(cursor: BlockHeight) -> Self {
        let store = Self::default();
        *store.cursor.lock() = Some(cursor);
        store
    }

    /// Every successfully saved value, in order.
    pub fn history(&self) -> Vec<BlockHeight> {
        self.history.lock().clone()
    }

    /// Fail the next `n` saves.
    pub fn fail_saves(&self, n: u32) {
        *self.fail_saves.lock() = n;
    }
}

impl CursorStore for InMemoryCursorStore {
    fn load_cursor(&self) -> RelayerResult<Option<BlockHeight>> {
        Ok(*self.cursor.lock())
    }

    fn save_cursor(&self, height: BlockHeight) -> RelayerResult<()> {
        {
            let mut remaining = self.fail_saves.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RelayerError::CursorStore("simulated save failure".into()));
            }
        }
        *self.cursor.lock() = Some(height);
        self.history.lock().push(height);
        Ok(())
    }
}

/// Dead-letters held in memory.
#[derive(Default)]
pub struct InMemoryDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryDeadLetterSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded dead-letters, in order.
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().clone()
    }
}

impl DeadLetterSink for InMemoryDeadLetterSink {
    fn record(&self, letter: &DeadLetter) -> RelayerResult<()> {
        self.letters.lock().push(letter.clone());
        Ok(())
    }
}

/// Alerts held in memory.
#[derive(Default)]
pub struct InMemoryAlertChannel {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertChannel {
    /// Empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Received alerts, in order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }
}

impl AlertChannel for InMemoryAlertChannel {
    fn send(&self, alert: &Alert) -> RelayerResult<()> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

impl AlertSink for InMemoryAlertChannel {
    fn raise(&self, alert: &Alert) {
        self.alerts.lock().push(alert.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_store_history() {
        let store = InMemoryCursorStore::with_cursor(10);
        assert_eq!(store.load_cursor().unwrap(), Some(10));

        store.save_cursor(20).unwrap();
        store.fail_saves(1);
        assert!(store.save_cursor(30).is_err());
        store.save_cursor(30).unwrap();

        assert_eq!(store.history(), vec![20, 30]);
        assert_eq!(store.load_cursor().unwrap(), Some(30));
    }
}
