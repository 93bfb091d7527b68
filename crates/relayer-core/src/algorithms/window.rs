//! Confirmation-safe window arithmetic.

use crate::domain::{BlockHeight, ScanWindow};

/// Result of comparing the cursor with the confirmed head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowDecision {
    /// Nothing confirmed beyond the cursor yet.
    NoNewBlocks {
        /// Highest confirmed block (`head - depth`, saturating).
        confirmed_head: BlockHeight,
    },
    /// Scan this window.
    Scan {
        /// The window.
        window: ScanWindow,
        /// True when `max_span` cut the window short of the confirmed head.
        capped: bool,
    },
}

/// Compute the next window.
///
/// `to_block = min(head - depth, cursor + max_span)`; the window is
/// `(cursor, to_block]` and only exists when `to_block > cursor`.
pub fn compute_window(
    cursor: BlockHeight,
    head: BlockHeight,
    confirmation_depth: u64,
    max_span: u64,
) -> WindowDecision {
    let confirmed_head = head.saturating_sub(confirmation_depth);
    if head < confirmation_depth || confirmed_head <= cursor {
        return WindowDecision::NoNewBlocks { confirmed_head };
    }

    let span_limit = cursor.saturating_add(max_span.max(1));
    let to_block = confirmed_head.min(span_limit);

    match ScanWindow::new(cursor, to_block) {
        Some(window) => WindowDecision::Scan {
            window,
            capped: to_block < confirmed_head,
        },
        None => WindowDecision::NoNewBlocks { confirmed_head },
    }
}
