//! # Domain Invariants
//!
//! Rules the scan cursor and the scan window must never break.

use super::errors::{BlockHeight, RelayerError, RelayerResult};

/// Invariant: confirmation depth is positive.
///
/// A depth of zero would let a window end at the unconfirmed head.
pub fn invariant_confirmation_depth(depth: u64) -> RelayerResult<()> {
    if depth == 0 {
        return Err(RelayerError::Config(
            "confirmation depth must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Invariant: the cursor never moves backwards.
pub fn invariant_cursor_monotonic(
    current: BlockHeight,
    proposed: BlockHeight,
) -> RelayerResult<()> {
    if proposed < current {
        return Err(RelayerError::CursorRegression { current, proposed });
    }
    Ok(())
}

/// Invariant: a window ends at or below `head - depth`.
pub fn invariant_window_confirmed(
    to_block: BlockHeight,
    head: BlockHeight,
    depth: u64,
) -> RelayerResult<()> {
    match head.checked_sub(depth) {
        Some(safe) if to_block <= safe => Ok(()),
        _ => Err(RelayerError::UnconfirmedWindow {
            to_block,
            head,
            depth,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_depth_rejected() {
        assert!(invariant_confirmation_depth(0).is_err());
        assert!(invariant_confirmation_depth(1).is_ok());
    }

    #[test]
    fn test_cursor_monotonic() {
        assert!(invariant_cursor_monotonic(100, 100).is_ok());
        assert!(invariant_cursor_monotonic(100, 150).is_ok());
        assert!(invariant_cursor_monotonic(100, 99).is_err());
    }

    #[test]
    fn test_window_confirmed() {
        assert!(invariant_window_confirmed(4_750_204, 4_750_210, 6).is_ok());
        assert!(invariant_window_confirmed(4_750_205, 4_750_210, 6).is_err());
    }

    #[test]
    fn test_window_confirmed_head_below_depth() {
        // Head 3 with depth 6 has no confirmed blocks at all
        assert!(invariant_window_confirmed(0, 3, 6).is_err());
    }
}
