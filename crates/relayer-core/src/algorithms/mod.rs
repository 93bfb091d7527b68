//! # Algorithms
//!
//! Pure building blocks: window arithmetic, log decoding, payload
//! construction and bounded retry.

pub mod decoder;
pub mod payload;
pub mod retry;
pub mod window;

pub use decoder::EventDecoder;
pub use payload::DispatchPayload;
pub use retry::{retry_with_backoff, RetryFailure};
pub use window::{compute_window, WindowDecision};
