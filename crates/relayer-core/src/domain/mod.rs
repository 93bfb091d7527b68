//! # Domain Module
//!
//! Core domain types for the relayer.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod recovery;
pub mod schema;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use recovery::{RecoveryBreaker, RecoveryEvent, RecoveryState};
pub use schema::*;
pub use value_objects::*;
