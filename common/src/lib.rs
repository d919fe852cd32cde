//! Ratekeeper Common Types
//!
//! This crate contains the data model shared across Ratekeeper: currency
//! codes, quote snapshots fetched from a rate source, and the cross-rate
//! tables derived from them.

pub mod currency;
pub mod quote;
pub mod error;
pub mod time;

pub use currency::*;
pub use quote::*;
pub use error::*;
pub use time::*;
