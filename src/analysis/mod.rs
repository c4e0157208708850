//! Analysis modules.
//!
//! The topic roll-up lives in the aggregator; everything here is a pure
//! function of the loaded tables.

pub mod aggregator;

pub use aggregator::*;
