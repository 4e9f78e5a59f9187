//! Barrier-based alternatives to decoupled lookback
//!
//! These are simpler, easier to trust compositions that the single-pass
//! engine can be validated and benchmarked against.

pub mod three_pass;
mod upsweep_downsweep;

pub use self::upsweep_downsweep::upsweep_downsweep;
