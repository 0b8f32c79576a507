//! Read-path transforms over ranged samples.
//!
//! Everything here is a pure function of its input: no I/O, no hidden state.
//! Malformed input yields an empty result rather than an error, since the
//! callers are UI endpoints that must always render something.

mod heatmap;
mod incidents;
mod stats;

pub use heatmap::*;
pub use incidents::*;
pub use stats::*;
