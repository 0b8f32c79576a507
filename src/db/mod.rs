//! Site registry for DevPulse.
//!
//! Provides SQLite storage of monitored targets with embedded migrations.

mod models;
mod registry;
mod store;

pub use models::*;
pub use registry::*;
pub use store::*;
