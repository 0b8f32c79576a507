//! The view of the site registry consumed by the check scheduler.

use super::{DbError, Store, Target};

/// Source of the full target list, re-read on every check cycle.
pub trait SiteRegistry: Send + Sync {
    /// List every registered target, regardless of owner.
    fn list_all_targets(&self) -> Result<Vec<Target>, DbError>;
}

impl SiteRegistry for Store {
    fn list_all_targets(&self) -> Result<Vec<Target>, DbError> {
        self.get_targets()
    }
}
