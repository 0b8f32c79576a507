//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored website, owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    /// URL exactly as the owner registered it.
    pub url: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}
