//! Runtime configuration for a [`Kasten`](crate::store::Kasten).
//!
//! # Invariants
//! - `Default` values are safe for interactive single-user use.

use std::time::Duration;

const DEFAULT_MAX_ID_ATTEMPTS: u32 = 64;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KastenConfig {
    /// Random draws per identifier before giving up with
    /// `AllocationExhausted`.
    pub max_id_attempts: u32,
    /// SQLite busy timeout applied to every persistence connection.
    pub busy_timeout: Duration,
    /// Appended to the target file name to form the temporary save path.
    pub temp_suffix: String,
}

impl Default for KastenConfig {
    fn default() -> Self {
        Self {
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
        }
    }
}
