//! User-visible result strings.

use serde::{Deserialize, Serialize};

use crate::models::Region;

/// The address could not be geocoded.
pub const RESULT_BAD_ADDRESS: &str = "Failed to find a location for that address!";

/// The address geocoded but lies in no known region.
pub const RESULT_NO_RESULTS: &str = "No results for that address!";

/// Prefix of the message for a found region.
pub const RESULT_REGION_PREFIX: &str = "That address is in ";

/// Message set handed back to the presentation layer. Defaults are the
/// constants above; any field may be overridden from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultMessages {
    pub bad_address: String,
    pub no_results: String,
    pub found_prefix: String,
}

impl Default for ResultMessages {
    fn default() -> Self {
        Self {
            bad_address: RESULT_BAD_ADDRESS.to_string(),
            no_results: RESULT_NO_RESULTS.to_string(),
            found_prefix: RESULT_REGION_PREFIX.to_string(),
        }
    }
}

impl ResultMessages {
    /// `"<prefix><name>, <city>, <state>."`
    pub fn found(&self, region: &Region) -> String {
        format!(
            "{}{}, {}, {}.",
            self.found_prefix,
            region.name(),
            region.city(),
            region.state()
        )
    }
}
