//! `[watch]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[watch]` section in loom.toml - incremental rebuild loop settings.
///
/// # Example
/// ```toml
/// [watch]
/// debounce_ms = 200
/// rescan = true   # register pages and data files created while watching
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period before a batch of changes is processed.
    #[serde(default = "defaults::watch::debounce_ms")]
    #[educe(Default = defaults::watch::debounce_ms())]
    pub debounce_ms: u64,

    /// Pick up newly added pages and data files without a restart.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub rescan: bool,
}
