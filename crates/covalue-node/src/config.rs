//! Node configuration, loadable from TOML with spec-stated defaults.

use covalue_core::CovalueError;
use serde::{Deserialize, Serialize};

/// Tunables for one node, all with the defaults the design calls for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NodeConfig {
    /// Milliseconds of silence on a peer channel before it is considered
    /// dead and closed.
    pub sync_idle_timeout_ms: u64,
    /// Initial reconnect backoff, in milliseconds.
    pub reconnect_initial_ms: u64,
    /// Reconnect backoff cap, in milliseconds.
    pub reconnect_max_ms: u64,
    /// How many levels of nested covalue references a `query` subscription
    /// follows before it stops auto-subscribing.
    pub subscribe_depth: u32,
    /// How many `accountID_<slot>` session-lock slots to try before giving
    /// up on establishing a session.
    pub session_lock_slots: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sync_idle_timeout_ms: 2_500,
            reconnect_initial_ms: 250,
            reconnect_max_ms: 30_000,
            subscribe_depth: 3,
            session_lock_slots: 100,
        }
    }
}

impl NodeConfig {
    /// Parse a `NodeConfig` from a TOML document, falling back to
    /// [`Default`] for any field the document omits.
    pub fn from_toml(document: &str) -> Result<Self, CovalueError> {
        toml::from_str(document).map_err(|e| CovalueError::invalid(format!("bad node config: {e}")))
    }
}
