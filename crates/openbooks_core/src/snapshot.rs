use serde::{Deserialize, Serialize};

use crate::HistoryItem;

/// Connection details worth remembering between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub servers: Vec<String>,
}

/// Everything the client writes back to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedSnapshot {
    pub history: Vec<HistoryItem>,
    pub active: Option<i64>,
    pub connection: ConnectionSnapshot,
}
