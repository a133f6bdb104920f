use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SystemHealth {
    pub media_root_available: bool,
    pub watcher_enabled: bool,
    pub works_tracked: usize,
    pub needs_cleanup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BackendInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AvailableBackends {
    pub catalog: Vec<BackendInfo>,
    pub series: Vec<BackendInfo>,
}
