use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::ScoreRecord;

/// On-disk form of the score cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scores: BTreeMap<String, ScoreRecord>,
    pub ttl_hours: i64,
}

impl ScoreSnapshot {
    /// Timestamp set, scores present and younger than the TTL.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.timestamp {
            Some(ts) => !self.scores.is_empty() && now - ts < Duration::hours(self.ttl_hours),
            None => false,
        }
    }

    /// Read a snapshot. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| StoreError::json(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        write_json_atomic(path, self)
    }
}

/// Pretty-print `value` to a sibling temp file, then rename it over `path`.
/// Parent directories are created.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let body = serde_json::to_string_pretty(value).map_err(|e| StoreError::json(path, e))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);
    std::fs::write(tmp, body).map_err(|e| StoreError::io(tmp, e))?;
    std::fs::rename(tmp, path).map_err(|e| StoreError::io(path, e))
}
