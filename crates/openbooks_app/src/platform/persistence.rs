use engine_logging::{engine_error, engine_info, engine_warn};
use openbooks_core::{ConnectionSnapshot, HistoryItem, PersistedSnapshot};
use openbooks_engine::{
    migrate_storage, read_json, write_json, MemoryStorage, MigrationError, Storage, ACTIVE_KEY,
    CONNECTION_KEY, CURRENT_VERSION, HISTORY_KEY, VERSION_KEY,
};
use serde::de::DeserializeOwned;

/// A snapshot read at startup and whether it may be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadedSnapshot {
    pub snapshot: PersistedSnapshot,
    pub writable: bool,
}

/// Migrate storage and read the last saved snapshot.
///
/// When storage cannot be upgraded in place (read-only, failing writes) the
/// stored keys are migrated in memory instead and write-back is turned off.
/// A schema newer than this build loads nothing. Individual unreadable keys
/// are logged and replaced by their default.
pub(crate) fn load_snapshot(storage: &mut dyn Storage) -> LoadedSnapshot {
    match migrate_storage(storage, CURRENT_VERSION) {
        Ok(version) => {
            engine_info!("Storage at schema v{}", version);
            LoadedSnapshot {
                snapshot: read_snapshot(storage),
                writable: true,
            }
        }
        Err(err @ MigrationError::Newer { .. }) => {
            engine_error!("{}; history will not be loaded or saved", err);
            LoadedSnapshot {
                snapshot: PersistedSnapshot::default(),
                writable: false,
            }
        }
        Err(err) => {
            engine_warn!("Storage could not be migrated in place, loading read-only: {}", err);
            let mut copy = MemoryStorage::new();
            for key in [VERSION_KEY, HISTORY_KEY, ACTIVE_KEY, CONNECTION_KEY] {
                if let Ok(Some(value)) = storage.read(key) {
                    copy = copy.with_entry(key, &value);
                }
            }
            let snapshot = match migrate_storage(&mut copy, CURRENT_VERSION) {
                Ok(_) => read_snapshot(&copy),
                Err(err) => {
                    engine_error!("Stored history could not be migrated: {}", err);
                    PersistedSnapshot::default()
                }
            };
            LoadedSnapshot {
                snapshot,
                writable: false,
            }
        }
    }
}

fn read_snapshot(storage: &dyn Storage) -> PersistedSnapshot {
    let history: Vec<HistoryItem> = read_or_default(storage, HISTORY_KEY);
    let active: Option<i64> = read_or_default(storage, ACTIVE_KEY);
    let connection: ConnectionSnapshot = read_or_default(storage, CONNECTION_KEY);

    engine_info!("Loaded {} history entries", history.len());
    PersistedSnapshot {
        history,
        active,
        connection,
    }
}

/// Write a snapshot back. Returns false if any key failed; failures are logged.
pub(crate) fn save_snapshot(storage: &mut dyn Storage, snapshot: &PersistedSnapshot) -> bool {
    let mut ok = true;

    if let Err(err) = write_json(storage, HISTORY_KEY, &snapshot.history) {
        engine_error!("Failed to save history: {}", err);
        ok = false;
    }

    let active = match snapshot.active {
        Some(timestamp) => write_json(storage, ACTIVE_KEY, &timestamp),
        None => storage.remove(ACTIVE_KEY),
    };
    if let Err(err) = active {
        engine_error!("Failed to save active selection: {}", err);
        ok = false;
    }

    if let Err(err) = write_json(storage, CONNECTION_KEY, &snapshot.connection) {
        engine_error!("Failed to save connection details: {}", err);
        ok = false;
    }

    ok
}

fn read_or_default<T: DeserializeOwned + Default>(storage: &dyn Storage, key: &str) -> T {
    match read_json(storage, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(err) => {
            engine_warn!("Ignoring stored {}: {}", key, err);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openbooks_core::BookDetail;
    use openbooks_engine::FileStorage;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn snapshot() -> PersistedSnapshot {
        PersistedSnapshot {
            history: vec![HistoryItem {
                query: "dune".into(),
                timestamp: 1_700_000_000_000,
                results: Some(vec![BookDetail {
                    server: "irc.irchighway.net".into(),
                    author: "Frank Herbert".into(),
                    title: "Dune".into(),
                    format: "epub".into(),
                    size: "1.2MB".into(),
                    full: "!Oatmeal Frank Herbert - Dune.epub".into(),
                }]),
                errors: Some(Vec::new()),
            }],
            active: Some(1_700_000_000_000),
            connection: ConnectionSnapshot {
                username: Some("reader_42".into()),
                servers: vec!["Oatmeal".into()],
            },
        }
    }

    #[test]
    fn snapshot_survives_a_restart() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(temp.path().to_path_buf());
        assert!(save_snapshot(&mut storage, &snapshot()));

        let mut reopened = FileStorage::new(temp.path().to_path_buf());
        assert_eq!(
            load_snapshot(&mut reopened),
            LoadedSnapshot {
                snapshot: snapshot(),
                writable: true
            }
        );
    }

    #[test]
    fn empty_storage_loads_defaults_and_is_stamped() {
        let mut storage = MemoryStorage::new();
        let loaded = load_snapshot(&mut storage);
        assert!(loaded.writable);
        assert_eq!(loaded.snapshot, PersistedSnapshot::default());
        assert_eq!(storage.get(VERSION_KEY), Some("3"));
    }

    #[test]
    fn corrupt_key_only_loses_that_key() {
        let mut storage = MemoryStorage::new()
            .with_entry(VERSION_KEY, "3")
            .with_entry(HISTORY_KEY, "[{")
            .with_entry(CONNECTION_KEY, r#"{"username":"reader_42","servers":[]}"#);
        let loaded = load_snapshot(&mut storage).snapshot;
        assert!(loaded.history.is_empty());
        assert_eq!(loaded.connection.username.as_deref(), Some("reader_42"));
    }

    #[test]
    fn clearing_the_selection_removes_the_key() {
        let mut storage = MemoryStorage::new();
        save_snapshot(&mut storage, &snapshot());
        let mut cleared = snapshot();
        cleared.active = None;
        assert!(save_snapshot(&mut storage, &cleared));
        assert_eq!(storage.get(ACTIVE_KEY), None);
    }

    #[test]
    fn failing_storage_is_reported_not_fatal() {
        let mut storage = MemoryStorage::failing();
        assert!(!save_snapshot(&mut storage, &snapshot()));
        assert!(!load_snapshot(&mut storage).writable);
    }

    #[test]
    fn read_only_legacy_store_still_loads() {
        let legacy_history = r#"[{"query":"dune","timestamp":5,"results":[
            {"author":"Frank Herbert","title":"Dune","format":"epub","size":"1.2MB","full":"!Oatmeal Dune"}
        ],"errors":[]}]"#;
        let mut storage = MemoryStorage::new()
            .with_entry(VERSION_KEY, "1")
            .with_entry(HISTORY_KEY, legacy_history)
            .with_entry(ACTIVE_KEY, r#"{"query":"dune","timestamp":5}"#);
        storage.set_failing(true);

        let loaded = load_snapshot(&mut storage);
        assert!(!loaded.writable);
        assert_eq!(loaded.snapshot.active, Some(5));
        let results = loaded.snapshot.history[0].results.as_ref().unwrap();
        assert_eq!(results[0].server, "irc.irchighway.net");
        // Storage itself is untouched.
        assert_eq!(storage.get(VERSION_KEY), Some("1"));
        assert_eq!(storage.get(HISTORY_KEY), Some(legacy_history));
    }

    #[test]
    fn newer_schema_disables_persistence() {
        let mut storage = MemoryStorage::new()
            .with_entry(VERSION_KEY, "99")
            .with_entry(HISTORY_KEY, "[]");
        let loaded = load_snapshot(&mut storage);
        assert!(!loaded.writable);
        assert_eq!(loaded.snapshot, PersistedSnapshot::default());
        assert_eq!(storage.get(HISTORY_KEY), Some("[]"));
    }
}
