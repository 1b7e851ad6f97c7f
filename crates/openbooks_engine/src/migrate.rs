//! Ordered schema migrations for persisted client state.
//!
//! The version marker under [`VERSION_KEY`] is only advanced after a step has
//! fully applied, so an interrupted upgrade resumes from the failed step.

use engine_logging::{engine_info, engine_warn};
use serde_json::Value;
use thiserror::Error;

use crate::storage::{
    read_json, write_json, Storage, StorageError, ACTIVE_KEY, CONNECTION_KEY, HISTORY_KEY,
    VERSION_KEY,
};

pub const CURRENT_VERSION: u32 = 3;

/// Server stamped onto legacy book entries that predate the `server` field.
pub const DEFAULT_IRC_SERVER: &str = "irc.irchighway.net";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("no migration step from version {0}")]
    MissingStep(u32),
    #[error("stored schema version {stored} is newer than supported version {supported}")]
    Newer { stored: u32, supported: u32 },
}

pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub description: &'static str,
    apply: fn(&mut dyn Storage) -> Result<(), StorageError>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 1,
        to: 2,
        description: "stamp default server onto legacy book entries",
        apply: stamp_default_server,
    },
    Migration {
        from: 2,
        to: 3,
        description: "store active selection as a timestamp",
        apply: active_as_timestamp,
    },
];

/// Read the stored schema version. Non-numeric legacy markers count as version 1.
pub fn stored_version(storage: &dyn Storage) -> Result<Option<u32>, StorageError> {
    let Some(text) = storage.read(VERSION_KEY)? else {
        return Ok(None);
    };
    let version = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Ok(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(Some(version.unwrap_or(1)))
}

/// Bring storage up to `target`, starting from whatever the marker says.
///
/// A fresh install (no marker, no data) is stamped at `target` directly.
/// Returns the version storage ends up at.
pub fn migrate_storage(storage: &mut dyn Storage, target: u32) -> Result<u32, MigrationError> {
    let from = match stored_version(storage)? {
        Some(version) => version,
        None if has_legacy_data(storage)? => 1,
        None => {
            write_json(storage, VERSION_KEY, &target)?;
            return Ok(target);
        }
    };
    if from > target {
        return Err(MigrationError::Newer {
            stored: from,
            supported: target,
        });
    }
    migrate(storage, from, target)
}

/// Apply every step between `from` and `to` in order.
///
/// Running again once the marker matches `to` does nothing.
pub fn migrate(storage: &mut dyn Storage, from: u32, to: u32) -> Result<u32, MigrationError> {
    let mut version = from;
    while version < to {
        let step = MIGRATIONS
            .iter()
            .find(|step| step.from == version)
            .ok_or(MigrationError::MissingStep(version))?;
        engine_info!(
            "Migrating storage v{} -> v{}: {}",
            step.from,
            step.to,
            step.description
        );
        (step.apply)(storage)?;
        write_json(storage, VERSION_KEY, &step.to)?;
        version = step.to;
    }
    Ok(version)
}

fn has_legacy_data(storage: &dyn Storage) -> Result<bool, StorageError> {
    for key in [HISTORY_KEY, ACTIVE_KEY, CONNECTION_KEY] {
        if storage.read(key)?.is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn stamp_default_server(storage: &mut dyn Storage) -> Result<(), StorageError> {
    let Some(mut history) = read_json::<Value>(storage, HISTORY_KEY)? else {
        return Ok(());
    };

    let mut stamped = 0usize;
    let books = history
        .as_array_mut()
        .into_iter()
        .flatten()
        .filter_map(|item| item.get_mut("results"))
        .filter_map(Value::as_array_mut)
        .flatten()
        .filter_map(Value::as_object_mut);
    for book in books {
        let missing = match book.get("server") {
            Some(Value::String(server)) => server.is_empty(),
            _ => true,
        };
        if missing {
            book.insert("server".into(), Value::String(DEFAULT_IRC_SERVER.into()));
            stamped += 1;
        }
    }

    if stamped > 0 {
        engine_info!("Stamped default server onto {} stored books", stamped);
        write_json(storage, HISTORY_KEY, &history)?;
    }
    Ok(())
}

fn active_as_timestamp(storage: &mut dyn Storage) -> Result<(), StorageError> {
    let Some(active) = read_json::<Value>(storage, ACTIVE_KEY)? else {
        return Ok(());
    };
    let timestamp = match &active {
        Value::Number(n) => n.as_i64(),
        Value::Object(item) => item.get("timestamp").and_then(Value::as_i64),
        _ => None,
    };

    let known = match (timestamp, read_json::<Value>(storage, HISTORY_KEY)?) {
        (Some(ts), Some(Value::Array(items))) => items
            .iter()
            .any(|item| item.get("timestamp").and_then(Value::as_i64) == Some(ts)),
        _ => false,
    };

    match timestamp {
        Some(ts) if known => write_json(storage, ACTIVE_KEY, &ts),
        _ => {
            engine_warn!("Dropping stored active selection that no longer resolves");
            storage.remove(ACTIVE_KEY)
        }
    }
}
