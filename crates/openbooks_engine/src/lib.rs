//! OpenBooks engine: transport supervision, REST side-channel and local storage.
mod engine;
mod migrate;
mod persist;
mod rest;
mod sse;
mod storage;
mod supervisor;
mod transport;
mod types;

pub use engine::{EngineConfig, EngineHandle};
pub use migrate::{
    migrate, migrate_storage, stored_version, Migration, MigrationError, CURRENT_VERSION,
    DEFAULT_IRC_SERVER, MIGRATIONS,
};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use rest::{file_name_for, LibraryEntry, RestClient, RestError, ServerList};
pub use sse::{SseDecoder, SseSettings, SseTransport};
pub use storage::{
    read_json, write_json, FileStorage, MemoryStorage, Storage, StorageError, ACTIVE_KEY,
    CONNECTION_KEY, HISTORY_KEY, VERSION_KEY,
};
pub use supervisor::{
    run_supervisor, EventSink, ReconnectPolicy, SupervisorCommand, SupervisorEvent,
};
pub use transport::{Connection, FrameStream, RequestSink, Transport, TransportError};
pub use types::{EngineError, EngineEvent};
