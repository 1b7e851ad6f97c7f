use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::rest::{LibraryEntry, RestError, ServerList};
use crate::supervisor::SupervisorEvent;
use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Connection(SupervisorEvent),
    ServersLoaded(Result<ServerList, String>),
    LibraryLoaded(Result<Vec<LibraryEntry>, String>),
    FileSaved {
        path: String,
        result: Result<PathBuf, String>,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("failed to start engine thread: {0}")]
    Spawn(#[from] io::Error),
}
