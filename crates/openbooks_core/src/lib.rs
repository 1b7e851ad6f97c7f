//! OpenBooks core: wire codec, pure state machine and view-model helpers.
mod codec;
mod connection;
mod effect;
mod history;
mod in_flight;
mod msg;
mod router;
mod snapshot;
mod state;
mod throttle;
mod types;
mod update;
mod view_model;

pub use codec::{decode, encode, DecodeError, Event, Inbound, MessageKind, Notice};
pub use connection::ConnectionState;
pub use effect::Effect;
pub use history::{HistoryItem, HistoryStore, HISTORY_CAPACITY};
pub use in_flight::{InFlightEntry, InFlightTracker};
pub use msg::Msg;
pub use router::route;
pub use snapshot::{ConnectionSnapshot, PersistedSnapshot};
pub use state::AppState;
pub use throttle::Throttle;
pub use types::{
    Appearance, BookDetail, LibraryBook, Notification, ParseError, Request, RequestId,
    RequestKind,
};
pub use update::update;
pub use view_model::{ActiveSearchView, AppViewModel, BookRowView, HistoryRowView, SearchStatus};
