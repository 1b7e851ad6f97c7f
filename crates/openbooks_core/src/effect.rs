use crate::{Notification, Request};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write a request to the transport.
    Send(Request),
    /// Show a notification to the user.
    Notify(Notification),
    /// Fetch the file the server prepared and save it locally.
    SaveFile { path: String },
    /// The cached library listing is stale; fetch it again.
    RefreshLibrary,
    /// Ask the REST side-channel for the IRC server list.
    FetchServers,
}
