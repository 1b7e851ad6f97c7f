use std::fmt;

use serde::{Deserialize, Serialize};

/// One search hit as reported by the IRC indexing service.
///
/// `full` is the raw result line and doubles as the download key. The
/// server does not promise it is unique, so it is only ever used as a hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetail {
    pub server: String,
    pub author: String,
    pub title: String,
    pub format: String,
    pub size: String,
    pub full: String,
}

/// A result line the server could not parse, kept so the user can still act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub line: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryBook {
    pub name: String,
    pub download_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Connect,
    Search { query: String },
    Download { book: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Notify,
    Success,
    Warning,
    Danger,
}

impl Appearance {
    pub(crate) fn from_wire(value: u64) -> Option<Self> {
        match value {
            0 => Some(Appearance::Notify),
            1 => Some(Appearance::Success),
            2 => Some(Appearance::Warning),
            3 => Some(Appearance::Danger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub appearance: Appearance,
    pub title: String,
    pub detail: Option<String>,
}

impl Notification {
    pub fn new(appearance: Appearance, title: impl Into<String>) -> Self {
        Self {
            appearance,
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn or_detail(mut self, detail: impl Into<String>) -> Self {
        if self.detail.is_none() {
            self.detail = Some(detail.into());
        }
        self
    }
}
