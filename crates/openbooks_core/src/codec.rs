//! JSON wire format shared with the OpenBooks backend.
//!
//! Every message is a single JSON object with an integer `type`
//! discriminant. Inbound messages may also carry `appearance`, `title` and
//! `detail` used for user-facing notifications, and an optional `requestId`
//! echoing the outbound request they answer.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::{Appearance, BookDetail, Notification, ParseError, Request, RequestId, RequestKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Status,
    Connect,
    Search,
    Download,
    RateLimit,
}

impl MessageKind {
    pub fn from_wire(value: u64) -> Option<Self> {
        match value {
            0 => Some(MessageKind::Status),
            1 => Some(MessageKind::Connect),
            2 => Some(MessageKind::Search),
            3 => Some(MessageKind::Download),
            4 => Some(MessageKind::RateLimit),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u64 {
        match self {
            MessageKind::Status => 0,
            MessageKind::Connect => 1,
            MessageKind::Search => 2,
            MessageKind::Download => 3,
            MessageKind::RateLimit => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Status,
    Connected { name: String },
    SearchResult {
        books: Vec<BookDetail>,
        errors: Vec<ParseError>,
    },
    DownloadReady { path: String },
    RateLimited,
}

/// Server supplied notification text. Absent fields fall back to router defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notice {
    pub appearance: Option<Appearance>,
    pub title: Option<String>,
    pub detail: Option<String>,
}

impl Notice {
    pub(crate) fn into_notification(self, appearance: Appearance, title: &str) -> Notification {
        Notification {
            appearance: self.appearance.unwrap_or(appearance),
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| title.to_string()),
            detail: self.detail.filter(|d| !d.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub event: Event,
    pub request_id: Option<RequestId>,
    pub notice: Notice,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("invalid {kind:?} message: {message}")]
    Schema { kind: MessageKind, message: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    request_id: Option<u64>,
    appearance: Option<u64>,
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Deserialize)]
struct ConnectBody {
    name: String,
}

#[derive(Deserialize)]
struct SearchBody {
    #[serde(deserialize_with = "null_as_empty")]
    books: Vec<BookDetail>,
    #[serde(default, deserialize_with = "null_as_empty")]
    errors: Vec<ParseError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadBody {
    download_path: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode one raw transport payload into a typed inbound message.
pub fn decode(raw: &str) -> Result<Inbound, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| DecodeError::Malformed(err.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::Malformed("expected a JSON object".into()));
    }

    let kind = match value.get("type") {
        Some(discriminant) => discriminant
            .as_u64()
            .and_then(MessageKind::from_wire)
            .ok_or_else(|| DecodeError::UnknownType(discriminant.to_string()))?,
        None => return Err(DecodeError::UnknownType("<missing>".into())),
    };

    let schema = |err: serde_json::Error| DecodeError::Schema {
        kind,
        message: err.to_string(),
    };

    let header = Header::deserialize(&value).map_err(schema)?;
    let event = match kind {
        MessageKind::Status => Event::Status,
        MessageKind::Connect => {
            let body = ConnectBody::deserialize(&value).map_err(schema)?;
            Event::Connected { name: body.name }
        }
        MessageKind::Search => {
            let body = SearchBody::deserialize(&value).map_err(schema)?;
            Event::SearchResult {
                books: body.books,
                errors: body.errors,
            }
        }
        MessageKind::Download => {
            let body = DownloadBody::deserialize(&value).map_err(schema)?;
            Event::DownloadReady {
                path: body.download_path,
            }
        }
        MessageKind::RateLimit => Event::RateLimited,
    };

    Ok(Inbound {
        event,
        request_id: header.request_id.map(RequestId),
        notice: Notice {
            appearance: header.appearance.and_then(Appearance::from_wire),
            title: header.title,
            detail: header.detail,
        },
    })
}

/// Encode an outbound request as a single wire message.
pub fn encode(request: &Request) -> String {
    let id = request.id.0;
    let value = match &request.kind {
        RequestKind::Connect => json!({
            "type": MessageKind::Connect.to_wire(),
            "requestId": id,
        }),
        RequestKind::Search { query } => json!({
            "type": MessageKind::Search.to_wire(),
            "query": query,
            "requestId": id,
        }),
        RequestKind::Download { book } => json!({
            "type": MessageKind::Download.to_wire(),
            "book": book,
            "requestId": id,
        }),
    };
    value.to_string()
}
