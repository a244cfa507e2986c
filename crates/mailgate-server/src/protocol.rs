//! Wire format of the host messaging channel.
//!
//! One JSON object per line. Inbound requests carry a command, the message
//! payload and an optional reply token; outbound replies are addressed back
//! to the originating caller with that token.

use mailgate_core::{Message, TransportOptions};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An inbound request from the host.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub command: String,

    #[serde(default, deserialize_with = "payload_from_value")]
    pub message: Option<Payload>,

    /// Originating caller id, used to address the reply.
    #[serde(default)]
    pub from: Option<String>,

    /// Opaque reply token. A reply is sent only when one was supplied.
    #[serde(default)]
    pub callback: Option<String>,
}

/// The message body with any per-request transport options split off.
#[derive(Debug, Clone)]
pub struct Payload {
    pub message: Message,
    pub options: Option<TransportOptions>,
}

/// Completion reply addressed back to the caller. `error` is null on
/// success and the failure text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub to: String,
    pub callback: String,
    pub error: Option<String>,
}

fn payload_from_value<'de, D>(deserializer: D) -> Result<Option<Payload>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(mut value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }

    let options = match value.as_object_mut() {
        Some(map) => match map.remove("options") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value(raw).map_err(serde::de::Error::custom)?),
        },
        None => None,
    };

    let message = Message::coerce(value).map_err(serde::de::Error::custom)?;
    Ok(Some(Payload { message, options }))
}
