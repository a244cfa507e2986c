//! Message payload and process-wide default fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An email message as submitted by the host.
///
/// The well-known fields are typed; anything else (`html`, custom headers)
/// is carried through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,

    /// Free-form fields passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fallback values filled into a message where the field is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// Build a message from an arbitrary JSON value.
    ///
    /// Hosts may submit a bare string (or number) instead of an object; such
    /// scalars become the message text.
    pub fn coerce(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(_) => serde_json::from_value(value),
            Value::String(text) => Ok(Self {
                text: Some(text),
                ..Self::default()
            }),
            other => Ok(Self {
                text: Some(other.to_string()),
                ..Self::default()
            }),
        }
    }

    /// Fill `from`, `to`, `subject` and `text` from the defaults where the
    /// message does not set them. Fields present on the message win.
    pub fn fill_defaults(&mut self, defaults: &Defaults) {
        if self.from.is_none() {
            self.from = defaults.from.clone();
        }
        if self.to.is_none() {
            self.to = defaults.to.clone();
        }
        if self.subject.is_none() {
            self.subject = defaults.subject.clone();
        }
        if self.text.is_none() {
            self.text = defaults.text.clone();
        }
    }

    /// Deterministic JSON rendering of the message. Typed fields serialize
    /// in declaration order and `extra` keys are sorted, so equal messages
    /// always render identically.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// HTML body, when the host supplied one.
    pub fn html(&self) -> Option<&str> {
        self.extra.get("html").and_then(Value::as_str)
    }
}
