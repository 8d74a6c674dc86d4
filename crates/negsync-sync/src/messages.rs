//! Control messages exchanged by sync sessions.
//!
//! Messages travel as JSON arrays whose first element names the message:
//!
//! ```text
//! ["NEG-OPEN",  <subscription id>, <filter>, <frame hex>]
//! ["NEG-MSG",   <subscription id>, <frame hex>]
//! ["NEG-CLOSE", <subscription id>]
//! ["NEG-ERR",   <subscription id>, <reason>]
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, SyncError};

/// Identifier scoping one reconciliation session on a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random 16-character hex id.
    pub fn random() -> Self {
        use rand::Rng;
        let bytes: [u8; 8] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A session control message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Open a session with an application filter and the initial frame.
    Open {
        id: SubscriptionId,
        filter: Value,
        frame: Vec<u8>,
    },
    /// Continue a session with the next frame.
    Msg { id: SubscriptionId, frame: Vec<u8> },
    /// Close a session. No reply is expected.
    Close { id: SubscriptionId },
    /// Abort a session with a reason.
    Err { id: SubscriptionId, reason: String },
}

impl ControlMessage {
    pub const OPEN: &'static str = "NEG-OPEN";
    pub const MSG: &'static str = "NEG-MSG";
    pub const CLOSE: &'static str = "NEG-CLOSE";
    pub const ERR: &'static str = "NEG-ERR";

    /// The subscription this message belongs to.
    pub fn id(&self) -> &SubscriptionId {
        match self {
            ControlMessage::Open { id, .. }
            | ControlMessage::Msg { id, .. }
            | ControlMessage::Close { id }
            | ControlMessage::Err { id, .. } => id,
        }
    }

    /// Message tag as it appears on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            ControlMessage::Open { .. } => Self::OPEN,
            ControlMessage::Msg { .. } => Self::MSG,
            ControlMessage::Close { .. } => Self::CLOSE,
            ControlMessage::Err { .. } => Self::ERR,
        }
    }

    /// Frame bytes carried by the message, if any.
    pub fn frame(&self) -> Option<&[u8]> {
        match self {
            ControlMessage::Open { frame, .. } | ControlMessage::Msg { frame, .. } => Some(frame),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        let tag = Value::from(self.tag());
        let id = Value::from(self.id().as_str());
        match self {
            ControlMessage::Open { filter, frame, .. } => {
                Value::Array(vec![tag, id, filter.clone(), Value::from(hex::encode(frame))])
            }
            ControlMessage::Msg { frame, .. } => {
                Value::Array(vec![tag, id, Value::from(hex::encode(frame))])
            }
            ControlMessage::Close { .. } => Value::Array(vec![tag, id]),
            ControlMessage::Err { reason, .. } => {
                Value::Array(vec![tag, id, Value::from(reason.as_str())])
            }
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(fields) = value else {
            return Err(SyncError::InvalidMessage("expected a JSON array".into()));
        };
        let mut fields = fields.into_iter();

        let tag = next_string(&mut fields, "message tag")?;
        let id = SubscriptionId(next_string(&mut fields, "subscription id")?);

        let message = match tag.as_str() {
            Self::OPEN => {
                let filter = fields
                    .next()
                    .ok_or_else(|| SyncError::InvalidMessage("missing filter".into()))?;
                let frame = hex::decode(next_string(&mut fields, "frame")?)?;
                ControlMessage::Open { id, filter, frame }
            }
            Self::MSG => {
                let frame = hex::decode(next_string(&mut fields, "frame")?)?;
                ControlMessage::Msg { id, frame }
            }
            Self::CLOSE => ControlMessage::Close { id },
            Self::ERR => {
                let reason = next_string(&mut fields, "reason")?;
                ControlMessage::Err { id, reason }
            }
            other => {
                return Err(SyncError::InvalidMessage(format!(
                    "unknown message tag {other:?}"
                )))
            }
        };

        if fields.next().is_some() {
            return Err(SyncError::InvalidMessage(format!(
                "trailing fields in {tag}"
            )));
        }
        Ok(message)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

fn next_string(fields: &mut impl Iterator<Item = Value>, what: &str) -> Result<String> {
    match fields.next() {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(SyncError::InvalidMessage(format!("{what} must be a string"))),
        None => Err(SyncError::InvalidMessage(format!("missing {what}"))),
    }
}

impl Serialize for ControlMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ControlMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ControlMessage::from_value(value).map_err(serde::de::Error::custom)
    }
}
