//! Streamed run events and their lineage context
//!
//! Every item a run produces is an [`Event`]. On the wire it is a JSON
//! object `{"type", "data", "context"?}`; consumers (HTTP streaming,
//! transcript persistence, evaluation) depend on this shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::unit::UnitKind;

/// Discriminant of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Notice,
    Text,
    ToolCall,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notice => "notice",
            Self::Text => "text",
            Self::ToolCall => "tool_call",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific event data
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Notice { message: String },
    Text { delta: String },
    ToolCall { name: String, args: Value },
    Error { message: String },
}

/// Who produced an event and which managers forwarded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub unit_id: String,
    pub unit_label: String,
    pub unit_kind: UnitKind,
    /// Manager ids the event passed through, nearest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lineage: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_kind: Option<UnitKind>,
}

impl EventContext {
    pub fn new(unit_id: impl Into<String>, unit_label: impl Into<String>, unit_kind: UnitKind) -> Self {
        Self {
            unit_id: unit_id.into(),
            unit_label: unit_label.into(),
            unit_kind,
            lineage: Vec::new(),
            via: None,
            via_label: None,
            via_kind: None,
        }
    }
}

/// A single item of a run's event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub struct Event {
    pub payload: EventPayload,
    pub context: Option<EventContext>,
}

impl Event {
    fn bare(payload: EventPayload) -> Self {
        Self {
            payload,
            context: None,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::bare(EventPayload::Notice {
            message: message.into(),
        })
    }

    pub fn text(delta: impl Into<String>) -> Self {
        Self::bare(EventPayload::Text {
            delta: delta.into(),
        })
    }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        Self::bare(EventPayload::ToolCall {
            name: name.into(),
            args,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::bare(EventPayload::Error {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Notice { .. } => EventKind::Notice,
            EventPayload::Text { .. } => EventKind::Text,
            EventPayload::ToolCall { .. } => EventKind::ToolCall,
            EventPayload::Error { .. } => EventKind::Error,
        }
    }

    /// Message of a notice or error
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Notice { message } | EventPayload::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Delta of a text event
    pub fn delta(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text { delta } => Some(delta),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind() == EventKind::Error
    }

    /// Id of the unit that produced the event, if stamped
    pub fn unit_id(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.unit_id.as_str())
    }

    /// Lineage recorded so far (empty if never forwarded)
    pub fn lineage(&self) -> &[String] {
        self.context
            .as_ref()
            .map(|c| c.lineage.as_slice())
            .unwrap_or(&[])
    }

    /// Stamp the producing unit unless a producer is already recorded
    pub fn with_default_context(mut self, context: impl FnOnce() -> EventContext) -> Self {
        if self.context.is_none() {
            self.context = Some(context());
        }
        self
    }

    /// Record that a manager forwarded this event
    pub fn forwarded_by(mut self, id: &str, label: &str, kind: UnitKind) -> Self {
        if let Some(ctx) = self.context.as_mut() {
            if ctx.lineage.last().map(String::as_str) != Some(id) {
                ctx.lineage.push(id.to_string());
            }
            ctx.via = Some(id.to_string());
            ctx.via_label = Some(label.to_string());
            ctx.via_kind = Some(kind);
        }
        self
    }

    /// Render as one newline-terminated JSON line
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<EventContext>,
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let kind = event.kind();
        let data = match event.payload {
            EventPayload::Notice { message } | EventPayload::Error { message } => {
                json!({ "message": message })
            }
            EventPayload::Text { delta } => json!({ "delta": delta }),
            EventPayload::ToolCall { name, args } => json!({ "name": name, "args": args }),
        };
        Self {
            kind,
            data,
            context: event.context,
        }
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let text_field = |field: &str| {
            wire.data
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| format!("{} event is missing data.{}", wire.kind, field))
        };

        let payload = match wire.kind {
            EventKind::Notice => EventPayload::Notice {
                message: text_field("message")?,
            },
            EventKind::Error => EventPayload::Error {
                message: text_field("message")?,
            },
            EventKind::Text => EventPayload::Text {
                delta: text_field("delta")?,
            },
            EventKind::ToolCall => EventPayload::ToolCall {
                name: text_field("name")?,
                args: wire.data.get("args").cloned().unwrap_or(Value::Null),
            },
        };

        Ok(Self {
            payload,
            context: wire.context,
        })
    }
}
