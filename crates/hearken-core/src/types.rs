//! Listener data model
//!
//! Persisted shapes ([`ListenerDefinition`], [`ListenerChange`]), the
//! administrative input ([`ListenerForm`]) and the runtime event
//! ([`ListenerEvent`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Store-assigned listener identity. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub i64);

impl ListenerId {
    /// Raw integer value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ListenerId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A stored, named script bound to one or more event-type selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerDefinition {
    pub id: ListenerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub selectors: Vec<String>,
    pub script_body: String,
    pub enabled: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl ListenerDefinition {
    /// Whether this listener subscribes to `event_type`
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.selectors.iter().any(|s| s == event_type)
    }
}

/// Administrative input for create and update.
///
/// Field names follow the JSON the REST layer receives (`scriptBody`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub script_body: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Free-form note recorded in the change log
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ListenerForm {
    /// Create an enabled form with a single selector
    pub fn new(
        name: impl Into<String>,
        selector: impl Into<String>,
        script_body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            selectors: vec![selector.into()],
            script_body: script_body.into(),
            enabled: true,
            comment: None,
        }
    }

    /// Replace the selectors
    pub fn with_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Attach a change-log comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A validated definition awaiting an id from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListener {
    pub name: String,
    pub description: Option<String>,
    pub selectors: Vec<String>,
    pub script_body: String,
    pub enabled: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl NewListener {
    /// Attach the store-assigned id
    pub fn into_definition(self, id: ListenerId) -> ListenerDefinition {
        ListenerDefinition {
            id,
            name: self.name,
            description: self.description,
            selectors: self.selectors,
            script_body: self.script_body,
            enabled: self.enabled,
            updated_by: self.created_by.clone(),
            updated_at: self.created_at,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// What happened to a listener in a change-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Stable storage name
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }

    /// Parse the storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ChangeKind::Created),
            "updated" => Some(ChangeKind::Updated),
            "deleted" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// One entry in a listener's change history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerChange {
    pub listener_id: ListenerId,
    pub author: String,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Body accepted by this change (the last body for deletions)
    pub script_body: String,
    pub recorded_at: DateTime<Utc>,
}

/// Inbound notification from the host event source.
///
/// The payload is opaque to the engine and handed to scripts unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerEvent {
    pub event_type: String,
    #[serde(default)]
    pub payload: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl ListenerEvent {
    /// Create an event stamped with the current time
    pub fn new(event_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            occurred_at: Utc::now(),
        }
    }
}
