use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Peer identifiers show up as JSON numbers in most dumps and as strings in a few;
/// both forms compare through their string rendering.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeerId {
    Number(i64),
    Text(String),
}

impl PeerId {
    pub fn matches(&self, other: &str) -> bool {
        match self {
            Self::Number(value) => value.to_string() == other,
            Self::Text(value) => value == other,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub peer_id: PeerId,
    #[serde(default)]
    pub peer_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of a dialog log.
///
/// Only the fields the viewer renders are typed; everything else is kept in `extra` so the
/// original record can be shown verbatim in detail views.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Peer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Peer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fwd_from: Option<Peer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub filepath: PathBuf,
    pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DisplayRow {
    Formatted(String),
    /// Event kinds the formatter does not know, rendered as their compact JSON.
    Raw(String),
}

impl DisplayRow {
    pub fn text(&self) -> &str {
        match self {
            Self::Formatted(text) | Self::Raw(text) => text,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageRow {
    pub display: DisplayRow,
    pub event: Event,
    /// 1-based line number in the source log.
    pub line_no: u64,
}

/// Anything a filter overlay can match against.
pub trait SearchText {
    fn search_text(&self) -> &str;
}

impl SearchText for CatalogEntry {
    fn search_text(&self) -> &str {
        &self.name
    }
}

impl SearchText for MessageRow {
    fn search_text(&self) -> &str {
        self.display.text()
    }
}

impl SearchText for String {
    fn search_text(&self) -> &str {
        self
    }
}
