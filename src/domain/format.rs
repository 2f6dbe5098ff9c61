use crate::domain::{DisplayRow, Event, Peer};
use serde_json::Value;
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("timestamp out of range: {0}")]
    DateOutOfRange(i64),

    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Formatted<'a> {
    Text(String),
    /// The event is not a message or service notice; callers decide how to show it.
    Passthrough(&'a Event),
}

pub fn is_formattable_kind(kind: &str) -> bool {
    matches!(kind, "message" | "service")
}

/// Renders `[YYYY-MM-DD HH:MM:SS] <from>[ [FWD: <fwd>]]: <payload>` with the date shifted
/// into `offset`.
pub fn format_event(event: &Event, offset: UtcOffset) -> Result<Formatted<'_>, FormatError> {
    if !is_formattable_kind(&event.event) {
        return Ok(Formatted::Passthrough(event));
    }

    let date = event.date.ok_or(FormatError::MissingField("date"))?;
    let from = event.from.as_ref().ok_or(FormatError::MissingField("from"))?;

    let timestamp = format_timestamp(date, offset)?;
    let from_label = peer_label(from);
    let fwd_suffix = event
        .fwd_from
        .as_ref()
        .map(|peer| format!(" [FWD: {}]", peer_label(peer)))
        .unwrap_or_default();
    let payload = payload_text(event).unwrap_or_default();

    Ok(Formatted::Text(format!(
        "[{timestamp}] {from_label}{fwd_suffix}: {payload}"
    )))
}

/// Formats an event into the row shown in lists; passthrough events become their raw JSON.
pub fn display_row(event: &Event, offset: UtcOffset) -> Result<DisplayRow, FormatError> {
    match format_event(event, offset)? {
        Formatted::Text(text) => Ok(DisplayRow::Formatted(text)),
        Formatted::Passthrough(event) => Ok(DisplayRow::Raw(serde_json::to_string(event)?)),
    }
}

pub fn format_timestamp(unix_seconds: i64, offset: UtcOffset) -> Result<String, FormatError> {
    let utc = OffsetDateTime::from_unix_timestamp(unix_seconds)
        .map_err(|_| FormatError::DateOutOfRange(unix_seconds))?;
    let local = utc.to_offset(offset);
    Ok(local.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))?)
}

/// `First Last` when both parts are present, otherwise `<peer_type>#<peer_id>`.
pub fn peer_label(peer: &Peer) -> String {
    full_name(peer).unwrap_or_else(|| fallback_label(peer))
}

/// Both parts must be non-blank; only the whitespace around the joined name is trimmed.
pub fn full_name(peer: &Peer) -> Option<String> {
    let first = non_blank(peer.first_name.as_deref())?;
    let last = non_blank(peer.last_name.as_deref())?;
    Some(format!("{first} {last}").trim().to_string())
}

pub fn fallback_label(peer: &Peer) -> String {
    format!("{}#{}", peer.peer_type, peer.peer_id)
}

/// First present payload among `text`, `media`, `action`.
pub fn payload_value(event: &Event) -> Option<&Value> {
    [&event.text, &event.media, &event.action]
        .into_iter()
        .find_map(|field| field.as_ref())
}

pub fn payload_text(event: &Event) -> Option<String> {
    payload_value(event).map(|value| match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
