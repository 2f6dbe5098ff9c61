use crate::domain::{Event, Peer, fallback_label, full_name};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Name reported when a log never mentions the peer.
pub const UNKNOWN_PEER_NAME: &str = "UNKNOWN";

#[derive(Debug, Error)]
pub enum ResolvePeerNameError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid event at {path}:{line_no}: {source}")]
    Parse {
        path: String,
        line_no: u64,
        source: serde_json::Error,
    },
}

/// Scans `log_path` for the first event whose `to` or `from` peer is `peer_id` and returns
/// that peer's display name.
///
/// A malformed line stops the scan with an error instead of being skipped.
pub fn resolve_peer_name(peer_id: &str, log_path: &Path) -> Result<String, ResolvePeerNameError> {
    let read_error = |source: io::Error| ResolvePeerNameError::Read {
        path: log_path.display().to_string(),
        source,
    };

    let file = File::open(log_path).map_err(read_error)?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut line_no: u64 = 0;

    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).map_err(read_error)?;
        if bytes == 0 {
            return Ok(UNKNOWN_PEER_NAME.to_string());
        }
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: Event =
            serde_json::from_str(trimmed).map_err(|source| ResolvePeerNameError::Parse {
                path: log_path.display().to_string(),
                line_no,
                source,
            })?;

        if let Some(peer) = matching_peer(&event, peer_id) {
            return Ok(display_name(peer));
        }
    }
}

fn matching_peer<'a>(event: &'a Event, peer_id: &str) -> Option<&'a Peer> {
    [event.to.as_ref(), event.from.as_ref()]
        .into_iter()
        .flatten()
        .find(|peer| peer.peer_id.matches(peer_id))
}

/// `print_name`, then `First Last`, then `<peer_type>#<peer_id>`.
pub fn display_name(peer: &Peer) -> String {
    if let Some(print_name) = peer.print_name.as_deref().map(str::trim) {
        if !print_name.is_empty() {
            return print_name.to_string();
        }
    }
    full_name(peer).unwrap_or_else(|| fallback_label(peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn write_log(dir: &Path, lines: &[serde_json::Value]) -> std::path::PathBuf {
        let path = dir.join("dialog.jsonl");
        let body = lines
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&path, body).expect("write");
        path
    }

    #[test]
    fn resolves_from_side_with_names() {
        let dir = tempdir().expect("tempdir");
        let path = write_log(
            dir.path(),
            &[json!({
                "event": "message",
                "date": 0,
                "from": {"peer_id": 42, "peer_type": "user", "first_name": "A", "last_name": "B"},
                "to": {"peer_id": 1, "peer_type": "user"},
                "text": "hi"
            })],
        );

        assert_eq!(resolve_peer_name("42", &path).expect("name"), "A B");
    }

    #[test]
    fn prefers_print_name_and_checks_to_side() {
        let dir = tempdir().expect("tempdir");
        let path = write_log(
            dir.path(),
            &[
                json!({
                    "event": "message",
                    "date": 0,
                    "from": {"peer_id": 1, "peer_type": "user"},
                    "to": {"peer_id": 2, "peer_type": "user"}
                }),
                json!({
                    "event": "message",
                    "date": 1,
                    "from": {"peer_id": 1, "peer_type": "user"},
                    "to": {"peer_id": "77", "peer_type": "chat", "print_name": "Book_Club"}
                }),
            ],
        );

        assert_eq!(resolve_peer_name("77", &path).expect("name"), "Book_Club");
    }

    #[test]
    fn falls_back_to_type_and_id() {
        let dir = tempdir().expect("tempdir");
        let path = write_log(
            dir.path(),
            &[json!({
                "event": "message",
                "date": 0,
                "from": {"peer_id": 42, "peer_type": "user", "print_name": ""},
                "to": {"peer_id": 1, "peer_type": "user"}
            })],
        );

        assert_eq!(resolve_peer_name("42", &path).expect("name"), "user#42");
    }

    #[test]
    fn returns_unknown_when_never_mentioned() {
        let dir = tempdir().expect("tempdir");
        let path = write_log(
            dir.path(),
            &[json!({"event": "message", "date": 0, "from": {"peer_id": 5, "peer_type": "user"}})],
        );

        assert_eq!(resolve_peer_name("6", &path).expect("name"), UNKNOWN_PEER_NAME);
    }

    #[test]
    fn malformed_line_aborts_the_scan() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("dialog.jsonl");
        fs::write(
            &path,
            "{\"event\":\"message\",\"from\":{\"peer_id\":1,\"peer_type\":\"user\"}}\n{broken\n",
        )
        .expect("write");

        let error = resolve_peer_name("42", &path).expect_err("error");
        match error {
            ResolvePeerNameError::Parse { line_no, .. } => assert_eq!(line_no, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().expect("tempdir");
        let error = resolve_peer_name("1", &dir.path().join("absent.jsonl")).expect_err("error");
        assert!(matches!(error, ResolvePeerNameError::Read { .. }));
    }
}
