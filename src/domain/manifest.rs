use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid record for dialog {id}: {source}")]
    InvalidDialog {
        id: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    dialogs: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct DialogRecord {
    newest_date: i64,
    dumper_state: DumperState,
}

#[derive(Debug, Deserialize)]
struct DumperState {
    outfile: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestDialog {
    pub id: String,
    pub newest_date: i64,
    /// Log path, already joined onto the manifest directory.
    pub outfile: PathBuf,
}

/// Parses a manifest and returns its dialogs newest first.
///
/// Dialogs sharing a `newest_date` keep their manifest order.
pub fn parse_manifest(
    text: &str,
    manifest_dir: &Path,
) -> Result<Vec<ManifestDialog>, ManifestError> {
    let parsed: ManifestFile = serde_json::from_str(text)?;
    let Some(dialogs) = parsed.dialogs else {
        return Err(ManifestError::MissingField("dialogs"));
    };

    let mut out = Vec::with_capacity(dialogs.len());
    for (id, value) in dialogs {
        let record: DialogRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(source) => return Err(ManifestError::InvalidDialog { id, source }),
        };
        out.push(ManifestDialog {
            outfile: manifest_dir.join(&record.dumper_state.outfile),
            newest_date: record.newest_date,
            id,
        });
    }

    out.sort_by_key(|dialog| Reverse(dialog.newest_date));
    Ok(out)
}
