use crate::domain::{
    CatalogEntry, ManifestDialog, ManifestError, PageDelta, PagedList, parse_manifest,
    progress_status,
};
use crate::infra::{ResolvePeerNameError, StatusFeed, resolve_peer_name};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OpenCatalogError {
    #[error("failed to read manifest {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid manifest {path}: {source}")]
    Parse { path: String, source: ManifestError },
}

#[derive(Debug, Error)]
pub enum FetchCatalogPageError {
    #[error("failed to resolve name for dialog {id}: {source}")]
    Resolve {
        id: String,
        source: ResolvePeerNameError,
    },
}

/// Dialogs listed by a manifest, with display names resolved a page at a time.
///
/// The manifest order (newest first) is fixed when the catalog opens. Each call to
/// [`DialogCatalog::fetch_page`] resolves the next batch of names and appends the whole batch
/// at once, or nothing if any name in it fails to resolve.
#[derive(Debug)]
pub struct DialogCatalog {
    manifest_path: PathBuf,
    dialogs: Vec<ManifestDialog>,
    entries: PagedList<CatalogEntry>,
    page_size: usize,
    status: StatusFeed,
}

impl DialogCatalog {
    pub fn open(manifest_path: &Path, page_size: usize) -> Result<Self, OpenCatalogError> {
        let text = fs::read_to_string(manifest_path).map_err(|source| OpenCatalogError::Read {
            path: manifest_path.display().to_string(),
            source,
        })?;
        let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new(""));
        let dialogs =
            parse_manifest(&text, manifest_dir).map_err(|source| OpenCatalogError::Parse {
                path: manifest_path.display().to_string(),
                source,
            })?;

        info!(
            "opened manifest {} with {} dialogs",
            manifest_path.display(),
            dialogs.len()
        );

        Ok(Self {
            manifest_path: manifest_path.to_path_buf(),
            dialogs,
            entries: PagedList::new(),
            page_size: page_size.max(1),
            status: StatusFeed::new(),
        })
    }

    /// Replaces this catalog with one built from `manifest_path`.
    ///
    /// Status subscribers carry over and the entry list moves to a new generation. On error
    /// the current catalog is left as it was.
    pub fn reset(&mut self, manifest_path: &Path) -> Result<(), OpenCatalogError> {
        let mut next = Self::open(manifest_path, self.page_size)?;
        next.status = std::mem::take(&mut self.status);
        next.entries = std::mem::take(&mut self.entries);
        next.entries.reset();
        *self = next;
        Ok(())
    }

    pub fn subscribe(&mut self) -> Receiver<String> {
        self.status.subscribe()
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn total_dialogs(&self) -> usize {
        self.dialogs.len()
    }

    pub fn row_count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_more(&self) -> bool {
        !self.entries.is_exhausted()
    }

    pub fn entries(&self) -> &PagedList<CatalogEntry> {
        &self.entries
    }

    pub fn item_at(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    /// Log path of any manifest dialog, named yet or not.
    pub fn path_for(&self, id: &str) -> Option<&Path> {
        self.dialogs
            .iter()
            .find(|dialog| dialog.id == id)
            .map(|dialog| dialog.outfile.as_path())
    }

    /// Resolves the next page of names. Returns `None` once the catalog is exhausted.
    pub fn fetch_page(&mut self) -> Result<Option<PageDelta>, FetchCatalogPageError> {
        if self.entries.is_exhausted() {
            return Ok(None);
        }

        let start = self.entries.len();
        let end = (start + self.page_size).min(self.dialogs.len());

        let mut batch = Vec::with_capacity(end - start);
        for dialog in &self.dialogs[start..end] {
            let name = match resolve_peer_name(&dialog.id, &dialog.outfile) {
                Ok(name) => name,
                Err(source) => {
                    warn!("catalog page at {start} failed on dialog {}: {source}", dialog.id);
                    return Err(FetchCatalogPageError::Resolve {
                        id: dialog.id.clone(),
                        source,
                    });
                }
            };
            batch.push(CatalogEntry {
                id: dialog.id.clone(),
                filepath: dialog.outfile.clone(),
                name,
            });
        }

        let exhausted = end >= self.dialogs.len();
        let delta = self.entries.commit(batch, exhausted);
        debug!(
            "catalog page committed: rows {}..{} exhausted={}",
            delta.start,
            delta.end(),
            delta.exhausted
        );
        self.status
            .emit(progress_status(self.entries.len(), exhausted, "dialogs"));
        Ok(Some(delta))
    }
}
