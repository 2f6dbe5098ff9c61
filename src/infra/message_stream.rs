use crate::domain::{
    DisplayRow, Event, FormatError, MessageRow, PageDelta, PagedList, display_row,
    progress_status,
};
use crate::infra::StatusFeed;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use thiserror::Error;
use time::UtcOffset;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SetPathError {
    #[error("failed to open dialog log {path}: {source}")]
    Open { path: String, source: io::Error },
}

#[derive(Debug, Error)]
pub enum FetchMessagesPageError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid event at {path}:{line_no}: {source}")]
    Parse {
        path: String,
        line_no: u64,
        source: serde_json::Error,
    },

    #[error("failed to format event at {path}:{line_no}: {source}")]
    Format {
        path: String,
        line_no: u64,
        source: FormatError,
    },
}

/// Open log plus the position reached so far. Never leaves this module.
#[derive(Debug)]
struct LogCursor {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    line_no: u64,
}

#[derive(Clone, Copy, Debug)]
struct Checkpoint {
    offset: u64,
    line_no: u64,
}

impl LogCursor {
    fn open(path: &Path) -> io::Result<Self> {
        if path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("path is a directory: {}", path.display()),
            ));
        }
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            offset: 0,
            line_no: 0,
        })
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            offset: self.offset,
            line_no: self.line_no,
        }
    }

    fn rewind(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(checkpoint.offset))?;
        self.offset = checkpoint.offset;
        self.line_no = checkpoint.line_no;
        Ok(())
    }

    fn read_line(&mut self, line: &mut String) -> io::Result<usize> {
        line.clear();
        let bytes = self.reader.read_line(line)?;
        if bytes > 0 {
            self.offset += bytes as u64;
            self.line_no += 1;
        }
        Ok(bytes)
    }

    /// Reads, parses and formats up to `limit` raw lines, blank ones included. The flag is set
    /// when EOF was reached.
    fn read_page(
        &mut self,
        limit: usize,
        utc_offset: UtcOffset,
    ) -> Result<(Vec<MessageRow>, bool), FetchMessagesPageError> {
        let mut rows = Vec::new();
        let mut line = String::new();

        for _ in 0..limit {
            let bytes = self
                .read_line(&mut line)
                .map_err(|source| FetchMessagesPageError::Read {
                    path: self.path.display().to_string(),
                    source,
                })?;
            if bytes == 0 {
                return Ok((rows, true));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let line_no = self.line_no;
            let event: Event = serde_json::from_str(trimmed).map_err(|source| {
                FetchMessagesPageError::Parse {
                    path: self.path.display().to_string(),
                    line_no,
                    source,
                }
            })?;
            let display =
                display_row(&event, utc_offset).map_err(|source| FetchMessagesPageError::Format {
                    path: self.path.display().to_string(),
                    line_no,
                    source,
                })?;
            rows.push(MessageRow {
                display,
                event,
                line_no,
            });
        }

        Ok((rows, false))
    }
}

/// Formatted rows of one dialog log, read a page at a time.
///
/// [`MessageStream::set_path`] switches to another log: the previous handle is closed and
/// every row materialized for it is dropped before the new file is opened.
#[derive(Debug)]
pub struct MessageStream {
    cursor: Option<LogCursor>,
    rows: PagedList<MessageRow>,
    page_size: usize,
    utc_offset: UtcOffset,
    status: StatusFeed,
}

impl MessageStream {
    pub fn new(page_size: usize, utc_offset: UtcOffset) -> Self {
        Self {
            cursor: None,
            rows: PagedList::new(),
            page_size: page_size.max(1),
            utc_offset,
            status: StatusFeed::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<String> {
        self.status.subscribe()
    }

    /// Starts streaming `path` from its first line.
    ///
    /// Rows of the previous log are gone when this returns, even if `path` cannot be opened;
    /// in that case the stream is left idle.
    pub fn set_path(&mut self, path: &Path) -> Result<(), SetPathError> {
        self.cursor = None;
        self.rows.reset();

        let cursor = LogCursor::open(path).map_err(|source| SetPathError::Open {
            path: path.display().to_string(),
            source,
        })?;
        self.cursor = Some(cursor);

        info!("streaming dialog log {}", path.display());
        self.status.emit(path.display().to_string());
        Ok(())
    }

    /// Drops the open log and its rows.
    pub fn close(&mut self) {
        self.cursor = None;
        self.rows.reset();
    }

    pub fn path(&self) -> Option<&Path> {
        self.cursor.as_ref().map(|cursor| cursor.path.as_path())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some() && !self.rows.is_exhausted()
    }

    pub fn rows(&self) -> &PagedList<MessageRow> {
        &self.rows
    }

    pub fn row_at(&self, index: usize) -> Option<&MessageRow> {
        self.rows.get(index)
    }

    pub fn item_at(&self, index: usize) -> Option<&DisplayRow> {
        self.rows.get(index).map(|row| &row.display)
    }

    pub fn event_at(&self, index: usize) -> Option<&Event> {
        self.rows.get(index).map(|row| &row.event)
    }

    /// Reads the next page. Returns `None` when idle or already exhausted.
    ///
    /// A failing page appends nothing and rewinds to where it started, so calling again
    /// re-reads the same lines.
    pub fn fetch_page(&mut self) -> Result<Option<PageDelta>, FetchMessagesPageError> {
        if self.rows.is_exhausted() {
            return Ok(None);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let checkpoint = cursor.checkpoint();
        let (batch, exhausted) = match cursor.read_page(self.page_size, self.utc_offset) {
            Ok(page) => page,
            Err(error) => {
                warn!("message page failed: {error}");
                if let Err(rewind_error) = cursor.rewind(checkpoint) {
                    warn!(
                        "failed to rewind {}: {rewind_error}; closing stream",
                        cursor.path.display()
                    );
                    self.cursor = None;
                }
                return Err(error);
            }
        };

        let delta = self.rows.commit(batch, exhausted);
        debug!(
            "message page committed: rows {}..{} exhausted={}",
            delta.start,
            delta.end(),
            delta.exhausted
        );
        self.status
            .emit(progress_status(self.rows.len(), exhausted, "messages"));
        Ok(Some(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn message(date: i64, text: &str) -> String {
        json!({
            "event": "message",
            "date": date,
            "from": {"peer_id": 42, "peer_type": "user", "first_name": "A", "last_name": "B"},
            "to": {"peer_id": 1, "peer_type": "user"},
            "text": text
        })
        .to_string()
    }

    fn write_lines(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, lines.join("\n")).expect("write");
        path
    }

    #[test]
    fn streams_single_message() {
        let dir = tempdir().expect("tempdir");
        let path = write_lines(dir.path(), "42.jsonl", &[message(0, "hi")]);

        let mut stream = MessageStream::new(10_000, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");
        assert!(stream.has_more());

        stream.fetch_page().expect("fetch");

        assert!(!stream.has_more());
        assert_eq!(stream.row_count(), 1);
        assert_eq!(
            stream.item_at(0).map(DisplayRow::text),
            Some("[1970-01-01 00:00:00] A B: hi")
        );
        let event = stream.event_at(0).expect("event");
        assert_eq!(event.text, Some(json!("hi")));
    }

    #[test]
    fn pages_are_bounded_and_report_progress() {
        let dir = tempdir().expect("tempdir");
        let lines: Vec<String> = (0..5).map(|i| message(i, &format!("m{i}"))).collect();
        let path = write_lines(dir.path(), "log.jsonl", &lines);

        let mut stream = MessageStream::new(2, UtcOffset::UTC);
        let status = stream.subscribe();
        stream.set_path(&path).expect("set path");

        let first = stream.fetch_page().expect("fetch").expect("delta");
        assert_eq!((first.start, first.count, first.exhausted), (0, 2, false));
        stream.fetch_page().expect("fetch");
        let last = stream.fetch_page().expect("fetch").expect("delta");
        assert_eq!((last.start, last.count, last.exhausted), (4, 1, true));

        let messages: Vec<String> = status.try_iter().collect();
        assert_eq!(
            messages,
            vec![
                path.display().to_string(),
                "Total: 2+ messages.".to_string(),
                "Total: 4+ messages.".to_string(),
                "Total: 5 messages.".to_string(),
            ]
        );

        assert!(stream.fetch_page().expect("fetch").is_none());
        assert_eq!(stream.row_count(), 5);
        assert_eq!(status.try_iter().count(), 0);
    }

    #[test]
    fn page_that_finds_eof_exactly_commits_empty_batch() {
        let dir = tempdir().expect("tempdir");
        let path = write_lines(dir.path(), "log.jsonl", &[message(0, "a"), message(1, "b")]);

        let mut stream = MessageStream::new(2, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");

        let first = stream.fetch_page().expect("fetch").expect("delta");
        assert!(!first.exhausted);
        let second = stream.fetch_page().expect("fetch").expect("delta");
        assert_eq!(second.count, 0);
        assert!(second.exhausted);
        assert!(!stream.has_more());
    }

    #[test]
    fn unknown_events_become_raw_rows() {
        let dir = tempdir().expect("tempdir");
        let raw = json!({"event": "read", "date": 3}).to_string();
        let path = write_lines(dir.path(), "log.jsonl", &[raw, message(0, "hi")]);

        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");
        stream.fetch_page().expect("fetch");

        let first = stream.item_at(0).expect("row");
        assert!(first.is_raw());
        assert!(first.text().contains("\"read\""));
        assert!(!stream.item_at(1).expect("row").is_raw());
    }

    #[test]
    fn skips_blank_lines_but_keeps_line_numbers() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        fs::write(&path, format!("{}\n\n{}\n", message(0, "a"), message(1, "b"))).expect("write");

        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");
        stream.fetch_page().expect("fetch");

        assert_eq!(stream.row_count(), 2);
        assert_eq!(stream.row_at(1).expect("row").line_no, 3);
    }

    #[test]
    fn blank_lines_count_toward_the_page_size() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        fs::write(&path, format!("\n\n\n\n{}\n", message(0, "late"))).expect("write");

        let mut stream = MessageStream::new(2, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");

        let first = stream.fetch_page().expect("fetch").expect("delta");
        assert_eq!((first.count, first.exhausted), (0, false));
        let second = stream.fetch_page().expect("fetch").expect("delta");
        assert_eq!((second.count, second.exhausted), (0, false));
        let third = stream.fetch_page().expect("fetch").expect("delta");
        assert_eq!(third.count, 1);
        assert_eq!(stream.row_at(0).expect("row").line_no, 5);
    }

    #[test]
    fn set_path_discards_previous_rows_immediately() {
        let dir = tempdir().expect("tempdir");
        let first = write_lines(dir.path(), "a.jsonl", &[message(0, "a1"), message(1, "a2")]);
        let second = write_lines(dir.path(), "b.jsonl", &[message(0, "b1")]);

        let mut stream = MessageStream::new(1, UtcOffset::UTC);
        stream.set_path(&first).expect("set path");
        stream.fetch_page().expect("fetch");
        let old_generation = stream.rows().generation();

        stream.set_path(&second).expect("set path");
        assert_eq!(stream.row_count(), 0);
        assert!(stream.has_more());
        assert_ne!(stream.rows().generation(), old_generation);
        assert_eq!(stream.path(), Some(second.as_path()));

        while stream.has_more() {
            stream.fetch_page().expect("fetch");
        }
        let texts: Vec<&str> = stream
            .rows()
            .items()
            .iter()
            .map(|row| row.display.text())
            .collect();
        assert_eq!(texts, vec!["[1970-01-01 00:00:00] A B: b1"]);
    }

    #[test]
    fn repeated_switches_leave_one_open_log() {
        let dir = tempdir().expect("tempdir");
        let path = write_lines(dir.path(), "a.jsonl", &[message(0, "a")]);

        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        for _ in 0..256 {
            stream.set_path(&path).expect("set path");
            stream.fetch_page().expect("fetch");
        }
        assert_eq!(stream.row_count(), 1);
    }

    #[test]
    fn missing_log_fails_set_path_and_leaves_stream_idle() {
        let dir = tempdir().expect("tempdir");
        let good = write_lines(dir.path(), "a.jsonl", &[message(0, "a")]);

        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        stream.set_path(&good).expect("set path");
        stream.fetch_page().expect("fetch");

        let error = stream
            .set_path(&dir.path().join("absent.jsonl"))
            .expect_err("error");
        assert!(matches!(error, SetPathError::Open { .. }));
        assert_eq!(stream.row_count(), 0);
        assert!(!stream.has_more());
        assert!(stream.path().is_none());
        assert!(stream.fetch_page().expect("fetch").is_none());
    }

    #[test]
    fn directory_path_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        let error = stream.set_path(dir.path()).expect_err("error");
        let SetPathError::Open { source, .. } = error;
        assert_eq!(source.kind(), io::ErrorKind::IsADirectory);
    }

    #[test]
    fn idle_fetch_is_a_no_op() {
        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        assert!(!stream.has_more());
        assert!(stream.fetch_page().expect("fetch").is_none());
    }

    #[test]
    fn failing_page_commits_nothing_and_retries_from_the_same_line() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let good = message(0, "ok");
        fs::write(&path, format!("{good}\n{good}\n{{broken\n{good}\n")).expect("write");

        let mut stream = MessageStream::new(2, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");
        stream.fetch_page().expect("first page");
        assert_eq!(stream.row_count(), 2);

        for _ in 0..2 {
            let error = stream.fetch_page().expect_err("error");
            match error {
                FetchMessagesPageError::Parse { line_no, .. } => assert_eq!(line_no, 3),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(stream.row_count(), 2);
            assert!(stream.has_more());
        }
    }

    #[test]
    fn message_missing_sender_fails_the_page() {
        let dir = tempdir().expect("tempdir");
        let bad = json!({"event": "message", "date": 0, "text": "orphan"}).to_string();
        let path = write_lines(dir.path(), "log.jsonl", &[message(0, "fine"), bad]);

        let mut stream = MessageStream::new(10, UtcOffset::UTC);
        stream.set_path(&path).expect("set path");
        let error = stream.fetch_page().expect_err("error");
        assert!(matches!(
            error,
            FetchMessagesPageError::Format {
                line_no: 2,
                source: FormatError::MissingField("from"),
                ..
            }
        ));
        assert_eq!(stream.row_count(), 0);
    }
}
