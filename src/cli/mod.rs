use crate::domain::{FilterView, PagedList, SearchText};
use crate::infra::{
    DialogCatalog, FetchCatalogPageError, FetchMessagesPageError, LoaderConfig, MessageStream,
    OpenCatalogError, ResolveManifestPathError, SetPathError, resolve_manifest_path,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use thiserror::Error;
use time::UtcOffset;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Tui { manifest: Option<PathBuf> },
    Command(CliCommand),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Dialogs {
        manifest: Option<PathBuf>,
        filter: Option<String>,
        offset: usize,
        limit: Option<usize>,
    },
    History {
        dialog: String,
        manifest: Option<PathBuf>,
        filter: Option<String>,
        offset: usize,
        limit: Option<usize>,
        json: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1).peekable();
    let mut global_manifest: Option<PathBuf> = None;
    while let Some(arg) = iter.peek() {
        match arg.as_str() {
            "--manifest" | "-m" => {
                let _ = iter.next();
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--manifest".to_string()))?;
                global_manifest = Some(PathBuf::from(value));
            }
            "--" => {
                let _ = iter.next();
                break;
            }
            _ => break,
        }
    }

    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::Tui {
            manifest: global_manifest,
        });
    };

    match subcommand.as_str() {
        "dialogs" => {
            let mut manifest = global_manifest;
            let mut filter: Option<String> = None;
            let mut offset = 0usize;
            let mut limit: Option<usize> = None;

            let mut args = iter.peekable();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--manifest" | "-m" => {
                        manifest = Some(PathBuf::from(flag_value(&mut args, "--manifest")?));
                    }
                    "--filter" | "-f" => {
                        filter = Some(flag_value(&mut args, "--filter")?.to_string());
                    }
                    "--offset" => {
                        offset = parse_usize_flag("--offset", flag_value(&mut args, "--offset")?)?;
                    }
                    "--limit" => {
                        limit = Some(parse_usize_flag(
                            "--limit",
                            flag_value(&mut args, "--limit")?,
                        )?);
                    }
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => {
                        return Err(CliParseError::UnexpectedArgument(arg.to_string()));
                    }
                }
            }

            Ok(CliInvocation::Command(CliCommand::Dialogs {
                manifest,
                filter,
                offset,
                limit,
            }))
        }
        "history" => {
            let mut dialog: Option<String> = None;
            let mut manifest = global_manifest;
            let mut filter: Option<String> = None;
            let mut offset = 0usize;
            let mut limit: Option<usize> = None;
            let mut json = false;

            let mut args = iter.peekable();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--manifest" | "-m" => {
                        manifest = Some(PathBuf::from(flag_value(&mut args, "--manifest")?));
                    }
                    "--filter" | "-f" => {
                        filter = Some(flag_value(&mut args, "--filter")?.to_string());
                    }
                    "--offset" => {
                        offset = parse_usize_flag("--offset", flag_value(&mut args, "--offset")?)?;
                    }
                    "--limit" => {
                        limit = Some(parse_usize_flag(
                            "--limit",
                            flag_value(&mut args, "--limit")?,
                        )?);
                    }
                    "--json" => json = true,
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => {
                        if dialog.is_some() {
                            return Err(CliParseError::UnexpectedArgument(arg.to_string()));
                        }
                        dialog = Some(arg.to_string());
                    }
                }
            }

            let Some(dialog) = dialog else {
                return Err(CliParseError::MissingArgument("dialog-id"));
            };

            Ok(CliInvocation::Command(CliCommand::History {
                dialog,
                manifest,
                filter,
                offset,
                limit,
                json,
            }))
        }
        other => Err(CliParseError::UnknownSubcommand(other.to_string())),
    }
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    ResolveManifest(#[from] ResolveManifestPathError),

    #[error(transparent)]
    OpenCatalog(#[from] OpenCatalogError),

    #[error(transparent)]
    FetchCatalogPage(#[from] FetchCatalogPageError),

    #[error(transparent)]
    SetPath(#[from] SetPathError),

    #[error(transparent)]
    FetchMessagesPage(#[from] FetchMessagesPageError),

    #[error("dialog not found: {0}\nHint: run `dumpview dialogs` and copy the id column.")]
    DialogNotFound(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

pub fn run(
    command: CliCommand,
    config: LoaderConfig,
    utc_offset: UtcOffset,
) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let stderr = io::stderr();
    let mut err = io::BufWriter::new(stderr.lock());

    match command {
        CliCommand::Dialogs {
            manifest,
            filter,
            offset,
            limit,
        } => {
            let manifest = resolve_manifest_path(manifest.as_deref())?;
            let mut catalog = DialogCatalog::open(&manifest, config.catalog_page_size)?;
            let status = catalog.subscribe();
            let window = OutputWindow::new(filter.as_deref(), offset, limit);
            print_paged(&mut catalog, &status, window, &mut out, &mut err, |entry| {
                Ok(format!(
                    "{}\t{}\t{}",
                    entry.id,
                    entry.name,
                    entry.filepath.display()
                ))
            })?;
        }
        CliCommand::History {
            dialog,
            manifest,
            filter,
            offset,
            limit,
            json,
        } => {
            let log_path = resolve_history_log_path(&dialog, manifest.as_deref(), config)?;
            let mut stream = MessageStream::new(config.message_page_size, utc_offset);
            let status = stream.subscribe();
            stream.set_path(&log_path)?;
            let window = OutputWindow::new(filter.as_deref(), offset, limit);
            print_paged(&mut stream, &status, window, &mut out, &mut err, |row| {
                if json {
                    Ok(serde_json::to_string(&row.event)?)
                } else {
                    Ok(row.display.text().to_string())
                }
            })?;
        }
    }

    out.flush()?;
    err.flush()?;
    Ok(())
}

/// A dialog argument that names an existing log file is streamed directly; anything else is
/// looked up as a manifest dialog id.
fn resolve_history_log_path(
    dialog: &str,
    manifest: Option<&Path>,
    config: LoaderConfig,
) -> Result<PathBuf, CliRunError> {
    let candidate = Path::new(dialog);
    if looks_like_path(dialog) && candidate.is_file() {
        return Ok(candidate.to_path_buf());
    }

    let manifest = resolve_manifest_path(manifest)?;
    let catalog = DialogCatalog::open(&manifest, config.catalog_page_size)?;
    catalog
        .path_for(dialog)
        .map(Path::to_path_buf)
        .ok_or_else(|| CliRunError::DialogNotFound(dialog.to_string()))
}

fn looks_like_path(value: &str) -> bool {
    value.contains(std::path::MAIN_SEPARATOR) || value.contains('/') || value.ends_with(".jsonl")
}

/// Loader surface the subcommands page through.
trait PagedSource {
    type Item: SearchText;

    fn rows(&self) -> &PagedList<Self::Item>;
    fn has_more(&self) -> bool;
    fn fetch(&mut self) -> Result<(), CliRunError>;
}

impl PagedSource for DialogCatalog {
    type Item = crate::domain::CatalogEntry;

    fn rows(&self) -> &PagedList<Self::Item> {
        self.entries()
    }

    fn has_more(&self) -> bool {
        DialogCatalog::has_more(self)
    }

    fn fetch(&mut self) -> Result<(), CliRunError> {
        self.fetch_page()?;
        Ok(())
    }
}

impl PagedSource for MessageStream {
    type Item = crate::domain::MessageRow;

    fn rows(&self) -> &PagedList<Self::Item> {
        MessageStream::rows(self)
    }

    fn has_more(&self) -> bool {
        MessageStream::has_more(self)
    }

    fn fetch(&mut self) -> Result<(), CliRunError> {
        self.fetch_page()?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct OutputWindow {
    filter: FilterView,
    offset: usize,
    end: Option<usize>,
}

impl OutputWindow {
    fn new(pattern: Option<&str>, offset: usize, limit: Option<usize>) -> Self {
        let mut filter = FilterView::new();
        filter.set_pattern(pattern.unwrap_or(""));
        Self {
            filter,
            offset,
            end: limit.map(|limit| offset.saturating_add(limit)),
        }
    }

    fn is_full(&self, next: usize) -> bool {
        self.end.is_some_and(|end| next >= end)
    }
}

/// Prints filtered rows as pages arrive, fetching only until the requested window is full.
fn print_paged<S: PagedSource>(
    source: &mut S,
    status: &Receiver<String>,
    window: OutputWindow,
    out: &mut impl Write,
    err: &mut impl Write,
    render: impl Fn(&S::Item) -> Result<String, CliRunError>,
) -> Result<(), CliRunError> {
    let mut window = window;
    let mut next = window.offset;

    loop {
        window.filter.sync(source.rows());
        while next < window.filter.len() && !window.is_full(next) {
            let Some(row) = window
                .filter
                .source_index(next)
                .and_then(|index| source.rows().get(index))
            else {
                break;
            };
            if !write_line(out, &render(row)?)? {
                return Ok(());
            }
            next += 1;
        }

        for message in status.try_iter() {
            if !write_line(err, &message)? {
                return Ok(());
            }
        }

        if window.is_full(next) || !source.has_more() {
            return Ok(());
        }
        source.fetch()?;
    }
}

fn flag_value<'a>(
    args: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, CliParseError> {
    args.next()
        .map(String::as_str)
        .ok_or_else(|| CliParseError::MissingFlagValue(flag.to_string()))
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

fn parse_usize_flag(flag: &str, value: &str) -> Result<usize, CliParseError> {
    value
        .parse::<usize>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}
