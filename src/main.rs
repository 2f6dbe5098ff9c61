mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{AppCommand, AppEvent, AppModel, EventDetailOverlay, ListPane, OpenDialog};
use crate::cli::CliInvocation;
use crate::infra::{
    DialogCatalog, LoaderConfig, LoaderConfigError, MessageStream, init_file_logging,
    init_stderr_logging, load_loader_config, local_utc_offset, resolve_manifest_path,
};
use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind};
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use thiserror::Error;
use time::UtcOffset;

const IDLE_POLL: Duration = Duration::from_millis(200);
const BUSY_POLL: Duration = Duration::from_millis(30);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    Config(#[from] LoaderConfigError),
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    // Must run before any thread exists.
    let utc_offset = local_utc_offset();

    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Tui { manifest } => {
            let config = load_loader_config()?;
            init_file_logging().map_err(app::AppError::from)?;
            Ok(run_tui(manifest.as_deref(), config, utc_offset)?)
        }
        CliInvocation::Command(command) => {
            let config = load_loader_config()?;
            init_stderr_logging();
            crate::cli::run(command, config, utc_offset)?;
            Ok(())
        }
    }
}

fn print_help() {
    let text = format!(
        "{name} - browse chat dumps (dialog manifest + JSONL event logs)\n\nUSAGE:\n  {name} [--manifest PATH]                          Start the TUI\n  {name} dialogs [--manifest PATH] [FLAGS]          List dialogs, newest first\n  {name} history <dialog-id|log> [--manifest PATH] [FLAGS] [--json]  Print a dialog's messages\n  {name} --help | --version\n\nFLAGS:\n  -f, --filter TEXT  Keep rows containing TEXT (case-insensitive)\n  --offset N         Skip first N rows after filtering (default: 0)\n  --limit N          Max rows to print (default: all)\n  --json             history: print the original events as JSON lines\n\nOUTPUT:\n  dialogs: id<TAB>name<TAB>log_path\n  history: one formatted row per event (status lines go to stderr)\n\nENV:\n  DUMPVIEW_MANIFEST            Manifest path (default: output/progress.json)\n  DUMPVIEW_CATALOG_PAGE_SIZE   Dialogs resolved per page (default: 100)\n  DUMPVIEW_MESSAGE_PAGE_SIZE   Events read per page (default: 10000)\n  DUMPVIEW_LOG                 Log filter, e.g. debug or dumpview=info (default: warn)\n  DUMPVIEW_LOG_FILE            TUI only: append logs to this file\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

fn run_tui(
    manifest: Option<&Path>,
    config: LoaderConfig,
    utc_offset: UtcOffset,
) -> Result<(), app::AppError> {
    let manifest_path = resolve_manifest_path(manifest)?;
    let mut catalog = DialogCatalog::open(&manifest_path, config.catalog_page_size)?;
    let mut stream = MessageStream::new(config.message_page_size, utc_offset);
    let status = [catalog.subscribe(), stream.subscribe()];

    let mut model = AppModel::new(catalog.manifest_path().to_path_buf());
    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let mut loaders = Loaders {
        catalog: &mut catalog,
        stream: &mut stream,
        status: &status,
    };
    let result = run(&mut terminal, &mut model, &mut loaders);
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let _ = stdout.execute(EnableBracketedPaste);
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    let _ = execute!(terminal.backend_mut(), DisableBracketedPaste);
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

struct Loaders<'a> {
    catalog: &'a mut DialogCatalog,
    stream: &'a mut MessageStream,
    status: &'a [Receiver<String>],
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: &mut AppModel,
    loaders: &mut Loaders<'_>,
) -> Result<(), app::AppError> {
    loop {
        let busy = pump(model, loaders);

        let sources = ui::RenderSources {
            dialogs: loaders.catalog.entries(),
            messages: loaders.stream.rows(),
        };
        terminal.draw(|frame| ui::render(frame, model, &sources))?;

        let timeout = if busy { BUSY_POLL } else { IDLE_POLL };
        if !event::poll(timeout)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                let (next, command) = app::update(model.clone(), AppEvent::Key(key));
                *model = next;
                match command {
                    AppCommand::None => {}
                    AppCommand::Quit => return Ok(()),
                    AppCommand::OpenDialog { source_index } => {
                        open_dialog(model, loaders, source_index);
                    }
                    AppCommand::OpenEventDetail { source_index } => {
                        open_event_detail(model, loaders.stream, source_index);
                    }
                }
            }
            Event::Paste(text) => {
                let (next, _command) = app::update(model.clone(), AppEvent::Paste(text));
                *model = next;
            }
            Event::Resize(width, height) => {
                *model = model.clone().with_terminal_size(width, height);
            }
            _ => {}
        }
    }
}

/// Pulls at most one page from each loader that still has work, then refreshes both panes.
/// Returns whether another page is wanted soon.
fn pump(model: &mut AppModel, loaders: &mut Loaders<'_>) -> bool {
    let catalog_wants = model.catalog_error.is_none() && loaders.catalog.has_more();
    if catalog_wants {
        if let Err(error) = loaders.catalog.fetch_page() {
            model.catalog_error = Some(error.to_string());
        }
    }

    let stream_wants = model.wants_more_messages() && loaders.stream.has_more();
    if stream_wants {
        if let Err(error) = loaders.stream.fetch_page() {
            model.stream_error = Some(error.to_string());
        }
    }

    model.dialogs.sync(loaders.catalog.entries());
    model.messages.sync(loaders.stream.rows());
    for receiver in loaders.status {
        if let Some(message) = receiver.try_iter().last() {
            model.status = Some(message);
        }
    }

    (model.catalog_error.is_none() && loaders.catalog.has_more())
        || (model.wants_more_messages() && loaders.stream.has_more())
}

fn open_dialog(model: &mut AppModel, loaders: &mut Loaders<'_>, source_index: usize) {
    let Some(entry) = loaders.catalog.item_at(source_index).cloned() else {
        return;
    };
    match loaders.stream.set_path(&entry.filepath) {
        Ok(()) => {
            *model = model.clone().with_open_dialog(OpenDialog {
                id: entry.id,
                name: entry.name,
            });
        }
        Err(error) => {
            loaders.stream.close();
            model.open_dialog = None;
            model.messages = ListPane::new();
            *model = model.clone().with_notice(Some(error.to_string()));
        }
    }
}

fn open_event_detail(model: &mut AppModel, stream: &MessageStream, source_index: usize) {
    let Some(row) = stream.row_at(source_index) else {
        return;
    };
    match serde_json::to_string_pretty(&row.event) {
        Ok(body) => {
            *model = model.clone().with_detail(EventDetailOverlay {
                title: format!("Line {}", row.line_no),
                body,
                scroll: 0,
            });
        }
        Err(error) => {
            *model = model
                .clone()
                .with_notice(Some(format!("Cannot show event: {error}")));
        }
    }
}
