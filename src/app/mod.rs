mod query;

use crate::domain::{FilterView, PagedList, SearchText};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use thiserror::Error;

pub use query::QueryEditor;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ResolveManifest(#[from] crate::infra::ResolveManifestPathError),

    #[error(transparent)]
    OpenCatalog(#[from] crate::infra::OpenCatalogError),

    #[error(transparent)]
    InitLogging(#[from] crate::infra::InitLoggingError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pane {
    Dialogs,
    Messages,
}

impl Pane {
    fn toggle(self) -> Self {
        match self {
            Self::Dialogs => Self::Messages,
            Self::Messages => Self::Dialogs,
        }
    }
}

/// Search box, filter overlay and selection for one list.
///
/// `selected` is a position in the filtered view, not in the source list.
#[derive(Clone, Debug, Default)]
pub struct ListPane {
    pub query: QueryEditor,
    pub filter: FilterView,
    pub selected: usize,
    generation: Option<u64>,
}

impl ListPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_source(&self) -> Option<usize> {
        self.filter.source_index(self.selected)
    }

    /// Brings the filter up to date with `source`, keeping the same source row selected when
    /// it still passes the filter (or the next one that does).
    pub fn sync<T: SearchText>(&mut self, source: &PagedList<T>) {
        let reset = self.generation != Some(source.generation());
        self.generation = Some(source.generation());
        let anchor = if reset { None } else { self.selected_source() };

        self.filter.sync(source);

        self.selected = anchor
            .and_then(|index| self.filter.nearest_view_index(index))
            .unwrap_or(0);
    }

    fn apply_query(&mut self) {
        self.filter.set_pattern(self.query.text());
    }

    fn move_by(&mut self, delta: isize) {
        let len = self.filter.len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected.saturating_add_signed(delta);
        self.selected = next.min(len - 1);
    }

    fn move_to_end(&mut self) {
        self.selected = self.filter.len().saturating_sub(1);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OpenDialog {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventDetailOverlay {
    pub title: String,
    pub body: String,
    pub scroll: u16,
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub manifest_path: PathBuf,
    pub terminal_size: (u16, u16),
    pub focus: Pane,
    pub dialogs: ListPane,
    pub messages: ListPane,
    pub open_dialog: Option<OpenDialog>,
    /// Latest progress line from either loader.
    pub status: Option<String>,
    pub notice: Option<String>,
    /// Set when a page fails; pumping that loader stops until the user retries.
    pub catalog_error: Option<String>,
    pub stream_error: Option<String>,
    pub detail: Option<EventDetailOverlay>,
    pub help_open: bool,
}

impl AppModel {
    pub fn new(manifest_path: PathBuf) -> Self {
        Self {
            manifest_path,
            terminal_size: (0, 0),
            focus: Pane::Dialogs,
            dialogs: ListPane::new(),
            messages: ListPane::new(),
            open_dialog: None,
            status: None,
            notice: None,
            catalog_error: None,
            stream_error: None,
            detail: None,
            help_open: false,
        }
    }

    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_size = (width, height);
        self
    }

    pub fn with_open_dialog(mut self, dialog: OpenDialog) -> Self {
        self.open_dialog = Some(dialog);
        self.messages = ListPane::new();
        self.stream_error = None;
        self.focus = Pane::Messages;
        self
    }

    pub fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }

    pub fn with_detail(mut self, detail: EventDetailOverlay) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Rows a list pane shows at once, used for paging and for deciding when to fetch.
    pub fn list_height(&self) -> usize {
        usize::from(self.terminal_size.1.saturating_sub(6)).max(1)
    }

    /// The message stream is pulled when the selection nears the end of what is loaded, or
    /// continuously while a message filter is active.
    pub fn wants_more_messages(&self) -> bool {
        if self.stream_error.is_some() || self.open_dialog.is_none() {
            return false;
        }
        if self.messages.filter.is_active() {
            return true;
        }
        self.messages.selected + self.list_height() * 2 >= self.messages.filter.len()
    }

    fn focused_pane_mut(&mut self) -> &mut ListPane {
        match self.focus {
            Pane::Dialogs => &mut self.dialogs,
            Pane::Messages => &mut self.messages,
        }
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Paste(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    /// Start streaming the dialog at this catalog position.
    OpenDialog { source_index: usize },
    /// Show the original event at this message position.
    OpenEventDetail { source_index: usize },
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Paste(text) => {
            let mut model = model;
            if model.detail.is_none() && !model.help_open {
                let pane = model.focused_pane_mut();
                pane.query.insert_str(&text);
                pane.apply_query();
            }
            (model, AppCommand::None)
        }
    }
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;
    model.notice = None;

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return (model, AppCommand::Quit);
    }
    if ctrl && key.code == KeyCode::Char('r') {
        if model.catalog_error.take().is_some() | model.stream_error.take().is_some() {
            model.notice = Some("Retrying…".to_string());
        }
        return (model, AppCommand::None);
    }

    if let Some(mut detail) = model.detail.take() {
        let keep_open = match key.code {
            KeyCode::Esc | KeyCode::Enter => false,
            KeyCode::Up => {
                detail.scroll = detail.scroll.saturating_sub(1);
                true
            }
            KeyCode::Down => {
                detail.scroll = detail.scroll.saturating_add(1);
                true
            }
            KeyCode::PageUp => {
                detail.scroll = detail.scroll.saturating_sub(10);
                true
            }
            KeyCode::PageDown => {
                detail.scroll = detail.scroll.saturating_add(10);
                true
            }
            _ => true,
        };
        if keep_open {
            model.detail = Some(detail);
        }
        return (model, AppCommand::None);
    }

    if key.code == KeyCode::F(1) {
        model.help_open = !model.help_open;
        return (model, AppCommand::None);
    }
    if model.help_open {
        if key.code == KeyCode::Esc {
            model.help_open = false;
        }
        return (model, AppCommand::None);
    }

    let page = isize::try_from(model.list_height()).unwrap_or(isize::MAX);
    match key.code {
        KeyCode::Tab | KeyCode::BackTab => {
            model.focus = model.focus.toggle();
        }
        KeyCode::Up => model.focused_pane_mut().move_by(-1),
        KeyCode::Down => model.focused_pane_mut().move_by(1),
        KeyCode::PageUp => model.focused_pane_mut().move_by(-page),
        KeyCode::PageDown => model.focused_pane_mut().move_by(page),
        KeyCode::Home => model.focused_pane_mut().selected = 0,
        KeyCode::End => model.focused_pane_mut().move_to_end(),
        KeyCode::Left => model.focused_pane_mut().query.move_left(),
        KeyCode::Right => model.focused_pane_mut().query.move_right(),
        KeyCode::Backspace => {
            let pane = model.focused_pane_mut();
            pane.query.backspace();
            pane.apply_query();
        }
        KeyCode::Delete => {
            let pane = model.focused_pane_mut();
            pane.query.delete_forward();
            pane.apply_query();
        }
        KeyCode::Esc => {
            let focus = model.focus;
            let pane = model.focused_pane_mut();
            if !pane.query.is_empty() {
                pane.query.clear();
                pane.apply_query();
            } else if focus == Pane::Messages {
                model.focus = Pane::Dialogs;
            }
        }
        KeyCode::Enter => {
            let command = match model.focus {
                Pane::Dialogs => model
                    .dialogs
                    .selected_source()
                    .map(|source_index| AppCommand::OpenDialog { source_index }),
                Pane::Messages => model
                    .messages
                    .selected_source()
                    .map(|source_index| AppCommand::OpenEventDetail { source_index }),
            };
            return (model, command.unwrap_or(AppCommand::None));
        }
        KeyCode::Char(ch) if !ctrl => {
            let pane = model.focused_pane_mut();
            pane.query.insert_char(ch);
            pane.apply_query();
        }
        _ => {}
    }

    (model, AppCommand::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(model: AppModel, text: &str) -> AppModel {
        text.chars()
            .fold(model, |model, ch| update(model, key(KeyCode::Char(ch))).0)
    }

    fn names(rows: &[&str]) -> PagedList<String> {
        let mut list = PagedList::new();
        list.commit(rows.iter().map(|row| row.to_string()).collect(), false);
        list
    }

    fn model() -> AppModel {
        AppModel::new(PathBuf::from("progress.json")).with_terminal_size(80, 30)
    }

    #[test]
    fn typing_filters_the_focused_pane_and_keeps_selection() {
        let source = names(&["Alice", "Bob", "Alina", "Carl"]);
        let mut model = model();
        model.dialogs.sync(&source);

        let (model, _) = update(model, key(KeyCode::Down));
        let (model, _) = update(model, key(KeyCode::Down));
        assert_eq!(model.dialogs.selected_source(), Some(2));

        let mut model = type_text(model, "al");
        model.dialogs.sync(&source);
        assert_eq!(model.dialogs.filter.indices(), &[0, 2]);
        assert_eq!(model.dialogs.selected_source(), Some(2));

        let (mut model, _) = update(model, key(KeyCode::Esc));
        model.dialogs.sync(&source);
        assert_eq!(model.dialogs.filter.len(), 4);
        assert_eq!(model.dialogs.selected_source(), Some(2));
    }

    #[test]
    fn enter_maps_the_view_row_back_to_the_source_row() {
        let source = names(&["x", "match one", "y", "match two"]);
        let mut model = type_text(model(), "match");
        model.dialogs.sync(&source);

        let (model, _) = update(model, key(KeyCode::Down));
        let (model, command) = update(model, key(KeyCode::Enter));
        assert_eq!(command, AppCommand::OpenDialog { source_index: 3 });

        let mut model = model.with_open_dialog(OpenDialog {
            id: "1".to_string(),
            name: "x".to_string(),
        });
        assert_eq!(model.focus, Pane::Messages);
        model.messages.sync(&names(&["row"]));
        let (_, command) = update(model, key(KeyCode::Enter));
        assert_eq!(command, AppCommand::OpenEventDetail { source_index: 0 });
    }

    #[test]
    fn enter_on_an_empty_view_does_nothing() {
        let (_, command) = update(model(), key(KeyCode::Enter));
        assert_eq!(command, AppCommand::None);
    }

    #[test]
    fn source_reset_moves_selection_to_top() {
        let mut source = names(&["a", "b", "c"]);
        let mut model = model().with_open_dialog(OpenDialog {
            id: "1".to_string(),
            name: "one".to_string(),
        });
        model.messages.sync(&source);
        let (mut model, _) = update(model, key(KeyCode::End));
        assert_eq!(model.messages.selected, 2);

        source.reset();
        source.commit(vec!["d".to_string(), "e".to_string(), "f".to_string()], true);
        model.messages.sync(&source);
        assert_eq!(model.messages.selected, 0);
    }

    #[test]
    fn wants_more_messages_near_the_end_or_while_filtering() {
        let mut model = model().with_open_dialog(OpenDialog {
            id: "1".to_string(),
            name: "one".to_string(),
        });
        let rows: Vec<String> = (0..500).map(|i| format!("row {i}")).collect();
        let mut source = PagedList::new();
        source.commit(rows, false);
        model.messages.sync(&source);
        assert!(!model.wants_more_messages());

        let (mut model, _) = update(model, key(KeyCode::End));
        assert!(model.wants_more_messages());

        model.messages.selected = 0;
        model = type_text(model, "row");
        assert!(model.wants_more_messages());

        model.stream_error = Some("broken".to_string());
        assert!(!model.wants_more_messages());
    }

    #[test]
    fn ctrl_r_clears_page_errors() {
        let mut model = model();
        model.catalog_error = Some("bad line".to_string());
        let ctrl_r = AppEvent::Key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        let (model, command) = update(model, ctrl_r);
        assert_eq!(command, AppCommand::None);
        assert!(model.catalog_error.is_none());
        assert_eq!(model.notice.as_deref(), Some("Retrying…"));
    }

    #[test]
    fn detail_overlay_swallows_keys_until_closed() {
        let model = model().with_detail(EventDetailOverlay {
            title: "line 1".to_string(),
            body: "{}".to_string(),
            scroll: 0,
        });
        let (model, _) = update(model, key(KeyCode::Down));
        assert_eq!(model.detail.as_ref().map(|detail| detail.scroll), Some(1));
        let (model, _) = update(model, key(KeyCode::Char('x')));
        assert!(model.dialogs.query.is_empty());
        let (model, _) = update(model, key(KeyCode::Esc));
        assert!(model.detail.is_none());
    }

    #[test]
    fn quit_keys() {
        let ctrl_q = AppEvent::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert_eq!(update(model(), ctrl_q).1, AppCommand::Quit);
    }
}
