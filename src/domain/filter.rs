use crate::domain::{PagedList, SearchText};

/// Read-through view that keeps the source rows whose text contains a pattern,
/// case-insensitively.
///
/// The view never holds source rows, only their indices, in source order. Call
/// [`FilterView::sync`] after the pattern changes or the source grows; appended rows are
/// scanned incrementally, a pattern change or a source reset rescans from the start.
#[derive(Clone, Debug, Default)]
pub struct FilterView {
    pattern: String,
    needle: String,
    indices: Vec<usize>,
    scanned: usize,
    generation: Option<u64>,
    dirty: bool,
}

impl FilterView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_active(&self) -> bool {
        !self.needle.is_empty()
    }

    pub fn set_pattern(&mut self, pattern: &str) {
        if self.pattern == pattern {
            return;
        }
        self.pattern = pattern.to_string();
        self.needle = pattern.to_lowercase();
        self.dirty = true;
    }

    pub fn sync<T: SearchText>(&mut self, source: &PagedList<T>) {
        let generation_changed = self.generation != Some(source.generation());
        if self.dirty || generation_changed || source.len() < self.scanned {
            self.indices.clear();
            self.scanned = 0;
            self.generation = Some(source.generation());
            self.dirty = false;
        }

        let items = source.items();
        for (index, item) in items.iter().enumerate().skip(self.scanned) {
            if matches_needle(item.search_text(), &self.needle) {
                self.indices.push(index);
            }
        }
        self.scanned = items.len();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Source position of the row shown at `view_index`.
    pub fn source_index(&self, view_index: usize) -> Option<usize> {
        self.indices.get(view_index).copied()
    }

    /// View position of `source_index`, if that row passes the filter.
    pub fn view_index(&self, source_index: usize) -> Option<usize> {
        self.indices.binary_search(&source_index).ok()
    }

    /// Closest view position at or after `source_index`, clamped to the last row.
    pub fn nearest_view_index(&self, source_index: usize) -> Option<usize> {
        if self.indices.is_empty() {
            return None;
        }
        let position = self.indices.partition_point(|index| *index < source_index);
        Some(position.min(self.indices.len() - 1))
    }
}

fn matches_needle(text: &str, needle: &str) -> bool {
    needle.is_empty() || text.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(rows: &[&str]) -> PagedList<String> {
        let mut list = PagedList::new();
        list.commit(rows.iter().map(|row| row.to_string()).collect(), false);
        list
    }

    #[test]
    fn empty_pattern_passes_everything() {
        let list = source(&["a", "b"]);
        let mut view = FilterView::new();
        view.sync(&list);
        assert_eq!(view.indices(), &[0, 1]);
        assert!(!view.is_active());
    }

    #[test]
    fn matches_substrings_case_insensitively() {
        let list = source(&["Hello World", "nothing", "say HELLO", "hel lo"]);
        let mut view = FilterView::new();
        view.set_pattern("hello");
        view.sync(&list);

        assert_eq!(view.indices(), &[0, 2]);
        for index in 0..list.len() {
            let text = list.get(index).expect("row");
            let expected = text.to_lowercase().contains("hello");
            assert_eq!(view.view_index(index).is_some(), expected, "{text}");
        }
    }

    #[test]
    fn maps_positions_both_ways() {
        let list = source(&["x1", "y", "x2", "x3"]);
        let mut view = FilterView::new();
        view.set_pattern("X");
        view.sync(&list);

        assert_eq!(view.source_index(1), Some(2));
        assert_eq!(view.view_index(2), Some(1));
        assert_eq!(view.view_index(1), None);
        assert_eq!(view.source_index(3), None);
        assert_eq!(view.nearest_view_index(1), Some(1));
        assert_eq!(view.nearest_view_index(99), Some(2));
    }

    #[test]
    fn scans_appended_rows_incrementally() {
        let mut list = source(&["match", "skip"]);
        let mut view = FilterView::new();
        view.set_pattern("match");
        view.sync(&list);
        assert_eq!(view.len(), 1);

        list.commit(vec!["another match".to_string()], true);
        view.sync(&list);
        assert_eq!(view.indices(), &[0, 2]);
    }

    #[test]
    fn rescans_after_pattern_change_and_source_reset() {
        let mut list = source(&["alpha", "beta"]);
        let mut view = FilterView::new();
        view.set_pattern("alpha");
        view.sync(&list);
        assert_eq!(view.indices(), &[0]);

        view.set_pattern("BETA");
        view.sync(&list);
        assert_eq!(view.indices(), &[1]);

        list.reset();
        list.commit(
            vec!["beta one".to_string(), "gamma".to_string(), "beta two".to_string()],
            true,
        );
        view.sync(&list);
        assert_eq!(view.indices(), &[0, 2]);
    }

    #[test]
    fn folds_case_beyond_ascii() {
        let list = source(&["Ünïcode Name", "abc"]);
        let mut view = FilterView::new();
        view.set_pattern("ÜNÏ");
        view.sync(&list);
        assert_eq!(view.indices(), &[0]);
    }
}
