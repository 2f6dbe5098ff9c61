/// The delta produced by committing one page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageDelta {
    pub generation: u64,
    /// Index of the first appended row.
    pub start: usize,
    pub count: usize,
    pub exhausted: bool,
}

impl PageDelta {
    pub fn end(&self) -> usize {
        self.start + self.count
    }
}

/// Append-only list materialized page by page.
///
/// Rows are only ever added through [`PagedList::commit`], which appends a whole batch and
/// updates the exhaustion flag in one step, so readers never observe half a page. A reset
/// drops every row and bumps the generation.
#[derive(Clone, Debug)]
pub struct PagedList<T> {
    items: Vec<T>,
    exhausted: bool,
    generation: u64,
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PagedList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            exhausted: false,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn commit(&mut self, batch: Vec<T>, exhausted: bool) -> PageDelta {
        let start = self.items.len();
        let count = batch.len();
        self.items.extend(batch);
        self.exhausted = exhausted;
        PageDelta {
            generation: self.generation,
            start,
            count,
            exhausted,
        }
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.exhausted = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Progress line shared by both loaders: `Total: N+ <noun>.` while more remain.
pub fn progress_status(count: usize, exhausted: bool, noun: &str) -> String {
    if exhausted {
        format!("Total: {count} {noun}.")
    } else {
        format!("Total: {count}+ {noun}.")
    }
}
