use crate::model::DispatchEntry;

/// Waiting entries, served newest first.
// TODO(dispatch): confirm with the reporting service owners whether FIFO was
// intended before changing the order.
#[derive(Debug, Default)]
pub struct DispatchStack {
    entries: Vec<DispatchEntry>,
}

impl DispatchStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DispatchEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<DispatchEntry> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
