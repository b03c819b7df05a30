//! Dirty-range accumulator for one side of the dual text store.

/// Union of every edit applied to a buffer since the last sync, expressed as
/// the old range `[start, old_end)` that became `[start, new_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDelta {
    start: usize,
    old_end: usize,
    new_end: usize,
    selection_changed: bool,
}

impl Default for PendingDelta {
    fn default() -> Self {
        Self {
            start: usize::MAX,
            old_end: 0,
            new_end: 0,
            selection_changed: false,
        }
    }
}

impl PendingDelta {
    /// Merge the edit `[start, old_end) -> [start, new_end)`, given in the
    /// coordinates of the text as it is after all previously merged edits.
    pub fn merge(&mut self, start: usize, old_end: usize, new_end: usize) {
        self.start = self.start.min(start);
        self.old_end += old_end.saturating_sub(self.new_end);
        self.new_end = new_end + self.new_end.saturating_sub(old_end);
    }

    pub fn mark_selection_changed(&mut self) {
        self.selection_changed = true;
    }

    /// No text or span edit recorded (the selection flag is separate).
    pub fn is_empty(&self) -> bool {
        self.start > self.old_end
    }

    pub fn selection_changed(&self) -> bool {
        self.selection_changed
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn old_end(&self) -> usize {
        self.old_end
    }

    pub fn new_end(&self) -> usize {
        self.new_end
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
