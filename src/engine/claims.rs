//! Claims log: the append-only evidence channel of a run.
//!
//! Every check appends free-text lines while it runs. The orchestrator takes
//! the accumulated lines after each check completes and attaches them to that
//! check's result, so each line is consumed exactly once by reporting.

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct ClaimsLog {
    lines: Mutex<Vec<String>>,
}

impl ClaimsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one evidence line.
    pub fn append(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    /// Append a block of lines without interleaving other appends.
    pub fn extend<I>(&self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lines.lock().extend(lines);
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Copy of the pending lines, leaving the log untouched.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Remove and return every pending line.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}
