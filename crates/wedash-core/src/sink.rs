use std::collections::VecDeque;

use parking_lot::Mutex;

/// Destination of everything the dashboard shows in its log pane.
pub trait LogSink: Send + Sync {
    fn write(&self, line: &str);
    /// Append `lines` as one uninterrupted block.
    fn write_block(&self, lines: Vec<String>);
    fn clear(&self);

    /// Short inline notice for the operator.
    fn note(&self, message: &str) {
        self.write(&format!("[note] {message}"));
    }
}

#[derive(Debug)]
struct Inner {
    lines: VecDeque<String>,
    revision: u64,
}

/// Bounded in-memory log pane; the oldest lines are dropped first.
#[derive(Debug)]
pub struct LogBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub const DEFAULT_CAPACITY: usize = 5_000;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lines: VecDeque::with_capacity(capacity.min(1_024)),
                revision: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().lines.iter().cloned().collect()
    }

    /// The last `n` lines, oldest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock();
        let skip = inner.lines.len().saturating_sub(n);
        inner.lines.iter().skip(skip).cloned().collect()
    }

    /// Bumped on every change, so readers can skip redundant work.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    fn push(&self, inner: &mut Inner, line: String) {
        if inner.lines.len() == self.capacity {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line);
    }
}

impl LogSink for LogBuffer {
    fn write(&self, line: &str) {
        let mut inner = self.inner.lock();
        self.push(&mut inner, line.to_owned());
        inner.revision += 1;
    }

    fn write_block(&self, lines: Vec<String>) {
        let mut inner = self.inner.lock();
        for line in lines {
            self.push(&mut inner, line);
        }
        inner.revision += 1;
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lines.clear();
        inner.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.write(&format!("line {i}"));
        }
        assert_eq!(buffer.lines(), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(buffer.tail(2), vec!["line 3", "line 4"]);
        assert_eq!(buffer.tail(10).len(), 3);
    }

    #[test]
    fn test_block_and_clear() {
        let buffer = LogBuffer::default();
        buffer.note("hello");
        let before = buffer.revision();
        buffer.write_block(vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(buffer.revision(), before + 1);
        assert_eq!(buffer.lines(), vec!["[note] hello", "a", "b"]);

        buffer.clear();
        assert!(buffer.lines().is_empty());
    }
}
