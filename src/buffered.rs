use crate::error::StreamError;
use crate::series::SeriesItem;
use crate::SeriesStream;

/// A stream over a fully materialised vector of items.
///
/// The cursor starts before the first element. Used for tests and for
/// replies that arrive as one buffered batch; network-backed producers
/// implement the same contract lazily.
pub struct BufferedStream {
    items: Vec<SeriesItem>,
    pos: usize,
    started: bool,
}

impl BufferedStream {
    pub fn new(items: Vec<SeriesItem>) -> Self {
        Self {
            items,
            pos: 0,
            started: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl SeriesStream for BufferedStream {
    fn advance(&mut self) -> bool {
        if self.started {
            // Saturate at one past the end so termination stays idempotent.
            self.pos = (self.pos + 1).min(self.items.len());
        } else {
            self.started = true;
        }
        self.pos < self.items.len()
    }

    fn current(&self) -> &SeriesItem {
        assert!(self.started, "current() called before advance()");
        &self.items[self.pos]
    }

    fn error(&self) -> Option<&StreamError> {
        None
    }
}
