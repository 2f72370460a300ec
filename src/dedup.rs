use std::collections::HashSet;

use crate::error::StreamError;
use crate::series::SeriesItem;
use crate::SeriesStream;

/// Collapses runs of consecutive equal-labelled series items from the
/// wrapped stream into one item each, with the chunk union deduplicated by
/// content hash (first occurrence wins). Non-series control items pass
/// through one at a time.
///
/// The one-slot `pending` lookahead holds the first item that did not match
/// the run being collected, so `current()` never re-enters the upstream.
/// Output order is the upstream order with the equal-labelled runs folded:
/// still non-decreasing, strictly increasing between series items.
pub struct DedupStream<S: SeriesStream> {
    upstream: S,
    buffer: Vec<SeriesItem>,
    pending: Option<SeriesItem>,
    upstream_live: bool,
    current: Option<SeriesItem>,
}

impl<S: SeriesStream> DedupStream<S> {
    pub fn new(mut upstream: S) -> Self {
        let upstream_live = upstream.advance();
        let pending = upstream_live.then(|| upstream.current().clone());
        Self {
            upstream,
            buffer: Vec::new(),
            pending,
            upstream_live,
            current: None,
        }
    }

    /// Step the upstream once and lift the next item into an owned slot.
    fn pull(&mut self) -> Option<SeriesItem> {
        if !self.upstream_live {
            return None;
        }
        if self.upstream.advance() {
            Some(self.upstream.current().clone())
        } else {
            self.upstream_live = false;
            None
        }
    }
}

impl<S: SeriesStream> SeriesStream for DedupStream<S> {
    fn advance(&mut self) -> bool {
        let Some(seed) = self.pending.take() else {
            return false;
        };

        if !seed.is_series() {
            self.pending = self.pull();
            self.current = Some(seed);
            return true;
        }

        self.buffer.clear();
        self.buffer.push(seed);

        while let Some(next) = self.pull() {
            if next.is_series() && next.labels() == self.buffer[0].labels() {
                self.buffer.push(next);
            } else {
                self.pending = Some(next);
                break;
            }
        }

        let group = std::mem::take(&mut self.buffer);
        self.current = Some(fold(group));
        true
    }

    fn current(&self) -> &SeriesItem {
        self.current
            .as_ref()
            .expect("current() called before advance()")
    }

    fn error(&self) -> Option<&StreamError> {
        self.upstream.error()
    }
}

/// Merge a run of equal-labelled items into one, keeping the first chunk
/// seen for each content hash.
fn fold(mut group: Vec<SeriesItem>) -> SeriesItem {
    if group.len() == 1 {
        return group.remove(0);
    }

    let labels = group[0].labels().clone();
    let mut seen = HashSet::new();
    let mut chunks = Vec::new();
    for item in group {
        let (_, item_chunks) = item.into_parts();
        for chunk in item_chunks {
            if seen.insert(chunk.content_hash()) {
                chunks.push(chunk);
            }
        }
    }
    SeriesItem::new(labels, chunks)
}
