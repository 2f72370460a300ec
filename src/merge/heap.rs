use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tracing::debug;

use super::merge_order;
use crate::error::StreamError;
use crate::series::SeriesItem;
use crate::SeriesStream;

/// A live input stream, ordered by its current front item.
struct HeapEntry<S>(S);

impl<S: SeriesStream> PartialEq for HeapEntry<S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S: SeriesStream> Eq for HeapEntry<S> {}

impl<S: SeriesStream> PartialOrd for HeapEntry<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: SeriesStream> Ord for HeapEntry<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        merge_order(self.0.current(), other.0.current())
    }
}

/// K-way merge over a binary min-heap of input streams.
///
/// Construction advances every input once and drops the ones that are
/// already exhausted. Each `advance` records the root's item, steps the
/// root's stream and re-inserts it (or drops it when exhausted). When two
/// streams present identical label sets the order between them is
/// unspecified; they are emitted adjacently in either order.
///
/// O(log k) per emitted item for k live streams.
pub struct MinHeapMerger<S: SeriesStream> {
    heap: BinaryHeap<Reverse<HeapEntry<S>>>,
    current: Option<SeriesItem>,
    first_error: Option<StreamError>,
}

impl<S: SeriesStream> MinHeapMerger<S> {
    pub fn new(streams: Vec<S>) -> Self {
        let inputs = streams.len();
        let mut first_error = None;
        let mut live = Vec::with_capacity(inputs);

        for mut stream in streams {
            if stream.advance() {
                live.push(Reverse(HeapEntry(stream)));
            } else if first_error.is_none() {
                if let Some(err) = stream.error() {
                    first_error = Some(err.clone());
                }
            }
        }

        debug!(inputs, live = live.len(), "built min-heap merger");

        Self {
            // O(n) heapify of the pre-advanced streams.
            heap: BinaryHeap::from(live),
            current: None,
            first_error,
        }
    }

    /// Streams that still have items to contribute.
    pub fn live_inputs(&self) -> usize {
        self.heap.len()
    }
}

impl<S: SeriesStream> SeriesStream for MinHeapMerger<S> {
    fn advance(&mut self) -> bool {
        if self.first_error.is_some() {
            return false;
        }

        let Some(Reverse(mut entry)) = self.heap.pop() else {
            return false;
        };

        self.current = Some(entry.0.current().clone());

        if entry.0.advance() {
            self.heap.push(Reverse(entry));
        } else if let Some(err) = entry.0.error() {
            // One failed child taints the whole merge; the item recorded
            // above is still valid and gets emitted, the next advance is
            // terminal.
            debug!(error = %err, "child stream failed, merge is terminal");
            self.first_error = Some(err.clone());
        }

        true
    }

    fn current(&self) -> &SeriesItem {
        self.current
            .as_ref()
            .expect("current() called before advance()")
    }

    fn error(&self) -> Option<&StreamError> {
        self.first_error.as_ref()
    }
}
