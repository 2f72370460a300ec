pub mod heap;
pub mod tournament;

use std::cmp::Ordering;
use std::fmt;

use crate::error::StreamError;
use crate::series::SeriesItem;
use crate::SeriesStream;

use self::heap::MinHeapMerger;
use self::tournament::TournamentMerger;

/// Ordering used by the mergers.
///
/// Control items (empty label set) sort ahead of every series item so they
/// drain first; between two control items the order is arbitrary. Series
/// items compare by label set.
pub(crate) fn merge_order(a: &SeriesItem, b: &SeriesItem) -> Ordering {
    match (a.is_series(), b.is_series()) {
        (true, true) => a.labels().cmp(b.labels()),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Which merge structure to build.
///
/// The two variants are semantically interchangeable. The tournament tree
/// touches only the path from the changed leaf to the root on each pop,
/// saving a constant factor over the heap's sift-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    MinHeap,
    Tournament,
}

/// Counters for one merge pipeline.
#[derive(Debug, Clone)]
pub struct MergeStats {
    /// Streams handed to the constructor.
    pub inputs: usize,
    /// Streams that were already exhausted when the merger was built.
    pub inputs_exhausted: usize,
    /// Items emitted so far.
    pub items_emitted: u64,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MergeStats:")?;
        writeln!(
            f,
            "  inputs: {} ({} exhausted at build)",
            self.inputs, self.inputs_exhausted
        )?;
        writeln!(f, "  items emitted: {}", self.items_emitted)
    }
}

enum MergerImpl<S: SeriesStream> {
    Heap(MinHeapMerger<S>),
    Tournament(TournamentMerger<S>),
}

/// A k-way merger built from one of the two structures, selected at
/// construction time. Exposes the same stream interface as its inputs, so
/// mergers and dedupers compose.
pub struct Merger<S: SeriesStream> {
    inner: MergerImpl<S>,
    inputs: usize,
    inputs_exhausted: usize,
    items_emitted: u64,
}

impl<S: SeriesStream> Merger<S> {
    pub fn new(streams: Vec<S>, strategy: MergeStrategy) -> Result<Self, StreamError> {
        let inputs = streams.len();
        let inner = match strategy {
            MergeStrategy::MinHeap => MergerImpl::Heap(MinHeapMerger::new(streams)),
            MergeStrategy::Tournament => {
                MergerImpl::Tournament(TournamentMerger::new(streams)?)
            }
        };
        // Construction advances every input once, so anything not live now
        // arrived exhausted.
        let live = match &inner {
            MergerImpl::Heap(m) => m.live_inputs(),
            MergerImpl::Tournament(m) => m.live_inputs(),
        };
        Ok(Self {
            inner,
            inputs,
            inputs_exhausted: inputs - live,
            items_emitted: 0,
        })
    }

    pub fn stats(&self) -> MergeStats {
        MergeStats {
            inputs: self.inputs,
            inputs_exhausted: self.inputs_exhausted,
            items_emitted: self.items_emitted,
        }
    }
}

impl<S: SeriesStream> SeriesStream for Merger<S> {
    fn advance(&mut self) -> bool {
        let advanced = match &mut self.inner {
            MergerImpl::Heap(m) => m.advance(),
            MergerImpl::Tournament(m) => m.advance(),
        };
        if advanced {
            self.items_emitted += 1;
        }
        advanced
    }

    fn current(&self) -> &SeriesItem {
        match &self.inner {
            MergerImpl::Heap(m) => m.current(),
            MergerImpl::Tournament(m) => m.current(),
        }
    }

    fn error(&self) -> Option<&StreamError> {
        match &self.inner {
            MergerImpl::Heap(m) => m.error(),
            MergerImpl::Tournament(m) => m.error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffered::BufferedStream;
    use crate::series::LabelSet;

    fn item(value: &str) -> SeriesItem {
        SeriesItem::new(LabelSet::from_pairs([("test", value)]), vec![])
    }

    fn singleton(value: &str) -> BufferedStream {
        BufferedStream::new(vec![item(value)])
    }

    #[test]
    fn control_items_order_ahead_of_series() {
        let warning = SeriesItem::warning("w");
        let series = item("aaa");

        assert_eq!(merge_order(&warning, &series), Ordering::Less);
        assert_eq!(merge_order(&series, &warning), Ordering::Greater);
        assert_eq!(merge_order(&warning, &warning), Ordering::Equal);
    }

    #[test]
    fn both_strategies_yield_the_same_sequence() {
        for strategy in [MergeStrategy::MinHeap, MergeStrategy::Tournament] {
            let streams = vec![singleton("bab"), singleton("baa"), singleton("caa")];
            let mut merger = Merger::new(streams, strategy).unwrap();

            let mut got = Vec::new();
            while merger.advance() {
                got.push(merger.current().labels().get("test").unwrap().to_string());
            }
            assert_eq!(got, vec!["baa", "bab", "caa"], "strategy {:?}", strategy);
        }
    }

    #[test]
    fn stats_track_emitted_items() {
        let streams = vec![
            BufferedStream::new(vec![]),
            singleton("baa"),
            singleton("bab"),
        ];
        let mut merger = Merger::new(streams, MergeStrategy::Tournament).unwrap();

        assert_eq!(merger.stats().inputs, 3);
        assert_eq!(merger.stats().inputs_exhausted, 1);

        while merger.advance() {}

        let stats = merger.stats();
        assert_eq!(stats.items_emitted, 2);
        assert_eq!(stats.inputs_exhausted, 1);
        assert!(format!("{}", stats).contains("items emitted: 2"));
    }

    #[test]
    fn tournament_strategy_rejects_empty_input() {
        let streams: Vec<BufferedStream> = vec![];
        match Merger::new(streams, MergeStrategy::Tournament) {
            Err(err) => assert_eq!(err, StreamError::EmptyInput),
            Ok(_) => panic!("empty input must be rejected"),
        }
    }
}
