#![allow(dead_code)]

pub mod merger_behavior;

use fanin::{BufferedStream, ChunkPayload, LabelSet, SeriesItem, SeriesStream, StreamError};

/// Boxed stream type used to mix producers in one merge.
pub type DynStream = Box<dyn SeriesStream>;

pub fn series(pairs: &[(&str, &str)]) -> SeriesItem {
    SeriesItem::new(
        LabelSet::from_pairs(pairs.iter().copied()),
        vec![],
    )
}

pub fn series_with_chunks(value: &str, chunks: &[&[u8]]) -> SeriesItem {
    SeriesItem::new(
        LabelSet::from_pairs([("test", value)]),
        chunks.iter().map(|c| ChunkPayload::new(c.to_vec())).collect(),
    )
}

/// A buffered stream of `test=<value>` singleton-label series.
pub fn stream_of(values: &[&str]) -> DynStream {
    Box::new(BufferedStream::new(
        values.iter().map(|v| series(&[("test", v)])).collect(),
    ))
}

pub fn drain_items(stream: &mut impl SeriesStream) -> Vec<SeriesItem> {
    let mut out = Vec::new();
    while stream.advance() {
        out.push(stream.current().clone());
    }
    out
}

pub fn drain_values(stream: &mut impl SeriesStream) -> Vec<String> {
    let mut out = Vec::new();
    while stream.advance() {
        out.push(
            stream
                .current()
                .labels()
                .get("test")
                .expect("series item without a test label")
                .to_string(),
        );
    }
    out
}

/// Yields its items in order, then fails instead of terminating cleanly.
pub struct FailingStream {
    items: Vec<SeriesItem>,
    pos: usize,
    started: bool,
    error: Option<StreamError>,
}

impl FailingStream {
    pub fn new(items: Vec<SeriesItem>) -> Self {
        Self {
            items,
            pos: 0,
            started: false,
            error: None,
        }
    }
}

impl SeriesStream for FailingStream {
    fn advance(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        if self.started {
            self.pos += 1;
        } else {
            self.started = true;
        }
        if self.pos < self.items.len() {
            true
        } else {
            self.error = Some(StreamError::Upstream("connection reset".into()));
            false
        }
    }

    fn current(&self) -> &SeriesItem {
        &self.items[self.pos]
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }
}
