use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_64;

/// A single `(name, value)` label pair.
///
/// Ordering compares names first, then values, both as byte strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// An ordered sequence of label pairs identifying one series.
///
/// Comparison is lexicographic over the pair sequence, which is the derived
/// order of the underlying vector. The empty set is distinguished: an item
/// carrying it is a control item (warning, hint), not a series.
///
/// Most series carry a handful of labels, so pairs are stored inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelSet(SmallVec<[Label; 4]>);

impl LabelSet {
    /// The empty label set.
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// Build a label set from `(name, value)` pairs. Pairs are sorted by
    /// name so that sets built from unordered input still compare sanely.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut labels: SmallVec<[Label; 4]> = pairs
            .into_iter()
            .map(|(n, v)| Label::new(n, v))
            .collect();
        labels.sort();
        Self(labels)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    /// Value of the label with the given name, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", label)?;
        }
        write!(f, "}}")
    }
}

/// An opaque encoded chunk plus the content hash of its bytes.
///
/// The hash is computed once at construction (64-bit XXH3, stable across
/// machines). Equality of chunks is hash equality.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    data: Vec<u8>,
    hash: u64,
}

impl ChunkPayload {
    pub fn new(data: Vec<u8>) -> Self {
        let hash = xxh3_64(&data);
        Self { data, hash }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn content_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for ChunkPayload {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ChunkPayload {}

impl Hash for ChunkPayload {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// The unit emitted by every stream: a label set plus its chunk payloads.
///
/// An item with an empty label set is a non-series control item; its payload
/// rides in `chunks` and it bypasses merge-key comparison entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesItem {
    labels: LabelSet,
    chunks: Vec<ChunkPayload>,
}

impl SeriesItem {
    pub fn new(labels: LabelSet, chunks: Vec<ChunkPayload>) -> Self {
        Self { labels, chunks }
    }

    /// A non-series control item carrying a warning message.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            labels: LabelSet::empty(),
            chunks: vec![ChunkPayload::new(message.into().into_bytes())],
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn chunks(&self) -> &[ChunkPayload] {
        &self.chunks
    }

    pub fn into_parts(self) -> (LabelSet, Vec<ChunkPayload>) {
        (self.labels, self.chunks)
    }

    /// Whether this item identifies a series. Control items return false.
    pub fn is_series(&self) -> bool {
        !self.labels.is_empty()
    }
}
