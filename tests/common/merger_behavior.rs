//! Contract checks shared by every merger. Each function takes a factory so
//! the same behavior runs against both merge strategies.

use fanin::{SeriesItem, SeriesStream, StreamError};

use super::{series, stream_of, DynStream, FailingStream};

pub fn yields_sorted_union<M, F>(factory: F)
where
    M: SeriesStream,
    F: FnOnce(Vec<DynStream>) -> M,
{
    let streams = vec![
        stream_of(&["aaa", "ddd", "ggg"]),
        stream_of(&["bbb", "eee"]),
        stream_of(&["ccc", "fff", "hhh", "iii"]),
    ];
    let mut merger = factory(streams);

    let mut got = Vec::new();
    while merger.advance() {
        got.push(merger.current().clone());
    }

    assert_eq!(got.len(), 9);
    for pair in got.windows(2) {
        assert!(
            pair[0].labels() <= pair[1].labels(),
            "output went backwards: {} then {}",
            pair[0].labels(),
            pair[1].labels()
        );
    }
}

pub fn termination_is_idempotent<M, F>(factory: F)
where
    M: SeriesStream,
    F: FnOnce(Vec<DynStream>) -> M,
{
    let mut merger = factory(vec![stream_of(&["aaa"])]);
    assert!(merger.advance());
    assert!(!merger.advance());
    assert!(!merger.advance());
    assert!(merger.error().is_none());
}

pub fn uneven_stream_lengths_do_not_corrupt_the_tail<M, F>(factory: F)
where
    M: SeriesStream,
    F: FnOnce(Vec<DynStream>) -> M,
{
    // The short stream ends early; the remainder must stay ordered.
    let streams = vec![
        stream_of(&["aaa"]),
        stream_of(&["bbb", "ccc", "ddd", "eee"]),
    ];
    let mut merger = factory(streams);

    let mut got = Vec::new();
    while merger.advance() {
        got.push(merger.current().labels().get("test").unwrap().to_string());
    }
    assert_eq!(got, vec!["aaa", "bbb", "ccc", "ddd", "eee"]);
}

pub fn control_items_drain_first<M, F>(factory: F)
where
    M: SeriesStream,
    F: FnOnce(Vec<DynStream>) -> M,
{
    let warning: DynStream = Box::new(fanin::BufferedStream::new(vec![SeriesItem::warning(
        "slow source",
    )]));
    let mut merger = factory(vec![stream_of(&["aaa"]), warning]);

    assert!(merger.advance());
    assert!(!merger.current().is_series());
    assert!(merger.advance());
    assert!(merger.current().is_series());
    assert!(!merger.advance());
}

pub fn child_error_taints_the_merge<M, F>(factory: F)
where
    M: SeriesStream,
    F: FnOnce(Vec<DynStream>) -> M,
{
    let failing: DynStream = Box::new(FailingStream::new(vec![series(&[("test", "aaa")])]));
    let mut merger = factory(vec![failing, stream_of(&["bbb", "ccc"])]);

    // Items observed before the failure may still come out, but the merge
    // must turn terminal and keep reporting the same error.
    while merger.advance() {}
    assert_eq!(
        merger.error(),
        Some(&StreamError::Upstream("connection reset".into()))
    );
    assert!(!merger.advance());
    assert_eq!(
        merger.error(),
        Some(&StreamError::Upstream("connection reset".into()))
    );
}
