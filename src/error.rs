use thiserror::Error;

/// Errors surfaced by streams and mergers.
///
/// `Clone + PartialEq` so a merger can record the first child error by value
/// and keep returning the same error from every subsequent `error()` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// A child stream reported a failure. The whole merge is terminal.
    #[error("upstream source failed: {0}")]
    Upstream(String),

    /// A merge constructor that requires at least one input stream got none.
    #[error("k-way merge requires at least one input stream")]
    EmptyInput,
}
