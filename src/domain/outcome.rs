//! Changed / unchanged results for idempotent operations.

/// Result of an operation that may legitimately have nothing to do.
///
/// `Unchanged` is a success: resetting an empty scope or activating an
/// already-active currency reports it instead of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Changed(T),
    Unchanged,
}
