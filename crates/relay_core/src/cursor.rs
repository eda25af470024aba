use thiserror::Error;

use crate::{FeedSnapshot, Item};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("start-from item '{id}' is not present in the feed")]
    UnknownCursor { id: String },
}

/// Restrict `items` to the cursor item and everything newer than it.
///
/// The cursor is an inclusive lower bound in chronological order: for a
/// snapshot `[X, Y, Z]` and `start_from = Y`, `Y` and `Z` pass while `X` is
/// dropped. An empty or absent cursor passes everything. The cursor must be
/// part of `snapshot`.
pub fn apply_cursor(
    snapshot: &FeedSnapshot,
    items: Vec<Item>,
    start_from: Option<&str>,
) -> Result<Vec<Item>, CursorError> {
    let Some(cursor) = start_from.filter(|id| !id.is_empty()) else {
        return Ok(items);
    };
    let bound = snapshot
        .position(cursor)
        .ok_or_else(|| CursorError::UnknownCursor {
            id: cursor.to_string(),
        })?;

    Ok(items
        .into_iter()
        .filter(|item| snapshot.position(&item.id).is_some_and(|pos| pos >= bound))
        .collect())
}
