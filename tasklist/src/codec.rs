//! Wire format for the persisted list.
//!
//! The list is stored as a JSON array of `{"title": .., "done": ..}`
//! objects under a single key. The outstanding count is never written; it
//! is recomputed from the decoded items.

use crate::error::ListError;
use crate::types::Item;

/// Serialize items for storage
///
/// # Errors
///
/// Returns [`ListError::CorruptState`] if serialization fails.
pub fn encode(items: &[Item]) -> Result<String, ListError> {
    serde_json::to_string(items).map_err(|e| ListError::CorruptState(e.to_string()))
}

/// Decode a stored payload
///
/// A blank payload decodes to an empty list.
///
/// # Errors
///
/// Returns [`ListError::CorruptState`] if the payload is not a JSON array of
/// items, or if any item has a blank title.
pub fn decode(payload: &str) -> Result<Vec<Item>, ListError> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<Item> =
        serde_json::from_str(payload).map_err(|e| ListError::CorruptState(e.to_string()))?;

    if let Some(position) = items.iter().position(|item| item.title.trim().is_empty()) {
        return Err(ListError::CorruptState(format!(
            "item {position} has an empty title"
        )));
    }

    Ok(items)
}

/// Parse a count stored by older releases
///
/// Returns `None` for anything that is not a non-negative integer.
#[must_use]
pub fn decode_legacy_count(payload: &str) -> Option<usize> {
    serde_json::from_str::<usize>(payload.trim()).ok()
}
