//! Expansion frontier deduplication

use std::collections::HashSet;

/// Deduplicate chunk ids, keeping the first occurrence of each
///
/// # Arguments
/// * `chunk_ids` - Related chunk ids in traversal order
///
/// # Returns
/// The expansion frontier, in first-discovery order
pub fn deduplicate_chunk_ids<I>(chunk_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = HashSet::new();

    chunk_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
