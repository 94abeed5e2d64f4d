//! Generic sort, filter and search helpers.
//!
//! Every helper returns a fresh `Vec` and leaves its input untouched.

/// Filter value that matches everything.
pub const ALL: &str = "all";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Sort a copy of `items` by `key`. Equal keys keep their input order.
pub fn sort_by_key<T, K, F>(items: &[T], key: F, order: SortOrder) -> Vec<T>
where
    T: Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut sorted = items.to_vec();
    match order {
        SortOrder::Asc => sorted.sort_by(|a, b| key(a).cmp(&key(b))),
        SortOrder::Desc => sorted.sort_by(|a, b| key(b).cmp(&key(a))),
    }
    sorted
}

/// Whether `value` passes an equality filter. Empty and `"all"` filters pass everything.
#[must_use]
pub fn matches_filter(value: &str, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(f) if f.is_empty() || f == ALL => true,
        Some(f) => value == f,
    }
}

/// Keep items where any of `fields` contains `query`, ignoring case.
///
/// A blank query returns every item.
pub fn search_by<T: Clone>(items: &[T], query: &str, fields: &[fn(&T) -> &str]) -> Vec<T> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items.to_vec();
    }

    items
        .iter()
        .filter(|item| {
            fields
                .iter()
                .any(|field| field(item).to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}
