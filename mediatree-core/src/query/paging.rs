use crate::store::QueryResult;

/// Applies start index and limit; the total counts every match.
pub fn paginate<T>(
    items: Vec<T>,
    start_index: Option<usize>,
    limit: Option<usize>,
) -> QueryResult<T> {
    let total_record_count = items.len();
    let start = start_index.unwrap_or(0).min(total_record_count);
    let items = items
        .into_iter()
        .skip(start)
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    QueryResult {
        total_record_count,
        items,
    }
}
