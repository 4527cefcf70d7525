//! Core trait for sort keys

/// Keys that can be compared for sorting
///
/// All sort keys must be comparable and handle missing data gracefully.
pub trait SortKey: Ord + Clone + Send + Sync {
    /// Create a key representing missing/null data
    fn missing() -> Self;

    /// Check if this key represents missing data
    fn is_missing(&self) -> bool;

    /// Compare two keys while ensuring missing values always sort last
    #[inline]
    fn compare_with_order(&self, other: &Self, reverse: bool) -> std::cmp::Ordering {
        match (self.is_missing(), other.is_missing()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => {
                if reverse {
                    other.cmp(self)
                } else {
                    self.cmp(other)
                }
            }
        }
    }
}
