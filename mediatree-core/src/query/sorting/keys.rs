//! Sort key types for comparing entities
//!
//! These types wrap the values extracted from entities and handle missing
//! data in their Ord implementations: present values come first.

use super::traits::SortKey;
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;

fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-folded text key (names, studios, ratings)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StringKey(Option<String>);

impl StringKey {
    pub fn new(value: Option<&str>) -> Self {
        StringKey(
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_lowercase),
        )
    }
}

impl Ord for StringKey {
    fn cmp(&self, other: &Self) -> Ordering {
        missing_last(&self.0, &other.0)
    }
}

impl PartialOrd for StringKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for StringKey {
    fn missing() -> Self {
        StringKey(None)
    }

    fn is_missing(&self) -> bool {
        self.0.is_none()
    }
}

/// Date/time key for temporal sorting
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OptionalDateKey(Option<DateTime<Utc>>);

impl OptionalDateKey {
    pub fn new(value: Option<DateTime<Utc>>) -> Self {
        OptionalDateKey(value)
    }
}

impl Ord for OptionalDateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        missing_last(&self.0, &other.0)
    }
}

impl PartialOrd for OptionalDateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for OptionalDateKey {
    fn missing() -> Self {
        OptionalDateKey(None)
    }

    fn is_missing(&self) -> bool {
        self.0.is_none()
    }
}

/// Float key for ratings and money
#[derive(Clone, Debug, PartialEq)]
pub struct OptionalFloatKey(Option<OrderedFloat<f64>>);

impl OptionalFloatKey {
    pub fn new(value: Option<f64>) -> Self {
        OptionalFloatKey(value.filter(|v| !v.is_nan()).map(OrderedFloat))
    }
}

impl Eq for OptionalFloatKey {}

impl Ord for OptionalFloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        missing_last(&self.0, &other.0)
    }
}

impl PartialOrd for OptionalFloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for OptionalFloatKey {
    fn missing() -> Self {
        OptionalFloatKey(None)
    }

    fn is_missing(&self) -> bool {
        self.0.is_none()
    }
}

/// Integer key for counts, years, durations and flags
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OptionalIntKey(Option<i64>);

impl OptionalIntKey {
    pub fn new(value: Option<i64>) -> Self {
        OptionalIntKey(value)
    }

    pub fn flag(value: bool) -> Self {
        OptionalIntKey(Some(i64::from(value)))
    }
}

impl Ord for OptionalIntKey {
    fn cmp(&self, other: &Self) -> Ordering {
        missing_last(&self.0, &other.0)
    }
}

impl PartialOrd for OptionalIntKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl SortKey for OptionalIntKey {
    fn missing() -> Self {
        OptionalIntKey(None)
    }

    fn is_missing(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_sort_last_in_both_directions() {
        let present = OptionalIntKey::new(Some(3));
        let missing = OptionalIntKey::missing();
        assert_eq!(present.compare_with_order(&missing, false), Ordering::Less);
        assert_eq!(present.compare_with_order(&missing, true), Ordering::Less);
        assert_eq!(missing.compare_with_order(&present, true), Ordering::Greater);
    }

    #[test]
    fn text_keys_ignore_case_and_blank_values() {
        assert_eq!(StringKey::new(Some("Alpha")), StringKey::new(Some("alpha")));
        assert!(StringKey::new(Some("   ")).is_missing());
    }

    #[test]
    fn nan_is_treated_as_missing() {
        assert!(OptionalFloatKey::new(Some(f64::NAN)).is_missing());
    }
}
