//! Sort-name derivation.

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_ARTICLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:the|a|an)\s+").expect("static regex is valid")
});

static REMOVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,&\-{}']").expect("static regex is valid"));

static REPLACED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.+%]").expect("static regex is valid"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Lower-cases `name`, drops a leading article and folds punctuation.
///
/// ```
/// use mediatree_model::sort_name::derive_sort_name;
/// assert_eq!(derive_sort_name("The Matrix"), "matrix");
/// assert_eq!(derive_sort_name("Mr. & Mrs. Smith"), "mr mrs smith");
/// ```
pub fn derive_sort_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let removed = REMOVED.replace_all(&lowered, "");
    let replaced = REPLACED.replace_all(&removed, " ");
    let collapsed = WHITESPACE.replace_all(replaced.trim(), " ");
    let stripped = LEADING_ARTICLE.replace(&collapsed, "");
    if stripped.is_empty() {
        collapsed.into_owned()
    } else {
        stripped.into_owned()
    }
}

/// Episode ordering key: zero-padded season and episode numbers followed
/// by the name, so episodes sort in broadcast order within a series.
pub fn episode_sort_name(
    season: Option<i32>,
    episode: Option<i32>,
    name: &str,
) -> String {
    format!(
        "{:03} - {:04} - {}",
        season.unwrap_or(0),
        episode.unwrap_or(0),
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_articles_only() {
        assert_eq!(derive_sort_name("A Beautiful Mind"), "beautiful mind");
        assert_eq!(derive_sort_name("An American Tail"), "american tail");
        assert_eq!(derive_sort_name("Theory of Everything"), "theory of everything");
    }

    #[test]
    fn keeps_name_that_is_only_an_article() {
        assert_eq!(derive_sort_name("The"), "the");
    }

    #[test]
    fn episode_numbers_are_padded() {
        assert_eq!(episode_sort_name(Some(1), Some(2), "Pilot"), "001 - 0002 - Pilot");
        assert_eq!(episode_sort_name(None, Some(12), "x"), "000 - 0012 - x");
    }
}
