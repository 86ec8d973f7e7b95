//! Word-level text matching for list queries.
//!
//! Searchable fields are stored next to a JSON array of their lowercased
//! words. A search term matches a record when every word of the term is one
//! of the record's words, so matching is done entirely with bound JSON
//! parameters and `json_each`.

/// Lowercased alphanumeric words of `text`, deduplicated, in order of first
/// appearance.
pub fn terms(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
    {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

/// How a free-text filter constrains a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextFilter {
    /// Every record passes; the filter was empty.
    Any,
    /// No record can pass; the filter held no words.
    Nothing,
    /// Records must contain all of these words.
    AllOf(Vec<String>),
}

impl TextFilter {
    pub fn parse(input: &str) -> Self {
        if input.is_empty() {
            return TextFilter::Any;
        }
        match terms(input) {
            words if words.is_empty() => TextFilter::Nothing,
            words => TextFilter::AllOf(words),
        }
    }

    /// Words to bind as the JSON parameter. `None` means nothing can match.
    pub fn required_words(&self) -> Option<&[String]> {
        match self {
            TextFilter::Any => Some(&[] as &[String]),
            TextFilter::Nothing => None,
            TextFilter::AllOf(words) => Some(words.as_slice()),
        }
    }
}

/// SQL predicate: every element of the JSON array `param` is contained in
/// the JSON array column `column`. An empty array matches every row.
pub(crate) fn contains_all(param: &str, column: &str) -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM json_each({param}) AS wanted \
         WHERE wanted.value NOT IN (SELECT value FROM json_each({column})))"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_lowercase_and_split() {
        assert_eq!(
            terms("Marcus Aurelius, the Emperor!"),
            vec!["marcus", "aurelius", "the", "emperor"]
        );
    }

    #[test]
    fn test_terms_deduplicate() {
        assert_eq!(terms("to be or not to be"), vec!["to", "be", "or", "not"]);
    }

    #[test]
    fn test_terms_unicode() {
        assert_eq!(terms("Gödel's Café"), vec!["gödel", "s", "café"]);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert_eq!(TextFilter::parse(""), TextFilter::Any);
        assert_eq!(TextFilter::parse("").required_words(), Some(&[] as &[String]));
    }

    #[test]
    fn test_punctuation_only_filter_matches_nothing() {
        assert_eq!(TextFilter::parse("?!"), TextFilter::Nothing);
        assert_eq!(TextFilter::parse("  ").required_words(), None);
    }

    #[test]
    fn test_words_filter() {
        assert_eq!(
            TextFilter::parse("Seneca"),
            TextFilter::AllOf(vec!["seneca".to_string()])
        );
    }
}
