/// Fixed English stop-word set applied during tokenization
pub const STOP_WORDS: [&str; 52] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this", "these",
    "those", "or", "not", "can", "could", "should", "would", "may", "might", "must", "shall",
    "do", "does", "did", "have", "had", "been", "being", "you", "your", "we", "our", "they",
    "their", "them",
];

/// Tokenize text for BM25 indexing
///
/// Lowercase, map every non-`[a-z0-9]` byte to a space, split on whitespace,
/// keep tokens of length >= 2 that are not stop words. Order is preserved
/// because BM25 needs term frequencies, not just presence.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| token.len() >= 2 && !STOP_WORDS.contains(token))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_word_set_has_fifty_two_entries() {
        assert_eq!(STOP_WORDS.len(), 52);
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 52);
    }

    #[test]
    fn punctuation_becomes_separators() {
        assert_eq!(
            tokenize("read_file: reads a file, v2!"),
            vec!["read", "file", "reads", "file", "v2"]
        );
    }

    #[test]
    fn short_tokens_and_stop_words_are_dropped() {
        assert_eq!(tokenize("the file in a box"), vec!["file", "box"]);
        assert_eq!(tokenize("x y z"), Vec::<String>::new());
    }

    #[test]
    fn order_and_duplicates_are_preserved() {
        assert_eq!(
            tokenize("commit commit push commit"),
            vec!["commit", "commit", "push", "commit"]
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert_eq!(tokenize(""), Vec::<String>::new());
    }
}
