use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;

/// Maximum token length to store in the index.
/// Tokens longer than this are likely base64, hex dumps, or other non-searchable content.
pub const MAX_TOKEN_LENGTH: usize = 128;

/// A distinct term of one document with its in-document frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub hash: u64,
    pub frequency: u16,
}

/// Per-document tokenizer output.
///
/// `terms[i]` is the lowercase text of `tokens[i]`. `length` counts every
/// token occurrence and is not subject to the `u16` saturation of
/// [`Token::frequency`].
#[derive(Debug, Clone, Default)]
pub struct TokenizedDoc {
    pub tokens: Vec<Token>,
    pub terms: Vec<String>,
    pub length: u32,
}

/// Stable 64-bit hash of a term. Segment files store this value, so it must
/// not depend on process-level random state.
#[inline]
pub fn hash_term(term: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(term.as_bytes());
    hasher.finish()
}

/// Split text into lowercase terms on any non-alphanumeric character
pub fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && t.len() <= MAX_TOKEN_LENGTH)
        .map(|t| {
            if t.bytes().all(|b| b.is_ascii() && !b.is_ascii_uppercase()) {
                t.to_string()
            } else {
                t.to_lowercase()
            }
        })
}

/// Tokenize a document and aggregate term frequencies
pub fn tokenize(text: &str) -> TokenizedDoc {
    let mut positions: FxHashMap<u64, usize> = FxHashMap::default();
    let mut doc = TokenizedDoc::default();

    for term in terms(text) {
        doc.length = doc.length.saturating_add(1);
        let hash = hash_term(&term);
        match positions.get(&hash) {
            Some(&i) => {
                let token = &mut doc.tokens[i];
                token.frequency = token.frequency.saturating_add(1);
            }
            None => {
                positions.insert(hash, doc.tokens.len());
                doc.tokens.push(Token { hash, frequency: 1 });
                doc.terms.push(term);
            }
        }
    }

    doc
}

/// Extract the distinct terms of a query, in first-occurrence order
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for term in query.split_whitespace().flat_map(terms) {
        if !seen.contains(&term) {
            seen.push(term);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_lowercase_and_split() {
        let t: Vec<_> = terms("Hello, World! foo_bar").collect();
        assert_eq!(t, vec!["hello", "world", "foo", "bar"]);
    }

    #[test]
    fn test_tokenize_frequencies() {
        let doc = tokenize("the cat and THE hat");
        assert_eq!(doc.length, 5);
        assert_eq!(doc.tokens.len(), 4);

        let the = doc.terms.iter().position(|t| t == "the").unwrap();
        assert_eq!(doc.tokens[the].frequency, 2);
        assert_eq!(doc.tokens[the].hash, hash_term("the"));
    }

    #[test]
    fn test_long_tokens_dropped() {
        let long = "a".repeat(MAX_TOKEN_LENGTH + 1);
        let doc = tokenize(&format!("short {}", long));
        assert_eq!(doc.terms, vec!["short"]);
    }

    #[test]
    fn test_frequency_saturates() {
        let text = "x ".repeat(70_000);
        let doc = tokenize(&text);
        assert_eq!(doc.tokens[0].frequency, u16::MAX);
        assert_eq!(doc.length, 70_000);
    }

    #[test]
    fn test_query_terms_dedup() {
        assert_eq!(query_terms("Hello hello  world"), vec!["hello", "world"]);
        assert!(query_terms("   ").is_empty());
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_term("search"), hash_term("search"));
        assert_ne!(hash_term("search"), hash_term("searches"));
    }
}
