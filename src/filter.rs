// src/filter.rs
//! Keyword matching over post text.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::timeline::types::Post;

/// Normalize text for matching: decode HTML entities, lower-case,
/// turn punctuation and symbols into word breaks, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // Post text arrives entity-encoded ("&amp;", "&gt;")
    let decoded = html_escape::decode_html_entities(s);

    // "$TSLA" -> "tsla", "launch/release" -> "launch release"
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re_punct =
        RE_PUNCT.get_or_init(|| Regex::new(r"[\p{P}\p{S}]").expect("punctuation regex"));
    let stripped = re_punct.replace_all(&decoded, " ");

    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace tokens of the normalized text.
pub fn tokenize(s: &str) -> Vec<String> {
    normalize_text(s)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalized keyword terms for one account. A term with inner whitespace
/// is a phrase and matches contiguous tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    terms: BTreeSet<String>,
}

impl KeywordSet {
    /// Split `raw` on `delimiter` and normalize each entry; blanks are dropped.
    pub fn parse(raw: &str, delimiter: &str) -> Self {
        let terms = raw
            .split(delimiter)
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| normalize_text(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn merge(&mut self, other: KeywordSet) {
        self.terms.extend(other.terms);
    }

    /// True iff the normalized text shares at least one term with this set.
    pub fn matches(&self, text: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let tokens = tokenize(text);
        let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let joined = format!(" {} ", tokens.join(" "));

        self.terms.iter().any(|term| {
            if term.contains(' ') {
                joined.contains(&format!(" {term} "))
            } else {
                token_set.contains(term.as_str())
            }
        })
    }
}

/// Posts whose text matches `keywords`, in input order.
pub fn filter_posts(posts: &[Post], keywords: &KeywordSet) -> Vec<Post> {
    posts
        .iter()
        .filter(|p| keywords.matches(&p.text))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punct_and_case() {
        assert_eq!(
            normalize_text("  Big LAUNCH,&nbsp;today!!  #Release "),
            "big launch today release"
        );
    }

    #[test]
    fn entities_are_decoded_before_stripping() {
        assert_eq!(normalize_text("Q&amp;A &gt; launch"), "q a launch");
    }

    #[test]
    fn keyword_parse_normalizes_and_drops_blanks() {
        let ks = KeywordSet::parse(" Launch, release ,, RELEASE.", ",");
        assert_eq!(ks.iter().collect::<Vec<_>>(), vec!["launch", "release"]);
    }

    #[test]
    fn phrase_matches_only_contiguous_tokens() {
        let ks = KeywordSet::parse("rate cut", ",");
        assert!(ks.matches("Fed signals a RATE cut."));
        assert!(!ks.matches("cut the rate"));
    }

    #[test]
    fn empty_set_never_matches() {
        let ks = KeywordSet::parse(" , ", ",");
        assert!(ks.is_empty());
        assert!(!ks.matches("anything at all"));
    }

    #[test]
    fn partial_words_do_not_match() {
        let ks = KeywordSet::parse("launch", ",");
        assert!(!ks.matches("relaunching soon"));
        assert!(ks.matches("re: launch"));
    }

    #[test]
    fn symbols_split_words() {
        assert_eq!(normalize_text("$TSLA+5% <up>"), "tsla 5 up");
        assert_eq!(normalize_text("launch/release...today"), "launch release today");
        assert_eq!(normalize_text("launch\u{2014}details"), "launch details");
    }
}
