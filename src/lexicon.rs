//! Compiled phrase tables
//!
//! Lexical matching for stated-valence classification and the crisis /
//! finality overrides. Tables are compiled into lowercase matchers and
//! injected into the components that need them, so deployments can swap
//! locales or supply clinically reviewed tables without touching the engine.

use serde::{Deserialize, Serialize};

/// A locale-tagged phrase table compiled for case-insensitive matching.
///
/// Matching is word-boundary containment over the lowercased transcript;
/// phrases are lowercased once at compile time. A hit flanked by an
/// alphanumeric character is discarded, so "lawful" does not match "awful"
/// and "blend it" does not match "end it".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseMatcher {
    locale: String,
    phrases: Vec<String>,
}

impl PhraseMatcher {
    /// Compile a phrase table for the given locale
    pub fn compile<I, S>(locale: &str, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            locale: locale.to_string(),
            phrases,
        }
    }

    /// Compile an empty matcher (matches nothing)
    pub fn empty(locale: &str) -> Self {
        Self::compile(locale, Vec::<String>::new())
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// True if any phrase occurs in the text (case-insensitive)
    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// First phrase that occurs in the text at a word boundary, if any
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.phrases
            .iter()
            .find(|p| contains_at_word_boundary(&lowered, p))
            .map(|p| p.as_str())
    }
}

fn contains_at_word_boundary(haystack: &str, phrase: &str) -> bool {
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(phrase) {
        let start = from + offset;
        let end = start + phrase.len();
        let open = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let close = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if open && close {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// The full set of phrase tables consumed by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconSet {
    /// Culturally-coded deflection phrases; force positive stated valence
    pub deflection: PhraseMatcher,
    /// Explicit positive phrases
    pub positive: PhraseMatcher,
    /// Explicit negative phrases
    pub negative: PhraseMatcher,
    /// Crisis phrases; any match floors the risk level at high
    pub crisis: PhraseMatcher,
    /// Resolution/finality language for the post-decision calm override
    pub finality: PhraseMatcher,
}

impl LexiconSet {
    /// Built-in English tables
    pub fn english() -> Self {
        let locale = "en";
        Self {
            deflection: PhraseMatcher::compile(
                locale,
                [
                    "i'm fine",
                    "im fine",
                    "i am fine",
                    "it's nothing",
                    "its nothing",
                    "don't worry about me",
                    "dont worry about me",
                    "i'm okay, really",
                    "im okay really",
                    "all good",
                    "no big deal",
                    "can't complain",
                    "same as always",
                    "doesn't matter",
                ],
            ),
            positive: PhraseMatcher::compile(
                locale,
                [
                    "i feel great",
                    "feeling good",
                    "i'm happy",
                    "im happy",
                    "wonderful",
                    "really enjoyed",
                    "things are looking up",
                    "i had a good day",
                    "pretty good",
                    "excited",
                ],
            ),
            negative: PhraseMatcher::compile(
                locale,
                [
                    "i feel terrible",
                    "i'm sad",
                    "im sad",
                    "i'm so tired of",
                    "exhausted",
                    "hopeless",
                    "miserable",
                    "i can't take",
                    "cant take",
                    "everything hurts",
                    "lonely",
                    "worthless",
                    "i hate",
                    "awful",
                ],
            ),
            crisis: PhraseMatcher::compile(
                locale,
                [
                    "end it",
                    "end my life",
                    "kill myself",
                    "want to die",
                    "wish i was dead",
                    "wish i were dead",
                    "no reason to live",
                    "better off without me",
                    "hurt myself",
                    "harm myself",
                    "not worth living",
                    "can't go on",
                    "cant go on",
                ],
            ),
            finality: PhraseMatcher::compile(
                locale,
                [
                    "goodbye",
                    "it'll all be over",
                    "it will all be over",
                    "won't have to worry",
                    "wont have to worry",
                    "at peace now",
                    "made my decision",
                    "it's settled",
                    "its settled",
                    "taken care of everything",
                    "everything is in order",
                    "won't be a burden",
                    "wont be a burden",
                ],
            ),
        }
    }
}

impl Default for LexiconSet {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_matching() {
        let matcher = PhraseMatcher::compile("en", ["I'm Fine", "all good"]);

        assert!(matcher.matches("honestly, I'M FINE today"));
        assert!(matcher.matches("yeah, All Good here"));
        assert!(!matcher.matches("not great"));
    }

    #[test]
    fn test_first_match_returns_compiled_phrase() {
        let matcher = PhraseMatcher::compile("en", ["End It", "want to die"]);

        assert_eq!(matcher.first_match("I just want to END IT"), Some("end it"));
        assert_eq!(matcher.first_match("nothing here"), None);
    }

    #[test]
    fn test_word_boundaries_respected() {
        let matcher = PhraseMatcher::compile("en", ["end it", "awful"]);

        assert!(!matcher.matches("let's blend it together"));
        assert!(!matcher.matches("that's lawful"));
        assert!(!matcher.matches("the most awfully long meeting"));
        assert!(matcher.matches("I want to end it."));
        assert!(matcher.matches("an awful day"));
    }

    #[test]
    fn test_empty_and_blank_phrases_dropped() {
        let matcher = PhraseMatcher::compile("en", ["", "  ", "real phrase"]);

        assert_eq!(matcher.len(), 1);
        assert!(matcher.matches("a real phrase indeed"));
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let matcher = PhraseMatcher::empty("en");
        assert!(matcher.is_empty());
        assert!(!matcher.matches("anything at all"));
    }

    #[test]
    fn test_english_tables_cover_scenarios() {
        let lexicon = LexiconSet::english();

        assert!(lexicon.deflection.matches("I'm fine, really"));
        assert!(lexicon.crisis.matches("I want to end it"));
        assert!(lexicon.finality.matches("soon it'll all be over"));
        assert_eq!(lexicon.crisis.locale(), "en");
    }

    #[test]
    fn test_lexicon_serde_roundtrip() {
        let lexicon = LexiconSet::english();
        let json = serde_json::to_string(&lexicon).unwrap();
        let loaded: LexiconSet = serde_json::from_str(&json).unwrap();

        assert!(loaded.deflection.matches("it's nothing"));
        assert_eq!(loaded.positive.len(), lexicon.positive.len());
    }
}
