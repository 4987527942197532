//! Stated-sentiment classification
//!
//! Turns transcript text into a valence + confidence. Classification is
//! purely lexical: deflection phrases are checked first and force positive
//! valence regardless of literal negativity elsewhere in the utterance, then
//! explicit positive and negative tables, then a neutral default.
//!
//! Results are memoized in a bounded LRU cache keyed by a hash of the
//! lowercased transcript; the cache is shared and safe for concurrent use.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::SentimentConfig;
use crate::lexicon::LexiconSet;
use crate::types::{SentimentObservation, Valence};

/// Lexical sentiment classifier with a bounded memo cache
pub struct SentimentClassifier {
    config: SentimentConfig,
    lexicon: LexiconSet,
    cache: Mutex<LruCache<u64, SentimentObservation>>,
}

impl SentimentClassifier {
    pub fn new(config: SentimentConfig, lexicon: LexiconSet) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            lexicon,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Classify the stated valence of a transcript.
    ///
    /// Table order is significant: deflection overrides explicit matches.
    pub fn classify(&self, transcript: &str) -> SentimentObservation {
        let key = transcript_key(transcript);

        if let Some(cached) = self.cache.lock().get(&key) {
            return *cached;
        }

        let observation = self.classify_uncached(transcript);
        self.cache.lock().put(key, observation);
        observation
    }

    fn classify_uncached(&self, transcript: &str) -> SentimentObservation {
        if self.lexicon.deflection.matches(transcript) {
            return SentimentObservation {
                valence: Valence::Positive,
                confidence: self.config.deflection_confidence,
            };
        }
        if self.lexicon.positive.matches(transcript) {
            return SentimentObservation {
                valence: Valence::Positive,
                confidence: self.config.explicit_confidence,
            };
        }
        if self.lexicon.negative.matches(transcript) {
            return SentimentObservation {
                valence: Valence::Negative,
                confidence: self.config.explicit_confidence,
            };
        }
        SentimentObservation {
            valence: Valence::Neutral,
            confidence: self.config.default_confidence,
        }
    }

    /// Number of memoized transcripts currently cached
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}

fn transcript_key(transcript: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    transcript.to_lowercase().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_classifier() -> SentimentClassifier {
        SentimentClassifier::new(SentimentConfig::default(), LexiconSet::english())
    }

    #[test]
    fn test_deflection_forces_positive() {
        let classifier = make_classifier();

        // Literal negativity later in the phrase does not matter
        let obs = classifier.classify("I'm fine, everything is awful anyway");
        assert_eq!(obs.valence, Valence::Positive);
        assert!((obs.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_positive_and_negative() {
        let classifier = make_classifier();

        let pos = classifier.classify("I feel great today");
        assert_eq!(pos.valence, Valence::Positive);
        assert!((pos.confidence - 0.8).abs() < 1e-9);

        let neg = classifier.classify("honestly I feel terrible");
        assert_eq!(neg.valence, Valence::Negative);
        assert!((neg.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_default_neutral() {
        let classifier = make_classifier();

        let obs = classifier.classify("the weather changed this afternoon");
        assert_eq!(obs.valence, Valence::Neutral);
        assert!((obs.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cache_hit_is_case_insensitive() {
        let classifier = make_classifier();

        let first = classifier.classify("I Feel Great");
        assert_eq!(classifier.cache_len(), 1);

        let second = classifier.classify("i feel great");
        assert_eq!(classifier.cache_len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_eviction_respects_capacity() {
        let config = SentimentConfig {
            cache_capacity: 2,
            ..SentimentConfig::default()
        };
        let classifier = SentimentClassifier::new(config, LexiconSet::english());

        classifier.classify("first utterance");
        classifier.classify("second utterance");
        classifier.classify("third utterance");

        assert_eq!(classifier.cache_len(), 2);
    }
}
