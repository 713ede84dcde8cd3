//! Extraction pipeline collaborators
//!
//! Theme classification, narrative extraction and summarization are
//! external calls (typically an LLM). `KeywordExtractor` is a deterministic
//! rule-based stand-in: no model, only keyword and sentence rules.

use crate::error::{Error, Result};
use crate::memory::NarrativeElements;
use async_trait::async_trait;
use regex::Regex;

/// Extraction collaborator used only by the candidate lifecycle
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Classify themes present in the text
    async fn classify_themes(&self, text: &str) -> Result<Vec<String>>;

    /// Extract structured narrative elements
    async fn extract_narrative(&self, text: &str) -> Result<NarrativeElements>;

    /// Summarize the text
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Everything a candidate needs from the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub themes: Vec<String>,
    pub narrative_elements: NarrativeElements,
    pub summary: String,
}

/// Run all three extraction calls concurrently. Succeeds only if every call
/// succeeds; any failure becomes `Error::Processing`.
pub async fn extract_all(backend: &dyn ExtractionBackend, text: &str) -> Result<Extraction> {
    let (themes, narrative_elements, summary) = futures::try_join!(
        backend.classify_themes(text),
        backend.extract_narrative(text),
        backend.summarize(text),
    )
    .map_err(|e| match e {
        Error::Processing(msg) => Error::Processing(msg),
        other => Error::Processing(format!("{} extraction failed: {other}", backend.name())),
    })?;

    if summary.trim().is_empty() {
        return Err(Error::Processing(format!(
            "{} returned an empty summary",
            backend.name()
        )));
    }

    Ok(Extraction {
        themes,
        narrative_elements,
        summary,
    })
}

/// Theme → trigger words
fn default_theme_lexicon() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("career", &["work", "job", "career", "boss", "office", "promotion", "colleague"]),
        ("creativity", &["creative", "art", "write", "writing", "paint", "music", "design", "side project"]),
        ("personal-growth", &["learn", "learning", "skill", "grow", "improve", "practice", "habit"]),
        ("relationships", &["friend", "family", "partner", "mother", "father", "love", "together"]),
        ("health", &["exercise", "run", "sleep", "tired", "doctor", "walk", "meditate"]),
        ("nature", &["sea", "forest", "mountain", "garden", "rain", "sunset", "beach"]),
    ]
}

const DESIRE_WORDS: &[&str] = &["want", "hope", "wish", "plan", "trying to", "started", "dream", "goal"];
const OBSTACLE_WORDS: &[&str] = &["but", "however", "lack", "can't", "cannot", "hard", "struggle", "afraid", "no time"];
const POSITIVE_WORDS: &[&str] = &["great", "happy", "excited", "proud", "motivated", "grateful", "calm", "finally"];
const NEGATIVE_WORDS: &[&str] = &["sad", "angry", "tired", "anxious", "lonely", "frustrated", "afraid", "worried"];

/// Rule-based extraction backend.
pub struct KeywordExtractor {
    lexicon: Vec<(&'static str, &'static [&'static str])>,
    sentence: Regex,
    first_person: Regex,
    max_summary_chars: usize,
}

impl KeywordExtractor {
    /// Create an extractor with the built-in theme lexicon
    pub fn new() -> Result<Self> {
        let sentence = Regex::new(r"[^.!?\n]+[.!?]?")
            .map_err(|e| Error::Config(format!("invalid sentence pattern: {e}")))?;
        let first_person = Regex::new(r"(?i)\b(i|me|my|myself|we|our)\b")
            .map_err(|e| Error::Config(format!("invalid pronoun pattern: {e}")))?;
        Ok(Self {
            lexicon: default_theme_lexicon(),
            sentence,
            first_person,
            max_summary_chars: 200,
        })
    }

    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.sentence
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn first_sentence_with<'a>(&self, sentences: &[&'a str], words: &[&str]) -> Option<&'a str> {
        sentences.iter().copied().find(|s| {
            let lower = s.to_lowercase();
            words.iter().any(|w| contains_word(&lower, w))
        })
    }
}

/// Word-boundary containment for single words, substring for phrases.
fn contains_word(haystack: &str, word: &str) -> bool {
    if word.contains(' ') {
        return haystack.contains(word);
    }
    haystack
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|token| token == word)
}

fn count_words(haystack: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| contains_word(haystack, w)).count()
}

#[async_trait]
impl ExtractionBackend for KeywordExtractor {
    async fn classify_themes(&self, text: &str) -> Result<Vec<String>> {
        let lower = text.to_lowercase();
        let mut themes: Vec<String> = self
            .lexicon
            .iter()
            .filter(|(_, words)| words.iter().any(|w| contains_word(&lower, w)))
            .map(|(theme, _)| theme.to_string())
            .collect();
        if themes.is_empty() {
            themes.push("everyday".to_string());
        }
        Ok(themes)
    }

    async fn extract_narrative(&self, text: &str) -> Result<NarrativeElements> {
        let sentences = self.sentences(text);
        let lower = text.to_lowercase();

        let positive = count_words(&lower, POSITIVE_WORDS);
        let negative = count_words(&lower, NEGATIVE_WORDS);
        let tone = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => "hopeful",
            std::cmp::Ordering::Less => "troubled",
            std::cmp::Ordering::Equal => "reflective",
        };

        Ok(NarrativeElements {
            protagonist: self
                .first_person
                .is_match(text)
                .then(|| "self".to_string()),
            desire: self
                .first_sentence_with(&sentences, DESIRE_WORDS)
                .map(str::to_string),
            obstacle: self
                .first_sentence_with(&sentences, OBSTACLE_WORDS)
                .map(str::to_string),
            tone: Some(tone.to_string()),
        })
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let sentences = self.sentences(text);
        let Some(first) = sentences.first() else {
            return Err(Error::Processing("nothing to summarize".to_string()));
        };

        let mut summary: String = first.chars().take(self.max_summary_chars).collect();
        if first.chars().count() > self.max_summary_chars {
            summary.push('…');
        }
        if sentences.len() > 1 {
            summary = format!("{summary} (+{} more sentences)", sentences.len() - 1);
        }
        Ok(format!("The author wrote: {summary}"))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSummarizer;

    #[async_trait]
    impl ExtractionBackend for FailingSummarizer {
        async fn classify_themes(&self, _text: &str) -> Result<Vec<String>> {
            Ok(vec!["career".to_string()])
        }
        async fn extract_narrative(&self, _text: &str) -> Result<NarrativeElements> {
            Ok(NarrativeElements::default())
        }
        async fn summarize(&self, _text: &str) -> Result<String> {
            Err(Error::Store("model unavailable".to_string()))
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_themes_from_lexicon() {
        let extractor = KeywordExtractor::new().unwrap();
        let themes = extractor
            .classify_themes("I want to learn a new skill for work")
            .await
            .unwrap();
        assert!(themes.contains(&"career".to_string()));
        assert!(themes.contains(&"personal-growth".to_string()));
    }

    #[tokio::test]
    async fn test_no_theme_falls_back() {
        let extractor = KeywordExtractor::new().unwrap();
        let themes = extractor.classify_themes("Nothing much today.").await.unwrap();
        assert_eq!(themes, vec!["everyday"]);
    }

    #[tokio::test]
    async fn test_narrative_elements() {
        let extractor = KeywordExtractor::new().unwrap();
        let narrative = extractor
            .extract_narrative("I finally started my side project. But I have no time on weekdays.")
            .await
            .unwrap();
        assert_eq!(narrative.protagonist.as_deref(), Some("self"));
        assert_eq!(narrative.desire.as_deref(), Some("I finally started my side project."));
        assert_eq!(narrative.obstacle.as_deref(), Some("But I have no time on weekdays."));
        assert_eq!(narrative.tone.as_deref(), Some("hopeful"));
    }

    #[tokio::test]
    async fn test_summary_uses_first_sentence() {
        let extractor = KeywordExtractor::new().unwrap();
        let summary = extractor
            .summarize("Walked by the sea. It rained later.")
            .await
            .unwrap();
        assert_eq!(summary, "The author wrote: Walked by the sea. (+1 more sentences)");
        assert!(extractor.summarize("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_extract_all_succeeds() {
        let extractor = KeywordExtractor::new().unwrap();
        let extraction = extract_all(&extractor, "I love painting with my friend.")
            .await
            .unwrap();
        assert!(extraction.themes.contains(&"creativity".to_string()) || extraction.themes.contains(&"relationships".to_string()));
        assert!(!extraction.summary.is_empty());
    }

    #[tokio::test]
    async fn test_extract_all_fails_if_any_step_fails() {
        let err = extract_all(&FailingSummarizer, "some text").await.unwrap_err();
        assert!(matches!(err, Error::Processing(ref m) if m.contains("failing")));
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("i can't sleep", "can't"));
        assert!(!contains_word("homework", "work"));
        assert!(contains_word("my side project", "side project"));
    }
}
