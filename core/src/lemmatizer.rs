use crate::error::{Error, Result};
use crate::html::clean_html;
use crate::morphology::{Language, Morphology, PartOfSpeech, SnowballMorphology};
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Lemma -> number of occurrences in the analyzed text.
pub type LemmaCounts = HashMap<String, u32>;
/// Lemma -> word index of its last occurrence.
pub type LemmaPositions = HashMap<String, usize>;

const RUSSIAN_EXCLUDED: &[PartOfSpeech] = &[
    PartOfSpeech::Conjunction,
    PartOfSpeech::Preposition,
    PartOfSpeech::Particle,
    PartOfSpeech::Interjection,
];

const ENGLISH_EXCLUDED: &[PartOfSpeech] = &[
    PartOfSpeech::Preposition,
    PartOfSpeech::Particle,
    PartOfSpeech::Article,
    PartOfSpeech::Pronoun,
];

struct LanguagePass {
    /// Matches every character outside the pass alphabet.
    outside_alphabet: Regex,
    excluded: &'static [PartOfSpeech],
    morphology: Box<dyn Morphology>,
}

impl LanguagePass {
    fn new(
        morphology: Box<dyn Morphology>,
        expected: Language,
        outside_alphabet: &str,
        excluded: &'static [PartOfSpeech],
    ) -> Result<Self> {
        if morphology.language() != expected {
            return Err(Error::Lemmatization(format!(
                "expected a {expected:?} analyzer, got {:?}",
                morphology.language()
            )));
        }
        let outside_alphabet =
            Regex::new(outside_alphabet).map_err(|e| Error::Lemmatization(e.to_string()))?;
        Ok(Self { outside_alphabet, excluded, morphology })
    }

    fn words(&self, text: &str) -> Vec<String> {
        self.outside_alphabet
            .replace_all(text, " ")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Normal form of a content word; `None` for unknown and function words.
    fn lemma(&self, word: &str) -> Option<String> {
        let info = self.morphology.analyze(word)?;
        if self.excluded.contains(&info.part_of_speech) {
            return None;
        }
        info.normal_forms.into_iter().next()
    }

    fn normal_form(&self, word: &str) -> Option<String> {
        let cleaned = self.outside_alphabet.replace_all(word, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }
        self.morphology.analyze(cleaned)?.normal_forms.into_iter().next()
    }
}

/// Turns text into lemma counts. A Russian pass and an English pass run
/// independently over the same normalized text.
pub struct Lemmatizer {
    passes: Vec<LanguagePass>,
}

impl Lemmatizer {
    /// Builds the default Russian + English lemmatizer.
    pub fn new() -> Result<Self> {
        Self::with_analyzers(
            Box::new(SnowballMorphology::russian()),
            Box::new(SnowballMorphology::english()),
        )
    }

    pub fn with_analyzers(
        russian: Box<dyn Morphology>,
        english: Box<dyn Morphology>,
    ) -> Result<Self> {
        let passes = vec![
            LanguagePass::new(russian, Language::Russian, r"[^а-яё\s]", RUSSIAN_EXCLUDED)?,
            LanguagePass::new(english, Language::English, r"[^a-z\s]", ENGLISH_EXCLUDED)?,
        ];
        tracing::debug!(passes = passes.len(), "lemmatizer ready");
        Ok(Self { passes })
    }

    /// Lemma counts of an HTML document's body text.
    pub fn lemmatize_html(&self, html: &str) -> LemmaCounts {
        self.lemmatize(&clean_html(html))
    }

    /// Lemma counts of plain text.
    pub fn lemmatize(&self, text: &str) -> LemmaCounts {
        let mut counts = LemmaCounts::new();
        let text = normalize(text);
        if text.trim().is_empty() {
            return counts;
        }
        for pass in &self.passes {
            for word in pass.words(&text) {
                if let Some(lemma) = pass.lemma(&word) {
                    *counts.entry(lemma).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Word index of the last occurrence of each lemma.
    pub fn lemma_positions(&self, text: &str) -> LemmaPositions {
        let mut positions = LemmaPositions::new();
        let text = normalize(text);
        for pass in &self.passes {
            for (i, word) in pass.words(&text).iter().enumerate() {
                if let Some(lemma) = pass.lemma(word) {
                    positions.insert(lemma, i);
                }
            }
        }
        positions
    }

    /// Normal form of a single raw word, trying the Cyrillic alphabet first.
    pub fn lemma_of(&self, word: &str) -> Option<String> {
        let word = normalize(word);
        self.passes.iter().find_map(|pass| pass.normal_form(&word))
    }
}

fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemmatizer() -> Lemmatizer {
        Lemmatizer::new().unwrap()
    }

    #[test]
    fn counts_inflected_forms_together() {
        let l = lemmatizer();
        let counts = l.lemmatize("Кошка ловит мышь, кошки ловят мышей.");
        let cat = l.lemma_of("кошка").unwrap();
        assert_eq!(counts[&cat], 2);
    }

    #[test]
    fn function_words_are_dropped() {
        let l = lemmatizer();
        let counts = l.lemmatize("кошка и собака на диване, the cat and a dog");
        for word in ["и", "на", "the", "a"] {
            assert!(!counts.contains_key(word), "{word} must be excluded");
        }
        // English conjunctions are content for the English pass.
        assert!(counts.contains_key("and"));
        assert!(counts.contains_key("cat"));
    }

    #[test]
    fn passes_run_independently() {
        let l = lemmatizer();
        let counts = l.lemmatize("Rust язык");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&l.lemma_of("rust").unwrap()], 1);
        assert_eq!(counts[&l.lemma_of("язык").unwrap()], 1);
    }

    #[test]
    fn lemmatization_is_deterministic() {
        let l = lemmatizer();
        let text = "Собаки бегают по парку, а кошки спят. Dogs are running.";
        assert_eq!(l.lemmatize(text), l.lemmatize(text));
    }

    #[test]
    fn positions_keep_last_occurrence() {
        let l = lemmatizer();
        let positions = l.lemma_positions("кошка спит кошка");
        assert_eq!(positions[&l.lemma_of("кошка").unwrap()], 2);
    }

    #[test]
    fn lemma_of_falls_back_to_latin() {
        let l = lemmatizer();
        assert_eq!(l.lemma_of("Running!").as_deref(), Some("run"));
        assert!(l.lemma_of("123").is_none());
        assert!(l.lemma_of("кошки,").is_some());
    }

    #[test]
    fn html_bodies_are_cleaned_first() {
        let l = lemmatizer();
        let counts =
            l.lemmatize_html("<html><body><a href='/'>собака</a><p>кошка</p></body></html>");
        assert_eq!(counts.len(), 1);
        assert!(counts.contains_key(&l.lemma_of("кошка").unwrap()));
    }

    #[test]
    fn wrong_language_analyzer_is_rejected() {
        let result = Lemmatizer::with_analyzers(
            Box::new(SnowballMorphology::english()),
            Box::new(SnowballMorphology::english()),
        );
        assert!(matches!(result, Err(Error::Lemmatization(_))));
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(lemmatizer().lemmatize("   ").is_empty());
    }
}
