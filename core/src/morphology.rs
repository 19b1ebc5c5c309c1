use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Russian,
    English,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    Content,
    Conjunction,
    Preposition,
    Particle,
    Interjection,
    Article,
    Pronoun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphInfo {
    pub part_of_speech: PartOfSpeech,
    /// Candidate normal forms, best first. Never empty.
    pub normal_forms: Vec<String>,
}

/// Morphological analyzer for one language.
pub trait Morphology: Send + Sync {
    fn language(&self) -> Language;

    /// Analyzes a lowercase word of this language's alphabet.
    fn analyze(&self, word: &str) -> Option<MorphInfo>;
}

lazy_static! {
    static ref RUSSIAN_FUNCTION_WORDS: HashMap<&'static str, PartOfSpeech> = {
        let mut m = HashMap::new();
        let groups: &[(PartOfSpeech, &[&str])] = &[
            (PartOfSpeech::Conjunction, &[
                "и","а","но","или","либо","да","что","чтобы","если","как","когда","потому",
                "поэтому","хотя","зато","однако","также","тоже","будто","словно","пока","ибо",
                "притом","причем","причём","иль","нежели","дабы","тогда","то",
            ]),
            (PartOfSpeech::Preposition, &[
                "в","во","на","с","со","к","ко","по","за","из","изо","от","ото","до","о","об","обо",
                "у","под","подо","над","надо","при","про","для","без","безо","через","между",
                "перед","передо","около","вокруг","после","среди","вместо","кроме","ради","сквозь",
                "вдоль","возле","мимо","против","из-за","из-под",
            ]),
            (PartOfSpeech::Particle, &[
                "не","ни","ли","же","ж","бы","б","вот","вон","даже","лишь","только","ведь","уж",
                "разве","неужели","именно","пусть","пускай","ка","де","мол",
            ]),
            (PartOfSpeech::Interjection, &[
                "ах","ох","эх","ой","ай","ого","увы","ура","эй","ну","ух","фу","ага","браво","алло",
                "ишь","тсс","ба",
            ]),
        ];
        for (pos, words) in groups {
            for w in words.iter() {
                m.insert(*w, *pos);
            }
        }
        m
    };

    static ref ENGLISH_FUNCTION_WORDS: HashMap<&'static str, PartOfSpeech> = {
        let mut m = HashMap::new();
        let groups: &[(PartOfSpeech, &[&str])] = &[
            (PartOfSpeech::Article, &["a","an","the"]),
            (PartOfSpeech::Preposition, &[
                "about","above","across","after","against","along","among","around","at","before",
                "behind","below","beneath","beside","between","beyond","by","down","during",
                "except","for","from","in","inside","into","near","of","off","on","onto","out",
                "outside","over","past","since","through","throughout","to","toward","towards",
                "under","underneath","until","up","upon","with","within","without","via",
            ]),
            (PartOfSpeech::Particle, &["not","yes","no"]),
            (PartOfSpeech::Pronoun, &[
                "i","me","my","mine","myself","you","your","yours","yourself","yourselves","he",
                "him","his","himself","she","her","hers","herself","it","its","itself","we","us",
                "our","ours","ourselves","they","them","their","theirs","themselves","this","that",
                "these","those","who","whom","whose","which","what","whoever","whatever","anyone",
                "anybody","anything","everyone","everybody","everything","someone","somebody",
                "something","nobody","nothing","none","each","either","neither",
            ]),
            (PartOfSpeech::Conjunction, &[
                "and","or","but","nor","so","yet","because","although","though","if","unless",
                "while","whereas",
            ]),
            (PartOfSpeech::Interjection, &["oh","ah","wow","hey","oops","alas"]),
        ];
        for (pos, words) in groups {
            for w in words.iter() {
                m.insert(*w, *pos);
            }
        }
        m
    };
}

/// Dictionary-free analyzer: function words come from a closed-class table,
/// everything else is a content word normalized by its Snowball stem.
pub struct SnowballMorphology {
    language: Language,
    stemmer: Stemmer,
    function_words: &'static HashMap<&'static str, PartOfSpeech>,
}

impl SnowballMorphology {
    pub fn russian() -> Self {
        Self {
            language: Language::Russian,
            stemmer: Stemmer::create(Algorithm::Russian),
            function_words: &RUSSIAN_FUNCTION_WORDS,
        }
    }

    pub fn english() -> Self {
        Self {
            language: Language::English,
            stemmer: Stemmer::create(Algorithm::English),
            function_words: &ENGLISH_FUNCTION_WORDS,
        }
    }
}

impl Morphology for SnowballMorphology {
    fn language(&self) -> Language {
        self.language
    }

    fn analyze(&self, word: &str) -> Option<MorphInfo> {
        if word.is_empty() {
            return None;
        }
        let folded;
        let word = if self.language == Language::Russian && word.contains('ё') {
            folded = word.replace('ё', "е");
            folded.as_str()
        } else {
            word
        };
        if let Some(pos) = self.function_words.get(word) {
            return Some(MorphInfo { part_of_speech: *pos, normal_forms: vec![word.to_string()] });
        }
        let stem = self.stemmer.stem(word).to_string();
        Some(MorphInfo { part_of_speech: PartOfSpeech::Content, normal_forms: vec![stem] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn russian_inflections_share_normal_form() {
        let m = SnowballMorphology::russian();
        let a = m.analyze("кошка").unwrap();
        let b = m.analyze("кошки").unwrap();
        assert_eq!(a.part_of_speech, PartOfSpeech::Content);
        assert_eq!(a.normal_forms[0], b.normal_forms[0]);
    }

    #[test]
    fn russian_function_words_are_classified() {
        let m = SnowballMorphology::russian();
        assert_eq!(m.analyze("и").unwrap().part_of_speech, PartOfSpeech::Conjunction);
        assert_eq!(m.analyze("под").unwrap().part_of_speech, PartOfSpeech::Preposition);
        assert_eq!(m.analyze("ли").unwrap().part_of_speech, PartOfSpeech::Particle);
        assert_eq!(m.analyze("ой").unwrap().part_of_speech, PartOfSpeech::Interjection);
    }

    #[test]
    fn yo_is_folded() {
        let m = SnowballMorphology::russian();
        assert_eq!(m.analyze("ещё").unwrap().normal_forms, m.analyze("еще").unwrap().normal_forms);
    }

    #[test]
    fn english_stems_and_classifies() {
        let m = SnowballMorphology::english();
        assert_eq!(m.analyze("running").unwrap().normal_forms[0], "run");
        assert_eq!(m.analyze("the").unwrap().part_of_speech, PartOfSpeech::Article);
        assert_eq!(m.analyze("they").unwrap().part_of_speech, PartOfSpeech::Pronoun);
        assert!(m.analyze("").is_none());
    }
}
