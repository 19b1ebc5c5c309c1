use crate::lemmatizer::Lemmatizer;
use std::collections::{BTreeSet, HashSet};

pub const DEFAULT_SNIPPET_WORDS: usize = 30;
const ELLIPSIS: &str = "... ";

/// Builds a highlighted excerpt of `text` around words whose lemma is in
/// `query_lemmas`.
///
/// Every occurrence gets a window of `word_budget / occurrences` words
/// (at least one) around it; windows overlapping an already accepted one are
/// dropped. Accepted windows never exceed `word_budget` words in total.
pub fn generate_snippet(
    lemmatizer: &Lemmatizer,
    text: &str,
    query_lemmas: &HashSet<String>,
    word_budget: usize,
) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if query_lemmas.is_empty() || words.is_empty() {
        return String::new();
    }

    let hits = find_occurrences(lemmatizer, &words, query_lemmas);
    if hits.is_empty() {
        return String::new();
    }
    let size = (word_budget / hits.len()).max(1);
    let before = size / 2;

    let mut windows: Vec<(usize, usize)> = Vec::new();
    let mut used = 0;
    for &hit in &hits {
        let start = hit.saturating_sub(before);
        let end = (hit + size - before).min(words.len());
        if windows.iter().any(|&(s, e)| start < e && s < end) {
            continue;
        }
        if !windows.is_empty() && used + (end - start) > word_budget {
            break;
        }
        used += end - start;
        windows.push((start, end));
    }
    windows.sort_unstable();

    windows
        .iter()
        .map(|&(start, end)| {
            (start..end)
                .map(|i| {
                    if hits.contains(&i) {
                        format!("<b>{}</b>", words[i])
                    } else {
                        words[i].to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(ELLIPSIS)
}

/// Word indices whose lemma matches the query, ascending. A single-lemma
/// query stops at its first occurrence.
fn find_occurrences(
    lemmatizer: &Lemmatizer,
    words: &[&str],
    query_lemmas: &HashSet<String>,
) -> BTreeSet<usize> {
    let mut hits = BTreeSet::new();
    for (i, word) in words.iter().enumerate() {
        let matched = lemmatizer
            .lemma_of(word)
            .is_some_and(|lemma| query_lemmas.contains(&lemma));
        if matched {
            hits.insert(i);
            if query_lemmas.len() == 1 {
                break;
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemmas(l: &Lemmatizer, words: &[&str]) -> HashSet<String> {
        words.iter().filter_map(|w| l.lemma_of(w)).collect()
    }

    #[test]
    fn single_lemma_uses_first_occurrence_only() {
        let l = Lemmatizer::new().unwrap();
        let text = "кошка спит. потом снова кошка";
        let snippet = generate_snippet(&l, text, &lemmas(&l, &["кошка"]), 30);
        assert_eq!(snippet.matches("<b>").count(), 1);
        assert!(snippet.starts_with("<b>кошка</b>"));
        assert!(!snippet.contains("..."));
    }

    #[test]
    fn windows_never_overlap() {
        let l = Lemmatizer::new().unwrap();
        let filler = vec!["слово"; 40].join(" ");
        let text = format!("кошка {filler} собака рядом {filler} кошка");
        let snippet = generate_snippet(&l, &text, &lemmas(&l, &["кошка", "собака"]), 30);
        // Three occurrences, ten words each: three disjoint windows.
        assert_eq!(snippet.matches(ELLIPSIS).count(), 2);
        assert_eq!(snippet.matches("<b>").count(), 3);
    }

    #[test]
    fn dense_matches_stay_within_budget() {
        let l = Lemmatizer::new().unwrap();
        let text = vec!["кошка слово собака слово"; 200].join(" ");
        let snippet = generate_snippet(&l, &text, &lemmas(&l, &["кошка", "собака"]), 30);
        let words = snippet.split_whitespace().filter(|w| *w != "...").count();
        assert!(words > 0 && words <= 30, "{words} words");
        assert!(snippet.starts_with("<b>кошка</b>"));
    }

    #[test]
    fn overlapping_window_is_dropped_not_merged() {
        let l = Lemmatizer::new().unwrap();
        let text = "кошка и собака";
        let snippet = generate_snippet(&l, text, &lemmas(&l, &["кошка", "собака"]), 30);
        assert_eq!(snippet, "<b>кошка</b> и <b>собака</b>");
    }

    #[test]
    fn empty_inputs_give_empty_snippet() {
        let l = Lemmatizer::new().unwrap();
        assert_eq!(generate_snippet(&l, "", &lemmas(&l, &["кошка"]), 30), "");
        assert_eq!(generate_snippet(&l, "кошка", &HashSet::new(), 30), "");
        assert_eq!(generate_snippet(&l, "собака", &lemmas(&l, &["кошка"]), 30), "");
    }
}
