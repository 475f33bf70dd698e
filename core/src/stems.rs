use lazy_static::lazy_static;
use rust_stemmers::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    static ref ENGLISH: rust_stemmers::Stemmer = rust_stemmers::Stemmer::create(Algorithm::English);
}

/// Surface word → stem. Implementations are pure.
pub trait Stemmer: Send + Sync {
    fn stem(&self, word: &str) -> String;
}

/// Snowball English stemmer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishStemmer;

impl Stemmer for EnglishStemmer {
    fn stem(&self, word: &str) -> String {
        ENGLISH.stem(word).into_owned()
    }
}

/// Stem → surface words sharing it. Only stems with at least two distinct
/// surface forms are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemMap {
    stems: BTreeMap<String, Vec<String>>,
}

impl StemMap {
    pub fn build<'a, I, S>(vocabulary: I, stemmer: &S) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        S: Stemmer + ?Sized,
    {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for word in vocabulary {
            groups.entry(stemmer.stem(word)).or_default().push(word.to_string());
        }
        Self::from_groups(groups)
    }

    pub fn from_groups(groups: BTreeMap<String, Vec<String>>) -> Self {
        let stems = groups
            .into_iter()
            .filter_map(|(stem, mut words)| {
                words.sort();
                words.dedup();
                (words.len() > 1).then_some((stem, words))
            })
            .collect();
        Self { stems }
    }

    pub fn words_for_stem(&self, stem: &str) -> Option<&[String]> {
        self.stems.get(stem).map(Vec::as_slice)
    }

    /// The word itself followed by every other surface form sharing its stem.
    pub fn expand<S: Stemmer + ?Sized>(&self, word: &str, stemmer: &S) -> Vec<String> {
        let mut out = vec![word.to_string()];
        if let Some(siblings) = self.words_for_stem(&stemmer.stem(word)) {
            out.extend(siblings.iter().filter(|w| w.as_str() != word).cloned());
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.stems.iter().map(|(s, w)| (s.as_str(), w.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_stems_are_dropped() {
        let map = StemMap::build(["running", "run", "runs", "cat"], &EnglishStemmer);
        assert_eq!(map.words_for_stem("run").unwrap(), ["run", "running", "runs"]);
        assert!(map.words_for_stem("cat").is_none());
    }

    #[test]
    fn expansion_keeps_original_first() {
        let map = StemMap::build(["running", "run", "runs"], &EnglishStemmer);
        assert_eq!(map.expand("runs", &EnglishStemmer), vec!["runs", "run", "running"]);
        assert_eq!(map.expand("walking", &EnglishStemmer), vec!["walking"]);
    }
}
