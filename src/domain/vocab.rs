// ============================================================
// Layer 3 — Vocabulary Domain Type
// ============================================================
// A bijection between the characters of the corpus and dense
// integer ids. It is the decoding contract for the model's
// output layer: id 7 must mean the same character in every run
// that shares a checkpoint.
//
// Construction order:
//   1. Count every character in the corpus
//   2. Sort by descending frequency (ties → by code point)
//   3. The position in that list is the character's id
//
// Example:
//   corpus "abbccc"  →  chars = ['c', 'b', 'a']
//                       vocab = { 'c': 0, 'b': 1, 'a': 2 }

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Ordered symbol list plus the symbol → id mapping.
///
/// Both halves are persisted and both are compared on resume:
/// two vocabularies with the same symbols but a different id
/// assignment are NOT interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Symbols in id order — `chars[id]` decodes an id
    pub chars: Vec<char>,

    /// Symbol → id lookup used to encode the corpus
    pub vocab: BTreeMap<char, usize>,
}

/// Which half of a vocabulary comparison failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabMismatch {
    /// The two vocabularies cover different symbols
    SymbolSet,
    /// Same symbols, but at least one maps to a different id
    IdAssignment,
}

impl Vocabulary {
    /// Build the vocabulary for a corpus, most frequent symbol first.
    pub fn from_corpus(text: &str) -> Self {
        let mut counts: HashMap<char, usize> = HashMap::new();
        for c in text.chars() {
            *counts.entry(c).or_insert(0) += 1;
        }

        let mut ranked: Vec<(char, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let chars: Vec<char> = ranked.into_iter().map(|(c, _)| c).collect();
        Self::from_chars(chars)
    }

    /// Build a vocabulary whose ids follow the given symbol order.
    pub fn from_chars(chars: Vec<char>) -> Self {
        let vocab = chars
            .iter()
            .enumerate()
            .map(|(id, &c)| (c, id))
            .collect();
        Self { chars, vocab }
    }

    /// Number of distinct symbols
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Id of a symbol, if the symbol is known
    pub fn id_of(&self, c: char) -> Option<usize> {
        self.vocab.get(&c).copied()
    }

    /// Encode a whole text. Unknown symbols are skipped.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        text.chars().filter_map(|c| self.id_of(c)).collect()
    }

    /// Compare against a saved vocabulary.
    ///
    /// The symbol set is checked first so that a completely
    /// different corpus is reported as such, not as a permutation.
    pub fn check_against(&self, saved: &Vocabulary) -> Result<(), VocabMismatch> {
        let mut mine:   Vec<char> = self.chars.clone();
        let mut theirs: Vec<char> = saved.chars.clone();
        mine.sort_unstable();
        theirs.sort_unstable();

        if mine != theirs {
            return Err(VocabMismatch::SymbolSet);
        }
        if self.chars != saved.chars || self.vocab != saved.vocab {
            return Err(VocabMismatch::IdAssignment);
        }
        Ok(())
    }
}
