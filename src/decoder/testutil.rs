#![cfg(test)]

use std::collections::HashMap;

use crate::fst::{DictionaryFst, FstArc};
use crate::scorer::NgramScorer;

use super::DecodeOptions;

/// Symbol indices of the shared test vocabulary.
pub const SPACE: usize = 1;
pub const A: usize = 2;
pub const B: usize = 3;
pub const C: usize = 4;
pub const BLANK: usize = 5;

/// Shared vocabulary for decoder tests: `' `, space, a, b, c, blank.
pub fn test_vocab() -> Vec<String> {
    ["'", " ", "a", "b", "c", "_"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn opts(beam_size: usize) -> DecodeOptions {
    DecodeOptions {
        beam_size,
        cutoff_prob: 1.0,
        cutoff_top_n: 6,
        blank_id: BLANK,
        log_input: false,
    }
}

/// A frame putting all mass on one symbol.
pub fn one_hot(symbol: usize) -> Vec<f64> {
    let mut frame = vec![0.0; 6];
    frame[symbol] = 1.0;
    frame
}

/// Compile a trie-shaped dictionary accepting exactly `words`, each a
/// sequence of vocabulary symbol indices.
pub fn dictionary_of(words: &[&[usize]]) -> DictionaryFst {
    let mut fst = DictionaryFst::new();
    let mut transitions: HashMap<(usize, usize), usize> = HashMap::new();
    for &word in words {
        let mut state = fst.start();
        for &symbol in word {
            state = *transitions.entry((state, symbol)).or_insert_with(|| {
                let target = fst.add_state();
                fst.add_arc(
                    state,
                    FstArc {
                        ilabel: symbol,
                        nextstate: target,
                    },
                );
                target
            });
        }
        fst.set_final(state);
    }
    fst.arc_sort_input();
    fst
}

/// Character-level unigram scorer over the test vocabulary.
pub fn char_scorer(alpha: f64, beta: f64, unigrams: &[(&str, f64)]) -> NgramScorer {
    let mut scorer = NgramScorer::new(1, alpha, beta, true, test_vocab());
    for &(token, log_prob) in unigrams {
        scorer.insert_gram([token], log_prob);
    }
    scorer
}

/// Word-level unigram scorer with an attached dictionary.
pub fn word_scorer(
    alpha: f64,
    beta: f64,
    unigrams: &[(&str, f64)],
    words: &[&[usize]],
) -> NgramScorer {
    let mut scorer = NgramScorer::new(1, alpha, beta, false, test_vocab());
    for &(token, log_prob) in unigrams {
        scorer.insert_gram([token], log_prob);
    }
    scorer.with_dictionary(dictionary_of(words))
}
