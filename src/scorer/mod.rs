//! Language-model fusion seam.
//!
//! The decoder is generic over anything implementing [`Scorer`]; the crate
//! ships [`NgramScorer`], an in-memory n-gram table, as the reference
//! implementation.

mod ngram;

pub use ngram::{NgramScorer, END_TOKEN, START_TOKEN};

use crate::fst::DictionaryFst;

/// External language model consulted during beam expansion.
///
/// Implementations must be safe for concurrent reads: one scorer instance is
/// shared by every worker of a batch decode.
pub trait Scorer: Send + Sync {
    /// Language-model weight applied to every conditional log-prob.
    fn alpha(&self) -> f64;

    /// Additive bonus per scored transition (the word insertion bonus).
    fn beta(&self) -> f64;

    /// Character-level models score every extension; word-level models score
    /// only at word boundaries.
    fn is_character_based(&self) -> bool;

    /// The last up-to-`order` tokens of the prefix spelled by `labels`,
    /// front-padded with the sentence-start token when the prefix is shorter
    /// than the model order.
    fn make_ngram(&self, labels: &[usize]) -> Vec<String>;

    /// Conditional log-prob of the last token of `ngram` given the rest.
    fn get_log_cond_prob(&self, ngram: &[String]) -> f64;

    /// Sentence log-prob of `words` with boundary tokens, used to back the
    /// language-model contribution out of the final score estimate.
    fn get_sent_log_prob(&self, words: &[String]) -> f64;

    /// Map a symbol-index sequence to its words (to its per-symbol tokens for
    /// a character model).
    fn split_labels(&self, labels: &[usize]) -> Vec<String>;

    /// Word dictionary constraining prefix extension, if this scorer carries
    /// one. Only consulted for word-level models.
    fn dictionary(&self) -> Option<&DictionaryFst>;
}
