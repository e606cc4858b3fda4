use std::collections::HashMap;

use crate::fst::DictionaryFst;

use super::Scorer;

pub const START_TOKEN: &str = "<s>";
pub const END_TOKEN: &str = "</s>";

const DEFAULT_OOV_LOG_PROB: f64 = -10.0;

/// In-memory n-gram language model.
///
/// Conditional log-probs are looked up from an explicit table keyed by token
/// sequences, backing off by shortening the context one token at a time; a
/// sequence absent at every order scores the out-of-vocabulary floor.
pub struct NgramScorer {
    alpha: f64,
    beta: f64,
    order: usize,
    character_based: bool,
    vocabulary: Vec<String>,
    space_id: Option<usize>,
    grams: HashMap<Vec<String>, f64>,
    oov_log_prob: f64,
    dictionary: Option<DictionaryFst>,
}

impl NgramScorer {
    /// `order` is the n-gram order (clamped to at least 1). The space symbol
    /// is located by looking up the literal `" "` in `vocabulary`.
    pub fn new(
        order: usize,
        alpha: f64,
        beta: f64,
        character_based: bool,
        vocabulary: Vec<String>,
    ) -> Self {
        let space_id = vocabulary.iter().position(|t| t == " ");
        Self {
            alpha,
            beta,
            order: order.max(1),
            character_based,
            vocabulary,
            space_id,
            grams: HashMap::new(),
            oov_log_prob: DEFAULT_OOV_LOG_PROB,
            dictionary: None,
        }
    }

    /// Attach a word dictionary for the decoder to gate prefix extension on.
    pub fn with_dictionary(mut self, fst: DictionaryFst) -> Self {
        self.dictionary = Some(fst);
        self
    }

    pub fn with_oov_log_prob(mut self, log_prob: f64) -> Self {
        self.oov_log_prob = log_prob;
        self
    }

    /// Record `log P(last token | preceding tokens)` for a token sequence.
    pub fn insert_gram<I, S>(&mut self, tokens: I, log_prob: f64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key: Vec<String> = tokens.into_iter().map(Into::into).collect();
        self.grams.insert(key, log_prob);
    }

    fn token(&self, label: usize) -> &str {
        self.vocabulary.get(label).map(String::as_str).unwrap_or("")
    }
}

impl Scorer for NgramScorer {
    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn beta(&self) -> f64 {
        self.beta
    }

    fn is_character_based(&self) -> bool {
        self.character_based
    }

    fn make_ngram(&self, labels: &[usize]) -> Vec<String> {
        let tokens: Vec<String> = if self.character_based {
            labels.iter().map(|&l| self.token(l).to_string()).collect()
        } else {
            self.split_labels(labels)
        };

        let take = tokens.len().min(self.order);
        let mut ngram = Vec::with_capacity(self.order);
        for _ in 0..self.order - take {
            ngram.push(START_TOKEN.to_string());
        }
        ngram.extend_from_slice(&tokens[tokens.len() - take..]);
        ngram
    }

    fn get_log_cond_prob(&self, ngram: &[String]) -> f64 {
        let mut start = 0;
        while start < ngram.len() {
            if let Some(&p) = self.grams.get(&ngram[start..]) {
                return p;
            }
            start += 1;
        }
        self.oov_log_prob
    }

    fn get_sent_log_prob(&self, words: &[String]) -> f64 {
        let mut sentence = Vec::with_capacity(words.len() + 2);
        sentence.push(START_TOKEN.to_string());
        sentence.extend_from_slice(words);
        sentence.push(END_TOKEN.to_string());

        let mut total = 0.0;
        for i in 1..sentence.len() {
            let lo = i.saturating_sub(self.order - 1);
            total += self.get_log_cond_prob(&sentence[lo..=i]);
        }
        total
    }

    fn split_labels(&self, labels: &[usize]) -> Vec<String> {
        if self.character_based {
            return labels.iter().map(|&l| self.token(l).to_string()).collect();
        }
        let mut words = Vec::new();
        let mut current = String::new();
        for &l in labels {
            if Some(l) == self.space_id {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            } else {
                current.push_str(self.token(l));
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    fn dictionary(&self) -> Option<&DictionaryFst> {
        self.dictionary.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vec<String> {
        ["'", " ", "a", "b", "c", "_"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_char_make_ngram_takes_tail() {
        let scorer = NgramScorer::new(2, 1.0, 0.0, true, vocab());
        assert_eq!(scorer.make_ngram(&[2, 3, 4]), vec!["b", "c"]);
    }

    #[test]
    fn test_char_make_ngram_pads_short_prefix() {
        let scorer = NgramScorer::new(3, 1.0, 0.0, true, vocab());
        assert_eq!(scorer.make_ngram(&[2]), vec![START_TOKEN, START_TOKEN, "a"]);
    }

    #[test]
    fn test_word_make_ngram_splits_on_space() {
        let scorer = NgramScorer::new(2, 1.0, 0.0, false, vocab());
        // "ab cb" -> words ["ab", "cb"]
        assert_eq!(scorer.make_ngram(&[2, 3, 1, 4, 3]), vec!["ab", "cb"]);
    }

    #[test]
    fn test_split_labels_word_mode() {
        let scorer = NgramScorer::new(2, 1.0, 0.0, false, vocab());
        assert_eq!(scorer.split_labels(&[2, 3, 1, 4]), vec!["ab", "c"]);
        assert_eq!(scorer.split_labels(&[1, 2, 1]), vec!["a"]);
        assert!(scorer.split_labels(&[]).is_empty());
    }

    #[test]
    fn test_cond_prob_backoff() {
        let mut scorer = NgramScorer::new(2, 1.0, 0.0, true, vocab());
        scorer.insert_gram(["a", "b"], -0.1);
        scorer.insert_gram(["b"], -0.7);
        scorer.insert_gram(["c"], -1.3);

        let ab: Vec<String> = vec!["a".into(), "b".into()];
        assert_eq!(scorer.get_log_cond_prob(&ab), -0.1);
        // No ("c", "b") bigram: back off to the "b" unigram
        let cb: Vec<String> = vec!["c".into(), "b".into()];
        assert_eq!(scorer.get_log_cond_prob(&cb), -0.7);
        // Unknown everywhere: OOV floor
        let unk: Vec<String> = vec!["'".into()];
        assert_eq!(scorer.get_log_cond_prob(&unk), DEFAULT_OOV_LOG_PROB);
    }

    #[test]
    fn test_sent_log_prob_sums_conditionals() {
        let mut scorer = NgramScorer::new(2, 1.0, 0.0, false, vocab());
        scorer.insert_gram([START_TOKEN, "ab"], -0.2);
        scorer.insert_gram(["ab", "c"], -0.3);
        scorer.insert_gram(["c", END_TOKEN], -0.4);

        let words: Vec<String> = vec!["ab".into(), "c".into()];
        let total = scorer.get_sent_log_prob(&words);
        assert!((total - (-0.9)).abs() < 1e-12);
    }

    #[test]
    fn test_unigram_sent_log_prob() {
        let mut scorer = NgramScorer::new(1, 1.0, 0.0, true, vocab());
        scorer.insert_gram(["a"], -0.5);
        scorer.insert_gram([END_TOKEN], -0.25);

        let words: Vec<String> = vec!["a".into()];
        assert!((scorer.get_sent_log_prob(&words) - (-0.75)).abs() < 1e-12);
    }
}
