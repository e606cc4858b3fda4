use serde::{Deserialize, Serialize};

use crate::scorer::Scorer;

use super::logmath::{log_sum_exp, NEG_INF};
use super::prune::prune;
use super::trie::{prefix_compare, NodeId, PathTrie, ROOT};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("probability row {time_step} has {got} entries but the vocabulary has {expected}")]
    ShapeMismatch {
        time_step: usize,
        got: usize,
        expected: usize,
    },
    #[error("blank_id {blank_id} is out of range for a vocabulary of {vocab_size} symbols")]
    BlankOutOfRange { blank_id: usize, vocab_size: usize },
    #[error("beam_size must be at least 1")]
    InvalidBeamSize,
    #[error("cutoff_top_n must be at least 1")]
    InvalidCutoffTopN,
    #[error("num_processes must be at least 1")]
    InvalidWorkerCount,
}

/// Search parameters for one decode.
///
/// `cutoff_prob = 1.0` disables mass-based symbol pruning; `cutoff_top_n`
/// caps how many symbols are expanded per frame regardless of mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeOptions {
    pub beam_size: usize,
    pub cutoff_prob: f64,
    pub cutoff_top_n: usize,
    pub blank_id: usize,
    /// Whether the probability matrix already holds log-probabilities.
    pub log_input: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            beam_size: 100,
            cutoff_prob: 1.0,
            cutoff_top_n: 40,
            blank_id: 0,
            log_input: false,
        }
    }
}

/// One ranked decoding result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Combined log-prob of the prefix, language-model contributions
    /// included. Results are ordered by this value, descending.
    pub score: f64,
    /// Acoustic-only estimate: `score` with the per-symbol bonus and the
    /// weighted sentence log-prob subtracted back out. Never affects order.
    pub approx_ctc: f64,
    /// Symbol indices of the hypothesis, CTC-collapsed.
    pub symbols: Vec<usize>,
    /// Timestep at which each symbol was first committed.
    pub timesteps: Vec<usize>,
}

pub(crate) fn validate(
    probs: &[Vec<f64>],
    vocabulary: &[String],
    opts: &DecodeOptions,
) -> Result<(), DecodeError> {
    let vocab_size = vocabulary.len();
    for (time_step, frame) in probs.iter().enumerate() {
        if frame.len() != vocab_size {
            return Err(DecodeError::ShapeMismatch {
                time_step,
                got: frame.len(),
                expected: vocab_size,
            });
        }
    }
    if opts.blank_id >= vocab_size {
        return Err(DecodeError::BlankOutOfRange {
            blank_id: opts.blank_id,
            vocab_size,
        });
    }
    if opts.beam_size == 0 {
        return Err(DecodeError::InvalidBeamSize);
    }
    if opts.cutoff_top_n == 0 {
        return Err(DecodeError::InvalidCutoffTopN);
    }
    Ok(())
}

/// Prefix beam search over one utterance.
///
/// `probs` is a `T x V` matrix of per-frame symbol probabilities (raw or log,
/// per `opts.log_input`). Returns at most `opts.beam_size` hypotheses, best
/// first. Decoding is a pure function of its inputs: identical inputs produce
/// bit-identical results.
pub fn decode(
    probs: &[Vec<f64>],
    vocabulary: &[String],
    opts: &DecodeOptions,
    scorer: Option<&dyn Scorer>,
) -> Result<Vec<Hypothesis>, DecodeError> {
    validate(probs, vocabulary, opts)?;

    let space_id = vocabulary.iter().position(|t| t == " ");

    let mut trie = PathTrie::new();
    if let Some(s) = scorer {
        if !s.is_character_based() {
            if let Some(dict) = s.dictionary() {
                trie.attach_dictionary(dict.sorted_copy(), space_id);
            }
        }
    }
    let mut prefixes: Vec<NodeId> = vec![ROOT];

    for (time_step, frame) in probs.iter().enumerate() {
        // With a scorer attached, candidates that cannot beat the worst beam
        // member even after the maximum per-boundary bonus are skipped.
        let mut min_cutoff = NEG_INF;
        let mut full_beam = false;
        if let Some(s) = scorer {
            prefixes.sort_by(|&x, &y| prefix_compare(trie.node(x), trie.node(y)));
            let blank_prob = if opts.log_input {
                frame[opts.blank_id]
            } else {
                frame[opts.blank_id].ln()
            };
            let worst = prefixes[prefixes.len().min(opts.beam_size) - 1];
            min_cutoff = trie.node(worst).score + blank_prob - s.beta().max(0.0);
            full_beam = prefixes.len() >= opts.beam_size;
        }

        let candidates = prune(frame, opts.cutoff_prob, opts.cutoff_top_n, opts.log_input);
        tracing::trace!(
            time_step,
            candidates = candidates.len(),
            beam = prefixes.len(),
            "expanding frame"
        );

        for &(c, log_prob_c) in &candidates {
            for i in 0..prefixes.len().min(opts.beam_size) {
                let prefix = prefixes[i];
                let prefix_score = trie.node(prefix).score;
                if full_beam && log_prob_c + prefix_score < min_cutoff {
                    break;
                }

                if c == opts.blank_id {
                    // Blank after anything leaves the prefix unchanged.
                    let node = trie.node_mut(prefix);
                    node.log_prob_b_cur =
                        log_sum_exp(node.log_prob_b_cur, log_prob_c + prefix_score);
                    continue;
                }

                let prefix_character = trie.node(prefix).character;
                if Some(c) == prefix_character {
                    // Adjacent repeat collapses onto the same prefix.
                    let node = trie.node_mut(prefix);
                    node.log_prob_nb_cur =
                        log_sum_exp(node.log_prob_nb_cur, log_prob_c + node.log_prob_nb_prev);
                }

                // Extension by a non-blank symbol, subject to the dictionary.
                let Some(next) = trie.extend(prefix, c, time_step) else {
                    continue;
                };

                let mut log_p = NEG_INF;
                if Some(c) == prefix_character {
                    // Same symbol again only yields a longer prefix when a
                    // blank separated the two emissions.
                    let b_prev = trie.node(prefix).log_prob_b_prev;
                    if b_prev > NEG_INF {
                        log_p = log_prob_c + b_prev;
                    }
                } else {
                    log_p = log_prob_c + prefix_score;
                }

                if let Some(s) = scorer {
                    if s.is_character_based() || Some(c) == space_id {
                        let target = if s.is_character_based() { next } else { prefix };
                        let (labels, _) = trie.path_to(target);
                        let ngram = s.make_ngram(&labels);
                        log_p += s.get_log_cond_prob(&ngram) * s.alpha();
                        log_p += s.beta();
                    }
                }

                let node = trie.node_mut(next);
                node.log_prob_nb_cur = log_sum_exp(node.log_prob_nb_cur, log_p);
            }
        }

        prefixes.clear();
        trie.refresh_into(&mut prefixes);

        if prefixes.len() > opts.beam_size {
            prefixes.select_nth_unstable_by(opts.beam_size, |&x, &y| {
                prefix_compare(trie.node(x), trie.node(y))
            });
            for &id in &prefixes[opts.beam_size..] {
                trie.remove(id);
            }
            prefixes.truncate(opts.beam_size);
        }
    }

    // A word-level model still owes the score of a trailing partial word.
    if let Some(s) = scorer {
        if !s.is_character_based() {
            for &id in prefixes.iter().take(opts.beam_size) {
                let node = trie.node(id);
                if !node.is_root() && node.character != space_id {
                    let (labels, _) = trie.path_to(id);
                    let ngram = s.make_ngram(&labels);
                    let bonus = s.get_log_cond_prob(&ngram) * s.alpha() + s.beta();
                    trie.node_mut(id).score += bonus;
                }
            }
        }
    }

    let num_prefixes = prefixes.len().min(opts.beam_size);
    prefixes[..num_prefixes].sort_by(|&x, &y| prefix_compare(trie.node(x), trie.node(y)));

    for &id in &prefixes[..num_prefixes] {
        let mut approx_ctc = trie.node(id).score;
        if let Some(s) = scorer {
            let (labels, _) = trie.path_to(id);
            let words = s.split_labels(&labels);
            approx_ctc -= labels.len() as f64 * s.beta();
            approx_ctc -= s.get_sent_log_prob(&words) * s.alpha();
        }
        trie.node_mut(id).approx_ctc = approx_ctc;
    }

    let results: Vec<Hypothesis> = prefixes[..num_prefixes]
        .iter()
        .map(|&id| {
            let (symbols, timesteps) = trie.path_to(id);
            let node = trie.node(id);
            Hypothesis {
                score: node.score,
                approx_ctc: node.approx_ctc,
                symbols,
                timesteps,
            }
        })
        .collect();

    tracing::debug!(
        time_steps = probs.len(),
        vocab_size = vocabulary.len(),
        results = results.len(),
        best_score = results.first().map(|h| h.score),
        "decode finished"
    );
    Ok(results)
}
