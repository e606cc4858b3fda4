/// Select the symbols worth expanding for one probability frame.
///
/// Returns `(symbol, log_prob)` pairs in descending probability order, ties
/// broken by lower symbol index. At most `cutoff_top_n` symbols survive; when
/// `cutoff_prob < 1.0` the list is further truncated once the cumulative
/// linear mass reaches `cutoff_prob`.
///
/// `log_input` selects whether `frame` holds log-probabilities or raw
/// probabilities; raw values are mapped through `ln` on the way out.
pub fn prune(
    frame: &[f64],
    cutoff_prob: f64,
    cutoff_top_n: usize,
    log_input: bool,
) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = frame.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut keep = indexed.len().min(cutoff_top_n);
    if cutoff_prob < 1.0 {
        let mut cum_prob = 0.0;
        for (n, &(_, p)) in indexed.iter().take(keep).enumerate() {
            cum_prob += if log_input { p.exp() } else { p };
            if cum_prob >= cutoff_prob {
                keep = n + 1;
                break;
            }
        }
    }
    indexed.truncate(keep);

    if !log_input {
        for (_, p) in &mut indexed {
            *p = p.ln();
        }
    }
    indexed
}
