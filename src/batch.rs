//! Parallel decoding of independent utterances over a bounded worker pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::decoder::{decode, validate, DecodeError, DecodeOptions, Hypothesis};
use crate::scorer::Scorer;

/// Decode a batch of utterances with `num_processes` workers.
///
/// Results come back in input order regardless of which worker finished
/// first. Every precondition, including each utterance's shape, is checked
/// before any worker starts, so a failed batch does no decoding work at all.
/// The scorer, when present, is shared read-only across workers; each decode
/// takes its own arc-sorted copy of the dictionary.
pub fn decode_batch(
    batch: &[Vec<Vec<f64>>],
    vocabulary: &[String],
    opts: &DecodeOptions,
    num_processes: usize,
    scorer: Option<&dyn Scorer>,
) -> Result<Vec<Vec<Hypothesis>>, DecodeError> {
    if num_processes == 0 {
        return Err(DecodeError::InvalidWorkerCount);
    }
    for utterance in batch {
        validate(utterance, vocabulary, opts)?;
    }

    tracing::debug!(
        utterances = batch.len(),
        workers = num_processes.min(batch.len()),
        "decoding batch"
    );

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<Vec<Hypothesis>, DecodeError>)>();

    thread::scope(|scope| {
        for worker in 0..num_processes.min(batch.len()) {
            let tx = tx.clone();
            let next = &next;
            thread::Builder::new()
                .name(format!("ctc-decode-{worker}"))
                .spawn_scoped(scope, move || loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    if i >= batch.len() {
                        break;
                    }
                    let result = decode(&batch[i], vocabulary, opts, scorer);
                    if tx.send((i, result)).is_err() {
                        break;
                    }
                })
                .expect("failed to spawn decode worker");
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Vec<Hypothesis>>> = Vec::new();
    slots.resize_with(batch.len(), || None);
    for (i, result) in rx {
        slots[i] = Some(result?);
    }
    Ok(slots.into_iter().map(Option::unwrap_or_default).collect())
}
