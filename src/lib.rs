pub mod batch;
pub mod decoder;
pub mod fst;
pub mod scorer;
pub mod trace_init;

pub use batch::decode_batch;
pub use decoder::{decode, DecodeError, DecodeOptions, Hypothesis};
pub use fst::{DictionaryFst, FstArc, FstError};
pub use scorer::{NgramScorer, Scorer};
