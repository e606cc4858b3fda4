pub mod logmath;
mod prune;
mod search;
mod testutil;
mod trie;

pub use search::{decode, DecodeError, DecodeOptions, Hypothesis};
pub(crate) use search::validate;
