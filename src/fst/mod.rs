//! Dictionary automaton constraining which symbol sequences form words.
//!
//! A small acceptor over vocabulary symbol indices: states, input-labeled
//! arcs, and final flags marking complete words. The decoder attaches an
//! arc-sorted copy to its prefix tree and queries [`DictionaryFst::find`]
//! to decide whether a prefix may be extended by a symbol.

use std::fs::{self, File};
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

const MAGIC: &[u8; 4] = b"CFST";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 4; // magic + version + payload_len = 9

pub type StateId = usize;

/// One transition: consume `ilabel`, move to `nextstate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FstArc {
    pub ilabel: usize,
    pub nextstate: StateId,
}

#[derive(Debug, thiserror::Error)]
pub enum FstError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid header")]
    InvalidHeader,
    #[error("invalid magic")]
    InvalidMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("failed to serialize FST: {0}")]
    Serialize(#[source] bincode::Error),
    #[error("failed to deserialize FST: {0}")]
    Deserialize(#[source] bincode::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryFst {
    start: StateId,
    arcs: Vec<Vec<FstArc>>,
    finals: Vec<bool>,
}

impl DictionaryFst {
    /// Create an automaton holding only its start state.
    pub fn new() -> Self {
        Self {
            start: 0,
            arcs: vec![Vec::new()],
            finals: vec![false],
        }
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn num_states(&self) -> usize {
        self.arcs.len()
    }

    pub fn add_state(&mut self) -> StateId {
        self.arcs.push(Vec::new());
        self.finals.push(false);
        self.arcs.len() - 1
    }

    pub fn add_arc(&mut self, state: StateId, arc: FstArc) {
        self.arcs[state].push(arc);
    }

    /// Mark `state` as the end of a complete word.
    pub fn set_final(&mut self, state: StateId) {
        self.finals[state] = true;
    }

    pub fn is_final(&self, state: StateId) -> bool {
        self.finals[state]
    }

    /// Sort every state's arcs by input label so [`find`](Self::find) can
    /// binary-search them.
    pub fn arc_sort_input(&mut self) {
        for arcs in &mut self.arcs {
            arcs.sort_by_key(|a| (a.ilabel, a.nextstate));
        }
    }

    /// Follow the arc on `ilabel` out of `state`, if one exists.
    ///
    /// Arcs must have been sorted with [`arc_sort_input`](Self::arc_sort_input).
    pub fn find(&self, state: StateId, ilabel: usize) -> Option<StateId> {
        let arcs = &self.arcs[state];
        arcs.binary_search_by_key(&ilabel, |a| a.ilabel)
            .ok()
            .map(|pos| arcs[pos].nextstate)
    }

    /// An arc-sorted copy, safe to attach to a single decode.
    pub fn sorted_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.arc_sort_input();
        copy
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FstError> {
        let payload = bincode::serialize(self).map_err(FstError::Serialize)?;
        let payload_len = payload.len() as u32;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, FstError> {
        if data.len() < 5 {
            return Err(FstError::InvalidHeader);
        }
        if &data[..4] != MAGIC {
            return Err(FstError::InvalidMagic);
        }
        if data[4] != VERSION {
            return Err(FstError::UnsupportedVersion(data[4]));
        }
        if data.len() < HEADER_SIZE {
            return Err(FstError::InvalidHeader);
        }

        let payload_len = u32::from_le_bytes(data[5..9].try_into().unwrap()) as usize;
        if data.len() < HEADER_SIZE + payload_len {
            return Err(FstError::InvalidHeader);
        }

        bincode::deserialize(&data[HEADER_SIZE..HEADER_SIZE + payload_len])
            .map_err(FstError::Deserialize)
    }

    /// Open an automaton file, using mmap to avoid doubling peak memory.
    pub fn open(path: &Path) -> Result<Self, FstError> {
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and the mapping is immutable.
        // The Mmap is dropped after deserialization completes below.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    pub fn save(&self, path: &Path) -> Result<(), FstError> {
        Ok(fs::write(path, self.to_bytes()?)?)
    }
}

impl Default for DictionaryFst {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a-b, a-c over labels a=0, b=1, c=2.
    fn sample_fst() -> DictionaryFst {
        let mut fst = DictionaryFst::new();
        let s_a = fst.add_state();
        let s_ab = fst.add_state();
        let s_ac = fst.add_state();
        fst.add_arc(fst.start(), FstArc { ilabel: 0, nextstate: s_a });
        // Insert out of label order to exercise arc_sort_input
        fst.add_arc(s_a, FstArc { ilabel: 2, nextstate: s_ac });
        fst.add_arc(s_a, FstArc { ilabel: 1, nextstate: s_ab });
        fst.set_final(s_ab);
        fst.set_final(s_ac);
        fst.arc_sort_input();
        fst
    }

    #[test]
    fn test_find_follows_arcs() {
        let fst = sample_fst();
        let s_a = fst.find(fst.start(), 0).unwrap();
        let s_ab = fst.find(s_a, 1).unwrap();
        assert!(fst.is_final(s_ab));
        assert!(fst.find(s_a, 0).is_none());
        assert!(fst.find(fst.start(), 1).is_none());
    }

    #[test]
    fn test_sorted_copy_is_searchable() {
        let mut fst = DictionaryFst::new();
        let s1 = fst.add_state();
        let s2 = fst.add_state();
        fst.add_arc(fst.start(), FstArc { ilabel: 5, nextstate: s1 });
        fst.add_arc(fst.start(), FstArc { ilabel: 2, nextstate: s2 });
        let sorted = fst.sorted_copy();
        assert_eq!(sorted.find(sorted.start(), 2), Some(s2));
        assert_eq!(sorted.find(sorted.start(), 5), Some(s1));
    }

    #[test]
    fn test_bytes_round_trip() {
        let fst = sample_fst();
        let bytes = fst.to_bytes().unwrap();
        let restored = DictionaryFst::from_bytes(&bytes).unwrap();
        assert_eq!(restored.num_states(), fst.num_states());
        let s_a = restored.find(restored.start(), 0).unwrap();
        assert_eq!(restored.find(s_a, 1), fst.find(s_a, 1));
    }

    #[test]
    fn test_from_bytes_rejects_bad_magic() {
        let mut bytes = sample_fst().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            DictionaryFst::from_bytes(&bytes),
            Err(FstError::InvalidMagic)
        ));
    }

    #[test]
    fn test_from_bytes_rejects_bad_version() {
        let mut bytes = sample_fst().to_bytes().unwrap();
        bytes[4] = 99;
        assert!(matches!(
            DictionaryFst::from_bytes(&bytes),
            Err(FstError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.fst");
        let fst = sample_fst();
        fst.save(&path).unwrap();
        let restored = DictionaryFst::open(&path).unwrap();
        assert_eq!(restored.num_states(), fst.num_states());
    }
}
