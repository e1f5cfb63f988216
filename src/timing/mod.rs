//! Timing normalization — the heart of the pipeline.
//!
//! The backends hand over two structurally different trees; this module
//! converts either into the one canonical flat word-timing sequence.
//! Each shape keeps its own conversion with its own edge-case policy
//! ([`fragments`] trims and skips, [`words`] preserves text verbatim), so
//! the two never have to agree on anything beyond [`WordTiming`].

pub mod fragments;
pub mod words;

pub use fragments::flatten_fragments;
pub use words::flatten_words;

use crate::engine::TimingTree;
use serde::{Deserialize, Serialize};

/// One word of the canonical timing sequence: display text plus the
/// start/end second at which it is spoken.
///
/// `start <= end` and monotonically non-decreasing starts across a
/// sequence are expected but deliberately not enforced; upstream trees
/// are passed through as-is so that the sequence length stays a pure
/// function of the tree's structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Flatten a backend-native tree into the canonical sequence.
///
/// Total over structurally valid trees: an empty tree yields an empty
/// sequence, and a malformed unit drops only itself.
pub fn flatten(tree: &TimingTree) -> Vec<WordTiming> {
    match tree {
        TimingTree::Fragments(map) => flatten_fragments(map),
        TimingTree::Words(result) => flatten_words(result),
    }
}
