//! fragment_assembler
//!
//! Reconstructs one linear sequence from overlapping fragments. Fragment
//! order is inferred purely from suffix-prefix overlaps: an all-pairs KMP
//! overlap search builds forward/backward links, and the chain is then
//! walked from its unique head.

pub mod chain;
pub mod diagnostics;
pub mod error;
pub mod fragment;
pub mod overlap;
pub mod read_source;

pub use chain::{assemble, find_head, Assembly};
pub use diagnostics::{analyse_chain, detect_cycles, missing_fragments, validate_chain, ChainAnalysis};
pub use error::AssemblyError;
pub use fragment::{Direction, Fragment, FragmentId, FragmentSet, Link};
pub use overlap::{
    build_links, failure_table, overlap_candidates, overlap_length, overlap_threshold, Ambiguity,
    LinkPolicy, LinkReport, OverlapCandidate, OverlapConfig, ThresholdMode,
};
pub use read_source::{load_fragments, open_reader, read_fragments, write_fasta, ReadSourceError};
