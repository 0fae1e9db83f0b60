use crate::fragment::Direction;

/// Errors raised while building or walking the fragment chain.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// Every fragment has a predecessor, so the walk has nowhere to start.
    #[error("No header found: every fragment has a backward link")]
    NoHeader,
    #[error("Multiple candidate heads: {}", .heads.join(", "))]
    MultipleHeads { heads: Vec<String> },
    #[error("Fragment {fragment} has {} qualifying {direction} partners: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousLink {
        fragment: String,
        direction: Direction,
        candidates: Vec<String>,
    },
    #[error("Link {from} -> {to} is not mirrored by a matching backward link")]
    InconsistentLink { from: String, to: String },
    #[error("Forward links revisit fragment {fragment}")]
    Cycle { fragment: String },
    #[error("Chain covers {visited} of {total} fragments")]
    IncompleteAssembly { visited: usize, total: usize },
    #[error("Duplicate fragment id: {0}")]
    DuplicateFragment(String),
    #[error("Fragment {0} contains non-ASCII symbols")]
    InvalidSequence(String),
}
