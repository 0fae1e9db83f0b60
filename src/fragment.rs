//! Fragment arena: named sequences addressed by input position, plus the
//! forward/backward links written by the overlap graph builder.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use serde::Serialize;

use crate::error::AssemblyError;

/// Position of a fragment in its [`FragmentSet`] (input order).
pub type FragmentId = usize;

/// Which side of a fragment a link attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The fragment that follows in the chain.
    Forward,
    /// The fragment that precedes in the chain.
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// A junction to a neighbouring fragment and the number of shared symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    pub target: FragmentId,
    pub overlap: usize,
}

#[derive(Debug, Clone)]
pub struct Fragment {
    name: String,
    sequence: String,
    forward: Option<Link>,
    backward: Option<Link>,
}

impl Fragment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn forward_link(&self) -> Option<Link> {
        self.forward
    }

    pub fn backward_link(&self) -> Option<Link> {
        self.backward
    }

    pub fn link(&self, direction: Direction) -> Option<Link> {
        match direction {
            Direction::Forward => self.forward,
            Direction::Backward => self.backward,
        }
    }
}

/// Owns every fragment of a run. Ids are assigned in insertion order and
/// never change; only link fields are mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct FragmentSet {
    fragments: Vec<Fragment>,
    by_name: HashMap<String, FragmentId>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(name, sequence)` pairs, in order.
    pub fn from_records<I, N, S>(records: I) -> Result<Self, AssemblyError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (name, sequence) in records {
            set.push(name, sequence)?;
        }
        Ok(set)
    }

    /// Append a fragment. Names must be unique and sequences ASCII, since the
    /// assembler slices sequences by byte offset.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        sequence: impl Into<String>,
    ) -> Result<FragmentId, AssemblyError> {
        let name = name.into();
        let sequence = sequence.into();
        if self.by_name.contains_key(&name) {
            return Err(AssemblyError::DuplicateFragment(name));
        }
        if !sequence.is_ascii() {
            return Err(AssemblyError::InvalidSequence(name));
        }
        let id = self.fragments.len();
        self.by_name.insert(name.clone(), id);
        self.fragments.push(Fragment {
            name,
            sequence,
            forward: None,
            backward: None,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    pub fn id_of(&self, name: &str) -> Option<FragmentId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Fragment> {
        self.id_of(name).map(|id| &self.fragments[id])
    }

    pub fn iter(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> + '_ {
        self.fragments.iter().enumerate()
    }

    pub fn name(&self, id: FragmentId) -> &str {
        self.fragments[id].name()
    }

    /// Resolve ids to names, preserving order.
    pub fn names(&self, ids: &[FragmentId]) -> Vec<String> {
        ids.iter().map(|&id| self.name(id).to_string()).collect()
    }

    /// Record `from -> to` on both endpoints.
    pub(crate) fn set_link(&mut self, from: FragmentId, to: FragmentId, overlap: usize) {
        self.fragments[from].forward = Some(Link {
            target: to,
            overlap,
        });
        self.fragments[to].backward = Some(Link {
            target: from,
            overlap,
        });
    }

    pub(crate) fn clear_links(&mut self) {
        for fragment in &mut self.fragments {
            fragment.forward = None;
            fragment.backward = None;
        }
    }
}

impl Index<FragmentId> for FragmentSet {
    type Output = Fragment;

    fn index(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id]
    }
}
