//! Sequence reconstruction by walking forward links from the chain head.

use log::{debug, info};

use crate::error::AssemblyError;
use crate::fragment::{FragmentId, FragmentSet};

/// The assembled sequence and the fragments it was stitched from, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub sequence: String,
    pub path: Vec<FragmentId>,
}

impl Assembly {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// First fragment, in input order, with no predecessor.
pub fn find_head(fragments: &FragmentSet) -> Result<FragmentId, AssemblyError> {
    fragments
        .iter()
        .find(|(_, fragment)| fragment.backward_link().is_none())
        .map(|(id, _)| id)
        .ok_or(AssemblyError::NoHeader)
}

/// Stitch fragments together along their forward links.
///
/// Each fragment after the head contributes only the symbols past the
/// overlap recorded in its own backward link. The walk stops at the first
/// fragment without a successor, so a broken chain yields a partial result;
/// use [`crate::diagnostics::validate_chain`] to reject those up front.
pub fn assemble(fragments: &FragmentSet) -> Result<Assembly, AssemblyError> {
    let head = find_head(fragments)?;
    debug!("Chain head: {}", fragments.name(head));

    let mut sequence = fragments[head].sequence().to_string();
    let mut path = vec![head];
    let mut visited = vec![false; fragments.len()];
    visited[head] = true;

    let mut current = head;
    while let Some(link) = fragments[current].forward_link() {
        let next = link.target;
        if visited[next] {
            return Err(AssemblyError::Cycle {
                fragment: fragments.name(next).to_string(),
            });
        }
        visited[next] = true;

        let fragment = &fragments[next];
        let skip = fragment
            .backward_link()
            .map_or(link.overlap, |back| back.overlap)
            .min(fragment.len());
        sequence.push_str(&fragment.sequence()[skip..]);
        path.push(next);
        current = next;
    }

    if path.len() < fragments.len() {
        info!(
            "Chain ended at {} after {} of {} fragments",
            fragments.name(current),
            path.len(),
            fragments.len()
        );
    }

    Ok(Assembly { sequence, path })
}
