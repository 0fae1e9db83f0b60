//! Structural checks over the linked fragment set: head/tail uniqueness,
//! link symmetry, cycles and coverage.

use log::{debug, warn};
use serde::Serialize;

use crate::chain::Assembly;
use crate::error::AssemblyError;
use crate::fragment::{FragmentId, FragmentSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainAnalysis {
    pub heads: Vec<FragmentId>,
    pub tails: Vec<FragmentId>,
    /// Forward links `(from, to)` whose target does not link back to `from`
    /// with the same overlap.
    pub inconsistent: Vec<(FragmentId, FragmentId)>,
    pub cycles: Vec<Vec<FragmentId>>,
    /// Fragments not reached by walking forward from the first head.
    pub unreached: Vec<FragmentId>,
}

impl ChainAnalysis {
    pub fn is_linear(&self) -> bool {
        self.heads.len() == 1
            && self.tails.len() == 1
            && self.inconsistent.is_empty()
            && self.cycles.is_empty()
            && self.unreached.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Find every loop along forward links. Each fragment has at most one
/// successor, so a walk from each unvisited fragment either runs into a
/// finished one (no new cycle) or back onto its own trail. Components come
/// back sorted; a fragment linked to itself is a cycle of one.
pub fn detect_cycles(fragments: &FragmentSet) -> Vec<Vec<FragmentId>> {
    let mut marks = vec![Mark::Unvisited; fragments.len()];
    let mut trail: Vec<FragmentId> = Vec::new();
    let mut cycles = Vec::new();

    for start in 0..fragments.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        let mut current = Some(start);
        while let Some(id) = current {
            match marks[id] {
                Mark::Unvisited => {
                    marks[id] = Mark::InProgress;
                    trail.push(id);
                    current = fragments[id].forward_link().map(|link| link.target);
                }
                Mark::InProgress => {
                    // In-progress fragments all sit on the current trail.
                    if let Some(pos) = trail.iter().position(|&t| t == id) {
                        let mut component = trail[pos..].to_vec();
                        component.sort_unstable();
                        cycles.push(component);
                    }
                    break;
                }
                Mark::Done => break,
            }
        }
        for id in trail.drain(..) {
            marks[id] = Mark::Done;
        }
    }
    cycles
}

fn reachable_from(fragments: &FragmentSet, head: FragmentId) -> Vec<bool> {
    let mut visited = vec![false; fragments.len()];
    let mut current = Some(head);
    while let Some(id) = current {
        if visited[id] {
            break;
        }
        visited[id] = true;
        current = fragments[id].forward_link().map(|link| link.target);
    }
    visited
}

/// Collect every structural property the assembler relies on.
pub fn analyse_chain(fragments: &FragmentSet) -> ChainAnalysis {
    let mut analysis = ChainAnalysis::default();

    for (id, fragment) in fragments.iter() {
        if fragment.backward_link().is_none() {
            analysis.heads.push(id);
        }
        match fragment.forward_link() {
            None => analysis.tails.push(id),
            Some(link) => {
                let mirrored = fragments[link.target]
                    .backward_link()
                    .is_some_and(|back| back.target == id && back.overlap == link.overlap);
                if !mirrored {
                    analysis.inconsistent.push((id, link.target));
                }
            }
        }
    }

    analysis.cycles = detect_cycles(fragments);

    if let Some(&head) = analysis.heads.first() {
        let visited = reachable_from(fragments, head);
        analysis.unreached = (0..fragments.len()).filter(|&id| !visited[id]).collect();
    }

    debug!(
        "Chain analysis: {} heads, {} tails, {} inconsistent links, {} cycles, {} unreached",
        analysis.heads.len(),
        analysis.tails.len(),
        analysis.inconsistent.len(),
        analysis.cycles.len(),
        analysis.unreached.len()
    );
    analysis
}

/// Confirm the links form exactly one linear chain covering every fragment.
pub fn validate_chain(fragments: &FragmentSet) -> Result<ChainAnalysis, AssemblyError> {
    let analysis = analyse_chain(fragments);

    if analysis.heads.is_empty() {
        return Err(AssemblyError::NoHeader);
    }
    if analysis.heads.len() > 1 {
        return Err(AssemblyError::MultipleHeads {
            heads: fragments.names(&analysis.heads),
        });
    }
    if let Some(&(from, to)) = analysis.inconsistent.first() {
        return Err(AssemblyError::InconsistentLink {
            from: fragments.name(from).to_string(),
            to: fragments.name(to).to_string(),
        });
    }
    if let Some(cycle) = analysis.cycles.first() {
        return Err(AssemblyError::Cycle {
            fragment: fragments.name(cycle[0]).to_string(),
        });
    }
    if !analysis.unreached.is_empty() {
        return Err(AssemblyError::IncompleteAssembly {
            visited: fragments.len() - analysis.unreached.len(),
            total: fragments.len(),
        });
    }
    Ok(analysis)
}

/// Fragments whose sequence does not occur anywhere in the assembly.
pub fn missing_fragments(assembly: &Assembly, fragments: &FragmentSet) -> Vec<FragmentId> {
    let missing: Vec<FragmentId> = fragments
        .iter()
        .filter(|(_, fragment)| !assembly.sequence.contains(fragment.sequence()))
        .map(|(id, _)| id)
        .collect();
    if !missing.is_empty() {
        warn!(
            "{} fragments are not contained in the assembled sequence",
            missing.len()
        );
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::assemble;
    use crate::overlap::{build_links, LinkPolicy, OverlapConfig};

    fn chain_of_three() -> FragmentSet {
        let mut set =
            FragmentSet::from_records([("a", "ACGTACGG"), ("b", "TACGGTTC"), ("c", "GGTTCCAA")])
                .unwrap();
        build_links(&mut set, &OverlapConfig::default());
        set
    }

    #[test]
    fn accepts_linear_chain() {
        let set = chain_of_three();
        let analysis = validate_chain(&set).unwrap();
        assert!(analysis.is_linear());
        assert_eq!(analysis.heads, vec![0]);
        assert_eq!(analysis.tails, vec![2]);
    }

    #[test]
    fn reports_multiple_heads() {
        let mut set = FragmentSet::from_records([("x", "TTACGTAC"), ("y1", "ACGTACGG"), ("y2", "CGTACTTT")])
            .unwrap();
        build_links(&mut set, &OverlapConfig::default());
        let err = validate_chain(&set).unwrap_err();
        assert_eq!(
            err,
            AssemblyError::MultipleHeads {
                heads: vec!["x".to_string(), "y2".to_string()]
            }
        );
    }

    #[test]
    fn reports_one_sided_links_from_last_wins() {
        let mut set = FragmentSet::from_records([("x", "TTACGTAC"), ("y1", "ACGTACGG"), ("y2", "CGTACTTT")])
            .unwrap();
        let config = OverlapConfig {
            link_policy: LinkPolicy::LastWins,
            ..Default::default()
        };
        build_links(&mut set, &config);
        let analysis = analyse_chain(&set);
        assert_eq!(analysis.heads, vec![0]);
        assert_eq!(analysis.unreached, vec![1]);
        assert!(analysis.inconsistent.is_empty());
        assert_eq!(
            validate_chain(&set).unwrap_err(),
            AssemblyError::IncompleteAssembly {
                visited: 2,
                total: 3
            }
        );
    }

    #[test]
    fn detects_inconsistent_overlap() {
        let mut set = FragmentSet::from_records([("a", "AAAA"), ("b", "CCCC"), ("c", "GGGG")]).unwrap();
        set.set_link(0, 1, 3);
        set.set_link(2, 1, 2);
        let analysis = analyse_chain(&set);
        assert_eq!(analysis.inconsistent, vec![(0, 1)]);
        assert_eq!(
            validate_chain(&set).unwrap_err(),
            AssemblyError::MultipleHeads {
                heads: vec!["a".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn detects_forward_cycles() {
        let mut set = FragmentSet::from_records([("h", "AAAA"), ("a", "CCCC"), ("b", "GGGG")]).unwrap();
        set.set_link(1, 2, 1);
        set.set_link(2, 1, 1);
        assert_eq!(detect_cycles(&set), vec![vec![1, 2]]);

        let analysis = analyse_chain(&set);
        assert_eq!(analysis.heads, vec![0]);
        assert_eq!(analysis.unreached, vec![1, 2]);
        assert_eq!(
            validate_chain(&set).unwrap_err(),
            AssemblyError::Cycle {
                fragment: "a".to_string()
            }
        );
    }

    #[test]
    fn self_link_counts_as_cycle() {
        let mut set = FragmentSet::from_records([("a", "AAAA")]).unwrap();
        set.set_link(0, 0, 2);
        assert_eq!(detect_cycles(&set), vec![vec![0]]);
    }

    #[test]
    fn validates_long_chain_without_deep_recursion() {
        let n = 100_000;
        let mut set =
            FragmentSet::from_records((0..n).map(|i| (format!("f{i}"), "ACGT".to_string()))).unwrap();
        for i in 0..n - 1 {
            set.set_link(i, i + 1, 1);
        }
        let analysis = validate_chain(&set).unwrap();
        assert_eq!(analysis.heads, vec![0]);
        assert_eq!(analysis.tails, vec![n - 1]);
        assert!(detect_cycles(&set).is_empty());
    }

    #[test]
    fn finds_loop_entered_from_the_head() {
        // h -> a -> b -> c -> a; the walk starting at c closes the loop first.
        let mut set = FragmentSet::from_records([
            ("c", "TTTT"),
            ("h", "AAAA"),
            ("a", "CCCC"),
            ("b", "GGGG"),
        ])
        .unwrap();
        set.set_link(1, 2, 1);
        set.set_link(2, 3, 1);
        set.set_link(3, 0, 1);
        set.set_link(0, 2, 1);
        assert_eq!(detect_cycles(&set), vec![vec![0, 2, 3]]);
    }

    #[test]
    fn no_head_is_reported_first() {
        let mut set = FragmentSet::from_records([("x", "ACACAC"), ("y", "CACACA")]).unwrap();
        build_links(&mut set, &OverlapConfig::default());
        assert_eq!(validate_chain(&set).unwrap_err(), AssemblyError::NoHeader);
    }

    #[test]
    fn every_fragment_is_contained_in_assembly() {
        let set = chain_of_three();
        let assembly = assemble(&set).unwrap();
        assert!(missing_fragments(&assembly, &set).is_empty());

        let partial = Assembly {
            sequence: "ACGTACGGTTC".to_string(),
            path: vec![0, 1],
        };
        assert_eq!(missing_fragments(&partial, &set), vec![2]);
    }
}
