//! Suffix-prefix overlap detection and overlap graph construction.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::error::AssemblyError;
use crate::fragment::{Direction, FragmentId, FragmentSet};

/// How competing candidates for the same fragment side are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPolicy {
    /// Apply every qualifying pair in scan order; later pairs overwrite
    /// earlier ones, so links may end up one-sided.
    LastWins,
    /// Keep the longest qualifying overlap per direction. Ties go to the
    /// lexicographically smaller source id, then target id.
    #[default]
    LongestOverlap,
}

/// Comparison applied between an overlap and the pair's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMode {
    /// Overlap must exceed the threshold.
    #[default]
    Strict,
    /// Overlap may equal the threshold, but an empty overlap never links.
    Inclusive,
}

impl ThresholdMode {
    #[inline]
    pub fn accepts(self, overlap: usize, threshold: usize) -> bool {
        match self {
            Self::Strict => overlap > threshold,
            Self::Inclusive => overlap > 0 && overlap >= threshold,
        }
    }
}

/// Configuration options that govern overlap graph construction.
#[derive(Debug, Clone, Copy)]
pub struct OverlapConfig {
    pub link_policy: LinkPolicy,
    pub threshold_mode: ThresholdMode,
    /// Compute pairwise overlaps on a thread pool (requires the `parallel` feature).
    pub use_threads: bool,
    /// Desired worker count when threading is enabled.
    pub max_workers: usize,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            link_policy: LinkPolicy::default(),
            threshold_mode: ThresholdMode::default(),
            use_threads: false,
            max_workers: 1,
        }
    }
}

/// KMP failure table for `pattern`: entry `i` is the length of the longest
/// proper prefix of `pattern[..i]` that is also its suffix, with entry 0
/// fixed at -1.
pub fn failure_table(pattern: &[u8]) -> Vec<isize> {
    let mut table = vec![0isize; pattern.len()];
    if pattern.is_empty() {
        return table;
    }
    table[0] = -1;
    if pattern.len() == 1 {
        return table;
    }

    let mut cnd = 0usize;
    let mut pos = 2;
    while pos < pattern.len() {
        if pattern[pos - 1] == pattern[cnd] {
            cnd += 1;
            table[pos] = cnd as isize;
            pos += 1;
        } else if cnd > 0 {
            cnd = table[cnd] as usize;
        } else {
            table[pos] = 0;
            pos += 1;
        }
    }
    table
}

/// Length of the longest suffix of `a` that is also a prefix of `b`.
///
/// Runs KMP with `b` as the pattern over the tail of `a`. The scan stops once
/// the window runs off the end of `a`; whatever has been matched at that
/// point is a prefix of `b` ending exactly at the end of `a`, which is the
/// overlap. Linear in `a.len() + b.len()`.
pub fn overlap_length(a: &[u8], b: &[u8]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // An overlap can never be longer than `b`.
    let a = if a.len() > b.len() {
        &a[a.len() - b.len()..]
    } else {
        a
    };
    let table = failure_table(b);

    let mut m = 0usize;
    let mut i = 0usize;
    // `m + i < a.len() <= b.len()` keeps `i` in bounds of `b`.
    while m + i < a.len() {
        if b[i] == a[m + i] {
            i += 1;
        } else {
            m += (i as isize - table[i]) as usize;
            if i > 0 {
                i = table[i] as usize;
            }
        }
    }
    i
}

/// Minimum overlap (exclusive under [`ThresholdMode::Strict`]) for two
/// fragments to be linked: half of the longer one, rounded up.
#[inline]
pub fn overlap_threshold(a_len: usize, b_len: usize) -> usize {
    a_len.div_ceil(2).max(b_len.div_ceil(2))
}

/// A qualifying `source -> target` pair: a suffix of `source` matches a
/// prefix of `target` by `overlap` symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapCandidate {
    pub source: FragmentId,
    pub target: FragmentId,
    pub overlap: usize,
}

/// A fragment side that qualified for more than one partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub fragment: FragmentId,
    pub direction: Direction,
    pub candidates: Vec<FragmentId>,
}

/// Summary of one [`build_links`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub pairs_compared: usize,
    pub candidates: usize,
    /// Link assignments performed, overwrites included.
    pub accepted: usize,
    pub ambiguities: Vec<Ambiguity>,
}

impl LinkReport {
    /// Fail on the first fragment that had competing partners.
    pub fn ensure_unambiguous(&self, fragments: &FragmentSet) -> Result<(), AssemblyError> {
        match self.ambiguities.first() {
            Some(ambiguity) => Err(AssemblyError::AmbiguousLink {
                fragment: fragments.name(ambiguity.fragment).to_string(),
                direction: ambiguity.direction,
                candidates: fragments.names(&ambiguity.candidates),
            }),
            None => Ok(()),
        }
    }
}

fn candidates_from(
    fragments: &FragmentSet,
    source: FragmentId,
    mode: ThresholdMode,
) -> Vec<OverlapCandidate> {
    let suffix_fragment = &fragments[source];
    fragments
        .iter()
        .filter(|&(target, _)| target != source)
        .filter_map(|(target, prefix_fragment)| {
            let overlap = overlap_length(
                suffix_fragment.sequence().as_bytes(),
                prefix_fragment.sequence().as_bytes(),
            );
            let threshold = overlap_threshold(suffix_fragment.len(), prefix_fragment.len());
            mode.accepts(overlap, threshold).then_some(OverlapCandidate {
                source,
                target,
                overlap,
            })
        })
        .collect()
}

#[cfg(feature = "parallel")]
fn collect_per_source(fragments: &FragmentSet, config: &OverlapConfig) -> Vec<Vec<OverlapCandidate>> {
    use rayon::prelude::*;

    let mode = config.threshold_mode;
    let sequential = || -> Vec<Vec<OverlapCandidate>> {
        (0..fragments.len())
            .map(|source| candidates_from(fragments, source, mode))
            .collect()
    };
    if !config.use_threads {
        return sequential();
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_workers.max(1))
        .build()
    {
        // Indexed collect keeps sources in input order.
        Ok(pool) => pool.install(|| {
            (0..fragments.len())
                .into_par_iter()
                .map(|source| candidates_from(fragments, source, mode))
                .collect()
        }),
        Err(error) => {
            warn!("Failed to build thread pool ({error}); falling back to sequential mode");
            sequential()
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn collect_per_source(fragments: &FragmentSet, config: &OverlapConfig) -> Vec<Vec<OverlapCandidate>> {
    if config.use_threads {
        warn!(
            "Threaded overlap search requested, but the 'parallel' feature is not enabled; falling back to sequential mode"
        );
    }
    (0..fragments.len())
        .map(|source| candidates_from(fragments, source, config.threshold_mode))
        .collect()
}

/// Every ordered pair passing the threshold, sources in input order and
/// targets in input order within each source.
pub fn overlap_candidates(fragments: &FragmentSet, config: &OverlapConfig) -> Vec<OverlapCandidate> {
    collect_per_source(fragments, config)
        .into_iter()
        .flatten()
        .collect()
}

fn find_ambiguities(candidates: &[OverlapCandidate]) -> Vec<Ambiguity> {
    let mut successors: BTreeMap<FragmentId, Vec<FragmentId>> = BTreeMap::new();
    let mut predecessors: BTreeMap<FragmentId, Vec<FragmentId>> = BTreeMap::new();
    for candidate in candidates {
        successors
            .entry(candidate.source)
            .or_default()
            .push(candidate.target);
        predecessors
            .entry(candidate.target)
            .or_default()
            .push(candidate.source);
    }

    let tag = |direction: Direction| {
        move |(fragment, candidates): (FragmentId, Vec<FragmentId>)| Ambiguity {
            fragment,
            direction,
            candidates,
        }
    };
    let forward = successors
        .into_iter()
        .filter(|(_, partners)| partners.len() > 1)
        .map(tag(Direction::Forward));
    let backward = predecessors
        .into_iter()
        .filter(|(_, partners)| partners.len() > 1)
        .map(tag(Direction::Backward));
    forward.chain(backward).collect()
}

fn apply_last_wins(fragments: &mut FragmentSet, candidates: &[OverlapCandidate]) -> usize {
    for candidate in candidates {
        if let Some(previous) = fragments[candidate.source].forward_link() {
            debug!(
                "{} -> {} overwrites {} -> {}",
                fragments.name(candidate.source),
                fragments.name(candidate.target),
                fragments.name(candidate.source),
                fragments.name(previous.target)
            );
        }
        fragments.set_link(candidate.source, candidate.target, candidate.overlap);
    }
    candidates.len()
}

fn apply_longest_overlap(fragments: &mut FragmentSet, candidates: &[OverlapCandidate]) -> usize {
    let mut ordered = candidates.to_vec();
    ordered.sort_by(|a, b| {
        b.overlap
            .cmp(&a.overlap)
            .then_with(|| fragments.name(a.source).cmp(fragments.name(b.source)))
            .then_with(|| fragments.name(a.target).cmp(fragments.name(b.target)))
    });

    let mut accepted = 0;
    for candidate in ordered {
        let source_taken = fragments[candidate.source].forward_link().is_some();
        let target_taken = fragments[candidate.target].backward_link().is_some();
        if source_taken || target_taken {
            debug!(
                "Skipping {} -> {} (overlap {}): that side is already linked",
                fragments.name(candidate.source),
                fragments.name(candidate.target),
                candidate.overlap
            );
            continue;
        }
        fragments.set_link(candidate.source, candidate.target, candidate.overlap);
        accepted += 1;
    }
    accepted
}

/// Compare every ordered pair of fragments and record chain links.
///
/// Existing links are cleared first, so rebuilding an unchanged set
/// reproduces the same assignment.
pub fn build_links(fragments: &mut FragmentSet, config: &OverlapConfig) -> LinkReport {
    fragments.clear_links();
    let n = fragments.len();
    let pairs_compared = n * n.saturating_sub(1);

    info!("Comparing {} ordered fragment pairs...", pairs_compared);
    let candidates = overlap_candidates(fragments, config);
    info!("Found {} pairs above the overlap threshold", candidates.len());

    let ambiguities = find_ambiguities(&candidates);
    if !ambiguities.is_empty() {
        warn!(
            "{} fragment sides have more than one qualifying partner",
            ambiguities.len()
        );
    }

    let accepted = match config.link_policy {
        LinkPolicy::LastWins => apply_last_wins(fragments, &candidates),
        LinkPolicy::LongestOverlap => apply_longest_overlap(fragments, &candidates),
    };
    info!("Assigned {} links ({:?})", accepted, config.link_policy);

    LinkReport {
        pairs_compared,
        candidates: candidates.len(),
        accepted,
        ambiguities,
    }
}
