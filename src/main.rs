use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bio::alignment::distance::levenshtein;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use serde_json::json;

use fragment_assembler::{
    analyse_chain, assemble, build_links, load_fragments, missing_fragments, validate_chain,
    write_fasta, Assembly, AssemblyError, FragmentSet, LinkPolicy, OverlapConfig, ThresholdMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Keep the longest qualifying overlap per fragment side
    LongestOverlap,
    /// Apply qualifying pairs in input order, later ones overwriting earlier ones
    LastWins,
}

impl From<PolicyArg> for LinkPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LongestOverlap => LinkPolicy::LongestOverlap,
            PolicyArg::LastWins => LinkPolicy::LastWins,
        }
    }
}

/// Assemble one sequence from overlapping fragments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// FASTA-style fragment file (optionally gzip-compressed)
    input: PathBuf,

    /// Optional output FASTA path for the assembled sequence
    #[arg(long)]
    output_fasta: Option<PathBuf>,

    /// Wrap assembled FASTA lines to this width (0 = no-wrap)
    #[arg(long, default_value_t = 60)]
    fasta_line_width: usize,

    /// How competing overlap candidates are resolved
    #[arg(long, value_enum, default_value_t = PolicyArg::LongestOverlap)]
    policy: PolicyArg,

    /// Accept overlaps equal to the threshold instead of requiring them to exceed it
    #[arg(long)]
    inclusive_threshold: bool,

    /// Fail when any fragment has more than one qualifying partner
    #[arg(long)]
    strict: bool,

    /// Emit the assembly even if the links do not form a single chain
    #[arg(long)]
    allow_partial: bool,

    /// Compute pairwise overlaps on a thread pool
    #[arg(long, default_value_t = false)]
    threads: bool,

    /// Number of worker threads for overlap search (default: max available - 1)
    #[arg(long, default_value_t = num_cpus::get().saturating_sub(1).max(1))]
    max_workers: usize,

    /// Optional output file for the link graph (JSON nodes, edges and chain analysis)
    #[arg(long)]
    export_graph_json: Option<PathBuf>,

    /// Optional reference FASTA used for post-assembly confirmation
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Verbose/info output (default: quiet)
    #[arg(long, short = 'v', alias = "info")]
    verbose: bool,

    /// Debug output
    #[arg(long)]
    debug: bool,

    /// Trace output
    #[arg(long)]
    trace: bool,
}

impl Args {
    fn overlap_config(&self) -> OverlapConfig {
        OverlapConfig {
            link_policy: self.policy.into(),
            threshold_mode: if self.inclusive_threshold {
                ThresholdMode::Inclusive
            } else {
                ThresholdMode::Strict
            },
            use_threads: self.threads,
            max_workers: self.max_workers,
        }
    }

    fn log_level(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "error"
        }
    }
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    info!("input: {}", args.input.display());

    match run_pipeline(&args) {
        Ok(assembly) => {
            println!("{}", assembly.sequence);
            println!("length: {}", assembly.len());
        }
        Err(error) => {
            eprintln!("Assembly failed: {error:?}");
            std::process::exit(1);
        }
    }
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn export_graph(path: &Path, fragments: &FragmentSet) -> Result<()> {
    let nodes: Vec<_> = fragments
        .iter()
        .map(|(id, fragment)| json!({"id": id, "name": fragment.name(), "length": fragment.len()}))
        .collect();
    let edges: Vec<_> = fragments
        .iter()
        .filter_map(|(id, fragment)| {
            fragment.forward_link().map(|link| {
                json!({"source": id, "target": link.target, "overlap": link.overlap})
            })
        })
        .collect();
    let graph_json = json!({
        "nodes": nodes,
        "edges": edges,
        "analysis": analyse_chain(fragments),
    });
    let mut file = create_output(path)?;
    writeln!(file, "{}", serde_json::to_string_pretty(&graph_json)?)?;
    info!("Link graph written to {}", path.display());
    Ok(())
}

/// Structural problems that `--allow-partial` tolerates.
fn is_recoverable(error: &AssemblyError) -> bool {
    !matches!(error, AssemblyError::NoHeader | AssemblyError::Cycle { .. })
}

fn load_reference(path: &Path) -> Result<String> {
    if !path.exists() {
        bail!("Reference path {} does not exist", path.display());
    }
    let reference = load_fragments(path)
        .with_context(|| format!("Failed to parse reference {}", path.display()))?;
    Ok(reference.iter().map(|(_, record)| record.sequence()).collect())
}

fn compare_to_reference(assembled: &str, reference_seq: &str) {
    const MAX_DISTANCE_LEN: usize = 20_000;
    if assembled == reference_seq {
        info!(
            "Assembled sequence matches the reference exactly ({} bp).",
            assembled.len()
        );
    } else if assembled.len() <= MAX_DISTANCE_LEN && reference_seq.len() <= MAX_DISTANCE_LEN {
        let distance = levenshtein(assembled.as_bytes(), reference_seq.as_bytes());
        info!(
            "Edit distance to reference (len {} vs {}): {}",
            assembled.len(),
            reference_seq.len(),
            distance
        );
    } else {
        info!(
            "Reference check skipped: assembled length {} or reference length {} exceeds {} bp threshold.",
            assembled.len(),
            reference_seq.len(),
            MAX_DISTANCE_LEN
        );
    }
}

fn run_pipeline(args: &Args) -> Result<Assembly> {
    let mut fragments = load_fragments(&args.input)
        .with_context(|| format!("Failed to parse fragments from {}", args.input.display()))?;
    if fragments.is_empty() {
        bail!("No fragments found in {}", args.input.display());
    }

    let config = args.overlap_config();
    info!("Building overlap links...");
    let report = build_links(&mut fragments, &config);
    info!(
        "Compared {} pairs: {} candidates, {} links",
        report.pairs_compared, report.candidates, report.accepted
    );
    if args.strict {
        report.ensure_unambiguous(&fragments)?;
    }

    if let Some(graph_path) = &args.export_graph_json {
        export_graph(graph_path, &fragments)?;
    }

    match validate_chain(&fragments) {
        Ok(_) => debug!("Links form a single linear chain"),
        Err(error) if args.allow_partial && is_recoverable(&error) => {
            warn!("Continuing with a partial assembly: {error}");
        }
        Err(error) => return Err(error).context("Fragment links do not form a single chain"),
    }

    let assembly = assemble(&fragments)?;
    debug!("Assembly path: {:?}", fragments.names(&assembly.path));
    let missing = missing_fragments(&assembly, &fragments);
    if !missing.is_empty() {
        debug!("Not contained: {:?}", fragments.names(&missing));
    }

    if let Some(path) = &args.output_fasta {
        let header = format!(
            "assembled_from_{}",
            args.input
                .file_name()
                .unwrap_or_else(|| "fragments".as_ref())
                .to_string_lossy()
        );
        let file = create_output(path)?;
        write_fasta(file, &header, &assembly.sequence, args.fasta_line_width)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Assembled sequence written to {}", path.display());
    }

    if let Some(path) = &args.reference {
        let reference_seq = load_reference(path)?;
        compare_to_reference(&assembly.sequence, &reference_seq);
    }

    Ok(assembly)
}
