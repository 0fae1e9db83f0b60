//! Reading fragments from `>`-tagged blocks and writing the assembled result.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use bio::io::fasta;
use flate2::read::MultiGzDecoder;
use log::{debug, info};

use crate::error::AssemblyError;
use crate::fragment::FragmentSet;

/// Errors returned while loading a fragment set.
#[derive(thiserror::Error, Debug)]
pub enum ReadSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed record in {}: {source}", .path.as_deref().map_or_else(|| "input".into(), |p| p.display().to_string()))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Fragment(#[from] AssemblyError),
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("bgz"))
        .unwrap_or(false)
}

/// Open `path` for buffered reading, decompressing `.gz`/`.bgz` files.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, ReadSourceError> {
    let file = File::open(path)?;
    if is_gzip(path) {
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn parse_records<R: BufRead>(
    reader: R,
    path: Option<&Path>,
) -> Result<FragmentSet, ReadSourceError> {
    let mut fragments = FragmentSet::new();
    for record in fasta::Reader::from_bufread(reader).records() {
        let record = record.map_err(|source| ReadSourceError::Parse {
            path: path.map(Path::to_path_buf),
            source,
        })?;
        let sequence: Vec<u8> = record.seq().iter().map(u8::to_ascii_uppercase).collect();
        let sequence = String::from_utf8(sequence)
            .map_err(|_| AssemblyError::InvalidSequence(record.id().to_string()))?;
        debug!("Fragment {} ({} symbols)", record.id(), sequence.len());
        fragments.push(record.id(), sequence)?;
    }
    Ok(fragments)
}

/// Parse fragments from tagged blocks: a `>id [description]` header line
/// followed by any number of sequence lines, which are concatenated.
pub fn read_fragments<R: Read>(reader: R) -> Result<FragmentSet, ReadSourceError> {
    parse_records(BufReader::new(reader), None)
}

/// Load fragments from a plain or gzip-compressed file.
pub fn load_fragments(path: &Path) -> Result<FragmentSet, ReadSourceError> {
    let reader = open_reader(path)?;
    let fragments = parse_records(reader, Some(path))?;
    info!("Loaded {} fragments from {}", fragments.len(), path.display());
    Ok(fragments)
}

/// Write one FASTA record, wrapping sequence lines at `line_width`
/// (0 = no wrapping).
pub fn write_fasta<W: Write>(
    mut writer: W,
    header: &str,
    sequence: &str,
    line_width: usize,
) -> std::io::Result<()> {
    writeln!(writer, ">{header}")?;
    if line_width == 0 || sequence.is_empty() {
        writeln!(writer, "{sequence}")?;
    } else {
        for line in sequence.as_bytes().chunks(line_width) {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn concatenates_multiline_blocks() {
        let input = b">Rosalind_1 first\nATCG\nAA\n>Rosalind_2\ncgaact\n";
        let fragments = read_fragments(&input[..]).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].name(), "Rosalind_1");
        assert_eq!(fragments[0].sequence(), "ATCGAA");
        assert_eq!(fragments[1].sequence(), "CGAACT");
    }

    #[test]
    fn allows_empty_blocks_and_input() {
        let fragments = read_fragments(&b">empty\n>next\nACGT\n"[..]).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].is_empty());

        assert!(read_fragments(&b""[..]).unwrap().is_empty());
    }

    #[test]
    fn parses_from_already_buffered_reader() {
        let reader = BufReader::new(&b">a\nAC\nGT\n>b\nTTGA\n"[..]);
        let fragments = parse_records(reader, None).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].sequence(), "ACGT");
        assert_eq!(fragments[1].sequence(), "TTGA");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = read_fragments(&b">a\nACGT\n>a\nGGGG\n"[..]).unwrap_err();
        assert!(matches!(
            err,
            ReadSourceError::Fragment(AssemblyError::DuplicateFragment(ref id)) if id == "a"
        ));
    }

    #[test]
    fn rejects_text_before_first_header() {
        let err = read_fragments(&b"ACGT\n>a\nACGT\n"[..]).unwrap_err();
        assert!(matches!(err, ReadSourceError::Parse { path: None, .. }));
    }

    #[test]
    fn loads_gzip_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fragments.fasta.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b">s1\nATCGAA\n>s2\nCGAACT\n").unwrap();
        encoder.finish().unwrap();

        let fragments = load_fragments(&path).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments.by_name("s2").map(|f| f.sequence()), Some("CGAACT"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_fragments(Path::new("/nonexistent/fragments.fasta")).unwrap_err();
        assert!(matches!(err, ReadSourceError::Io(_)));
    }

    #[test]
    fn wraps_fasta_lines() {
        let mut out = Vec::new();
        write_fasta(&mut out, "contig", "ACGTACGTAC", 4).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ">contig\nACGT\nACGT\nAC\n");

        let mut out = Vec::new();
        write_fasta(&mut out, "contig", "ACGTACGTAC", 0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ">contig\nACGTACGTAC\n");
    }
}
