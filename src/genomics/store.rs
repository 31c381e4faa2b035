//! Indexed random-access retrieval of alignments overlapping a region.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_htslib::bam::{self, record::Cigar, Read};

use crate::genomics::{AlignedRead, CigarOp, CigarOpKind};
use crate::ProfileError;

/// 0-based half-open interval on a named reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionQuery {
    /// Reference sequence name.
    pub locus: Arc<str>,
    /// First position (0-based, inclusive).
    pub start: u64,
    /// One past the last position.
    pub end: u64,
}

impl RegionQuery {
    /// Number of positions covered by the query.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the query covers no position.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for RegionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.locus, self.start + 1, self.end)
    }
}

/// Source of coordinate-sorted alignments addressable by region.
pub trait AlignmentStore {
    /// Map a reference name to the store's reference id.
    fn resolve(&self, locus: &str) -> Option<u32>;

    /// Stream every alignment on `tid` whose span intersects `[start, end)`
    /// to `visit`, in coordinate order. No cap is placed on the number of
    /// alignments delivered.
    fn fetch(
        &mut self,
        tid: u32,
        start: u64,
        end: u64,
        visit: &mut dyn FnMut(&AlignedRead) -> Result<(), ProfileError>,
    ) -> Result<(), ProfileError>;
}

/// Indexed BAM/CRAM file read through htslib.
pub struct HtsAlignmentStore {
    path: PathBuf,
    reader: bam::IndexedReader,
    names: Vec<Arc<str>>,
    record: bam::Record,
}

impl HtsAlignmentStore {
    /// Open an alignment file together with its index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref().to_path_buf();
        let reader =
            bam::IndexedReader::from_path(&path).map_err(|err| ProfileError::resource(&path, err))?;
        let names = reader
            .header()
            .target_names()
            .iter()
            .map(|name| Arc::from(String::from_utf8_lossy(name).as_ref()))
            .collect();

        Ok(Self {
            path,
            reader,
            names,
            record: bam::Record::new(),
        })
    }

    /// Reference names in header order.
    pub fn reference_names(&self) -> &[Arc<str>] {
        &self.names
    }
}

impl fmt::Debug for HtsAlignmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtsAlignmentStore")
            .field("path", &self.path)
            .field("references", &self.names.len())
            .finish()
    }
}

impl AlignmentStore for HtsAlignmentStore {
    fn resolve(&self, locus: &str) -> Option<u32> {
        self.reader.header().tid(locus.as_bytes())
    }

    fn fetch(
        &mut self,
        tid: u32,
        start: u64,
        end: u64,
        visit: &mut dyn FnMut(&AlignedRead) -> Result<(), ProfileError>,
    ) -> Result<(), ProfileError> {
        let chrom = self
            .names
            .get(tid as usize)
            .cloned()
            .ok_or_else(|| ProfileError::InvalidRegion {
                region: format!("reference id {tid}"),
            })?;

        self.reader
            .fetch((tid, start as i64, end as i64))
            .map_err(|err| ProfileError::io(format!("fetching {chrom}:{}-{end}", start + 1), err))?;

        let mut read = AlignedRead::new(chrom, 0, 0, Vec::new());
        while let Some(result) = self.reader.read(&mut self.record) {
            result.map_err(|err| ProfileError::io(format!("reading {}", self.path.display()), err))?;

            read.pos = self.record.pos().max(0) as u64;
            read.mapq = self.record.mapq();
            read.flags = self.record.flags();
            read.cigar.clear();
            read.cigar
                .extend(self.record.cigar().iter().map(|op| convert_cigar(*op)));
            visit(&read)?;
        }
        Ok(())
    }
}

fn convert_cigar(op: Cigar) -> CigarOp {
    match op {
        Cigar::Match(len) => CigarOp::new(CigarOpKind::Match, len),
        Cigar::Ins(len) => CigarOp::new(CigarOpKind::Insertion, len),
        Cigar::Del(len) => CigarOp::new(CigarOpKind::Deletion, len),
        Cigar::RefSkip(len) => CigarOp::new(CigarOpKind::RefSkip, len),
        Cigar::SoftClip(len) => CigarOp::new(CigarOpKind::SoftClip, len),
        Cigar::HardClip(len) => CigarOp::new(CigarOpKind::HardClip, len),
        Cigar::Pad(len) => CigarOp::new(CigarOpKind::Padding, len),
        Cigar::Equal(len) => CigarOp::new(CigarOpKind::SeqMatch, len),
        Cigar::Diff(len) => CigarOp::new(CigarOpKind::SeqMismatch, len),
    }
}

/// Alignment store held in memory, kept sorted by position per reference.
///
/// Cloning is cheap; clones share the reads.
#[derive(Debug, Clone, Default)]
pub struct MemoryAlignmentStore {
    names: Vec<Arc<str>>,
    reads: Arc<Vec<Vec<AlignedRead>>>,
}

impl MemoryAlignmentStore {
    /// Create an empty store with the given reference names.
    pub fn new<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let names: Vec<Arc<str>> = references.into_iter().map(Into::into).collect();
        let reads = Arc::new(vec![Vec::new(); names.len()]);
        Self { names, reads }
    }

    /// Insert a read, keeping its reference sorted by position.
    pub fn push(&mut self, read: AlignedRead) -> Result<(), ProfileError> {
        let tid = self
            .resolve(&read.chrom)
            .ok_or_else(|| ProfileError::InvalidRegion {
                region: read.chrom.to_string(),
            })? as usize;
        let bucket = &mut Arc::make_mut(&mut self.reads)[tid];
        let at = bucket.partition_point(|existing| existing.pos <= read.pos);
        bucket.insert(at, read);
        Ok(())
    }

    /// Insert many reads.
    pub fn with_reads<I>(mut self, reads: I) -> Result<Self, ProfileError>
    where
        I: IntoIterator<Item = AlignedRead>,
    {
        for read in reads {
            self.push(read)?;
        }
        Ok(self)
    }

    /// Total number of stored reads.
    pub fn len(&self) -> usize {
        self.reads.iter().map(Vec::len).sum()
    }

    /// Whether the store holds no read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlignmentStore for MemoryAlignmentStore {
    fn resolve(&self, locus: &str) -> Option<u32> {
        self.names
            .iter()
            .position(|name| name.as_ref() == locus)
            .map(|tid| tid as u32)
    }

    fn fetch(
        &mut self,
        tid: u32,
        start: u64,
        end: u64,
        visit: &mut dyn FnMut(&AlignedRead) -> Result<(), ProfileError>,
    ) -> Result<(), ProfileError> {
        let bucket = self
            .reads
            .get(tid as usize)
            .ok_or_else(|| ProfileError::InvalidRegion {
                region: format!("reference id {tid}"),
            })?;
        for read in bucket.iter().take_while(|read| read.pos < end) {
            if read.overlaps(start, end) {
                visit(read)?;
            }
        }
        Ok(())
    }
}
