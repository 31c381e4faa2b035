use std::sync::Arc;

/// SAM CIGAR operation, named by its effect on read and reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOpKind {
    /// `M`
    Match,
    /// `I`
    Insertion,
    /// `D`
    Deletion,
    /// `N`, usually an intron.
    RefSkip,
    /// `S`
    SoftClip,
    /// `H`
    HardClip,
    /// `P`
    Padding,
    /// `=`
    SeqMatch,
    /// `X`
    SeqMismatch,
}

impl CigarOpKind {
    /// Single-letter SAM code.
    pub fn code(self) -> char {
        match self {
            CigarOpKind::Match => 'M',
            CigarOpKind::Insertion => 'I',
            CigarOpKind::Deletion => 'D',
            CigarOpKind::RefSkip => 'N',
            CigarOpKind::SoftClip => 'S',
            CigarOpKind::HardClip => 'H',
            CigarOpKind::Padding => 'P',
            CigarOpKind::SeqMatch => '=',
            CigarOpKind::SeqMismatch => 'X',
        }
    }

    /// Whether the operation advances the reference coordinate. A pileup
    /// keeps the read active across every such operation, gaps included.
    pub fn consumes_reference(self) -> bool {
        matches!(self.code(), 'M' | 'D' | 'N' | '=' | 'X')
    }
}

/// One run-length encoded CIGAR element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    /// Operation.
    pub kind: CigarOpKind,
    /// Run length.
    pub len: u32,
}

impl CigarOp {
    /// `len` repetitions of `kind`.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }

    /// Reference bases covered by this element.
    pub fn reference_span(self) -> u64 {
        if self.kind.consumes_reference() {
            u64::from(self.len)
        } else {
            0
        }
    }
}

/// Read unmapped.
pub const FLAG_UNMAPPED: u16 = 0x4;
/// Secondary alignment.
pub const FLAG_SECONDARY: u16 = 0x100;
/// Failed platform/vendor quality checks.
pub const FLAG_QC_FAIL: u16 = 0x200;
/// PCR or optical duplicate.
pub const FLAG_DUPLICATE: u16 = 0x400;

/// Mapped read as seen by the coverage sweep.
///
/// Only the placement is kept; bases and qualities play no part in
/// depth accounting.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    /// Reference contig/chromosome name.
    pub chrom: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub pos: u64,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// SAM flag bits.
    pub flags: u16,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
}

impl AlignedRead {
    /// Construct a new primary, mapped read.
    pub fn new(chrom: impl Into<Arc<str>>, pos: u64, mapq: u8, cigar: Vec<CigarOp>) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            mapq,
            flags: 0,
            cigar,
        }
    }

    /// Replace the SAM flag bits.
    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Number of reference bases spanned by the alignment.
    pub fn reference_len(&self) -> u64 {
        self.cigar.iter().map(|op| op.reference_span()).sum()
    }

    /// End position (half-open) on the reference.
    pub fn end(&self) -> u64 {
        self.pos + self.reference_len()
    }

    /// Whether `[pos, end)` intersects the half-open interval `[start, end)`.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.pos < end && self.end() > start
    }
}

/// Flag and mapping-quality gate applied before a read enters the pileup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFilter {
    /// Reads with any of these flag bits set are skipped.
    pub exclude_flags: u16,
    /// Reads below this mapping quality are skipped.
    pub min_mapq: u8,
}

impl ReadFilter {
    /// Default exclusion mask: unmapped, secondary, QC-fail and duplicate.
    pub const DEFAULT_EXCLUDE: u16 = FLAG_UNMAPPED | FLAG_SECONDARY | FLAG_QC_FAIL | FLAG_DUPLICATE;

    /// Filter that admits every read.
    pub fn permissive() -> Self {
        Self {
            exclude_flags: 0,
            min_mapq: 0,
        }
    }

    /// Whether the read takes part in coverage.
    pub fn accepts(&self, read: &AlignedRead) -> bool {
        read.flags & self.exclude_flags == 0 && read.mapq >= self.min_mapq
    }
}

impl Default for ReadFilter {
    fn default() -> Self {
        Self {
            exclude_flags: Self::DEFAULT_EXCLUDE,
            min_mapq: 0,
        }
    }
}
