use std::num::NonZeroU32;

use crate::genomics::Region;
use crate::ProfileError;

/// What to do when no read maps to a coding region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyLibraryPolicy {
    /// Abort with [`ProfileError::DivisionByZero`].
    #[default]
    Fail,
    /// Carry out the division and report the resulting `nan`/`inf` values.
    ReportNonFinite,
}

/// Running total of reads attributed to coding regions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CodingVolume {
    reads: f64,
}

impl CodingVolume {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum the estimated reads of every coding region.
    pub fn from_regions<'a, I>(regions: I, read_length: NonZeroU32) -> Self
    where
        I: IntoIterator<Item = &'a Region>,
    {
        regions.into_iter().fold(Self::new(), |mut volume, region| {
            volume.observe(region, read_length);
            volume
        })
    }

    /// Add `region` if it is coding.
    pub fn observe(&mut self, region: &Region, read_length: NonZeroU32) {
        if region.is_coding() {
            self.reads += reads_mapped(region.covered_count, read_length);
        }
    }

    /// Estimated reads mapped to coding regions.
    pub fn reads(&self) -> f64 {
        self.reads
    }

    /// Same, in millions.
    pub fn millions(&self) -> f64 {
        self.reads / 1_000_000.0
    }
}

/// Normalised expression of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneExpression {
    /// Region display identifier.
    pub tag: String,
    /// Reads per kilobase per million coding reads.
    pub rpkm: f64,
    /// Covered positions divided by read length.
    pub reads_mapped: f64,
}

/// Estimated read count behind a depth-summed coverage.
pub fn reads_mapped(covered_count: u64, read_length: NonZeroU32) -> f64 {
    covered_count as f64 / f64::from(read_length.get())
}

/// Converts coverage counts to RPKM against a fixed coding library size.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionCalculator {
    read_length: NonZeroU32,
    millions: f64,
}

impl ExpressionCalculator {
    /// Fix the library size. Fails on an empty coding library unless the
    /// policy asks for non-finite output.
    pub fn new(
        read_length: NonZeroU32,
        volume: CodingVolume,
        policy: EmptyLibraryPolicy,
    ) -> Result<Self, ProfileError> {
        let millions = volume.millions();
        if millions == 0.0 && policy == EmptyLibraryPolicy::Fail {
            return Err(ProfileError::DivisionByZero);
        }
        Ok(Self {
            read_length,
            millions,
        })
    }

    /// Coding library size in millions of reads.
    pub fn millions(&self) -> f64 {
        self.millions
    }

    /// `reads / (length / 1000) / millions`
    pub fn rpkm(&self, covered_count: u64, length: u64) -> f64 {
        reads_mapped(covered_count, self.read_length) / (length as f64 / 1000.0) / self.millions
    }

    /// Expression record for one region.
    pub fn express(&self, region: &Region) -> GeneExpression {
        GeneExpression {
            tag: region.tag.clone(),
            rpkm: self.rpkm(region.covered_count, region.length()),
            reads_mapped: reads_mapped(region.covered_count, self.read_length),
        }
    }
}
