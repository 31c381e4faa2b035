//! Genomics primitives behind the expression profiler.
//!
//! This module exposes the annotation loader, alignment store access, the
//! pileup sweep, coverage aggregation and RPKM normalisation.

mod annotation;
mod coverage;
mod expression;
mod pileup;
mod report;
mod store;
mod types;

pub use annotation::{
    load_annotation, parse_annotation, Annotation, MalformedRecord, Region, RegionKind,
};
pub use coverage::{CoverageAggregator, RegionCoverage};
pub use expression::{
    reads_mapped, CodingVolume, EmptyLibraryPolicy, ExpressionCalculator, GeneExpression,
};
pub use pileup::{DepthRun, DepthSink, OutOfOrder, PileupSweep};
pub use report::{render_report, write_report};
pub use store::{AlignmentStore, HtsAlignmentStore, MemoryAlignmentStore, RegionQuery};
pub use types::{
    AlignedRead, CigarOp, CigarOpKind, ReadFilter, FLAG_DUPLICATE, FLAG_QC_FAIL, FLAG_SECONDARY,
    FLAG_UNMAPPED,
};
