//! # Per-gene RPKM from indexed alignments
//!
//! This library computes normalised gene expression from a GFF3 annotation
//! and a coordinate-sorted, indexed BAM/CRAM file.
//!
//! ## Pipeline
//!
//! 1. **Annotation**: genes become [`Region`]s, classified by linked `CDS`,
//!    `tRNA` or `rRNA` records
//! 2. **Retrieval**: alignments overlapping each region are fetched through
//!    the index ([`AlignmentStore`])
//! 3. **Pileup**: a sweep over alignment spans sums the depth at every
//!    position inside the region ([`CoverageAggregator`])
//! 4. **Normalisation**: counts become RPKM against the number of reads
//!    mapped to coding regions ([`ExpressionCalculator`])
//!
//! ## Usage Example
//!
//! ```ignore
//! use bam2rpkm::{genomics::load_annotation, ExpressionProfiler, ProfilerConfig};
//!
//! let mut regions = load_annotation("genome.gff")?.regions;
//! let profiler = ExpressionProfiler::new(ProfilerConfig::new(100)?);
//! let report = profiler.profile_bam(&mut regions, "sample.bam")?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod genomics;

pub use genomics::{
    AlignmentStore, CodingVolume, CoverageAggregator, EmptyLibraryPolicy, ExpressionCalculator,
    GeneExpression, HtsAlignmentStore, MalformedRecord, ReadFilter, Region, RegionCoverage,
};

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration parameters for a profiling run
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Uniform read length used to turn covered positions into reads.
    pub read_length: NonZeroU32,

    /// Worker threads for region aggregation (`0` = one per CPU).
    pub threads: usize,

    /// Reads excluded before the pileup.
    pub filter: ReadFilter,

    /// Behaviour when no read maps to a coding region.
    pub empty_library: EmptyLibraryPolicy,
}

impl ProfilerConfig {
    /// Sequential configuration with the default read filter.
    pub fn new(read_length: u32) -> Result<Self, ProfileError> {
        let read_length = NonZeroU32::new(read_length).ok_or_else(|| {
            ProfileError::InvalidConfiguration("read length must be > 0".to_string())
        })?;
        Ok(Self {
            read_length,
            threads: 1,
            filter: ReadFilter::default(),
            empty_library: EmptyLibraryPolicy::default(),
        })
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the read filter.
    pub fn with_filter(mut self, filter: ReadFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the empty-library policy.
    pub fn with_empty_library(mut self, policy: EmptyLibraryPolicy) -> Self {
        self.empty_library = policy;
        self
    }

    /// Thread count after resolving `0` to the available parallelism.
    pub fn effective_threads(&self) -> usize {
        match self.threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        }
    }
}

/// Result of a profiling run
#[derive(Debug, Clone)]
pub struct ExpressionReport {
    /// One record per region, in annotation order.
    pub expressions: Vec<GeneExpression>,

    /// Reads attributed to coding regions.
    pub coding_volume: CodingVolume,
}

impl ExpressionReport {
    /// Millions of reads mapped to coding regions.
    pub fn millions_coding_reads(&self) -> f64 {
        self.coding_volume.millions()
    }
}

/// Errors that can occur while profiling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// A file or its index could not be opened
    #[error("unable to open '{}': {reason}", .path.display())]
    ResourceUnavailable {
        /// Offending path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Locus absent from the alignment store's references
    #[error("invalid region '{region}'")]
    InvalidRegion {
        /// Region as written in diagnostics
        region: String,
    },

    /// Annotation line could not be interpreted
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),

    /// No read mapped to any coding region
    #[error("no reads mapped to coding regions; RPKM is undefined")]
    DivisionByZero,

    /// Store returned alignments out of coordinate order
    #[error("alignments for region '{region}' are not coordinate-sorted (start {position})")]
    UnsortedAlignments {
        /// Region being aggregated
        region: String,
        /// 0-based start of the out-of-order alignment
        position: u64,
    },

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Read failure after a resource was opened
    #[error("I/O error while {context}: {reason}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying cause
        reason: String,
    },
}

impl ProfileError {
    /// Helper for open failures.
    pub fn resource(path: impl AsRef<Path>, reason: impl fmt::Display) -> Self {
        ProfileError::ResourceUnavailable {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Helper for read failures.
    pub fn io(context: impl Into<String>, reason: impl fmt::Display) -> Self {
        ProfileError::Io {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

/// Main profiling orchestrator
///
/// Aggregates coverage for every region, then normalises once all counts
/// are final.
#[derive(Debug)]
pub struct ExpressionProfiler {
    config: ProfilerConfig,
    aggregator: CoverageAggregator,
}

impl ExpressionProfiler {
    /// Create new profiler
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            aggregator: CoverageAggregator::new(config.filter),
            config,
        }
    }

    /// Profile regions against an indexed BAM/CRAM file.
    pub fn profile_bam(
        &self,
        regions: &mut [Region],
        path: impl AsRef<Path>,
    ) -> Result<ExpressionReport, ProfileError> {
        let path = path.as_ref();
        self.profile_with(regions, || HtsAlignmentStore::open(path))
    }

    /// Profile regions with stores produced by `open`.
    ///
    /// The store is opened once up front, so an unavailable store fails even
    /// when there is nothing to aggregate. With more than one thread every
    /// worker opens its own handle.
    pub fn profile_with<S, F>(
        &self,
        regions: &mut [Region],
        open: F,
    ) -> Result<ExpressionReport, ProfileError>
    where
        S: AlignmentStore,
        F: Fn() -> Result<S, ProfileError> + Sync + Send,
    {
        let mut store = open()?;
        let threads = self.config.effective_threads();
        if threads <= 1 {
            self.aggregate(regions, &mut store)?;
        } else {
            drop(store);
            self.aggregate_parallel(regions, threads, open)?;
        }
        self.normalize(regions)
    }

    /// Aggregate coverage region by region through one store handle.
    pub fn aggregate<S>(&self, regions: &mut [Region], store: &mut S) -> Result<(), ProfileError>
    where
        S: AlignmentStore + ?Sized,
    {
        for region in regions.iter_mut() {
            let coverage = self.aggregator.aggregate(store, region)?;
            region.set_coverage(coverage.covered_count);
        }
        Ok(())
    }

    /// Aggregate coverage on a pool of `threads` workers.
    ///
    /// Counts are computed privately per region and written back in
    /// annotation order; the first failing region in that order is reported.
    pub fn aggregate_parallel<S, F>(
        &self,
        regions: &mut [Region],
        threads: usize,
        open: F,
    ) -> Result<(), ProfileError>
    where
        S: AlignmentStore,
        F: Fn() -> Result<S, ProfileError> + Sync + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|err| ProfileError::InvalidConfiguration(err.to_string()))?;
        debug!(threads, regions = regions.len(), "aggregating in parallel");

        let aggregator = self.aggregator;
        let shared: &[Region] = regions;
        let coverages: Vec<Result<RegionCoverage, ProfileError>> = pool.install(|| {
            shared
                .par_iter()
                .map_init(&open, |store, region| match store {
                    Ok(store) => aggregator.aggregate(store, region),
                    Err(err) => Err(err.clone()),
                })
                .collect()
        });

        for (region, coverage) in regions.iter_mut().zip(coverages) {
            region.set_coverage(coverage?.covered_count);
        }
        Ok(())
    }

    /// Turn final counts into RPKM.
    pub fn normalize(&self, regions: &[Region]) -> Result<ExpressionReport, ProfileError> {
        let read_length = self.config.read_length;
        let coding_volume = CodingVolume::from_regions(regions, read_length);
        info!(
            "millions of reads mapped to CDS = {:.2}",
            coding_volume.millions()
        );

        let calculator =
            ExpressionCalculator::new(read_length, coding_volume, self.config.empty_library)?;
        let expressions = regions.iter().map(|region| calculator.express(region)).collect();

        Ok(ExpressionReport {
            expressions,
            coding_volume,
        })
    }
}
