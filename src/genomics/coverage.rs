use std::ops::Range;

use tracing::debug;

use crate::genomics::{AlignmentStore, DepthRun, DepthSink, PileupSweep, ReadFilter, Region};
use crate::ProfileError;

/// Coverage gathered for one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionCoverage {
    /// Sum over positions inside the region of the pileup depth there.
    pub covered_count: u64,
    /// Alignments that passed the filter and entered the pileup.
    pub alignments: u64,
    /// Highest depth observed inside the region.
    pub max_depth: u32,
}

/// Depth sink that keeps only the part of each run inside a window.
#[derive(Debug)]
struct WindowedDepth {
    window: Range<u64>,
    covered: u64,
    max_depth: u32,
}

impl WindowedDepth {
    fn new(window: Range<u64>) -> Self {
        Self {
            window,
            covered: 0,
            max_depth: 0,
        }
    }
}

impl DepthSink for WindowedDepth {
    fn observe(&mut self, run: DepthRun) {
        let clipped = DepthRun {
            start: run.start.max(self.window.start),
            end: run.end.min(self.window.end),
            depth: run.depth,
        };
        if !clipped.is_empty() {
            self.covered += u64::from(clipped.depth) * clipped.len();
            self.max_depth = self.max_depth.max(clipped.depth);
        }
    }
}

/// Accumulates depth-weighted coverage of annotated regions.
///
/// An alignment overlapping a region at `k` positions contributes `k`, so
/// the count approximates summed per-base coverage rather than a read tally.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageAggregator {
    filter: ReadFilter,
}

impl CoverageAggregator {
    /// Create an aggregator applying `filter` to every fetched read.
    pub fn new(filter: ReadFilter) -> Self {
        Self { filter }
    }

    /// Sweep the alignments overlapping `region` and sum depth over its
    /// positions. An unknown locus is an error even for an empty region.
    pub fn aggregate<S>(&self, store: &mut S, region: &Region) -> Result<RegionCoverage, ProfileError>
    where
        S: AlignmentStore + ?Sized,
    {
        let query = region.query();
        let tid = store
            .resolve(&query.locus)
            .ok_or_else(|| ProfileError::InvalidRegion {
                region: region.label(),
            })?;
        if query.is_empty() {
            return Ok(RegionCoverage::default());
        }

        let filter = self.filter;
        let mut sweep = PileupSweep::new(WindowedDepth::new(query.start..query.end));
        let mut alignments = 0u64;
        store.fetch(tid, query.start, query.end, &mut |read| {
            if !filter.accepts(read) {
                return Ok(());
            }
            let end = read.end();
            if end <= read.pos {
                return Ok(());
            }
            alignments += 1;
            sweep
                .push(read.pos, end)
                .map_err(|err| ProfileError::UnsortedAlignments {
                    region: region.label(),
                    position: err.position,
                })
        })?;

        let window = sweep.finish();
        let coverage = RegionCoverage {
            covered_count: window.covered,
            alignments,
            max_depth: window.max_depth,
        };
        debug!(
            tag = %region.tag,
            region = %query,
            covered = coverage.covered_count,
            alignments,
            max_depth = coverage.max_depth,
            "region aggregated"
        );
        Ok(coverage)
    }
}
