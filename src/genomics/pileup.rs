use std::cmp::Reverse;
use std::collections::BinaryHeap;

use thiserror::Error;

/// Positions `[start, end)` all covered by `depth` alignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthRun {
    /// First position (0-based).
    pub start: u64,
    /// One past the last position.
    pub end: u64,
    /// Number of active alignments.
    pub depth: u32,
}

impl DepthRun {
    /// Number of positions in the run.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the run is empty.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Receiver of depth runs produced by a [`PileupSweep`].
pub trait DepthSink {
    /// Called once per run, in increasing position order.
    fn observe(&mut self, run: DepthRun);
}

impl DepthSink for Vec<DepthRun> {
    fn observe(&mut self, run: DepthRun) {
        self.push(run);
    }
}

/// An alignment arrived with a start before one already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("alignment starting at {position} follows one starting at {previous}")]
pub struct OutOfOrder {
    /// Start of the offending alignment.
    pub position: u64,
    /// Largest start seen so far.
    pub previous: u64,
}

/// Sweep-line pileup over coordinate-sorted alignment spans.
///
/// Active alignments are tracked by their end position in a min-heap, so
/// memory grows with the maximum depth rather than with the region size.
/// Positions covered by no alignment produce no run. There is no depth cap.
#[derive(Debug)]
pub struct PileupSweep<S: DepthSink> {
    sink: S,
    active: BinaryHeap<Reverse<u64>>,
    cursor: u64,
    last_start: Option<u64>,
}

impl<S: DepthSink> PileupSweep<S> {
    /// Start a sweep that reports runs to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            active: BinaryHeap::new(),
            cursor: 0,
            last_start: None,
        }
    }

    /// Number of alignments currently covering the sweep position.
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    /// Add the span `[start, end)` of one alignment.
    pub fn push(&mut self, start: u64, end: u64) -> Result<(), OutOfOrder> {
        if let Some(previous) = self.last_start {
            if start < previous {
                return Err(OutOfOrder {
                    position: start,
                    previous,
                });
            }
        }
        self.last_start = Some(start);

        if end <= start {
            return Ok(());
        }
        if self.active.is_empty() {
            self.cursor = start;
        }
        self.advance(start);
        self.active.push(Reverse(end));
        Ok(())
    }

    /// Flush the remaining runs and hand back the sink.
    pub fn finish(mut self) -> S {
        while let Some(&Reverse(end)) = self.active.peek() {
            self.emit_until(end);
            self.retire(end);
        }
        self.sink
    }

    fn advance(&mut self, to: u64) {
        while let Some(&Reverse(end)) = self.active.peek() {
            if end > to {
                break;
            }
            self.emit_until(end);
            self.retire(end);
        }
        self.emit_until(to);
    }

    fn retire(&mut self, end: u64) {
        while matches!(self.active.peek(), Some(&Reverse(e)) if e == end) {
            self.active.pop();
        }
    }

    fn emit_until(&mut self, to: u64) {
        if to > self.cursor && !self.active.is_empty() {
            self.sink.observe(DepthRun {
                start: self.cursor,
                end: to,
                depth: self.active.len() as u32,
            });
        }
        self.cursor = self.cursor.max(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(spans: &[(u64, u64)]) -> Vec<DepthRun> {
        let mut sweep = PileupSweep::new(Vec::new());
        for &(start, end) in spans {
            sweep.push(start, end).expect("sorted input");
        }
        sweep.finish()
    }

    fn run(start: u64, end: u64, depth: u32) -> DepthRun {
        DepthRun { start, end, depth }
    }

    #[test]
    fn single_span_is_one_run() {
        assert_eq!(sweep(&[(10, 20)]), vec![run(10, 20, 1)]);
    }

    #[test]
    fn overlapping_spans_stack() {
        assert_eq!(
            sweep(&[(0, 10), (5, 15)]),
            vec![run(0, 5, 1), run(5, 10, 2), run(10, 15, 1)]
        );
    }

    #[test]
    fn nested_and_identical_ends() {
        assert_eq!(
            sweep(&[(0, 10), (2, 10), (2, 4)]),
            vec![run(0, 2, 1), run(2, 4, 3), run(4, 10, 2)]
        );
    }

    #[test]
    fn gaps_produce_no_runs() {
        assert_eq!(sweep(&[(0, 3), (10, 12)]), vec![run(0, 3, 1), run(10, 12, 1)]);
    }

    #[test]
    fn abutting_spans_do_not_overlap() {
        assert_eq!(sweep(&[(0, 5), (5, 8)]), vec![run(0, 5, 1), run(5, 8, 1)]);
    }

    #[test]
    fn empty_spans_are_ignored() {
        assert_eq!(sweep(&[(4, 4), (6, 9)]), vec![run(6, 9, 1)]);
    }

    #[test]
    fn unsorted_input_is_rejected() {
        let mut sweep = PileupSweep::new(Vec::new());
        sweep.push(10, 20).unwrap();
        let err = sweep.push(9, 30).unwrap_err();
        assert_eq!(
            err,
            OutOfOrder {
                position: 9,
                previous: 10
            }
        );
    }

    #[test]
    fn depth_reflects_active_alignments() {
        let mut sweep = PileupSweep::new(Vec::new());
        sweep.push(0, 10).unwrap();
        sweep.push(1, 10).unwrap();
        assert_eq!(sweep.depth(), 2);
        sweep.push(12, 14).unwrap();
        assert_eq!(sweep.depth(), 1);
    }
}
