//! Per-context counters.

use std::time::Duration;

/// Counters kept by each [`BridgeState`](super::BridgeState).
///
/// Nothing here is shared between execution contexts; aggregate them
/// yourself if a process-wide view is needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeMetrics {
    pub(crate) recorded_calls: u64,
    pub(crate) replayed_calls: u64,
    pub(crate) direct_calls: u64,
    pub(crate) cycles: u64,
    pub(crate) aborted_cycles: u64,
    pub(crate) batched_requests: u64,
    pub(crate) record_time: Duration,
    pub(crate) compute_time: Duration,
    pub(crate) replay_time: Duration,
}

impl BridgeMetrics {
    /// Exponentiations captured while recording.
    pub fn recorded_calls(&self) -> u64 {
        self.recorded_calls
    }

    /// Exponentiations answered from a batch while replaying.
    pub fn replayed_calls(&self) -> u64 {
        self.replayed_calls
    }

    /// Exponentiations computed on the spot because no cycle was running.
    pub fn direct_calls(&self) -> u64 {
        self.direct_calls
    }

    /// Completed record/replay cycles, including those with an empty batch.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn aborted_cycles(&self) -> u64 {
        self.aborted_cycles
    }

    /// Requests dispatched to the backend over all cycles.
    pub fn batched_requests(&self) -> u64 {
        self.batched_requests
    }

    pub fn record_time(&self) -> Duration {
        self.record_time
    }

    pub fn compute_time(&self) -> Duration {
        self.compute_time
    }

    pub fn replay_time(&self) -> Duration {
        self.replay_time
    }

    pub(crate) fn finish_cycle(&mut self, timings: &CycleTimings, batch_len: usize) {
        self.cycles += 1;
        self.batched_requests += batch_len as u64;
        self.record_time += timings.record;
        self.compute_time += timings.compute;
        self.replay_time += timings.replay;
    }
}

/// Wall-clock time spent in each step of one cycle.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CycleTimings {
    pub(crate) record: Duration,
    pub(crate) compute: Duration,
    pub(crate) replay: Duration,
}

impl CycleTimings {
    pub(crate) fn total(&self) -> Duration {
        self.record + self.compute + self.replay
    }
}
