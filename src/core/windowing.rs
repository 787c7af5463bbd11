//! Sliding time windows over accelerometer recordings.
//!
//! Windows have a fixed length and start every `stride` milliseconds,
//! beginning at the first sample of a recording. Consecutive windows overlap
//! whenever the window is longer than the stride.

use crate::ingest::AccelSample;
use serde::{Deserialize, Serialize};

/// Window length and stride, both in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowSpec {
    pub window_ms: u32,
    pub stride_ms: u32,
}

impl WindowSpec {
    pub fn new(window_ms: u32, stride_ms: u32) -> Self {
        Self {
            window_ms,
            stride_ms,
        }
    }

    /// Window length in seconds.
    pub fn window_secs(&self) -> f64 {
        f64::from(self.window_ms) / 1000.0
    }
}

/// A window borrowed from a recording's sample buffer.
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow<'a> {
    /// Inclusive start timestamp
    pub start_ms: i64,
    /// Exclusive end timestamp
    pub end_ms: i64,
    /// Samples with `start_ms <= t < end_ms`
    pub samples: &'a [AccelSample],
}

impl<'a> SampleWindow<'a> {
    /// Check if a timestamp falls within this window.
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms < self.end_ms
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Get the duration of this window in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end_ms - self.start_ms) as f64 / 1000.0
    }
}

/// Iterator over the sliding windows of a sorted sample buffer.
///
/// Window starts run from the first timestamp while strictly before the last
/// timestamp. Windows with few samples are still yielded; callers decide what
/// is too sparse to use.
pub struct SlidingWindows<'a> {
    samples: &'a [AccelSample],
    spec: WindowSpec,
    next_start: i64,
    last_timestamp: i64,
}

impl<'a> Iterator for SlidingWindows<'a> {
    type Item = SampleWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.spec.stride_ms == 0 || self.next_start >= self.last_timestamp {
            return None;
        }

        let start_ms = self.next_start;
        let end_ms = start_ms + i64::from(self.spec.window_ms);
        self.next_start += i64::from(self.spec.stride_ms);

        let lo = self.samples.partition_point(|s| s.timestamp_ms < start_ms);
        let hi = self.samples.partition_point(|s| s.timestamp_ms < end_ms);

        Some(SampleWindow {
            start_ms,
            end_ms,
            samples: &self.samples[lo..hi.max(lo)],
        })
    }
}

/// Slide a window over samples sorted by timestamp.
pub fn sliding_windows(samples: &[AccelSample], spec: WindowSpec) -> SlidingWindows<'_> {
    let (next_start, last_timestamp) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first.timestamp_ms, last.timestamp_ms),
        _ => (0, 0),
    };

    SlidingWindows {
        samples,
        spec,
        next_start,
        last_timestamp,
    }
}
