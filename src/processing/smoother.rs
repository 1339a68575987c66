//! Per-anchor median smoothing of raw range samples
//!
//! UWB ranges suffer single-sample multipath and NLOS outliers. A short
//! circular history with a median read-out rejects those spikes while keeping
//! the latency of the filter at a handful of ranging rounds.

use serde::{Deserialize, Serialize};

use crate::core::{DEFAULT_MAX_RANGE_M, DEFAULT_MIN_RANGE_M, EMPTY_SAMPLE, HISTORY_CAPACITY};

/// Closed interval of admissible range samples (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeDomain {
    pub min_m: f32,
    pub max_m: f32,
}

impl Default for RangeDomain {
    fn default() -> Self {
        Self {
            min_m: DEFAULT_MIN_RANGE_M,
            max_m: DEFAULT_MAX_RANGE_M,
        }
    }
}

impl RangeDomain {
    pub fn new(min_m: f32, max_m: f32) -> Self {
        Self { min_m, max_m }
    }

    /// NaN, infinities and the empty sentinel are never admitted.
    pub fn contains(&self, sample: f32) -> bool {
        sample.is_finite() && sample != EMPTY_SAMPLE && sample >= self.min_m && sample <= self.max_m
    }
}

/// Fixed-capacity circular buffer with a lower-median read-out
#[derive(Debug, Clone)]
pub struct RangeSmoother {
    slots: [f32; HISTORY_CAPACITY],
    cursor: usize,
    domain: RangeDomain,
}

impl Default for RangeSmoother {
    fn default() -> Self {
        Self::new(RangeDomain::default())
    }
}

impl RangeSmoother {
    pub fn new(domain: RangeDomain) -> Self {
        Self {
            slots: [EMPTY_SAMPLE; HISTORY_CAPACITY],
            cursor: 0,
            domain,
        }
    }

    /// Admit a sample, overwriting the oldest once the buffer is full.
    ///
    /// Returns `false` and leaves the buffer untouched when the sample is
    /// outside the valid domain.
    pub fn push(&mut self, sample: f32) -> bool {
        if !self.domain.contains(sample) {
            return false;
        }
        self.slots[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % HISTORY_CAPACITY;
        true
    }

    /// Median of the stored samples, or [`EMPTY_SAMPLE`] if nothing was admitted yet.
    ///
    /// For an even count the lower of the two middle elements is returned
    /// (`sorted[count / 2]` in ascending order); the two are never averaged.
    pub fn filtered(&self) -> f32 {
        let mut valid = [EMPTY_SAMPLE; HISTORY_CAPACITY];
        let mut count = 0;
        for &sample in self.slots.iter().filter(|&&s| s != EMPTY_SAMPLE) {
            valid[count] = sample;
            count += 1;
        }
        if count == 0 {
            return EMPTY_SAMPLE;
        }
        let valid = &mut valid[..count];
        valid.sort_by(f32::total_cmp);
        valid[count / 2]
    }

    /// Number of slots currently holding a sample
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|&&s| s != EMPTY_SAMPLE).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn domain(&self) -> RangeDomain {
        self.domain
    }

    pub fn clear(&mut self) {
        self.slots = [EMPTY_SAMPLE; HISTORY_CAPACITY];
        self.cursor = 0;
    }
}
