use serde::{Deserialize, Serialize};

/// Engine tuning knobs. Everything here has a sensible default; embedders
/// usually just use `EngineConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the bounded queue between gather workers and the consumer.
    pub gather_queue_size: usize,
    /// Worker threads per available core for a gather stage (capped at the
    /// number of splits).
    pub gather_workers_per_core: usize,
    /// Maximum number of raw records sampled by DESCRIBE.
    pub describe_sample_size: usize,
    /// How long a streaming group-by waits after the first dirty key before
    /// releasing the current micro-batch, in milliseconds.
    pub streaming_linger_ms: u64,
    /// HyperLogLog precision for `count_distinct`: the sketch keeps
    /// `2^precision` one-byte registers. 12 gives roughly 1.6% error.
    pub distinct_precision: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gather_queue_size: 1024,
            gather_workers_per_core: 2,
            describe_sample_size: 2000,
            streaming_linger_ms: 100,
            distinct_precision: 12,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
