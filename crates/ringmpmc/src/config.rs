use std::time::Duration;

/// Smallest backing array the queue will allocate.
pub const MIN_CAPACITY: u32 = 16;

/// Default ceiling on capacity growth.
pub const MAX_CAPACITY: u32 = 1024;

/// Capacity multiplier applied by a single expansion.
pub const EXPANSION_FACTOR: u32 = 2;

/// Default occupancy fraction above which a producer prefers to expand.
pub const EXPANSION_THRESHOLD: f64 = 0.9;

/// Default upper bound on the number of elements one pop returns.
pub const BURST_MAX: u32 = 16;

/// Default time a pop waits on an empty queue before giving up.
pub const POP_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for [`Ring`](crate::Ring) and [`Queue`](crate::Queue).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Starting capacity, clamped into `[MIN_CAPACITY, max_capacity]`.
    pub initial_capacity: u32,
    /// Ceiling the backing array may grow to.
    pub max_capacity: u32,
    /// Upper bound on a single pop batch.
    pub burst_max: u32,
    /// Occupancy fraction that marks the high-water line.
    pub expansion_threshold: f64,
    /// How long a pop waits for data before returning a timeout.
    pub pop_timeout: Duration,
    /// Enable the atomic traffic counters (slight overhead).
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a configuration with the given starting capacity and default
    /// tuning for everything else.
    pub fn new(initial_capacity: u32) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Checks the tunables that the protocol depends on.
    ///
    /// # Panics
    ///
    /// Panics if `max_capacity` is below `MIN_CAPACITY` or above 1M cells,
    /// if `burst_max` is zero, or if `expansion_threshold` is outside
    /// `(0, 1)`.
    pub(crate) fn validate(&self) {
        assert!(
            self.max_capacity >= MIN_CAPACITY && self.max_capacity <= (1 << 20),
            "max_capacity must be between {MIN_CAPACITY} and 1M cells"
        );
        assert!(self.burst_max > 0, "burst_max must be at least 1");
        assert!(
            self.expansion_threshold > 0.0 && self.expansion_threshold < 1.0,
            "expansion_threshold must lie strictly between 0 and 1"
        );
    }

    pub(crate) fn clamped_capacity(&self) -> u32 {
        self.initial_capacity.clamp(MIN_CAPACITY, self.max_capacity)
    }

    /// High-water line for the given capacity: `floor(capacity × threshold)`.
    pub(crate) fn high_water(&self, capacity: u32) -> u32 {
        (f64::from(capacity) * self.expansion_threshold) as u32
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: MIN_CAPACITY,
            max_capacity: MAX_CAPACITY,
            burst_max: BURST_MAX,
            expansion_threshold: EXPANSION_THRESHOLD,
            pop_timeout: POP_TIMEOUT,
            enable_metrics: false,
        }
    }
}
