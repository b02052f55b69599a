use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec};
use std::sync::LazyLock;

static CACHE_LOOKUP: LazyLock<IntCounterVec> = LazyLock::new(|| {
    prometheus::register_int_counter_vec!(
        "ttlcache_lookup_count",
        "how many times a ttlcache lookup was initiated for a given cache",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_HIT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    prometheus::register_int_counter_vec!(
        "ttlcache_hit_count",
        "how many times a ttlcache lookup was satisfied without running the update function",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_MISS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    prometheus::register_int_counter_vec!(
        "ttlcache_miss_count",
        "how many times a ttlcache lookup was a miss for a given cache",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_POPULATED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    prometheus::register_int_counter_vec!(
        "ttlcache_populated_count",
        "how many times a ttlcache lookup resulted in performing the work to populate the entry",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_ERROR: LazyLock<IntCounterVec> = LazyLock::new(|| {
    prometheus::register_int_counter_vec!(
        "ttlcache_error_count",
        "how many times a ttlcache population failed and was not cached",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_CACHED_ERROR: LazyLock<IntCounterVec> = LazyLock::new(|| {
    prometheus::register_int_counter_vec!(
        "ttlcache_cached_error_count",
        "how many times a ttlcache population installed an error result",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_WAIT: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    prometheus::register_int_gauge_vec!(
        "ttlcache_waiting_populate",
        "how many tasks are currently waiting for a cache entry to populate",
        &["cache_name"]
    )
    .unwrap()
});

static CACHE_SIZE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    prometheus::register_int_gauge_vec!(
        "ttlcache_cache_size",
        "number of entries contained in a ttlcache",
        &["cache_name"]
    )
    .unwrap()
});

/// The metrics for a single named cache, resolved once at construction
/// so that the hot path doesn't need to hash the label values.
pub(crate) struct CacheMetrics {
    pub lookup: IntCounter,
    pub hit: IntCounter,
    pub miss: IntCounter,
    pub populated: IntCounter,
    pub error: IntCounter,
    pub cached_error: IntCounter,
    pub wait: IntGauge,
    pub size: IntGauge,
}

impl CacheMetrics {
    pub fn new(name: &str) -> Self {
        Self {
            lookup: CACHE_LOOKUP.with_label_values(&[name]),
            hit: CACHE_HIT.with_label_values(&[name]),
            miss: CACHE_MISS.with_label_values(&[name]),
            populated: CACHE_POPULATED.with_label_values(&[name]),
            error: CACHE_ERROR.with_label_values(&[name]),
            cached_error: CACHE_CACHED_ERROR.with_label_values(&[name]),
            wait: CACHE_WAIT.with_label_values(&[name]),
            size: CACHE_SIZE.with_label_values(&[name]),
        }
    }
}
