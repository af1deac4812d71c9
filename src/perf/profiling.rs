/// Occluder and occludee counters for profiling the culler.
/// Counters only advance when the `stats` feature is enabled; otherwise
/// `count_add!` expands to nothing and every snapshot reads zero.
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters owned by one culler instance.
/// Atomic so parallel bin rendering can update them through `&self`.
#[derive(Debug, Default)]
pub struct CullingCounters {
    // Occluder path
    pub occluder_processed_triangles: AtomicU64,
    pub occluder_rasterized_triangles: AtomicU64,
    pub occluder_tiles_traversed: AtomicU64,
    pub occluder_tiles_updated: AtomicU64,
    pub occluder_tiles_merged: AtomicU64,

    // Occludee path
    pub occludee_processed_rectangles: AtomicU64,
    pub occludee_processed_triangles: AtomicU64,
    pub occludee_rasterized_triangles: AtomicU64,
    pub occludee_tiles_traversed: AtomicU64,
}

impl CullingCounters {
    pub const fn new() -> Self {
        Self {
            occluder_processed_triangles: AtomicU64::new(0),
            occluder_rasterized_triangles: AtomicU64::new(0),
            occluder_tiles_traversed: AtomicU64::new(0),
            occluder_tiles_updated: AtomicU64::new(0),
            occluder_tiles_merged: AtomicU64::new(0),
            occludee_processed_rectangles: AtomicU64::new(0),
            occludee_processed_triangles: AtomicU64::new(0),
            occludee_rasterized_triangles: AtomicU64::new(0),
            occludee_tiles_traversed: AtomicU64::new(0),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.occluder_processed_triangles.store(0, Ordering::Relaxed);
        self.occluder_rasterized_triangles.store(0, Ordering::Relaxed);
        self.occluder_tiles_traversed.store(0, Ordering::Relaxed);
        self.occluder_tiles_updated.store(0, Ordering::Relaxed);
        self.occluder_tiles_merged.store(0, Ordering::Relaxed);
        self.occludee_processed_rectangles.store(0, Ordering::Relaxed);
        self.occludee_processed_triangles.store(0, Ordering::Relaxed);
        self.occludee_rasterized_triangles.store(0, Ordering::Relaxed);
        self.occludee_tiles_traversed.store(0, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> OcclusionCullingStatistics {
        OcclusionCullingStatistics {
            occluders: OccluderStatistics {
                num_processed_triangles: self.occluder_processed_triangles.load(Ordering::Relaxed),
                num_rasterized_triangles: self.occluder_rasterized_triangles.load(Ordering::Relaxed),
                num_tiles_traversed: self.occluder_tiles_traversed.load(Ordering::Relaxed),
                num_tiles_updated: self.occluder_tiles_updated.load(Ordering::Relaxed),
                num_tiles_merged: self.occluder_tiles_merged.load(Ordering::Relaxed),
            },
            occludees: OccludeeStatistics {
                num_processed_rectangles: self.occludee_processed_rectangles.load(Ordering::Relaxed),
                num_processed_triangles: self.occludee_processed_triangles.load(Ordering::Relaxed),
                num_rasterized_triangles: self.occludee_rasterized_triangles.load(Ordering::Relaxed),
                num_tiles_traversed: self.occludee_tiles_traversed.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccluderStatistics {
    pub num_processed_triangles: u64,
    pub num_rasterized_triangles: u64,
    pub num_tiles_traversed: u64,
    pub num_tiles_updated: u64,
    pub num_tiles_merged: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccludeeStatistics {
    pub num_processed_rectangles: u64,
    pub num_processed_triangles: u64,
    pub num_rasterized_triangles: u64,
    pub num_tiles_traversed: u64,
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OcclusionCullingStatistics {
    pub occluders: OccluderStatistics,
    pub occludees: OccludeeStatistics,
}

impl OcclusionCullingStatistics {
    /// Log a formatted report at info level
    pub fn log_report(&self) {
        log::info!("=== Occlusion Culling Statistics ===");
        log::info!("Occluders:");
        log::info!("  triangles processed:        {:12}", self.occluders.num_processed_triangles);
        log::info!("  triangles rasterized:       {:12}", self.occluders.num_rasterized_triangles);
        log::info!("  tiles traversed:            {:12}", self.occluders.num_tiles_traversed);
        log::info!("  tiles updated:              {:12}", self.occluders.num_tiles_updated);
        log::info!("  tiles merged:               {:12}", self.occluders.num_tiles_merged);
        if self.occluders.num_tiles_traversed > 0 {
            let update_rate = (self.occluders.num_tiles_updated as f64
                / self.occluders.num_tiles_traversed as f64)
                * 100.0;
            log::info!("  tile update rate:           {:11.2}%", update_rate);
        }

        log::info!("Occludees:");
        log::info!("  rectangles processed:       {:12}", self.occludees.num_processed_rectangles);
        log::info!("  triangles processed:        {:12}", self.occludees.num_processed_triangles);
        log::info!("  triangles rasterized:       {:12}", self.occludees.num_rasterized_triangles);
        log::info!("  tiles traversed:            {:12}", self.occludees.num_tiles_traversed);
    }
}

/// Macro for adding to a counter (only when the stats feature is enabled)
#[doc(hidden)]
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "stats")]
        {
            $counter.fetch_add($value as u64, std::sync::atomic::Ordering::Relaxed);
        }
        #[cfg(not(feature = "stats"))]
        {
            let _ = (&$counter, $value);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_counters_snapshot_to_zero() {
        let counters = CullingCounters::new();
        assert_eq!(counters.snapshot(), OcclusionCullingStatistics::default());
    }

    #[test]
    fn test_reset_clears_every_counter() {
        let counters = CullingCounters::new();
        counters.occluder_tiles_updated.fetch_add(7, Ordering::Relaxed);
        counters.occludee_processed_rectangles.fetch_add(3, Ordering::Relaxed);
        assert_eq!(counters.snapshot().occluders.num_tiles_updated, 7);
        assert_eq!(counters.snapshot().occludees.num_processed_rectangles, 3);

        counters.reset();
        assert_eq!(counters.snapshot(), OcclusionCullingStatistics::default());
    }

    #[test]
    fn test_count_add_respects_feature() {
        let counters = CullingCounters::new();
        count_add!(counters.occluder_tiles_traversed, 5);
        let expected = if cfg!(feature = "stats") { 5 } else { 0 };
        assert_eq!(counters.snapshot().occluders.num_tiles_traversed, expected);
    }
}
