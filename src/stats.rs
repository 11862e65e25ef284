use crate::address_map::AddressMap;
use crate::config::Counter;
use crate::gc::GarbageCollector;
use crate::page_store::PageStore;

/// Point-in-time view of the device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FtlStats {
    pub free_pages: Counter,
    pub stale_pages: Counter,
    pub valid_pages: Counter,
    pub erase_counts: Vec<Counter>,
    pub live_lbas: Counter,
    pub logical_capacity: Counter,
    // Lifetime counters
    pub host_writes: Counter,
    pub gc_relocations: Counter,
    pub gc_runs: Counter,
    pub erases: Counter,
}

impl FtlStats {
    pub(crate) fn collect(
        store: &PageStore,
        map: &AddressMap,
        gc: &GarbageCollector,
        host_writes: Counter,
        logical_capacity: Counter,
    ) -> Self {
        let erase_counts = store.erase_counts();
        FtlStats {
            free_pages: store.free_pages(),
            stale_pages: store.stale_pages(),
            valid_pages: store.valid_pages(),
            erases: erase_counts.iter().sum(),
            erase_counts,
            live_lbas: map.len(),
            logical_capacity,
            host_writes,
            gc_relocations: gc.relocations(),
            gc_runs: gc.runs(),
        }
    }

    /// Most worn block minus least worn block.
    pub fn wear_spread(&self) -> Counter {
        let max = self.erase_counts.iter().max().copied().unwrap_or(0);
        let min = self.erase_counts.iter().min().copied().unwrap_or(0);
        max - min
    }

    /// Pages programmed per page the host asked for.
    pub fn write_amplification(&self) -> f64 {
        if self.host_writes == 0 {
            return 1.0;
        }
        (self.host_writes + self.gc_relocations) as f64 / self.host_writes as f64
    }
}
