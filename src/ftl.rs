use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::*;

use crate::address_map::AddressMap;
use crate::config::{Counter, FtlConfig, Lba};
use crate::error::{Error, Result};
use crate::gc::{GarbageCollector, Reclaim, ReclaimedBlock, VictimPolicy};
use crate::page_store::{PageState, PageStore, PhysicalAddress};
use crate::policy::{AllocationPolicy, Stream, Target, WearLevelingPolicy};
use crate::stats::FtlStats;

/// Everything a write or GC pass mutates. Lives behind one lock.
struct Device<P> {
    store: PageStore,
    map: AddressMap,
    policy: P,
    gc: GarbageCollector,
    host_writes: Counter,
}

/// Page-mapped flash translation layer over an in-memory flash array.
///
/// `write`, `trim` and GC take the device lock exclusively; `read`, `lookup`
/// and `stats` share it.
pub struct Ftl<P = WearLevelingPolicy> {
    config: FtlConfig,
    device: RwLock<Device<P>>,
}

impl Ftl<WearLevelingPolicy> {
    pub fn new(config: FtlConfig) -> Result<Self> {
        let policy = WearLevelingPolicy::new(config.gc_watermark_pages);
        Ftl::with_policy(config, policy, VictimPolicy::default())
    }
}

impl<P: AllocationPolicy> Ftl<P> {
    pub fn with_policy(config: FtlConfig, policy: P, victim_policy: VictimPolicy) -> Result<Self> {
        config.validate()?;
        if policy.gc_watermark() != config.gc_watermark_pages {
            return Err(Error::Config("allocation policy watermark differs from configuration"));
        }
        config.log_geometry();

        let device = Device {
            store: PageStore::new(config.total_blocks, config.pages_per_block),
            map: AddressMap::new(),
            policy,
            gc: GarbageCollector::new(victim_policy),
            host_writes: 0,
        };

        Ok(Ftl {
            config,
            device: RwLock::new(device),
        })
    }

    pub fn config(&self) -> &FtlConfig {
        &self.config
    }

    pub fn logical_capacity(&self) -> usize {
        self.config.logical_capacity()
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, Device<P>>> {
        self.device.read().map_err(|_| Error::Poisoned)
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, Device<P>>> {
        self.device.write().map_err(|_| Error::Poisoned)
    }

    /// Out-of-place update of `lba`. The previous page goes stale only once
    /// the new copy is programmed and mapped.
    pub fn write(&self, lba: Lba, data: &[u8]) -> Result<()> {
        if data.len() > self.config.page_size_bytes {
            return Err(Error::PayloadTooLarge {
                len: data.len(),
                max: self.config.page_size_bytes,
            });
        }

        let capacity = self.logical_capacity();
        self.exclusive()?.write(lba, data, capacity)
    }

    pub fn read(&self, lba: Lba) -> Result<Vec<u8>> {
        let device = self.shared()?;
        let addr = device.map.lookup(lba).ok_or(Error::NotFound(lba))?;
        let page = device.store.page(addr);
        if page.state() != PageState::Valid {
            return Err(Error::MappingCorrupted(addr));
        }

        Ok(page.data().to_vec())
    }

    /// Unmaps `lba`. Its page turns stale, not free: only an erase frees it.
    pub fn trim(&self, lba: Lba) -> Result<()> {
        let mut device = self.exclusive()?;
        let addr = device.map.remove(lba).ok_or(Error::NotFound(lba))?;
        device.store.mark_stale(addr);

        trace!("Trim LBA {} at {}", lba, addr);
        Ok(())
    }

    /// Physical page currently holding `lba`.
    pub fn lookup(&self, lba: Lba) -> Result<PhysicalAddress> {
        self.shared()?.map.lookup(lba).ok_or(Error::NotFound(lba))
    }

    pub fn contains(&self, lba: Lba) -> Result<bool> {
        Ok(self.shared()?.map.contains(lba))
    }

    /// One GC pass outside the write path, e.g. when the host is idle.
    pub fn collect_garbage(&self) -> Result<Option<ReclaimedBlock>> {
        match self.exclusive()?.reclaim()? {
            Reclaim::Reclaimed(block) => Ok(Some(block)),
            Reclaim::NoVictim => Ok(None),
        }
    }

    pub fn stats(&self) -> Result<FtlStats> {
        let device = self.shared()?;
        Ok(FtlStats::collect(
            &device.store,
            &device.map,
            &device.gc,
            device.host_writes,
            self.logical_capacity(),
        ))
    }
}

impl<P: AllocationPolicy> Device<P> {
    fn write(&mut self, lba: Lba, data: &[u8], capacity: usize) -> Result<()> {
        if !self.map.contains(lba) && self.map.len() >= capacity {
            warn!("Write of LBA {} refused: {} LBAs already live", lba, self.map.len());
            return Err(Error::DeviceFull);
        }

        loop {
            match self.policy.next_write_target(&self.store, Stream::Host)? {
                Target::Page(addr) => {
                    self.store.mark_valid(addr, lba, data)?;
                    if let Some(old) = self.map.set(lba, addr) {
                        self.store.mark_stale(old);
                    }
                    self.host_writes += 1;

                    trace!("LBA {} written to {}", lba, addr);
                    return Ok(());
                }
                Target::NeedsGc => match self.reclaim()? {
                    Reclaim::Reclaimed(_) => {}
                    Reclaim::NoVictim => {
                        warn!(
                            "Device full: {} free pages, none reclaimable, LBA {} not written",
                            self.store.free_pages(),
                            lba
                        );
                        return Err(Error::DeviceFull);
                    }
                },
            }
        }
    }

    fn reclaim(&mut self) -> Result<Reclaim> {
        let outcome = self.gc.reclaim(&mut self.store, &mut self.map, &mut self.policy)?;
        if let Reclaim::Reclaimed(r) = outcome {
            debug!(
                "GC reclaimed block {}: {} relocated, {} freed, {} free pages",
                r.block,
                r.relocated,
                r.freed,
                self.store.free_pages()
            );
        }
        Ok(outcome)
    }
}
