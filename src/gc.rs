//! Greedy garbage collection: pick the block with the most stale pages,
//! move its valid pages out, erase it.

use std::cmp::Reverse;

use log::*;

use crate::address_map::AddressMap;
use crate::config::{BlockId, Counter};
use crate::error::{Error, Result};
use crate::page_store::{PageState, PageStore, PhysicalAddress};
use crate::policy::{AllocationPolicy, Stream, Target};

/// Tie-break between blocks with the same number of stale pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VictimPolicy {
    /// Least erased block wins, spreading wear.
    #[default]
    MaxStaleLowestWear,
    /// Lowest block index wins.
    MaxStale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimedBlock {
    pub block: BlockId,
    pub relocated: Counter,
    pub freed: Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    Reclaimed(ReclaimedBlock),
    /// No block holds a stale page; erasing anything would free nothing.
    NoVictim,
}

#[derive(Debug, Clone, Default)]
pub struct GarbageCollector {
    victim_policy: VictimPolicy,
    runs: Counter,
    relocations: Counter,
}

impl GarbageCollector {
    pub fn new(victim_policy: VictimPolicy) -> Self {
        GarbageCollector {
            victim_policy,
            runs: 0,
            relocations: 0,
        }
    }

    pub fn runs(&self) -> Counter {
        self.runs
    }

    pub fn relocations(&self) -> Counter {
        self.relocations
    }

    /// All blocks share one page count, so the stale ratio orders the same
    /// way as the stale count.
    pub fn select_victim(&self, store: &PageStore) -> Option<BlockId> {
        let candidates = store
            .blocks()
            .iter()
            .enumerate()
            .filter(|(_, blk)| blk.stale_pages() > 0);

        match self.victim_policy {
            VictimPolicy::MaxStaleLowestWear => candidates
                .min_by_key(|(id, blk)| (Reverse(blk.stale_pages()), blk.erase_count(), *id))
                .map(|(id, _)| id),
            VictimPolicy::MaxStale => candidates
                .min_by_key(|(id, blk)| (Reverse(blk.stale_pages()), *id))
                .map(|(id, _)| id),
        }
    }

    pub fn reclaim<P>(
        &mut self,
        store: &mut PageStore,
        map: &mut AddressMap,
        policy: &mut P,
    ) -> Result<Reclaim>
    where
        P: AllocationPolicy + ?Sized,
    {
        let Some(victim) = self.select_victim(store) else {
            debug!("GC: no block with stale pages");
            return Ok(Reclaim::NoVictim);
        };

        let freed = store.block(victim).stale_pages();
        debug!(
            "GC: victim block {} ({} stale, {} valid, erase count {})",
            victim,
            freed,
            store.block(victim).valid_pages(),
            store.block(victim).erase_count()
        );

        let valid: Vec<PhysicalAddress> = store
            .block(victim)
            .pages()
            .iter()
            .enumerate()
            .filter(|(_, page)| page.state() == PageState::Valid)
            .map(|(page, _)| PhysicalAddress::new(victim, page))
            .collect();

        for old in valid.iter().copied() {
            self.relocate(store, map, policy, victim, old)?;
        }

        store.erase_block(victim)?;
        policy.on_erase(victim);
        self.runs += 1;

        Ok(Reclaim::Reclaimed(ReclaimedBlock {
            block: victim,
            relocated: valid.len(),
            freed,
        }))
    }

    fn relocate<P>(
        &mut self,
        store: &mut PageStore,
        map: &mut AddressMap,
        policy: &mut P,
        victim: BlockId,
        old: PhysicalAddress,
    ) -> Result<()>
    where
        P: AllocationPolicy + ?Sized,
    {
        let page = store.page(old);
        let lba = page.owner().ok_or(Error::MappingCorrupted(old))?;
        if map.lookup(lba) != Some(old) {
            return Err(Error::MappingCorrupted(old));
        }
        let data = page.data().to_vec();

        let new = match policy.next_write_target(store, Stream::Gc { victim }) {
            Ok(Target::Page(addr)) => addr,
            Ok(Target::NeedsGc) | Err(Error::Exhausted) => {
                error!("GC: no room to relocate LBA {} out of block {}", lba, victim);
                return Err(Error::GcRelocationFailed { block: victim, lba });
            }
            Err(e) => return Err(e),
        };

        store.mark_valid(new, lba, &data)?;
        map.set(lba, new);
        store.mark_stale(old);
        self.relocations += 1;

        trace!("GC: LBA {} moved {} -> {}", lba, old, new);
        Ok(())
    }
}
