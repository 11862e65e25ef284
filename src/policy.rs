//! Write-target selection. The FTL core only talks to [`AllocationPolicy`],
//! so the naive linear scan and the wear-aware allocator are interchangeable.

use log::*;

use crate::config::{BaseType, BlockId};
use crate::error::{Error, Result};
use crate::page_store::{PageState, PageStore, PhysicalAddress};

/// Who is asking for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Host,
    /// Relocation out of `victim`. Never answered with `NeedsGc` and never
    /// placed inside the victim itself.
    Gc { victim: BlockId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Page(PhysicalAddress),
    /// Free pages are at or below the watermark; reclaim before writing.
    NeedsGc,
}

pub trait AllocationPolicy {
    /// Free pages the host may not consume.
    fn gc_watermark(&self) -> BaseType;

    /// Picks the page the next program for `stream` goes to. Fails with
    /// `Error::Exhausted` when a GC request finds no page at all.
    fn next_write_target(&mut self, store: &PageStore, stream: Stream) -> Result<Target>;

    /// Called after `block` was erased.
    fn on_erase(&mut self, _block: BlockId) {}
}

fn host_must_wait(store: &PageStore, watermark: BaseType, stream: Stream) -> bool {
    stream == Stream::Host && store.free_pages() <= watermark
}

/// Separate open blocks for host and GC writes. New open blocks are taken
/// from erased blocks with the lowest erase count.
#[derive(Debug, Clone)]
pub struct WearLevelingPolicy {
    watermark: BaseType,
    host_open_block: Option<BlockId>,
    gc_open_block: Option<BlockId>,
}

impl WearLevelingPolicy {
    pub fn new(watermark: BaseType) -> Self {
        WearLevelingPolicy {
            watermark,
            host_open_block: None,
            gc_open_block: None,
        }
    }

    pub fn host_open_block(&self) -> Option<BlockId> {
        self.host_open_block
    }

    pub fn gc_open_block(&self) -> Option<BlockId> {
        self.gc_open_block
    }

    fn pick_block(store: &PageStore, exclude: &[Option<BlockId>]) -> Option<BlockId> {
        store
            .blocks()
            .iter()
            .enumerate()
            .filter(|(id, blk)| !blk.full() && !exclude.contains(&Some(*id)))
            // erased blocks first, then the least worn one
            .min_by_key(|(id, blk)| (!blk.is_erased(), blk.erase_count(), *id))
            .map(|(id, _)| id)
    }

    fn open_new_block(&self, store: &PageStore, stream: Stream) -> Option<BlockId> {
        let (other, victim) = match stream {
            Stream::Host => (self.gc_open_block, None),
            Stream::Gc { victim } => (self.host_open_block, Some(victim)),
        };

        // share the other stream's open block only as a last resort
        Self::pick_block(store, &[other, victim]).or_else(|| Self::pick_block(store, &[victim]))
    }
}

impl AllocationPolicy for WearLevelingPolicy {
    fn gc_watermark(&self) -> BaseType {
        self.watermark
    }

    fn next_write_target(&mut self, store: &PageStore, stream: Stream) -> Result<Target> {
        if host_must_wait(store, self.watermark, stream) {
            return Ok(Target::NeedsGc);
        }

        let (open, victim) = match stream {
            Stream::Host => (self.host_open_block, None),
            Stream::Gc { victim } => (self.gc_open_block, Some(victim)),
        };
        let current = open.filter(|&b| !store.block(b).full() && Some(b) != victim);

        let block = match current {
            Some(block) => block,
            None => {
                let block = self.open_new_block(store, stream).ok_or(Error::Exhausted)?;
                trace!(
                    "{:?} open block -> {} (erase count {})",
                    stream,
                    block,
                    store.block(block).erase_count()
                );
                match stream {
                    Stream::Host => self.host_open_block = Some(block),
                    Stream::Gc { .. } => self.gc_open_block = Some(block),
                }
                block
            }
        };

        let page = store.block(block).next_free_page().ok_or(Error::Exhausted)?;
        Ok(Target::Page(PhysicalAddress::new(block, page)))
    }

    fn on_erase(&mut self, block: BlockId) {
        if self.host_open_block == Some(block) {
            self.host_open_block = None;
        }
        if self.gc_open_block == Some(block) {
            self.gc_open_block = None;
        }
    }
}

/// Lowest free physical page in address order. Cheap, but concentrates
/// erases on the low blocks.
#[derive(Debug, Clone)]
pub struct FirstFitPolicy {
    watermark: BaseType,
}

impl FirstFitPolicy {
    pub fn new(watermark: BaseType) -> Self {
        FirstFitPolicy { watermark }
    }
}

impl AllocationPolicy for FirstFitPolicy {
    fn gc_watermark(&self) -> BaseType {
        self.watermark
    }

    fn next_write_target(&mut self, store: &PageStore, stream: Stream) -> Result<Target> {
        if host_must_wait(store, self.watermark, stream) {
            return Ok(Target::NeedsGc);
        }

        let victim = match stream {
            Stream::Gc { victim } => Some(victim),
            Stream::Host => None,
        };

        (0..store.total_pages())
            .map(|flat| store.address_of(flat))
            .find(|addr| Some(addr.block) != victim && store.state(*addr) == PageState::Free)
            .map(Target::Page)
            .ok_or(Error::Exhausted)
    }
}
