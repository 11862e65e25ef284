use std::fmt;

use log::*;
use num_integer::Integer;

use crate::config::{BlockId, Counter, Lba, PageId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalAddress {
    pub block: BlockId,
    pub page: PageId,
}

impl PhysicalAddress {
    pub fn new(block: BlockId, page: PageId) -> Self {
        PhysicalAddress { block, page }
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Free,
    Valid,
    Stale,
}

#[derive(Debug, Clone)]
pub struct PhysicalPage {
    state: PageState,
    data: Vec<u8>,
    // spare-area tag: LBA this page was programmed for
    owner: Option<Lba>,
}

impl PhysicalPage {
    fn erased() -> Self {
        PhysicalPage {
            state: PageState::Free,
            data: Vec::new(),
            owner: None,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn owner(&self) -> Option<Lba> {
        self.owner
    }
}

/// Erase unit. Pages are programmed strictly in order, so every page at or
/// past `cursor` is free.
#[derive(Debug, Clone)]
pub struct Block {
    pages: Vec<PhysicalPage>,
    cursor: PageId, // points to the next page to program
    valid_counter: Counter,
    stale_counter: Counter,
    erase_counter: Counter,
}

impl Block {
    fn new(pages_per_block: usize) -> Self {
        Block {
            pages: vec![PhysicalPage::erased(); pages_per_block],
            cursor: 0,
            valid_counter: 0,
            stale_counter: 0,
            erase_counter: 0,
        }
    }

    pub fn pages(&self) -> &[PhysicalPage] {
        &self.pages
    }

    pub fn erase_count(&self) -> Counter {
        self.erase_counter
    }

    pub fn valid_pages(&self) -> Counter {
        self.valid_counter
    }

    pub fn stale_pages(&self) -> Counter {
        self.stale_counter
    }

    pub fn free_pages(&self) -> Counter {
        self.pages.len() - self.cursor
    }

    /// Next page that may be programmed, if any.
    pub fn next_free_page(&self) -> Option<PageId> {
        (self.cursor < self.pages.len()).then_some(self.cursor)
    }

    pub fn is_erased(&self) -> bool {
        self.cursor == 0
    }

    pub fn full(&self) -> bool {
        self.cursor == self.pages.len()
    }

    fn erase(&mut self) {
        for page in self.pages.iter_mut() {
            *page = PhysicalPage::erased();
        }
        self.cursor = 0;
        self.valid_counter = 0;
        self.stale_counter = 0;
        self.erase_counter += 1;
    }
}

/// Passive model of the flash array: page states, payloads and erase
/// counts. Never decides anything on its own.
#[derive(Debug, Clone)]
pub struct PageStore {
    blocks: Vec<Block>,
    pages_per_block: usize,
    free_pages: Counter,
    valid_pages: Counter,
    stale_pages: Counter,
}

impl PageStore {
    pub fn new(total_blocks: usize, pages_per_block: usize) -> Self {
        PageStore {
            blocks: (0..total_blocks).map(|_| Block::new(pages_per_block)).collect(),
            pages_per_block,
            free_pages: total_blocks * pages_per_block,
            valid_pages: 0,
            stale_pages: 0,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    pub fn total_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn pages_per_block(&self) -> usize {
        self.pages_per_block
    }

    pub fn total_pages(&self) -> usize {
        self.blocks.len() * self.pages_per_block
    }

    pub fn free_pages(&self) -> Counter {
        self.free_pages
    }

    pub fn valid_pages(&self) -> Counter {
        self.valid_pages
    }

    pub fn stale_pages(&self) -> Counter {
        self.stale_pages
    }

    /// Maps a flat page number onto its block and page.
    pub fn address_of(&self, flat: usize) -> PhysicalAddress {
        let (block, page) = flat.div_rem(&self.pages_per_block);
        PhysicalAddress::new(block, page)
    }

    pub fn page(&self, addr: PhysicalAddress) -> &PhysicalPage {
        &self.blocks[addr.block].pages[addr.page]
    }

    pub fn state(&self, addr: PhysicalAddress) -> PageState {
        self.page(addr).state
    }

    /// First programmable page in block order.
    pub fn allocate_free_page(&self) -> Result<PhysicalAddress> {
        self.blocks
            .iter()
            .enumerate()
            .find_map(|(id, blk)| blk.next_free_page().map(|page| PhysicalAddress::new(id, page)))
            .ok_or(Error::Exhausted)
    }

    /// Programs `data` for `lba` into a free page. Pages inside a block must
    /// be programmed in order.
    pub fn mark_valid(&mut self, addr: PhysicalAddress, lba: Lba, data: &[u8]) -> Result<()> {
        let blk = &mut self.blocks[addr.block];
        if blk.cursor != addr.page || blk.pages[addr.page].state != PageState::Free {
            return Err(Error::PageNotFree(addr));
        }

        let page = &mut blk.pages[addr.page];
        page.state = PageState::Valid;
        page.data = data.to_vec();
        page.owner = Some(lba);

        blk.cursor += 1;
        blk.valid_counter += 1;
        self.free_pages -= 1;
        self.valid_pages += 1;

        Ok(())
    }

    /// Invalidates a page. Only valid pages can go stale.
    pub fn mark_stale(&mut self, addr: PhysicalAddress) {
        let blk = &mut self.blocks[addr.block];
        let page = &mut blk.pages[addr.page];
        debug_assert_eq!(page.state, PageState::Valid, "stale mark on non-valid page {}", addr);
        if page.state != PageState::Valid {
            warn!("Ignoring stale mark on {:?} page {}", page.state, addr);
            return;
        }

        page.state = PageState::Stale;
        blk.valid_counter -= 1;
        blk.stale_counter += 1;
        self.valid_pages -= 1;
        self.stale_pages += 1;
    }

    pub fn erase_block(&mut self, block: BlockId) -> Result<()> {
        let blk = &mut self.blocks[block];
        if blk.valid_counter != 0 {
            return Err(Error::NotErasable(block));
        }

        let programmed = blk.cursor;
        self.stale_pages -= blk.stale_counter;
        self.free_pages += programmed;
        blk.erase();

        debug!("Erased block {}, erase count {}", block, blk.erase_counter);
        Ok(())
    }

    pub fn erase_counts(&self) -> Vec<Counter> {
        self.blocks.iter().map(Block::erase_count).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_store_is_all_free() {
        let store = PageStore::new(3, 4);
        assert_eq!(store.total_pages(), 12);
        assert_eq!(store.free_pages(), 12);
        assert_eq!(store.valid_pages(), 0);
        assert_eq!(store.allocate_free_page(), Ok(PhysicalAddress::new(0, 0)));
        assert_eq!(store.erase_counts(), vec![0, 0, 0]);
    }

    #[test]
    fn program_advances_cursor() {
        let mut store = PageStore::new(2, 2);
        store.mark_valid(PhysicalAddress::new(0, 0), 10, b"a").unwrap();
        assert_eq!(store.allocate_free_page(), Ok(PhysicalAddress::new(0, 1)));
        store.mark_valid(PhysicalAddress::new(0, 1), 11, b"b").unwrap();
        assert_eq!(store.allocate_free_page(), Ok(PhysicalAddress::new(1, 0)));

        let page = store.page(PhysicalAddress::new(0, 1));
        assert_eq!(page.state(), PageState::Valid);
        assert_eq!(page.data(), b"b");
        assert_eq!(page.owner(), Some(11));
        assert!(store.block(0).full());
        assert_eq!(store.free_pages(), 2);
    }

    #[test]
    fn program_out_of_order_is_refused() {
        let mut store = PageStore::new(2, 4);
        let addr = PhysicalAddress::new(0, 2);
        assert_eq!(store.mark_valid(addr, 1, b"x"), Err(Error::PageNotFree(addr)));

        store.mark_valid(PhysicalAddress::new(0, 0), 1, b"x").unwrap();
        let again = PhysicalAddress::new(0, 0);
        assert_eq!(store.mark_valid(again, 2, b"y"), Err(Error::PageNotFree(again)));
    }

    #[test]
    fn exhausted_when_every_page_programmed() {
        let mut store = PageStore::new(2, 1);
        store.mark_valid(PhysicalAddress::new(0, 0), 0, b"").unwrap();
        store.mark_valid(PhysicalAddress::new(1, 0), 1, b"").unwrap();
        assert_eq!(store.allocate_free_page(), Err(Error::Exhausted));
    }

    #[test]
    fn erase_refused_while_valid_page_present() {
        let mut store = PageStore::new(2, 2);
        store.mark_valid(PhysicalAddress::new(0, 0), 1, b"x").unwrap();
        store.mark_valid(PhysicalAddress::new(0, 1), 2, b"y").unwrap();
        store.mark_stale(PhysicalAddress::new(0, 0));

        assert_eq!(store.erase_block(0), Err(Error::NotErasable(0)));
        assert_eq!(store.block(0).erase_count(), 0);
        assert_eq!(store.state(PhysicalAddress::new(0, 1)), PageState::Valid);
    }

    #[test]
    fn erase_frees_stale_pages_and_counts() {
        let mut store = PageStore::new(2, 2);
        store.mark_valid(PhysicalAddress::new(0, 0), 1, b"x").unwrap();
        store.mark_valid(PhysicalAddress::new(0, 1), 2, b"y").unwrap();
        store.mark_stale(PhysicalAddress::new(0, 0));
        store.mark_stale(PhysicalAddress::new(0, 1));
        assert_eq!(store.stale_pages(), 2);
        assert_eq!(store.free_pages(), 2);

        store.erase_block(0).unwrap();
        assert_eq!(store.stale_pages(), 0);
        assert_eq!(store.free_pages(), 4);
        assert!(store.block(0).is_erased());
        assert_eq!(store.block(0).erase_count(), 1);
        assert_eq!(store.state(PhysicalAddress::new(0, 0)), PageState::Free);
        assert_eq!(store.page(PhysicalAddress::new(0, 0)).owner(), None);
    }

    #[test]
    fn erase_of_partial_block_keeps_free_count_exact() {
        let mut store = PageStore::new(2, 4);
        store.mark_valid(PhysicalAddress::new(1, 0), 5, b"z").unwrap();
        store.mark_stale(PhysicalAddress::new(1, 0));

        store.erase_block(1).unwrap();
        assert_eq!(store.free_pages(), 8);
        assert_eq!(store.erase_counts(), vec![0, 1]);
    }

    #[test]
    fn flat_addresses_split_by_block() {
        let store = PageStore::new(4, 3);
        assert_eq!(store.address_of(0), PhysicalAddress::new(0, 0));
        assert_eq!(store.address_of(4), PhysicalAddress::new(1, 1));
        assert_eq!(store.address_of(11), PhysicalAddress::new(3, 2));
    }
}
