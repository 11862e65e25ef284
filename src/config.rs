use byte_unit::Byte;
use log::*;

use crate::error::{Error, Result};

pub type BaseType = usize;

pub type Lba = u64;
pub type PageId = BaseType;
pub type BlockId = BaseType;
pub type Counter = BaseType;

pub const BLOCKS: BaseType = 256;
pub const PAGES_PER_BLOCK: BaseType = 64;

pub const PAGE_SIZE: BaseType = 4096;

/// Default GC reserve: one block's worth of pages.
pub const GC_WATERMARK_PAGES: BaseType = PAGES_PER_BLOCK;

pub const ALL_PAGES: BaseType = BLOCKS * PAGES_PER_BLOCK;

pub const CAPACITY: usize = ALL_PAGES * PAGE_SIZE;

/// Device geometry and GC policy knobs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtlConfig {
    pub total_blocks: BaseType,
    pub pages_per_block: BaseType,
    /// Free pages held back from the host for GC relocation.
    pub gc_watermark_pages: BaseType,
    pub page_size_bytes: BaseType,
    /// Cap on live LBAs. `None` means everything outside the GC reserve.
    pub logical_pages: Option<BaseType>,
}

impl Default for FtlConfig {
    fn default() -> Self {
        FtlConfig::new(BLOCKS, PAGES_PER_BLOCK, GC_WATERMARK_PAGES, PAGE_SIZE)
    }
}

impl FtlConfig {
    pub fn new(
        total_blocks: BaseType,
        pages_per_block: BaseType,
        gc_watermark_pages: BaseType,
        page_size_bytes: BaseType,
    ) -> Self {
        FtlConfig {
            total_blocks,
            pages_per_block,
            gc_watermark_pages,
            page_size_bytes,
            logical_pages: None,
        }
    }

    /// Hides `op` percent of the physical pages from the host.
    pub fn with_over_provisioning(mut self, op: f64) -> Self {
        let op_pages = (self.total_pages() as f64 * (op / 100.)).trunc() as BaseType;
        let logical = self.total_pages().saturating_sub(op_pages);

        trace!("ALL_PAGES: {}", self.total_pages());
        trace!("op_pages: {}", op_pages);

        self.logical_pages = Some(logical.min(self.max_logical_pages()));
        self
    }

    pub fn total_pages(&self) -> BaseType {
        self.total_blocks * self.pages_per_block
    }

    fn max_logical_pages(&self) -> BaseType {
        self.total_pages().saturating_sub(self.gc_watermark_pages)
    }

    /// Number of LBAs that may be live at once.
    pub fn logical_capacity(&self) -> BaseType {
        self.logical_pages.unwrap_or_else(|| self.max_logical_pages())
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_blocks == 0 || self.pages_per_block == 0 {
            return Err(Error::Config("geometry must have at least one page"));
        }
        if self.total_blocks < 2 {
            return Err(Error::Config("GC needs at least two blocks"));
        }
        if self.page_size_bytes == 0 {
            return Err(Error::Config("page size must be non-zero"));
        }
        if self.gc_watermark_pages == 0 {
            return Err(Error::Config("GC watermark must be at least one page"));
        }
        // a greedy victim holds at most pages_per_block - 1 valid pages
        if self.gc_watermark_pages < self.pages_per_block - 1 {
            return Err(Error::Config(
                "GC watermark must cover the valid pages of one victim block",
            ));
        }
        if self.gc_watermark_pages >= self.total_pages() {
            return Err(Error::Config("GC watermark leaves no logical capacity"));
        }
        let logical = self.logical_capacity();
        if logical == 0 {
            return Err(Error::Config("logical capacity must be non-zero"));
        }
        if logical > self.max_logical_pages() {
            return Err(Error::Config(
                "logical capacity overlaps the GC reserve",
            ));
        }

        Ok(())
    }

    pub(crate) fn log_geometry(&self) {
        let physical = self.total_pages() * self.page_size_bytes;
        let logical = self.logical_capacity() * self.page_size_bytes;

        trace!(
            "Geometry: {} blocks x {} pages x {} bytes, GC watermark {} pages",
            self.total_blocks,
            self.pages_per_block,
            self.page_size_bytes,
            self.gc_watermark_pages
        );
        trace!("Physical Capacity: {} bytes, {}", physical, Byte::from(physical).get_appropriate_unit(true).to_string());
        trace!("User Capacity: {} bytes, {}", logical, Byte::from(logical).get_appropriate_unit(true).to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_geometry_is_valid() {
        let cfg = FtlConfig::default();
        assert_eq!(cfg.total_pages(), ALL_PAGES);
        assert_eq!(cfg.logical_capacity(), ALL_PAGES - GC_WATERMARK_PAGES);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn over_provisioning_caps_live_lbas() {
        let cfg = FtlConfig::new(100, 10, 10, 512).with_over_provisioning(7.0);
        assert_eq!(cfg.logical_capacity(), 930);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn over_provisioning_never_eats_the_gc_reserve() {
        let cfg = FtlConfig::new(4, 4, 4, 512).with_over_provisioning(1.0);
        assert_eq!(cfg.logical_capacity(), 12);
    }

    #[test]
    fn rejects_watermark_below_one_victim() {
        let cfg = FtlConfig::new(8, 4, 2, 512);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_logical_capacity_without_headroom() {
        let cfg = FtlConfig::new(2, 2, 4, 512);
        assert!(cfg.validate().is_err());

        let mut cfg = FtlConfig::new(2, 2, 1, 512);
        cfg.logical_pages = Some(4);
        assert!(cfg.validate().is_err());

        cfg.logical_pages = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_geometry() {
        assert!(FtlConfig::new(0, 4, 3, 512).validate().is_err());
        assert!(FtlConfig::new(1, 4, 3, 512).validate().is_err());
        assert!(FtlConfig::new(4, 4, 3, 0).validate().is_err());
    }

    #[test]
    fn smallest_scenario_geometry_is_valid() {
        let cfg = FtlConfig::new(2, 2, 1, 16);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.logical_capacity(), 3);
    }
}
