use thiserror::Error;

use crate::config::{BlockId, Lba};
use crate::page_store::PhysicalAddress;

/// FTL specialized Result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No free page for the host and nothing left to reclaim.
    #[error("device full")]
    DeviceFull,
    /// Read or trim of an LBA that has no mapping.
    #[error("LBA {0} not mapped")]
    NotFound(Lba),
    /// Erase attempted on a block that still holds a valid page.
    #[error("block {0} still holds valid pages and cannot be erased")]
    NotErasable(BlockId),
    /// The page store has no free page left anywhere.
    #[error("no free physical page")]
    Exhausted,
    /// Program attempted on a page that is not erased.
    #[error("physical page {0} is not free")]
    PageNotFree(PhysicalAddress),
    /// GC could not find room for a valid page of its victim.
    #[error("GC failed to relocate LBA {lba} out of block {block}")]
    GcRelocationFailed { block: BlockId, lba: Lba },
    /// A valid page and the address map disagree about ownership.
    #[error("address map does not match valid page {0}")]
    MappingCorrupted(PhysicalAddress),
    #[error("payload of {len} bytes exceeds page size of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("configuration error: {0}")]
    Config(&'static str),
    #[error("device state lock poisoned")]
    Poisoned,
}

impl Error {
    /// Internal invariant violations, as opposed to results the host is
    /// expected to handle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NotErasable(_)
                | Error::PageNotFree(_)
                | Error::GcRelocationFailed { .. }
                | Error::MappingCorrupted(_)
                | Error::Poisoned
        )
    }
}
