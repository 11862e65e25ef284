//! Page-mapped flash translation layer: out-of-place writes, greedy garbage
//! collection and wear-aware allocation over a simulated NAND array.

pub mod address_map;
pub mod config;
pub mod error;
pub mod ftl;
pub mod gc;
pub mod page_store;
pub mod policy;
pub mod stats;

pub use address_map::AddressMap;
pub use config::{BlockId, Counter, FtlConfig, Lba, PageId};
pub use error::{Error, Result};
pub use ftl::Ftl;
pub use gc::{GarbageCollector, Reclaim, ReclaimedBlock, VictimPolicy};
pub use page_store::{Block, PageState, PageStore, PhysicalAddress, PhysicalPage};
pub use policy::{AllocationPolicy, FirstFitPolicy, Stream, Target, WearLevelingPolicy};
pub use stats::FtlStats;
