use std::collections::HashMap;

use crate::config::Lba;
use crate::page_store::PhysicalAddress;

/// Logical-to-physical table. The LBA domain is sparse, so entries live in a
/// hash map instead of a dense vector indexed by LBA.
#[derive(Debug, Default, Clone)]
pub struct AddressMap {
    l2p: HashMap<Lba, PhysicalAddress>,
}

impl AddressMap {
    pub fn new() -> Self {
        AddressMap::default()
    }

    pub fn lookup(&self, lba: Lba) -> Option<PhysicalAddress> {
        self.l2p.get(&lba).copied()
    }

    /// Installs `addr` for `lba` and hands back the address it replaced. The
    /// caller owns invalidating that page before releasing the device lock.
    pub fn set(&mut self, lba: Lba, addr: PhysicalAddress) -> Option<PhysicalAddress> {
        self.l2p.insert(lba, addr)
    }

    pub fn remove(&mut self, lba: Lba) -> Option<PhysicalAddress> {
        self.l2p.remove(&lba)
    }

    pub fn contains(&self, lba: Lba) -> bool {
        self.l2p.contains_key(&lba)
    }

    pub fn len(&self) -> usize {
        self.l2p.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l2p.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lba, PhysicalAddress)> + '_ {
        self.l2p.iter().map(|(&lba, &addr)| (lba, addr))
    }
}
