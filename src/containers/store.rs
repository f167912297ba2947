use crate::{
    containers::info::TxInfo,
    model::{ArcTx, TxId, TxStatus},
};
use std::collections::{HashMap, HashSet};

/// Pool usage snapshot. `total` excludes the invalid cache, which does not
/// count toward the storage limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub unverified: usize,
    pub pending: usize,
    pub ready: usize,
    pub invalid: usize,
    pub total: usize,
}

/// The partitioned pool state: three id-indexed transaction lists, the
/// negative cache of known-invalid ids, and the broadcast outbox.
///
/// The lists are kept pairwise disjoint by the pool; the store itself only
/// guarantees idempotent insertion per list and no-op removal on miss.
#[derive(Debug, Default)]
pub struct PoolStore {
    unverified: HashMap<TxId, TxInfo>,
    pending: HashMap<TxId, TxInfo>,
    ready: HashMap<TxId, TxInfo>,
    invalid: HashSet<TxId>,
    outbox: Vec<ArcTx>,
}

impl PoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, status: TxStatus) -> &HashMap<TxId, TxInfo> {
        match status {
            TxStatus::Unverified => &self.unverified,
            TxStatus::Pending => &self.pending,
            TxStatus::Ready => &self.ready,
        }
    }

    fn list_mut(&mut self, status: TxStatus) -> &mut HashMap<TxId, TxInfo> {
        match status {
            TxStatus::Unverified => &mut self.unverified,
            TxStatus::Pending => &mut self.pending,
            TxStatus::Ready => &mut self.ready,
        }
    }

    /// Insert into a list. Returns false if the id was already present there;
    /// the existing entry is kept.
    pub fn insert(&mut self, status: TxStatus, info: TxInfo) -> bool {
        let id = info.tx().id.clone();
        let list = self.list_mut(status);
        if list.contains_key(&id) {
            return false;
        }
        list.insert(id, info);
        true
    }

    /// Remove from a list. No-op on miss.
    pub fn remove(&mut self, status: TxStatus, id: &str) -> Option<TxInfo> {
        self.list_mut(status).remove(id)
    }

    pub fn get(&self, status: TxStatus, id: &str) -> Option<&TxInfo> {
        self.list(status).get(id)
    }

    pub fn get_mut(&mut self, status: TxStatus, id: &str) -> Option<&mut TxInfo> {
        self.list_mut(status).get_mut(id)
    }

    /// True if the id is held by any of the three transaction lists.
    pub fn contains(&self, id: &str) -> bool {
        self.unverified.contains_key(id)
            || self.pending.contains_key(id)
            || self.ready.contains_key(id)
    }

    /// Scan unverified, then pending, then ready; first hit wins.
    pub fn find(&self, id: &str) -> Option<(&TxInfo, TxStatus)> {
        for status in [TxStatus::Unverified, TxStatus::Pending, TxStatus::Ready] {
            if let Some(info) = self.list(status).get(id) {
                return Some((info, status));
            }
        }
        None
    }

    /// Number of transactions across the three lists.
    pub fn count(&self) -> usize {
        self.unverified.len() + self.pending.len() + self.ready.len()
    }

    pub fn iter(&self, status: TxStatus) -> impl Iterator<Item = &TxInfo> {
        self.list(status).values()
    }

    pub fn invalidate(&mut self, id: TxId) -> bool {
        self.invalid.insert(id)
    }

    pub fn is_invalid(&self, id: &str) -> bool {
        self.invalid.contains(id)
    }

    /// Drop the whole negative cache, returning how many ids it held.
    pub fn clear_invalid(&mut self) -> usize {
        let cleared = self.invalid.len();
        self.invalid.clear();
        cleared
    }

    pub fn push_outbox(&mut self, tx: ArcTx) {
        self.outbox.push(tx);
    }

    pub fn drain_outbox(&mut self) -> Vec<ArcTx> {
        std::mem::take(&mut self.outbox)
    }

    pub fn usage(&self) -> PoolUsage {
        PoolUsage {
            unverified: self.unverified.len(),
            pending: self.pending.len(),
            ready: self.ready.len(),
            invalid: self.invalid.len(),
            total: self.count(),
        }
    }
}
