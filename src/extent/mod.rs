use std::fmt;
use std::ops::Bound;
use std::collections::{BTreeMap, LinkedList};
use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::{BlockId, BlockSequenceId, RepliTimestamp};

#[cfg(test)]
mod tests;

/// Where one written copy of a block lives in the log.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExtentInfo {
    pub offset: u64,
    pub block_id: BlockId,
    pub sequence: BlockSequenceId,
    pub recency: RepliTimestamp,
}

/// LsBlockToken is the only way to read a written extent back.
/// It is returned by `ExtentPool::alloc`, and will automatically
/// retain/release the extent when cloned/dropped. While any token for an
/// extent is alive, the compactor must leave the extent alone.
pub struct LsBlockToken {
    pool: Arc<ExtentPool>,
    index: usize,
}

/// Public functions
impl LsBlockToken {
    pub fn offset(&self) -> u64 {
        self.info().offset
    }

    /// NULL_BLOCK_ID if the extent is not associated with a block.
    pub fn block_id(&self) -> BlockId {
        self.info().block_id
    }

    pub fn block_sequence_id(&self) -> BlockSequenceId {
        self.info().sequence
    }

    pub fn recency(&self) -> RepliTimestamp {
        self.info().recency
    }

    pub fn ref_count(&self) -> usize {
        self.pool.ref_count(self.index)
    }
}

/// Internal functions
impl LsBlockToken {
    fn new(index: usize, pool: &Arc<ExtentPool>) -> LsBlockToken {
        LsBlockToken {
            pool: pool.clone(),
            index: index,
        }
    }

    fn info(&self) -> ExtentInfo {
        self.pool.info(self.index)
    }

    pub(crate) fn minted_by(&self, pool: &Arc<ExtentPool>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl Drop for LsBlockToken {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

impl Clone for LsBlockToken {
    fn clone(&self) -> Self {
        self.pool.retain(self.index);
        LsBlockToken {
            pool: self.pool.clone(),
            index: self.index,
        }
    }
}

impl fmt::Debug for LsBlockToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LsBlockToken{{ slot: {:?}, ref_count: {:?} }}", self.index, self.ref_count())
    }
}

impl PartialEq for LsBlockToken {
    fn eq(&self, other: &LsBlockToken) -> bool {
        self.index == other.index && Arc::ptr_eq(&self.pool, &other.pool)
    }
}

impl Eq for LsBlockToken {}

/// The extent table of a log serializer. Every written extent gets a
/// slot with a reference count. When the count drops to zero the slot is
/// queued as reclaimable; the compactor drains that queue and the slot is
/// recycled for a later write.
///
/// Lock order is `slots` before `by_offset`.
pub struct ExtentPool {
    slots: RwLock<Vec<SlotHeader>>,
    // Offset of every occupied slot's extent, in log order
    by_offset: RwLock<BTreeMap<u64, usize>>,
    free_list: Mutex<LinkedList<usize>>,
    reclaimable: Mutex<LinkedList<usize>>,
    live: AtomicUsize,
}

struct SlotHeader {
    ref_count: AtomicUsize,
    // None once the compactor reclaimed the extent
    extent: Option<ExtentInfo>,
}

/// Public interface
impl ExtentPool {
    pub fn new() -> ExtentPool {
        ExtentPool {
            slots: RwLock::new(Vec::new()),
            by_offset: RwLock::new(BTreeMap::new()),
            free_list: Mutex::new(LinkedList::new()),
            reclaimable: Mutex::new(LinkedList::new()),
            live: AtomicUsize::new(0),
        }
    }

    /// Register a freshly written extent. The returned token holds the
    /// only reference.
    pub fn alloc(pool: &Arc<ExtentPool>, extent: ExtentInfo) -> LsBlockToken {
        let index = pool.internal_alloc(extent);
        LsBlockToken::new(index, pool)
    }

    // Increase the ref count for the slot at the given index
    pub fn retain(&self, index: usize) {
        let slots = read_lock(&self.slots);
        let old = slots[index].ref_count.fetch_add(1, Ordering::Relaxed);
        assert!(old > 0, "Retain called on [{}] which has no refs!", index);
    }

    // Decrease the ref count for the slot at the given index
    pub fn release(&self, index: usize) {
        let mut is_free = false;
        { // Drop the slot lock before touching the queue
            let slots = read_lock(&self.slots);
            let h = &slots[index];
            loop {
                let old = h.ref_count.load(Ordering::Acquire);
                assert!(old > 0, "Release called on [{}] which has no refs!", index);

                if h.ref_count
                    .compare_exchange(old, old - 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok() {
                    if old == 1 { // this was the last reference
                        is_free = true;
                    }
                    break
                }
            }
            if is_free {
                if let Some(ref extent) = h.extent {
                    trace!("extent at offset {} ({:?}) is now reclaimable", extent.offset, extent.block_id);
                }
            }
        }
        if is_free {
            self.live.fetch_sub(1, Ordering::Relaxed);
            lock(&self.reclaimable).push_back(index);
        }
    }

    /// Hand every extent that lost its last token since the previous call
    /// to the compactor. Their slots become available for new writes.
    pub fn drain_reclaimable(&self) -> Vec<ExtentInfo> {
        let queued: Vec<usize> = {
            let mut reclaimable = lock(&self.reclaimable);
            let drained = reclaimable.iter().cloned().collect();
            reclaimable.clear();
            drained
        };
        let mut reclaimed = Vec::with_capacity(queued.len());
        {
            let mut slots = write_lock(&self.slots);
            let mut by_offset = write_lock(&self.by_offset);
            for &index in &queued {
                let slot = &mut slots[index];
                assert_eq!(0, slot.ref_count.load(Ordering::Acquire),
                           "Reclaiming [{}] which is still referenced!", index);
                match slot.extent.take() {
                    Some(extent) => {
                        by_offset.remove(&extent.offset);
                        reclaimed.push(extent);
                    }
                    None => panic!("Slot [{}] was reclaimed twice!", index),
                }
            }
        }
        {
            let mut free_list = lock(&self.free_list);
            for index in queued {
                free_list.push_back(index);
            }
        }
        debug!("reclaimed {} extents", reclaimed.len());
        reclaimed
    }

    /// Whether some token still pins the extent written at `offset`.
    pub fn is_live(&self, offset: u64) -> bool {
        let slots = read_lock(&self.slots);
        let by_offset = read_lock(&self.by_offset);
        by_offset.get(&offset).map_or(false, |&index| live_extent(&slots[index]).is_some())
    }

    /// Returns the number of live extents. O(1) running time.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Extents that have been written, in log order, whose slots are
    /// still occupied.
    pub fn extents_after(&self, offset: u64, limit: usize) -> Vec<ExtentInfo> {
        if limit == 0 {
            return Vec::new();
        }
        let slots = read_lock(&self.slots);
        let by_offset = read_lock(&self.by_offset);
        by_offset.range((Bound::Excluded(offset), Bound::Unbounded))
            .filter_map(|(_, &index)| live_extent(&slots[index]))
            .take(limit)
            .collect()
    }
}

/// Internal Functions
impl ExtentPool {
    // Claims a slot, from the free list if possible, with a ref count of one
    fn internal_alloc(&self, extent: ExtentInfo) -> usize {
        let recycled = lock(&self.free_list).pop_front();
        let mut slots = write_lock(&self.slots);
        let mut by_offset = write_lock(&self.by_offset);
        let index = match recycled {
            Some(i) => {
                let slot = &mut slots[i];
                assert_eq!(0, slot.ref_count.load(Ordering::Acquire));
                slot.extent = Some(extent);
                slot.ref_count.store(1, Ordering::Release);
                i
            }
            None => {
                slots.push(SlotHeader {
                    ref_count: AtomicUsize::new(1),
                    extent: Some(extent),
                });
                slots.len() - 1
            }
        };
        let previous = by_offset.insert(extent.offset, index);
        assert!(previous.is_none(), "Two live extents at offset {}!", extent.offset);
        self.live.fetch_add(1, Ordering::Relaxed);
        index
    }

    fn info(&self, index: usize) -> ExtentInfo {
        match read_lock(&self.slots)[index].extent {
            Some(extent) => extent,
            None => panic!("Slot [{}] was reclaimed while a token still refers to it!", index),
        }
    }

    fn ref_count(&self, index: usize) -> usize {
        read_lock(&self.slots)[index].ref_count.load(Ordering::Relaxed)
    }
}

// The extent in `slot`, if some token still pins it
fn live_extent(slot: &SlotHeader) -> Option<ExtentInfo> {
    if slot.ref_count.load(Ordering::Acquire) > 0 {
        slot.extent
    } else {
        None
    }
}

// A poisoned lock means a thread panicked on an invariant violation, the
// table itself is still consistent.
fn lock<T>(m: &Mutex<T>) -> ::std::sync::MutexGuard<T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read_lock<T>(l: &RwLock<T>) -> ::std::sync::RwLockReadGuard<T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(l: &RwLock<T>) -> ::std::sync::RwLockWriteGuard<T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}
