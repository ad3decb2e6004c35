use super::*;
use std::thread;
use crate::types::{NULL_BLOCK_ID, FIRST_BLOCK_SEQUENCE_ID};

fn extent_at(offset: u64, id: u32) -> ExtentInfo {
    ExtentInfo {
        offset: offset,
        block_id: BlockId::new(id),
        sequence: BlockSequenceId::new(offset + 1),
        recency: RepliTimestamp::distant_past(),
    }
}

#[test]
fn release_queues_reclaimable() {
       let p = ExtentPool::new();

       // Use internal_alloc so that no token drops
       // the reference immediately
       let a = p.internal_alloc(extent_at(0, 1));
       let b = p.internal_alloc(extent_at(4096, 2));

       assert_eq!(2, p.live_count());

       p.release(a);
       assert_eq!(1, p.live_count());
       assert_eq!(1, p.reclaimable.lock().unwrap().len());
       assert_eq!(a, *p.reclaimable.lock().unwrap().front().unwrap());

       p.release(b);
       assert_eq!(0, p.live_count());
       assert_eq!(2, p.reclaimable.lock().unwrap().len());
}

#[test]
fn alloc_after_reclaim_recycles() {
       let p = ExtentPool::new();
       let a = p.internal_alloc(extent_at(0, 1));
       assert_eq!(1, p.slots.read().unwrap().len());

       p.release(a);
       assert_eq!(vec![extent_at(0, 1)], p.drain_reclaimable());
       assert_eq!(1, p.free_list.lock().unwrap().len());

       let b = p.internal_alloc(extent_at(8192, 3));
       assert_eq!(a, b);
       assert_eq!(1, p.slots.read().unwrap().len()); // Table shouldn't grow
       assert_eq!(1, p.live_count());
       assert_eq!(0, p.free_list.lock().unwrap().len());
       assert_eq!(8192, p.info(b).offset);
}

#[test]
fn unreleased_slots_are_not_recycled() {
       let p = ExtentPool::new();
       let a = p.internal_alloc(extent_at(0, 1));
       p.release(a);
       // Not drained yet, so the compactor hasn't seen it
       let b = p.internal_alloc(extent_at(4096, 2));
       assert!(a != b);
}

#[test]
fn token_clone() {
    let p = Arc::new(ExtentPool::new());
    {
        let t1 = ExtentPool::alloc(&p, extent_at(0, 7));
        assert_eq!(1, t1.ref_count());
        {
            let t1_c = t1.clone(); // Should bump the ref count
            assert_eq!(2, t1.ref_count());
            assert_eq!(2, t1_c.ref_count());
            assert_eq!(t1, t1_c);
        }
        // Now, the clone should have been dropped, but the extent is still pinned
        assert_eq!(1, t1.ref_count());
        assert!(p.is_live(0));
        assert_eq!(0, p.reclaimable.lock().unwrap().len());
    }
    // Now, t1 should have been dropped, and the extent is up for grabs
    assert!(!p.is_live(0));
    assert_eq!(1, p.reclaimable.lock().unwrap().len());
}

#[test]
fn token_drop() {
    let p = Arc::new(ExtentPool::new());
    {
        let t1 = ExtentPool::alloc(&p, extent_at(0, 1));
        {
            let t2 = ExtentPool::alloc(&p, extent_at(4096, 2));
            assert_eq!(1, t2.ref_count());
            assert!(t1 != t2);
        }
        // Now, t2 should have been dropped
        assert_eq!(vec![extent_at(4096, 2)], p.drain_reclaimable());
        assert_eq!(BlockId::new(1), t1.block_id());
    }
    // Now, t1 should have been dropped
    assert_eq!(vec![extent_at(0, 1)], p.drain_reclaimable());
    assert!(p.drain_reclaimable().is_empty());
}

#[test]
fn token_exposes_extent() {
    let p = Arc::new(ExtentPool::new());
    let t = ExtentPool::alloc(&p, ExtentInfo {
        offset: 12288,
        block_id: NULL_BLOCK_ID,
        sequence: FIRST_BLOCK_SEQUENCE_ID,
        recency: RepliTimestamp::from_secs(9),
    });
    assert_eq!(12288, t.offset());
    assert!(t.block_id().is_null());
    assert_eq!(FIRST_BLOCK_SEQUENCE_ID, t.block_sequence_id());
    assert_eq!(RepliTimestamp::from_secs(9), t.recency());
    assert!(t.minted_by(&p));
    assert!(!t.minted_by(&Arc::new(ExtentPool::new())));
}

#[test]
fn concurrent_clones_release_exactly_once() {
    let p = Arc::new(ExtentPool::new());
    let t = ExtentPool::alloc(&p, extent_at(0, 1));
    let handles: Vec<_> = (0..8).map(|_| {
        let t = t.clone();
        thread::spawn(move || {
            for _ in 0..1000 {
                let c = t.clone();
                drop(c);
            }
        })
    }).collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(1, t.ref_count());
    drop(t);
    assert_eq!(1, p.drain_reclaimable().len());
    assert_eq!(0, p.live_count());
}

#[test]
#[should_panic(expected = "has no refs")]
fn release_without_refs_panics() {
    let p = ExtentPool::new();
    let a = p.internal_alloc(extent_at(0, 1));
    p.release(a);
    p.release(a);
}

#[test]
#[should_panic(expected = "was reclaimed")]
fn resolving_a_reclaimed_slot_panics() {
    let p = ExtentPool::new();
    let a = p.internal_alloc(extent_at(0, 1));
    p.release(a);
    p.drain_reclaimable();
    p.info(a);
}

#[test]
fn extents_after_skips_dead_slots() {
    let p = Arc::new(ExtentPool::new());
    let _a = ExtentPool::alloc(&p, extent_at(0, 1));
    let b = ExtentPool::alloc(&p, extent_at(4096, 2));
    let _c = ExtentPool::alloc(&p, extent_at(8192, 3));
    let _d = ExtentPool::alloc(&p, extent_at(12288, 4));
    drop(b);
    let following: Vec<u64> = p.extents_after(0, 2).iter().map(|e| e.offset).collect();
    assert_eq!(vec![8192, 12288], following);
}

#[test]
fn offset_index_follows_recycled_slots() {
    let p = Arc::new(ExtentPool::new());
    let a = ExtentPool::alloc(&p, extent_at(0, 1));
    let _b = ExtentPool::alloc(&p, extent_at(4096, 2));
    drop(a);
    assert_eq!(vec![extent_at(0, 1)], p.drain_reclaimable());
    assert!(p.by_offset.read().unwrap().get(&0).is_none());

    // The recycled slot now holds an extent further down the log
    let _c = ExtentPool::alloc(&p, extent_at(8192, 3));
    assert_eq!(2, p.slots.read().unwrap().len());
    assert!(!p.is_live(0));
    assert!(p.is_live(8192));
    assert!(!p.is_live(12288));

    let following: Vec<u64> = p.extents_after(0, 8).iter().map(|e| e.offset).collect();
    assert_eq!(vec![4096, 8192], following);
    assert!(p.extents_after(0, 0).is_empty());
    assert!(p.extents_after(8192, 8).is_empty());
}
