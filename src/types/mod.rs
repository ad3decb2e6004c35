use std::fmt;

mod block_size;
mod timestamp;

pub use self::block_size::BlockSize;
pub use self::timestamp::{CreationTimestamp, RepliTimestamp};

/// Logical address of a block. Assigned by the layers above the
/// serializer, never generated here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

/// Marks "no block". Never a valid logical identifier.
pub const NULL_BLOCK_ID: BlockId = BlockId(!0u32);

impl BlockId {
    pub const fn new(id: u32) -> BlockId {
        BlockId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        *self == NULL_BLOCK_ID
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_null() {
            write!(f, "BlockId(NULL)")
        } else {
            write!(f, "BlockId({})", self.0)
        }
    }
}

/// Each time a block is written it receives a new, unique sequence id.
/// Ids are ordered across all blocks of a store, so the highest id of a
/// block identifies its current copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BlockSequenceId(u64);

pub const NULL_BLOCK_SEQUENCE_ID: BlockSequenceId = BlockSequenceId(0);
pub const FIRST_BLOCK_SEQUENCE_ID: BlockSequenceId = BlockSequenceId(1);

impl BlockSequenceId {
    pub const fn new(value: u64) -> BlockSequenceId {
        BlockSequenceId(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        *self == NULL_BLOCK_SEQUENCE_ID
    }

    /// The id following this one. The successor of NULL is FIRST.
    pub fn next(&self) -> BlockSequenceId {
        BlockSequenceId(self.0 + 1)
    }
}

#[test]
fn null_block_id_is_all_ones() {
    assert_eq!(0xffff_ffff, NULL_BLOCK_ID.value());
    assert!(NULL_BLOCK_ID.is_null());
    assert!(!BlockId::new(0).is_null());
    assert_eq!("BlockId(NULL)", format!("{:?}", NULL_BLOCK_ID));
    assert_eq!("BlockId(17)", format!("{:?}", BlockId::new(17)));
}

#[test]
fn sequence_ids_start_after_null() {
    assert!(NULL_BLOCK_SEQUENCE_ID.is_null());
    assert_eq!(FIRST_BLOCK_SEQUENCE_ID, NULL_BLOCK_SEQUENCE_ID.next());
    assert!(FIRST_BLOCK_SEQUENCE_ID < FIRST_BLOCK_SEQUENCE_ID.next());
    assert_eq!(1, FIRST_BLOCK_SEQUENCE_ID.value());
}
