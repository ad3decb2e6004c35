use std::fmt::Debug;
use std::sync::Arc;

use crate::Result;
use crate::buffer::IoBuf;
use crate::types::{BlockId, BlockSequenceId, BlockSize, CreationTimestamp, RepliTimestamp};

/// A handle to one physical placement of a block's data.
///
/// Tokens are shared by cloning; the placement stays pinned until the
/// last clone is dropped. Only a serializer mints them.
pub trait BlockToken: Clone + Debug + Send + Sync {
    /// The sequence id the placement was written with.
    fn block_sequence_id(&self) -> BlockSequenceId;

    /// NULL_BLOCK_ID if the placement is not associated with a block.
    fn block_id(&self) -> BlockId;
}

/// Answer to a read-ahead offer.
#[derive(Debug)]
pub enum ReadAheadOffer {
    /// The callee keeps the buffer and must release it through `free` of
    /// the serializer that offered it.
    Accepted,
    /// The buffer goes back to the caller, which releases it.
    Declined(IoBuf),
}

/// Receives blocks a serializer read speculatively. Every offer is
/// independent; a callback may take some buffers and decline others.
pub trait ReadAheadCallback: Send + Sync {
    fn offer_read_ahead_buf(&self, block_id: BlockId, buf: IoBuf, recency_timestamp: RepliTimestamp) -> ReadAheadOffer;
}

/// What every block store, real or decorating, provides.
///
/// Writes to the same block id must be serialized by the caller. Racing
/// writes, to any blocks, still get distinct and increasing sequence ids.
pub trait Serializer: Send + Sync {
    type BlockToken: BlockToken;

    fn block_size(&self) -> BlockSize;

    fn creation_timestamp(&self) -> CreationTimestamp;

    /// A zeroed buffer of one logical block.
    fn malloc(&self) -> IoBuf;

    fn free(&self, buf: IoBuf);

    /// Places `data` (exactly one logical block) in the log and makes it
    /// the current copy of `block_id`.
    fn write(&self, block_id: BlockId, data: &[u8]) -> Result<Self::BlockToken>;

    /// Reads back the exact placement `token` refers to.
    fn read_using_token(&self, token: &Self::BlockToken) -> Result<IoBuf>;

    /// The current placement of `block_id`, if it has one.
    fn index_read(&self, block_id: BlockId) -> Option<Self::BlockToken>;

    /// Forgets the current placement of `block_id`. Tokens handed out
    /// earlier keep their extents pinned.
    fn delete(&self, block_id: BlockId);

    fn register_read_ahead_cb(&self, cb: Arc<dyn ReadAheadCallback>);

    fn unregister_read_ahead_cb(&self, cb: &Arc<dyn ReadAheadCallback>);
}
