use std::fmt;

use crate::serializer::{BlockToken, Serializer};
use crate::types::{BlockId, BlockSequenceId};
use super::info::CheckingInfo;

/// Token of a `CheckingSerializer<S>`: the inner serializer's token plus
/// what the checking layer knew about the block when the token was made.
///
/// The inner token is owned by value, so a composite can never wrap a
/// missing token. Its `info` is never `Deleted`.
pub struct CheckingBlockToken<S: Serializer> {
    block_id: BlockId,
    info: CheckingInfo,
    inner: S::BlockToken,
}

impl<S: Serializer> CheckingBlockToken<S> {
    pub fn new(block_id: BlockId, info: CheckingInfo, inner: S::BlockToken) -> CheckingBlockToken<S> {
        assert!(!info.is_deleted(), "Checking token for {:?} wrapping deleted block info", block_id);
        CheckingBlockToken {
            block_id: block_id,
            info: info,
            inner: inner,
        }
    }

    /// A composite with nothing to verify against.
    pub fn unverified(block_id: BlockId, inner: S::BlockToken) -> CheckingBlockToken<S> {
        CheckingBlockToken::new(block_id, CheckingInfo::default(), inner)
    }

    pub fn info(&self) -> CheckingInfo {
        self.info
    }

    pub fn inner(&self) -> &S::BlockToken {
        &self.inner
    }

    pub fn into_inner(self) -> S::BlockToken {
        self.inner
    }
}

impl<S: Serializer> Clone for CheckingBlockToken<S> {
    fn clone(&self) -> Self {
        CheckingBlockToken {
            block_id: self.block_id,
            info: self.info,
            inner: self.inner.clone(),
        }
    }
}

impl<S: Serializer> fmt::Debug for CheckingBlockToken<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CheckingBlockToken")
            .field("block_id", &self.block_id)
            .field("info", &self.info)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<S: Serializer> PartialEq for CheckingBlockToken<S> where S::BlockToken: PartialEq {
    fn eq(&self, other: &CheckingBlockToken<S>) -> bool {
        self.block_id == other.block_id && self.info == other.info && self.inner == other.inner
    }
}

impl<S: Serializer> BlockToken for CheckingBlockToken<S> {
    fn block_sequence_id(&self) -> BlockSequenceId {
        self.inner.block_sequence_id()
    }

    fn block_id(&self) -> BlockId {
        self.block_id
    }
}
