//! A serializer that wraps another one and checks, on every read, that
//! the bytes coming back are the bytes that were written. Meant for test
//! and diagnostic builds; the wrapped serializer doesn't know it's there.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Result, SerializerError};
use crate::buffer::IoBuf;
use crate::serializer::{BlockToken, ReadAheadCallback, Serializer};
use crate::types::{BlockId, BlockSize, CreationTimestamp};

mod info;
mod token;

pub use self::info::{compute_crc, CheckingInfo};
pub use self::token::CheckingBlockToken;


/// Records are kept for every block ever written, deleted ones included,
/// so the map only grows. Fine for the test and diagnostic builds this
/// serializer is meant for.
pub struct CheckingSerializer<S: Serializer> {
    inner: S,
    blocks: Mutex<HashMap<BlockId, CheckingInfo>>,
}

impl<S: Serializer> CheckingSerializer<S> {
    pub fn new(inner: S) -> CheckingSerializer<S> {
        CheckingSerializer {
            inner: inner,
            blocks: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// What is known about `block_id`; `Unknown` for blocks never written
    /// through this serializer.
    pub fn block_info(&self, block_id: BlockId) -> CheckingInfo {
        self.blocks().get(&block_id).cloned().unwrap_or_default()
    }

    fn blocks(&self) -> MutexGuard<HashMap<BlockId, CheckingInfo>> {
        self.blocks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S: Serializer> Serializer for CheckingSerializer<S> {
    type BlockToken = CheckingBlockToken<S>;

    fn block_size(&self) -> BlockSize {
        self.inner.block_size()
    }

    fn creation_timestamp(&self) -> CreationTimestamp {
        self.inner.creation_timestamp()
    }

    fn malloc(&self) -> IoBuf {
        self.inner.malloc()
    }

    fn free(&self, buf: IoBuf) {
        self.inner.free(buf)
    }

    fn write(&self, block_id: BlockId, data: &[u8]) -> Result<CheckingBlockToken<S>> {
        let inner_token = self.inner.write(block_id, data)?;
        let info = CheckingInfo::for_data(data);
        self.blocks().insert(block_id, info);
        Ok(CheckingBlockToken::new(block_id, info, inner_token))
    }

    fn read_using_token(&self, token: &CheckingBlockToken<S>) -> Result<IoBuf> {
        // A token made before a delete still pins its extent and stays
        // readable; only what the token itself carries decides the check.
        let block_id = token.block_id();
        let expected = match token.info() {
            CheckingInfo::Unknown => None,
            CheckingInfo::HaveCrc(crc) => Some(crc),
            CheckingInfo::Deleted => panic!("Reading {:?} through a token of a deleted block", block_id),
        };

        let buf = self.inner.read_using_token(token.inner())?;
        if let Some(expected) = expected {
            let actual = compute_crc(&buf);
            if actual != expected {
                error!("checksum mismatch reading {:?}: expected {:#010x}, found {:#010x}", block_id, expected, actual);
                self.inner.free(buf);
                return Err(SerializerError::Corruption {
                    block_id: block_id,
                    expected: expected,
                    actual: actual,
                });
            }
        }
        Ok(buf)
    }

    fn index_read(&self, block_id: BlockId) -> Option<CheckingBlockToken<S>> {
        self.inner.index_read(block_id).map(|inner_token| {
            let info = match self.block_info(block_id) {
                CheckingInfo::Deleted => CheckingInfo::Unknown,
                known => known,
            };
            CheckingBlockToken::new(block_id, info, inner_token)
        })
    }

    fn delete(&self, block_id: BlockId) {
        {
            let mut blocks = self.blocks();
            let mut info = blocks.get(&block_id).cloned().unwrap_or_default();
            info.mark_deleted();
            blocks.insert(block_id, info);
        }
        self.inner.delete(block_id);
    }

    fn register_read_ahead_cb(&self, cb: Arc<dyn ReadAheadCallback>) {
        self.inner.register_read_ahead_cb(cb)
    }

    fn unregister_read_ahead_cb(&self, cb: &Arc<dyn ReadAheadCallback>) {
        self.inner.unregister_read_ahead_cb(cb)
    }
}
