//! The plain log-structured serializer: every write appends a new extent
//! to the device, and a block's current copy is whatever its index entry
//! points at.
//!
//! Each extent is laid out as follows:
//! - [0..8]    sequence: u64 LE
//! - [8..12]   block_id: u32 LE
//! - [12..16]  reserved, zero
//! - remaining `logical_size` bytes are the block's payload

use std::{io, mem};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Result, SerializerError};
use crate::buffer::{BufferPool, IoBuf};
use crate::device::LogDevice;
use crate::extent::{ExtentInfo, ExtentPool, LsBlockToken};
use crate::serializer::{BlockToken, ReadAheadCallback, ReadAheadOffer, Serializer};
use crate::types::{BlockId, BlockSequenceId, BlockSize, CreationTimestamp, RepliTimestamp};
use crate::types::FIRST_BLOCK_SEQUENCE_ID;


pub const DEFAULT_BLOCK_SIZE: u64 = 4096;
pub const DEFAULT_READ_AHEAD_WINDOW: usize = 4;

#[repr(C)]
struct LsBufHeader {
    sequence: u64,
    block_id: u32,
    reserved: u32,
}

lazy_static! {
    /// Bytes at the start of every extent that are not block payload.
    pub static ref LS_HEADER_SIZE: u64 = mem::size_of::<LsBufHeader>() as u64;
}

impl LsBufHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&self.block_id.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
    }

    fn decode(buf: &[u8; 16]) -> LsBufHeader {
        let mut sequence = [0u8; 8];
        let mut block_id = [0u8; 4];
        let mut reserved = [0u8; 4];
        sequence.copy_from_slice(&buf[0..8]);
        block_id.copy_from_slice(&buf[8..12]);
        reserved.copy_from_slice(&buf[12..16]);
        LsBufHeader {
            sequence: u64::from_le_bytes(sequence),
            block_id: u32::from_le_bytes(block_id),
            reserved: u32::from_le_bytes(reserved),
        }
    }
}

// The logical size depends on the extent header, so it lives next to it.
impl BlockSize {
    /// The block size used by things above the serializer.
    pub fn logical_size(&self) -> u64 {
        self.physical_size().saturating_sub(*LS_HEADER_SIZE)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LogSerializerConfig {
    pub block_size: BlockSize,
    /// How many extents following a read are offered to read-ahead
    /// callbacks. Zero turns read-ahead off.
    pub read_ahead_window: usize,
}

impl Default for LogSerializerConfig {
    fn default() -> LogSerializerConfig {
        LogSerializerConfig {
            block_size: BlockSize::unsafe_make(DEFAULT_BLOCK_SIZE),
            read_ahead_window: DEFAULT_READ_AHEAD_WINDOW,
        }
    }
}

pub struct LogSerializer {
    device: Arc<dyn LogDevice>,
    config: LogSerializerConfig,
    extents: Arc<ExtentPool>,
    buffers: BufferPool,
    index: Mutex<HashMap<BlockId, LsBlockToken>>,
    // Held across the append so that log order and sequence order agree
    next_sequence: Mutex<BlockSequenceId>,
    read_ahead_cbs: Mutex<Vec<Arc<dyn ReadAheadCallback>>>,
    creation_timestamp: CreationTimestamp,
}

/// Public interface
impl LogSerializer {
    /// Opens the log on `device`. Extents already in the log are scanned
    /// only to continue their sequence ids; the block index starts empty.
    pub fn new(device: Arc<dyn LogDevice>, config: LogSerializerConfig) -> Result<LogSerializer> {
        assert!(config.block_size.physical_size() > *LS_HEADER_SIZE,
                "Block size {:?} leaves no room for payload", config.block_size);
        let next_sequence = Self::scan_next_sequence(&*device, config.block_size)?;
        debug!("opened log serializer, next sequence id {:?}", next_sequence);
        Ok(LogSerializer {
            device: device,
            config: config,
            extents: Arc::new(ExtentPool::new()),
            buffers: BufferPool::new(config.block_size.logical_size() as usize),
            index: Mutex::new(HashMap::new()),
            next_sequence: Mutex::new(next_sequence),
            read_ahead_cbs: Mutex::new(Vec::new()),
            creation_timestamp: CreationTimestamp::now(),
        })
    }

    /// Extents whose last token went away since the previous call. The
    /// compactor may reuse their space.
    pub fn drain_reclaimable(&self) -> Vec<ExtentInfo> {
        self.extents.drain_reclaimable()
    }

    /// Whether the extent at `offset` is still pinned by a token.
    pub fn is_live(&self, offset: u64) -> bool {
        self.extents.is_live(offset)
    }

    pub fn live_extents(&self) -> usize {
        self.extents.live_count()
    }

    /// Buffers from `malloc` (or read paths) nobody has freed yet.
    pub fn outstanding_buffers(&self) -> usize {
        self.buffers.outstanding()
    }
}

/// Internal Functions
impl LogSerializer {
    fn scan_next_sequence(device: &dyn LogDevice, block_size: BlockSize) -> Result<BlockSequenceId> {
        let len = device.len()?;
        let stride = block_size.physical_size();
        if len % stride != 0 {
            return Err(SerializerError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("log length {} is not a multiple of the block size {}", len, stride))));
        }
        let mut max_seen = BlockSequenceId::new(0);
        let mut offset = 0;
        while offset < len {
            let header = Self::read_header(device, offset)?;
            if header.reserved != 0 {
                return Err(SerializerError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("extent at {} has a malformed header", offset))));
            }
            let sequence = BlockSequenceId::new(header.sequence);
            if sequence > max_seen {
                max_seen = sequence;
            }
            offset += stride;
        }
        if max_seen.is_null() {
            Ok(FIRST_BLOCK_SEQUENCE_ID)
        } else {
            Ok(max_seen.next())
        }
    }

    fn read_header(device: &dyn LogDevice, offset: u64) -> io::Result<LsBufHeader> {
        let mut raw = [0u8; 16];
        device.read_at(offset, &mut raw)?;
        Ok(LsBufHeader::decode(&raw))
    }

    fn read_payload(&self, offset: u64) -> io::Result<IoBuf> {
        let mut buf = self.buffers.malloc();
        match self.device.read_at(offset + *LS_HEADER_SIZE, &mut buf) {
            Ok(()) => Ok(buf),
            Err(e) => {
                self.buffers.free(buf);
                Err(e)
            }
        }
    }

    fn read_ahead(&self, after_offset: u64) {
        if self.config.read_ahead_window == 0 {
            return;
        }
        let cbs = lock(&self.read_ahead_cbs).clone();
        if cbs.is_empty() {
            return;
        }
        for extent in self.extents.extents_after(after_offset, self.config.read_ahead_window) {
            if extent.block_id.is_null() || !self.is_current(&extent) {
                continue;
            }
            match self.read_payload(extent.offset) {
                Ok(buf) => self.offer_read_ahead(&cbs, &extent, buf),
                // The reader already has its block; a failed read-ahead is dropped
                Err(e) => debug!("read-ahead of {:?} at {} failed: {}", extent.block_id, extent.offset, e),
            }
        }
    }

    fn is_current(&self, extent: &ExtentInfo) -> bool {
        lock(&self.index)
            .get(&extent.block_id)
            .map_or(false, |token| token.offset() == extent.offset)
    }

    fn offer_read_ahead(&self, cbs: &[Arc<dyn ReadAheadCallback>], extent: &ExtentInfo, buf: IoBuf) {
        let mut buf = buf;
        for cb in cbs {
            buf = match cb.offer_read_ahead_buf(extent.block_id, buf, extent.recency) {
                ReadAheadOffer::Accepted => {
                    trace!("read-ahead of {:?} accepted", extent.block_id);
                    return;
                }
                ReadAheadOffer::Declined(returned) => returned,
            };
        }
        self.buffers.free(buf);
    }
}

impl BlockToken for LsBlockToken {
    fn block_sequence_id(&self) -> BlockSequenceId {
        LsBlockToken::block_sequence_id(self)
    }

    fn block_id(&self) -> BlockId {
        LsBlockToken::block_id(self)
    }
}

impl Serializer for LogSerializer {
    type BlockToken = LsBlockToken;

    fn block_size(&self) -> BlockSize {
        self.config.block_size
    }

    fn creation_timestamp(&self) -> CreationTimestamp {
        self.creation_timestamp
    }

    fn malloc(&self) -> IoBuf {
        self.buffers.malloc()
    }

    fn free(&self, buf: IoBuf) {
        self.buffers.free(buf)
    }

    fn write(&self, block_id: BlockId, data: &[u8]) -> Result<LsBlockToken> {
        assert!(!block_id.is_null(), "Writing a block with NULL_BLOCK_ID");
        let expected = self.config.block_size.logical_size();
        if data.len() as u64 != expected {
            return Err(SerializerError::InvalidBlockSize {
                expected: expected,
                actual: data.len() as u64,
            });
        }

        let recency = RepliTimestamp::now();
        let token = {
            let mut next_sequence = lock(&self.next_sequence);
            let sequence = *next_sequence;
            // Burned even if the append fails: the bytes may be on the device
            *next_sequence = sequence.next();
            let mut extent = Vec::with_capacity(self.config.block_size.physical_size() as usize);
            LsBufHeader {
                sequence: sequence.value(),
                block_id: block_id.value(),
                reserved: 0,
            }.encode(&mut extent);
            extent.extend_from_slice(data);

            let offset = match self.device.append(&extent) {
                Ok(offset) => offset,
                Err(e) => {
                    warn!("writing {:?} failed: {}", block_id, e);
                    return Err(SerializerError::Io(e));
                }
            };
            ExtentPool::alloc(&self.extents, ExtentInfo {
                offset: offset,
                block_id: block_id,
                sequence: sequence,
                recency: recency,
            })
        };
        trace!("wrote {:?} at offset {} as {:?}", block_id, token.offset(), token.block_sequence_id());

        let previous = lock(&self.index).insert(block_id, token.clone());
        drop(previous);
        Ok(token)
    }

    fn read_using_token(&self, token: &LsBlockToken) -> Result<IoBuf> {
        if !token.minted_by(&self.extents) {
            return Err(SerializerError::StaleToken("token was issued by another serializer"));
        }
        let offset = token.offset();
        let header = Self::read_header(&*self.device, offset)?;
        if header.sequence != token.block_sequence_id().value() {
            return Err(SerializerError::StaleToken("extent no longer holds the token's write"));
        }
        let buf = self.read_payload(offset)?;
        self.read_ahead(offset);
        Ok(buf)
    }

    fn index_read(&self, block_id: BlockId) -> Option<LsBlockToken> {
        lock(&self.index).get(&block_id).cloned()
    }

    fn delete(&self, block_id: BlockId) {
        let removed = lock(&self.index).remove(&block_id);
        match removed {
            Some(token) => debug!("deleted {:?}, last placement {:?}", block_id, token),
            None => debug!("deleting {:?} which has no placement", block_id),
        }
    }

    fn register_read_ahead_cb(&self, cb: Arc<dyn ReadAheadCallback>) {
        lock(&self.read_ahead_cbs).push(cb);
    }

    fn unregister_read_ahead_cb(&self, cb: &Arc<dyn ReadAheadCallback>) {
        lock(&self.read_ahead_cbs).retain(|registered| !Arc::ptr_eq(registered, cb));
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
