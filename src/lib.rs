#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
extern crate crc32fast;
extern crate thiserror;

pub mod types;
pub mod extent;
pub mod buffer;
pub mod device;
pub mod serializer;
pub mod log_serializer;
pub mod checking;
pub mod standard;

use std::io;
use thiserror::Error;

pub use types::{BlockId, BlockSequenceId, BlockSize, CreationTimestamp, RepliTimestamp};
pub use types::{FIRST_BLOCK_SEQUENCE_ID, NULL_BLOCK_ID, NULL_BLOCK_SEQUENCE_ID};
pub use buffer::IoBuf;
pub use extent::{ExtentInfo, LsBlockToken};
pub use serializer::{BlockToken, ReadAheadCallback, ReadAheadOffer, Serializer};
pub use log_serializer::{LogSerializer, LogSerializerConfig};
pub use checking::{CheckingBlockToken, CheckingInfo, CheckingSerializer};
pub use standard::{to_standard_block_token, StandardBlockToken, StandardSerializer};

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Stale block token: {0}")]
    StaleToken(&'static str),

    #[error("Corruption detected in {block_id:?}: expected crc {expected:#010x}, found {actual:#010x}")]
    Corruption {
        block_id: BlockId,
        expected: u32,
        actual: u32,
    },

    #[error("Invalid block size: expected {expected} bytes, got {actual}")]
    InvalidBlockSize { expected: u64, actual: u64 },
}

pub type Result<T> = ::std::result::Result<T, SerializerError>;
