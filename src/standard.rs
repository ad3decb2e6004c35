//! The serializer the rest of the engine is compiled against. Building
//! with the `semantic-checking` feature puts a `CheckingSerializer` in
//! front of the log serializer; call sites stay the same either way.

use std::sync::Arc;

use crate::Result;
use crate::device::LogDevice;
use crate::extent::LsBlockToken;
use crate::log_serializer::{LogSerializer, LogSerializerConfig};
use crate::serializer::Serializer;
use crate::types::BlockId;

#[cfg(feature = "semantic-checking")]
use crate::checking::{CheckingBlockToken, CheckingSerializer};

#[cfg(feature = "semantic-checking")]
pub type StandardSerializer = CheckingSerializer<LogSerializer>;

#[cfg(not(feature = "semantic-checking"))]
pub type StandardSerializer = LogSerializer;

pub type StandardBlockToken = <StandardSerializer as Serializer>::BlockToken;

#[cfg(feature = "semantic-checking")]
pub fn open_standard_serializer(device: Arc<dyn LogDevice>, config: LogSerializerConfig) -> Result<StandardSerializer> {
    Ok(CheckingSerializer::new(LogSerializer::new(device, config)?))
}

#[cfg(not(feature = "semantic-checking"))]
pub fn open_standard_serializer(device: Arc<dyn LogDevice>, config: LogSerializerConfig) -> Result<StandardSerializer> {
    LogSerializer::new(device, config)
}

/// Turns a token of the log serializer into a standard token. With
/// checking enabled the result wraps `tok` with nothing to verify against.
#[cfg(feature = "semantic-checking")]
pub fn to_standard_block_token(block_id: BlockId, tok: LsBlockToken) -> StandardBlockToken {
    CheckingBlockToken::unverified(block_id, tok)
}

/// Turns a token of the log serializer into a standard token, which is
/// the very same token. `block_id` is ignored.
#[cfg(not(feature = "semantic-checking"))]
pub fn to_standard_block_token(_block_id: BlockId, tok: LsBlockToken) -> StandardBlockToken {
    tok
}
