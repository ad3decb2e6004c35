/// Size of a block, in both of its domains.
///
/// Only the serializer-domain ("physical") size is stored. The logical
/// size handed to callers above the serializer is derived from it by the
/// log serializer, which owns the block header layout (see
/// `log_serializer::LS_HEADER_SIZE`), so there is never a second field
/// that could disagree with the first.
///
/// This value is embedded in on-disk structures. Changing the width or the
/// meaning of the stored magnitude changes the disk format!
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlockSize {
    ser_bs: u64,
}

impl BlockSize {
    /// Avoid using this function. Keeping the number of call sites small
    /// is what makes it impossible to pass a logical size where a physical
    /// one is expected. No validation happens here.
    pub fn unsafe_make(ser_bs: u64) -> BlockSize {
        BlockSize { ser_bs: ser_bs }
    }

    /// The block size used inside the serializer, header included.
    pub fn physical_size(&self) -> u64 {
        self.ser_bs
    }
}
