use crc32fast::Hasher;

/// What the checking serializer knows about one block.
///
/// A block nobody has written through the checking serializer is
/// `Unknown`. A write records the checksum of its payload, and deleting
/// that block forgets the checksum again.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CheckingInfo {
    Unknown,
    HaveCrc(u32),
    Deleted,
}

impl Default for CheckingInfo {
    fn default() -> CheckingInfo {
        CheckingInfo::Unknown
    }
}

impl CheckingInfo {
    pub fn for_data(data: &[u8]) -> CheckingInfo {
        CheckingInfo::HaveCrc(compute_crc(data))
    }

    /// False only for `Unknown`.
    pub fn is_known(&self) -> bool {
        *self != CheckingInfo::Unknown
    }

    pub fn is_deleted(&self) -> bool {
        *self == CheckingInfo::Deleted
    }

    pub fn crc(&self) -> Option<u32> {
        match *self {
            CheckingInfo::HaveCrc(crc) => Some(crc),
            _ => None,
        }
    }

    pub fn mark_deleted(&mut self) {
        match *self {
            CheckingInfo::HaveCrc(_) => *self = CheckingInfo::Deleted,
            CheckingInfo::Deleted => panic!("Deleting a block that is already deleted"),
            CheckingInfo::Unknown => panic!("Deleting a block that was never written"),
        }
    }
}

pub fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unknown_and_falsy() {
        let info = CheckingInfo::default();
        assert_eq!(CheckingInfo::Unknown, info);
        assert!(!info.is_known());
        assert_eq!(None, info.crc());
    }

    #[test]
    fn written_then_deleted() {
        let mut info = CheckingInfo::for_data(b"some block");
        assert!(info.is_known());
        assert_eq!(Some(compute_crc(b"some block")), info.crc());

        info.mark_deleted();
        assert!(info.is_deleted());
        assert!(info.is_known());
        // Deletion drops the checksum
        assert_eq!(None, info.crc());
    }

    #[test]
    fn crc_matches_the_ieee_polynomial() {
        assert_eq!(0xcbf4_3926, compute_crc(b"123456789"));
    }

    #[test]
    #[should_panic(expected = "already deleted")]
    fn double_delete_panics() {
        let mut info = CheckingInfo::HaveCrc(1);
        info.mark_deleted();
        info.mark_deleted();
    }

    #[test]
    #[should_panic(expected = "never written")]
    fn deleting_unknown_panics() {
        CheckingInfo::default().mark_deleted();
    }
}
