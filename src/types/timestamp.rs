use std::time::{SystemTime, UNIX_EPOCH};

fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// When a store was created. Only ordering and equality are meaningful.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CreationTimestamp(i64);

impl CreationTimestamp {
    pub fn now() -> CreationTimestamp {
        CreationTimestamp(seconds_since_epoch() as i64)
    }

    pub fn from_secs(secs: i64) -> CreationTimestamp {
        CreationTimestamp(secs)
    }

    pub fn secs(&self) -> i64 {
        self.0
    }
}

/// How recently a block was touched, as seen by replication.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RepliTimestamp(u32);

impl RepliTimestamp {
    pub fn distant_past() -> RepliTimestamp {
        RepliTimestamp(0)
    }

    pub fn now() -> RepliTimestamp {
        let secs = seconds_since_epoch();
        if secs > u32::max_value() as u64 {
            RepliTimestamp(u32::max_value())
        } else {
            RepliTimestamp(secs as u32)
        }
    }

    pub fn from_secs(secs: u32) -> RepliTimestamp {
        RepliTimestamp(secs)
    }

    pub fn secs(&self) -> u32 {
        self.0
    }
}

#[test]
fn distant_past_is_before_now() {
    assert!(RepliTimestamp::distant_past() < RepliTimestamp::now());
    assert!(RepliTimestamp::from_secs(3) < RepliTimestamp::from_secs(4));
}

#[test]
fn creation_timestamps_order_by_seconds() {
    let a = CreationTimestamp::from_secs(10);
    assert_eq!(a, CreationTimestamp::from_secs(10));
    assert!(a < CreationTimestamp::from_secs(11));
    assert!(CreationTimestamp::now() > a);
}
