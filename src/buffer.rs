use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const MAX_CACHED_BUFFERS: usize = 64;

/// A block-sized buffer handed out by a serializer. Whoever owns it gives
/// it back through the serializer's `free`.
pub struct IoBuf {
    data: Box<[u8]>,
}

impl IoBuf {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Deref for IoBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for IoBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl fmt::Debug for IoBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IoBuf{{ len: {:?} }}", self.data.len())
    }
}

/// Recycles the buffers of one serializer and counts how many are out.
pub struct BufferPool {
    buf_size: usize,
    free_list: Mutex<Vec<Box<[u8]>>>,
    outstanding: AtomicUsize,
}

impl BufferPool {
    pub fn new(buf_size: usize) -> BufferPool {
        BufferPool {
            buf_size: buf_size,
            free_list: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
        }
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    /// A zeroed buffer of the pool's size.
    pub fn malloc(&self) -> IoBuf {
        let recycled = self.free_list.lock().unwrap_or_else(|e| e.into_inner()).pop();
        let data = match recycled {
            Some(mut data) => {
                for b in data.iter_mut() {
                    *b = 0;
                }
                data
            }
            None => vec![0u8; self.buf_size].into_boxed_slice(),
        };
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        IoBuf { data: data }
    }

    pub fn free(&self, buf: IoBuf) {
        assert_eq!(self.buf_size, buf.len(), "Freeing a buffer that belongs to another pool");
        let old = self.outstanding.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "Freeing more buffers than were allocated");
        let mut free_list = self.free_list.lock().unwrap_or_else(|e| e.into_inner());
        if free_list.len() < MAX_CACHED_BUFFERS {
            free_list.push(buf.data);
        }
    }

    /// Buffers handed out by `malloc` and not yet given back to `free`.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }
}

#[test]
fn free_recycles_and_zeroes() {
    let pool = BufferPool::new(16);
    let mut buf = pool.malloc();
    assert_eq!(16, buf.len());
    buf[3] = 42;
    assert_eq!(1, pool.outstanding());
    pool.free(buf);
    assert_eq!(0, pool.outstanding());

    let again = pool.malloc();
    assert_eq!([0u8; 16][..], again[..]);
    pool.free(again);
}

#[test]
#[should_panic(expected = "another pool")]
fn free_rejects_foreign_buffers() {
    let small = BufferPool::new(16);
    let large = BufferPool::new(32);
    let buf = large.malloc();
    small.free(buf);
}
