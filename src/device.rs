//! The I/O seam of the log serializer. A device is an append-only byte
//! log with positional reads; what it is backed by is none of the
//! serializer's business.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait LogDevice: Send + Sync {
    /// Appends `data` and returns the offset it was written at.
    fn append(&self, data: &[u8]) -> io::Result<u64>;

    /// Fills `buf` with the bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    fn len(&self) -> io::Result<u64>;
}

/// Keeps the log in memory. Tests use it to inject write failures and to
/// flip bytes behind the serializer's back.
pub struct MemoryDevice {
    data: Mutex<Vec<u8>>,
    fail_writes: AtomicBool,
}

impl MemoryDevice {
    pub fn new() -> MemoryDevice {
        MemoryDevice {
            data: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every following `append` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Overwrite a byte in place, as a misbehaving disk would.
    pub fn corrupt(&self, offset: u64, value: u8) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data[offset as usize] = value;
    }
}

impl Default for MemoryDevice {
    fn default() -> MemoryDevice {
        MemoryDevice::new()
    }
}

impl LogDevice for MemoryDevice {
    fn append(&self, buf: &[u8]) -> io::Result<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let offset = data.len() as u64;
        data.extend_from_slice(buf);
        Ok(offset)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
                                      format!("read of [{}..{}) past end of log ({})", start, end, data.len())));
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.data.lock().unwrap_or_else(|e| e.into_inner()).len() as u64)
    }
}

/// Keeps the log in a single file.
pub struct FileDevice {
    file: Mutex<File>,
}

impl FileDevice {
    /// Opens the log at `path`, creating it if it doesn't exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<FileDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileDevice {
            file: Mutex::new(file),
        })
    }
}

impl LogDevice for FileDevice {
    fn append(&self, data: &[u8]) -> io::Result<u64> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        append_whole(&mut *file, data, |f| f.sync_data(), |f, len| f.set_len(len))
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn len(&self) -> io::Result<u64> {
        let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        Ok(file.metadata()?.len())
    }
}

/// Appends `data` at the end of `log` and syncs it. If either step fails,
/// whatever part of `data` landed is cut off again so the next append
/// starts where this one did.
fn append_whole<L, S, T>(log: &mut L, data: &[u8], sync: S, truncate: T) -> io::Result<u64>
    where L: Write + Seek,
          S: FnOnce(&mut L) -> io::Result<()>,
          T: FnOnce(&mut L, u64) -> io::Result<()>
{
    let offset = log.seek(SeekFrom::End(0))?;
    let written = match log.write_all(data) {
        Ok(()) => sync(log),
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        warn!("append at {} failed, rolling back: {}", offset, e);
        if let Err(rollback) = truncate(log, offset) {
            error!("could not roll the log back to {}: {}", offset, rollback);
        }
        return Err(e);
    }
    Ok(offset)
}
