use std::io;
use std::ptr::{self, NonNull};

use crate::error::EngineError;

/// An exclusively owned buffer of page-backed memory for relocated code.
///
/// The buffer starts out writable. After [`CodeBuffer::make_executable`] it
/// is read+execute and can no longer be written. `len()` is the exact size
/// that was requested; the mapping behind it is rounded up to whole pages.
#[derive(Debug)]
pub struct CodeBuffer {
    ptr: NonNull<u8>,
    len: usize,
    mapped: usize,
    executable: bool,
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

impl CodeBuffer {
    /// Allocates `len` zeroed, writable bytes.
    pub fn new(len: usize) -> Result<Self, EngineError> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                mapped: 0,
                executable: false,
            });
        }

        let page = page_size();
        let mapped = len.div_ceil(page) * page;
        // SAFETY: anonymous private mapping with no address hint.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(EngineError::Memory(io::Error::last_os_error()));
        }
        let ptr = NonNull::new(raw.cast::<u8>())
            .ok_or_else(|| EngineError::Memory(io::Error::other("mmap returned null")))?;

        log::trace!("mapped {} bytes ({} requested) at {:p}", mapped, len, ptr);
        Ok(Self {
            ptr,
            len,
            mapped,
            executable: false,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[cfg(test)]
    fn is_executable(&self) -> bool {
        self.executable
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping is readable in both states and `len` bytes long.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Writable view of the buffer; fails once it has been made executable.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], EngineError> {
        if self.executable {
            return Err(EngineError::SealedBuffer);
        }
        // SAFETY: the mapping is writable until sealed and we hold `&mut self`.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }

    /// Flips the mapping to read+execute.
    pub fn make_executable(&mut self) -> Result<(), EngineError> {
        if self.executable || self.mapped == 0 {
            self.executable = true;
            return Ok(());
        }
        // SAFETY: `ptr`/`mapped` describe a live mapping we own.
        let rc = unsafe {
            libc::mprotect(
                self.ptr.as_ptr().cast(),
                self.mapped,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if rc != 0 {
            return Err(EngineError::Memory(io::Error::last_os_error()));
        }
        self.executable = true;
        Ok(())
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        if self.mapped == 0 {
            return;
        }
        // SAFETY: we own the mapping and nothing borrows it past `drop`.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.mapped) };
        if rc != 0 {
            log::error!(
                "failed to unmap code buffer at {:p}: {}",
                self.ptr,
                io::Error::last_os_error()
            );
        }
    }
}
