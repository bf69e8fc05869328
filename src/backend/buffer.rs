//! Device buffer wrapper and allocation accounting
//!
//! `DeviceBuffer` stands in for device memory the way the native runtime's
//! buffer objects would: byte-addressed storage behind an `Arc` so clones
//! share one allocation, with typed host accessors for staging data in and
//! out. Buffer handles issued to callers reference these; ownership of the
//! referenced data stays with the caller for the whole execute call.

use std::sync::{Arc, Mutex};

use crate::error::{ForgeResult, FourierForgeError};

/// Device memory allocation using Arc for safe, cheap cloning.
/// The backing storage is freed once when the last clone drops.
#[derive(Debug, Clone)]
pub struct DeviceBuffer {
    inner: Arc<BufferInner>,
}

#[derive(Debug)]
struct BufferInner {
    bytes: Mutex<Vec<u8>>,
    size: usize,
}

impl DeviceBuffer {
    /// Allocate a zero-initialized buffer of `size` bytes.
    pub fn new(size: usize) -> ForgeResult<Self> {
        if size == 0 {
            return Err(FourierForgeError::EmptyAllocation);
        }
        tracing::trace!(size, "allocating device buffer");
        Ok(DeviceBuffer {
            inner: Arc::new(BufferInner {
                bytes: Mutex::new(vec![0u8; size]),
                size,
            }),
        })
    }

    /// Buffer capacity in bytes. Constant for the buffer's lifetime.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Run `f` against the buffer contents.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> ForgeResult<R> {
        let guard = self.inner.bytes.lock()?;
        Ok(f(&guard))
    }

    /// Run `f` against the buffer contents with write access.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> ForgeResult<R> {
        let mut guard = self.inner.bytes.lock()?;
        Ok(f(&mut guard))
    }

    /// Stage raw host bytes into the buffer starting at offset zero.
    pub fn write_bytes(&self, data: &[u8]) -> ForgeResult<()> {
        self.check_capacity(data.len())?;
        self.with_bytes_mut(|bytes| bytes[..data.len()].copy_from_slice(data))
    }

    /// Copy buffer contents back out to host memory.
    pub fn read_bytes(&self, out: &mut [u8]) -> ForgeResult<()> {
        self.check_capacity(out.len())?;
        self.with_bytes(|bytes| out.copy_from_slice(&bytes[..out.len()]))
    }

    /// Stage f32 scalars into the buffer.
    pub fn write_f32(&self, data: &[f32]) -> ForgeResult<()> {
        self.check_capacity(data.len() * std::mem::size_of::<f32>())?;
        self.with_bytes_mut(|bytes| {
            for (i, value) in data.iter().enumerate() {
                bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_ne_bytes());
            }
        })
    }

    /// Copy f32 scalars back out to host memory.
    pub fn read_f32(&self, out: &mut [f32]) -> ForgeResult<()> {
        self.check_capacity(out.len() * std::mem::size_of::<f32>())?;
        self.with_bytes(|bytes| {
            for (i, value) in out.iter_mut().enumerate() {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
                *value = f32::from_ne_bytes(raw);
            }
        })
    }

    /// Stage f64 scalars into the buffer.
    pub fn write_f64(&self, data: &[f64]) -> ForgeResult<()> {
        self.check_capacity(data.len() * std::mem::size_of::<f64>())?;
        self.with_bytes_mut(|bytes| {
            for (i, value) in data.iter().enumerate() {
                bytes[i * 8..i * 8 + 8].copy_from_slice(&value.to_ne_bytes());
            }
        })
    }

    /// Copy f64 scalars back out to host memory.
    pub fn read_f64(&self, out: &mut [f64]) -> ForgeResult<()> {
        self.check_capacity(out.len() * std::mem::size_of::<f64>())?;
        self.with_bytes(|bytes| {
            for (i, value) in out.iter_mut().enumerate() {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
                *value = f64::from_ne_bytes(raw);
            }
        })
    }

    fn check_capacity(&self, required: usize) -> ForgeResult<()> {
        if required > self.size() {
            return Err(FourierForgeError::BufferTooSmall {
                required,
                actual: self.size(),
            });
        }
        Ok(())
    }
}

/// Allocation accounting for one context.
///
/// Buffers and plan scratch reserve against a fixed budget so the engine
/// can report resource exhaustion deterministically instead of letting the
/// host allocator decide.
#[derive(Debug)]
pub struct MemoryLedger {
    budget: usize,
    used: usize,
}

impl MemoryLedger {
    pub fn new(budget: usize) -> Self {
        MemoryLedger { budget, used: 0 }
    }

    pub fn reserve(&mut self, bytes: usize) -> ForgeResult<()> {
        let available = self.budget.saturating_sub(self.used);
        if bytes > available {
            return Err(FourierForgeError::OutOfDeviceMemory {
                requested: bytes,
                available,
            });
        }
        self.used += bytes;
        Ok(())
    }

    pub fn release(&mut self, bytes: usize) {
        self.used = self.used.saturating_sub(bytes);
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn budget(&self) -> usize {
        self.budget
    }
}
