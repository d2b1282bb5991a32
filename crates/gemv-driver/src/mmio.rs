//! Memory-mapped register window for real hardware
//!
//! Maps the GEMV peripheral's registers from a device file (`/dev/mem` at the
//! SoC base address, a UIO node, or any mappable file) and implements
//! [`GemvRegisters`] with volatile 32-bit accesses at the `gemv-chip` offsets.
//!
//! Minimal unsafe: mmap/munmap and the volatile accesses, all bounds-checked
//! against the fixed register window.

// Operand values travel as their two's-complement bit patterns in a 32-bit bus word
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{GemvError, Result};
use crate::registers::{GemvRegisters, Status};
use gemv_chip::regs::{self, control, y_next};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Mapped GEMV register window
pub struct MmioRegisters {
    /// Start of the page-aligned mapping
    map: NonNull<u8>,
    /// Length of the mapping
    map_len: usize,
    /// Offset of the register window inside the mapping
    window: usize,
    _file: File,
    path: PathBuf,
    base: u64,
}

impl std::fmt::Debug for MmioRegisters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioRegisters")
            .field("path", &self.path)
            .field("base", &format_args!("{:#x}", self.base))
            .field("map", &format_args!("{:p}", self.map))
            .field("map_len", &self.map_len)
            .finish_non_exhaustive()
    }
}

// SAFETY: Send - MmioRegisters owns its mapping exclusively; moving it between
// threads does not invalidate the mapping (mmap'd memory is process-wide).
unsafe impl Send for MmioRegisters {}

impl MmioRegisters {
    /// Map the register window at physical/file offset `base` of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `base` is not 32-bit aligned
    /// - the device file cannot be opened read/write
    /// - mmap fails
    pub fn open(path: impl AsRef<Path>, base: u64) -> Result<Self> {
        let path = path.as_ref();
        if base % 4 != 0 {
            return Err(GemvError::mmio(format!(
                "Register base {base:#x} is not 32-bit aligned"
            )));
        }

        let page = rustix::param::page_size() as u64;
        let aligned = base & !(page - 1);
        let window = usize::try_from(base - aligned)
            .map_err(|_| GemvError::mmio("Window offset exceeds address space"))?;
        let map_len = window + regs::WINDOW_SIZE;

        tracing::debug!(
            "Mapping GEMV window: {} base={base:#x} (page {aligned:#x} + {window:#x})",
            path.display()
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| GemvError::mmio(format!("Cannot open {}: {e}", path.display())))?;

        // SAFETY: mmap necessary for MMIO - maps the register page into the process.
        // Invariants: (1) fd valid, just opened read/write; (2) offset page-aligned;
        // (3) map_len non-zero; (4) the File is stored alongside the pointer so the
        // fd outlives the mapping; (5) Drop unmaps exactly once.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                aligned,
            )
        }
        .map_err(|e| GemvError::mmio(format!("mmap of {} failed: {e}", path.display())))?;

        let map = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| GemvError::mmio("mmap returned a null mapping"))?;

        tracing::info!("Mapped GEMV registers at {base:#x} ({map:p})");

        Ok(Self {
            map,
            map_len,
            window,
            _file: file,
            path: path.to_path_buf(),
            base,
        })
    }

    /// Base address the window was mapped from.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Read a 32-bit register
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the register window.
    pub fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= regs::WINDOW_SIZE, "Register offset out of bounds");
        // SAFETY: read_volatile necessary for MMIO - hardware can change the value.
        // Invariants: (1) map valid for map_len; (2) window + offset + 4 <= map_len;
        // (3) window and offset are multiples of 4 on a page-aligned mapping.
        unsafe {
            std::ptr::read_volatile(self.map.as_ptr().add(self.window + offset).cast::<u32>())
        }
    }

    /// Write a 32-bit register
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the register window.
    pub fn write32(&mut self, offset: usize, value: u32) {
        assert!(offset + 4 <= regs::WINDOW_SIZE, "Register offset out of bounds");
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side effects.
        // Invariants: as read32; &mut self gives exclusive access.
        unsafe {
            std::ptr::write_volatile(
                self.map.as_ptr().add(self.window + offset).cast::<u32>(),
                value,
            );
        }
    }
}

impl GemvRegisters for MmioRegisters {
    fn write_x(&mut self, value: i8) {
        self.write32(regs::X_IN, u32::from(value as u8));
    }

    fn write_w(&mut self, value: i8) {
        self.write32(regs::W_IN, u32::from(value as u8));
    }

    fn write_b(&mut self, value: i32) {
        self.write32(regs::B_IN, u32::from_ne_bytes(value.to_ne_bytes()));
    }

    fn write_control(&mut self, bits: u32) {
        self.write32(regs::CONTROL, bits & control::DEFINED);
    }

    fn read_status(&mut self) -> Status {
        Status::from_bits(self.read32(regs::STATUS))
    }

    fn read_y(&mut self) -> i32 {
        i32::from_ne_bytes(self.read32(regs::Y_OUT).to_ne_bytes())
    }

    fn pulse_y_next(&mut self) {
        self.write32(regs::Y_NEXT, y_next::ADVANCE);
    }
}

impl Drop for MmioRegisters {
    fn drop(&mut self) {
        // SAFETY: munmap of the exact range mapped in open(); Drop runs at most once
        // and no references into the mapping outlive self.
        unsafe {
            // Ignore error in Drop (can't propagate)
            let _ = munmap(self.map.as_ptr().cast(), self.map_len);
        }
        tracing::debug!("Unmapped GEMV registers at {:#x}", self.base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    /// File-backed window: registers become plain words in a temp file.
    fn backing_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("gemv-mmio-{}-{name}", std::process::id()));
        let file = File::create(&path).unwrap();
        file.set_len(rustix::param::page_size() as u64).unwrap();
        path
    }

    fn word_at(path: &Path, offset: usize) -> u32 {
        let mut file = File::open(path).unwrap();
        file.seek(SeekFrom::Start(offset as u64)).unwrap();
        let mut word = [0u8; 4];
        file.read_exact(&mut word).unwrap();
        u32::from_ne_bytes(word)
    }

    #[test]
    fn writes_land_on_documented_offsets() {
        let path = backing_file("offsets");
        {
            let mut regs = MmioRegisters::open(&path, 0).unwrap();
            regs.write_x(-1);
            regs.write_w(0x7F);
            regs.write_b(-2);
            regs.write_control(control::START | control::LEN_64 | 0xFF00);
            regs.pulse_y_next();
        }
        assert_eq!(word_at(&path, regs::X_IN), 0xFF);
        assert_eq!(word_at(&path, regs::W_IN), 0x7F);
        assert_eq!(word_at(&path, regs::B_IN), 0xFFFF_FFFE);
        assert_eq!(word_at(&path, regs::CONTROL), control::START | control::LEN_64);
        assert_eq!(word_at(&path, regs::Y_NEXT), 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reads_decode_status_and_signed_y() {
        let path = backing_file("reads");
        let mut regs = MmioRegisters::open(&path, 0).unwrap();
        assert!(regs.read_status().is_idle());

        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(regs::STATUS as u64)).unwrap();
        file.write_all(&(0xFFFF_FFFEu32).to_ne_bytes()).unwrap();
        file.seek(SeekFrom::Start(regs::Y_OUT as u64)).unwrap();
        file.write_all(&(-42i32).to_ne_bytes()).unwrap();
        file.flush().unwrap();

        assert!(regs.read_status().done());
        assert!(!regs.read_status().busy());
        assert_eq!(regs.read_y(), -42);
        drop(regs);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unaligned_base_rejected() {
        let err = MmioRegisters::open("/nonexistent", 0x1002).unwrap_err();
        assert!(matches!(err, GemvError::Mmio { .. }));
    }

    #[test]
    fn missing_device_rejected() {
        assert!(MmioRegisters::open("/nonexistent/gemv", 0).is_err());
    }
}
