/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::{
    array,
    cell::Cell,
    ptr::{self, null_mut, NonNull},
    sync::atomic::{AtomicUsize, Ordering},
};
use std::io;

use libc::{c_void, mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};
use log::error;

use super::{BufferModule, BufferSlot, NR_CPU_SLOTS};
use crate::granule_config::{GranuleConfig, GRANULE_SIZE, MAX_CPUS};

thread_local! {
    static CPU_ID: Cell<usize> = const { Cell::new(0) };
}

/// Makes the current thread act as CPU `cpu_id`.
pub fn host_set_cpuid(cpu_id: usize) {
    assert!(cpu_id < MAX_CPUS, "cpu id {} is out of range", cpu_id);
    CPU_ID.with(|id| id.set(cpu_id));
}

/// The CPU the current thread acts as (`0` if never set).
pub fn host_get_cpuid() -> usize {
    CPU_ID.with(|id| id.get())
}

/// Anonymous memory that stands in for the physical memory of the granule range.
///
/// The host address of the mapping is used as physical address,
/// [`HostMemory::config`] describes the mapping as granule range.
pub struct HostMemory {
    base: NonNull<u8>,
    size: usize,
}

// the memory is only accessed through raw pointers, synchronization is up to the users
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    /// Maps `granule_count` zeroed granules.
    pub fn new(granule_count: usize) -> io::Result<Self> {
        let size = granule_count
            .checked_mul(GRANULE_SIZE)
            .filter(|size| *size > 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid granule count"))?;

        let base_ptr = unsafe {
            mmap(
                null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if base_ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let base = match NonNull::new(base_ptr as *mut u8) {
            Some(base) => base,
            None => return Err(io::Error::new(io::ErrorKind::Other, "mmap returned null")),
        };

        let memory = Self { base, size };
        if memory.base() % GRANULE_SIZE != 0 {
            // dropping unmaps again
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "mapping is not aligned to the granule size",
            ));
        }

        Ok(memory)
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    #[inline]
    pub fn granule_count(&self) -> usize {
        self.size / GRANULE_SIZE
    }

    /// The granule range that is backed by this memory
    pub fn config(&self) -> GranuleConfig {
        GranuleConfig::new(self.base(), self.granule_count())
    }

    fn granule_ptr(&self, addr: usize) -> *mut u8 {
        assert!(
            addr % GRANULE_SIZE == 0 && addr >= self.base() && addr < self.base() + self.size,
            "address {:#x} is not backed by this host memory",
            addr
        );

        unsafe { self.base.as_ptr().add(addr - self.base()) }
    }

    /// Sets every byte of the granule at `addr` to `value`.
    pub fn fill(&self, addr: usize, value: u8) {
        unsafe { ptr::write_bytes(self.granule_ptr(addr), value, GRANULE_SIZE) };
    }

    /// Copies the content of the granule at `addr` into `dest` (at most `GRANULE_SIZE` bytes).
    pub fn read(&self, addr: usize, dest: &mut [u8]) {
        let len = dest.len().min(GRANULE_SIZE);
        unsafe { ptr::copy_nonoverlapping(self.granule_ptr(addr), dest.as_mut_ptr(), len) };
    }

    /// Returns whether every byte of the granule at `addr` is zero.
    pub fn is_zeroed(&self, addr: usize) -> bool {
        let mut buffer = [0u8; GRANULE_SIZE];
        self.read(addr, &mut buffer);
        buffer.iter().all(|byte| *byte == 0)
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        let code = unsafe { munmap(self.base.as_ptr() as *mut c_void, self.size) };

        if code != 0 {
            error!("Could not unmap host memory at {:#x}", self.base());
        }
    }
}

/// Buffer module for hosted builds.
///
/// Physical and virtual addresses are the same on the host, so mapping only records which
/// granule occupies which slot of which CPU. Mapping an occupied slot or unmapping a slot with
/// a different address is a bug and panics.
pub struct HostBufferModule {
    slots: [[AtomicUsize; NR_CPU_SLOTS]; MAX_CPUS],
}

const UNMAPPED: usize = 0;

impl HostBufferModule {
    pub fn new() -> Self {
        Self {
            slots: array::from_fn(|_| array::from_fn(|_| AtomicUsize::new(UNMAPPED))),
        }
    }

    fn slot_entry(&self, cpu_id: usize, slot: BufferSlot) -> &AtomicUsize {
        &self.slots[cpu_id][slot.index()]
    }

    /// Returns whether `slot` of `cpu_id` currently holds a mapping.
    pub fn is_mapped(&self, cpu_id: usize, slot: BufferSlot) -> bool {
        self.slot_entry(cpu_id, slot).load(Ordering::Acquire) != UNMAPPED
    }
}

impl Default for HostBufferModule {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferModule for HostBufferModule {
    #[inline]
    fn cpu_id(&self) -> usize {
        host_get_cpuid()
    }

    unsafe fn map(&self, slot: BufferSlot, addr: usize) -> Option<NonNull<u8>> {
        let va = NonNull::new(addr as *mut u8)?;
        let cpu_id = self.cpu_id();

        if let Err(mapped) = self.slot_entry(cpu_id, slot).compare_exchange(
            UNMAPPED,
            addr,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            panic!(
                "slot {} of cpu {} already maps {:#x}",
                slot, cpu_id, mapped
            );
        }

        Some(va)
    }

    unsafe fn unmap(&self, slot: BufferSlot, va: NonNull<u8>) {
        let cpu_id = self.cpu_id();
        let mapped = self
            .slot_entry(cpu_id, slot)
            .swap(UNMAPPED, Ordering::AcqRel);

        assert_eq!(
            mapped,
            va.as_ptr() as usize,
            "slot {} of cpu {} does not map the released window",
            slot,
            cpu_id
        );
    }
}
