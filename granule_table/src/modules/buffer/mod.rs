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

#[cfg(feature = "host")]
mod host;

use core::{fmt, ptr::NonNull};

#[cfg(feature = "host")]
pub use host::{host_get_cpuid, host_set_cpuid, HostBufferModule, HostMemory};

/// Number of buffer slots every CPU owns
pub const NR_CPU_SLOTS: usize = BufferSlot::ALL.len();

/// Per-CPU virtual windows into which a granule can be mapped temporarily.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    /// Window for memory owned by the non-secure host.
    /// Granules cannot be zeroed through this slot.
    Ns = 0,
    Delegated,
    Rd,
    Rec,
    Rec2,
    RecTarget,
    RecAux0,
    Rtt,
    Rtt2,
    RsiCall,
}

impl BufferSlot {
    pub const ALL: [BufferSlot; 10] = [
        BufferSlot::Ns,
        BufferSlot::Delegated,
        BufferSlot::Rd,
        BufferSlot::Rec,
        BufferSlot::Rec2,
        BufferSlot::RecTarget,
        BufferSlot::RecAux0,
        BufferSlot::Rtt,
        BufferSlot::Rtt2,
        BufferSlot::RsiCall,
    ];

    pub fn iter() -> impl Iterator<Item = BufferSlot> + Clone {
        Self::ALL.into_iter()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BufferSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A module that maps physical memory into the per-CPU buffer slots
/// (e.g. by writing the translation table of the current CPU)
pub trait BufferModule {
    /// The CPU the caller runs on, selects the set of slots that is used
    fn cpu_id(&self) -> usize;

    /// Maps the granule at the physical address `addr` into `slot` of the calling CPU.
    ///
    /// Returns the start of the window, which is valid for `GRANULE_SIZE` bytes
    /// until [`BufferModule::unmap`] is called.
    ///
    /// ### Safety
    ///
    /// `addr` has to be a granule the caller has exclusive access to (e.g. its lock is held)
    /// and `slot` has to be unused on the calling CPU.
    unsafe fn map(&self, slot: BufferSlot, addr: usize) -> Option<NonNull<u8>>;

    /// Removes the mapping of `slot` on the calling CPU.
    ///
    /// ### Safety
    ///
    /// `va` has to be the value returned by the matching `map` call and
    /// the window must not be accessed afterwards.
    unsafe fn unmap(&self, slot: BufferSlot, va: NonNull<u8>);
}
