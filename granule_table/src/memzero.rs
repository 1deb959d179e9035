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

use core::slice;

use crate::{
    granule_config::GRANULE_SIZE,
    granule_guard::GranuleGuard,
    granule_table::GranuleTable,
    modules::buffer::{BufferModule, BufferSlot},
};

impl GranuleTable {
    /// Maps the locked granule into `slot` of the calling CPU and fills it with zeros.
    ///
    /// Panics if `slot` is [`BufferSlot::Ns`], if `guard` does not belong to this table
    /// or if the granule cannot be mapped.
    pub fn memzero<B: BufferModule>(&self, guard: &GranuleGuard<'_>, slot: BufferSlot, buffers: &B) {
        assert_ne!(slot, BufferSlot::Ns, "granules cannot be zeroed through the NS slot");

        let addr = self.granule_addr(guard.granule());

        let va = match unsafe { buffers.map(slot, addr) } {
            Some(va) => va,
            None => panic!("could not map granule {:#x} into slot {}", addr, slot),
        };

        // the window spans one granule and the held lock makes it ours
        let window = unsafe { slice::from_raw_parts_mut(va.as_ptr(), GRANULE_SIZE) };
        granule_memzero_mapped(window);

        unsafe { buffers.unmap(slot, va) };
    }
}

/// Fills an already mapped granule with zeros.
///
/// `window` has to be exactly one granule long.
pub fn granule_memzero_mapped(window: &mut [u8]) {
    assert_eq!(window.len(), GRANULE_SIZE, "window is not one granule long");
    window.fill(0);
}

#[cfg(all(test, feature = "host"))]
mod test {
    use super::granule_memzero_mapped;
    use crate::{
        modules::buffer::{BufferSlot, HostBufferModule, HostMemory},
        GranuleTable, GranuleState, GRANULE_SIZE,
    };

    #[test]
    fn test_memzero_mapped() {
        let mut window = vec![0x5Au8; GRANULE_SIZE];
        granule_memzero_mapped(&mut window);
        assert!(window.iter().all(|byte| *byte == 0));
    }

    #[test]
    #[should_panic]
    fn test_memzero_mapped_short_window() {
        let mut window = vec![0x5Au8; GRANULE_SIZE - 1];
        granule_memzero_mapped(&mut window);
    }

    #[test]
    fn test_memzero_releases_slot() {
        let memory = HostMemory::new(2).unwrap();
        let table = GranuleTable::new(memory.config()).unwrap();
        let buffers = HostBufferModule::new();

        let addr = memory.base() + GRANULE_SIZE;
        memory.fill(addr, 0xFF);
        memory.fill(memory.base(), 0xFF);

        let guard = table.find_lock_granule(addr, GranuleState::Ns).unwrap();
        table.memzero(&guard, BufferSlot::Delegated, &buffers);
        guard.unlock();

        assert!(memory.is_zeroed(addr));
        assert!(!memory.is_zeroed(memory.base()));
        assert!(!buffers.is_mapped(0, BufferSlot::Delegated));
    }

    #[test]
    #[should_panic]
    fn test_memzero_ns_slot() {
        let memory = HostMemory::new(1).unwrap();
        let table = GranuleTable::new(memory.config()).unwrap();
        let buffers = HostBufferModule::new();

        let guard = table.find_lock_granule(memory.base(), GranuleState::Ns).unwrap();
        table.memzero(&guard, BufferSlot::Ns, &buffers);
    }
}
