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

use core::ptr;

use super::{
    assert_all_unlocked, boundary_addrs, get_rng, get_test_table, misaligned_addrs,
    out_of_range_addrs, TEST_GRANULE_COUNT,
};
use crate::{GranuleError, GranuleState, GRANULE_SIZE};

#[test]
fn test_new_table_is_all_ns() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);

    for (_, granule) in table.iter() {
        assert!(!granule.is_locked());
        assert_eq!(granule.refcount_read_relaxed(), 0);

        let guard = granule.try_lock().unwrap();
        assert_eq!(guard.state(), GranuleState::Ns);
    }
}

#[test]
fn test_addr_granule_roundtrip() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    for addr in boundary_addrs(&table, &mut rng) {
        let granule = table.addr_to_granule(addr);
        assert_eq!(table.granule_addr(granule), addr);

        let idx = (addr - table.base()) / GRANULE_SIZE;
        assert_eq!(table.granule_index(addr), Some(idx));

        // conversions do not touch the descriptor
        assert!(!granule.is_locked());
        assert_eq!(granule.refcount_read_relaxed(), 0);
    }
}

#[test]
fn test_find_granule_valid() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    for addr in boundary_addrs(&table, &mut rng) {
        let granule = table.find_granule(addr).unwrap();
        assert!(ptr::eq(granule, table.addr_to_granule(addr)));
        assert!(!granule.is_locked());
    }
}

#[test]
fn test_find_granule_misaligned() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    for addr in misaligned_addrs(&table, &mut rng) {
        assert!(table.find_granule(addr).is_none());
        assert_eq!(
            table.find_lock_granule(addr, GranuleState::Ns).err(),
            Some(GranuleError::Input)
        );
        assert_eq!(
            table.find_lock_unused_granule(addr, GranuleState::Ns).err(),
            Some(GranuleError::Input)
        );
    }

    assert_all_unlocked(&table);
}

#[test]
fn test_find_granule_out_of_range() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    for addr in out_of_range_addrs(&table, &mut rng) {
        assert!(table.find_granule(addr).is_none());
        for state in GranuleState::iter() {
            assert_eq!(
                table.find_lock_granule(addr, state).err(),
                Some(GranuleError::Input)
            );
            assert_eq!(
                table.find_lock_unused_granule(addr, state).err(),
                Some(GranuleError::Input)
            );
        }
    }

    assert!(table.find_granule(0).is_none());
    assert!(table.find_granule(usize::MAX & !(GRANULE_SIZE - 1)).is_none());

    assert_all_unlocked(&table);
}
