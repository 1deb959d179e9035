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

use rand::Rng;

use super::{
    assert_all_unlocked, get_rng, get_test_table, misaligned_addrs, out_of_range_addrs,
    rand_granule_addr, TEST_GRANULE_COUNT,
};
use crate::{GranuleState, GranuleTable};

fn set_state(table: &GranuleTable, addr: usize, state: GranuleState) {
    table.addr_to_granule(addr).try_lock().unwrap().unlock_transition(state);
}

#[test]
fn test_find_lock_two_granules() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    for _ in 0..20 {
        let addr1 = rand_granule_addr(&table, &mut rng);
        let mut addr2 = rand_granule_addr(&table, &mut rng);
        while addr2 == addr1 {
            addr2 = rand_granule_addr(&table, &mut rng);
        }

        let (g1, g2) = table
            .find_lock_two_granules(addr1, GranuleState::Ns, addr2, GranuleState::Ns)
            .unwrap();

        // guards come back in argument order, no matter which address is lower
        assert_eq!(table.granule_addr(g1.granule()), addr1);
        assert_eq!(table.granule_addr(g2.granule()), addr2);
        assert!(g1.granule().is_locked());
        assert!(g2.granule().is_locked());
        assert_eq!(g1.state(), GranuleState::Ns);
        assert_eq!(g2.state(), GranuleState::Ns);

        g1.unlock();
        g2.unlock();
        assert_all_unlocked(&table);
    }
}

#[test]
fn test_find_lock_two_granules_boundaries() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let first = table.base();
    let last = table.end() - crate::GRANULE_SIZE;

    set_state(&table, first, GranuleState::Rtt);
    set_state(&table, last, GranuleState::Data);

    let (g_last, g_first) = table
        .find_lock_two_granules(last, GranuleState::Data, first, GranuleState::Rtt)
        .unwrap();
    assert_eq!(g_last.state(), GranuleState::Data);
    assert_eq!(g_first.state(), GranuleState::Rtt);

    drop(g_first);
    drop(g_last);
    assert_all_unlocked(&table);
}

#[test]
fn test_find_lock_two_granules_same_address() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();
    let addr = rand_granule_addr(&table, &mut rng);

    assert!(table
        .find_lock_two_granules(addr, GranuleState::Ns, addr, GranuleState::Ns)
        .is_none());
    assert_all_unlocked(&table);
}

#[test]
fn test_find_lock_two_granules_misaligned() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();
    let valid = rand_granule_addr(&table, &mut rng);

    for invalid in misaligned_addrs(&table, &mut rng) {
        assert!(table
            .find_lock_two_granules(invalid, GranuleState::Ns, valid, GranuleState::Ns)
            .is_none());
        assert!(table
            .find_lock_two_granules(valid, GranuleState::Ns, invalid, GranuleState::Ns)
            .is_none());
    }

    assert_all_unlocked(&table);
}

#[test]
fn test_find_lock_two_granules_out_of_range() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();
    let valid = rand_granule_addr(&table, &mut rng);

    for invalid in out_of_range_addrs(&table, &mut rng) {
        assert!(table
            .find_lock_two_granules(invalid, GranuleState::Ns, valid, GranuleState::Ns)
            .is_none());
        assert!(table
            .find_lock_two_granules(valid, GranuleState::Ns, invalid, GranuleState::Ns)
            .is_none());
    }

    assert_all_unlocked(&table);
}

#[test]
fn test_find_lock_two_granules_state_mismatch() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    let addr1 = table.base() + rng.gen_range(1..TEST_GRANULE_COUNT / 2) * crate::GRANULE_SIZE;
    let addr2 = table.base()
        + rng.gen_range(TEST_GRANULE_COUNT / 2..TEST_GRANULE_COUNT) * crate::GRANULE_SIZE;

    // both granules are in state NS, every other combination has to fail
    for state1 in GranuleState::iter() {
        for state2 in GranuleState::iter() {
            let expect_ok = state1 == GranuleState::Ns && state2 == GranuleState::Ns;

            let res = table.find_lock_two_granules(addr1, state1, addr2, state2);
            assert_eq!(res.is_some(), expect_ok);
            drop(res);
            assert_all_unlocked(&table);

            let res = table.find_lock_two_granules(addr2, state2, addr1, state1);
            assert_eq!(res.is_some(), expect_ok);
            drop(res);
            assert_all_unlocked(&table);
        }
    }
}

#[test]
fn test_find_lock_two_granules_all_states() {
    let (_memory, table) = get_test_table(TEST_GRANULE_COUNT);
    let mut rng = get_rng();

    let addr1 = rand_granule_addr(&table, &mut rng);
    let mut addr2 = rand_granule_addr(&table, &mut rng);
    while addr2 == addr1 {
        addr2 = rand_granule_addr(&table, &mut rng);
    }

    for state1 in GranuleState::iter() {
        for state2 in GranuleState::iter() {
            set_state(&table, addr1, state1);
            set_state(&table, addr2, state2);

            let (g1, g2) = table
                .find_lock_two_granules(addr1, state1, addr2, state2)
                .unwrap();
            assert_eq!(g1.state(), state1);
            assert_eq!(g2.state(), state2);
            drop((g1, g2));

            assert!(table
                .find_lock_two_granules(addr1, state1.next_wrapping(), addr2, state2)
                .is_none());
            assert!(table
                .find_lock_two_granules(addr1, state1, addr2, state2.next_wrapping())
                .is_none());
            assert_all_unlocked(&table);
        }
    }
}
