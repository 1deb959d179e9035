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

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{modules::buffer::HostMemory, GranuleTable, GRANULE_SIZE};

mod find;
mod lock_two;

pub(crate) const TEST_GRANULE_COUNT: usize = 64;

const SEED: u64 = 0x6772_616e_756c_6573;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn get_rng() -> SmallRng {
    SmallRng::seed_from_u64(SEED)
}

/// Host memory and a granule table covering all of it
pub(crate) fn get_test_table(granule_count: usize) -> (HostMemory, GranuleTable) {
    init_logger();

    let memory = HostMemory::new(granule_count).unwrap();
    let table = GranuleTable::new(memory.config()).unwrap();

    (memory, table)
}

/// Address of a random granule that is neither the first nor the last one
pub(crate) fn rand_granule_addr(table: &GranuleTable, rng: &mut SmallRng) -> usize {
    table.base() + rng.gen_range(1..table.len() - 1) * GRANULE_SIZE
}

/// First granule, a random one in between and the last one
pub(crate) fn boundary_addrs(table: &GranuleTable, rng: &mut SmallRng) -> [usize; 3] {
    [
        table.base(),
        rand_granule_addr(table, rng),
        table.end() - GRANULE_SIZE,
    ]
}

/// Aligned addresses right outside of the managed range (below and above)
pub(crate) fn out_of_range_addrs(table: &GranuleTable, rng: &mut SmallRng) -> Vec<usize> {
    let mut addrs = vec![
        table.end(),
        table.end() + rng.gen_range(1..10) * GRANULE_SIZE,
    ];

    let granules_below = table.base() / GRANULE_SIZE;
    if granules_below > 0 {
        addrs.push(table.base() - GRANULE_SIZE);
        addrs.push(table.base() - rng.gen_range(1..=granules_below.min(10)) * GRANULE_SIZE);
    }

    addrs
}

/// Misaligned addresses inside of the managed range
pub(crate) fn misaligned_addrs(table: &GranuleTable, rng: &mut SmallRng) -> [usize; 3] {
    [
        table.base() + 1,
        rand_granule_addr(table, rng) + rng.gen_range(1..GRANULE_SIZE),
        table.end() - 1,
    ]
}

/// Checks that no granule of `table` is locked.
pub(crate) fn assert_all_unlocked(table: &GranuleTable) {
    for (addr, granule) in table.iter() {
        assert!(!granule.is_locked(), "granule {:#x} is still locked", addr);
    }
}
