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

use core::hint::black_box;

use rand_xoshiro::{rand_core::RngCore, Xoshiro128StarStar};
use serde::Serialize;

use super::{bench_rng, Benchmark, Timer};
use crate::{GranuleState, GranuleTable, GRANULE_SIZE};

#[derive(Serialize)]
pub struct FindLockBenchmarkOptions {
    granule_count: usize,
}

/// Resolves and locks a random granule of the table
pub struct FindLockBenchmark<'a> {
    table: &'a GranuleTable,
    rng: Xoshiro128StarStar,
}

impl<'a> FindLockBenchmark<'a> {
    pub fn new(table: &'a GranuleTable) -> Self {
        Self {
            table,
            rng: bench_rng(),
        }
    }
}

impl<'a> Benchmark<FindLockBenchmarkOptions> for FindLockBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "find_lock"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let index = self.rng.next_u32() as usize % self.table.len();
        let addr = self.table.base() + index * GRANULE_SIZE;

        let timer = T::start();

        let res = black_box(self.table.find_lock_granule(addr, GranuleState::Ns));
        drop(res);

        timer.stop()
    }

    #[inline]
    fn get_bench_options(&self) -> FindLockBenchmarkOptions {
        FindLockBenchmarkOptions {
            granule_count: self.table.len(),
        }
    }
}

#[derive(Serialize)]
pub struct FindLockInvalidBenchmarkOptions {
    granule_count: usize,
}

/// Rejection of an address outside of the table
pub struct FindLockInvalidBenchmark<'a> {
    table: &'a GranuleTable,
    rng: Xoshiro128StarStar,
}

impl<'a> FindLockInvalidBenchmark<'a> {
    pub fn new(table: &'a GranuleTable) -> Self {
        Self {
            table,
            rng: bench_rng(),
        }
    }
}

impl<'a> Benchmark<FindLockInvalidBenchmarkOptions> for FindLockInvalidBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "find_lock_invalid"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        // alternates between misaligned and out of range addresses
        let offset = self.rng.next_u32() as usize % GRANULE_SIZE;
        let addr = if offset == 0 {
            self.table.end()
        } else {
            self.table.base() + offset
        };

        let timer = T::start();

        let res = black_box(self.table.find_lock_granule(addr, GranuleState::Ns));
        drop(res);

        timer.stop()
    }

    #[inline]
    fn get_bench_options(&self) -> FindLockInvalidBenchmarkOptions {
        FindLockInvalidBenchmarkOptions {
            granule_count: self.table.len(),
        }
    }
}
