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
use crate::{GranuleRequest, GranuleState, GranuleTable, GRANULE_SIZE};

/// Largest set size that is benchmarked, has to match the range in `run_all_benchmarks`
pub const MAX_LOCK_SET_SIZE: usize = 8;

#[derive(Serialize)]
pub struct LockSetBenchmarkOptions {
    set_size: usize,
}

/// Ordered locking of `N` distinct granules that are requested in random order
pub struct LockSetBenchmark<'a, const N: usize> {
    table: &'a GranuleTable,
    rng: Xoshiro128StarStar,
}

impl<'a, const N: usize> LockSetBenchmark<'a, N> {
    pub fn new(table: &'a GranuleTable) -> Self {
        assert!(N <= table.len());

        Self {
            table,
            rng: bench_rng(),
        }
    }

    fn random_requests(&mut self) -> [GranuleRequest; N] {
        // N distinct indices spread over the table, then shuffled
        let stride = self.table.len() / N;
        let start = self.rng.next_u32() as usize % stride;
        let mut indices: [usize; N] = core::array::from_fn(|i| start + i * stride);

        for i in (1..N).rev() {
            let j = self.rng.next_u32() as usize % (i + 1);
            indices.swap(i, j);
        }

        indices.map(|index| {
            GranuleRequest::new(self.table.base() + index * GRANULE_SIZE, GranuleState::Ns)
        })
    }
}

impl<'a, const N: usize> Benchmark<LockSetBenchmarkOptions> for LockSetBenchmark<'a, N> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "lock_set"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let requests = self.random_requests();

        let timer = T::start();

        let guards = black_box(self.table.find_lock_granules(requests));
        drop(guards);

        timer.stop()
    }

    #[inline]
    fn get_bench_options(&self) -> LockSetBenchmarkOptions {
        LockSetBenchmarkOptions { set_size: N }
    }
}
