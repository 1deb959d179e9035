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

use serde::Serialize;

use super::{Benchmark, Timer};
use crate::{Granule, GranuleState, GranuleTable};

#[derive(Serialize)]
pub struct RefcountBenchmarkOptions {
    operations: usize,
}

/// Atomic get followed by a put with release semantics
pub struct AtomicRefcountBenchmark<'a> {
    granule: &'a Granule,
}

impl<'a> AtomicRefcountBenchmark<'a> {
    pub fn new(table: &'a GranuleTable) -> Self {
        Self {
            granule: table.addr_to_granule(table.base()),
        }
    }
}

impl<'a> Benchmark<RefcountBenchmarkOptions> for AtomicRefcountBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "atomic_refcount"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let timer = T::start();

        black_box(self.granule).atomic_get();
        black_box(self.granule).atomic_put_release();

        timer.stop()
    }

    #[inline]
    fn get_bench_options(&self) -> RefcountBenchmarkOptions {
        RefcountBenchmarkOptions { operations: 2 }
    }
}

/// Lock, get, put and unlock
pub struct LockedRefcountBenchmark<'a> {
    granule: &'a Granule,
}

impl<'a> LockedRefcountBenchmark<'a> {
    pub fn new(table: &'a GranuleTable) -> Self {
        Self {
            granule: table.addr_to_granule(table.base()),
        }
    }
}

impl<'a> Benchmark<RefcountBenchmarkOptions> for LockedRefcountBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "locked_refcount"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let timer = T::start();

        let mut guard = self.granule.lock(GranuleState::Ns);
        black_box(&mut guard).get();
        black_box(&mut guard).put();
        guard.unlock();

        timer.stop()
    }

    #[inline]
    fn get_bench_options(&self) -> RefcountBenchmarkOptions {
        RefcountBenchmarkOptions { operations: 4 }
    }
}
