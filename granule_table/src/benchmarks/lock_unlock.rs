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
pub struct LockUnlockBenchmarkOptions {
    state: &'static str,
}

/// Lock and unlock of an uncontended granule whose state is known
pub struct LockUnlockBenchmark<'a> {
    granule: &'a Granule,
}

impl<'a> LockUnlockBenchmark<'a> {
    pub fn new(table: &'a GranuleTable) -> Self {
        Self {
            granule: table.addr_to_granule(table.base()),
        }
    }
}

impl<'a> Benchmark<LockUnlockBenchmarkOptions> for LockUnlockBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "lock_unlock"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let timer = T::start();

        let guard = black_box(self.granule.lock(GranuleState::Ns));
        guard.unlock();

        timer.stop()
    }

    #[inline]
    fn get_bench_options(&self) -> LockUnlockBenchmarkOptions {
        LockUnlockBenchmarkOptions { state: "NS" }
    }
}

#[derive(Serialize)]
pub struct LockTransitionBenchmarkOptions {
    states: usize,
}

/// Lock on state match followed by an unlock with transition, cycling through all states
pub struct LockTransitionBenchmark<'a> {
    granule: &'a Granule,
    state: GranuleState,
}

impl<'a> LockTransitionBenchmark<'a> {
    pub fn new(table: &'a GranuleTable) -> Self {
        Self {
            granule: table.addr_to_granule(table.base()),
            state: GranuleState::Ns,
        }
    }
}

impl<'a> Benchmark<LockTransitionBenchmarkOptions> for LockTransitionBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "lock_transition"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let next = self.state.next_wrapping();

        let timer = T::start();

        let guard = black_box(self.granule.lock_on_state_match(self.state));
        if let Some(guard) = guard {
            guard.unlock_transition(next);
        }

        let res = timer.stop();

        self.state = next;
        res
    }

    #[inline]
    fn get_bench_options(&self) -> LockTransitionBenchmarkOptions {
        LockTransitionBenchmarkOptions {
            states: GranuleState::COUNT,
        }
    }
}

impl Drop for LockTransitionBenchmark<'_> {
    fn drop(&mut self) {
        if let Some(guard) = self.granule.lock_on_state_match(self.state) {
            guard.unlock_transition(GranuleState::Ns);
        }
    }
}
