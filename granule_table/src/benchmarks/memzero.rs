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

use serde::Serialize;

use super::{Benchmark, Timer};
use crate::{
    modules::buffer::{BufferSlot, HostBufferModule},
    GranuleState, GranuleTable, GRANULE_SIZE,
};

#[derive(Serialize)]
pub struct MemzeroBenchmarkOptions {
    granule_size: usize,
    slot: &'static str,
}

/// Zeroing of a locked granule through a buffer slot, including map and unmap
pub struct MemzeroBenchmark<'a> {
    table: &'a GranuleTable,
    buffers: &'a HostBufferModule,
}

impl<'a> MemzeroBenchmark<'a> {
    pub fn new(table: &'a GranuleTable, buffers: &'a HostBufferModule) -> Self {
        Self { table, buffers }
    }
}

impl<'a> Benchmark<MemzeroBenchmarkOptions> for MemzeroBenchmark<'a> {
    #[inline]
    fn get_name(&self) -> &'static str {
        "memzero"
    }

    #[inline]
    fn execute<T: Timer>(&mut self) -> u32 {
        let guard = self.table.addr_to_granule(self.table.base()).lock(GranuleState::Ns);

        let timer = T::start();
        self.table.memzero(&guard, BufferSlot::Delegated, self.buffers);
        let res = timer.stop();

        guard.unlock();
        res
    }

    #[inline]
    fn get_bench_options(&self) -> MemzeroBenchmarkOptions {
        MemzeroBenchmarkOptions {
            granule_size: GRANULE_SIZE,
            slot: "Delegated",
        }
    }
}
