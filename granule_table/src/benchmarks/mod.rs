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

use std::io::{self, stdout};

use log::warn;
use rand_xoshiro::{rand_core::SeedableRng, Xoshiro128StarStar};
use serde::Serialize;

mod atomic_refcount;
mod find_lock;
mod lock_set;
mod lock_unlock;
mod memzero;

pub use atomic_refcount::*;
pub use find_lock::*;
pub use lock_set::*;
pub use lock_unlock::*;
pub use memzero::*;

use crate::{
    modules::buffer::{HostBufferModule, HostMemory},
    GranuleTable,
};

/// Number of granules of the table all benchmarks run on
pub const BENCH_GRANULE_COUNT: usize = 1024;

const BENCH_SEED: [u8; 16] = [
    103, 114, 97, 110, 117, 108, 101, 45, 116, 97, 98, 108, 101, 33, 17, 42,
];

/// Deterministic random number generator, so that runs are comparable
pub(crate) fn bench_rng() -> Xoshiro128StarStar {
    Xoshiro128StarStar::from_seed(BENCH_SEED)
}

#[derive(Default)]
pub struct RunAllBenchmarkOptions {
    pub run_lock_benchmarks: bool,
    pub run_find_lock_benchmarks: bool,
    pub run_lock_set_benchmarks: bool,
    pub run_refcount_benchmarks: bool,
    pub run_memzero_benchmarks: bool,
}

impl RunAllBenchmarkOptions {
    pub fn all() -> Self {
        Self {
            run_lock_benchmarks: true,
            run_find_lock_benchmarks: true,
            run_lock_set_benchmarks: true,
            run_refcount_benchmarks: true,
            run_memzero_benchmarks: true,
        }
    }
}

pub fn run_all_benchmarks<TIMER: Timer>(
    mut run_options: BenchmarkRunOptions,
    options: RunAllBenchmarkOptions,
) -> io::Result<()> {
    let memory = HostMemory::new(BENCH_GRANULE_COUNT)?;
    let table = match GranuleTable::new(memory.config()) {
        Ok(table) => table,
        Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
    };

    let mut curr_iteration = 0usize;
    let mut iteration_count = 0;

    if options.run_lock_benchmarks {
        iteration_count += 2;
    }
    if options.run_find_lock_benchmarks {
        iteration_count += 2;
    }
    if options.run_lock_set_benchmarks {
        iteration_count += MAX_LOCK_SET_SIZE;
    }
    if options.run_refcount_benchmarks {
        iteration_count += 2;
    }
    if options.run_memzero_benchmarks {
        iteration_count += 1;
    }

    if iteration_count == 0 {
        warn!("No benchmarks selected");
        return Ok(());
    }

    fn handle_curr_iteration(curr_iteration: &mut usize, iteration_count: usize) {
        let percentage = (100 * *curr_iteration) / (iteration_count);
        print!("[{}%] ", percentage);

        *curr_iteration += 1;
    }

    if options.run_lock_benchmarks {
        handle_curr_iteration(&mut curr_iteration, iteration_count);
        LockUnlockBenchmark::new(&table).run_benchmark::<TIMER>(&mut run_options);

        handle_curr_iteration(&mut curr_iteration, iteration_count);
        LockTransitionBenchmark::new(&table).run_benchmark::<TIMER>(&mut run_options);
    }

    if options.run_find_lock_benchmarks {
        handle_curr_iteration(&mut curr_iteration, iteration_count);
        FindLockBenchmark::new(&table).run_benchmark::<TIMER>(&mut run_options);

        handle_curr_iteration(&mut curr_iteration, iteration_count);
        FindLockInvalidBenchmark::new(&table).run_benchmark::<TIMER>(&mut run_options);
    }

    if options.run_lock_set_benchmarks {
        // the upper bound has to be equal to MAX_LOCK_SET_SIZE
        static_assertions::const_assert_eq!(MAX_LOCK_SET_SIZE, 8);
        seq_macro::seq!(N in 1..=8 {
            {
                handle_curr_iteration(&mut curr_iteration, iteration_count);
                LockSetBenchmark::<N>::new(&table).run_benchmark::<TIMER>(&mut run_options);
            }
        });
    }

    if options.run_refcount_benchmarks {
        handle_curr_iteration(&mut curr_iteration, iteration_count);
        AtomicRefcountBenchmark::new(&table).run_benchmark::<TIMER>(&mut run_options);

        handle_curr_iteration(&mut curr_iteration, iteration_count);
        LockedRefcountBenchmark::new(&table).run_benchmark::<TIMER>(&mut run_options);
    }

    if options.run_memzero_benchmarks {
        let buffers = HostBufferModule::new();
        handle_curr_iteration(&mut curr_iteration, iteration_count);
        MemzeroBenchmark::new(&table, &buffers).run_benchmark::<TIMER>(&mut run_options);
    }

    Ok(())
}

pub trait Benchmark<O: Serialize> {
    fn get_name(&self) -> &'static str;
    fn get_bench_options(&self) -> O;
    fn execute<T: Timer>(&mut self) -> u32;

    #[inline(never)]
    fn run_benchmark<T: Timer>(mut self, options: &mut BenchmarkRunOptions) -> BenchmarkRunResult
    where
        Self: Sized,
    {
        assert_eq!(options.repetitions as usize, options.result_buffer.len());
        print!("Running Benchmark \"{}\" with options ", self.get_name());
        if let Err(err) = serde_json::to_writer(stdout(), &self.get_bench_options()) {
            warn!("Could not serialize benchmark options: {}", err);
        }
        println!();

        for _ in 0..options.cold_start {
            self.execute::<T>();
        }

        for i in 0..options.result_buffer.len() {
            let res = self.execute::<T>();
            options.result_buffer[i] = res;
        }

        print!("[BENCH-INFO] ");
        let run_info = BenchmarkRunInfo {
            bench_name: self.get_name(),
            bench_options: &self.get_bench_options(),
            machine_name: options.machine_name,
            cold_start: options.cold_start,
            repetitions: options.repetitions,
            ticks_per_ms: T::get_ticks_per_ms(),
            data: &options.result_buffer,
        };
        if let Err(err) = serde_json::to_writer(stdout(), &run_info) {
            warn!("Could not serialize benchmark results: {}", err);
        }
        println!("");

        let res = BenchmarkRunResult::from_buffer(&options.result_buffer);
        println!(
            "-> Finished {}: mean={}, min={}, max={}",
            self.get_name(),
            res.mean_latency,
            res.min_latency,
            res.max_latency
        );
        println!();

        res
    }
}

pub struct BenchmarkRunOptions<'a> {
    pub repetitions: u32,
    pub result_buffer: &'a mut [u32],
    pub cold_start: u32,
    pub machine_name: &'static str,
}

#[derive(Serialize)]
pub struct BenchmarkRunInfo<'a, O: Serialize> {
    bench_name: &'static str,
    bench_options: &'a O,
    machine_name: &'static str,
    cold_start: u32,
    repetitions: u32,
    ticks_per_ms: u32,
    data: &'a [u32],
}

pub struct BenchmarkRunResult {
    pub mean_latency: u32,
    pub min_latency: u32,
    pub max_latency: u32,
}

impl BenchmarkRunResult {
    fn from_buffer(buffer: &[u32]) -> Self {
        if buffer.is_empty() {
            return Self {
                mean_latency: 0,
                min_latency: 0,
                max_latency: 0,
            };
        }

        let sum: u64 = buffer.iter().map(|x| *x as u64).sum();
        Self {
            mean_latency: (sum / buffer.len() as u64) as u32,
            min_latency: buffer.iter().copied().min().unwrap_or(0),
            max_latency: buffer.iter().copied().max().unwrap_or(0),
        }
    }
}

pub trait Timer {
    fn get_ticks_per_ms() -> u32;
    fn start() -> Self;
    fn stop(self) -> u32;
}
