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

use std::{process::exit, thread, time::Instant};

use env_logger::{Builder, Env};
use granule_table::benchmarks::{
    run_all_benchmarks, BenchmarkRunOptions, RunAllBenchmarkOptions, Timer,
};
use log::error;

struct DesktopTimer {
    start_time: Instant,
}

impl Timer for DesktopTimer {
    fn get_ticks_per_ms() -> u32 {
        1_000_000
    }

    #[inline]
    fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    #[inline]
    fn stop(self) -> u32 {
        // granule operations are far below a microsecond
        (Instant::now() - self.start_time).subsec_nanos()
    }
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_module_path(false)
        .init();

    let handler = thread::spawn(|| {
        run_all_benchmarks::<DesktopTimer>(
            BenchmarkRunOptions {
                cold_start: 10,
                machine_name: "desktop",
                repetitions: 100,
                result_buffer: &mut [0; 100],
            },
            RunAllBenchmarkOptions::all(),
        )
    });

    match handler.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!("Could not run benchmarks: {}", err);
            exit(1);
        }
        Err(_) => {
            error!("Benchmark thread panicked");
            exit(1);
        }
    }
}
