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

use std::{
    process::exit,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Instant,
};

use env_logger::{Builder, Env};
use granule_table::{
    granule_table, init_granule_table,
    modules::buffer::{host_set_cpuid, BufferSlot, HostBufferModule, HostMemory},
    GranuleError, GranuleState, GRANULE_SIZE, MAX_CPUS,
};
use log::{debug, error, info};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const GRANULE_COUNT: usize = 256;
const ITERATIONS: usize = 100_000;

/// Granules at or above this index only use the atomic refcount functions
const ATOMIC_START: usize = GRANULE_COUNT * 3 / 4;

#[derive(Default)]
struct Stats {
    delegated: AtomicU64,
    undelegated: AtomicU64,
    pairs: AtomicU64,
    atomic: AtomicU64,
    rejected: AtomicU64,
    busy: AtomicU64,
}

impl Stats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn granule_addr(memory: &HostMemory, index: usize) -> usize {
    memory.base() + index * GRANULE_SIZE
}

fn run_cpu(cpu_id: usize, memory: &HostMemory, buffers: &HostBufferModule, stats: &Stats) {
    host_set_cpuid(cpu_id);

    let table = granule_table();
    let mut rng = SmallRng::seed_from_u64(cpu_id as u64);

    for _ in 0..ITERATIONS {
        match rng.gen_range(0..5) {
            0 => {
                // NS -> Delegated, scrubbing the content on the way
                let addr = granule_addr(memory, rng.gen_range(0..ATOMIC_START));
                match table.find_lock_unused_granule(addr, GranuleState::Ns) {
                    Ok(guard) => {
                        table.memzero(&guard, BufferSlot::Delegated, buffers);
                        assert!(memory.is_zeroed(addr), "granule {:#x} was not zeroed", addr);
                        guard.unlock_transition(GranuleState::Delegated);
                        Stats::inc(&stats.delegated);
                    }
                    Err(GranuleError::Input) => Stats::inc(&stats.rejected),
                    Err(GranuleError::InUse) => Stats::inc(&stats.busy),
                }
            }
            1 => {
                // Delegated -> NS, the host writes into the granule again
                let addr = granule_addr(memory, rng.gen_range(0..ATOMIC_START));
                match table.find_lock_unused_granule(addr, GranuleState::Delegated) {
                    Ok(guard) => {
                        memory.fill(addr, rng.gen_range(1..=u8::MAX));
                        guard.unlock_transition(GranuleState::Ns);
                        Stats::inc(&stats.undelegated);
                    }
                    Err(GranuleError::Input) => Stats::inc(&stats.rejected),
                    Err(GranuleError::InUse) => Stats::inc(&stats.busy),
                }
            }
            2 => {
                let idx1 = rng.gen_range(0..ATOMIC_START);
                let idx2 = rng.gen_range(0..ATOMIC_START);
                let state = if rng.gen_bool(0.5) {
                    GranuleState::Ns
                } else {
                    GranuleState::Delegated
                };

                match table.find_lock_two_granules(
                    granule_addr(memory, idx1),
                    state,
                    granule_addr(memory, idx2),
                    state,
                ) {
                    Some((mut g1, mut g2)) => {
                        if state == GranuleState::Ns {
                            g1.get();
                            g2.get();
                            g1.put();
                            g2.put();
                        }
                        Stats::inc(&stats.pairs);
                    }
                    None => Stats::inc(&stats.rejected),
                }
            }
            3 => {
                let addr = granule_addr(memory, rng.gen_range(ATOMIC_START..GRANULE_COUNT));
                match table.find_granule(addr) {
                    Some(granule) => {
                        granule.atomic_get();
                        granule.atomic_put_release();
                        Stats::inc(&stats.atomic);
                    }
                    None => unreachable!("granule {:#x} is part of the table", addr),
                }
            }
            _ => {
                // untrusted input: misaligned or behind the range
                let addr = if rng.gen_bool(0.5) {
                    granule_addr(memory, rng.gen_range(0..GRANULE_COUNT)) + rng.gen_range(1..GRANULE_SIZE)
                } else {
                    granule_addr(memory, GRANULE_COUNT + rng.gen_range(0..16))
                };

                assert_eq!(
                    table.find_lock_granule(addr, GranuleState::Ns).err(),
                    Some(GranuleError::Input)
                );
                Stats::inc(&stats.rejected);
            }
        }
    }

    debug!("CPU {} finished", cpu_id);
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_module_path(false)
        .init();

    let memory = match HostMemory::new(GRANULE_COUNT) {
        Ok(memory) => Arc::new(memory),
        Err(err) => {
            error!("Could not map host memory: {}", err);
            exit(1);
        }
    };

    if let Err(err) = init_granule_table(memory.config()) {
        error!("Could not create granule table: {}", err);
        exit(1);
    }

    let cpu_count = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(2, MAX_CPUS);
    info!(
        "Running {} iterations on {} cpus with {} granules",
        ITERATIONS, cpu_count, GRANULE_COUNT
    );

    let buffers = Arc::new(HostBufferModule::new());
    let stats = Arc::new(Stats::default());
    let barrier = Arc::new(Barrier::new(cpu_count));
    let start = Instant::now();

    let handles: Vec<_> = (0..cpu_count)
        .map(|cpu_id| {
            let memory = memory.clone();
            let buffers = buffers.clone();
            let stats = stats.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                run_cpu(cpu_id, &memory, &buffers, &stats);
            })
        })
        .collect();

    let mut failed = false;
    for handle in handles {
        if handle.join().is_err() {
            failed = true;
        }
    }

    if failed {
        error!("At least one cpu panicked");
        exit(1);
    }

    info!("Finished after {:?}", start.elapsed());
    info!(
        "delegated={} undelegated={} pairs={} atomic={} rejected={} busy={}",
        stats.delegated.load(Ordering::Relaxed),
        stats.undelegated.load(Ordering::Relaxed),
        stats.pairs.load(Ordering::Relaxed),
        stats.atomic.load(Ordering::Relaxed),
        stats.rejected.load(Ordering::Relaxed),
        stats.busy.load(Ordering::Relaxed),
    );

    // everything has to be unlocked and unreferenced again, in one of the two states used above
    let table = granule_table();
    let mut leaked = 0;
    for (addr, granule) in table.iter() {
        let released = [GranuleState::Ns, GranuleState::Delegated]
            .into_iter()
            .any(|state| match table.find_lock_granule(addr, state) {
                Ok(guard) => {
                    guard.unlock();
                    true
                }
                Err(_) => false,
            });

        if !released || granule.refcount_read_acquire() != 0 {
            error!("Granule {:#x} is still locked, referenced or in an unexpected state", addr);
            leaked += 1;
        }
    }

    if leaked > 0 {
        exit(1);
    }

    info!("All granules released");
}
