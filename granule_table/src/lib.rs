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

//! Granule table of a security monitor.
//!
//! Every granule (a `GRANULE_SIZE` aligned block of physical memory) in the managed range has
//! a descriptor that records its state, a lock and a reference counter. The state of a granule
//! can only be read or changed with its lock held. Addresses from untrusted callers are resolved
//! with [`GranuleTable::find_granule`] or one of the `find_lock_*` functions.

mod granule;
mod granule_config;
mod granule_error;
mod granule_guard;
mod granule_state;
mod granule_table;
mod memzero;

#[cfg(all(test, feature = "host"))]
mod test;

#[cfg(feature = "benchmarks")]
pub mod benchmarks;

pub use granule::Granule;
pub use granule_config::{GranuleConfig, GranuleConfigError, GRANULE_SHIFT, GRANULE_SIZE, MAX_CPUS};
pub use granule_error::{GranuleError, RmiStatus};
pub use granule_guard::GranuleGuard;
pub use granule_state::GranuleState;
pub use granule_table::{granule_table, init_granule_table, GranuleRequest, GranuleTable};
pub use memzero::granule_memzero_mapped;
pub mod modules;
