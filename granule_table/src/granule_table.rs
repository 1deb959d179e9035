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

use core::{array, mem::size_of};
use std::sync::OnceLock;

use log::{debug, trace};

use crate::{
    granule::Granule,
    granule_config::{GranuleConfig, GranuleConfigError, GRANULE_SIZE},
    granule_error::GranuleError,
    granule_guard::GranuleGuard,
    granule_state::GranuleState,
};

/// One granule a caller wants to lock, together with the state it is expected to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GranuleRequest {
    pub addr: usize,
    pub state: GranuleState,
}

impl GranuleRequest {
    pub const fn new(addr: usize, state: GranuleState) -> Self {
        Self { addr, state }
    }
}

/// Descriptors for every granule in `[base, base + len * GRANULE_SIZE)`.
///
/// The table is created once and never resized. Descriptors are found by their physical
/// address, the index of a descriptor is `(addr - base) / GRANULE_SIZE`.
pub struct GranuleTable {
    base: usize,
    granules: Box<[Granule]>,
}

impl GranuleTable {
    /// Creates a table in which every granule is in state [`GranuleState::Ns`],
    /// unlocked and without references.
    pub fn new(config: GranuleConfig) -> Result<Self, GranuleConfigError> {
        config.validate()?;

        let granules: Box<[Granule]> = (0..config.count).map(|_| Granule::new()).collect();

        debug!(
            "Created granule table: base={:#x}, count={}, descriptor size={} bytes",
            config.base,
            config.count,
            size_of::<Granule>()
        );

        Ok(Self {
            base: config.base,
            granules,
        })
    }

    /// Physical address of the first granule
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// First physical address behind the managed range
    #[inline]
    pub fn end(&self) -> usize {
        self.base + self.granules.len() * GRANULE_SIZE
    }

    /// Number of granules
    #[inline]
    pub fn len(&self) -> usize {
        self.granules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.granules.is_empty()
    }

    /// Iterates over all granules together with their physical addresses.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Granule)> + '_ {
        self.granules
            .iter()
            .enumerate()
            .map(move |(idx, granule)| (self.base + idx * GRANULE_SIZE, granule))
    }

    /// Index of the descriptor for `addr`, or `None` if `addr` is unaligned or out of range.
    #[inline]
    pub fn granule_index(&self, addr: usize) -> Option<usize> {
        if addr % GRANULE_SIZE != 0 || addr < self.base {
            return None;
        }

        let idx = (addr - self.base) / GRANULE_SIZE;
        if idx < self.granules.len() {
            Some(idx)
        } else {
            None
        }
    }

    /// Descriptor of the granule at `addr`.
    ///
    /// `addr` has to be aligned and inside of the managed range, otherwise this panics.
    /// Addresses from untrusted sources have to go through [`GranuleTable::find_granule`].
    pub fn addr_to_granule(&self, addr: usize) -> &Granule {
        match self.granule_index(addr) {
            Some(idx) => &self.granules[idx],
            None => panic!(
                "address {:#x} is not a granule in [{:#x}, {:#x})",
                addr,
                self.base,
                self.end()
            ),
        }
    }

    /// Physical address of `granule`.
    ///
    /// Panics if `granule` is not a descriptor of this table.
    pub fn granule_addr(&self, granule: &Granule) -> usize {
        let first = self.granules.as_ptr() as usize;
        let ptr = granule as *const Granule as usize;

        assert!(ptr >= first, "granule descriptor below the table");

        let offset = ptr - first;
        assert_eq!(
            offset % size_of::<Granule>(),
            0,
            "misaligned granule descriptor"
        );

        let idx = offset / size_of::<Granule>();
        assert!(idx < self.granules.len(), "granule descriptor above the table");

        self.base + idx * GRANULE_SIZE
    }

    /// Validating lookup for addresses of any origin.
    ///
    /// Returns `None` if `addr` is unaligned or not inside of the managed range.
    #[inline]
    pub fn find_granule(&self, addr: usize) -> Option<&Granule> {
        self.granule_index(addr).map(|idx| &self.granules[idx])
    }

    /// Looks up `addr` and locks the granule if it is in state `state`.
    ///
    /// An invalid address and a state mismatch both result in [`GranuleError::Input`],
    /// in both cases no lock is held afterwards.
    pub fn find_lock_granule(
        &self,
        addr: usize,
        state: GranuleState,
    ) -> Result<GranuleGuard<'_>, GranuleError> {
        let granule = match self.find_granule(addr) {
            Some(granule) => granule,
            None => {
                trace!("Find and lock: invalid address {:#x}", addr);
                return Err(GranuleError::Input);
            }
        };

        granule
            .lock_on_state_match(state)
            .ok_or(GranuleError::Input)
    }

    /// Like [`GranuleTable::find_lock_granule`] but additionally requires the refcount to be zero.
    ///
    /// Returns [`GranuleError::InUse`] (with the lock released) if the granule is in the
    /// expected state but still referenced.
    pub fn find_lock_unused_granule(
        &self,
        addr: usize,
        state: GranuleState,
    ) -> Result<GranuleGuard<'_>, GranuleError> {
        let guard = self.find_lock_granule(addr, state)?;

        if guard.refcount() != 0 {
            trace!(
                "Find and lock unused: granule {:#x} has {} reference(s)",
                addr,
                guard.refcount()
            );
            guard.unlock();
            return Err(GranuleError::InUse);
        }

        Ok(guard)
    }

    /// Locks all requested granules, each in its expected state.
    ///
    /// This is the only way to hold more than one granule lock at a time.
    /// Locks are always taken in ascending address order, which makes concurrent calls
    /// with overlapping requests deadlock free.
    ///
    /// Returns the guards in the order of `requests`, or `None` if
    /// - two requests name the same address
    /// - any address is unaligned or out of range
    /// - any granule is not in its expected state
    ///
    /// If `None` is returned, none of the granules is locked.
    pub fn find_lock_granules<const N: usize>(
        &self,
        requests: [GranuleRequest; N],
    ) -> Option<[GranuleGuard<'_>; N]> {
        // resolve every address before the first lock is taken
        let mut granules: [Option<&Granule>; N] = [None; N];
        for (slot, request) in granules.iter_mut().zip(requests.iter()) {
            match self.find_granule(request.addr) {
                Some(granule) => *slot = Some(granule),
                None => {
                    trace!("Lock granules: invalid address {:#x}", request.addr);
                    return None;
                }
            }
        }

        let mut order: [usize; N] = array::from_fn(|i| i);
        order.sort_unstable_by_key(|&i| requests[i].addr);

        if order
            .windows(2)
            .any(|pair| requests[pair[0]].addr == requests[pair[1]].addr)
        {
            trace!("Lock granules: duplicate address");
            return None;
        }

        let mut guards: [Option<GranuleGuard<'_>>; N] = array::from_fn(|_| None);
        for i in order {
            let granule = granules[i]?;

            // on mismatch, the locks taken so far are released when `guards` is dropped
            guards[i] = Some(granule.lock_on_state_match(requests[i].state)?);
        }

        Some(guards.map(|guard| guard.expect("every requested granule is locked")))
    }

    /// Locks two different granules, see [`GranuleTable::find_lock_granules`].
    ///
    /// The guards are returned in argument order, independent of the locking order.
    pub fn find_lock_two_granules(
        &self,
        addr1: usize,
        state1: GranuleState,
        addr2: usize,
        state2: GranuleState,
    ) -> Option<(GranuleGuard<'_>, GranuleGuard<'_>)> {
        let [first, second] = self.find_lock_granules([
            GranuleRequest::new(addr1, state1),
            GranuleRequest::new(addr2, state2),
        ])?;

        Some((first, second))
    }
}

static GRANULE_TABLE: OnceLock<GranuleTable> = OnceLock::new();

/// Creates the process-wide granule table.
///
/// Has to be called once during startup, before any other CPU uses [`granule_table`].
pub fn init_granule_table(
    config: GranuleConfig,
) -> Result<&'static GranuleTable, GranuleConfigError> {
    if GRANULE_TABLE.get().is_some() {
        return Err(GranuleConfigError::AlreadyInitialized);
    }

    let table = GranuleTable::new(config)?;
    GRANULE_TABLE
        .set(table)
        .map_err(|_| GranuleConfigError::AlreadyInitialized)?;

    debug!("Initialized process-wide granule table");

    Ok(granule_table())
}

/// The process-wide granule table.
///
/// Panics if [`init_granule_table`] was not called before.
pub fn granule_table() -> &'static GranuleTable {
    match GRANULE_TABLE.get() {
        Some(table) => table,
        None => panic!("granule table is not initialized"),
    }
}
