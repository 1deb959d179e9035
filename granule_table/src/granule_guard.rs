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

use core::{fmt, sync::atomic::Ordering};

use try_lock::Locked;

use crate::{granule::Granule, granule_state::GranuleState};

/// Proof that the lock of a [`Granule`] is held.
///
/// Reading or changing the state and the lock-protected refcount operations are only
/// possible through this type. The lock is released when the guard is dropped,
/// by [`GranuleGuard::unlock`] or by [`GranuleGuard::unlock_transition`].
pub struct GranuleGuard<'a> {
    granule: &'a Granule,
    state: Locked<'a, GranuleState>,
}

impl<'a> GranuleGuard<'a> {
    pub(crate) fn new(granule: &'a Granule, state: Locked<'a, GranuleState>) -> Self {
        Self { granule, state }
    }

    /// The locked granule
    #[inline]
    pub fn granule(&self) -> &'a Granule {
        self.granule
    }

    #[inline]
    pub fn state(&self) -> GranuleState {
        *self.state
    }

    /// Changes the state. Any state may follow any other state.
    #[inline]
    pub fn set_state(&mut self, state: GranuleState) {
        *self.state = state;
    }

    /// Releases the lock without changing the state.
    #[inline]
    pub fn unlock(self) {
        drop(self);
    }

    /// Changes the state to `next` and releases the lock.
    ///
    /// The store of the new state happens before the lock is released,
    /// so the next owner of the lock can never observe the old state.
    #[inline]
    pub fn unlock_transition(mut self, next: GranuleState) {
        self.set_state(next);
        drop(self);
    }

    #[inline]
    pub fn refcount(&self) -> u64 {
        self.granule.refcount_cell().load(Ordering::Relaxed)
    }

    /// Increments the refcount by one.
    #[inline]
    pub fn get(&mut self) {
        self.refcount_inc(1);
    }

    /// Decrements the refcount by one. Panics on underflow.
    #[inline]
    pub fn put(&mut self) {
        self.refcount_dec(1);
    }

    /// Increments the refcount by `val`.
    pub fn refcount_inc(&mut self, val: u64) {
        // plain read-modify-write: the lock serializes all writers of this family
        let refcount = self.refcount();
        let new_refcount = match refcount.checked_add(val) {
            Some(new_refcount) => new_refcount,
            None => panic!("granule refcount overflow ({} + {})", refcount, val),
        };

        self.granule
            .refcount_cell()
            .store(new_refcount, Ordering::Relaxed);
    }

    /// Decrements the refcount by `val`. Panics if this would go below zero.
    pub fn refcount_dec(&mut self, val: u64) {
        let refcount = self.refcount();
        let new_refcount = match refcount.checked_sub(val) {
            Some(new_refcount) => new_refcount,
            None => panic!("granule refcount underflow ({} - {})", refcount, val),
        };

        self.granule
            .refcount_cell()
            .store(new_refcount, Ordering::Relaxed);
    }

    /// Checks the invariants every unlocked granule has to satisfy.
    fn assert_unlocked_invariants(&self) {
        if let GranuleState::Delegated = *self.state {
            assert_eq!(
                self.refcount(),
                0,
                "delegated granule is released with a non-zero refcount"
            );
        }
    }
}

impl Drop for GranuleGuard<'_> {
    fn drop(&mut self) {
        // runs before `state` is dropped, i.e. while the lock is still held
        if cfg!(debug_assertions) && !std::thread::panicking() {
            self.assert_unlocked_invariants();
        }
    }
}

impl fmt::Debug for GranuleGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GranuleGuard")
            .field("state", &self.state())
            .field("refcount", &self.refcount())
            .finish()
    }
}
