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

use core::{
    hint::spin_loop,
    mem::size_of,
    sync::atomic::{AtomicU64, Ordering},
};

use log::trace;
use static_assertions::const_assert;
use try_lock::{Locked, TryLock};

use crate::{granule_guard::GranuleGuard, granule_state::GranuleState};

/// Descriptor of a single granule.
///
/// The state is only reachable through the lock, i.e. through a [`GranuleGuard`].
/// The reference counter can be accessed in two ways:
///
/// - with the lock held, through [`GranuleGuard::get`], [`GranuleGuard::put`],
///   [`GranuleGuard::refcount_inc`] and [`GranuleGuard::refcount_dec`]
/// - without the lock, through the `atomic_*` functions of this type
///
/// Callers pick one of the two for the lifetime of a granule's role and never mix them.
/// Mixing them is not detected.
#[repr(C)]
pub struct Granule {
    lock: TryLock<GranuleState>,
    refcount: AtomicU64,
}

const_assert!(size_of::<Granule>() <= 16);

impl Granule {
    /// A granule in state [`GranuleState::Ns`], unlocked, with a refcount of zero
    pub fn new() -> Self {
        Self {
            lock: TryLock::new(GranuleState::Ns),
            refcount: AtomicU64::new(0),
        }
    }

    /// Spins until the lock is acquired.
    fn acquire(&self) -> Locked<'_, GranuleState> {
        loop {
            if let Some(locked) = self.lock.try_lock() {
                return locked;
            }
            spin_loop();
        }
    }

    /// Acquires the lock and checks that the granule is in state `expected`.
    ///
    /// The caller has to know the state already, a mismatch is a bug and panics.
    pub fn lock(&self, expected: GranuleState) -> GranuleGuard<'_> {
        let locked = self.acquire();
        let state = *locked;

        if state != expected {
            drop(locked);
            panic!(
                "granule is in state {} but was expected to be in state {}",
                state, expected
            );
        }

        GranuleGuard::new(self, locked)
    }

    /// Acquires the lock if the granule is in state `expected`.
    ///
    /// Returns `None` and leaves the lock released otherwise.
    pub fn lock_on_state_match(&self, expected: GranuleState) -> Option<GranuleGuard<'_>> {
        let locked = self.acquire();

        if *locked != expected {
            trace!("Lock: state {} does not match {}", *locked, expected);
            return None;
        }

        Some(GranuleGuard::new(self, locked))
    }

    /// Single attempt to take the lock without spinning and without checking the state.
    ///
    /// Returns `None` if someone else (including the current thread) holds the lock.
    #[cfg(test)]
    pub(crate) fn try_lock(&self) -> Option<GranuleGuard<'_>> {
        self.lock
            .try_lock()
            .map(|locked| GranuleGuard::new(self, locked))
    }

    /// Returns whether the lock is held right now.
    ///
    /// Takes the lock for a moment if it is free, so this must not race with
    /// other lockers of the same granule.
    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        // bypasses GranuleGuard to skip the unlock checks
        self.lock.try_lock().is_none()
    }

    pub(crate) fn refcount_cell(&self) -> &AtomicU64 {
        &self.refcount
    }

    /// Increments the refcount without holding the lock.
    #[inline]
    pub fn atomic_get(&self) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the refcount without holding the lock.
    ///
    /// Panics if the refcount was already zero.
    #[inline]
    pub fn atomic_put(&self) {
        let old = self.refcount.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "granule refcount underflow");
    }

    /// Decrements the refcount with release semantics.
    ///
    /// All memory accesses done before this call are visible to a CPU that
    /// observes the new value with [`Granule::refcount_read_acquire`].
    /// Panics if the refcount was already zero.
    #[inline]
    pub fn atomic_put_release(&self) {
        let old = self.refcount.fetch_sub(1, Ordering::Release);
        assert!(old > 0, "granule refcount underflow");
    }

    #[inline]
    pub fn refcount_read_relaxed(&self) -> u64 {
        self.refcount.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn refcount_read_acquire(&self) -> u64 {
        self.refcount.load(Ordering::Acquire)
    }
}

impl Default for Granule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use core::{
        mem::align_of,
        sync::atomic::{AtomicU64, Ordering},
    };
    use std::panic::AssertUnwindSafe;

    use memoffset::offset_of;

    use super::Granule;
    use crate::GranuleState;

    #[test]
    fn test_granule_layout() {
        const REFCOUNT_OFFSET: usize = offset_of!(Granule, refcount);
        assert_eq!(REFCOUNT_OFFSET % align_of::<AtomicU64>(), 0);
    }

    #[test]
    fn test_new_granule() {
        let granule = Granule::new();
        assert!(!granule.is_locked());
        assert_eq!(granule.refcount_read_relaxed(), 0);
        assert_eq!(granule.lock(GranuleState::Ns).state(), GranuleState::Ns);
        assert!(!granule.is_locked());
    }

    #[test]
    fn test_double_acquisition_is_refused() {
        // the lock is not reentrant: a second attempt from the same thread has to fail
        let granule = Granule::new();
        let guard = granule.try_lock().unwrap();
        assert!(granule.is_locked());
        assert!(granule.try_lock().is_none());
        drop(guard);

        assert!(!granule.is_locked());
        assert!(granule.try_lock().is_some());
    }

    #[test]
    #[should_panic]
    fn test_lock_wrong_state() {
        let granule = Granule::new();
        granule.lock(GranuleState::Delegated);
    }

    #[test]
    fn test_lock_wrong_state_releases_lock() {
        let granule = Granule::new();
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            granule.lock(GranuleState::Rd);
        }));
        assert!(res.is_err());
        assert!(!granule.is_locked());
    }

    #[test]
    fn test_atomic_put_release_ordering() {
        let granule = Granule::new();
        granule.atomic_get();
        granule.atomic_get();
        granule.atomic_put_release();
        assert_eq!(granule.refcount_read_acquire(), 1);
        granule.atomic_put();
        assert_eq!(granule.refcount_cell().load(Ordering::Relaxed), 0);
    }

    #[test]
    #[should_panic]
    fn test_atomic_put_underflow() {
        let granule = Granule::new();
        granule.atomic_put();
    }

    #[test]
    #[should_panic]
    fn test_atomic_put_release_underflow() {
        let granule = Granule::new();
        granule.atomic_get();
        granule.atomic_put_release();
        granule.atomic_put_release();
    }
}
