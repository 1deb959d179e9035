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

use core::fmt;

use static_assertions::const_assert;

/// log2 of the granule size
pub const GRANULE_SHIFT: usize = 12;

/// Size of a single granule in bytes
pub const GRANULE_SIZE: usize = 1 << GRANULE_SHIFT;

/// Maximum number of CPUs that can call into the granule table concurrently.
///
/// Every CPU owns its own set of buffer slots (see [`crate::modules::buffer::BufferSlot`]).
pub const MAX_CPUS: usize = 16;

const_assert!(GRANULE_SIZE.is_power_of_two());
const_assert!(GRANULE_SIZE >= 4096);
const_assert!(MAX_CPUS > 0);

/// Describes the physical memory range that is managed by a [`crate::GranuleTable`].
///
/// The range is `[base, base + count * GRANULE_SIZE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GranuleConfig {
    /// Physical address of the first granule
    pub base: usize,

    /// Number of granules in the range
    pub count: usize,
}

impl GranuleConfig {
    pub const fn new(base: usize, count: usize) -> Self {
        Self { base, count }
    }

    /// Size of the managed range in bytes, if it fits into the address space.
    pub const fn size(&self) -> Option<usize> {
        self.count.checked_mul(GRANULE_SIZE)
    }

    /// First address behind the managed range.
    pub const fn end(&self) -> Option<usize> {
        match self.size() {
            Some(size) => self.base.checked_add(size),
            None => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), GranuleConfigError> {
        if self.base % GRANULE_SIZE != 0 {
            return Err(GranuleConfigError::UnalignedBase);
        }

        if self.count == 0 {
            return Err(GranuleConfigError::Empty);
        }

        if self.end().is_none() {
            return Err(GranuleConfigError::Overflow);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranuleConfigError {
    /// `base` is not a multiple of `GRANULE_SIZE`
    UnalignedBase,

    /// `count` is zero
    Empty,

    /// `base + count * GRANULE_SIZE` does not fit into `usize`
    Overflow,

    /// The process-wide granule table was already created
    AlreadyInitialized,
}

impl fmt::Display for GranuleConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GranuleConfigError::UnalignedBase => {
                write!(f, "base address is not aligned to {} bytes", GRANULE_SIZE)
            }
            GranuleConfigError::Empty => write!(f, "granule count is zero"),
            GranuleConfigError::Overflow => write!(f, "granule range exceeds the address space"),
            GranuleConfigError::AlreadyInitialized => {
                write!(f, "granule table is already initialized")
            }
        }
    }
}

impl std::error::Error for GranuleConfigError {}

#[cfg(test)]
mod test {
    use super::{GranuleConfig, GranuleConfigError, GRANULE_SIZE};

    #[test]
    fn test_validate_config() {
        assert_eq!(GranuleConfig::new(0x8000_0000, 16).validate(), Ok(()));
        assert_eq!(GranuleConfig::new(0, 1).validate(), Ok(()));

        assert_eq!(
            GranuleConfig::new(0x8000_0000 + 8, 16).validate(),
            Err(GranuleConfigError::UnalignedBase)
        );
        assert_eq!(
            GranuleConfig::new(0x8000_0000, 0).validate(),
            Err(GranuleConfigError::Empty)
        );
        assert_eq!(
            GranuleConfig::new(usize::MAX - GRANULE_SIZE + 1, 2).validate(),
            Err(GranuleConfigError::Overflow)
        );
        assert_eq!(
            GranuleConfig::new(GRANULE_SIZE, usize::MAX / 2).validate(),
            Err(GranuleConfigError::Overflow)
        );
    }

    #[test]
    fn test_config_end() {
        let config = GranuleConfig::new(0x1000, 3);
        assert_eq!(config.size(), Some(3 * GRANULE_SIZE));
        assert_eq!(config.end(), Some(0x1000 + 3 * GRANULE_SIZE));
    }
}
