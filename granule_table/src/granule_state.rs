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

use crate::granule_error::GranuleError;

/// The role a granule currently plays.
///
/// The set is closed and ordered by its raw value, so it can be iterated from
/// [`GranuleState::Ns`] to [`GranuleState::LAST`].
/// Which state may follow which is up to the caller, this crate only stores it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum GranuleState {
    /// Owned by the non-secure host (initial state of every granule)
    #[default]
    Ns = 0,
    /// Delegated to the monitor but not used for anything yet
    Delegated = 1,
    /// Holds a realm descriptor
    Rd = 2,
    /// Holds a realm execution context
    Rec = 3,
    /// Auxiliary storage of a realm execution context
    RecAux = 4,
    /// Holds realm data
    Data = 5,
    /// Holds a realm translation table
    Rtt = 6,
}

impl GranuleState {
    pub const LAST: GranuleState = GranuleState::Rtt;

    pub const COUNT: usize = Self::LAST as usize + 1;

    pub const ALL: [GranuleState; Self::COUNT] = [
        GranuleState::Ns,
        GranuleState::Delegated,
        GranuleState::Rd,
        GranuleState::Rec,
        GranuleState::RecAux,
        GranuleState::Data,
        GranuleState::Rtt,
    ];

    /// Iterates over all states in ascending order.
    pub fn iter() -> impl Iterator<Item = GranuleState> + Clone {
        Self::ALL.into_iter()
    }

    #[inline]
    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Converts a trusted raw value.
    ///
    /// Panics if `raw` is not part of the enumeration.
    /// Use `GranuleState::try_from` for values from untrusted sources.
    pub fn from_raw(raw: u8) -> Self {
        match Self::try_from(raw) {
            Ok(state) => state,
            Err(_) => panic!("invalid granule state {}", raw),
        }
    }

    /// The state that follows `self` when iterating, wrapping around after [`GranuleState::LAST`].
    pub const fn next_wrapping(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::COUNT]
    }
}

impl TryFrom<u8> for GranuleState {
    type Error = GranuleError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(GranuleError::Input)
    }
}

impl From<GranuleState> for u8 {
    fn from(state: GranuleState) -> Self {
        state.as_raw()
    }
}

impl fmt::Display for GranuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GranuleState::Ns => "NS",
            GranuleState::Delegated => "DELEGATED",
            GranuleState::Rd => "RD",
            GranuleState::Rec => "REC",
            GranuleState::RecAux => "REC_AUX",
            GranuleState::Data => "DATA",
            GranuleState::Rtt => "RTT",
        };
        f.write_str(name)
    }
}
