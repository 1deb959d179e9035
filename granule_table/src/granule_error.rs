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

/// Recoverable outcomes of the validating lookup and locking operations.
///
/// Contract violations of trusted callers are not represented here, they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GranuleError {
    /// Address is unaligned or outside of the managed range,
    /// or the granule is not in the expected state
    Input,

    /// Granule is in the expected state but still referenced
    InUse,
}

/// Status values reported to the command-dispatch layer.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmiStatus {
    Success = 0,
    ErrorInput = 1,
    ErrorInUse = 2,
}

impl GranuleError {
    pub const fn status(&self) -> RmiStatus {
        match self {
            GranuleError::Input => RmiStatus::ErrorInput,
            GranuleError::InUse => RmiStatus::ErrorInUse,
        }
    }

    #[inline]
    pub const fn status_code(&self) -> usize {
        self.status() as usize
    }
}

impl<T> From<Result<T, GranuleError>> for RmiStatus {
    fn from(res: Result<T, GranuleError>) -> Self {
        match res {
            Ok(_) => RmiStatus::Success,
            Err(err) => err.status(),
        }
    }
}

impl fmt::Display for GranuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GranuleError::Input => write!(f, "invalid granule address or state"),
            GranuleError::InUse => write!(f, "granule is still in use"),
        }
    }
}

impl std::error::Error for GranuleError {}
