// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of mw-log.
//
// mw-log is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mw-log is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mw-log.  If not,
// see <http://www.gnu.org/licenses/>.

//! Fixed-width DLT identifiers.
//!
//! Application ids, context ids & ECU ids all travel on the wire as exactly four bytes, NUL-padded
//! when the textual id is shorter.

use crate::error::{Error, Result};

use backtrace::Backtrace;

type StdResult<T, E> = std::result::Result<T, E>;

/// Width of every DLT identifier, in bytes
pub const ID_SIZE: usize = 4;

/// A four-byte, NUL-padded identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoggingIdentifier([u8; ID_SIZE]);

impl LoggingIdentifier {
    /// An identifier must be one to four bytes of printable, non-blank ASCII.
    pub fn new(id: &str) -> Result<LoggingIdentifier> {
        let bytes = id.as_bytes();
        if bytes.is_empty() || bytes.len() > ID_SIZE || !bytes.iter().all(|b| b.is_ascii_graphic())
        {
            return Err(Error::BadIdentifier {
                name: bytes.to_vec(),
                back: Backtrace::new(),
            });
        }
        let mut data = [0u8; ID_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(LoggingIdentifier(data))
    }
    /// Reconstitute an identifier from its wire form; no validation is performed.
    pub fn from_bytes(data: [u8; ID_SIZE]) -> LoggingIdentifier {
        LoggingIdentifier(data)
    }
    /// The wire form
    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
    /// The textual form, stopping at the first NUL
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(ID_SIZE);
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl std::fmt::Display for LoggingIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Debug for LoggingIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "LoggingIdentifier({:?})", self.as_str())
    }
}

impl std::convert::TryFrom<&str> for LoggingIdentifier {
    type Error = Error;
    fn try_from(x: &str) -> StdResult<Self, Self::Error> {
        LoggingIdentifier::new(x)
    }
}

/// Produce a [`Vec`] of bytes from an [`OsString`](std::ffi::OsString).
#[cfg(unix)]
fn bytes_from_os_str(s: std::ffi::OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    s.into_vec()
}

#[cfg(not(unix))]
fn bytes_from_os_str(s: std::ffi::OsString) -> Vec<u8> {
    s.to_string_lossy().as_bytes().to_vec()
}

/// Attempt to derive an ECU id from this host's name.
///
/// Takes the first four printable ASCII bytes of [gethostname()]; if the hostname can't be had,
/// or contributes nothing usable, returns `fallback`.
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
pub fn ecu_from_hostname(fallback: LoggingIdentifier) -> LoggingIdentifier {
    hostname::get()
        .map(bytes_from_os_str)
        .ok()
        .and_then(|bytes| {
            let id: String = bytes
                .iter()
                .filter(|b| b.is_ascii_graphic())
                .take(ID_SIZE)
                .map(|b| *b as char)
                .collect();
            LoggingIdentifier::new(&id).ok()
        })
        .unwrap_or(fallback)
}
