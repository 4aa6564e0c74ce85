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

//! Log level defintions.
//!
//! [`LogLevel`] replicates the severities of the AUTOSAR Log & Trace specification. The
//! enumeration values are exactly the values carried in the MTIN field of a DLT log message, so
//! `level as u8` may be shifted straight into the message-info byte.

use crate::error::{Error, Result};

use backtrace::Backtrace;

type StdResult<T, E> = std::result::Result<T, E>;

/// The DLT log levels.
///
/// Lower values are _more_ severe. A record at level `L` is produced by a context whose threshold
/// is `T` if and only if `L <= T` and `T` is not [`LogLevel::Off`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// no logging at all
    Off = 0x00,
    /// fatal error, the application cannot continue
    Fatal = 0x01,
    /// error with impact on correct functionality
    Error = 0x02,
    /// warning, behavior may not be as expected
    Warn = 0x03,
    /// informational message
    Info = 0x04,
    /// debug-level message
    Debug = 0x05,
    /// highest grade of information
    Verbose = 0x06,
}

impl std::default::Default for LogLevel {
    /// The default threshold is `Info`.
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// All levels, most severe first.
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Off,
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Verbose,
    ];

    /// Lower-case name as it appears in the console rendering ("info", "warn", ...)
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
        }
    }

    /// Would a record at this level be produced under `threshold`?
    pub fn passes(self, threshold: LogLevel) -> bool {
        threshold != LogLevel::Off && self <= threshold
    }

    /// Recover a level from the low three bits of an MTIN value; anything out of range is `None`.
    pub fn from_u8(x: u8) -> Option<LogLevel> {
        match x {
            0x00 => Some(LogLevel::Off),
            0x01 => Some(LogLevel::Fatal),
            0x02 => Some(LogLevel::Error),
            0x03 => Some(LogLevel::Warn),
            0x04 => Some(LogLevel::Info),
            0x05 => Some(LogLevel::Debug),
            0x06 => Some(LogLevel::Verbose),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;
    /// Parse both the configuration spelling (`kInfo`, `kWarning`, ...) and the plain lower-case
    /// names.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kOff" | "off" => Ok(LogLevel::Off),
            "kFatal" | "fatal" => Ok(LogLevel::Fatal),
            "kError" | "error" => Ok(LogLevel::Error),
            "kWarn" | "kWarning" | "warn" => Ok(LogLevel::Warn),
            "kInfo" | "info" => Ok(LogLevel::Info),
            "kDebug" | "debug" => Ok(LogLevel::Debug),
            "kVerbose" | "verbose" => Ok(LogLevel::Verbose),
            _ => Err(Error::BadLogLevel {
                text: s.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}

impl std::convert::From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Verbose,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gating_matches_threshold_for_every_pair() {
        for l in LogLevel::ALL {
            for t in LogLevel::ALL {
                let expected = (l as u8) <= (t as u8) && t != LogLevel::Off;
                assert_eq!(l.passes(t), expected, "level {} threshold {}", l, t);
            }
        }
    }

    #[test]
    fn parse_config_spellings() {
        assert_eq!("kWarning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("kVerbose".parse::<LogLevel>().unwrap(), LogLevel::Verbose);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("kLoud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn mtin_values() {
        assert_eq!(LogLevel::Info as u8, 4);
        for l in LogLevel::ALL {
            assert_eq!(LogLevel::from_u8(l as u8), Some(l));
        }
        assert_eq!(LogLevel::from_u8(7), None);
        assert_eq!(format!("{}", LogLevel::Warn), "warn");
    }
}
