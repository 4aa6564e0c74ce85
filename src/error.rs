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

//! [mw-log](crate) errors

use backtrace::Backtrace;

/// [mw-log](crate) error type
///
/// [mw-log](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of a
/// straightforward enumeration with a few match arms chosen on the basis what the caller will
/// need to repond.
///
/// Note that none of these ever reach a thread that merely _produces_ log records; failures
/// during delivery are absorbed by the sink that suffered them (see [`crate::sink::SinkHealth`]).
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// An application, context or ECU identifier was empty, too long, or not printable ASCII
    BadIdentifier { name: Vec<u8>, back: Backtrace },
    /// A context was requested for an application this runtime was not configured for
    UnknownApplication { name: String, back: Backtrace },
    /// A string could not be parsed as a log level
    BadLogLevel { text: String, back: Backtrace },
    /// A string could not be parsed as a log mode
    BadLogMode { text: String, back: Backtrace },
    /// A string could not be parsed as a queue overflow policy
    BadOverflowPolicy { text: String, back: Backtrace },
    /// The configuration document could not be parsed
    Config {
        source: serde_json::Error,
        back: Backtrace,
    },
    /// Malformed wire bytes
    Decode { what: String, back: Backtrace },
    /// A single argument is longer than its 16-bit length field can describe
    ArgumentTooLong { len: usize, back: Backtrace },
    /// A sink panicked while delivering or flushing
    SinkPanicked { sink: String, back: Backtrace },
    /// General transport layer error
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// I/O error
    Io {
        source: std::io::Error,
        back: Backtrace,
    },
}

impl Error {
    pub(crate) fn decode(what: impl Into<String>) -> Error {
        Error::Decode {
            what: what.into(),
            back: Backtrace::new(),
        }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            source: err,
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadIdentifier { name, .. } => write!(
                f,
                "{:?} is not a valid logging identifier (one to four printable ASCII characters)",
                String::from_utf8_lossy(name)
            ),
            Error::UnknownApplication { name, .. } => {
                write!(f, "Application id '{}' is not configured", name)
            }
            Error::BadLogLevel { text, .. } => {
                write!(f, "'{}' does not name a valid log level", text)
            }
            Error::BadLogMode { text, .. } => write!(
                f,
                "'{}' does not name a valid log mode; expected kRemote, kConsole or kFile",
                text
            ),
            Error::BadOverflowPolicy { text, .. } => write!(
                f,
                "'{}' is not an overflow policy; expected kDropNewest, kDropOldest or kBlock",
                text
            ),
            Error::Config { source, .. } => {
                write!(f, "While parsing configuration, got {}", source)
            }
            Error::Decode { what, .. } => write!(f, "Malformed DLT data: {}", what),
            Error::ArgumentTooLong { len, .. } => write!(
                f,
                "An argument of {} bytes cannot be described by a 16-bit length field",
                len
            ),
            Error::SinkPanicked { sink, .. } => write!(f, "Sink '{}' panicked", sink),
            Error::Transport { source, .. } => write!(f, "Transport error: {}", source),
            Error::Io { source, .. } => write!(f, "I/O error: {}", source),
            _ => write!(f, "Other mw-log error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadIdentifier { name: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::UnknownApplication { name: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Config { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Decode { what: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Transport { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Io { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            err => write!(f, "mw-log error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
