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

//! Log records & the builder that produces them.
//!
//! A [`LogRecordBuilder`] is handed out by [`LogContext::begin_record`] and lives on the producing
//! thread for the duration of one log statement. Each argument is encoded into the payload as it
//! is added, so that [`finalize`] merely stamps the header & freezes the buffer. The resulting
//! [`LogRecord`] is immutable and cheap to clone (the payload is a reference-counted [`Bytes`]),
//! so that each sink may hold its own copy.
//!
//! [`LogContext::begin_record`]: crate::context::LogContext::begin_record
//! [`finalize`]: LogRecordBuilder::finalize

use crate::{
    argument::Argument,
    encoding::{self, TYPE_INFO_SIZE},
    error::Result,
    identifier::LoggingIdentifier,
    level::LogLevel,
};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tracing::warn;

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

/// Most arguments a DLT message can announce (`NOAR` is one byte)
pub const MAX_ARGUMENTS: usize = 255;
/// Largest payload that fits in one DLT message: a 16-bit length field less 22 header bytes
pub const MAX_PAYLOAD_SIZE: usize = 65_513;
/// Substituted for an argument that could not be encoded.
pub const ENCODING_ERROR_SENTINEL: &str = "<unencodable>";
/// Width of the message id heading a non-verbose payload
pub const MESSAGE_ID_SIZE: usize = 4;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          RecordLimits                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Capacity limits applied to each record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordLimits {
    max_arguments: usize,
    max_payload: usize,
}

impl std::default::Default for RecordLimits {
    fn default() -> Self {
        RecordLimits {
            max_arguments: MAX_ARGUMENTS,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

impl RecordLimits {
    /// Both limits are clamped to the protocol maxima.
    pub fn new(max_arguments: usize, max_payload: usize) -> RecordLimits {
        RecordLimits {
            max_arguments: std::cmp::min(max_arguments, MAX_ARGUMENTS),
            max_payload: std::cmp::min(max_payload, MAX_PAYLOAD_SIZE),
        }
    }
    pub fn max_arguments(&self) -> usize {
        self.max_arguments
    }
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          RecordClock                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Source of sequence numbers & timestamps shared by every context of one runtime.
#[derive(Debug)]
pub struct RecordClock {
    ecu_id: LoggingIdentifier,
    start: Instant,
    sequence: AtomicU64,
}

/// The stamp applied to one record at finalization
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    /// Monotonically increasing across all contexts sharing a clock
    pub sequence: u64,
    /// Time since the clock was created, in units of 0.1ms (wraps after about five days)
    pub ticks: u32,
    /// Wall-clock time
    pub time: DateTime<Utc>,
}

impl RecordClock {
    pub fn new(ecu_id: LoggingIdentifier) -> RecordClock {
        RecordClock {
            ecu_id,
            start: Instant::now(),
            sequence: AtomicU64::new(0),
        }
    }
    pub fn ecu_id(&self) -> LoggingIdentifier {
        self.ecu_id
    }
    pub fn stamp(&self) -> Stamp {
        Stamp {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            ticks: (self.start.elapsed().as_micros() / 100) as u32,
            time: Utc::now(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           LogRecord                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything about a record but its payload
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub ecu_id: LoggingIdentifier,
    pub app_id: LoggingIdentifier,
    pub ctx_id: LoggingIdentifier,
    pub level: LogLevel,
    pub verbose: bool,
    /// Number of arguments actually in the payload
    pub argument_count: u8,
    pub stamp: Stamp,
}

/// A finished, immutable log record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    header: RecordHeader,
    payload: Bytes,
}

impl LogRecord {
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }
    /// The encoded payload; in non-verbose mode this begins with the message id.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
    /// A cheap, shared handle to the payload
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }
    /// The message id of a non-verbose record; `None` in verbose mode.
    pub fn message_id(&self) -> Option<u32> {
        if self.header.verbose || self.payload.len() < MESSAGE_ID_SIZE {
            return None;
        }
        let mut id = [0u8; MESSAGE_ID_SIZE];
        id.copy_from_slice(&self.payload[..MESSAGE_ID_SIZE]);
        Some(u32::from_le_bytes(id))
    }
    /// Decode the arguments of a verbose record.
    pub fn arguments(&self) -> Result<Vec<Argument>> {
        if !self.header.verbose {
            return Err(crate::error::Error::decode(
                "a non-verbose payload cannot be decoded without its schema",
            ));
        }
        encoding::decode_payload(&self.payload, self.header.argument_count as usize)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        LogRecordBuilder                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Outcome of [`LogRecordBuilder::add_argument`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddArgumentResult {
    /// The argument (possibly cropped to the remaining space) is in the payload
    Added,
    /// The record is full; the argument was discarded
    NotAdded,
}

/// Accumulates the arguments of one log statement.
///
/// Once an argument has been refused (or cropped to fit), every further argument is refused too:
/// a record never has "holes" in it.
#[derive(Debug)]
pub struct LogRecordBuilder {
    ecu_id: LoggingIdentifier,
    app_id: LoggingIdentifier,
    ctx_id: LoggingIdentifier,
    level: LogLevel,
    verbose: bool,
    limits: RecordLimits,
    payload: BytesMut,
    count: usize,
    full: bool,
}

impl LogRecordBuilder {
    /// Start a verbose record.
    pub fn new(
        ecu_id: LoggingIdentifier,
        app_id: LoggingIdentifier,
        ctx_id: LoggingIdentifier,
        level: LogLevel,
        limits: RecordLimits,
    ) -> LogRecordBuilder {
        LogRecordBuilder {
            ecu_id,
            app_id,
            ctx_id,
            level,
            verbose: true,
            limits,
            payload: BytesMut::with_capacity(256),
            count: 0,
            full: false,
        }
    }
    /// Start a non-verbose record: the payload opens with `message_id` & arguments carry no type
    /// info.
    pub fn non_verbose(
        ecu_id: LoggingIdentifier,
        app_id: LoggingIdentifier,
        ctx_id: LoggingIdentifier,
        level: LogLevel,
        limits: RecordLimits,
        message_id: u32,
    ) -> LogRecordBuilder {
        let mut builder = LogRecordBuilder::new(ecu_id, app_id, ctx_id, level, limits);
        builder.verbose = false;
        builder.payload.put_u32_le(message_id);
        builder
    }
    pub fn level(&self) -> LogLevel {
        self.level
    }
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
    /// Number of arguments accepted so far
    pub fn argument_count(&self) -> usize {
        self.count
    }
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
    /// Has the builder started refusing arguments?
    pub fn is_full(&self) -> bool {
        self.full
    }

    fn put(&mut self, arg: &Argument) -> Result<()> {
        if self.verbose {
            encoding::put_verbose(arg, &mut self.payload)
        } else {
            encoding::put_data(arg, &mut self.payload)
        }
    }

    /// Append one argument.
    ///
    /// Fixed-width arguments that don't fit are refused; strings, raw & trace buffers are cropped
    /// to the remaining space if at least their length header fits.
    pub fn add_argument<A: Into<Argument>>(&mut self, arg: A) -> AddArgumentResult {
        if self.full {
            return AddArgumentResult::NotAdded;
        }
        if self.count >= self.limits.max_arguments {
            self.full = true;
            return AddArgumentResult::NotAdded;
        }

        let mut arg = arg.into();
        let remaining = self.limits.max_payload.saturating_sub(self.payload.len());
        if encoding::encoded_len(&arg, self.verbose) > remaining {
            self.full = true;
            let overhead = if self.verbose { TYPE_INFO_SIZE } else { 0 };
            match remaining
                .checked_sub(overhead)
                .and_then(|room| encoding::crop(&arg, room))
            {
                Some(cropped) => arg = cropped,
                None => return AddArgumentResult::NotAdded,
            }
        }

        if let Err(err) = self.put(&arg) {
            warn!(
                "failed to encode a {} argument ({}); substituting {:?}",
                arg.type_name(),
                err,
                ENCODING_ERROR_SENTINEL
            );
            let sentinel = Argument::from(ENCODING_ERROR_SENTINEL);
            if encoding::encoded_len(&sentinel, self.verbose) > remaining
                || self.put(&sentinel).is_err()
            {
                self.full = true;
                return AddArgumentResult::NotAdded;
            }
        }

        self.count += 1;
        AddArgumentResult::Added
    }

    /// Stamp the header & freeze the payload.
    pub fn finalize(self, clock: &RecordClock) -> LogRecord {
        LogRecord {
            header: RecordHeader {
                ecu_id: self.ecu_id,
                app_id: self.app_id,
                ctx_id: self.ctx_id,
                level: self.level,
                verbose: self.verbose,
                argument_count: self.count as u8,
                stamp: clock.stamp(),
            },
            payload: self.payload.freeze(),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn id(s: &str) -> LoggingIdentifier {
        LoggingIdentifier::new(s).unwrap()
    }

    fn builder(limits: RecordLimits) -> LogRecordBuilder {
        LogRecordBuilder::new(id("ECU1"), id("EXA"), id("DFLT"), LogLevel::Info, limits)
    }

    #[test]
    fn bare_message() {
        let clock = RecordClock::new(id("ECU1"));
        let record = builder(RecordLimits::default()).finalize(&clock);
        assert_eq!(record.header().argument_count, 0);
        assert!(record.payload().is_empty());
        assert!(record.arguments().unwrap().is_empty());
    }

    #[test]
    fn preserves_order() {
        let clock = RecordClock::new(id("ECU1"));
        let mut b = builder(RecordLimits::default());
        assert_eq!(b.add_argument("Logging"), AddArgumentResult::Added);
        assert_eq!(b.add_argument(123u8), AddArgumentResult::Added);
        assert_eq!(b.add_argument(-7i64), AddArgumentResult::Added);
        let record = b.finalize(&clock);
        assert_eq!(record.header().argument_count, 3);
        assert_eq!(
            record.arguments().unwrap(),
            vec![
                Argument::Str("Logging".to_string()),
                Argument::U8(123),
                Argument::I64(-7)
            ]
        );
    }

    #[test]
    fn argument_count_limit() {
        let clock = RecordClock::new(id("ECU1"));
        let mut b = builder(RecordLimits::new(3, MAX_PAYLOAD_SIZE));
        for i in 0..5u32 {
            let expected = if i < 3 {
                AddArgumentResult::Added
            } else {
                AddArgumentResult::NotAdded
            };
            assert_eq!(b.add_argument(i), expected);
        }
        let record = b.finalize(&clock);
        assert_eq!(record.header().argument_count, 3);
        assert_eq!(record.arguments().unwrap().len(), 3);
    }

    #[test]
    fn payload_limit_refuses_and_stays_refused() {
        let clock = RecordClock::new(id("ECU1"));
        // room for two u32s (8 bytes apiece) & a bit
        let mut b = builder(RecordLimits::new(MAX_ARGUMENTS, 20));
        assert_eq!(b.add_argument(1u32), AddArgumentResult::Added);
        assert_eq!(b.add_argument(2u32), AddArgumentResult::Added);
        assert_eq!(b.add_argument(3u64), AddArgumentResult::NotAdded);
        // would have fit, but the record is closed
        assert_eq!(b.add_argument(true), AddArgumentResult::NotAdded);
        let record = b.finalize(&clock);
        assert_eq!(record.header().argument_count, 2);
    }

    #[test]
    fn strings_are_cropped() {
        let clock = RecordClock::new(id("ECU1"));
        let mut b = builder(RecordLimits::new(MAX_ARGUMENTS, 12));
        assert_eq!(
            b.add_argument("Logging Application"),
            AddArgumentResult::Added
        );
        assert!(b.is_full());
        assert_eq!(b.payload_len(), 12);
        let record = b.finalize(&clock);
        // 4 type info + 2 length + 5 text + NUL
        assert_eq!(
            record.arguments().unwrap(),
            vec![Argument::Str("Loggi".to_string())]
        );
    }

    #[test]
    fn non_verbose_layout() {
        let clock = RecordClock::new(id("ECU1"));
        let mut b = LogRecordBuilder::non_verbose(
            id("ECU1"),
            id("EXA"),
            id("DFLT"),
            LogLevel::Warn,
            RecordLimits::default(),
            0x1234,
        );
        b.add_argument(7u16);
        let record = b.finalize(&clock);
        assert!(!record.header().verbose);
        assert_eq!(record.message_id(), Some(0x1234));
        assert_eq!(record.payload(), &[0x34, 0x12, 0, 0, 7, 0]);
        assert!(record.arguments().is_err());
    }

    #[test]
    fn sequence_increases() {
        let clock = RecordClock::new(id("ECU1"));
        let first = builder(RecordLimits::default()).finalize(&clock);
        let second = builder(RecordLimits::default()).finalize(&clock);
        assert!(second.header().stamp.sequence > first.header().stamp.sequence);
        assert!(second.header().stamp.ticks >= first.header().stamp.ticks);
    }
}
