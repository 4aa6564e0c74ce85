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

//! Logging contexts.
//!
//! A [`LogContext`] scopes records to one application id & one context id, and gates them by
//! level. The threshold is an atomic, so [`should_log`](LogContext::should_log) costs one relaxed
//! load and may be changed at runtime from any thread; a builder that has already been begun
//! keeps the level it was begun with.

use crate::{
    identifier::LoggingIdentifier,
    level::LogLevel,
    record::{LogRecord, LogRecordBuilder, RecordClock, RecordLimits},
    router::SinkRouter,
    sink,
    stream::LogStream,
};

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

pub struct LogContext {
    app_id: LoggingIdentifier,
    ctx_id: LoggingIdentifier,
    threshold: AtomicU8,
    verbose: bool,
    limits: RecordLimits,
    clock: Arc<RecordClock>,
    router: Arc<SinkRouter>,
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext")
            .field("app_id", &self.app_id)
            .field("ctx_id", &self.ctx_id)
            .field("threshold", &self.threshold())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl LogContext {
    pub fn new(
        app_id: LoggingIdentifier,
        ctx_id: LoggingIdentifier,
        threshold: LogLevel,
        verbose: bool,
        limits: RecordLimits,
        clock: Arc<RecordClock>,
        router: Arc<SinkRouter>,
    ) -> LogContext {
        LogContext {
            app_id,
            ctx_id,
            threshold: AtomicU8::new(threshold as u8),
            verbose,
            limits,
            clock,
            router,
        }
    }
    pub fn app_id(&self) -> LoggingIdentifier {
        self.app_id
    }
    pub fn ctx_id(&self) -> LoggingIdentifier {
        self.ctx_id
    }
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
    pub fn threshold(&self) -> LogLevel {
        LogLevel::from_u8(self.threshold.load(Ordering::Relaxed)).unwrap_or(LogLevel::Off)
    }
    /// Change the threshold; takes effect for records begun afterward.
    pub fn set_threshold(&self, level: LogLevel) {
        self.threshold.store(level as u8, Ordering::Relaxed);
    }
    pub fn should_log(&self, level: LogLevel) -> bool {
        level.passes(self.threshold())
    }

    /// Begin a record at `level`, in this context's mode (a non-verbose record gets message id
    /// zero).
    ///
    /// Returns `None`, having allocated nothing, if `level` doesn't pass the threshold or if the
    /// calling thread is itself delivering records.
    pub fn begin_record(&self, level: LogLevel) -> Option<LogRecordBuilder> {
        if self.verbose {
            self.begin(level, None)
        } else {
            self.begin(level, Some(0))
        }
    }

    /// Begin a non-verbose record carrying `message_id`.
    pub fn begin_record_with_id(
        &self,
        level: LogLevel,
        message_id: u32,
    ) -> Option<LogRecordBuilder> {
        self.begin(level, Some(message_id))
    }

    fn begin(&self, level: LogLevel, message_id: Option<u32>) -> Option<LogRecordBuilder> {
        if !self.should_log(level) || sink::in_delivery() {
            return None;
        }
        let ecu_id = self.clock.ecu_id();
        Some(match message_id {
            None => LogRecordBuilder::new(ecu_id, self.app_id, self.ctx_id, level, self.limits),
            Some(id) => LogRecordBuilder::non_verbose(
                ecu_id,
                self.app_id,
                self.ctx_id,
                level,
                self.limits,
                id,
            ),
        })
    }

    /// Finalize `builder` & hand the record to the router.
    pub fn emit(&self, builder: LogRecordBuilder) {
        self.router.deliver(self.finalize(builder));
    }

    /// Finalize `builder` without delivering it.
    pub fn finalize(&self, builder: LogRecordBuilder) -> LogRecord {
        builder.finalize(&self.clock)
    }

    /// Begin a [`LogStream`] at `level`; the record is emitted when the stream is dropped.
    pub fn log(&self, level: LogLevel) -> LogStream<'_> {
        LogStream::new(self, self.begin_record(level))
    }
    pub fn fatal(&self) -> LogStream<'_> {
        self.log(LogLevel::Fatal)
    }
    pub fn error(&self) -> LogStream<'_> {
        self.log(LogLevel::Error)
    }
    pub fn warn(&self) -> LogStream<'_> {
        self.log(LogLevel::Warn)
    }
    pub fn info(&self) -> LogStream<'_> {
        self.log(LogLevel::Info)
    }
    pub fn debug(&self) -> LogStream<'_> {
        self.log(LogLevel::Debug)
    }
    pub fn verbose(&self) -> LogStream<'_> {
        self.log(LogLevel::Verbose)
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::{argument::Argument, router::test::Collector, sink::DeliveryGuard};

    fn context(threshold: LogLevel) -> (LogContext, Arc<Collector>) {
        let sink = Collector::new("collector");
        let router = Arc::new(SinkRouter::builder().sync_sink(sink.clone()).build().unwrap());
        let ecu = LoggingIdentifier::new("ECU1").unwrap();
        (
            LogContext::new(
                LoggingIdentifier::new("EXA").unwrap(),
                LoggingIdentifier::new("DFLT").unwrap(),
                threshold,
                true,
                RecordLimits::default(),
                Arc::new(RecordClock::new(ecu)),
                router,
            ),
            sink,
        )
    }

    #[test]
    fn gating() {
        for t in LogLevel::ALL {
            let (ctx, _) = context(t);
            for l in LogLevel::ALL {
                let expected = (l as u8) <= (t as u8) && t != LogLevel::Off;
                assert_eq!(ctx.should_log(l), expected);
                assert_eq!(ctx.begin_record(l).is_some(), expected);
            }
        }
    }

    #[test]
    fn threshold_change_spares_inflight_builders() {
        let (ctx, sink) = context(LogLevel::Debug);
        let mut b = ctx.begin_record(LogLevel::Debug).unwrap();
        ctx.set_threshold(LogLevel::Warn);
        assert!(ctx.begin_record(LogLevel::Debug).is_none());
        b.add_argument(1u32);
        ctx.emit(b);
        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].header().level, LogLevel::Debug);
    }

    #[test]
    fn refuses_while_delivering() {
        let (ctx, _) = context(LogLevel::Verbose);
        let _guard = DeliveryGuard::enter();
        assert!(ctx.begin_record(LogLevel::Fatal).is_none());
    }

    #[test]
    fn non_verbose_records() {
        let (ctx, sink) = context(LogLevel::Info);
        let mut b = ctx.begin_record_with_id(LogLevel::Info, 42).unwrap();
        b.add_argument(Argument::U8(1));
        ctx.emit(b);
        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen[0].message_id(), Some(42));
        assert!(!seen[0].header().verbose);
    }
}
