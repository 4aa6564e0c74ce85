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

//! A fluent front end over [`LogRecordBuilder`].
//!
//! ```no_run
//! # fn f(ctx: &mw_log::context::LogContext) {
//! ctx.info().arg("Logging").arg("Application").arg_with(|| 17u32);
//! # }
//! ```
//!
//! The record is emitted when the stream is dropped. If the context refused to begin the record,
//! every call is a no-op and closures passed to [`LogStream::arg_with`] are never run.

use crate::{
    argument::Argument,
    context::LogContext,
    record::{AddArgumentResult, LogRecordBuilder},
};

pub struct LogStream<'a> {
    context: &'a LogContext,
    builder: Option<LogRecordBuilder>,
}

impl<'a> LogStream<'a> {
    pub(crate) fn new(context: &'a LogContext, builder: Option<LogRecordBuilder>) -> LogStream<'a> {
        LogStream { context, builder }
    }
    /// Will this stream produce a record?
    pub fn is_active(&self) -> bool {
        self.builder.is_some()
    }
    pub fn arg<A: Into<Argument>>(mut self, arg: A) -> Self {
        self.push(arg);
        self
    }
    /// Append the argument produced by `f`, evaluating it only if the stream is active.
    pub fn arg_with<A: Into<Argument>, F: FnOnce() -> A>(mut self, f: F) -> Self {
        if self.builder.is_some() {
            self.push(f());
        }
        self
    }
    /// Append one argument in place; returns `None` if the stream is inactive.
    pub fn push<A: Into<Argument>>(&mut self, arg: A) -> Option<AddArgumentResult> {
        self.builder.as_mut().map(|b| b.add_argument(arg))
    }
    /// Emit now rather than at end of scope.
    pub fn emit(mut self) {
        self.flush();
    }
    fn flush(&mut self) {
        if let Some(builder) = self.builder.take() {
            self.context.emit(builder);
        }
    }
}

impl Drop for LogStream<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}
