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
//! Structured, [DLT]-encoded logging with remote, console & file sinks
//!
//! [DLT]: https://www.autosar.org/fileadmin/standards/R22-11/FO/AUTOSAR_PRS_LogAndTraceProtocol.pdf
//!
//! # Introduction
//!
//! The AUTOSAR Diagnostic Log & Trace (DLT) protocol frames each log message with a compact binary
//! header (application id, context id, severity, a message counter & timestamp) followed by its
//! arguments. In _verbose_ mode each argument carries its own type descriptor, so that a generic
//! viewer can decode a message with no schema: a `u16` holding 1234 travels as the four-byte type
//! info `0x00000042` followed by the two bytes `d2 04`.
//!
//! This crate produces such messages and delivers them to any combination of three outputs:
//!
//! - a remote collector, over UDP, TCP or a Unix socket ([`remote`], [`transport`])
//! - the console, as one human-readable line per message ([`console`], [`text`])
//! - a `<AppID>.dlt` file readable by the usual DLT tooling ([`file`])
//!
//! Producing threads never wait on the network or the disk: remote & file output are fed through
//! bounded queues ([`queue`]) drained by one worker thread per sink ([`router`]). A sink that
//! fails is counted as unhealthy & skipped; the others carry on.
//!
//! # Usage
//!
//! Everything hangs off a [`Runtime`](runtime::Runtime), built from a
//! [`Configuration`](config::Configuration):
//!
//! ```rust
//! use mw_log::{config::Configuration, identifier::LoggingIdentifier, runtime::Runtime};
//!
//! let runtime = Runtime::new(
//!     Configuration::builder()
//!         .app_id(LoggingIdentifier::new("EXA").unwrap())
//!         .build(),
//! )
//! .unwrap();
//!
//! let ctx = runtime.default_context();
//! ctx.info().arg("Logging").arg("Application").arg("DoLogging");
//! ```
//!
//! Will print:
//!
//! ```text
//! EXA DFLT log info verbose 3 Logging Application DoLogging
//! ```
//!
//! Arguments are evaluated only if the record will be produced, when supplied via
//! [`LogStream::arg_with`](stream::LogStream::arg_with); the same record may also be assembled by
//! hand via [`LogContext::begin_record`](context::LogContext::begin_record).
//!
//! Applications already instrumented with [`tracing`] can forward their events through
//! [`layer::Layer`].
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html

pub mod argument;
pub mod config;
pub mod console;
pub mod context;
pub mod encoding;
pub mod error;
pub mod file;
pub mod frame;
pub mod identifier;
pub mod layer;
pub mod level;
pub mod queue;
pub mod record;
pub mod remote;
pub mod router;
pub mod runtime;
pub mod sink;
pub mod stream;
pub mod text;
pub mod transport;
