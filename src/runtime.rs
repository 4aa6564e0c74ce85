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

//! The logging runtime.
//!
//! # Introduction
//!
//! A [`Runtime`] owns everything one application needs to log: its [`Configuration`], the
//! [`SinkRouter`] built from the enabled log modes, a shared [`RecordClock`], and a bounded
//! registry of [`LogContext`]s. There is no global instance; create one at startup & pass it (or
//! the contexts it hands out) to whoever logs.
//!
//! ```rust
//! use mw_log::{config::Configuration, identifier::LoggingIdentifier, runtime::Runtime};
//! let config = Configuration::builder()
//!     .app_id(LoggingIdentifier::new("EXA").unwrap())
//!     .build();
//! let runtime = Runtime::new(config).unwrap();
//! let ctx = runtime.context("CTX1");
//! ctx.info().arg("Logging").arg("Application").arg(42u32);
//! runtime.shutdown();
//! ```
//!
//! [`Runtime::shutdown`] (also run on drop) drains every queued record to its sink before
//! releasing the sinks.

use crate::{
    config::{Configuration, LogMode, RemoteProtocol},
    console::ConsoleSink,
    context::LogContext,
    error::{Error, Result},
    file::FileSink,
    identifier::{LoggingIdentifier, ID_SIZE},
    level::LogLevel,
    record::RecordClock,
    remote::RemoteSink,
    router::SinkRouter,
    sink::SinkStats,
    transport::{TcpTransport, Transport, UdpTransport},
};

use backtrace::Backtrace;
use tracing::{debug, info, warn};

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// The context handed out when no other will do
pub const DEFAULT_CONTEXT_ID: &str = "DFLT";
/// Most contexts one runtime will hold, the default context included
pub const MAX_CONTEXTS: usize = 32;

pub struct Runtime {
    config: Configuration,
    clock: Arc<RecordClock>,
    router: Arc<SinkRouter>,
    contexts: RwLock<HashMap<LoggingIdentifier, Arc<LogContext>>>,
    default_context: Arc<LogContext>,
    inert_context: Arc<LogContext>,
}

impl Runtime {
    /// Build sinks for the configured log modes & start their workers.
    ///
    /// Console output is delivered on the producing thread; the remote & file sinks each get a
    /// queue & a worker.
    pub fn new(config: Configuration) -> Result<Runtime> {
        let mut builder = SinkRouter::builder();
        let modes = config.log_modes();
        if modes.contains(LogMode::Console) {
            builder = builder.sync_sink(Arc::new(ConsoleSink::stdout(config.console_threshold())));
        }
        if modes.contains(LogMode::Remote) {
            let transport: Box<dyn Transport> = match config.remote_protocol() {
                RemoteProtocol::Udp => Box::new(UdpTransport::new(config.remote_address())?),
                RemoteProtocol::Tcp => Box::new(TcpTransport::new(config.remote_address())?),
            };
            builder = builder.async_sink(
                Arc::new(RemoteSink::new(transport, config.remote_retries())),
                config.queue_capacity(),
                config.overflow_policy(),
            );
        }
        if modes.contains(LogMode::File) {
            builder = builder.async_sink(
                Arc::new(FileSink::new(config.log_file_path(), config.app_id())?),
                config.queue_capacity(),
                config.overflow_policy(),
            );
        }
        let router = builder.build()?;
        info!(
            "mw-log runtime for {} ({:?}) started with {:?}",
            config.app_id(),
            config.app_description(),
            modes
        );
        Ok(Runtime::with_router(config, router))
    }

    /// Use a router assembled by the caller in place of the configured log modes.
    pub fn with_router(config: Configuration, router: SinkRouter) -> Runtime {
        let clock = Arc::new(RecordClock::new(config.ecu_id()));
        let router = Arc::new(router);
        let mut dflt = [0u8; ID_SIZE];
        dflt.copy_from_slice(DEFAULT_CONTEXT_ID.as_bytes());
        let dflt = LoggingIdentifier::from_bytes(dflt);
        let default_context = Arc::new(LogContext::new(
            config.app_id(),
            dflt,
            config.context_level(dflt),
            config.verbose(),
            config.limits(),
            clock.clone(),
            router.clone(),
        ));
        // Handed out for malformed ids: switched off, & wired to no sink even if switched on.
        let inert_context = Arc::new(LogContext::new(
            config.app_id(),
            dflt,
            LogLevel::Off,
            config.verbose(),
            config.limits(),
            clock.clone(),
            Arc::new(SinkRouter::disconnected()),
        ));
        let mut contexts = HashMap::with_capacity(MAX_CONTEXTS);
        contexts.insert(dflt, default_context.clone());
        Runtime {
            config,
            clock,
            router,
            contexts: RwLock::new(contexts),
            default_context,
            inert_context,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }
    pub fn clock(&self) -> &Arc<RecordClock> {
        &self.clock
    }
    pub fn router(&self) -> &Arc<SinkRouter> {
        &self.router
    }
    pub fn default_context(&self) -> Arc<LogContext> {
        self.default_context.clone()
    }

    /// The context for `ctx_id` in this application, created on first use.
    ///
    /// Falls back to the default context once the registry is full. A malformed `ctx_id` gets a
    /// context whose records never reach a sink.
    pub fn context(&self, ctx_id: &str) -> Arc<LogContext> {
        match LoggingIdentifier::new(ctx_id) {
            Ok(id) => self.get_or_create(id),
            Err(err) => {
                warn!("records for this context will be discarded: {}", err);
                self.inert_context.clone()
            }
        }
    }

    /// The context for `ctx_id` in `app_id`, created on first use.
    ///
    /// Unlike [`Runtime::context`] this is strict: `app_id` must be the configured application
    /// & both ids must be well-formed.
    pub fn create_context(&self, app_id: &str, ctx_id: &str) -> Result<Arc<LogContext>> {
        let app = LoggingIdentifier::new(app_id)?;
        if app != self.config.app_id() {
            return Err(Error::UnknownApplication {
                name: app_id.to_string(),
                back: Backtrace::new(),
            });
        }
        Ok(self.get_or_create(LoggingIdentifier::new(ctx_id)?))
    }

    fn get_or_create(&self, id: LoggingIdentifier) -> Arc<LogContext> {
        if let Some(ctx) = self
            .contexts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
        {
            return ctx.clone();
        }
        let mut contexts = self
            .contexts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(ctx) = contexts.get(&id) {
            return ctx.clone();
        }
        if contexts.len() >= MAX_CONTEXTS {
            debug!("context registry full; {} gets the default context", id);
            return self.default_context();
        }
        let ctx = Arc::new(LogContext::new(
            self.config.app_id(),
            id,
            self.config.context_level(id),
            self.config.verbose(),
            self.config.limits(),
            self.clock.clone(),
            self.router.clone(),
        ));
        contexts.insert(id, ctx.clone());
        ctx
    }

    /// Number of contexts currently registered, the default context included
    pub fn context_count(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn stats(&self) -> Vec<SinkStats> {
        self.router.stats()
    }

    /// Drain every queue & release the sinks. Idempotent; records logged afterward are dropped.
    pub fn shutdown(&self) {
        if !self.router.is_shut_down() {
            debug!("mw-log runtime for {} shutting down", self.config.app_id());
        }
        self.router.shutdown();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::{config::LogModes, router::test::Collector};

    fn runtime() -> (Runtime, Arc<Collector>) {
        let sink = Collector::new("collector");
        let config = Configuration::builder()
            .app_id(LoggingIdentifier::new("EXA").unwrap())
            .log_modes(LogModes::none())
            .default_log_level(LogLevel::Warn)
            .context_level(LoggingIdentifier::new("CTX1").unwrap(), LogLevel::Verbose)
            .build();
        let router = SinkRouter::builder().sync_sink(sink.clone()).build().unwrap();
        (Runtime::with_router(config, router), sink)
    }

    #[test]
    fn contexts_are_shared_and_configured() {
        let (rt, _) = runtime();
        let a = rt.context("CTX1");
        let b = rt.context("CTX1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.threshold(), LogLevel::Verbose);
        assert_eq!(rt.context("CTX2").threshold(), LogLevel::Warn);
        assert_eq!(rt.default_context().ctx_id().as_str(), DEFAULT_CONTEXT_ID);
        assert_eq!(a.app_id().as_str(), "EXA");
    }

    #[test]
    fn malformed_and_unknown() {
        let (rt, _) = runtime();
        assert!(matches!(
            rt.create_context("FOO", "CTX1"),
            Err(Error::UnknownApplication { .. })
        ));
        assert!(matches!(
            rt.create_context("EXA", "TOOLONG"),
            Err(Error::BadIdentifier { .. })
        ));
        assert!(matches!(
            rt.create_context("EXA", "A B"),
            Err(Error::BadIdentifier { .. })
        ));
        assert!(rt.create_context("EXA", "CTX1").is_ok());
    }

    #[test]
    fn malformed_ids_reach_no_sink() {
        let (rt, sink) = runtime();
        for bad in ["TOOLONG", "", "A B"] {
            let ctx = rt.context(bad);
            assert!(!Arc::ptr_eq(&ctx, &rt.default_context()));
            assert_eq!(ctx.threshold(), LogLevel::Off);
            ctx.fatal().arg(1u32);
        }
        // even when switched on
        let ctx = rt.context("TOOLONG");
        ctx.set_threshold(LogLevel::Verbose);
        ctx.fatal().arg(2u32);
        assert!(sink.values().is_empty());
        assert_eq!(rt.context_count(), 1);
        rt.default_context().warn().arg(3u32);
        assert_eq!(sink.values(), vec![3]);
    }

    #[test]
    fn registry_is_bounded() {
        let (rt, _) = runtime();
        for i in 0..MAX_CONTEXTS - 1 {
            let ctx = rt.context(&format!("C{}", i));
            assert_ne!(ctx.ctx_id().as_str(), DEFAULT_CONTEXT_ID);
        }
        assert_eq!(rt.context_count(), MAX_CONTEXTS);
        let overflow = rt.context("LAST");
        assert!(Arc::ptr_eq(&overflow, &rt.default_context()));
        // existing contexts are still found
        assert_eq!(rt.context("C0").ctx_id().as_str(), "C0");
    }

    #[test]
    fn shutdown_discards_later_records() {
        let (rt, sink) = runtime();
        let ctx = rt.context("CTX1");
        ctx.info().arg(1u32);
        rt.shutdown();
        ctx.info().arg(2u32);
        rt.shutdown();
        assert_eq!(sink.values(), vec![1]);
    }
}
