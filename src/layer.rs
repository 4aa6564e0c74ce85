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

//! A [`tracing-subscriber`] [`Layer`] that turns [`tracing`] events into log records.
//!
//! Each event becomes one record in the layer's [`LogContext`]: the `message` field first, as a
//! string, then each other field as its name followed by its typed value:
//!
//! ```rust
//! use mw_log::{layer::Layer, runtime::Runtime, config::Configuration};
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let runtime = Runtime::new(Configuration::default()).unwrap();
//! let subscriber = tracing_subscriber::registry::Registry::default()
//!     .with(Layer::new(runtime.context("TRCE")));
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! // Becomes `... log info verbose 3 Hello, world! answer 42`
//! tracing::info!(target: "app", answer = 42u64, "Hello, world!");
//! ```
//!
//! Events emitted by this crate itself are ignored, as are events raised while the current thread
//! is delivering records.
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html

use crate::{context::LogContext, level::LogLevel, record::LogRecordBuilder};

use tracing::Event;
use tracing_subscriber::layer::Context;

// When the tracing-log feature is enabled, use NormalizeEvent to recover file/line metadata for
// events that originated in the `log` crate.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

use std::sync::Arc;

const CRATE_TARGET: &str = "mw_log";

fn is_own_target(target: &str) -> bool {
    target == CRATE_TARGET
        || (target.starts_with(CRATE_TARGET) && target[CRATE_TARGET.len()..].starts_with("::"))
}

/// Appends event fields to a record under construction.
struct ArgumentVisitor<'a> {
    builder: &'a mut LogRecordBuilder,
}

impl ArgumentVisitor<'_> {
    fn named(&mut self, field: &tracing::field::Field) -> bool {
        // Fields synthesized by `tracing-log` duplicate the metadata
        if field.name().starts_with("log.") {
            return false;
        }
        if field.name() != "message" {
            self.builder.add_argument(field.name());
        }
        true
    }
}

impl tracing::field::Visit for ArgumentVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if self.named(field) {
            self.builder.add_argument(value);
        }
    }
    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        if self.named(field) {
            self.builder.add_argument(value);
        }
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if self.named(field) {
            self.builder.add_argument(value);
        }
    }
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        if self.named(field) {
            self.builder.add_argument(value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if self.named(field) {
            self.builder.add_argument(value);
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        // The tracing macros "pre-format" the `message` field so that `value` is really a
        // `std::fmt::Arguments`, whose debug format has no enclosing double-quotes.
        if self.named(field) {
            self.builder.add_argument(format!("{:?}", value));
        }
    }
}

fn default_level_mapping(level: &tracing::Level) -> LogLevel {
    LogLevel::from(level)
}

/// Forwards [`tracing`] events to a [`LogContext`].
pub struct Layer {
    context: Arc<LogContext>,
    map_level: Box<dyn Fn(&tracing::Level) -> LogLevel + Send + Sync>,
    with_location: bool,
}

impl Layer {
    pub fn new(context: Arc<LogContext>) -> Layer {
        Layer {
            context,
            map_level: Box::new(default_level_mapping),
            with_location: false,
        }
    }
    /// Append a `file:line` argument to each record, when the event has one.
    pub fn with_location(mut self, with_location: bool) -> Self {
        self.with_location = with_location;
        self
    }
    /// Override the default mapping from `tracing` levels to log levels.
    pub fn with_level_mapping<F>(mut self, map_level: F) -> Self
    where
        F: Fn(&tracing::Level) -> LogLevel + Send + Sync + 'static,
    {
        self.map_level = Box::new(map_level);
        self
    }
}

impl<S> tracing_subscriber::layer::Layer<S> for Layer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // For native tracing events, normalized_metadata() returns None and we use the event's
        // own metadata.
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        if is_own_target(meta.target()) {
            return;
        }
        let mut builder = match self.context.begin_record((self.map_level)(meta.level())) {
            Some(builder) => builder,
            None => return,
        };
        event.record(&mut ArgumentVisitor {
            builder: &mut builder,
        });
        if self.with_location {
            if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
                builder.add_argument(format!("{}:{}", file, line));
            }
        }
        self.context.emit(builder);
    }
}

#[cfg(test)]
mod smoke {

    use super::*;
    use crate::{
        argument::Argument,
        identifier::LoggingIdentifier,
        record::{RecordClock, RecordLimits},
        router::{test::Collector, SinkRouter},
    };

    use tracing::{debug, info, warn};
    use tracing_subscriber::{
        layer::SubscriberExt, // Needed to get `with()`
        registry::Registry,
    };

    fn context(threshold: LogLevel) -> (Arc<LogContext>, Arc<Collector>) {
        let sink = Collector::new("collector");
        let router = Arc::new(SinkRouter::builder().sync_sink(sink.clone()).build().unwrap());
        let ctx = Arc::new(LogContext::new(
            LoggingIdentifier::new("EXA").unwrap(),
            LoggingIdentifier::new("TRCE").unwrap(),
            threshold,
            true,
            RecordLimits::default(),
            Arc::new(RecordClock::new(LoggingIdentifier::new("ECU1").unwrap())),
            router,
        ));
        (ctx, sink)
    }

    #[test]
    fn targets() {
        assert!(is_own_target("mw_log"));
        assert!(is_own_target("mw_log::router"));
        assert!(!is_own_target("mw_logger"));
        assert!(!is_own_target("app"));
    }

    #[test]
    fn events_become_records() {
        let (ctx, sink) = context(LogLevel::Info);
        let subscriber = Registry::default().with(Layer::new(ctx));
        let _guard = tracing::subscriber::set_default(subscriber);

        info!(target: "app", answer = 42u64, delta = -1i64, ok = true, "Hello, {}!", "world");
        debug!(target: "app", "filtered by threshold");
        warn!("from inside mw_log itself; ignored");

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].header().level, LogLevel::Info);
        assert_eq!(
            seen[0].arguments().unwrap(),
            vec![
                Argument::from("Hello, world!"),
                Argument::from("answer"),
                Argument::U64(42),
                Argument::from("delta"),
                Argument::I64(-1),
                Argument::from("ok"),
                Argument::Bool(true),
            ]
        );
    }

    #[test]
    fn location_and_level_mapping() {
        let (ctx, sink) = context(LogLevel::Verbose);
        let layer = Layer::new(ctx)
            .with_location(true)
            .with_level_mapping(|_| LogLevel::Fatal);
        let subscriber = Registry::default().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        info!(target: "app", "located");

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen[0].header().level, LogLevel::Fatal);
        let args = seen[0].arguments().unwrap();
        assert_eq!(args.len(), 2);
        match &args[1] {
            Argument::Str(s) => assert!(s.starts_with(file!()), "{}", s),
            other => panic!("unexpected {:?}", other),
        }
    }
}
