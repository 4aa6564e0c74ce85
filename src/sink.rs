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

//! Delivery targets for finished records.
//!
//! A [`Sink`] receives each [`LogRecord`] by reference; any failure it reports is absorbed by the
//! [router](crate::router::SinkRouter), counted in that sink's [`SinkHealth`], and logged via
//! [`tracing`]. It never reaches the producing thread.

use crate::{error::Result, record::LogRecord};

use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex,
    },
};

/// A delivery target.
///
/// Implementations guard their own mutable state; `deliver` may be called from a producing thread
/// (synchronous routes) or from the sink's dedicated worker (asynchronous routes), but never from
/// two threads at once for an asynchronous route.
pub trait Sink: Send + Sync {
    /// Short name used for the worker thread & in diagnostics
    fn name(&self) -> &str;
    /// Deliver one record.
    fn deliver(&self, record: &LogRecord) -> Result<()>;
    /// Push anything buffered to the underlying resource.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             health                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Per-sink counters, updated by the router & readable from any thread.
#[derive(Debug, Default)]
pub struct SinkHealth {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    unhealthy: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl SinkHealth {
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.unhealthy.store(false, Ordering::Relaxed);
    }
    pub fn record_failure(&self, err: &crate::error::Error) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.unhealthy.store(true, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(format!("{}", err));
        }
    }
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
    pub fn is_healthy(&self) -> bool {
        !self.unhealthy.load(Ordering::Relaxed)
    }
    pub fn snapshot(&self, name: &str) -> SinkStats {
        SinkStats {
            name: name.to_string(),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            healthy: self.is_healthy(),
            last_error: self.last_error.lock().ok().and_then(|last| last.clone()),
        }
    }
}

/// A point-in-time copy of one sink's [`SinkHealth`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkStats {
    pub name: String,
    /// records successfully handed to the sink
    pub delivered: u64,
    /// records the sink reported an error for
    pub failed: u64,
    /// records discarded by the queue's overflow policy
    pub dropped: u64,
    /// false iff the most recent delivery failed
    pub healthy: bool,
    pub last_error: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         delivery guard                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

thread_local! {
    static IN_DELIVERY: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as delivering records for as long as it lives.
///
/// While any guard is alive on a thread, contexts refuse to begin records on it, so a sink that
/// (directly or through the `tracing` bridge) logs cannot feed back into the pipeline.
pub(crate) struct DeliveryGuard {
    outer: bool,
}

impl DeliveryGuard {
    pub(crate) fn enter() -> DeliveryGuard {
        DeliveryGuard {
            outer: IN_DELIVERY.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        let outer = self.outer;
        IN_DELIVERY.with(|flag| flag.set(outer));
    }
}

/// Is the current thread inside record delivery?
pub fn in_delivery() -> bool {
    IN_DELIVERY.with(|flag| flag.get())
}
