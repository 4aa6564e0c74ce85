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

//! Test sending DLT messages to UDP port 3490 on the local host, via `tracing`.

use mw_log::{
    config::{Configuration, LogMode, LogModes},
    identifier::LoggingIdentifier,
    layer::Layer,
    level::LogLevel,
    runtime::Runtime,
};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

pub fn main() {
    let runtime = Runtime::new(
        Configuration::builder()
            .app_id(LoggingIdentifier::new("UDPT").unwrap())
            .log_modes(LogModes::none().with(LogMode::Remote).with(LogMode::Console))
            .default_log_level(LogLevel::Verbose)
            .build(),
    )
    .unwrap();

    // Setup the real subsriber...
    let subscriber = Registry::default().with(Layer::new(runtime.context("TRCE")));
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    trace!("Hello, 世界!");
    debug!("Hello, 世界!");
    info!(answer = 42u64, "Hello, 世界!");
    warn!("Hello, 世界!");
    error!("Hello, 世界!");

    runtime.shutdown();
    for stats in runtime.stats() {
        println!("{:?}", stats);
    }
}
