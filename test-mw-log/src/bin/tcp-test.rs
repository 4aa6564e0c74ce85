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

//! Test sending DLT messages to TCP port 3490 on the local host.

use mw_log::{
    argument::{Argument, Hex},
    config::{Configuration, LogMode, LogModes, RemoteProtocol},
    identifier::LoggingIdentifier,
    level::LogLevel,
    runtime::Runtime,
};

pub fn main() {
    let runtime = Runtime::new(
        Configuration::builder()
            .app_id(LoggingIdentifier::new("TCPT").unwrap())
            .log_modes(LogModes::none().with(LogMode::Remote).with(LogMode::Console))
            .remote_protocol(RemoteProtocol::Tcp)
            .default_log_level(LogLevel::Verbose)
            .build(),
    )
    .unwrap();

    let ctx = runtime.context("TCP");
    ctx.verbose().arg("你好, TCP socket.");
    ctx.debug().arg("你好, TCP socket.").arg(Hex(0xdead_beef_u32));
    ctx.info().arg("你好, TCP socket.").arg(Argument::raw(b"raw"));
    ctx.warn().arg("你好, TCP socket.").arg(1.5f64);
    ctx.error().arg("你好, TCP socket.").arg(false);
    ctx.fatal().arg("你好, TCP socket.").arg(-1i8);

    runtime.shutdown();
    for stats in runtime.stats() {
        println!("{:?}", stats);
    }
}
