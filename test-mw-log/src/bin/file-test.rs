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

//! Test writing a `.dlt` file to the temp directory, then read it back.

use mw_log::{
    config::{Configuration, LogMode, LogModes},
    frame::parse_storage_file,
    identifier::LoggingIdentifier,
    runtime::Runtime,
};

pub fn main() {
    let dir = std::env::temp_dir();
    let runtime = Runtime::new(
        Configuration::builder()
            .app_id(LoggingIdentifier::new("FILE").unwrap())
            .log_modes(LogModes::none().with(LogMode::File))
            .log_file_path(&dir)
            .build(),
    )
    .unwrap();

    let ctx = runtime.default_context();
    for i in 0..10u32 {
        ctx.info().arg("你好, file.").arg(i);
    }
    runtime.shutdown();

    let path = dir.join("FILE.dlt");
    let bytes = std::fs::read(&path).unwrap();
    for stored in parse_storage_file(&bytes).unwrap() {
        println!(
            "{}.{:06} {} {} {} {:?}",
            stored.seconds,
            stored.microseconds,
            stored.ecu_id,
            stored.frame.app_id,
            stored.frame.ctx_id,
            stored.frame.arguments().unwrap()
        );
    }
    println!("{}", path.display());
}
