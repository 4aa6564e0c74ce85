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

//! Writing records as text lines.

use crate::{
    error::Result,
    level::LogLevel,
    record::LogRecord,
    sink::Sink,
    text::{render_line, TextOptions},
};

use std::{io::Write, sync::Mutex};

/// Renders each record as one line (see [`crate::text`]) on a [`Write`] implementation, stdout
/// by default.
///
/// The console has a threshold of its own, applied on top of the context's.
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    writer: Mutex<W>,
    threshold: LogLevel,
    options: TextOptions,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout(threshold: LogLevel) -> ConsoleSink<std::io::Stdout> {
        ConsoleSink::new(std::io::stdout(), threshold)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W, threshold: LogLevel) -> ConsoleSink<W> {
        ConsoleSink {
            writer: Mutex::new(writer),
            threshold,
            options: TextOptions::default(),
        }
    }
    pub fn with_options(mut self, options: TextOptions) -> Self {
        self.options = options;
        self
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }
    fn deliver(&self, record: &LogRecord) -> Result<()> {
        if !record.header().level.passes(self.threshold) {
            return Ok(());
        }
        let line = render_line(record, &self.options);
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        Ok(())
    }
    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .flush()?;
        Ok(())
    }
}
