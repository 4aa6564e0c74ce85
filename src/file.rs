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

//! Appending records to a DLT file.

use crate::{
    error::Result, frame::encode_stored_frame, identifier::LoggingIdentifier, record::LogRecord,
    sink::Sink,
};

use tracing::debug;

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Appends each record, storage header & DLT message, to `<dir>/<AppID>.dlt`.
///
/// Each record goes out in a single write, so readers never see a partial message unless the
/// write itself fails.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open (creating if need be) the DLT file for `app_id` in `dir`.
    pub fn new<P: AsRef<Path>>(dir: P, app_id: LoggingIdentifier) -> Result<FileSink> {
        let path = dir.as_ref().join(format!("{}.dlt", app_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("logging to {}", path.display());
        Ok(FileSink {
            path,
            file: Mutex::new(file),
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }
    fn deliver(&self, record: &LogRecord) -> Result<()> {
        let bytes = encode_stored_frame(record);
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .write_all(&bytes)?;
        Ok(())
    }
    fn flush(&self) -> Result<()> {
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::{
        argument::Argument,
        frame::parse_storage_file,
        level::LogLevel,
        record::{LogRecordBuilder, RecordClock, RecordLimits},
    };

    #[test]
    fn appends_frames() {
        let id = |s| LoggingIdentifier::new(s).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let clock = RecordClock::new(id("ECU1"));
        {
            let sink = FileSink::new(dir.path(), id("EXA")).unwrap();
            assert_eq!(sink.path(), dir.path().join("EXA.dlt"));
            for i in 0..3u16 {
                let mut b = LogRecordBuilder::new(
                    id("ECU1"),
                    id("EXA"),
                    id("DFLT"),
                    LogLevel::Info,
                    RecordLimits::default(),
                );
                b.add_argument(i);
                sink.deliver(&b.finalize(&clock)).unwrap();
            }
            sink.flush().unwrap();
        }
        // Re-opening appends rather than truncating
        {
            let sink = FileSink::new(dir.path(), id("EXA")).unwrap();
            let b = LogRecordBuilder::new(
                id("ECU1"),
                id("EXA"),
                id("DFLT"),
                LogLevel::Warn,
                RecordLimits::default(),
            );
            sink.deliver(&b.finalize(&clock)).unwrap();
        }

        let bytes = std::fs::read(dir.path().join("EXA.dlt")).unwrap();
        let frames = parse_storage_file(&bytes).unwrap();
        assert_eq!(frames.len(), 4);
        for (i, stored) in frames[..3].iter().enumerate() {
            assert_eq!(stored.frame.arguments().unwrap(), vec![Argument::U16(i as u16)]);
        }
        assert_eq!(frames[3].frame.level, LogLevel::Warn);
    }
}
