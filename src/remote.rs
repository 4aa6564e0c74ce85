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

//! Sending records to a remote DLT collector.

use crate::{
    error::Result, frame::encode_frame, record::LogRecord, sink::Sink, transport::Transport,
};

use tracing::debug;

/// Frames each record as a DLT message & writes it to a [`Transport`].
pub struct RemoteSink<T: Transport> {
    transport: T,
    retries: u32,
}

impl<T: Transport> RemoteSink<T> {
    /// A failed send is retried `retries` times before the record is given up on.
    pub fn new(transport: T, retries: u32) -> RemoteSink<T> {
        RemoteSink { transport, retries }
    }
}

impl<T: Transport> Sink for RemoteSink<T> {
    fn name(&self) -> &str {
        "remote"
    }
    fn deliver(&self, record: &LogRecord) -> Result<()> {
        let frame = encode_frame(record);
        let mut attempt = 0;
        loop {
            match self.transport.send(&frame) {
                Ok(_) => return Ok(()),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    debug!("send failed ({}); retry {} of {}", err, attempt, self.retries);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::{
        argument::Argument,
        error::Error,
        frame::parse_frame,
        identifier::LoggingIdentifier,
        level::LogLevel,
        record::{LogRecordBuilder, RecordClock, RecordLimits},
    };

    use std::sync::Mutex;

    /// Fails the first `failures` sends, then records what it's given.
    struct Flaky {
        failures: Mutex<u32>,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl Transport for Flaky {
        fn send(&self, buf: &[u8]) -> Result<usize> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::decode("flaky"));
            }
            self.sent.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }
    }

    fn record() -> LogRecord {
        let id = |s| LoggingIdentifier::new(s).unwrap();
        let clock = RecordClock::new(id("ECU1"));
        let mut b = LogRecordBuilder::new(
            id("ECU1"),
            id("EXA"),
            id("DFLT"),
            LogLevel::Info,
            RecordLimits::default(),
        );
        b.add_argument(Argument::raw(b"raw"));
        b.finalize(&clock)
    }

    #[test]
    fn retries_then_succeeds() {
        let sink = RemoteSink::new(
            Flaky {
                failures: Mutex::new(2),
                sent: Mutex::new(Vec::new()),
            },
            2,
        );
        sink.deliver(&record()).unwrap();
        let sent = sink.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (frame, _) = parse_frame(&sent[0]).unwrap();
        assert_eq!(frame.arguments().unwrap(), vec![Argument::Raw(vec![0x72, 0x61, 0x77])]);
    }

    #[test]
    fn gives_up() {
        let sink = RemoteSink::new(
            Flaky {
                failures: Mutex::new(3),
                sent: Mutex::new(Vec::new()),
            },
            2,
        );
        assert!(sink.deliver(&record()).is_err());
        assert!(sink.transport.sent.lock().unwrap().is_empty());
    }
}
