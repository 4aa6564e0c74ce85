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

//! DLT message framing.
//!
//! # Introduction
//!
//! Every record leaves the process as one DLT message:
//!
//! ```text
//!  0       1       2       3       4               8               12
//! +-------+-------+-------+-------+---------------+---------------+
//! | HTYP  | MCNT  |  LEN (BE)     |    ECU ID     |  TMSP (BE)    |   standard header + extras
//! +-------+-------+-------+-------+---------------+---------------+
//! | MSIN  | NOAR  |    APID       |    CTID       |                   extended header
//! +-------+-------+---------------+---------------+
//! | payload ...                                                       verbose or non-verbose
//! +---------------------------------------------------------------
//! ```
//!
//! `LEN` covers the whole message; header fields are big-endian while the payload is
//! little-endian (the `MSBF` bit is clear). Messages written to a file are additionally preceded
//! by the sixteen-byte storage header of [DLT] files: `"DLT\x01"`, seconds & microseconds since
//! the epoch (little-endian), and the ECU id.
//!
//! [DLT]: https://www.autosar.org/fileadmin/standards/R22-11/FO/AUTOSAR_PRS_LogAndTraceProtocol.pdf

use crate::{
    argument::Argument,
    encoding,
    error::{Error, Result},
    identifier::{LoggingIdentifier, ID_SIZE},
    level::LogLevel,
    record::{LogRecord, MAX_PAYLOAD_SIZE},
};

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// use extended header
const HTYP_UEH: u8 = 0x01;
/// most significant byte first (payload)
const HTYP_MSBF: u8 = 0x02;
/// with ECU id
const HTYP_WEID: u8 = 0x04;
/// with session id
const HTYP_WSID: u8 = 0x08;
/// with timestamp
const HTYP_WTMS: u8 = 0x10;
const HTYP_VERSION_SHIFT: u8 = 5;
const PROTOCOL_VERSION: u8 = 1;

const MSIN_VERBOSE: u8 = 0x01;
const MSIN_MSTP_SHIFT: u8 = 1;
const MSIN_MSTP_MASK: u8 = 0x07 << MSIN_MSTP_SHIFT;
const MSTP_LOG: u8 = 0x00;
const MSIN_MTIN_SHIFT: u8 = 4;

pub const STANDARD_HEADER_SIZE: usize = 4;
pub const EXTRA_HEADER_SIZE: usize = ID_SIZE + 4;
pub const EXTENDED_HEADER_SIZE: usize = 2 + 2 * ID_SIZE;
/// Bytes in front of the payload of every message we produce
pub const HEADER_SIZE: usize = STANDARD_HEADER_SIZE + EXTRA_HEADER_SIZE + EXTENDED_HEADER_SIZE;
pub const STORAGE_HEADER_SIZE: usize = 16;
const STORAGE_PATTERN: &[u8; 4] = b"DLT\x01";

/// The header type byte we always emit
pub const HTYP: u8 = HTYP_UEH | HTYP_WEID | HTYP_WTMS | (PROTOCOL_VERSION << HTYP_VERSION_SHIFT);

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            framing                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Write the DLT message for `record` to `buf`.
pub fn put_frame<B: BufMut>(record: &LogRecord, buf: &mut B) {
    let header = record.header();
    let payload = record.payload();
    debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);
    let len = std::cmp::min(HEADER_SIZE + payload.len(), u16::MAX as usize) as u16;

    buf.put_u8(HTYP);
    buf.put_u8((header.stamp.sequence & 0xff) as u8);
    buf.put_u16(len);
    buf.put_slice(header.ecu_id.as_bytes());
    buf.put_u32(header.stamp.ticks);

    let verbose = if header.verbose { MSIN_VERBOSE } else { 0 };
    buf.put_u8(verbose | (MSTP_LOG << MSIN_MSTP_SHIFT) | ((header.level as u8) << MSIN_MTIN_SHIFT));
    buf.put_u8(header.argument_count);
    buf.put_slice(header.app_id.as_bytes());
    buf.put_slice(header.ctx_id.as_bytes());

    buf.put_slice(&payload[..len as usize - HEADER_SIZE]);
}

/// Write the storage header that precedes `record` in a DLT file.
pub fn put_storage_header<B: BufMut>(record: &LogRecord, buf: &mut B) {
    let header = record.header();
    buf.put_slice(STORAGE_PATTERN);
    buf.put_u32_le(header.stamp.time.timestamp() as u32);
    buf.put_i32_le(header.stamp.time.timestamp_subsec_micros() as i32);
    buf.put_slice(header.ecu_id.as_bytes());
}

/// The DLT message for `record`, ready for a transport
pub fn encode_frame(record: &LogRecord) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + record.payload().len());
    put_frame(record, &mut buf);
    buf.freeze()
}

/// The storage header & DLT message for `record`, ready to be appended to a file
pub fn encode_stored_frame(record: &LogRecord) -> Bytes {
    let mut buf =
        BytesMut::with_capacity(STORAGE_HEADER_SIZE + HEADER_SIZE + record.payload().len());
    put_storage_header(record, &mut buf);
    put_frame(record, &mut buf);
    buf.freeze()
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            parsing                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A DLT message, as parsed back off the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub counter: u8,
    pub ecu_id: Option<LoggingIdentifier>,
    pub timestamp: Option<u32>,
    pub verbose: bool,
    pub level: LogLevel,
    pub argument_count: u8,
    pub app_id: LoggingIdentifier,
    pub ctx_id: LoggingIdentifier,
    pub payload: Bytes,
}

impl Frame {
    pub fn arguments(&self) -> Result<Vec<Argument>> {
        if !self.verbose {
            return Err(Error::decode("non-verbose payload"));
        }
        encoding::decode_payload(&self.payload, self.argument_count as usize)
    }
}

fn get_id(buf: &mut &[u8]) -> LoggingIdentifier {
    let mut id = [0u8; ID_SIZE];
    buf.copy_to_slice(&mut id);
    LoggingIdentifier::from_bytes(id)
}

/// Parse one DLT message from the front of `bytes`, returning it & the number of bytes it
/// occupied.
pub fn parse_frame(bytes: &[u8]) -> Result<(Frame, usize)> {
    if bytes.len() < STANDARD_HEADER_SIZE {
        return Err(Error::decode("truncated standard header"));
    }
    let mut buf = bytes;
    let htyp = buf.get_u8();
    let counter = buf.get_u8();
    let len = buf.get_u16() as usize;
    if htyp >> HTYP_VERSION_SHIFT != PROTOCOL_VERSION {
        return Err(Error::decode(format!("unsupported header type {:#04x}", htyp)));
    }
    if htyp & HTYP_MSBF != 0 {
        return Err(Error::decode("big-endian payloads are not supported"));
    }
    if htyp & HTYP_UEH == 0 {
        return Err(Error::decode("messages without an extended header are not supported"));
    }
    if len < STANDARD_HEADER_SIZE {
        return Err(Error::decode(format!("impossible message length {}", len)));
    }
    if len > bytes.len() {
        return Err(Error::decode(format!(
            "message claims {} bytes but only {} are available",
            len,
            bytes.len()
        )));
    }
    let mut buf = &bytes[STANDARD_HEADER_SIZE..len];

    let need = |buf: &&[u8], n: usize, what: &str| {
        if buf.remaining() < n {
            Err(Error::decode(format!("truncated {}", what)))
        } else {
            Ok(())
        }
    };

    let ecu_id = if htyp & HTYP_WEID != 0 {
        need(&buf, ID_SIZE, "ECU id")?;
        Some(get_id(&mut buf))
    } else {
        None
    };
    if htyp & HTYP_WSID != 0 {
        need(&buf, 4, "session id")?;
        buf.advance(4);
    }
    let timestamp = if htyp & HTYP_WTMS != 0 {
        need(&buf, 4, "timestamp")?;
        Some(buf.get_u32())
    } else {
        None
    };

    need(&buf, EXTENDED_HEADER_SIZE, "extended header")?;
    let msin = buf.get_u8();
    if msin & MSIN_MSTP_MASK != MSTP_LOG << MSIN_MSTP_SHIFT {
        return Err(Error::decode(format!("{:#04x} is not a log message", msin)));
    }
    let level = LogLevel::from_u8(msin >> MSIN_MTIN_SHIFT)
        .ok_or_else(|| Error::decode(format!("bad log level in MSIN {:#04x}", msin)))?;
    let argument_count = buf.get_u8();
    let app_id = get_id(&mut buf);
    let ctx_id = get_id(&mut buf);

    Ok((
        Frame {
            counter,
            ecu_id,
            timestamp,
            verbose: msin & MSIN_VERBOSE != 0,
            level,
            argument_count,
            app_id,
            ctx_id,
            payload: Bytes::copy_from_slice(buf),
        },
        len,
    ))
}

/// A message read from a DLT file, with its storage header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFrame {
    pub seconds: u32,
    pub microseconds: i32,
    pub ecu_id: LoggingIdentifier,
    pub frame: Frame,
}

/// Parse the full contents of a DLT file.
pub fn parse_storage_file(bytes: &[u8]) -> Result<Vec<StoredFrame>> {
    let mut frames = Vec::new();
    let mut buf = bytes;
    while !buf.is_empty() {
        if buf.len() < STORAGE_HEADER_SIZE {
            return Err(Error::decode("truncated storage header"));
        }
        if &buf[..4] != STORAGE_PATTERN {
            return Err(Error::decode("missing DLT storage pattern"));
        }
        buf.advance(4);
        let seconds = buf.get_u32_le();
        let microseconds = buf.get_i32_le();
        let ecu_id = get_id(&mut buf);
        let (frame, used) = parse_frame(buf)?;
        buf.advance(used);
        frames.push(StoredFrame {
            seconds,
            microseconds,
            ecu_id,
            frame,
        });
    }
    Ok(frames)
}
