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

//! Human-readable rendering of records.
//!
//! One line per record:
//!
//! ```text
//! EXA DFLT log info verbose 2 Logging Application DoLogging
//! ```
//!
//! Arguments are decoded back from the payload & rendered one after another, separated by
//! spaces. Every integer is shown in decimal regardless of its presentation hint, and raw buffers
//! as two lowercase hex digits per byte; text-based tools downstream depend on both.

use crate::{argument::Argument, record::LogRecord};

use std::fmt::Write;

/// Rendering options
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextOptions {
    /// Prefix each line with wall-clock time, timestamp & ECU id
    pub with_header: bool,
}

/// Append the rendering of one argument to `out`.
pub fn render_argument(arg: &Argument, out: &mut String) {
    // Writing to a `String` can't fail.
    let _ = match arg {
        Argument::Bool(true) => write!(out, "True"),
        Argument::Bool(false) => write!(out, "False"),
        Argument::U8(x) | Argument::Hex8(x) | Argument::Bin8(x) => write!(out, "{}", x),
        Argument::U16(x) | Argument::Hex16(x) | Argument::Bin16(x) => write!(out, "{}", x),
        Argument::U32(x) | Argument::Hex32(x) | Argument::Bin32(x) => write!(out, "{}", x),
        Argument::U64(x) | Argument::Hex64(x) | Argument::Bin64(x) => write!(out, "{}", x),
        Argument::I8(x) => write!(out, "{}", x),
        Argument::I16(x) => write!(out, "{}", x),
        Argument::I32(x) => write!(out, "{}", x),
        Argument::I64(x) => write!(out, "{}", x),
        Argument::F32(x) => write!(out, "{}", x),
        Argument::F64(x) => write!(out, "{}", x),
        Argument::Str(s) => write!(out, "{}", s),
        Argument::Raw(bytes) => bytes.iter().try_for_each(|b| write!(out, "{:02x}", b)),
        Argument::Trace(bytes) => write!(out, "{}", String::from_utf8_lossy(bytes)),
    };
}

/// Render `record` as a single line, without a trailing newline.
pub fn render_line(record: &LogRecord, options: &TextOptions) -> String {
    let header = record.header();
    let mut out = String::with_capacity(64 + 2 * record.payload().len());
    if options.with_header {
        let _ = write!(
            out,
            "{} {:>10} 000 {} ",
            header.stamp.time.format("%Y/%m/%d %H:%M:%S%.6f"),
            header.stamp.ticks,
            header.ecu_id
        );
    }
    let _ = write!(
        out,
        "{} {} log {} {} {}",
        header.app_id,
        header.ctx_id,
        header.level,
        if header.verbose { "verbose" } else { "non-verbose" },
        header.argument_count
    );

    match (header.verbose, record.arguments()) {
        (true, Ok(args)) => {
            for arg in &args {
                out.push(' ');
                render_argument(arg, &mut out);
            }
        }
        _ => {
            // Non-verbose records (or, should it ever happen, an undecodable payload) are shown
            // as the payload bytes.
            out.push(' ');
            render_argument(&Argument::Raw(record.payload().to_vec()), &mut out);
        }
    }
    out
}
