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

//! DLT argument encoding.
//!
//! In verbose mode every argument is laid out on the wire as a 32-bit _type info_ followed by its
//! data:
//!
//! ```text
//! +-----------------+-----------------+-----------------------------------------------------+
//! | Standard Header | Extended Header |                       Payload                       |
//! |                 |                 +--------------------------+--------------------------+
//! |                 |                 |        Argument 1        |        Argument 2        |
//! |                 |                 +-----------+--------------+-----------+--------------+
//! |                 |                 | Type Info | Data Payload | Type Info | Data Payload |
//! +-----------------+-----------------+-----------+--------------+-----------+--------------+
//! ```
//!
//! The type info carries the type class (one bit each for bool, signed, unsigned, float, string,
//! raw & trace-info), the type length (8 to 64 bits) and, for strings & integers, the string
//! coding or the preferred integer representation. That is enough for a generic reader to
//! reconstruct each value without an external schema. In non-verbose mode only the data is
//! written.
//!
//! All multi-byte values in the payload are little-endian. Strings carry a 16-bit length that
//! includes a trailing NUL; raw & trace buffers a 16-bit length of the bytes alone.

use crate::{
    argument::{Argument, IntegerRepresentation},
    error::{Error, Result},
};

use backtrace::Backtrace;
use bytes::{Buf, BufMut};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           type info                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

const TYPE_LENGTH_MASK: u32 = 0x0f;
const TYPE_BOOL: u32 = 1 << 4;
const TYPE_SIGNED: u32 = 1 << 5;
const TYPE_UNSIGNED: u32 = 1 << 6;
const TYPE_FLOAT: u32 = 1 << 7;
const TYPE_STRING: u32 = 1 << 9;
const TYPE_RAW: u32 = 1 << 10;
const TYPE_TRACE_INFO: u32 = 1 << 13;
const CODING_SHIFT: u32 = 15;
const CODING_MASK: u32 = 0x07 << CODING_SHIFT;
const CODING_UTF8: u32 = 0x01;

/// Width, in bytes, of the type info in front of each verbose argument
pub const TYPE_INFO_SIZE: usize = 4;
/// Width, in bytes, of the length field in front of strings, raw & trace data
pub const LENGTH_FIELD_SIZE: usize = 2;

/// DLT `TYLE` values
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
enum TypeLength {
    Bits8 = 0x01,
    Bits16 = 0x02,
    Bits32 = 0x03,
    Bits64 = 0x04,
}

/// The 32-bit descriptor preceding each verbose argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo(u32);

impl TypeInfo {
    fn new(class: u32) -> TypeInfo {
        TypeInfo(class)
    }
    fn with_length(self, length: TypeLength) -> TypeInfo {
        TypeInfo(self.0 | length as u32)
    }
    fn with_coding(self, coding: u32) -> TypeInfo {
        TypeInfo(self.0 | (coding << CODING_SHIFT))
    }
    pub fn from_bits(bits: u32) -> TypeInfo {
        TypeInfo(bits)
    }
    pub fn bits(&self) -> u32 {
        self.0
    }
    fn has(&self, class: u32) -> bool {
        self.0 & class != 0
    }
    fn length(&self) -> Option<TypeLength> {
        match self.0 & TYPE_LENGTH_MASK {
            0x01 => Some(TypeLength::Bits8),
            0x02 => Some(TypeLength::Bits16),
            0x03 => Some(TypeLength::Bits32),
            0x04 => Some(TypeLength::Bits64),
            _ => None,
        }
    }
    fn coding(&self) -> u32 {
        (self.0 & CODING_MASK) >> CODING_SHIFT
    }
}

fn unsigned(length: TypeLength, repr: IntegerRepresentation) -> TypeInfo {
    TypeInfo::new(TYPE_UNSIGNED)
        .with_length(length)
        .with_coding(repr as u32)
}

fn signed(length: TypeLength) -> TypeInfo {
    TypeInfo::new(TYPE_SIGNED)
        .with_length(length)
        .with_coding(IntegerRepresentation::Decimal as u32)
}

/// Compute the type info describing `arg`.
pub fn type_info(arg: &Argument) -> TypeInfo {
    use IntegerRepresentation::{Binary, Decimal, Hex};
    use TypeLength::*;
    match arg {
        Argument::Bool(_) => TypeInfo::new(TYPE_BOOL).with_length(Bits8),
        Argument::U8(_) => unsigned(Bits8, Decimal),
        Argument::U16(_) => unsigned(Bits16, Decimal),
        Argument::U32(_) => unsigned(Bits32, Decimal),
        Argument::U64(_) => unsigned(Bits64, Decimal),
        Argument::Hex8(_) => unsigned(Bits8, Hex),
        Argument::Hex16(_) => unsigned(Bits16, Hex),
        Argument::Hex32(_) => unsigned(Bits32, Hex),
        Argument::Hex64(_) => unsigned(Bits64, Hex),
        Argument::Bin8(_) => unsigned(Bits8, Binary),
        Argument::Bin16(_) => unsigned(Bits16, Binary),
        Argument::Bin32(_) => unsigned(Bits32, Binary),
        Argument::Bin64(_) => unsigned(Bits64, Binary),
        Argument::I8(_) => signed(Bits8),
        Argument::I16(_) => signed(Bits16),
        Argument::I32(_) => signed(Bits32),
        Argument::I64(_) => signed(Bits64),
        Argument::F32(_) => TypeInfo::new(TYPE_FLOAT).with_length(Bits32),
        Argument::F64(_) => TypeInfo::new(TYPE_FLOAT).with_length(Bits64),
        Argument::Str(_) => TypeInfo::new(TYPE_STRING).with_coding(CODING_UTF8),
        Argument::Raw(_) => TypeInfo::new(TYPE_RAW),
        Argument::Trace(_) => TypeInfo::new(TYPE_TRACE_INFO).with_coding(CODING_UTF8),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            encoding                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Number of data bytes (i.e. excluding the type info) `arg` occupies on the wire
pub fn data_len(arg: &Argument) -> usize {
    match arg {
        Argument::Bool(_)
        | Argument::U8(_)
        | Argument::I8(_)
        | Argument::Hex8(_)
        | Argument::Bin8(_) => 1,
        Argument::U16(_) | Argument::I16(_) | Argument::Hex16(_) | Argument::Bin16(_) => 2,
        Argument::U32(_)
        | Argument::I32(_)
        | Argument::Hex32(_)
        | Argument::Bin32(_)
        | Argument::F32(_) => 4,
        Argument::U64(_)
        | Argument::I64(_)
        | Argument::Hex64(_)
        | Argument::Bin64(_)
        | Argument::F64(_) => 8,
        Argument::Str(s) => LENGTH_FIELD_SIZE + s.len() + 1,
        Argument::Raw(b) | Argument::Trace(b) => LENGTH_FIELD_SIZE + b.len(),
    }
}

/// Number of bytes `arg` occupies on the wire in the given mode
pub fn encoded_len(arg: &Argument, verbose: bool) -> usize {
    data_len(arg) + if verbose { TYPE_INFO_SIZE } else { 0 }
}

fn length_field(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::ArgumentTooLong {
        len,
        back: Backtrace::new(),
    })
}

/// Write the data portion of `arg` (no type info) to `buf`.
///
/// Fails only if a string, raw or trace argument is too long for its 16-bit length field, in
/// which case nothing has been written.
pub fn put_data<B: BufMut>(arg: &Argument, buf: &mut B) -> Result<()> {
    match arg {
        Argument::Bool(x) => buf.put_u8(u8::from(*x)),
        Argument::U8(x) | Argument::Hex8(x) | Argument::Bin8(x) => buf.put_u8(*x),
        Argument::U16(x) | Argument::Hex16(x) | Argument::Bin16(x) => buf.put_u16_le(*x),
        Argument::U32(x) | Argument::Hex32(x) | Argument::Bin32(x) => buf.put_u32_le(*x),
        Argument::U64(x) | Argument::Hex64(x) | Argument::Bin64(x) => buf.put_u64_le(*x),
        Argument::I8(x) => buf.put_i8(*x),
        Argument::I16(x) => buf.put_i16_le(*x),
        Argument::I32(x) => buf.put_i32_le(*x),
        Argument::I64(x) => buf.put_i64_le(*x),
        Argument::F32(x) => buf.put_u32_le(x.to_bits()),
        Argument::F64(x) => buf.put_u64_le(x.to_bits()),
        Argument::Str(s) => {
            let len = length_field(s.len() + 1)?;
            buf.put_u16_le(len);
            buf.put_slice(s.as_bytes());
            buf.put_u8(0);
        }
        Argument::Raw(b) | Argument::Trace(b) => {
            let len = length_field(b.len())?;
            buf.put_u16_le(len);
            buf.put_slice(b);
        }
    }
    Ok(())
}

/// Write `arg` to `buf` in verbose form (type info followed by data).
pub fn put_verbose<B: BufMut>(arg: &Argument, buf: &mut B) -> Result<()> {
    // Validate lengths before anything hits the buffer so that a failure leaves it untouched
    if let Argument::Str(s) = arg {
        length_field(s.len() + 1)?;
    }
    if let Argument::Raw(b) | Argument::Trace(b) = arg {
        length_field(b.len())?;
    }
    buf.put_u32_le(type_info(arg).bits());
    put_data(arg, buf)
}

/// Encode a single argument, returning its type info & its data bytes.
pub fn encode(arg: &Argument) -> Result<(TypeInfo, Vec<u8>)> {
    let mut data = Vec::with_capacity(data_len(arg));
    put_data(arg, &mut data)?;
    Ok((type_info(arg), data))
}

/// Shorten a variable-length argument so that its data occupies at most `max_data` bytes.
///
/// Strings are cut on a character boundary. Returns `None` if `arg` is of fixed width or if not
/// even an empty value would fit.
pub(crate) fn crop(arg: &Argument, max_data: usize) -> Option<Argument> {
    match arg {
        Argument::Str(s) => {
            let room = max_data.checked_sub(LENGTH_FIELD_SIZE + 1)?;
            let mut end = std::cmp::min(room, s.len());
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            Some(Argument::Str(s[..end].to_string()))
        }
        Argument::Raw(b) => {
            let room = max_data.checked_sub(LENGTH_FIELD_SIZE)?;
            Some(Argument::Raw(b[..std::cmp::min(room, b.len())].to_vec()))
        }
        Argument::Trace(b) => {
            let room = max_data.checked_sub(LENGTH_FIELD_SIZE)?;
            Some(Argument::Trace(b[..std::cmp::min(room, b.len())].to_vec()))
        }
        _ => None,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            decoding                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

fn need(buf: &&[u8], n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        Err(Error::decode(format!(
            "{} needs {} bytes but only {} remain",
            what,
            n,
            buf.remaining()
        )))
    } else {
        Ok(())
    }
}

fn get_sized(buf: &mut &[u8], what: &str) -> Result<Vec<u8>> {
    need(buf, LENGTH_FIELD_SIZE, what)?;
    let len = buf.get_u16_le() as usize;
    need(buf, len, what)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

/// Unsigned integers in any coding but hex or binary (octal included) come back as plain `U*`.
fn decode_integer(info: TypeInfo, buf: &mut &[u8]) -> Result<Argument> {
    use IntegerRepresentation::{Binary, Hex};
    let length = info
        .length()
        .ok_or_else(|| Error::decode(format!("bad integer type length in {:#x}", info.bits())))?;
    let width = match length {
        TypeLength::Bits8 => 1,
        TypeLength::Bits16 => 2,
        TypeLength::Bits32 => 4,
        TypeLength::Bits64 => 8,
    };
    need(buf, width, "integer")?;
    if info.has(TYPE_SIGNED) {
        return Ok(match length {
            TypeLength::Bits8 => Argument::I8(buf.get_i8()),
            TypeLength::Bits16 => Argument::I16(buf.get_i16_le()),
            TypeLength::Bits32 => Argument::I32(buf.get_i32_le()),
            TypeLength::Bits64 => Argument::I64(buf.get_i64_le()),
        });
    }
    let coding = info.coding();
    Ok(match length {
        TypeLength::Bits8 => {
            let x = buf.get_u8();
            match coding {
                c if c == Hex as u32 => Argument::Hex8(x),
                c if c == Binary as u32 => Argument::Bin8(x),
                _ => Argument::U8(x),
            }
        }
        TypeLength::Bits16 => {
            let x = buf.get_u16_le();
            match coding {
                c if c == Hex as u32 => Argument::Hex16(x),
                c if c == Binary as u32 => Argument::Bin16(x),
                _ => Argument::U16(x),
            }
        }
        TypeLength::Bits32 => {
            let x = buf.get_u32_le();
            match coding {
                c if c == Hex as u32 => Argument::Hex32(x),
                c if c == Binary as u32 => Argument::Bin32(x),
                _ => Argument::U32(x),
            }
        }
        TypeLength::Bits64 => {
            let x = buf.get_u64_le();
            match coding {
                c if c == Hex as u32 => Argument::Hex64(x),
                c if c == Binary as u32 => Argument::Bin64(x),
                _ => Argument::U64(x),
            }
        }
    })
}

/// Decode one verbose argument from the front of `bytes`, returning it along with the number of
/// bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(Argument, usize)> {
    let mut buf = bytes;
    need(&buf, TYPE_INFO_SIZE, "type info")?;
    let info = TypeInfo::from_bits(buf.get_u32_le());

    let arg = if info.has(TYPE_BOOL) {
        need(&buf, 1, "bool")?;
        match buf.get_u8() {
            0 => Argument::Bool(false),
            1 => Argument::Bool(true),
            x => return Err(Error::decode(format!("{} is not a boolean", x))),
        }
    } else if info.has(TYPE_SIGNED) || info.has(TYPE_UNSIGNED) {
        decode_integer(info, &mut buf)?
    } else if info.has(TYPE_FLOAT) {
        match info.length() {
            Some(TypeLength::Bits32) => {
                need(&buf, 4, "float32")?;
                Argument::F32(f32::from_bits(buf.get_u32_le()))
            }
            Some(TypeLength::Bits64) => {
                need(&buf, 8, "float64")?;
                Argument::F64(f64::from_bits(buf.get_u64_le()))
            }
            _ => {
                return Err(Error::decode(format!(
                    "unsupported float width in {:#x}",
                    info.bits()
                )))
            }
        }
    } else if info.has(TYPE_STRING) {
        let mut bytes = get_sized(&mut buf, "string")?;
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        Argument::Str(
            String::from_utf8(bytes).map_err(|err| Error::decode(format!("string: {}", err)))?,
        )
    } else if info.has(TYPE_TRACE_INFO) {
        Argument::Trace(get_sized(&mut buf, "trace info")?)
    } else if info.has(TYPE_RAW) {
        Argument::Raw(get_sized(&mut buf, "raw buffer")?)
    } else {
        return Err(Error::decode(format!(
            "unsupported type info {:#010x}",
            info.bits()
        )));
    };

    Ok((arg, bytes.len() - buf.len()))
}

/// Decode exactly `count` verbose arguments from `bytes`; trailing bytes are an error.
pub fn decode_payload(bytes: &[u8], count: usize) -> Result<Vec<Argument>> {
    let mut args = Vec::with_capacity(count);
    let mut offset = 0;
    for _ in 0..count {
        let (arg, used) = decode(&bytes[offset..])?;
        args.push(arg);
        offset += used;
    }
    if offset != bytes.len() {
        return Err(Error::decode(format!(
            "{} trailing bytes after {} arguments",
            bytes.len() - offset,
            count
        )));
    }
    Ok(args)
}

#[cfg(test)]
mod test {

    use super::*;

    use proptest::prelude::*;

    fn round_trip(arg: Argument) {
        let mut buf = Vec::new();
        put_verbose(&arg, &mut buf).unwrap();
        assert_eq!(buf.len(), encoded_len(&arg, true));
        let (back, used) = decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(back, arg);
    }

    #[test]
    fn boundaries() {
        for arg in [
            Argument::Bool(false),
            Argument::Bool(true),
            Argument::I8(i8::MIN),
            Argument::I8(i8::MAX),
            Argument::I16(i16::MIN),
            Argument::I16(i16::MAX),
            Argument::I32(i32::MIN),
            Argument::I32(i32::MAX),
            Argument::I64(i64::MIN),
            Argument::I64(i64::MAX),
            Argument::U8(u8::MAX),
            Argument::U16(u16::MAX),
            Argument::U32(u32::MAX),
            Argument::U64(u64::MAX),
            Argument::U64(0),
            Argument::Hex64(654321098765432109),
            Argument::Bin32(3456789012),
            Argument::F32(f32::MIN_POSITIVE),
            Argument::F64(93454.6),
            Argument::F64(-0.0),
            Argument::Str(String::new()),
            Argument::Str("Logging".to_string()),
            Argument::Raw(Vec::new()),
            Argument::Raw(b"raw".to_vec()),
            Argument::Trace(b"slog2_message".to_vec()),
        ] {
            round_trip(arg);
        }
    }

    #[test]
    fn wire_layout() {
        let (info, data) = encode(&Argument::U16(1234)).unwrap();
        assert_eq!(info.bits(), 0x42);
        assert_eq!(data, vec![0xd2, 0x04]);

        let (info, data) = encode(&Argument::I64(i64::MIN)).unwrap();
        assert_eq!(info.bits(), 0x24);
        assert_eq!(data, vec![0, 0, 0, 0, 0, 0, 0, 0x80]);

        let (info, data) = encode(&Argument::Str("ab".to_string())).unwrap();
        assert_eq!(info.bits(), 0x0000_8200);
        assert_eq!(data, vec![3, 0, b'a', b'b', 0]);

        let (info, data) = encode(&Argument::Raw(b"raw".to_vec())).unwrap();
        assert_eq!(info.bits(), 0x400);
        assert_eq!(data, vec![3, 0, 0x72, 0x61, 0x77]);

        let (info, _) = encode(&Argument::Hex8(10)).unwrap();
        assert_eq!(info.bits(), 0x41 | (2 << 15));

        let (info, data) = encode(&Argument::Bool(true)).unwrap();
        assert_eq!(info.bits(), 0x11);
        assert_eq!(data, vec![1]);
    }

    #[test]
    fn float_bit_patterns_survive() {
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let mut buf = Vec::new();
        put_verbose(&Argument::F64(nan), &mut buf).unwrap();
        match decode(&buf).unwrap().0 {
            Argument::F64(x) => assert_eq!(x.to_bits(), nan.to_bits()),
            other => panic!("decoded {:?}", other),
        }
    }

    #[test]
    fn octal_coding_reads_as_decimal() {
        let mut buf = (0x43u32 | (0x01 << CODING_SHIFT)).to_le_bytes().to_vec();
        buf.extend_from_slice(&8u32.to_le_bytes());
        assert_eq!(decode(&buf).unwrap(), (Argument::U32(8), 8));
        // unassigned codings likewise
        buf[..4].copy_from_slice(&(0x41u32 | (0x05 << CODING_SHIFT)).to_le_bytes());
        assert_eq!(decode(&buf[..5]).unwrap(), (Argument::U8(8), 5));
    }

    #[test]
    fn too_long() {
        let arg = Argument::Raw(vec![0u8; 70_000]);
        let mut buf = Vec::new();
        assert!(put_verbose(&arg, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn malformed_input() {
        assert!(decode(&[0x42, 0x00]).is_err());
        assert!(decode(&[0x42, 0x00, 0x00, 0x00, 0x01]).is_err());
        assert!(decode(&[0x00, 0x08, 0x00, 0x00, 0x00]).is_err());
        assert!(decode(&[0x11, 0x00, 0x00, 0x00, 0x02]).is_err());
        // length field promises more than is there
        assert!(decode(&[0x00, 0x04, 0x00, 0x00, 0x05, 0x00, 0x01]).is_err());
    }

    #[test]
    fn cropping() {
        let s = Argument::Str("héllo".to_string());
        // 2 length bytes + NUL + 2 bytes of text: cannot split the 'é'
        assert_eq!(crop(&s, 5), Some(Argument::Str("h".to_string())));
        assert_eq!(crop(&s, 2), None);
        assert_eq!(
            crop(&Argument::Raw(b"raw".to_vec()), 4),
            Some(Argument::Raw(b"ra".to_vec()))
        );
        assert_eq!(crop(&Argument::U8(1), 100), None);
    }

    #[test]
    fn payload() {
        let args = vec![
            Argument::Str("val_uint8t".to_string()),
            Argument::U8(123),
            Argument::Str("val_uint16t".to_string()),
            Argument::U16(1234),
        ];
        let mut buf = Vec::new();
        for arg in &args {
            put_verbose(arg, &mut buf).unwrap();
        }
        assert_eq!(decode_payload(&buf, 4).unwrap(), args);
        assert!(decode_payload(&buf, 3).is_err());
        assert!(decode_payload(&buf, 5).is_err());
    }

    fn any_argument() -> impl Strategy<Value = Argument> {
        prop_oneof![
            any::<bool>().prop_map(Argument::Bool),
            any::<u8>().prop_map(Argument::U8),
            any::<u16>().prop_map(Argument::U16),
            any::<u32>().prop_map(Argument::U32),
            any::<u64>().prop_map(Argument::U64),
            any::<i8>().prop_map(Argument::I8),
            any::<i16>().prop_map(Argument::I16),
            any::<i32>().prop_map(Argument::I32),
            any::<i64>().prop_map(Argument::I64),
            any::<u16>().prop_map(Argument::Hex16),
            any::<u64>().prop_map(Argument::Bin64),
            any::<f32>()
                .prop_filter("NaN never compares equal", |x| !x.is_nan())
                .prop_map(Argument::F32),
            any::<f64>()
                .prop_filter("NaN never compares equal", |x| !x.is_nan())
                .prop_map(Argument::F64),
            ".{0,64}".prop_map(Argument::Str),
            proptest::collection::vec(any::<u8>(), 0..64).prop_map(Argument::Raw),
            proptest::collection::vec(any::<u8>(), 0..64).prop_map(Argument::Trace),
        ]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(arg in any_argument()) {
            let mut buf = Vec::new();
            put_verbose(&arg, &mut buf).unwrap();
            let (back, used) = decode(&buf).unwrap();
            prop_assert_eq!(used, buf.len());
            prop_assert_eq!(back, arg);
        }
    }
}
