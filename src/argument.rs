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

//! Log record arguments.
//!
//! An [`Argument`] is one typed value in a log statement. The set of variants is closed: each one
//! corresponds to exactly one DLT type-info layout, so encoding & decoding are exhaustive matches
//! (see [`crate::encoding`]).

/// How an unsigned integer should be presented by a viewer (DLT `SCOD` for integers).
///
/// DLT also defines an octal coding (0x01); nothing here produces it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IntegerRepresentation {
    Decimal = 0x00,
    Hex = 0x02,
    Binary = 0x03,
}

/// One log argument.
///
/// The `Hex*` & `Bin*` variants carry unsigned values that a viewer should present in
/// hexadecimal or binary; on the wire they differ from `U*` only in their type info.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Hex8(u8),
    Hex16(u16),
    Hex32(u32),
    Hex64(u64),
    Bin8(u8),
    Bin16(u16),
    Bin32(u32),
    Bin64(u64),
    F32(f32),
    F64(f64),
    /// UTF-8 text
    Str(String),
    /// Opaque bytes
    Raw(Vec<u8>),
    /// An opaque, OS-specific trace blob (a slog2 message, for instance)
    Trace(Vec<u8>),
}

impl Argument {
    /// Short human-readable name of the variant's wire type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Bool(_) => "bool",
            Argument::U8(_) | Argument::Hex8(_) | Argument::Bin8(_) => "uint8",
            Argument::U16(_) | Argument::Hex16(_) | Argument::Bin16(_) => "uint16",
            Argument::U32(_) | Argument::Hex32(_) | Argument::Bin32(_) => "uint32",
            Argument::U64(_) | Argument::Hex64(_) | Argument::Bin64(_) => "uint64",
            Argument::I8(_) => "sint8",
            Argument::I16(_) => "sint16",
            Argument::I32(_) => "sint32",
            Argument::I64(_) => "sint64",
            Argument::F32(_) => "float32",
            Argument::F64(_) => "float64",
            Argument::Str(_) => "string",
            Argument::Raw(_) => "raw",
            Argument::Trace(_) => "trace",
        }
    }
    /// Presentation hint for integer arguments; `None` for everything else.
    pub fn representation(&self) -> Option<IntegerRepresentation> {
        match self {
            Argument::U8(_)
            | Argument::U16(_)
            | Argument::U32(_)
            | Argument::U64(_)
            | Argument::I8(_)
            | Argument::I16(_)
            | Argument::I32(_)
            | Argument::I64(_) => Some(IntegerRepresentation::Decimal),
            Argument::Hex8(_) | Argument::Hex16(_) | Argument::Hex32(_) | Argument::Hex64(_) => {
                Some(IntegerRepresentation::Hex)
            }
            Argument::Bin8(_) | Argument::Bin16(_) | Argument::Bin32(_) | Argument::Bin64(_) => {
                Some(IntegerRepresentation::Binary)
            }
            _ => None,
        }
    }
    /// A raw-buffer argument holding a copy of `bytes`.
    pub fn raw(bytes: impl AsRef<[u8]>) -> Argument {
        Argument::Raw(bytes.as_ref().to_vec())
    }
    /// A trace-info argument from its textual content.
    pub fn trace(text: impl AsRef<str>) -> Argument {
        Argument::Trace(text.as_ref().as_bytes().to_vec())
    }
}

macro_rules! from_scalar {
    ($t:ty, $variant:ident) => {
        impl std::convert::From<$t> for Argument {
            fn from(x: $t) -> Self {
                Argument::$variant(x)
            }
        }
    };
}

from_scalar!(bool, Bool);
from_scalar!(u8, U8);
from_scalar!(u16, U16);
from_scalar!(u32, U32);
from_scalar!(u64, U64);
from_scalar!(i8, I8);
from_scalar!(i16, I16);
from_scalar!(i32, I32);
from_scalar!(i64, I64);
from_scalar!(f32, F32);
from_scalar!(f64, F64);
from_scalar!(String, Str);

impl std::convert::From<&str> for Argument {
    fn from(x: &str) -> Self {
        Argument::Str(x.to_string())
    }
}

impl std::convert::From<&String> for Argument {
    fn from(x: &String) -> Self {
        Argument::Str(x.clone())
    }
}

/// Wrap an unsigned value so that it will be logged with a hexadecimal presentation hint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hex<T>(pub T);

/// Wrap an unsigned value so that it will be logged with a binary presentation hint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bin<T>(pub T);

macro_rules! from_repr {
    ($wrapper:ident, $t:ty, $variant:ident) => {
        impl std::convert::From<$wrapper<$t>> for Argument {
            fn from(x: $wrapper<$t>) -> Self {
                Argument::$variant(x.0)
            }
        }
    };
}

from_repr!(Hex, u8, Hex8);
from_repr!(Hex, u16, Hex16);
from_repr!(Hex, u32, Hex32);
from_repr!(Hex, u64, Hex64);
from_repr!(Bin, u8, Bin8);
from_repr!(Bin, u16, Bin16);
from_repr!(Bin, u32, Bin32);
from_repr!(Bin, u64, Bin64);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Argument::from(123u8), Argument::U8(123));
        assert_eq!(Argument::from(i64::MIN), Argument::I64(i64::MIN));
        assert_eq!(Argument::from("Logging"), Argument::Str("Logging".to_string()));
        assert_eq!(Argument::from(Hex(0x0au8)), Argument::Hex8(10));
        assert_eq!(Argument::from(Bin(9012u16)), Argument::Bin16(9012));
        assert_eq!(Argument::raw(b"raw"), Argument::Raw(vec![0x72, 0x61, 0x77]));
    }

    #[test]
    fn representations() {
        assert_eq!(
            Argument::Hex32(1).representation(),
            Some(IntegerRepresentation::Hex)
        );
        assert_eq!(
            Argument::I8(-1).representation(),
            Some(IntegerRepresentation::Decimal)
        );
        assert_eq!(Argument::Bool(true).representation(), None);
        assert_eq!(Argument::Bin64(0).type_name(), "uint64");
    }
}
