// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Tagged value union carried by every parameter, event, and table row.

use crate::value::{Object, Property};
use std::fmt;

// =======================================================================
// Wire type tags
//
// Tags are self-describing: the codec writes the tag before every payload.
// The block starts at 0x500; 0x501..=0x504 are single-byte types of older
// peers that this model does not construct - they round-trip as TLV.
// Everything below 0x500 belongs to the legacy string-typed range (see
// `value::legacy`).
// =======================================================================

pub const TAG_BOOLEAN: i32 = 0x500;
pub const TAG_INT16: i32 = 0x505;
pub const TAG_UINT16: i32 = 0x506;
pub const TAG_INT32: i32 = 0x507;
pub const TAG_UINT32: i32 = 0x508;
pub const TAG_INT64: i32 = 0x509;
pub const TAG_UINT64: i32 = 0x50A;
pub const TAG_SINGLE: i32 = 0x50B;
pub const TAG_DOUBLE: i32 = 0x50C;
pub const TAG_DATETIME: i32 = 0x50D;
pub const TAG_STRING: i32 = 0x50E;
pub const TAG_BYTES: i32 = 0x50F;
pub const TAG_PROPERTY: i32 = 0x510;
pub const TAG_OBJECT: i32 = 0x511;

/// POSIX timestamp: whole seconds plus microseconds.
///
/// Both halves are `i32` because the wire carries exactly two 32-bit words;
/// keeping the model at wire width makes round-trips bit-faithful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeVal {
    pub sec: i32,
    pub usec: i32,
}

impl TimeVal {
    #[must_use]
    pub fn new(sec: i32, usec: i32) -> Self {
        Self { sec, usec }
    }
}

/// A value owning exactly one representation at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // Scalars
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Single(f32),
    Double(f64),
    DateTime(TimeVal),
    String(String),
    Bytes(Vec<u8>),

    /// Raw typed-length-value blob: any tag the model does not understand
    /// is carried opaquely so it survives a relay unmodified.
    Tlv { tag: i32, data: Vec<u8> },

    // Composites
    Object(Box<Object>),
    Properties(Vec<Property>),
}

impl Value {
    /// Wire type tag for this representation.
    #[must_use]
    pub fn type_tag(&self) -> i32 {
        match self {
            Self::Bool(_) => TAG_BOOLEAN,
            Self::I16(_) => TAG_INT16,
            Self::U16(_) => TAG_UINT16,
            Self::I32(_) => TAG_INT32,
            Self::U32(_) => TAG_UINT32,
            Self::I64(_) => TAG_INT64,
            Self::U64(_) => TAG_UINT64,
            Self::Single(_) => TAG_SINGLE,
            Self::Double(_) => TAG_DOUBLE,
            Self::DateTime(_) => TAG_DATETIME,
            Self::String(_) => TAG_STRING,
            Self::Bytes(_) => TAG_BYTES,
            Self::Tlv { tag, .. } => *tag,
            Self::Object(_) => TAG_OBJECT,
            Self::Properties(_) => TAG_PROPERTY,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i16.
    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Self::I16(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u16.
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::U16(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f32.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Single(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as timestamp.
    pub fn as_datetime(&self) -> Option<TimeVal> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as nested object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as property list.
    pub fn as_properties(&self) -> Option<&[Property]> {
        match self {
            Self::Properties(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::Single(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::DateTime(tv) => match chrono::DateTime::from_timestamp(
                i64::from(tv.sec),
                (tv.usec.max(0) as u32).saturating_mul(1000),
            ) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
                None => write!(f, "{}.{:06}", tv.sec, tv.usec),
            },
            Self::String(v) => write!(f, "{v}"),
            Self::Bytes(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Tlv { tag, data } => write!(f, "tlv(0x{tag:x},{} bytes)", data.len()),
            Self::Object(o) => write!(f, "object({})", o.name),
            Self::Properties(p) => write!(f, "properties({})", p.len()),
        }
    }
}

// Conversion traits
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::I16(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Single(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<TimeVal> for Value {
    fn from(v: TimeVal) -> Self {
        Self::DateTime(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Self::Object(Box::new(v))
    }
}

impl From<Vec<Property>> for Value {
    fn from(v: Vec<Property>) -> Self {
        Self::Properties(v)
    }
}
