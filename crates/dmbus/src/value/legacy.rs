// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Decode path for pre-typed providers that ship every value as a string.
//!
//! These providers tag values with a small enum (codes 0..=11) instead of
//! the self-describing tags at 0x500+. The codec spots the sentinel range
//! and hands the raw string here; this module is pure string-to-value
//! conversion with no message knowledge, so the table is testable on its
//! own.

use crate::error::{Error, Result};
use crate::value::{TimeVal, Value};
use chrono::NaiveDateTime;

/// Timestamp layout used by pre-typed providers.
const LEGACY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// True when a wire type tag falls in the legacy string-typed range.
#[must_use]
pub fn is_legacy_tag(tag: i32) -> bool {
    (LegacyTag::String as i32..=LegacyTag::None as i32).contains(&tag)
}

/// Type codes of the pre-typed value encoding, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyTag {
    String = 0,
    Int,
    UnsignedInt,
    Boolean,
    DateTime,
    Base64,
    Long,
    UnsignedLong,
    Float,
    Double,
    Byte,
    None,
}

impl LegacyTag {
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::String),
            1 => Some(Self::Int),
            2 => Some(Self::UnsignedInt),
            3 => Some(Self::Boolean),
            4 => Some(Self::DateTime),
            5 => Some(Self::Base64),
            6 => Some(Self::Long),
            7 => Some(Self::UnsignedLong),
            8 => Some(Self::Float),
            9 => Some(Self::Double),
            10 => Some(Self::Byte),
            11 => Some(Self::None),
            _ => None,
        }
    }
}

/// Convert a legacy-tagged string payload into a typed [`Value`].
///
/// Numeric and timestamp payloads that do not parse are rejected with
/// [`Error::InvalidInput`] rather than silently becoming zero.
pub fn parse(tag: LegacyTag, text: &str) -> Result<Value> {
    match tag {
        LegacyTag::String => Ok(Value::String(text.to_string())),
        LegacyTag::Int => text
            .trim()
            .parse::<i32>()
            .map(Value::I32)
            .map_err(|_| Error::InvalidInput),
        LegacyTag::UnsignedInt => text
            .trim()
            .parse::<u32>()
            .map(Value::U32)
            .map_err(|_| Error::InvalidInput),
        // Tolerant on purpose: anything that is not "1"/"true" is false.
        LegacyTag::Boolean => Ok(Value::Bool(
            text == "1" || text.eq_ignore_ascii_case("true"),
        )),
        LegacyTag::DateTime => {
            let dt = NaiveDateTime::parse_from_str(text.trim(), LEGACY_DATETIME_FORMAT)
                .map_err(|_| Error::InvalidInput)?;
            let sec =
                i32::try_from(dt.and_utc().timestamp()).map_err(|_| Error::InvalidInput)?;
            Ok(Value::DateTime(TimeVal::new(sec, 0)))
        }
        // Known gap kept intact: base64 payloads pass through undecoded.
        // Consumers on both sides of this path expect the raw text.
        LegacyTag::Base64 => {
            log::warn!("[legacy] base64 value passed through without decoding");
            Ok(Value::String(text.to_string()))
        }
        LegacyTag::Long => text
            .trim()
            .parse::<i64>()
            .map(Value::I64)
            .map_err(|_| Error::InvalidInput),
        LegacyTag::UnsignedLong => text
            .trim()
            .parse::<u64>()
            .map(Value::U64)
            .map_err(|_| Error::InvalidInput),
        LegacyTag::Float => text
            .trim()
            .parse::<f32>()
            .map(Value::Single)
            .map_err(|_| Error::InvalidInput),
        LegacyTag::Double => text
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| Error::InvalidInput),
        LegacyTag::Byte => Ok(Value::Bytes(text.as_bytes().to_vec())),
        LegacyTag::None => Err(Error::InvalidInput),
    }
}
