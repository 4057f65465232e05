// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Wire marshalling for values, properties, objects, and events.
//!
//! Everything rides on the typed [`Message`] field stream. The layouts are
//! fixed by the protocol and must not drift:
//!
//! ```text
//! value     := name:str tag:i32 payload
//! property  := value                          (name is the property name)
//! prop-list := count:i32 property*
//! object    := name:str kind:i32 prop-list child-count:i32 object*
//! event     := name:str kind:i32 object
//! ```
//!
//! 64-bit integers travel as two i32 fields, **low word first**. `f32`
//! widens to f64 on the wire; the narrowing on decode is accepted as lossy.
//! Decoders tolerate two foreign shapes: the legacy string-typed tags
//! `0..=11` (parsed via [`crate::value::legacy`]) and unknown tags, which
//! are preserved opaquely as [`Value::Tlv`] so they survive a round trip.
//!
//! Note the asymmetry inherited from the protocol: [`encode_value`] writes
//! the name, but [`decode_value`] expects the caller to have popped it
//! already. [`decode_property`] pops both.

use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::transport::Message;
use crate::value::{
    legacy, Object, ObjectKind, Property, TimeVal, Value, TAG_BOOLEAN, TAG_BYTES, TAG_DATETIME,
    TAG_DOUBLE, TAG_INT16, TAG_INT32, TAG_INT64, TAG_OBJECT, TAG_PROPERTY, TAG_SINGLE, TAG_STRING,
    TAG_UINT16, TAG_UINT32, TAG_UINT64,
};

// ============================================================================
// Values
// ============================================================================

/// Append `name` and the tagged payload of `value` to `msg`.
pub fn encode_value(msg: &mut Message, name: &str, value: &Value) {
    msg.push_str(name);
    msg.push_i32(value.type_tag());
    match value {
        Value::Bool(b) => msg.push_i32(i32::from(*b)),
        Value::I16(v) => msg.push_i32(i32::from(*v)),
        Value::U16(v) => msg.push_i32(i32::from(*v)),
        Value::I32(v) => msg.push_i32(*v),
        Value::U32(v) => msg.push_i32(*v as i32),
        Value::I64(v) => push_i64_words(msg, *v),
        Value::U64(v) => push_i64_words(msg, *v as i64),
        Value::Single(v) => msg.push_f64(f64::from(*v)),
        Value::Double(v) => msg.push_f64(*v),
        Value::DateTime(tv) => {
            msg.push_i32(tv.sec);
            msg.push_i32(tv.usec);
        }
        Value::String(s) => msg.push_str(s),
        Value::Bytes(data) => msg.push_bytes(data),
        Value::Tlv { data, .. } => msg.push_bytes(data),
        Value::Object(object) => encode_object(msg, object),
        Value::Properties(props) => encode_properties(msg, props),
    }
}

/// Decode a tagged payload from `msg`. The caller pops the name first.
pub fn decode_value(msg: &mut Message) -> Result<Value> {
    let tag = msg.pop_i32()?;
    if legacy::is_legacy_tag(tag) {
        let text = msg.pop_str()?;
        let Some(legacy_tag) = legacy::LegacyTag::from_code(tag) else {
            return Err(Error::InvalidInput);
        };
        return legacy::parse(legacy_tag, &text);
    }
    match tag {
        TAG_BOOLEAN => Ok(Value::Bool(msg.pop_i32()? != 0)),
        TAG_INT16 => Ok(Value::I16(msg.pop_i32()? as i16)),
        TAG_UINT16 => Ok(Value::U16(msg.pop_i32()? as u16)),
        TAG_INT32 => Ok(Value::I32(msg.pop_i32()?)),
        TAG_UINT32 => Ok(Value::U32(msg.pop_i32()? as u32)),
        TAG_INT64 => Ok(Value::I64(pop_i64_words(msg)?)),
        TAG_UINT64 => Ok(Value::U64(pop_i64_words(msg)? as u64)),
        TAG_SINGLE => Ok(Value::Single(msg.pop_f64()? as f32)),
        TAG_DOUBLE => Ok(Value::Double(msg.pop_f64()?)),
        TAG_DATETIME => {
            let sec = msg.pop_i32()?;
            let usec = msg.pop_i32()?;
            Ok(Value::DateTime(TimeVal { sec, usec }))
        }
        TAG_STRING => Ok(Value::String(msg.pop_str()?)),
        TAG_BYTES => Ok(Value::Bytes(msg.pop_bytes()?)),
        TAG_PROPERTY => Ok(Value::Properties(decode_properties(msg)?)),
        TAG_OBJECT => Ok(Value::Object(Box::new(decode_object(msg)?))),
        unknown => {
            let data = msg.pop_bytes()?;
            log::debug!("[codec] preserving unknown value tag {unknown:#x} as tlv");
            Ok(Value::Tlv { tag: unknown, data })
        }
    }
}

// 64-bit integers are carried as two i32 words, low first. Unsigned values
// reuse the signed path bit-for-bit.
fn push_i64_words(msg: &mut Message, v: i64) {
    let lo = (v & 0xFFFF_FFFF) as u32 as i32;
    let hi = (v >> 32) as i32;
    msg.push_i32(lo);
    msg.push_i32(hi);
}

fn pop_i64_words(msg: &mut Message) -> Result<i64> {
    let lo = msg.pop_i32()?;
    let hi = msg.pop_i32()?;
    Ok((i64::from(hi) << 32) | i64::from(lo as u32))
}

// ============================================================================
// Properties
// ============================================================================

pub fn encode_property(msg: &mut Message, property: &Property) {
    encode_value(msg, &property.name, &property.value);
}

pub fn decode_property(msg: &mut Message) -> Result<Property> {
    let name = msg.pop_str()?;
    let value = decode_value(msg)?;
    Ok(Property { name, value })
}

/// Encode a count-prefixed property list. An empty slice writes count 0,
/// which decodes back to an empty list rather than an absent one.
pub fn encode_properties(msg: &mut Message, props: &[Property]) {
    msg.push_i32(props.len() as i32);
    for property in props {
        encode_property(msg, property);
    }
}

pub fn decode_properties(msg: &mut Message) -> Result<Vec<Property>> {
    let count = msg.pop_i32()?;
    if count < 0 {
        log::warn!("[codec] negative property count {count}");
        return Err(Error::InvalidInput);
    }
    // cap the preallocation at what the message could possibly hold, so a
    // lying count cannot reserve gigabytes before the pops start failing
    let mut props = Vec::with_capacity((count as usize).min(msg.len()));
    for _ in 0..count {
        props.push(decode_property(msg)?);
    }
    Ok(props)
}

// ============================================================================
// Objects
// ============================================================================

/// Encode `object` and its children depth-first.
pub fn encode_object(msg: &mut Message, object: &Object) {
    msg.push_str(&object.name);
    msg.push_i32(object.kind.code());
    encode_properties(msg, &object.properties);
    msg.push_i32(object.children.len() as i32);
    for child in &object.children {
        encode_object(msg, child);
    }
}

pub fn decode_object(msg: &mut Message) -> Result<Object> {
    let name = msg.pop_str()?;
    let kind = ObjectKind::from_code(msg.pop_i32()?);
    let properties = decode_properties(msg)?;
    let child_count = msg.pop_i32()?;
    if child_count < 0 {
        log::warn!("[codec] negative child count {child_count}");
        return Err(Error::InvalidInput);
    }
    let mut children = Vec::with_capacity((child_count as usize).min(msg.len()));
    for _ in 0..child_count {
        children.push(decode_object(msg)?);
    }
    Ok(Object {
        name,
        kind,
        properties,
        children,
    })
}

// ============================================================================
// Events
// ============================================================================

pub fn encode_event(msg: &mut Message, event: &Event) {
    msg.push_str(&event.name);
    msg.push_i32(event.kind.code());
    encode_object(msg, &event.data);
}

pub fn decode_event(msg: &mut Message) -> Result<Event> {
    let name = msg.pop_str()?;
    let kind_code = msg.pop_i32()?;
    let Some(kind) = EventKind::from_code(kind_code) else {
        log::warn!("[codec] unknown event kind {kind_code} for {name}");
        return Err(Error::InvalidInput);
    };
    let data = decode_object(msg)?;
    Ok(Event { name, kind, data })
}
