// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Consumer-side request building and response parsing. Timeouts are read
//! from the live configuration (override files included) on every call.

use crate::codec;
use crate::error::{code_is_ok, Error, Result};
use crate::handle::{Handle, SetOptions};
use crate::rpc::{
    is_valid_get_query, is_wildcard_query, pop_result_code, METHOD_ADD_ROW, METHOD_DELETE_ROW,
    METHOD_END_SESSION, METHOD_GET, METHOD_GET_CURRENT_SESSION_ID, METHOD_REQUEST_SESSION_ID,
    METHOD_SET, SESSION_MANAGER_DESTINATION,
};
use crate::transport::Message;
use crate::value::{Property, Value};

// ============================================================================
// Reads
// ============================================================================

/// Fetch one concrete parameter. The provider must echo the requested name
/// back; anything else is treated as a broken response.
pub(crate) fn get_value(handle: &Handle, name: &str) -> Result<Value> {
    if !is_valid_get_query(name) {
        log::warn!("[client] malformed parameter name {name:?}");
        return Err(Error::InvalidInput);
    }
    if is_wildcard_query(name) {
        log::warn!("[client] single get cannot address a wildcard: {name}");
        return Err(Error::AccessNotAllowed);
    }
    let mut props = query_parameters(handle, name, &[name])?;
    if props.len() != 1 {
        log::warn!("[client] get of {name} returned {} values", props.len());
        return Err(Error::Bus);
    }
    let prop = props.remove(0);
    if prop.name != name {
        log::warn!("[client] provider answered {} for {name}", prop.name);
        return Err(Error::Bus);
    }
    Ok(prop.value)
}

/// Fetch several parameters, or expand a single wildcard expression across
/// every component advertising a matching element. Partial results are
/// never returned; one failing destination fails the whole call.
pub(crate) fn get_multiple(handle: &Handle, names: &[&str]) -> Result<Vec<Property>> {
    if names.is_empty() {
        return Err(Error::InvalidInput);
    }
    if names.len() == 1 && is_wildcard_query(names[0]) {
        let expression = names[0];
        let owners = match handle.transport().resolve_wildcard(expression) {
            Ok(owners) => owners,
            Err(e) => {
                log::warn!("[client] could not resolve {expression}: {e}");
                return Err(Error::ElementDoesNotExist);
            }
        };
        if owners.is_empty() {
            // no advertised match; let the routing layer have the last word
            return query_parameters(handle, expression, &[expression]);
        }
        log::debug!(
            "[client] {expression} spans {} components",
            owners.len()
        );
        let mut all = Vec::new();
        for owner in &owners {
            let mut props = query_parameters(handle, owner, &[expression])?;
            all.append(&mut props);
        }
        return Ok(all);
    }
    if names.iter().any(|n| is_wildcard_query(n)) {
        log::warn!("[client] wildcard expressions must be queried alone");
        return Err(Error::InvalidInput);
    }
    query_parameters(handle, names[0], names)
}

pub(crate) fn get_typed_i32(handle: &Handle, name: &str) -> Result<i32> {
    match get_value(handle, name)? {
        Value::I32(v) => Ok(v),
        other => type_mismatch(name, "int32", &other),
    }
}

pub(crate) fn get_typed_u32(handle: &Handle, name: &str) -> Result<u32> {
    match get_value(handle, name)? {
        Value::U32(v) => Ok(v),
        other => type_mismatch(name, "uint32", &other),
    }
}

pub(crate) fn get_typed_string(handle: &Handle, name: &str) -> Result<String> {
    match get_value(handle, name)? {
        Value::String(s) => Ok(s),
        other => type_mismatch(name, "string", &other),
    }
}

fn type_mismatch<T>(name: &str, wanted: &str, got: &Value) -> Result<T> {
    log::warn!("[client] {name} is not a {wanted} (tag {:#x})", got.type_tag());
    Err(Error::InvalidInput)
}

fn query_parameters(handle: &Handle, destination: &str, names: &[&str]) -> Result<Vec<Property>> {
    let mut request = Message::new();
    request.push_str(handle.component_name());
    request.push_i32(names.len() as i32);
    for name in names {
        request.push_str(name);
    }
    let mut response =
        handle
            .transport()
            .invoke(destination, METHOD_GET, request, handle.get_timeout())?;
    pop_result_code(&mut response)?;
    codec::decode_properties(&mut response)
}

// ============================================================================
// Writes
// ============================================================================

/// Apply a batch of values, addressed to the owner of the first name.
pub(crate) fn set_properties(
    handle: &Handle,
    props: &[Property],
    opts: &SetOptions,
) -> Result<()> {
    let Some(first) = props.first() else {
        return Err(Error::InvalidInput);
    };
    if first.name.is_empty() {
        return Err(Error::InvalidInput);
    }
    let mut request = Message::new();
    request.push_i32(opts.session_id);
    request.push_str(handle.component_name());
    request.push_i32(props.len() as i32);
    for prop in props {
        codec::encode_property(&mut request, prop);
    }
    request.push_str(if opts.commit { "TRUE" } else { "FALSE" });

    let mut response =
        handle
            .transport()
            .invoke(&first.name, METHOD_SET, request, handle.set_timeout())?;
    match pop_result_code(&mut response) {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Ok(failed) = response.pop_str() {
                log::warn!("[client] set stopped at {failed}: {e}");
            }
            Err(e)
        }
    }
}

// ============================================================================
// Table rows
// ============================================================================

pub(crate) fn add_row(handle: &Handle, table_name: &str, alias: Option<&str>) -> Result<u32> {
    if table_name.is_empty() || !table_name.ends_with('.') {
        log::warn!("[client] table name must end with a dot: {table_name:?}");
        return Err(Error::InvalidInput);
    }
    let mut request = Message::new();
    request.push_i32(0);
    request.push_str(table_name);
    request.push_str(alias.unwrap_or_default());

    let mut response = handle.transport().invoke(
        table_name,
        METHOD_ADD_ROW,
        request,
        handle.set_timeout(),
    )?;
    pop_result_code(&mut response)?;
    let instance = response.pop_i32()?;
    Ok(instance as u32)
}

pub(crate) fn remove_row(handle: &Handle, row_name: &str) -> Result<()> {
    if row_name.is_empty() {
        return Err(Error::InvalidInput);
    }
    let mut request = Message::new();
    request.push_i32(0);
    request.push_str(row_name);

    let mut response = handle.transport().invoke(
        row_name,
        METHOD_DELETE_ROW,
        request,
        handle.set_timeout(),
    )?;
    pop_result_code(&mut response)
}

// ============================================================================
// Sessions
// ============================================================================

pub(crate) fn create_session(handle: &Handle) -> Result<i32> {
    let mut response = handle.transport().invoke(
        SESSION_MANAGER_DESTINATION,
        METHOD_REQUEST_SESSION_ID,
        Message::new(),
        handle.get_timeout(),
    )?;
    let code = response.pop_i32()?;
    if !code_is_ok(code) {
        log::warn!("[client] session request refused (code {code})");
        return Err(Error::SessionAlreadyExists);
    }
    response.pop_i32()
}

pub(crate) fn get_current_session(handle: &Handle) -> Result<i32> {
    let mut response = handle.transport().invoke(
        SESSION_MANAGER_DESTINATION,
        METHOD_GET_CURRENT_SESSION_ID,
        Message::new(),
        handle.get_timeout(),
    )?;
    pop_result_code(&mut response)?;
    response.pop_i32()
}

pub(crate) fn close_session(handle: &Handle, session_id: i32) -> Result<()> {
    if session_id == 0 {
        log::warn!("[client] session id 0 cannot be closed");
        return Err(Error::InvalidInput);
    }
    let mut request = Message::new();
    request.push_i32(session_id);
    let mut response = handle.transport().invoke(
        SESSION_MANAGER_DESTINATION,
        METHOD_END_SESSION,
        request,
        handle.get_timeout(),
    )?;
    pop_result_code(&mut response)
}
