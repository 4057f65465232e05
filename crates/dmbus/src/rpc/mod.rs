// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Request/response plumbing shared by the consumer and provider sides:
//! wire method names, query classification, and response code handling.

pub(crate) mod client;
pub(crate) mod server;

use crate::error::{code_is_ok, Error, Result};
use crate::transport::Message;

pub const METHOD_GET: &str = "GetParameterValues";
pub const METHOD_SET: &str = "SetParameterValues";
pub const METHOD_ADD_ROW: &str = "AddTblRow";
pub const METHOD_DELETE_ROW: &str = "DeleteTblRow";

/// Well-known destination answering session requests.
pub const SESSION_MANAGER_DESTINATION: &str = "dmbus_session_mgr";
pub const METHOD_REQUEST_SESSION_ID: &str = "RequestSessionId";
pub const METHOD_GET_CURRENT_SESSION_ID: &str = "GetCurrentSessionId";
pub const METHOD_END_SESSION: &str = "EndSession";

/// A query that cannot name a single concrete parameter: a partial path
/// (trailing dot), an expression with `*`, or an empty string. Empty names
/// classify as wildcard so single-parameter paths fail closed.
#[must_use]
pub fn is_wildcard_query(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    name.ends_with('.') || name.contains('*')
}

/// Reject query shapes reserved by TR-069 style data models: trailing `!`
/// (event marker) and parenthesised expressions.
#[must_use]
pub fn is_valid_get_query(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    !(name.ends_with('!') || name.ends_with(')') || name.contains('('))
}

/// First response field is always the result code.
pub(crate) fn pop_result_code(response: &mut Message) -> Result<()> {
    let code = response.pop_i32()?;
    if code_is_ok(code) {
        Ok(())
    } else {
        Err(Error::from_code(code))
    }
}

pub(crate) fn error_response(error: Error) -> Message {
    let mut response = Message::new();
    response.push_i32(error.code());
    response
}
