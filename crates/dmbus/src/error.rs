// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Error taxonomy shared by every bus operation.
//!
//! Each variant has a stable wire code carried in RPC responses; `0` means
//! success and is not representable here. Pre-typed providers used a separate
//! code block starting at 100, of which only the success code survives on the
//! wire today (accepted by response parsers alongside `0`).

use std::fmt;

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wire code meaning "operation succeeded".
pub const RESULT_OK: i32 = 0;

/// Success code emitted by pre-typed (string-only) providers.
pub const LEGACY_RESULT_OK: i32 = 100;

/// Errors that can occur during bus operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transport-level failure, including request timeouts
    Bus,

    /// Null, empty, or malformed argument / request payload
    InvalidInput,

    /// Registration or slot capacity exceeded
    OutOfResources,

    /// Name does not resolve to a registered element
    ElementDoesNotExist,

    /// Element exists but lacks the handler the operation needs
    AccessNotAllowed,

    /// Handle is closed or otherwise unusable
    InvalidHandle,

    /// A data-model session is already active
    SessionAlreadyExists,
}

impl Error {
    /// Wire code carried in RPC response messages.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Bus => 1,
            Self::InvalidInput => 2,
            Self::OutOfResources => 3,
            Self::ElementDoesNotExist => 4,
            Self::AccessNotAllowed => 5,
            Self::InvalidHandle => 6,
            Self::SessionAlreadyExists => 7,
        }
    }

    /// Map a non-success wire code back to an error.
    ///
    /// Unknown codes collapse to [`Error::Bus`]: a peer speaking a newer
    /// revision must not be able to smuggle an unclassified failure past the
    /// caller as success.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Self::InvalidInput,
            3 => Self::OutOfResources,
            4 => Self::ElementDoesNotExist,
            5 => Self::AccessNotAllowed,
            6 => Self::InvalidHandle,
            7 => Self::SessionAlreadyExists,
            _ => Self::Bus,
        }
    }

}

/// True when `code` means success on the wire (modern or legacy).
#[must_use]
pub fn code_is_ok(code: i32) -> bool {
    code == RESULT_OK || code == LEGACY_RESULT_OK
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "bus transport failure"),
            Self::InvalidInput => write!(f, "invalid input"),
            Self::OutOfResources => write!(f, "out of resources"),
            Self::ElementDoesNotExist => write!(f, "element does not exist"),
            Self::AccessNotAllowed => write!(f, "access not allowed"),
            Self::InvalidHandle => write!(f, "invalid handle"),
            Self::SessionAlreadyExists => write!(f, "session already exists"),
        }
    }
}

impl std::error::Error for Error {}
