// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Value tree model: tagged scalar/composite values, named properties, and
//! hierarchical objects.
//!
//! Everything here is owned data - property lists and object children are
//! plain vectors, cheap to clone and safe to move across threads. The wire
//! representation lives in [`crate::codec`]; the compatibility path for
//! string-only providers lives in [`legacy`].

pub mod legacy;
mod object;
mod property;
#[allow(clippy::module_inception)]
mod value;

pub use object::{Object, ObjectKind};
pub use property::{find, Property};
pub use value::{
    TimeVal, Value, TAG_BOOLEAN, TAG_BYTES, TAG_DATETIME, TAG_DOUBLE, TAG_INT16, TAG_INT32,
    TAG_INT64, TAG_OBJECT, TAG_PROPERTY, TAG_SINGLE, TAG_STRING, TAG_UINT16, TAG_UINT32,
    TAG_UINT64,
};
