// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! The typed-field message primitive the codec reads and writes.
//!
//! A message is a FIFO of typed fields (i32, f64, string, bytes). Producers
//! push in encode order, consumers pop in the same order; a pop checks the
//! field type and errors on mismatch or exhaustion instead of inventing a
//! default. How a broker frames these fields into bytes is its own concern
//! and deliberately not modeled here.

use crate::error::{Error, Result};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Int32(i32),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Field {
    fn kind(&self) -> &'static str {
        match self {
            Self::Int32(_) => "i32",
            Self::Double(_) => "f64",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// An ordered sequence of typed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    fields: VecDeque<Field>,
}

impl Message {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields not yet popped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push_i32(&mut self, v: i32) {
        self.fields.push_back(Field::Int32(v));
    }

    pub fn push_f64(&mut self, v: f64) {
        self.fields.push_back(Field::Double(v));
    }

    pub fn push_str(&mut self, v: &str) {
        self.fields.push_back(Field::Str(v.to_string()));
    }

    pub fn push_bytes(&mut self, v: &[u8]) {
        self.fields.push_back(Field::Bytes(v.to_vec()));
    }

    /// Append every field of `other`, preserving order. Used to reuse an
    /// encoded payload across several fan-out messages.
    pub fn push_message(&mut self, other: &Message) {
        self.fields.extend(other.fields.iter().cloned());
    }

    pub fn pop_i32(&mut self) -> Result<i32> {
        match self.fields.pop_front() {
            Some(Field::Int32(v)) => Ok(v),
            other => Err(pop_mismatch("i32", other)),
        }
    }

    pub fn pop_f64(&mut self) -> Result<f64> {
        match self.fields.pop_front() {
            Some(Field::Double(v)) => Ok(v),
            other => Err(pop_mismatch("f64", other)),
        }
    }

    pub fn pop_str(&mut self) -> Result<String> {
        match self.fields.pop_front() {
            Some(Field::Str(v)) => Ok(v),
            other => Err(pop_mismatch("string", other)),
        }
    }

    pub fn pop_bytes(&mut self) -> Result<Vec<u8>> {
        match self.fields.pop_front() {
            Some(Field::Bytes(v)) => Ok(v),
            other => Err(pop_mismatch("bytes", other)),
        }
    }
}

fn pop_mismatch(wanted: &str, got: Option<Field>) -> Error {
    match got {
        Some(field) => {
            log::debug!("[message] pop type mismatch: wanted {wanted}, found {}", field.kind());
        }
        None => {
            log::debug!("[message] pop past end of message: wanted {wanted}");
        }
    }
    Error::InvalidInput
}
