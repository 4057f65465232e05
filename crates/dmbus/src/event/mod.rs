// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Event model and the provider-side machinery behind it: the subscription
//! registry and the polling value-change detector.

mod subscriptions;
mod valuechange;

pub use subscriptions::{Subscription, SubscriptionId, SubscriptionRegistry};
pub use valuechange::ValueChangeDetector;

use crate::value::{Object, Value};

/// Why an event fired. The numeric codes are fixed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ObjectCreated,
    ObjectDeleted,
    ValueChanged,
    General,
}

impl EventKind {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            EventKind::ObjectCreated => 0,
            EventKind::ObjectDeleted => 1,
            EventKind::ValueChanged => 2,
            EventKind::General => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(EventKind::ObjectCreated),
            1 => Some(EventKind::ObjectDeleted),
            2 => Some(EventKind::ValueChanged),
            3 => Some(EventKind::General),
            _ => None,
        }
    }
}

/// A published event: the name delivered to each subscriber is the name
/// that subscriber used, which may be a wildcard expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub kind: EventKind,
    pub data: Object,
}

impl Event {
    pub fn general(name: impl Into<String>, data: Object) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::General,
            data,
        }
    }

    /// Change notification carrying the new and previous values.
    pub fn value_changed(name: impl Into<String>, value: Value, old_value: Value) -> Self {
        let name = name.into();
        let mut data = Object::new(name.clone());
        data.set_property("value", value);
        data.set_property("oldValue", old_value);
        Self {
            name,
            kind: EventKind::ValueChanged,
            data,
        }
    }

    /// Row-creation notification for `table_name`; `alias` is carried as an
    /// empty string when the row has none.
    pub fn row_added(table_name: impl Into<String>, row_name: &str, instance: u32, alias: Option<&str>) -> Self {
        let name = table_name.into();
        let mut data = Object::new(name.clone());
        data.set_property("rowName", Value::String(row_name.to_string()));
        data.set_property("instNum", Value::U32(instance));
        data.set_property("alias", Value::String(alias.unwrap_or_default().to_string()));
        Self {
            name,
            kind: EventKind::ObjectCreated,
            data,
        }
    }

    /// Row-removal notification; `name` is the owning table with a trailing
    /// dot, `row_name` the row that went away.
    pub fn row_removed(table_name: impl Into<String>, row_name: &str) -> Self {
        let name = table_name.into();
        let mut data = Object::new(name.clone());
        data.set_property("rowName", Value::String(row_name.to_string()));
        Self {
            name,
            kind: EventKind::ObjectDeleted,
            data,
        }
    }
}
