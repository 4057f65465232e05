// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Data-model element descriptors: what a provider registers and the
//! callbacks the dispatcher routes into.
//!
//! An element's capabilities are carried by [`ElementKind`]; a kind without
//! the relevant handler (say a property with no set callback) makes the
//! corresponding operation fail with `AccessNotAllowed` at dispatch time.
//! All handlers are `Arc`-wrapped so table rows instantiated from a `{i}`
//! template share the registered callbacks.

mod tree;

pub use tree::{ElementNode, ElementTree, NodeId, RemovedSubtree};

use crate::error::Result;
use crate::handle::Handle;
use crate::value::{Property, Value};
use std::fmt;
use std::sync::Arc;

/// Whether a subscriber is arriving or leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAction {
    Subscribe,
    Unsubscribe,
}

/// Context passed to get handlers.
#[derive(Debug, Clone, Default)]
pub struct GetHandlerOptions {
    /// Component that issued the read, when known.
    pub requesting_component: String,
}

/// Context passed to set handlers.
#[derive(Debug, Clone)]
pub struct SetHandlerOptions {
    pub session_id: i32,
    pub requesting_component: String,
    /// False while batching under a session; the final write carries true.
    pub commit: bool,
}

pub type GetHandler =
    Arc<dyn Fn(&Handle, &str, &GetHandlerOptions) -> Result<Value> + Send + Sync>;
pub type SetHandler =
    Arc<dyn Fn(&Handle, &Property, &SetHandlerOptions) -> Result<()> + Send + Sync>;
pub type AddRowHandler = Arc<dyn Fn(&Handle, &str, Option<&str>) -> Result<u32> + Send + Sync>;
pub type RemoveRowHandler = Arc<dyn Fn(&Handle, &str) -> Result<()> + Send + Sync>;
/// Called when an event/property gains or loses a subscriber. The `bool`
/// output starts true and may be cleared to opt out of automatic
/// value-change publication for the element.
pub type SubscribeHandler = Arc<
    dyn Fn(&Handle, SubscribeAction, &str, Option<&Value>, &mut bool) -> Result<()> + Send + Sync,
>;

/// Callbacks for a readable/writable parameter.
#[derive(Clone, Default)]
pub struct PropertyHandlers {
    pub get: Option<GetHandler>,
    pub set: Option<SetHandler>,
    pub subscribe: Option<SubscribeHandler>,
}

/// Callbacks for a multi-instance table.
#[derive(Clone, Default)]
pub struct TableHandlers {
    pub add_row: Option<AddRowHandler>,
    pub remove_row: Option<RemoveRowHandler>,
    pub subscribe: Option<SubscribeHandler>,
}

/// Callbacks for a named event.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub subscribe: Option<SubscribeHandler>,
}

impl PropertyHandlers {
    pub fn read_only<F>(get: F) -> Self
    where
        F: Fn(&Handle, &str, &GetHandlerOptions) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            get: Some(Arc::new(get)),
            ..Self::default()
        }
    }

    pub fn read_write<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&Handle, &str, &GetHandlerOptions) -> Result<Value> + Send + Sync + 'static,
        S: Fn(&Handle, &Property, &SetHandlerOptions) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            get: Some(Arc::new(get)),
            set: Some(Arc::new(set)),
            subscribe: None,
        }
    }

    #[must_use]
    pub fn with_subscribe<F>(mut self, subscribe: F) -> Self
    where
        F: Fn(&Handle, SubscribeAction, &str, Option<&Value>, &mut bool) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.subscribe = Some(Arc::new(subscribe));
        self
    }
}

impl TableHandlers {
    pub fn new<A, R>(add_row: A, remove_row: R) -> Self
    where
        A: Fn(&Handle, &str, Option<&str>) -> Result<u32> + Send + Sync + 'static,
        R: Fn(&Handle, &str) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            add_row: Some(Arc::new(add_row)),
            remove_row: Some(Arc::new(remove_row)),
            subscribe: None,
        }
    }
}

impl EventHandlers {
    pub fn on_subscribe<F>(subscribe: F) -> Self
    where
        F: Fn(&Handle, SubscribeAction, &str, Option<&Value>, &mut bool) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            subscribe: Some(Arc::new(subscribe)),
        }
    }
}

/// Role and callbacks of a registered element.
#[derive(Clone, Default)]
pub enum ElementKind {
    /// Structural node with no behavior of its own.
    #[default]
    Object,
    Property(PropertyHandlers),
    Table(TableHandlers),
    Event(EventHandlers),
    Method,
}

impl ElementKind {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ElementKind::Object => "object",
            ElementKind::Property(_) => "property",
            ElementKind::Table(_) => "table",
            ElementKind::Event(_) => "event",
            ElementKind::Method => "method",
        }
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, ElementKind::Object)
    }

    #[must_use]
    pub fn is_property(&self) -> bool {
        matches!(self, ElementKind::Property(_))
    }

    #[must_use]
    pub fn is_table(&self) -> bool {
        matches!(self, ElementKind::Table(_))
    }

    /// The subscribe handler shared by properties, tables, and events.
    #[must_use]
    pub fn subscribe_handler(&self) -> Option<SubscribeHandler> {
        match self {
            ElementKind::Property(h) => h.subscribe.clone(),
            ElementKind::Table(h) => h.subscribe.clone(),
            ElementKind::Event(h) => h.subscribe.clone(),
            _ => None,
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Property(h) => f
                .debug_struct("Property")
                .field("get", &h.get.is_some())
                .field("set", &h.set.is_some())
                .field("subscribe", &h.subscribe.is_some())
                .finish(),
            ElementKind::Table(h) => f
                .debug_struct("Table")
                .field("add_row", &h.add_row.is_some())
                .field("remove_row", &h.remove_row.is_some())
                .field("subscribe", &h.subscribe.is_some())
                .finish(),
            ElementKind::Event(h) => f
                .debug_struct("Event")
                .field("subscribe", &h.subscribe.is_some())
                .finish(),
            ElementKind::Object => write!(f, "Object"),
            ElementKind::Method => write!(f, "Method"),
        }
    }
}

/// A single registration entry: a dotted name (tables end in `.{i}.`) and
/// the callbacks serving it.
#[derive(Debug, Clone)]
pub struct DataElement {
    pub name: String,
    pub kind: ElementKind,
}

impl DataElement {
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Object,
        }
    }

    pub fn property(name: impl Into<String>, handlers: PropertyHandlers) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Property(handlers),
        }
    }

    pub fn table(name: impl Into<String>, handlers: TableHandlers) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Table(handlers),
        }
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Event(EventHandlers::default()),
        }
    }

    pub fn event_with_handlers(name: impl Into<String>, handlers: EventHandlers) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Event(handlers),
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ElementKind::Method,
        }
    }
}
