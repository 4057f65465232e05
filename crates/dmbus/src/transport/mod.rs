// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Broker transport abstraction.
//!
//! The bus core never touches sockets: everything it needs from a broker is
//! behind [`Transport`], and everything a broker delivers back into a
//! component goes through that component's [`InboundHandler`] endpoint.
//! [`LocalTransport`] wires both together in-process for single-process
//! deployments and integration tests.

mod local;
mod message;

pub use local::LocalTransport;
pub use message::Message;

use crate::error::Result;
use crate::value::Value;
use std::sync::Arc;
use std::time::Duration;

/// Per-component endpoint the transport delivers into.
///
/// Implementations must be re-entrant with respect to the transport: a
/// handler is free to issue new transport calls while servicing a delivery.
pub trait InboundHandler: Send + Sync {
    /// Service a request addressed to this component and produce the
    /// response message.
    fn on_request(&self, method: &str, request: Message) -> Message;

    /// A listener subscribed (`added = true`) or unsubscribed to an event
    /// this component owns. The filter travels with the subscription and
    /// is part of its identity.
    fn on_subscribe(&self, event_name: &str, listener: &str, filter: Option<Value>, added: bool);

    /// An event this component subscribed to was published.
    fn on_event(&self, event: Message);

    /// A peer component's connection went away.
    fn on_client_disconnect(&self, listener: &str);
}

/// Operations the bus core requires from a broker connection.
pub trait Transport: Send + Sync {
    /// Open the process-shared broker connection. Opening while already
    /// open is not an error; the first component to open wins.
    fn open_connection(&self, component: &str) -> Result<()>;

    /// Close the process-shared broker connection.
    fn close_connection(&self) -> Result<()>;

    /// Register a component inbox and its delivery endpoint.
    fn register_component(&self, component: &str, endpoint: Arc<dyn InboundHandler>)
        -> Result<()>;

    /// Remove a component inbox and every route it advertised.
    fn unregister_component(&self, component: &str) -> Result<()>;

    /// Advertise ownership of an element name (may contain `{i}` instance
    /// placeholders) so requests route to `component`.
    fn advertise_element(&self, component: &str, element: &str) -> Result<()>;

    /// Withdraw a previously advertised element name.
    fn withdraw_element(&self, component: &str, element: &str) -> Result<()>;

    /// Invoke a named method on whichever component owns `destination` and
    /// wait up to `timeout` for the response.
    fn invoke(
        &self,
        destination: &str,
        method: &str,
        request: Message,
        timeout: Duration,
    ) -> Result<Message>;

    /// Subscribe `listener` to an event name; the owning provider is
    /// notified when one exists.
    fn subscribe_event(
        &self,
        event_name: &str,
        listener: &str,
        filter: Option<&Value>,
        timeout: Duration,
    ) -> Result<()>;

    /// Remove `listener`'s subscription to an event name.
    fn unsubscribe_event(&self, event_name: &str, listener: &str) -> Result<()>;

    /// Deliver one published event message to one listener.
    fn publish_event(&self, event_name: &str, listener: &str, event: &Message) -> Result<()>;

    /// Components owning elements that match a wildcard expression.
    fn resolve_wildcard(&self, expression: &str) -> Result<Vec<String>>;

    /// Discovery: owning component per element name, for the names that
    /// resolve.
    fn element_owners(&self, element_names: &[&str]) -> Result<Vec<(String, String)>>;

    /// Discovery: element names a component advertised.
    fn component_elements(&self, component: &str) -> Result<Vec<String>>;
}
