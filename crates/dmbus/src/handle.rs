// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! A component's connection to the bus.
//!
//! A [`Handle`] is both consumer and provider: it issues parameter reads
//! and writes, creates and removes table rows, subscribes to events, and,
//! on the provider side, owns the element tree, the subscription registry,
//! and the value-change detector that inbound dispatch works against.
//!
//! One mutex guards all per-handle state. Registered callbacks and
//! transport calls never run under it; dispatch resolves what it needs,
//! releases the lock, and re-resolves by name afterwards when state may
//! have moved.

use crate::codec;
use crate::config::Config;
use crate::element::{DataElement, ElementTree};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, SubscriptionRegistry, ValueChangeDetector};
use crate::rpc::{client, error_response, server};
use crate::transport::{InboundHandler, Message, Transport};
use crate::value::{Object, Property, Value};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Invoked for every delivery of a subscribed event.
pub type EventCallback = Arc<dyn Fn(&Handle, &Event) + Send + Sync>;

/// Options for parameter writes.
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Apply immediately. Clear it to batch several writes under one
    /// session and commit with the final one.
    pub commit: bool,
    pub session_id: i32,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            commit: true,
            session_id: 0,
        }
    }
}

/// One entry of a batched subscribe; the batch is atomic, so a failure
/// rolls back the entries already subscribed.
pub struct EventSubscription {
    pub event_name: String,
    pub filter: Option<Value>,
    pub handler: EventCallback,
}

impl EventSubscription {
    pub fn new<F>(event_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Handle, &Event) + Send + Sync + 'static,
    {
        Self {
            event_name: event_name.into(),
            filter: None,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

struct ConsumerSub {
    event_name: String,
    handler: EventCallback,
}

pub(crate) struct HandleState {
    pub(crate) elements: ElementTree,
    pub(crate) subscriptions: SubscriptionRegistry,
    consumer_subs: Vec<ConsumerSub>,
}

impl HandleState {
    fn new(component_name: &str) -> Self {
        Self {
            elements: ElementTree::new(component_name),
            subscriptions: SubscriptionRegistry::default(),
            consumer_subs: Vec::new(),
        }
    }

    /// Split borrows for operations that move subscriptions and elements
    /// together.
    pub(crate) fn split_mut(&mut self) -> (&mut ElementTree, &mut SubscriptionRegistry) {
        (&mut self.elements, &mut self.subscriptions)
    }
}

pub(crate) struct HandleInner {
    component_name: String,
    component_id: i32,
    transport: Arc<dyn Transport>,
    config: Arc<ArcSwap<Config>>,
    bus: Weak<crate::bus::BusCore>,
    state: Mutex<HandleState>,
    detector: ValueChangeDetector,
    closed: AtomicBool,
}

impl HandleInner {
    pub(crate) fn new(
        component_name: String,
        component_id: i32,
        transport: Arc<dyn Transport>,
        config: Arc<ArcSwap<Config>>,
        bus: Weak<crate::bus::BusCore>,
    ) -> Self {
        let state = HandleState::new(&component_name);
        Self {
            component_name,
            component_id,
            transport,
            config,
            bus,
            state: Mutex::new(state),
            detector: ValueChangeDetector::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn component_name(&self) -> &str {
        &self.component_name
    }

    pub(crate) fn component_id(&self) -> i32 {
        self.component_id
    }
}

/// Cheaply cloneable reference to an open bus connection.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("component_name", &self.inner.component_name)
            .field("component_id", &self.inner.component_id)
            .finish_non_exhaustive()
    }
}

pub(crate) struct WeakHandle {
    inner: Weak<HandleInner>,
}

impl WeakHandle {
    pub(crate) fn upgrade(&self) -> Option<Handle> {
        self.inner.upgrade().map(|inner| Handle { inner })
    }
}

impl Handle {
    pub(crate) fn from_inner(inner: Arc<HandleInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<HandleInner> {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn component_name(&self) -> &str {
        &self.inner.component_name
    }

    /// Monotonic id assigned at open; never reused within a bus.
    #[must_use]
    pub fn component_id(&self) -> i32 {
        self.inner.component_id
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub(crate) fn detector(&self) -> &ValueChangeDetector {
        &self.inner.detector
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut HandleState) -> R) -> R {
        let mut state = self.inner.state.lock();
        f(&mut state)
    }

    pub(crate) fn get_timeout(&self) -> Duration {
        self.inner.config.load().read_get_timeout()
    }

    pub(crate) fn set_timeout(&self) -> Duration {
        self.inner.config.load().read_set_timeout()
    }

    pub(crate) fn subscribe_timeout(&self) -> Duration {
        self.inner.config.load().subscribe_timeout()
    }

    pub(crate) fn value_change_period(&self) -> Duration {
        self.inner.config.load().value_change_period()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            log::warn!("[handle] {} used after close", self.inner.component_name);
            return Err(Error::InvalidHandle);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Provider registration
    // ------------------------------------------------------------------

    /// Register data elements and advertise them to the routing layer. The
    /// batch is transactional: a failure unwinds everything this call
    /// already registered.
    pub fn register_data_elements(&self, elements: &[DataElement]) -> Result<()> {
        self.ensure_open()?;
        if elements.is_empty() {
            return Err(Error::InvalidInput);
        }
        let mut registered: Vec<String> = Vec::new();
        for element in elements {
            let inserted =
                self.with_state(|state| state.elements.insert(&element.name, element.kind.clone()));
            if let Err(e) = inserted {
                log::warn!("[handle] could not insert {}: {e}", element.name);
                self.rollback_registrations(&registered);
                return Err(Error::OutOfResources);
            }
            if let Err(e) = self
                .inner
                .transport
                .advertise_element(&self.inner.component_name, &element.name)
            {
                log::warn!("[handle] could not advertise {}: {e}", element.name);
                if let Err(undo) = self.drop_registration(&element.name) {
                    log::debug!("[handle] undo of {} failed: {undo}", element.name);
                }
                self.rollback_registrations(&registered);
                return Err(e);
            }
            registered.push(element.name.clone());
        }
        log::debug!(
            "[handle] {} registered {} data elements",
            self.inner.component_name,
            elements.len()
        );
        Ok(())
    }

    /// Drop registrations. Individual failures are logged and skipped so a
    /// teardown loop always makes progress.
    pub fn unregister_data_elements(&self, elements: &[DataElement]) -> Result<()> {
        self.ensure_open()?;
        for element in elements {
            if let Err(e) = self.drop_registration(&element.name) {
                log::warn!("[handle] unregister of {} failed: {e}", element.name);
            }
            if let Err(e) = self
                .inner
                .transport
                .withdraw_element(&self.inner.component_name, &element.name)
            {
                log::warn!("[handle] withdraw of {} failed: {e}", element.name);
            }
        }
        Ok(())
    }

    fn drop_registration(&self, name: &str) -> Result<()> {
        let removed = self.with_state(|state| {
            let (elements, subscriptions) = state.split_mut();
            let removed = elements.remove_registration(name)?;
            subscriptions.purge_nodes(&removed);
            Ok::<_, Error>(removed)
        })?;
        self.inner.detector.unwatch_many(&removed.nodes);
        Ok(())
    }

    fn rollback_registrations(&self, names: &[String]) {
        for name in names {
            if let Err(e) = self.drop_registration(name) {
                log::debug!("[handle] rollback of {name} failed: {e}");
            }
            if let Err(e) = self
                .inner
                .transport
                .withdraw_element(&self.inner.component_name, name)
            {
                log::debug!("[handle] rollback withdraw of {name} failed: {e}");
            }
        }
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Publish an event from an element this handle provides. Fan-out is
    /// per subscriber, each delivery named the way that subscriber
    /// subscribed; the payload is encoded once. All deliveries are
    /// attempted and the first failure is reported.
    pub fn publish(&self, event: &Event) -> Result<()> {
        self.ensure_open()?;
        if event.name.is_empty() {
            log::warn!("[handle] publish with an empty event name");
            return Err(Error::InvalidInput);
        }
        self.publish_from_element(&event.name, event.kind, &event.data)
    }

    pub(crate) fn publish_from_element(
        &self,
        element_name: &str,
        kind: EventKind,
        data: &Object,
    ) -> Result<()> {
        if element_name.is_empty() {
            return Err(Error::InvalidInput);
        }
        let targets = self.with_state(|state| {
            let node = state.elements.retrieve_instance(element_name)?;
            Some(state.subscriptions.snapshot_for_node(node))
        });
        let Some(targets) = targets else {
            log::warn!("[handle] publish from unknown element {element_name}");
            return Err(Error::ElementDoesNotExist);
        };
        if targets.is_empty() {
            log::debug!("[handle] no subscribers for {element_name}");
            return Ok(());
        }

        let mut payload = Message::new();
        codec::encode_object(&mut payload, data);

        let mut first_error = None;
        for (listener, subscribed_name) in targets {
            let mut message = Message::new();
            message.push_str(&subscribed_name);
            message.push_i32(kind.code());
            message.push_message(&payload);
            if let Err(e) = self
                .inner
                .transport
                .publish_event(&subscribed_name, &listener, &message)
            {
                log::warn!("[handle] delivery of {subscribed_name} to {listener} failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Change notification from the poll thread; failures are logged, not
    /// propagated, so one bad delivery never stalls detection.
    pub(crate) fn publish_value_change(&self, full_name: &str, new_value: Value, old_value: Value) {
        let event = Event::value_changed(full_name, new_value, old_value);
        if let Err(e) = self.publish_from_element(full_name, EventKind::ValueChanged, &event.data) {
            log::debug!("[handle] value-change event for {full_name} not delivered: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Consumer reads and writes
    // ------------------------------------------------------------------

    /// Read one concrete parameter.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.ensure_open()?;
        client::get_value(self, name)
    }

    /// Read several parameters or a wildcard expression. See
    /// [`Handle::get`] for the single-parameter form.
    pub fn get_multiple(&self, names: &[&str]) -> Result<Vec<Property>> {
        self.ensure_open()?;
        client::get_multiple(self, names)
    }

    pub fn get_i32(&self, name: &str) -> Result<i32> {
        self.ensure_open()?;
        client::get_typed_i32(self, name)
    }

    pub fn get_u32(&self, name: &str) -> Result<u32> {
        self.ensure_open()?;
        client::get_typed_u32(self, name)
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        self.ensure_open()?;
        client::get_typed_string(self, name)
    }

    /// Write one parameter with default options (immediate commit).
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        self.set_with_options(name, value, &SetOptions::default())
    }

    pub fn set_with_options(&self, name: &str, value: Value, opts: &SetOptions) -> Result<()> {
        self.ensure_open()?;
        client::set_properties(self, &[Property::new(name, value)], opts)
    }

    /// Write a batch of parameters addressed to the owner of the first
    /// name. Values apply in order with no rollback on failure.
    pub fn set_multiple(&self, props: &[Property], opts: &SetOptions) -> Result<()> {
        self.ensure_open()?;
        client::set_properties(self, props, opts)
    }

    pub fn set_i32(&self, name: &str, value: i32) -> Result<()> {
        self.set(name, Value::I32(value))
    }

    pub fn set_u32(&self, name: &str, value: u32) -> Result<()> {
        self.set(name, Value::U32(value))
    }

    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        self.set(name, Value::String(value.to_string()))
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Add a row to a table (name must end with a dot). Returns the
    /// instance number assigned by the provider.
    pub fn table_add_row(&self, table_name: &str, alias: Option<&str>) -> Result<u32> {
        self.ensure_open()?;
        client::add_row(self, table_name, alias)
    }

    pub fn table_remove_row(&self, row_name: &str) -> Result<()> {
        self.ensure_open()?;
        client::remove_row(self, row_name)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Open the process-wide write session. Refused while another session
    /// is active.
    pub fn create_session(&self) -> Result<i32> {
        self.ensure_open()?;
        client::create_session(self)
    }

    /// Current session id; 0 when none is active.
    pub fn get_current_session(&self) -> Result<i32> {
        self.ensure_open()?;
        client::get_current_session(self)
    }

    pub fn close_session(&self, session_id: i32) -> Result<()> {
        self.ensure_open()?;
        client::close_session(self, session_id)
    }

    // ------------------------------------------------------------------
    // Events (consumer side)
    // ------------------------------------------------------------------

    /// Subscribe to an event or property change by name (wildcard forms
    /// included).
    pub fn subscribe<F>(&self, event_name: &str, callback: F) -> Result<()>
    where
        F: Fn(&Handle, &Event) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.subscribe_one(event_name, None, Arc::new(callback))
    }

    /// Subscribe with a provider-interpreted filter value.
    pub fn subscribe_with_filter<F>(
        &self,
        event_name: &str,
        filter: Option<Value>,
        callback: F,
    ) -> Result<()>
    where
        F: Fn(&Handle, &Event) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.subscribe_one(event_name, filter, Arc::new(callback))
    }

    /// Subscribe to a batch atomically: the first failure unsubscribes the
    /// entries already made and reports the error.
    pub fn subscribe_multiple(&self, subscriptions: Vec<EventSubscription>) -> Result<()> {
        self.ensure_open()?;
        let mut done: Vec<String> = Vec::new();
        for sub in &subscriptions {
            match self.subscribe_one(&sub.event_name, sub.filter.clone(), sub.handler.clone()) {
                Ok(()) => done.push(sub.event_name.clone()),
                Err(e) => {
                    log::warn!(
                        "[handle] batch subscribe stopped at {}: {e}",
                        sub.event_name
                    );
                    for name in &done {
                        if let Err(undo) = self.unsubscribe(name) {
                            log::debug!("[handle] rollback unsubscribe of {name} failed: {undo}");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn subscribe_one(
        &self,
        event_name: &str,
        filter: Option<Value>,
        handler: EventCallback,
    ) -> Result<()> {
        if event_name.is_empty() {
            return Err(Error::InvalidInput);
        }
        // record first so events arriving during the subscribe call are
        // deliverable
        self.with_state(|state| {
            state.consumer_subs.push(ConsumerSub {
                event_name: event_name.to_string(),
                handler,
            });
        });
        if let Err(e) = self.inner.transport.subscribe_event(
            event_name,
            &self.inner.component_name,
            filter.as_ref(),
            self.subscribe_timeout(),
        ) {
            self.with_state(|state| {
                if let Some(pos) = state
                    .consumer_subs
                    .iter()
                    .rposition(|s| s.event_name == event_name)
                {
                    state.consumer_subs.remove(pos);
                }
            });
            log::warn!("[handle] subscribe to {event_name} failed: {e}");
            return Err(e);
        }
        log::debug!(
            "[handle] {} subscribed to {event_name}",
            self.inner.component_name
        );
        Ok(())
    }

    /// Drop every local subscription to `event_name` and tell the provider.
    /// Unsubscribing something never subscribed is logged and tolerated.
    pub fn unsubscribe(&self, event_name: &str) -> Result<()> {
        self.ensure_open()?;
        let had = self.with_state(|state| {
            let before = state.consumer_subs.len();
            state.consumer_subs.retain(|s| s.event_name != event_name);
            before != state.consumer_subs.len()
        });
        if !had {
            log::warn!("[handle] not subscribed to {event_name}");
            return Ok(());
        }
        self.inner
            .transport
            .unsubscribe_event(event_name, &self.inner.component_name)
    }

    pub(crate) fn deliver_event(&self, mut message: Message) {
        let event = match codec::decode_event(&mut message) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("[handle] undecodable event: {e}");
                return;
            }
        };
        let callbacks: Vec<EventCallback> = self.with_state(|state| {
            state
                .consumer_subs
                .iter()
                .filter(|s| s.event_name == event.name)
                .map(|s| s.handler.clone())
                .collect()
        });
        if callbacks.is_empty() {
            log::debug!("[handle] no local subscriber for event {}", event.name);
            return;
        }
        for callback in callbacks {
            callback(self, &event);
        }
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Which component owns each of the given element names. Names nobody
    /// advertises are omitted from the result.
    pub fn discover_component_name(
        &self,
        element_names: &[&str],
    ) -> Result<Vec<(String, String)>> {
        self.ensure_open()?;
        self.inner.transport.element_owners(element_names)
    }

    /// Every element a component advertises.
    pub fn discover_component_data_elements(&self, component: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.inner.transport.component_elements(component)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Close the connection: consumer subscriptions go first, then change
    /// detection, then provider state, then the transport registration.
    /// The last handle out closes the shared broker connection. Errors are
    /// collected, logged, and the first one reported; teardown always runs
    /// to the end.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidHandle);
        }
        let mut first_error: Option<Error> = None;

        let mut consumer_names: Vec<String> = self.with_state(|state| {
            let names = state
                .consumer_subs
                .iter()
                .map(|s| s.event_name.clone())
                .collect();
            state.consumer_subs.clear();
            names
        });
        consumer_names.sort();
        consumer_names.dedup();
        for name in consumer_names {
            if let Err(e) = self
                .inner
                .transport
                .unsubscribe_event(&name, &self.inner.component_name)
            {
                log::warn!("[handle] close could not unsubscribe {name}: {e}");
            }
        }

        self.inner.detector.close();

        self.with_state(|state| {
            state.subscriptions = SubscriptionRegistry::default();
            state.elements = ElementTree::new(&self.inner.component_name);
        });

        if let Err(e) = self
            .inner
            .transport
            .unregister_component(&self.inner.component_name)
        {
            log::warn!("[handle] close could not unregister: {e}");
            first_error.get_or_insert(Error::InvalidHandle);
        }

        if let Some(core) = self.inner.bus.upgrade() {
            if core.release(&self.inner) {
                if let Err(e) = self.inner.transport.close_connection() {
                    log::warn!("[handle] close could not shut the connection: {e}");
                    first_error.get_or_insert(Error::Bus);
                }
            }
        }

        log::info!("[handle] {} closed", self.inner.component_name);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Transport-facing endpoint. Holds the handle weakly so a closed and
/// released handle cannot be revived by late deliveries.
pub(crate) struct HandleEndpoint {
    inner: Weak<HandleInner>,
}

impl HandleEndpoint {
    pub(crate) fn new(inner: &Arc<HandleInner>) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::downgrade(inner),
        })
    }

    fn handle(&self) -> Option<Handle> {
        let inner = self.inner.upgrade()?;
        if inner.closed.load(Ordering::SeqCst) {
            return None;
        }
        Some(Handle { inner })
    }
}

impl InboundHandler for HandleEndpoint {
    fn on_request(&self, method: &str, request: Message) -> Message {
        match self.handle() {
            Some(handle) => server::dispatch(&handle, method, request),
            None => {
                log::warn!("[handle] request {method} for a closed component");
                error_response(Error::Bus)
            }
        }
    }

    fn on_subscribe(&self, event_name: &str, listener: &str, filter: Option<Value>, added: bool) {
        if let Some(handle) = self.handle() {
            server::handle_subscription_change(&handle, event_name, listener, filter, added);
        }
    }

    fn on_event(&self, event: Message) {
        if let Some(handle) = self.handle() {
            handle.deliver_event(event);
        }
    }

    fn on_client_disconnect(&self, listener: &str) {
        if let Some(handle) = self.handle() {
            server::handle_client_disconnect(&handle, listener);
        }
    }
}
