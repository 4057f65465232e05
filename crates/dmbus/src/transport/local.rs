// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! In-process broker: routes requests, subscriptions, and events between
//! components of a single process without any socket plumbing.
//!
//! Element routes may contain `{i}` placeholders, which match any instance
//! token (digits, `[alias]`, `*`) of an incoming destination, the same way
//! a routing daemon matches table rows. A trivial session manager answers
//! on the well-known session destination so session calls work without an
//! external daemon.

use crate::error::{Error, Result};
use crate::rpc::{
    METHOD_END_SESSION, METHOD_GET_CURRENT_SESSION_ID, METHOD_REQUEST_SESSION_ID,
    SESSION_MANAGER_DESTINATION,
};
use crate::transport::{InboundHandler, Message, Transport};
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Route {
    element: String,
    component: String,
}

#[derive(Debug)]
struct SessionState {
    current: i32,
    next: i32,
}

/// In-process [`Transport`] implementation.
#[derive(Default)]
pub struct LocalTransport {
    endpoints: DashMap<String, Arc<dyn InboundHandler>>,
    routes: RwLock<Vec<Route>>,
    open: Mutex<bool>,
    session: Mutex<SessionState>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { current: 0, next: 1 }
    }
}

impl LocalTransport {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate a broker advisory: drop everything `listener` registered and
    /// tell every remaining component the peer is gone.
    pub fn notify_client_disconnect(&self, listener: &str) {
        self.endpoints.remove(listener);
        self.routes.write().retain(|r| r.component != listener);
        let remaining: Vec<Arc<dyn InboundHandler>> =
            self.endpoints.iter().map(|e| e.value().clone()).collect();
        log::info!("[transport] client {listener} disconnected, notifying {} components", remaining.len());
        for endpoint in remaining {
            endpoint.on_client_disconnect(listener);
        }
    }

    fn require_open(&self) -> Result<()> {
        if *self.open.lock() {
            Ok(())
        } else {
            log::warn!("[transport] operation on closed broker connection");
            Err(Error::Bus)
        }
    }

    fn find_endpoint(&self, destination: &str) -> Option<Arc<dyn InboundHandler>> {
        if let Some(e) = self.endpoints.get(destination) {
            return Some(e.value().clone());
        }
        let routes = self.routes.read();
        for r in routes.iter() {
            if route_matches(&r.element, destination) {
                if let Some(e) = self.endpoints.get(&r.component) {
                    return Some(e.value().clone());
                }
            }
        }
        None
    }

    fn serve_session(&self, method: &str, mut request: Message) -> Message {
        let mut response = Message::new();
        let mut state = self.session.lock();
        match method {
            METHOD_REQUEST_SESSION_ID => {
                if state.current != 0 {
                    log::warn!("[transport] session {} already active", state.current);
                    response.push_i32(Error::SessionAlreadyExists.code());
                    response.push_i32(state.current);
                } else {
                    state.current = state.next;
                    state.next += 1;
                    response.push_i32(0);
                    response.push_i32(state.current);
                }
            }
            METHOD_GET_CURRENT_SESSION_ID => {
                response.push_i32(0);
                response.push_i32(state.current);
            }
            METHOD_END_SESSION => match request.pop_i32() {
                Ok(id) if id != 0 && id == state.current => {
                    state.current = 0;
                    response.push_i32(0);
                    response.push_i32(0);
                }
                _ => {
                    log::warn!("[transport] end-session for a session that is not current");
                    response.push_i32(Error::InvalidInput.code());
                    response.push_i32(state.current);
                }
            },
            other => {
                log::warn!("[transport] unknown session method {other}");
                response.push_i32(Error::InvalidInput.code());
                response.push_i32(0);
            }
        }
        response
    }
}

impl Transport for LocalTransport {
    fn open_connection(&self, component: &str) -> Result<()> {
        let mut open = self.open.lock();
        if *open {
            log::debug!("[transport] connection already open, reused by {component}");
        } else {
            *open = true;
            log::info!("[transport] broker connection opened by {component}");
        }
        Ok(())
    }

    fn close_connection(&self) -> Result<()> {
        let mut open = self.open.lock();
        if *open {
            *open = false;
            log::info!("[transport] broker connection closed");
        } else {
            log::warn!("[transport] close on a connection that is not open");
        }
        Ok(())
    }

    fn register_component(
        &self,
        component: &str,
        endpoint: Arc<dyn InboundHandler>,
    ) -> Result<()> {
        self.require_open()?;
        if self.endpoints.contains_key(component) {
            log::warn!("[transport] component name {component} already registered");
            return Err(Error::Bus);
        }
        self.endpoints.insert(component.to_string(), endpoint);
        Ok(())
    }

    fn unregister_component(&self, component: &str) -> Result<()> {
        self.routes.write().retain(|r| r.component != component);
        if self.endpoints.remove(component).is_none() {
            log::warn!("[transport] unregister of unknown component {component}");
            return Err(Error::Bus);
        }
        Ok(())
    }

    fn advertise_element(&self, component: &str, element: &str) -> Result<()> {
        self.require_open()?;
        let mut routes = self.routes.write();
        if let Some(existing) = routes.iter().find(|r| r.element == element) {
            if existing.component == component {
                return Ok(());
            }
            log::warn!(
                "[transport] element {element} already owned by {}",
                existing.component
            );
            return Err(Error::Bus);
        }
        routes.push(Route {
            element: element.to_string(),
            component: component.to_string(),
        });
        Ok(())
    }

    fn withdraw_element(&self, component: &str, element: &str) -> Result<()> {
        let mut routes = self.routes.write();
        let before = routes.len();
        routes.retain(|r| !(r.component == component && r.element == element));
        if routes.len() == before {
            log::warn!("[transport] withdraw of unknown element {element}");
        }
        Ok(())
    }

    fn invoke(
        &self,
        destination: &str,
        method: &str,
        request: Message,
        _timeout: Duration,
    ) -> Result<Message> {
        self.require_open()?;
        if destination == SESSION_MANAGER_DESTINATION {
            return Ok(self.serve_session(method, request));
        }
        match self.find_endpoint(destination) {
            Some(endpoint) => Ok(endpoint.on_request(method, request)),
            None => {
                log::warn!("[transport] no route to {destination}");
                Err(Error::Bus)
            }
        }
    }

    fn subscribe_event(
        &self,
        event_name: &str,
        listener: &str,
        filter: Option<&Value>,
        _timeout: Duration,
    ) -> Result<()> {
        self.require_open()?;
        match self.find_endpoint(event_name) {
            Some(owner) => owner.on_subscribe(event_name, listener, filter.cloned(), true),
            None => {
                log::debug!("[transport] no provider yet for event {event_name}");
            }
        }
        Ok(())
    }

    fn unsubscribe_event(&self, event_name: &str, listener: &str) -> Result<()> {
        self.require_open()?;
        if let Some(owner) = self.find_endpoint(event_name) {
            owner.on_subscribe(event_name, listener, None, false);
        }
        Ok(())
    }

    fn publish_event(&self, event_name: &str, listener: &str, event: &Message) -> Result<()> {
        self.require_open()?;
        match self.endpoints.get(listener).map(|e| e.value().clone()) {
            Some(endpoint) => {
                endpoint.on_event(event.clone());
                Ok(())
            }
            None => {
                log::warn!("[transport] publish of {event_name} to unknown listener {listener}");
                Err(Error::Bus)
            }
        }
    }

    fn resolve_wildcard(&self, expression: &str) -> Result<Vec<String>> {
        let routes = self.routes.read();
        let mut owners: Vec<String> = Vec::new();
        for r in routes.iter() {
            if route_matches(&r.element, expression) && !owners.contains(&r.component) {
                owners.push(r.component.clone());
            }
        }
        Ok(owners)
    }

    fn element_owners(&self, element_names: &[&str]) -> Result<Vec<(String, String)>> {
        let routes = self.routes.read();
        let mut found = Vec::new();
        for name in element_names {
            if let Some(r) = routes.iter().find(|r| route_matches(&r.element, name)) {
                found.push(((*name).to_string(), r.component.clone()));
            }
        }
        Ok(found)
    }

    fn component_elements(&self, component: &str) -> Result<Vec<String>> {
        let routes = self.routes.read();
        Ok(routes
            .iter()
            .filter(|r| r.component == component)
            .map(|r| r.element.clone())
            .collect())
    }
}

/// True when `dest` names something inside (or above) the subtree an
/// advertised `pattern` covers. Comparison is tokenwise and stops at the
/// shorter name, so `Device.WiFi.` reaches a component advertising
/// `Device.WiFi.AP.{i}.Status`.
fn route_matches(pattern: &str, dest: &str) -> bool {
    let dst: Vec<&str> = dest.split('.').filter(|t| !t.is_empty()).collect();
    if dst.is_empty() {
        return false;
    }
    pattern
        .split('.')
        .filter(|t| !t.is_empty())
        .zip(dst.iter())
        .all(|(p, d)| token_matches(p, d))
}

fn token_matches(pattern: &str, dest: &str) -> bool {
    if pattern == dest || dest == "*" {
        return true;
    }
    pattern == "{i}" && is_instance_token(dest)
}

fn is_instance_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    token == "*"
        || token == "{i}"
        || token.bytes().all(|b| b.is_ascii_digit())
        || (token.starts_with('[') && token.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct RecordingEndpoint {
        requests: PlMutex<Vec<String>>,
        subscribes: PlMutex<Vec<(String, String, bool)>>,
        events: PlMutex<Vec<Message>>,
        disconnects: PlMutex<Vec<String>>,
    }

    impl InboundHandler for RecordingEndpoint {
        fn on_request(&self, method: &str, _request: Message) -> Message {
            self.requests.lock().push(method.to_string());
            let mut resp = Message::new();
            resp.push_i32(0);
            resp
        }

        fn on_subscribe(&self, event_name: &str, listener: &str, _filter: Option<Value>, added: bool) {
            self.subscribes
                .lock()
                .push((event_name.to_string(), listener.to_string(), added));
        }

        fn on_event(&self, event: Message) {
            self.events.lock().push(event);
        }

        fn on_client_disconnect(&self, listener: &str) {
            self.disconnects.lock().push(listener.to_string());
        }
    }

    fn open_with_endpoint(name: &str) -> (Arc<LocalTransport>, Arc<RecordingEndpoint>) {
        let transport = LocalTransport::new();
        transport.open_connection(name).expect("open");
        let endpoint = Arc::new(RecordingEndpoint::default());
        transport
            .register_component(name, endpoint.clone())
            .expect("register");
        (transport, endpoint)
    }

    #[test]
    fn test_route_token_matching() {
        assert!(route_matches("Device.WiFi.Status", "Device.WiFi.Status"));
        assert!(route_matches("Device.WiFi.AP.{i}.SSID", "Device.WiFi.AP.1.SSID"));
        assert!(route_matches("Device.WiFi.AP.{i}.SSID", "Device.WiFi.AP.[lan].SSID"));
        assert!(route_matches("Device.WiFi.AP.{i}.SSID", "Device.WiFi.AP.*.SSID"));
        assert!(route_matches("Device.WiFi.AP.{i}.SSID", "Device.WiFi."));
        assert!(!route_matches("Device.WiFi.AP.{i}.SSID", "Device.Ethernet."));
        assert!(!route_matches("Device.WiFi.AP.{i}.SSID", "Device.WiFi.AP.lan.SSID"));
        assert!(!route_matches("Device.WiFi.Status", ""));
    }

    #[test]
    fn test_invoke_routes_by_element_pattern() {
        let (transport, endpoint) = open_with_endpoint("wifi");
        transport
            .advertise_element("wifi", "Device.WiFi.AP.{i}.SSID")
            .expect("advertise");

        let resp = transport
            .invoke(
                "Device.WiFi.AP.2.SSID",
                "GetParameterValues",
                Message::new(),
                Duration::from_secs(1),
            )
            .expect("invoke");
        assert_eq!(resp.clone().pop_i32().expect("code"), 0);
        assert_eq!(endpoint.requests.lock().as_slice(), ["GetParameterValues"]);
    }

    #[test]
    fn test_invoke_unknown_destination() {
        let (transport, _endpoint) = open_with_endpoint("wifi");
        let err = transport
            .invoke("Device.Nope.", "GetParameterValues", Message::new(), Duration::ZERO)
            .expect_err("should not route");
        assert_eq!(err, Error::Bus);
    }

    #[test]
    fn test_closed_connection_rejects_traffic() {
        let transport = LocalTransport::new();
        let err = transport
            .invoke("Device.X.", "GetParameterValues", Message::new(), Duration::ZERO)
            .expect_err("closed");
        assert_eq!(err, Error::Bus);
    }

    #[test]
    fn test_duplicate_component_name_rejected() {
        let (transport, _endpoint) = open_with_endpoint("wifi");
        let another = Arc::new(RecordingEndpoint::default());
        assert_eq!(
            transport.register_component("wifi", another),
            Err(Error::Bus)
        );
    }

    #[test]
    fn test_element_ownership_conflict() {
        let (transport, _a) = open_with_endpoint("alpha");
        let beta = Arc::new(RecordingEndpoint::default());
        transport
            .register_component("beta", beta)
            .expect("register beta");

        transport
            .advertise_element("alpha", "Device.X.Status")
            .expect("first advertise");
        // same component re-advertising is fine
        transport
            .advertise_element("alpha", "Device.X.Status")
            .expect("idempotent advertise");
        assert_eq!(
            transport.advertise_element("beta", "Device.X.Status"),
            Err(Error::Bus)
        );
    }

    #[test]
    fn test_subscribe_notifies_owner() {
        let (transport, endpoint) = open_with_endpoint("wifi");
        transport
            .advertise_element("wifi", "Device.WiFi.StatusChanged")
            .expect("advertise");

        transport
            .subscribe_event("Device.WiFi.StatusChanged", "ui", None, Duration::ZERO)
            .expect("subscribe");
        transport
            .unsubscribe_event("Device.WiFi.StatusChanged", "ui")
            .expect("unsubscribe");

        let subs = endpoint.subscribes.lock();
        assert_eq!(
            subs.as_slice(),
            [
                ("Device.WiFi.StatusChanged".to_string(), "ui".to_string(), true),
                ("Device.WiFi.StatusChanged".to_string(), "ui".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_subscribe_without_provider_still_succeeds() {
        let (transport, _endpoint) = open_with_endpoint("wifi");
        transport
            .subscribe_event("Device.Unknown.Event", "ui", None, Duration::ZERO)
            .expect("subscribe should not fail");
    }

    #[test]
    fn test_session_manager_lifecycle() {
        let (transport, _endpoint) = open_with_endpoint("wifi");
        let call = |method: &str, req: Message| {
            transport
                .invoke(SESSION_MANAGER_DESTINATION, method, req, Duration::ZERO)
                .expect("session call")
        };

        let mut resp = call(METHOD_REQUEST_SESSION_ID, Message::new());
        assert_eq!(resp.pop_i32().expect("code"), 0);
        let id = resp.pop_i32().expect("session id");
        assert_eq!(id, 1);

        // second create while one is active is refused
        let mut resp = call(METHOD_REQUEST_SESSION_ID, Message::new());
        assert_ne!(resp.pop_i32().expect("code"), 0);

        let mut resp = call(METHOD_GET_CURRENT_SESSION_ID, Message::new());
        assert_eq!(resp.pop_i32().expect("code"), 0);
        assert_eq!(resp.pop_i32().expect("session id"), id);

        let mut end = Message::new();
        end.push_i32(id);
        let mut resp = call(METHOD_END_SESSION, end);
        assert_eq!(resp.pop_i32().expect("code"), 0);

        // a fresh session gets a fresh id
        let mut resp = call(METHOD_REQUEST_SESSION_ID, Message::new());
        assert_eq!(resp.pop_i32().expect("code"), 0);
        assert_eq!(resp.pop_i32().expect("session id"), 2);
    }

    #[test]
    fn test_disconnect_removes_and_broadcasts() {
        let (transport, survivor) = open_with_endpoint("wifi");
        let doomed = Arc::new(RecordingEndpoint::default());
        transport
            .register_component("ui", doomed)
            .expect("register ui");
        transport
            .advertise_element("ui", "Device.UI.Status")
            .expect("advertise");

        transport.notify_client_disconnect("ui");

        assert_eq!(survivor.disconnects.lock().as_slice(), ["ui"]);
        assert!(transport.resolve_wildcard("Device.UI.").expect("resolve").is_empty());
        assert_eq!(
            transport.publish_event("Device.UI.Status", "ui", &Message::new()),
            Err(Error::Bus)
        );
    }
}
