// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Provider-side dispatch: turns inbound bus requests into handler calls
//! against the local element tree.
//!
//! Locking discipline: element/subscription state is resolved under the
//! handle state lock, but registered callbacks always run outside it, so a
//! handler is free to publish or call back into the bus. Names are passed
//! to handlers exactly as the requester wrote them (alias forms included).

use crate::codec;
use crate::element::{ElementKind, GetHandler, GetHandlerOptions, NodeId, SetHandlerOptions,
    SubscribeAction};
use crate::error::{Error, Result, RESULT_OK};
use crate::event::{Event, EventKind};
use crate::handle::Handle;
use crate::rpc::{
    error_response, is_wildcard_query, METHOD_ADD_ROW, METHOD_DELETE_ROW, METHOD_GET, METHOD_SET,
};
use crate::transport::Message;
use crate::value::{Property, Value};

pub(crate) fn dispatch(handle: &Handle, method: &str, request: Message) -> Message {
    match method {
        METHOD_GET => get_parameters(handle, request),
        METHOD_SET => set_parameters(handle, request),
        METHOD_ADD_ROW => add_table_row(handle, request),
        METHOD_DELETE_ROW => delete_table_row(handle, request),
        other => {
            log::warn!("[server] {} received unknown method {other}", handle.component_name());
            error_response(Error::InvalidInput)
        }
    }
}

// ============================================================================
// GetParameterValues
// ============================================================================

fn get_parameters(handle: &Handle, mut request: Message) -> Message {
    let result = (|| -> Result<Vec<Property>> {
        let requester = request.pop_str()?;
        let count = request.pop_i32()?;
        if count <= 0 {
            log::warn!("[server] get with invalid parameter count {count}");
            return Err(Error::InvalidInput);
        }
        let mut names = Vec::with_capacity((count as usize).min(request.len()));
        for _ in 0..count {
            names.push(request.pop_str()?);
        }
        let opts = GetHandlerOptions {
            requesting_component: requester,
        };
        // a wildcard expression anywhere in the batch answers the whole
        // request; concrete names riding along are dropped
        match names.iter().find(|name| is_wildcard_query(name)) {
            Some(expression) => get_wildcard(handle, expression, &opts),
            None => get_flat(handle, &names, &opts),
        }
    })();

    match result {
        Ok(props) => {
            let mut response = Message::new();
            response.push_i32(RESULT_OK);
            codec::encode_properties(&mut response, &props);
            response
        }
        Err(e) => error_response(e),
    }
}

/// Partial-path and `*` queries: gather every readable property in the
/// matched subtrees, skipping the ones whose handler fails. An empty
/// harvest reports the element as missing.
fn get_wildcard(
    handle: &Handle,
    expression: &str,
    opts: &GetHandlerOptions,
) -> Result<Vec<Property>> {
    let targets: Vec<(String, GetHandler)> = handle.with_state(|state| {
        let mut nodes: Vec<NodeId> = Vec::new();
        if expression.contains('*') {
            for id in state.elements.resolve_pattern(expression) {
                let Some(node) = state.elements.node(id) else { continue };
                if node.kind.is_property() {
                    push_unique(&[id], &mut nodes);
                } else {
                    push_unique(&state.elements.collect_properties(id), &mut nodes);
                }
            }
        } else if let Some(root) = state.elements.retrieve_instance(expression) {
            push_unique(&state.elements.collect_properties(root), &mut nodes);
        }
        nodes
            .into_iter()
            .filter_map(|id| {
                let node = state.elements.node(id)?;
                let ElementKind::Property(h) = &node.kind else {
                    return None;
                };
                // write-only properties are invisible to wildcard reads
                h.get.clone().map(|get| (node.full_name.clone(), get))
            })
            .collect()
    });

    let mut props = Vec::new();
    for (full_name, get) in targets {
        match get(handle, &full_name, opts) {
            Ok(value) => props.push(Property {
                name: full_name,
                value,
            }),
            Err(e) => log::debug!("[server] wildcard get skipping {full_name}: {e}"),
        }
    }
    if props.is_empty() {
        log::debug!("[server] wildcard get {expression} matched nothing readable");
        return Err(Error::ElementDoesNotExist);
    }
    Ok(props)
}

/// Concrete-name batch: all succeed or the whole request fails with the
/// first error.
fn get_flat(handle: &Handle, names: &[String], opts: &GetHandlerOptions) -> Result<Vec<Property>> {
    let mut props = Vec::with_capacity(names.len());
    for name in names {
        let (full_name, get) = handle.with_state(|state| -> Result<(String, GetHandler)> {
            let id = state
                .elements
                .retrieve_instance(name)
                .ok_or(Error::ElementDoesNotExist)?;
            let node = state.elements.node(id).ok_or(Error::ElementDoesNotExist)?;
            match &node.kind {
                ElementKind::Property(h) => match &h.get {
                    // handlers see the name as requested, alias form included
                    Some(get) => Ok((name.clone(), get.clone())),
                    None => {
                        log::warn!("[server] {name} has no get handler");
                        Err(Error::AccessNotAllowed)
                    }
                },
                ElementKind::Event(_) | ElementKind::Method => {
                    log::warn!("[server] get on non-parameter {name}");
                    Err(Error::InvalidInput)
                }
                _ => Err(Error::AccessNotAllowed),
            }
        })?;
        let value = get(handle, &full_name, opts)?;
        props.push(Property {
            name: full_name,
            value,
        });
    }
    Ok(props)
}

// ============================================================================
// SetParameterValues
// ============================================================================

/// Only the first four BYTES of the flag text decide; the field arrives
/// from foreign stacks and need not even be ASCII.
fn commit_requested(commit: &str) -> bool {
    commit
        .as_bytes()
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case(b"true"))
}

fn set_parameters(handle: &Handle, mut request: Message) -> Message {
    let header = (|| -> Result<(i32, String, i32)> {
        Ok((request.pop_i32()?, request.pop_str()?, request.pop_i32()?))
    })();
    let (session_id, requester, count) = match header {
        Ok(header) => header,
        Err(e) => return error_response(e),
    };
    if count <= 0 {
        log::warn!("[server] set with invalid parameter count {count}");
        // the requester is the only name available to report back
        let mut response = error_response(Error::InvalidInput);
        response.push_str(&requester);
        return response;
    }

    let body = (|| -> Result<(Vec<Property>, String)> {
        let mut props = Vec::with_capacity((count as usize).min(request.len()));
        for _ in 0..count {
            props.push(codec::decode_property(&mut request)?);
        }
        Ok((props, request.pop_str()?))
    })();
    let (props, commit) = match body {
        Ok(body) => body,
        Err(e) => return error_response(e),
    };
    let opts = SetHandlerOptions {
        session_id,
        requesting_component: requester,
        commit: commit_requested(&commit),
    };

    // values apply strictly in order; the first failure stops the batch and
    // nothing already applied is rolled back
    for prop in &props {
        if let Err(e) = set_one(handle, prop, &opts) {
            let mut response = error_response(e);
            response.push_str(&prop.name);
            return response;
        }
    }
    let mut response = Message::new();
    response.push_i32(RESULT_OK);
    response
}

fn set_one(handle: &Handle, prop: &Property, opts: &SetHandlerOptions) -> Result<()> {
    let set = handle.with_state(|state| -> Result<_> {
        let id = state
            .elements
            .retrieve_instance(&prop.name)
            .ok_or(Error::ElementDoesNotExist)?;
        let node = state.elements.node(id).ok_or(Error::ElementDoesNotExist)?;
        match &node.kind {
            ElementKind::Property(h) => match &h.set {
                Some(set) => Ok(set.clone()),
                None => {
                    log::warn!("[server] {} is read-only", prop.name);
                    Err(Error::AccessNotAllowed)
                }
            },
            ElementKind::Event(_) | ElementKind::Method => {
                log::warn!("[server] set on non-parameter {}", prop.name);
                Err(Error::InvalidInput)
            }
            _ => Err(Error::AccessNotAllowed),
        }
    })?;
    set(handle, prop, opts)
}

// ============================================================================
// Table rows
// ============================================================================

fn add_table_row(handle: &Handle, mut request: Message) -> Message {
    let outcome = (|| -> Result<(String, String, u32, Option<String>)> {
        let _session_id = request.pop_i32()?;
        let table_name = request.pop_str()?;
        // legacy management stacks send no alias field at all
        let alias_field = request.pop_str().unwrap_or_default();
        let alias = (!alias_field.is_empty()).then_some(alias_field);

        let add_row = handle.with_state(|state| -> Result<_> {
            let reg = state
                .elements
                .retrieve_registration(&table_name)
                .ok_or(Error::ElementDoesNotExist)?;
            let reg_node = state.elements.node(reg).ok_or(Error::ElementDoesNotExist)?;
            let ElementKind::Table(h) = &reg_node.kind else {
                log::warn!("[server] add-row on non-table {table_name}");
                return Err(Error::InvalidInput);
            };
            // the addressed table instance must exist too (nested tables)
            state
                .elements
                .retrieve_instance(&table_name)
                .ok_or(Error::ElementDoesNotExist)?;
            h.add_row.clone().ok_or(Error::AccessNotAllowed)
        })?;

        let table_dotted = if table_name.ends_with('.') {
            table_name.clone()
        } else {
            format!("{table_name}.")
        };
        let instance = add_row(handle, &table_dotted, alias.as_deref())?;

        let watches = handle.with_state(|state| -> Result<Vec<(NodeId, String, GetHandler)>> {
            let (elements, subscriptions) = state.split_mut();
            let table = elements
                .retrieve_instance(&table_name)
                .ok_or(Error::ElementDoesNotExist)?;
            elements.instantiate_row(table, instance, alias.as_deref())?;
            let attached = subscriptions.on_row_added(elements);
            let mut watches = Vec::new();
            for (sub_id, node) in attached {
                let Some(sub) = subscriptions.get(sub_id) else { continue };
                if !sub.auto_publish {
                    continue;
                }
                let Some(n) = elements.node(node) else { continue };
                if let ElementKind::Property(h) = &n.kind {
                    if let Some(get) = h.get.clone() {
                        watches.push((node, n.full_name.clone(), get));
                    }
                }
            }
            Ok(watches)
        })?;
        for (node, full_name, get) in watches {
            handle.detector().watch(handle, node, &full_name, get);
        }

        let row_name = format!("{table_dotted}{instance}.");
        Ok((table_name, row_name, instance, alias))
    })();

    let mut response = Message::new();
    match outcome {
        Ok((table_name, row_name, instance, alias)) => {
            let event = Event::row_added(table_name.clone(), &row_name, instance, alias.as_deref());
            if let Err(e) = handle.publish_from_element(&table_name, EventKind::ObjectCreated, &event.data)
            {
                log::debug!("[server] row-added event for {row_name} not delivered: {e}");
            }
            log::info!("[server] added row {row_name}");
            response.push_i32(RESULT_OK);
            response.push_i32(instance as i32);
        }
        Err(e) => {
            response.push_i32(e.code());
            response.push_i32(0);
        }
    }
    response
}

fn delete_table_row(handle: &Handle, mut request: Message) -> Message {
    let outcome = (|| -> Result<(String, String)> {
        let _session_id = request.pop_i32()?;
        let row_name = request.pop_str()?;

        let (remove_row, table_full, row_props) = handle.with_state(|state| -> Result<_> {
            let row = state
                .elements
                .retrieve_instance(&row_name)
                .ok_or(Error::ElementDoesNotExist)?;
            let table = state.elements.parent(row).ok_or(Error::ElementDoesNotExist)?;
            let table_node = state.elements.node(table).ok_or(Error::ElementDoesNotExist)?;
            let ElementKind::Table(h) = &table_node.kind else {
                log::warn!("[server] {row_name} is not a table row");
                return Err(Error::InvalidInput);
            };
            let remove_row = h.remove_row.clone().ok_or(Error::AccessNotAllowed)?;
            let row_props = state.elements.collect_properties(row);
            Ok((remove_row, table_node.full_name.clone(), row_props))
        })?;

        remove_row(handle, &row_name)?;

        // polling must quiesce before the row's nodes disappear
        handle.detector().unwatch_many(&row_props);

        handle.with_state(|state| -> Result<()> {
            let (elements, subscriptions) = state.split_mut();
            let row = elements
                .retrieve_instance(&row_name)
                .ok_or(Error::ElementDoesNotExist)?;
            let removed = elements.delete_row(row)?;
            subscriptions.purge_nodes(&removed);
            Ok(())
        })?;

        Ok((table_full, row_name))
    })();

    let mut response = Message::new();
    match outcome {
        Ok((table_full, row_name)) => {
            let event_name = format!("{table_full}.");
            let event = Event::row_removed(event_name.clone(), &row_name);
            if let Err(e) =
                handle.publish_from_element(&event_name, EventKind::ObjectDeleted, &event.data)
            {
                log::debug!("[server] row-removed event for {row_name} not delivered: {e}");
            }
            log::info!("[server] removed row {row_name}");
            response.push_i32(RESULT_OK);
        }
        Err(e) => {
            response.push_i32(e.code());
        }
    }
    response
}

// ============================================================================
// Subscription coordination
// ============================================================================

/// React to a listener subscribing to or unsubscribing from an element this
/// handle provides. Registered subscribe callbacks run first and may veto
/// auto-publish; their errors are logged but never fail the subscriber.
pub(crate) fn handle_subscription_change(
    handle: &Handle,
    event_name: &str,
    listener: &str,
    filter: Option<Value>,
    added: bool,
) {
    let lookup = handle.with_state(|state| {
        let id = state.elements.retrieve_registration(event_name)?;
        state.elements.node(id).map(|node| node.kind.clone())
    });
    let Some(kind) = lookup else {
        log::warn!("[server] subscription change for unknown element {event_name}");
        return;
    };

    let action = if added {
        SubscribeAction::Subscribe
    } else {
        SubscribeAction::Unsubscribe
    };
    let mut auto_publish = true;
    if let Some(callback) = kind.subscribe_handler() {
        if let Err(e) = callback(handle, action, event_name, filter.as_ref(), &mut auto_publish) {
            log::warn!("[server] subscribe handler for {event_name} returned {e}");
        }
    }

    if added {
        let watches = handle.with_state(|state| {
            let (elements, subscriptions) = state.split_mut();
            let sub_id = subscriptions.add(elements, listener, event_name, filter, auto_publish);
            if !(kind.is_property() && auto_publish) {
                return Vec::new();
            }
            let Some(sub) = subscriptions.get(sub_id) else {
                return Vec::new();
            };
            sub.nodes
                .iter()
                .filter_map(|&node| {
                    let n = elements.node(node)?;
                    let ElementKind::Property(h) = &n.kind else {
                        return None;
                    };
                    h.get.clone().map(|get| (node, n.full_name.clone(), get))
                })
                .collect::<Vec<_>>()
        });
        for (node, full_name, get) in watches {
            handle.detector().watch(handle, node, &full_name, get);
        }
    } else {
        let removed = handle.with_state(|state| {
            let (elements, subscriptions) = state.split_mut();
            subscriptions.remove(elements, listener, event_name)
        });
        match removed {
            Some(sub) => stop_orphaned_polling(handle, &[sub]),
            None => {
                log::warn!("[server] unsubscribe from {event_name} without a subscription");
            }
        }
    }
}

/// Sweep every subscription a vanished listener held, winding down polling
/// for nodes nothing else watches.
pub(crate) fn handle_client_disconnect(handle: &Handle, listener: &str) {
    let removed = handle.with_state(|state| {
        let (elements, subscriptions) = state.split_mut();
        subscriptions.remove_for_listener(elements, listener)
    });
    if removed.is_empty() {
        return;
    }
    log::info!(
        "[server] {} dropped {} subscriptions from departed {listener}",
        handle.component_name(),
        removed.len()
    );
    stop_orphaned_polling(handle, &removed);
}

fn push_unique(src: &[NodeId], dst: &mut Vec<NodeId>) {
    for &id in src {
        if !dst.contains(&id) {
            dst.push(id);
        }
    }
}

fn stop_orphaned_polling(handle: &Handle, removed: &[crate::event::Subscription]) {
    let mut stops: Vec<NodeId> = Vec::new();
    handle.with_state(|state| {
        for sub in removed {
            for &node in &sub.nodes {
                if !state.subscriptions.node_has_other_autopublish(node, sub.id)
                    && !stops.contains(&node)
                {
                    stops.push(node);
                }
            }
        }
    });
    if !stops.is_empty() {
        handle.detector().unwatch_many(&stops);
    }
}
