// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Provider-side record of who subscribed to what.
//!
//! A subscription is keyed by listener, event name, and filter; the same
//! triple subscribing twice is a no-op. Each record tracks the instance
//! nodes its (possibly wildcard) event name currently covers, and the set
//! is re-evaluated whenever table rows appear or disappear.

use crate::element::{ElementTree, NodeId, RemovedSubtree};
use crate::value::Value;

pub type SubscriptionId = u64;

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub listener: String,
    /// Name exactly as subscribed; events are delivered under this name.
    pub event_name: String,
    pub filter: Option<Value>,
    /// When set on a property subscription, the bus polls for changes.
    pub auto_publish: bool,
    /// Instance nodes currently covered by `event_name`.
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subs: Vec<Subscription>,
    last_id: SubscriptionId,
}

impl SubscriptionRegistry {
    /// Record a subscription and attach it to every instance node the event
    /// name currently matches. An identical (listener, event, filter)
    /// subscription is reused.
    pub fn add(
        &mut self,
        tree: &mut ElementTree,
        listener: &str,
        event_name: &str,
        filter: Option<Value>,
        auto_publish: bool,
    ) -> SubscriptionId {
        if let Some(existing) = self.subs.iter().find(|s| {
            s.listener == listener && s.event_name == event_name && s.filter == filter
        }) {
            log::debug!("[subscriptions] {listener} already subscribed to {event_name}");
            return existing.id;
        }
        self.last_id += 1;
        let id = self.last_id;
        let nodes = resolve_nodes(tree, event_name);
        for &node in &nodes {
            tree.add_subscriber(node, id);
        }
        log::debug!(
            "[subscriptions] {listener} subscribed to {event_name} ({} instances)",
            nodes.len()
        );
        self.subs.push(Subscription {
            id,
            listener: listener.to_string(),
            event_name: event_name.to_string(),
            filter,
            auto_publish,
            nodes,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.subs.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn find(&self, listener: &str, event_name: &str) -> Option<&Subscription> {
        self.subs
            .iter()
            .find(|s| s.listener == listener && s.event_name == event_name)
    }

    /// Detach and drop a subscription. Returns the removed record so the
    /// caller can wind down polling for nodes it covered.
    pub fn remove(
        &mut self,
        tree: &mut ElementTree,
        listener: &str,
        event_name: &str,
    ) -> Option<Subscription> {
        let pos = self
            .subs
            .iter()
            .position(|s| s.listener == listener && s.event_name == event_name)?;
        for &node in &self.subs[pos].nodes {
            tree.remove_subscriber(node, self.subs[pos].id);
        }
        // the registry entry goes last so concurrent publishes see a
        // consistent node/record pairing
        Some(self.subs.remove(pos))
    }

    /// Drop every subscription held by `listener`, as when the routing
    /// layer reports the peer gone.
    pub fn remove_for_listener(
        &mut self,
        tree: &mut ElementTree,
        listener: &str,
    ) -> Vec<Subscription> {
        let mut removed = Vec::new();
        while let Some(pos) = self.subs.iter().position(|s| s.listener == listener) {
            for &node in &self.subs[pos].nodes {
                tree.remove_subscriber(node, self.subs[pos].id);
            }
            removed.push(self.subs.remove(pos));
        }
        removed
    }

    /// Re-evaluate every subscription against the tree after a row was
    /// created. Returns the newly covered (subscription, node) pairs.
    pub fn on_row_added(&mut self, tree: &mut ElementTree) -> Vec<(SubscriptionId, NodeId)> {
        let mut attached = Vec::new();
        for sub in &mut self.subs {
            for node in resolve_nodes(tree, &sub.event_name) {
                if !sub.nodes.contains(&node) {
                    tree.add_subscriber(node, sub.id);
                    sub.nodes.push(node);
                    attached.push((sub.id, node));
                }
            }
        }
        attached
    }

    /// Forget node ids freed by a subtree removal. Records stay alive; a
    /// wildcard subscription may match rows created later.
    pub fn purge_nodes(&mut self, removed: &RemovedSubtree) {
        for sub in &mut self.subs {
            sub.nodes.retain(|n| !removed.nodes.contains(n));
        }
    }

    /// True when some other auto-publish subscription still covers `node`.
    /// Used to decide whether polling for the node can stop.
    #[must_use]
    pub fn node_has_other_autopublish(&self, node: NodeId, exclude: SubscriptionId) -> bool {
        self.subs
            .iter()
            .any(|s| s.id != exclude && s.auto_publish && s.nodes.contains(&node))
    }

    /// (listener, subscribed name) pairs to fan an event for `node` out to.
    #[must_use]
    pub fn snapshot_for_node(&self, node: NodeId) -> Vec<(String, String)> {
        self.subs
            .iter()
            .filter(|s| s.nodes.contains(&node))
            .map(|s| (s.listener.clone(), s.event_name.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subs.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.len()
    }
}

fn resolve_nodes(tree: &ElementTree, event_name: &str) -> Vec<NodeId> {
    if event_name.contains('*') {
        tree.resolve_pattern(event_name)
    } else {
        tree.retrieve_instance(event_name).into_iter().collect()
    }
}
