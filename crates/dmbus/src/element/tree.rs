// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Arena-backed registration tree.
//!
//! Providers register dotted names; each dot-separated token becomes a node.
//! A `{i}` token is a row template: registering `Device.WiFi.AP.{i}.` puts
//! the table callbacks on the `AP` node and keeps the `{i}` child as the
//! blueprint that [`ElementTree::instantiate_row`] clones for every live
//! row. Instance lookups (`AP.1.`, `AP.[lan].`) never see template nodes;
//! registration lookups map instance tokens back onto them.

use crate::element::ElementKind;
use crate::error::{Error, Result};
use crate::event::SubscriptionId;

pub type NodeId = usize;

/// What a removal took out: the node ids no longer backing a registration
/// (freed, or demoted to placeholder) and the subscription ids that were
/// attached to them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovedSubtree {
    pub nodes: Vec<NodeId>,
    pub subscriptions: Vec<SubscriptionId>,
}

/// One node of the registration tree.
#[derive(Debug)]
pub struct ElementNode {
    /// Last token of the dotted name (`SSID`, `{i}`, `1`).
    pub name: String,
    /// Dotted path from the top, empty for the root.
    pub full_name: String,
    pub kind: ElementKind,
    /// Row blueprint under a table; excluded from instance traversal.
    pub is_template: bool,
    /// Row alias, settable at row creation.
    pub alias: Option<String>,
    /// Subscriptions attached to this node.
    pub subscribers: Vec<SubscriptionId>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Slab of nodes with a free list; ids stay stable across removals.
#[derive(Debug)]
pub struct ElementTree {
    nodes: Vec<Option<ElementNode>>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl ElementTree {
    /// `root_name` is the owning component, kept for diagnostics only; it is
    /// not part of any element's dotted path.
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        let root = ElementNode {
            name: root_name.to_string(),
            full_name: String::new(),
            kind: ElementKind::Object,
            is_template: false,
            alias: None,
            subscribers: Vec::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ElementNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ElementNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn add_subscriber(&mut self, id: NodeId, sub: SubscriptionId) {
        if let Some(node) = self.node_mut(id) {
            if !node.subscribers.contains(&sub) {
                node.subscribers.push(sub);
            }
        }
    }

    pub fn remove_subscriber(&mut self, id: NodeId, sub: SubscriptionId) {
        if let Some(node) = self.node_mut(id) {
            node.subscribers.retain(|&s| s != sub);
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Insert a registration name, creating intermediate nodes as needed.
    /// Returns the node carrying `kind`: the final token, except for table
    /// names ending in `{i}` where the callbacks land on the token before
    /// it and `{i}` stays behind as the row template.
    pub fn insert(&mut self, name: &str, kind: ElementKind) -> Result<NodeId> {
        let tokens: Vec<&str> = name.split('.').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            log::warn!("[element] empty registration name");
            return Err(Error::InvalidInput);
        }
        if matches!(kind, ElementKind::Table(_)) && tokens.last() != Some(&"{i}") {
            log::warn!("[element] table {name} registered without a {{i}} template");
        }

        let mut cur = self.root;
        for token in &tokens {
            cur = match self.child_by_name(cur, token) {
                Some(existing) => existing,
                None => self.attach_child(cur, token, None, *token == "{i}"),
            };
        }

        // table callbacks belong to the node owning the template
        let target = if tokens.last() == Some(&"{i}") && matches!(kind, ElementKind::Table(_)) {
            match self.parent(cur) {
                Some(p) if p != self.root => p,
                _ => {
                    log::warn!("[element] table template {name} has no owning node");
                    return Err(Error::InvalidInput);
                }
            }
        } else {
            cur
        };

        let Some(node) = self.node_mut(target) else {
            return Err(Error::InvalidInput);
        };
        if kind.is_object() {
            // structural re-registration is harmless
            return Ok(target);
        }
        if !node.kind.is_object() {
            log::warn!(
                "[element] {} already registered as {}",
                node.full_name,
                node.kind.kind_name()
            );
            return Err(Error::OutOfResources);
        }
        node.kind = kind;
        Ok(target)
    }

    /// Drop a registration by the exact name it was registered under.
    ///
    /// A node whose descendants are registered independently is kept as a
    /// plain placeholder; otherwise its subtree is freed (rows included,
    /// for tables) and emptied placeholder ancestors are pruned.
    pub fn remove_registration(&mut self, name: &str) -> Result<RemovedSubtree> {
        let node = self
            .retrieve_registration(name)
            .ok_or(Error::ElementDoesNotExist)?;
        let target = if self.node(node).is_some_and(|n| n.is_template) {
            // table registered as `Name.{i}.`; the table node owns it
            match self.parent(node) {
                Some(p) => p,
                None => node,
            }
        } else {
            node
        };

        let mut removed = RemovedSubtree::default();
        let keep_children = self
            .node(target)
            .is_some_and(|n| !n.kind.is_table() && !n.children.is_empty());
        if keep_children {
            // descendants still carry registrations of their own, so the
            // node stays behind as a plain placeholder
            if let Some(node) = self.node_mut(target) {
                node.kind = ElementKind::Object;
                removed.subscriptions.append(&mut node.subscribers);
                removed.nodes.push(target);
            }
            return Ok(removed);
        }

        let parent = self.parent(target);
        self.detach(target);
        self.free_subtree(target, &mut removed);
        if let Some(p) = parent {
            self.prune_upwards(p);
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Walk an instance path (`Device.WiFi.AP.1.SSID`, alias and trailing-dot
    /// forms included). Template nodes are invisible here.
    #[must_use]
    pub fn retrieve_instance(&self, name: &str) -> Option<NodeId> {
        let mut cur = self.root;
        for token in name.split('.').filter(|t| !t.is_empty()) {
            cur = self.instance_child(cur, token)?;
        }
        if cur == self.root {
            return None;
        }
        Some(cur)
    }

    /// Walk a registration path. Instance tokens (`1`, `[lan]`, `*`) map to
    /// the `{i}` template so callers reach the registered definition from a
    /// concrete row name.
    #[must_use]
    pub fn retrieve_registration(&self, name: &str) -> Option<NodeId> {
        let mut cur = self.root;
        for token in name.split('.').filter(|t| !t.is_empty()) {
            cur = match self.child_by_name(cur, token) {
                Some(exact) => exact,
                None if is_instance_token(token) => self.template_child(cur)?,
                None => return None,
            };
        }
        if cur == self.root {
            return None;
        }
        Some(cur)
    }

    /// Expand an expression with `*` tokens against live instances.
    #[must_use]
    pub fn resolve_pattern(&self, expression: &str) -> Vec<NodeId> {
        let mut frontier = vec![self.root];
        for token in expression.split('.').filter(|t| !t.is_empty()) {
            let mut next = Vec::new();
            for cur in frontier {
                if token == "*" {
                    next.extend(
                        self.children(cur)
                            .into_iter()
                            .filter(|&c| self.node(c).is_some_and(|n| !n.is_template)),
                    );
                } else if let Some(child) = self.instance_child(cur, token) {
                    next.push(child);
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        frontier.retain(|&id| id != self.root);
        frontier
    }

    /// Readable property nodes in the instance subtree of `root`,
    /// depth-first. Template subtrees are skipped.
    #[must_use]
    pub fn collect_properties(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_properties_into(root, &mut out);
        out
    }

    fn collect_properties_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else { return };
        if node.is_template {
            return;
        }
        if node.kind.is_property() {
            out.push(id);
        }
        for child in node.children.clone() {
            self.collect_properties_into(child, out);
        }
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    /// Clone the table's `{i}` template into a live row named after
    /// `instance`. Callbacks are shared with the template; nested templates
    /// stay templates; subscriber lists start empty.
    pub fn instantiate_row(
        &mut self,
        table: NodeId,
        instance: u32,
        alias: Option<&str>,
    ) -> Result<NodeId> {
        let Some(template) = self.template_child(table) else {
            log::warn!("[element] row requested on a table without a template");
            return Err(Error::Bus);
        };
        let row_name = instance.to_string();
        for sibling in self.children(table) {
            let Some(node) = self.node(sibling) else { continue };
            if node.is_template {
                continue;
            }
            if node.name == row_name {
                log::warn!("[element] row {instance} already exists");
                return Err(Error::InvalidInput);
            }
            if alias.is_some() && node.alias.as_deref() == alias {
                log::warn!("[element] row alias already in use");
                return Err(Error::InvalidInput);
            }
        }
        let row = self.clone_subtree(template, table, &row_name, alias.map(str::to_string), true);
        Ok(row)
    }

    /// Remove a live row subtree. The caller retires the returned
    /// subscription attachments and forgets the freed node ids.
    pub fn delete_row(&mut self, row: NodeId) -> Result<RemovedSubtree> {
        if self.node(row).is_none() {
            return Err(Error::ElementDoesNotExist);
        }
        self.detach(row);
        let mut removed = RemovedSubtree::default();
        self.free_subtree(row, &mut removed);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn alloc(&mut self, node: ElementNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn attach_child(
        &mut self,
        parent: NodeId,
        name: &str,
        alias: Option<String>,
        is_template: bool,
    ) -> NodeId {
        let parent_full = self
            .node(parent)
            .map(|n| n.full_name.clone())
            .unwrap_or_default();
        let full_name = if parent_full.is_empty() {
            name.to_string()
        } else {
            format!("{parent_full}.{name}")
        };
        let id = self.alloc(ElementNode {
            name: name.to_string(),
            full_name,
            kind: ElementKind::Object,
            is_template,
            alias,
            subscribers: Vec::new(),
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        id
    }

    fn clone_subtree(
        &mut self,
        src: NodeId,
        parent: NodeId,
        name: &str,
        alias: Option<String>,
        clear_template: bool,
    ) -> NodeId {
        let (kind, src_children, src_is_template) = match self.node(src) {
            Some(n) => (n.kind.clone(), n.children.clone(), n.is_template),
            None => (ElementKind::Object, Vec::new(), false),
        };
        let is_template = if clear_template { false } else { src_is_template };
        let id = self.attach_child(parent, name, alias, is_template);
        if let Some(node) = self.node_mut(id) {
            node.kind = kind;
        }
        for child in src_children {
            let Some((child_name, child_alias)) = self
                .node(child)
                .map(|c| (c.name.clone(), c.alias.clone()))
            else {
                continue;
            };
            self.clone_subtree(child, id, &child_name, child_alias, false);
        }
        id
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
    }

    fn free_subtree(&mut self, id: NodeId, removed: &mut RemovedSubtree) {
        for child in self.children(id) {
            self.free_subtree(child, removed);
        }
        if let Some(node) = self.nodes.get_mut(id).and_then(Option::take) {
            removed.nodes.push(id);
            removed.subscriptions.extend(node.subscribers);
            self.free.push(id);
        }
    }

    fn prune_upwards(&mut self, mut id: NodeId) {
        while id != self.root {
            let Some(node) = self.node(id) else { return };
            let removable = node.kind.is_object()
                && !node.is_template
                && node.children.is_empty()
                && node.subscribers.is_empty();
            if !removable {
                return;
            }
            let parent = node.parent;
            self.detach(id);
            if self.nodes.get_mut(id).and_then(Option::take).is_some() {
                self.free.push(id);
            }
            match parent {
                Some(p) => id = p,
                None => return,
            }
        }
    }

    fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .into_iter()
            .find(|&c| self.node(c).is_some_and(|n| n.name == name))
    }

    fn template_child(&self, parent: NodeId) -> Option<NodeId> {
        self.children(parent)
            .into_iter()
            .find(|&c| self.node(c).is_some_and(|n| n.is_template))
    }

    fn instance_child(&self, parent: NodeId, token: &str) -> Option<NodeId> {
        if token.len() >= 2 && token.starts_with('[') && token.ends_with(']') {
            let alias = &token[1..token.len() - 1];
            return self.children(parent).into_iter().find(|&c| {
                self.node(c)
                    .is_some_and(|n| !n.is_template && n.alias.as_deref() == Some(alias))
            });
        }
        self.children(parent)
            .into_iter()
            .find(|&c| self.node(c).is_some_and(|n| !n.is_template && n.name == token))
    }
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
    use crate::element::PropertyHandlers;
    use crate::value::Value;
    use std::sync::Arc;

    fn property_kind() -> ElementKind {
        ElementKind::Property(PropertyHandlers::read_only(|_, _, _| Ok(Value::Bool(true))))
    }

    fn table_kind() -> ElementKind {
        ElementKind::Table(crate::element::TableHandlers::default())
    }

    fn wifi_tree() -> ElementTree {
        let mut tree = ElementTree::new("wifi");
        tree.insert("Device.WiFi.AP.{i}.", table_kind())
            .expect("Failed to insert table");
        tree.insert("Device.WiFi.AP.{i}.SSID", property_kind())
            .expect("Failed to insert row property");
        tree
    }

    #[test]
    fn test_insert_builds_chain() {
        let mut tree = ElementTree::new("wifi");
        let id = tree
            .insert("Device.WiFi.Radio.Enable", property_kind())
            .expect("Failed to insert");
        let node = tree.node(id).expect("node");
        assert_eq!(node.full_name, "Device.WiFi.Radio.Enable");
        assert!(node.kind.is_property());

        let radio = tree
            .retrieve_registration("Device.WiFi.Radio.")
            .expect("radio node");
        assert!(tree.node(radio).expect("radio").kind.is_object());
    }

    #[test]
    fn test_table_callbacks_land_before_template() {
        let tree = wifi_tree();
        let table = tree
            .retrieve_registration("Device.WiFi.AP.")
            .expect("table node");
        let table_node = tree.node(table).expect("table");
        assert!(table_node.kind.is_table());
        assert_eq!(table_node.full_name, "Device.WiFi.AP");

        let children = tree.children(table);
        assert_eq!(children.len(), 1);
        let template = tree.node(children[0]).expect("template");
        assert!(template.is_template);
        assert_eq!(template.name, "{i}");
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let mut tree = ElementTree::new("wifi");
        tree.insert("Device.X.Status", property_kind())
            .expect("Failed to insert");
        assert_eq!(
            tree.insert("Device.X.Status", property_kind()),
            Err(Error::OutOfResources)
        );
        // structural re-registration of the shared prefix stays fine
        tree.insert("Device.X.", ElementKind::Object)
            .expect("object re-insert");
    }

    #[test]
    fn test_instantiate_row_clones_template() {
        let mut tree = wifi_tree();
        let table = tree
            .retrieve_registration("Device.WiFi.AP.")
            .expect("table");
        let row = tree
            .instantiate_row(table, 1, Some("lan"))
            .expect("Failed to add row");
        assert_eq!(tree.node(row).expect("row").full_name, "Device.WiFi.AP.1");
        assert!(!tree.node(row).expect("row").is_template);

        let by_number = tree
            .retrieve_instance("Device.WiFi.AP.1.SSID")
            .expect("by number");
        let by_alias = tree
            .retrieve_instance("Device.WiFi.AP.[lan].SSID")
            .expect("by alias");
        assert_eq!(by_number, by_alias);
        assert_eq!(
            tree.node(by_number).expect("ssid").full_name,
            "Device.WiFi.AP.1.SSID"
        );

        // the row shares the registered callbacks, not copies of them
        let template_def = tree
            .retrieve_registration("Device.WiFi.AP.{i}.SSID")
            .expect("definition");
        let (ElementKind::Property(def), ElementKind::Property(row_h)) = (
            &tree.node(template_def).expect("def").kind,
            &tree.node(by_number).expect("row ssid").kind,
        ) else {
            panic!("expected property kinds");
        };
        let (Some(a), Some(b)) = (&def.get, &row_h.get) else {
            panic!("expected get handlers");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_template_is_invisible_to_instance_lookup() {
        let tree = wifi_tree();
        assert!(tree.retrieve_instance("Device.WiFi.AP.{i}.SSID").is_none());
        assert!(tree.retrieve_instance("Device.WiFi.AP.1.SSID").is_none());
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let mut tree = wifi_tree();
        let table = tree.retrieve_registration("Device.WiFi.AP.").expect("table");
        tree.instantiate_row(table, 1, Some("lan")).expect("row 1");
        assert_eq!(
            tree.instantiate_row(table, 1, None),
            Err(Error::InvalidInput)
        );
        assert_eq!(
            tree.instantiate_row(table, 2, Some("lan")),
            Err(Error::InvalidInput)
        );
        tree.instantiate_row(table, 2, Some("guest")).expect("row 2");
    }

    #[test]
    fn test_registration_lookup_maps_instance_tokens() {
        let tree = wifi_tree();
        let via_number = tree
            .retrieve_registration("Device.WiFi.AP.7.SSID")
            .expect("via number");
        let via_alias = tree
            .retrieve_registration("Device.WiFi.AP.[x].SSID")
            .expect("via alias");
        let literal = tree
            .retrieve_registration("Device.WiFi.AP.{i}.SSID")
            .expect("literal");
        assert_eq!(via_number, literal);
        assert_eq!(via_alias, literal);
    }

    #[test]
    fn test_resolve_pattern_expands_rows() {
        let mut tree = wifi_tree();
        let table = tree.retrieve_registration("Device.WiFi.AP.").expect("table");
        tree.instantiate_row(table, 1, None).expect("row 1");
        tree.instantiate_row(table, 2, None).expect("row 2");

        let matches = tree.resolve_pattern("Device.WiFi.AP.*.SSID");
        assert_eq!(matches.len(), 2);
        let names: Vec<String> = matches
            .iter()
            .map(|&id| tree.node(id).expect("node").full_name.clone())
            .collect();
        assert!(names.contains(&"Device.WiFi.AP.1.SSID".to_string()));
        assert!(names.contains(&"Device.WiFi.AP.2.SSID".to_string()));
    }

    #[test]
    fn test_delete_row_reports_orphaned_subscriptions() {
        let mut tree = wifi_tree();
        let table = tree.retrieve_registration("Device.WiFi.AP.").expect("table");
        let row = tree.instantiate_row(table, 1, None).expect("row");
        let ssid = tree
            .retrieve_instance("Device.WiFi.AP.1.SSID")
            .expect("ssid");
        tree.add_subscriber(ssid, 42);

        let removed = tree.delete_row(row).expect("Failed to delete row");
        assert_eq!(removed.subscriptions, vec![42]);
        assert!(removed.nodes.len() >= 2); // row and its property
        assert!(tree.retrieve_instance("Device.WiFi.AP.1.").is_none());
        // the table and its template survive
        assert!(tree.retrieve_registration("Device.WiFi.AP.").is_some());
    }

    #[test]
    fn test_remove_registration_prunes_placeholders() {
        let mut tree = ElementTree::new("wifi");
        tree.insert("Device.X.A", property_kind()).expect("a");
        tree.insert("Device.X.B", property_kind()).expect("b");

        let removed = tree.remove_registration("Device.X.A").expect("remove a");
        assert!(removed.subscriptions.is_empty());
        assert!(tree.retrieve_registration("Device.X.B").is_some());
        assert!(tree.retrieve_registration("Device.X.A").is_none());

        tree.remove_registration("Device.X.B").expect("remove b");
        // the whole placeholder chain is gone
        assert!(tree.retrieve_registration("Device.").is_none());
    }

    #[test]
    fn test_remove_keeps_node_with_registered_descendants() {
        let mut tree = ElementTree::new("wifi");
        tree.insert("Device.X", property_kind()).expect("parent");
        tree.insert("Device.X.Y", property_kind()).expect("child");
        let x = tree.retrieve_registration("Device.X").expect("x");
        tree.add_subscriber(x, 7);

        let removed = tree.remove_registration("Device.X").expect("remove parent");
        assert_eq!(removed.nodes, vec![x]);
        assert_eq!(removed.subscriptions, vec![7]);

        // the child registration is untouched; the parent is a bare object
        let placeholder = tree.retrieve_registration("Device.X").expect("placeholder");
        assert_eq!(placeholder, x);
        assert!(tree.node(x).expect("node").kind.is_object());
        assert!(tree.node(x).expect("node").subscribers.is_empty());
        assert!(tree.retrieve_registration("Device.X.Y").is_some());

        // with the child gone the placeholder chain is prunable
        tree.remove_registration("Device.X.Y").expect("remove child");
        assert!(tree.retrieve_registration("Device.X").is_none());
    }

    #[test]
    fn test_remove_table_registration_takes_rows() {
        let mut tree = wifi_tree();
        let table = tree.retrieve_registration("Device.WiFi.AP.").expect("table");
        tree.instantiate_row(table, 1, None).expect("row");

        tree.remove_registration("Device.WiFi.AP.{i}.")
            .expect("remove table");
        assert!(tree.retrieve_instance("Device.WiFi.AP.1.").is_none());
        assert!(tree.retrieve_registration("Device.WiFi.AP.").is_none());
    }

    #[test]
    fn test_collect_properties_skips_templates() {
        let mut tree = wifi_tree();
        tree.insert("Device.WiFi.Status", property_kind())
            .expect("status");
        let table = tree.retrieve_registration("Device.WiFi.AP.").expect("table");
        tree.instantiate_row(table, 1, None).expect("row");

        let wifi = tree.retrieve_instance("Device.WiFi.").expect("wifi node");
        let props = tree.collect_properties(wifi);
        let names: Vec<String> = props
            .iter()
            .map(|&id| tree.node(id).expect("node").full_name.clone())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Device.WiFi.Status".to_string()));
        assert!(names.contains(&"Device.WiFi.AP.1.SSID".to_string()));
    }

    #[test]
    fn test_trailing_dot_resolves_to_partial_node() {
        let tree = wifi_tree();
        let with_dot = tree.retrieve_instance("Device.WiFi.").expect("with dot");
        let without = tree.retrieve_instance("Device.WiFi").expect("without");
        assert_eq!(with_dot, without);
    }
}
