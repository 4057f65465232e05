// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! Hierarchical object values: a named node with ordered properties and
//! ordered children. Event payloads and multi-instance rows travel as these.

use crate::value::{Property, Value};

/// Whether an object is a plain node or a table-style multi-instance node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectKind {
    #[default]
    SingleInstance,
    MultiInstance,
}

impl ObjectKind {
    /// Wire code: 0 single-instance, 1 multi-instance.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::SingleInstance => 0,
            Self::MultiInstance => 1,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            Self::MultiInstance
        } else {
            Self::SingleInstance
        }
    }
}

/// A value tree node. The name may be empty (event payload roots are
/// anonymous).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    pub properties: Vec<Property>,
    pub children: Vec<Object>,
}

impl Object {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn multi_instance(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::MultiInstance,
            ..Self::default()
        }
    }

    /// Value of the named property, if present.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Replace the named property's value, or append it while preserving
    /// the order of everything already present.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(p) = self.properties.iter_mut().find(|p| p.name == name) {
            p.value = value;
        } else {
            self.properties.push(Property { name, value });
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Object> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_property_replaces_in_place() {
        let mut obj = Object::new("row");
        obj.set_property("alias", "lan");
        obj.set_property("instNum", 3u32);
        obj.set_property("alias", "wan");

        assert_eq!(obj.properties.len(), 2);
        assert_eq!(obj.properties[0].name, "alias");
        assert_eq!(obj.property("alias").and_then(Value::as_str), Some("wan"));
        assert_eq!(obj.property("instNum").and_then(Value::as_u32), Some(3));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(ObjectKind::SingleInstance.code(), 0);
        assert_eq!(ObjectKind::MultiInstance.code(), 1);
        assert_eq!(ObjectKind::from_code(1), ObjectKind::MultiInstance);
        assert_eq!(ObjectKind::from_code(7), ObjectKind::SingleInstance);
    }

    #[test]
    fn test_child_lookup() {
        let mut parent = Object::new("table");
        parent.children.push(Object::new("1"));
        parent.children.push(Object::new("2"));
        assert_eq!(parent.child("2").map(|c| c.name.as_str()), Some("2"));
        assert!(parent.child("3").is_none());
    }
}
