// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Node schema of a loaded graph: which numeric properties each label carries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Label used for nodes loaded without an explicit label.
pub const ALL_NODES_LABEL: &str = "__ALL__";

/// Numeric type of a loaded node property.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum NumberType {
    Integer,
    Floating,
}

impl NumberType {
    /// Name used when rendering the schema for callers.
    pub fn display_name(&self) -> &'static str {
        match self {
            NumberType::Integer => "Integer",
            NumberType::Floating => "Float",
        }
    }

    /// Common type of two observations of the same property.
    pub fn widen(self, other: NumberType) -> NumberType {
        self.max(other)
    }
}

/// Per-label map of property name to its numeric type.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeSchema {
    properties: BTreeMap<String, BTreeMap<String, NumberType>>,
}

impl NodeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `property` of type `ty` on `label`.
    ///
    /// Observing an integer and a float for the same key widens it to `Floating`.
    pub fn add_property_for_label(&mut self, label: &str, property: &str, ty: NumberType) {
        let props = self.properties.entry(label.to_string()).or_default();
        props
            .entry(property.to_string())
            .and_modify(|existing| *existing = existing.widen(ty))
            .or_insert(ty);
    }

    /// Make sure `label` is present even if none of its nodes carry properties.
    pub fn add_label_without_properties(&mut self, label: &str) {
        self.properties.entry(label.to_string()).or_default();
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(|s| s.as_str())
    }

    pub fn properties(&self, label: &str) -> Option<&BTreeMap<String, NumberType>> {
        self.properties.get(label)
    }

    /// Type of `property` on any label, widened across labels.
    pub fn property_type(&self, property: &str) -> Option<NumberType> {
        self.properties
            .values()
            .filter_map(|props| props.get(property).copied())
            .reduce(NumberType::widen)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render as `{label: {property: "Integer" | "Float"}}`.
    pub fn to_map(&self) -> Value {
        let mut out = Map::new();
        for (label, props) in &self.properties {
            let inner: Map<String, Value> = props
                .iter()
                .map(|(name, ty)| (name.clone(), Value::from(ty.display_name())))
                .collect();
            out.insert(label.clone(), Value::Object(inner));
        }
        Value::Object(out)
    }
}
