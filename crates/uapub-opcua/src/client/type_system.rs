// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Structural type system snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Definition of a structured or enumerated data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataTypeDefinition {
    /// Structure definition.
    Structure(StructureDefinition),
    /// Enumeration definition.
    Enum(EnumDefinition),
}

/// Kind of structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StructureType {
    /// Plain structure.
    #[default]
    Structure,
    /// Structure with optional fields.
    StructureWithOptionalFields,
    /// Union.
    Union,
}

/// Fields of a structure data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructureDefinition {
    /// Default binary encoding id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_encoding_id: Option<NodeId>,
    /// Base data type.
    pub base_data_type: NodeId,
    /// Structure kind.
    #[serde(default)]
    pub structure_type: StructureType,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<StructureField>,
}

/// One structure field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructureField {
    /// Field name.
    pub name: String,
    /// Field description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field data type.
    pub data_type: NodeId,
    /// Value rank (-1 = scalar).
    #[serde(default = "scalar_rank")]
    pub value_rank: i32,
    /// Array dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_dimensions: Option<Vec<u32>>,
    /// Maximum string length (0 = unbounded).
    #[serde(default)]
    pub max_string_length: u32,
    /// Whether the field is optional.
    #[serde(default)]
    pub is_optional: bool,
}

fn scalar_rank() -> i32 {
    -1
}

/// Fields of an enumeration data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnumDefinition {
    /// Enumeration values.
    #[serde(default)]
    pub fields: Vec<EnumField>,
    /// Whether the enumeration is an option set.
    #[serde(default)]
    pub is_option_set: bool,
}

/// One enumeration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnumField {
    /// Numeric value.
    pub value: i64,
    /// Symbolic name.
    pub name: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Snapshot of data type definitions loaded from a server.
#[derive(Debug, Clone, Default)]
pub struct TypeSystem {
    definitions: HashMap<NodeId, DataTypeDefinition>,
}

impl TypeSystem {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition.
    pub fn insert(&mut self, data_type_id: NodeId, definition: DataTypeDefinition) {
        self.definitions.insert(data_type_id, definition);
    }

    /// Adds a definition, builder style.
    pub fn with(mut self, data_type_id: NodeId, definition: DataTypeDefinition) -> Self {
        self.insert(data_type_id, definition);
        self
    }

    /// Looks up a definition.
    pub fn get(&self, data_type_id: &NodeId) -> Option<&DataTypeDefinition> {
        self.definitions.get(data_type_id)
    }

    /// Number of known definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if no definitions are known.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
