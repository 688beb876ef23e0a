// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Structural metadata records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Data set level metadata settings. Present means metadata is published.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetMetaDataModel {
    /// Data set name.
    pub name: Option<String>,
    /// Data set class id.
    pub data_set_class_id: Uuid,
    /// Description.
    pub description: Option<String>,
}

/// Metadata of one published field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedMetaDataModel {
    /// Incremented on every refresh.
    pub minor_version: u32,
    /// Data type id string.
    pub data_type: Option<String>,
    /// Built-in type code of the data type.
    pub built_in_type: u8,
    /// Value rank, -1 for scalars.
    pub value_rank: i32,
    /// Array dimensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_dimensions: Option<Vec<u32>>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Enumerations the data type depends on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_data_types: Vec<EnumDescriptionModel>,
    /// Structures the data type depends on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub structure_data_types: Vec<StructureDescriptionModel>,
    /// Simple and alias types the data type depends on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub simple_data_types: Vec<SimpleTypeDescriptionModel>,
}

/// A simple or alias type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimpleTypeDescriptionModel {
    /// Type id string.
    pub data_type_id: String,
    /// Browse name of the type.
    pub name: String,
    /// Immediate base type.
    pub base_data_type: Option<String>,
    /// Built-in type the simple type is encoded as.
    pub built_in_type: u8,
}

/// An enumeration or option set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnumDescriptionModel {
    /// Type id string.
    pub data_type_id: String,
    /// Browse name of the type.
    pub name: String,
    /// Built-in type.
    pub built_in_type: u8,
    /// Enum values.
    pub fields: Vec<EnumFieldModel>,
    /// `true` for option sets.
    pub is_option_set: bool,
}

/// One enum value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnumFieldModel {
    /// Numeric value.
    pub value: i64,
    /// Name.
    pub name: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// A structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructureDescriptionModel {
    /// Type id string.
    pub data_type_id: String,
    /// Browse name of the type.
    pub name: String,
    /// Base structure type.
    pub base_data_type: Option<String>,
    /// Default binary encoding id.
    pub default_encoding_id: Option<String>,
    /// Structure kind (plain, with optional fields, union).
    pub structure_type: String,
    /// Fields.
    pub fields: Vec<StructureFieldModel>,
}

/// One structure field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructureFieldModel {
    /// Field name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Data type id string.
    pub data_type: String,
    /// Value rank.
    pub value_rank: i32,
    /// Array dimensions.
    pub array_dimensions: Option<Vec<u32>>,
    /// Maximum string length, zero for none.
    pub max_string_length: u32,
    /// Optional field.
    pub is_optional: bool,
}

impl PublishedMetaDataModel {
    /// Total number of type descriptions attached.
    pub fn type_count(&self) -> usize {
        self.enum_data_types.len() + self.structure_data_types.len() + self.simple_data_types.len()
    }
}
