// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Published-nodes entries.
//!
//! An entry names an endpoint, a writer and a list of OPC nodes. Nodes may
//! point at concrete variables or at objects, types and folders that the
//! expansion turns into concrete variable lists.

use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;
use crate::types::AttributeId;

// =============================================================================
// OpcNodeModel
// =============================================================================

/// One configured node of a published-nodes entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpcNodeModel {
    /// Node id string (`ns=2;s=Pump`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Relative path from `id` (or the Objects folder) to the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_path: Option<Vec<String>>,

    /// Attribute to publish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<AttributeId>,

    /// Field identifier within the data set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_field_id: Option<String>,

    /// Display name of the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Type definition the node was discovered as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_definition_id: Option<String>,

    /// Node-level publishing interval. Only valid at writer level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opc_publishing_interval: Option<u64>,

    /// Sampling interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opc_sampling_interval: Option<u64>,

    /// Set for method nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_metadata: Option<MethodMetadataModel>,
}

impl OpcNodeModel {
    /// Creates a node for an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Sets the browse path.
    pub fn with_browse_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.browse_path = Some(path.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the data set field id.
    pub fn with_data_set_field_id(mut self, id: impl Into<String>) -> Self {
        self.data_set_field_id = Some(id.into());
        self
    }

    /// Returns the configured browse path if it is non-empty.
    pub fn browse_path(&self) -> Option<&[String]> {
        self.browse_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Method node details.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodMetadataModel {
    /// Object the method is called on.
    pub object_id: Option<String>,
}

// =============================================================================
// PublishedNodesEntryModel
// =============================================================================

/// A published-nodes entry: endpoint, writer identity and nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedNodesEntryModel {
    /// Endpoint url.
    pub endpoint_url: Option<String>,

    /// Writer group name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_writer_group: Option<String>,

    /// Writer id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_writer_id: Option<String>,

    /// Data set name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_name: Option<String>,

    /// Object the data set was expanded from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_root_node_id: Option<String>,

    /// Type definition of the data set root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_type: Option<String>,

    /// Node the writer group was expanded from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writer_group_root_node_id: Option<String>,

    /// Type definition of the writer group root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writer_group_type: Option<String>,

    /// Writer-level publishing interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_publishing_interval: Option<u64>,

    /// Configured nodes.
    pub opc_nodes: Vec<OpcNodeModel>,
}

impl PublishedNodesEntryModel {
    /// Clones everything except the node list.
    pub fn template(&self) -> Self {
        Self {
            opc_nodes: Vec::new(),
            ..self.clone()
        }
    }
}

// =============================================================================
// PublishedNodeExpansionModel
// =============================================================================

/// Options controlling how an entry is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedNodeExpansionModel {
    /// Drop entries that carry errors from the output.
    pub discard_errors: bool,

    /// Emit all variables in one writer instead of one writer per object.
    pub create_single_writer: bool,

    /// Also match methods under expanded objects.
    pub include_methods: bool,

    /// Treat nested objects of a type instance as part of the instance.
    pub flatten_type_instance: bool,

    /// Do not publish the configured node itself when it is an instance.
    pub exclude_root_if_instance_node: bool,

    /// Match only the exact type, not its subtypes.
    pub no_subtypes: bool,

    /// Maximum depth for object and instance discovery. `None` is unlimited.
    pub max_depth: Option<u32>,

    /// Levels of variables below an object or variable. Zero is unlimited
    /// for objects and none for variables.
    pub max_levels_to_expand: u32,
}

// =============================================================================
// ServiceResponse
// =============================================================================

/// A result paired with the error that occurred producing it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    /// The result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,

    /// Error info.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ServiceResult>,
}

impl<T> ServiceResponse<T> {
    /// Creates a successful response.
    pub fn ok(result: T) -> Self {
        Self {
            result: Some(result),
            error_info: None,
        }
    }

    /// Creates a response carrying a partial result and an error.
    pub fn failed(result: T, error: ServiceResult) -> Self {
        Self {
            result: Some(result),
            error_info: Some(error),
        }
    }

    /// Returns `true` if no error is attached.
    pub fn is_ok(&self) -> bool {
        self.error_info.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_template_drops_nodes() {
        let entry = PublishedNodesEntryModel {
            data_set_writer_id: Some("w1".into()),
            opc_nodes: vec![OpcNodeModel::new("i=2253")],
            ..Default::default()
        };
        let template = entry.template();
        assert_eq!(template.data_set_writer_id.as_deref(), Some("w1"));
        assert!(template.opc_nodes.is_empty());
    }

    #[test]
    fn test_browse_path_empty_is_none() {
        let node = OpcNodeModel::new("i=85").with_browse_path(Vec::<String>::new());
        assert!(node.browse_path().is_none());
        let node = node.with_browse_path(["/2:Line1"]);
        assert_eq!(node.browse_path().map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_expansion_model_deserializes_defaults() {
        let model: PublishedNodeExpansionModel =
            serde_json::from_str(r#"{"include_methods": true}"#).unwrap();
        assert!(model.include_methods);
        assert_eq!(model.max_depth, None);
        assert_eq!(model.max_levels_to_expand, 0);
    }
}
