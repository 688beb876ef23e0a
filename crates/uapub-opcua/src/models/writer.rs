// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Data set writers and the field records they carry.
//!
//! A writer owns one published data set. The data set source lists three
//! kinds of fields (variables, events and objects whose variables are
//! discovered on demand); extension fields with literal values sit next
//! to the source.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::models::metadata::{DataSetMetaDataModel, PublishedMetaDataModel};
use crate::types::{AttributeId, Variant};

// =============================================================================
// Writer
// =============================================================================

/// A data set writer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetWriterModel {
    /// Writer id, unique within the writer group.
    pub id: String,

    /// Writer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_writer_name: Option<String>,

    /// Sequential writer index assigned on split.
    pub data_set_writer_index: u32,

    /// Key frame count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_frame_count: Option<u32>,

    /// Metadata update interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data_update_time: Option<u64>,

    /// Configured publishing destinations. The first one provides the
    /// base queue name for routed fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub publishing: Vec<PublishingQueueSettings>,

    /// The published data set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set: Option<PublishedDataSetModel>,
}

impl DataSetWriterModel {
    /// Creates a writer with an empty data set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data_set: Some(PublishedDataSetModel::default()),
            ..Default::default()
        }
    }

    /// Routing mode of the data set.
    pub fn routing(&self) -> DataSetRoutingMode {
        self.data_set
            .as_ref()
            .map(|d| d.routing)
            .unwrap_or_default()
    }

    /// Returns `true` if field metadata is published for this writer.
    pub fn meta_data_enabled(&self) -> bool {
        self.data_set
            .as_ref()
            .is_some_and(|d| d.data_set_meta_data.is_some())
    }

    /// Returns the data set source, creating it if missing.
    pub fn source_mut(&mut self) -> &mut PublishedDataSetSourceModel {
        self.data_set
            .get_or_insert_with(Default::default)
            .data_set_source
            .get_or_insert_with(Default::default)
    }

    /// Returns the data set source.
    pub fn source(&self) -> Option<&PublishedDataSetSourceModel> {
        self.data_set.as_ref()?.data_set_source.as_ref()
    }
}

/// Destination queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishingQueueSettings {
    /// Queue or topic name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,

    /// Retain flag for brokers that support it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retain: Option<bool>,

    /// Message time to live in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl PublishingQueueSettings {
    /// Creates settings for a queue name.
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            queue_name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// How fields are routed to queues below the writer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataSetRoutingMode {
    /// All fields go to the writer queue.
    #[default]
    None,
    /// Fields go to a sub-queue named after their browse path.
    UseBrowseNames,
    /// Like `UseBrowseNames`, prefixing non-zero namespace indices.
    UseBrowseNamesWithNamespaceIndex,
}

// =============================================================================
// Data set
// =============================================================================

/// The data set published by a writer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedDataSetModel {
    /// Data set name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Metadata settings. `None` disables field metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_meta_data: Option<DataSetMetaDataModel>,

    /// Field routing.
    pub routing: DataSetRoutingMode,

    /// Literal fields appended to every message.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extension_fields: Vec<ExtensionFieldModel>,

    /// Source fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_source: Option<PublishedDataSetSourceModel>,
}

/// The fields of a data set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedDataSetSourceModel {
    /// Telemetry variables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub published_variables: Vec<PublishedDataSetVariableModel>,

    /// Events.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub published_events: Vec<PublishedDataSetEventModel>,

    /// Objects whose variables are published.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub published_objects: Vec<PublishedObjectModel>,
}

impl PublishedDataSetSourceModel {
    /// Returns `true` if the source has no fields.
    pub fn is_empty(&self) -> bool {
        self.published_variables.is_empty()
            && self.published_events.is_empty()
            && self.published_objects.is_empty()
    }
}

// =============================================================================
// Fields
// =============================================================================

/// A published variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedDataSetVariableModel {
    /// Field identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Node id string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_variable_node_id: Option<String>,

    /// Relative path from the node id still to be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_path: Option<Vec<String>>,

    /// Field name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_field_name: Option<String>,

    /// Read the field name from the node's display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_display_name_from_node: Option<bool>,

    /// Class id of the field.
    pub data_set_class_field_id: Uuid,

    /// Attribute to publish.
    pub attribute: AttributeId,

    /// Position within the data set.
    pub field_index: u32,

    /// Sampling interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_interval: Option<u64>,

    /// Destination of the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishing: Option<PublishingQueueSettings>,

    /// Resolved metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<PublishedMetaDataModel>,

    /// Resolution error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ServiceResult>,
}

impl PublishedDataSetVariableModel {
    /// Creates a variable for a node id string.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            published_variable_node_id: Some(node_id.into()),
            ..Default::default()
        }
    }

    /// Sets the field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.data_set_field_name = Some(name.into());
        self
    }

    /// Sets the browse path.
    pub fn with_browse_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.browse_path = Some(path.into_iter().map(Into::into).collect());
        self
    }
}

/// An object whose variables are discovered and published.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedObjectModel {
    /// Field identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Object node id string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_node_id: Option<String>,

    /// Relative path from the node id still to be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_path: Option<Vec<String>>,

    /// Object name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Discover variables recursively instead of one level.
    pub recursive: bool,

    /// Settings applied to every discovered variable.
    pub template: PublishedDataSetVariableModel,

    /// Discovered variables. `None` until discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_variables: Option<Vec<PublishedDataSetVariableModel>>,

    /// Resolution error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ServiceResult>,
}

impl PublishedObjectModel {
    /// Creates an object for a node id string.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            published_node_id: Some(node_id.into()),
            ..Default::default()
        }
    }
}

/// A published event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedDataSetEventModel {
    /// Field identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Event notifier node id string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_notifier: Option<String>,

    /// Relative path from the notifier still to be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_path: Option<Vec<String>>,

    /// Event name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Read the name from the notifier's display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_event_name_from_node: Option<bool>,

    /// Event type to build the select clauses from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_definition_id: Option<String>,

    /// Publish model change events instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_change_handling: Option<ModelChangeHandlingModel>,

    /// Condition snapshot settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_handling: Option<ConditionHandlingModel>,

    /// Select clauses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_fields: Option<Vec<SimpleAttributeOperandModel>>,

    /// Where clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<ContentFilterModel>,

    /// Destination of the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishing: Option<PublishingQueueSettings>,

    /// Resolution error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ServiceResult>,
}

/// Model change event settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelChangeHandlingModel {
    /// Interval at which the address space is browsed again.
    pub rebrowse_interval: Option<u64>,
}

/// Condition snapshot settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionHandlingModel {
    /// Interval at which condition snapshots are sent.
    pub snapshot_interval: Option<u64>,
    /// Interval after which unchanged conditions are sent again.
    pub update_interval: Option<u64>,
}

/// One select clause of an event field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleAttributeOperandModel {
    /// Type the path starts from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_definition_id: Option<String>,

    /// Browse names from the type to the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_path: Option<Vec<String>>,

    /// Attribute selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<AttributeId>,

    /// Index range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,

    /// Field name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_field_name: Option<String>,

    /// Class id of the field.
    pub data_set_class_field_id: Uuid,

    /// Position within the data set.
    pub field_index: u32,

    /// Resolved metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<PublishedMetaDataModel>,
}

/// Event where clause.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilterModel {
    /// Elements, first is the root.
    pub elements: Vec<ContentFilterElementModel>,
}

/// One filter element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilterElementModel {
    /// Operator.
    pub filter_operator: FilterOperator,
    /// Operands.
    pub filter_operands: Vec<FilterOperandModel>,
}

/// Filter operators the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Equality comparison.
    #[default]
    Equals,
    /// Event is of the given type or a subtype.
    OfType,
    /// Logical and.
    And,
    /// Logical or.
    Or,
}

/// One filter operand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOperandModel {
    /// Literal value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Element index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// A literal field appended to every message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionFieldModel {
    /// Field identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Field name.
    pub data_set_field_name: String,

    /// Class id of the field.
    pub data_set_class_field_id: Uuid,

    /// Literal value.
    pub value: Variant,

    /// Position within the data set.
    pub field_index: u32,

    /// Resolved metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<PublishedMetaDataModel>,

    /// Resolution error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ServiceResult>,
}

impl ExtensionFieldModel {
    /// Creates an extension field.
    pub fn new(name: impl Into<String>, value: Variant) -> Self {
        Self {
            data_set_field_name: name.into(),
            value,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_defaults() {
        let writer = DataSetWriterModel::new("w1");
        assert_eq!(writer.routing(), DataSetRoutingMode::None);
        assert!(!writer.meta_data_enabled());
        assert!(writer.source().is_none());
    }

    #[test]
    fn test_source_mut_creates_source() {
        let mut writer = DataSetWriterModel::default();
        writer
            .source_mut()
            .published_variables
            .push(PublishedDataSetVariableModel::new("i=2258"));
        assert_eq!(writer.source().map(|s| s.published_variables.len()), Some(1));
    }

    #[test]
    fn test_writer_json_roundtrip_keeps_sections() {
        let json = r#"{
            "id": "w1",
            "publishing": [{"queue_name": "plant"}],
            "data_set": {
                "routing": "UseBrowseNames",
                "data_set_meta_data": {},
                "data_set_source": {
                    "published_objects": [{"published_node_id": "ns=2;s=Pump", "recursive": true}]
                }
            }
        }"#;
        let writer: DataSetWriterModel = serde_json::from_str(json).unwrap();
        assert_eq!(writer.routing(), DataSetRoutingMode::UseBrowseNames);
        assert!(writer.meta_data_enabled());
        let objects = &writer.source().unwrap().published_objects;
        assert!(objects[0].recursive);
        assert!(objects[0].published_variables.is_none());
    }
}
