// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Structural metadata of published fields.
//!
//! Builds field metadata from variable nodes and collects the closure of
//! non-built-in data types a field depends on. Nested structure fields are
//! resolved through a work queue and a set of already described types, so
//! self-referencing structures terminate.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DataTypeDefinition, Node, Session, TypeSystem};
use crate::error::{OpcUaError, OpcUaResult};
use crate::models::{
    EnumDescriptionModel, EnumFieldModel, PublishedMetaDataModel, SimpleTypeDescriptionModel,
    StructureDescriptionModel, StructureFieldModel,
};
use crate::types::{BuiltInType, NodeId};

/// Longest supertype chain followed before giving up.
const MAX_TYPE_DEPTH: usize = 64;

/// A described data type.
#[derive(Debug, Clone, PartialEq)]
enum TypeDescription {
    Simple(SimpleTypeDescriptionModel),
    Enum(EnumDescriptionModel),
    Structure(StructureDescriptionModel),
}

/// Resolves field metadata against one session.
pub struct MetadataResolver<'a> {
    session: &'a dyn Session,
    type_system: Option<Arc<TypeSystem>>,
}

impl<'a> MetadataResolver<'a> {
    /// Creates a resolver using an optional type system snapshot.
    pub fn new(session: &'a dyn Session, type_system: Option<Arc<TypeSystem>>) -> Self {
        Self {
            session,
            type_system,
        }
    }

    /// Metadata of a variable node, including its data type closure.
    pub async fn variable_metadata(
        &self,
        node: &Node,
        version: u32,
        ct: &CancellationToken,
    ) -> OpcUaResult<PublishedMetaDataModel> {
        let data_type = node
            .data_type
            .clone()
            .unwrap_or_else(|| BuiltInType::Variant.node_id());
        let mut meta_data = self.metadata_for_type(&data_type, version, ct).await?;
        meta_data.value_rank = node.value_rank.unwrap_or(-1);
        meta_data.array_dimensions = node.array_dimensions.clone().filter(|d| !d.is_empty());
        meta_data.description = node.description.clone();
        Ok(meta_data)
    }

    /// Metadata of a scalar field of the given data type.
    pub async fn metadata_for_type(
        &self,
        data_type: &NodeId,
        version: u32,
        ct: &CancellationToken,
    ) -> OpcUaResult<PublishedMetaDataModel> {
        let built_in_type = self.built_in_type(data_type, ct).await?;
        let mut meta_data = PublishedMetaDataModel {
            minor_version: version,
            data_type: Some(data_type.to_opc_string()),
            built_in_type: built_in_type.value(),
            value_rank: -1,
            ..Default::default()
        };
        if !BuiltInType::is_built_in(data_type) {
            for description in self.type_closure(data_type, ct).await? {
                match description {
                    TypeDescription::Simple(s) => meta_data.simple_data_types.push(s),
                    TypeDescription::Enum(e) => meta_data.enum_data_types.push(e),
                    TypeDescription::Structure(s) => meta_data.structure_data_types.push(s),
                }
            }
        }
        Ok(meta_data)
    }

    /// Built-in type a data type is encoded as, found by walking its
    /// supertypes.
    pub async fn built_in_type(
        &self,
        data_type: &NodeId,
        ct: &CancellationToken,
    ) -> OpcUaResult<BuiltInType> {
        let mut current = data_type.clone();
        for _ in 0..MAX_TYPE_DEPTH {
            if let Some(built_in) = BuiltInType::from_node_id(&current) {
                return Ok(built_in);
            }
            match self.session.find_super_type(&current, ct).await? {
                Some(super_type) => current = super_type,
                None => break,
            }
        }
        Ok(BuiltInType::Null)
    }

    /// Descriptions of every non-built-in type reachable from `data_type`.
    async fn type_closure(
        &self,
        data_type: &NodeId,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<TypeDescription>> {
        let mut queue = VecDeque::from([data_type.clone()]);
        let mut resolved: HashSet<NodeId> = HashSet::new();
        let mut descriptions = Vec::new();

        while let Some(next) = queue.pop_front() {
            let mut current = Some(next);
            while let Some(type_id) = current.take() {
                if BuiltInType::is_built_in(&type_id) || resolved.contains(&type_id) {
                    break;
                }
                if ct.is_cancelled() {
                    return Err(OpcUaError::Cancelled);
                }
                match self.describe(&type_id, &mut queue, ct).await {
                    Ok(Some((description, super_type))) => {
                        resolved.insert(type_id);
                        descriptions.push(description);
                        current = super_type;
                    }
                    Ok(None) => break,
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        info!(data_type = %type_id, error = %e, "Failed to get meta data for type");
                        break;
                    }
                }
            }
        }
        Ok(descriptions)
    }

    /// Describes one type and returns its supertype. Field types that need
    /// a description of their own are queued.
    async fn describe(
        &self,
        type_id: &NodeId,
        queue: &mut VecDeque<NodeId>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Option<(TypeDescription, Option<NodeId>)>> {
        let Some(node) = self.session.fetch_node(type_id, ct).await? else {
            warn!(data_type = %type_id, "Failed to find node for data type");
            return Ok(None);
        };
        let built_in_type = self.built_in_type(type_id, ct).await?;
        let super_type = self.session.find_super_type(type_id, ct).await?;
        let data_type_id = type_id.to_opc_string();
        let name = node.browse_name.to_string_with_ns();

        let description = match built_in_type {
            BuiltInType::Enumeration | BuiltInType::ExtensionObject => {
                let definition = self
                    .type_system
                    .as_ref()
                    .and_then(|ts| ts.get(type_id).cloned())
                    .or_else(|| node.data_type_definition.clone());
                match definition {
                    Some(DataTypeDefinition::Structure(s)) => {
                        let fields = s
                            .fields
                            .iter()
                            .map(|f| {
                                if !BuiltInType::is_built_in(&f.data_type) {
                                    queue.push_back(f.data_type.clone());
                                }
                                StructureFieldModel {
                                    name: f.name.clone(),
                                    description: f.description.clone(),
                                    data_type: f.data_type.to_opc_string(),
                                    value_rank: f.value_rank,
                                    array_dimensions: f.array_dimensions.clone(),
                                    max_string_length: f.max_string_length,
                                    is_optional: f.is_optional,
                                }
                            })
                            .collect();
                        TypeDescription::Structure(StructureDescriptionModel {
                            data_type_id,
                            name,
                            base_data_type: Some(s.base_data_type.to_opc_string()),
                            default_encoding_id: s.default_encoding_id.as_ref().map(NodeId::to_opc_string),
                            structure_type: format!("{:?}", s.structure_type),
                            fields,
                        })
                    }
                    Some(DataTypeDefinition::Enum(e)) => TypeDescription::Enum(EnumDescriptionModel {
                        data_type_id,
                        name,
                        built_in_type: BuiltInType::Int32.value(),
                        fields: e
                            .fields
                            .iter()
                            .map(|f| EnumFieldModel {
                                value: f.value,
                                name: f.name.clone(),
                                display_name: f.display_name.clone(),
                                description: f.description.clone(),
                            })
                            .collect(),
                        is_option_set: e.is_option_set,
                    }),
                    None => {
                        info!(
                            data_type = %type_id,
                            built_in_type = ?built_in_type,
                            "No type definition found, adding a placeholder with no fields"
                        );
                        if built_in_type == BuiltInType::Enumeration {
                            TypeDescription::Enum(EnumDescriptionModel {
                                data_type_id,
                                name,
                                ..Default::default()
                            })
                        } else {
                            TypeDescription::Structure(StructureDescriptionModel {
                                data_type_id,
                                name,
                                ..Default::default()
                            })
                        }
                    }
                }
            }
            other => TypeDescription::Simple(SimpleTypeDescriptionModel {
                data_type_id,
                name,
                base_data_type: super_type.as_ref().map(NodeId::to_opc_string),
                built_in_type: other.value(),
            }),
        };
        debug!(data_type = %type_id, "Described data type");
        Ok(Some((description, super_type)))
    }
}
