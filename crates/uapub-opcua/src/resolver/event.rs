// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Select clauses and filters of published events.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::browse::reference_types;
use crate::client::{Node, Session};
use crate::error::OpcUaResult;
use crate::models::{
    ContentFilterElementModel, ContentFilterModel, FilterOperandModel, FilterOperator,
    PublishedDataSetEventModel, PublishedMetaDataModel, SimpleAttributeOperandModel,
};
use crate::types::{AttributeId, BuiltInType, NodeClass, NodeId, QualifiedName};

/// Longest type chain or path walked before giving up.
const MAX_CHAIN: usize = 64;

/// Completes the select clauses and filter of an event.
///
/// Returns `true` if the clauses changed in a way that invalidates their
/// metadata.
pub async fn resolve_event(
    session: &dyn Session,
    event: &mut PublishedDataSetEventModel,
    ct: &CancellationToken,
) -> OpcUaResult<bool> {
    let mut changed = false;
    if event.model_change_handling.is_some() {
        if needs_filter_update(event) {
            event.selected_fields = Some(model_change_fields());
            event.filter = Some(ContentFilterModel::default());
        }
    } else if event.selected_fields.is_none() && event.filter.is_none() {
        let type_id = match event.type_definition_id.as_deref().filter(|t| !t.is_empty()) {
            Some(id) => id.parse::<NodeId>()?,
            None => NodeId::BASE_EVENT_TYPE,
        };
        let (fields, filter) = select_clauses_for_type(session, &type_id, ct).await?;
        event.selected_fields = Some(fields);
        event.filter = Some(filter);
        changed = true;
    } else if let Some(fields) = event.selected_fields.as_mut() {
        changed = update_field_names(fields);
    }

    event.type_definition_id = None;
    for field in event.selected_fields.iter_mut().flatten() {
        if field.data_set_class_field_id.is_nil() {
            field.data_set_class_field_id = Uuid::new_v4();
        }
    }
    Ok(changed)
}

/// Returns `true` if select clauses or filter are missing or incomplete.
pub fn needs_filter_update(event: &PublishedDataSetEventModel) -> bool {
    let (Some(fields), Some(_)) = (&event.selected_fields, &event.filter) else {
        return true;
    };
    fields.iter().any(|f| {
        f.data_set_class_field_id.is_nil()
            || f.data_set_field_name.as_deref().map_or(true, str::is_empty)
    })
}

/// The fixed fields of a model change event.
pub fn model_change_fields() -> Vec<SimpleAttributeOperandModel> {
    [
        ("EventId", BuiltInType::ByteString),
        ("EventType", BuiltInType::NodeId),
        ("SourceNode", BuiltInType::NodeId),
        ("Time", BuiltInType::NodeId),
        ("Change", BuiltInType::ExtensionObject),
    ]
    .into_iter()
    .map(|(name, built_in_type)| SimpleAttributeOperandModel {
        data_set_field_name: Some(name.to_string()),
        data_set_class_field_id: Uuid::new_v4(),
        meta_data: Some(PublishedMetaDataModel {
            data_type: Some(built_in_type.node_id().to_opc_string()),
            value_rank: -1,
            built_in_type: built_in_type.value(),
            ..Default::default()
        }),
        ..Default::default()
    })
    .collect()
}

/// Builds one select clause per field of the event type and its
/// supertypes, plus an "of type" filter on the event type.
pub async fn select_clauses_for_type(
    session: &dyn Session,
    type_id: &NodeId,
    ct: &CancellationToken,
) -> OpcUaResult<(Vec<SimpleAttributeOperandModel>, ContentFilterModel)> {
    // Supertype chain, root first
    let mut chain = Vec::new();
    let mut current = Some(type_id.clone());
    while let Some(id) = current.take() {
        if chain.len() >= MAX_CHAIN || chain.iter().any(|n: &Node| n.node_id == id) {
            break;
        }
        current = session.find_super_type(&id, ct).await?;
        if let Some(node) = session.fetch_node(&id, ct).await? {
            chain.push(node);
        }
    }
    chain.reverse();

    let mut names: Vec<QualifiedName> = Vec::new();
    for node in &chain {
        collect_field_names(session, node, &mut names, ct).await?;
    }
    let mut seen = HashSet::new();
    names.retain(|n| seen.insert(n.clone()));
    names.sort_by(|a, b| a.name.cmp(&b.name));

    let mut fields = Vec::with_capacity(names.len() + 1);
    if chain.iter().any(|n| n.node_id == NodeId::CONDITION_TYPE) {
        fields.push(SimpleAttributeOperandModel {
            type_definition_id: Some(NodeId::CONDITION_TYPE.to_opc_string()),
            browse_path: Some(Vec::new()),
            attribute_id: Some(AttributeId::NodeId),
            data_set_field_name: Some("ConditionId".to_string()),
            data_set_class_field_id: Uuid::new_v4(),
            ..Default::default()
        });
    }
    for name in names {
        let browse_path: Vec<String> = name
            .name
            .split('|')
            .map(|element| QualifiedName::new(name.namespace_index, element).to_string())
            .collect();
        fields.push(SimpleAttributeOperandModel {
            type_definition_id: Some(NodeId::BASE_EVENT_TYPE.to_opc_string()),
            data_set_field_name: browse_path.last().cloned(),
            browse_path: Some(browse_path),
            attribute_id: Some(AttributeId::Value),
            data_set_class_field_id: Uuid::new_v4(),
            ..Default::default()
        });
    }

    let filter = ContentFilterModel {
        elements: vec![ContentFilterElementModel {
            filter_operator: FilterOperator::OfType,
            filter_operands: vec![FilterOperandModel {
                value: Some(type_id.to_opc_string()),
                index: None,
            }],
        }],
    };
    Ok((fields, filter))
}

/// Collects the names of variable components (nested, `|` separated) and
/// properties of a type node.
async fn collect_field_names(
    session: &dyn Session,
    type_node: &Node,
    names: &mut Vec<QualifiedName>,
    ct: &CancellationToken,
) -> OpcUaResult<()> {
    let mut pending: Vec<(NodeId, NodeId, String)> = type_node
        .references
        .iter()
        .filter(|r| !r.is_inverse)
        .map(|r| (r.reference_type_id.clone(), r.target_id.clone(), String::new()))
        .collect();
    let mut visited = HashSet::new();

    while let Some((reference_type, target, prefix)) = pending.pop() {
        let is_component = reference_type == reference_types::has_component();
        if !is_component && reference_type != reference_types::has_property() {
            continue;
        }
        if !visited.insert((target.clone(), prefix.clone())) {
            continue;
        }
        let Some(node) = session.fetch_node(&target, ct).await? else {
            continue;
        };
        if is_component && node.node_class != NodeClass::Variable {
            continue;
        }
        let name = format!("{}{}", prefix, node.browse_name.name);
        names.push(QualifiedName::new(node.browse_name.namespace_index, name.clone()));
        if is_component {
            let nested = format!("{}|", name);
            pending.extend(
                node.references
                    .iter()
                    .filter(|r| !r.is_inverse)
                    .map(|r| (r.reference_type_id.clone(), r.target_id.clone(), nested.clone())),
            );
        }
    }
    Ok(())
}

/// Names configured select clauses that have none.
///
/// A clause keeps a non-empty name. Otherwise it is named after its path,
/// or "ConditionId" when it selects the node id of a condition.
pub fn update_field_names(clauses: &mut [SimpleAttributeOperandModel]) -> bool {
    let condition_type = NodeId::CONDITION_TYPE.to_opc_string();
    let mut changed = false;
    for clause in clauses.iter_mut() {
        if clause.data_set_class_field_id.is_nil() {
            clause.data_set_class_field_id = Uuid::new_v4();
            changed = true;
        }
        if clause.data_set_field_name.as_deref().is_some_and(|n| !n.is_empty()) {
            continue;
        }
        let mut name = clause
            .browse_path
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.iter()
                    .map(|e| QualifiedName::from(e.as_str()).to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();
        if name.is_empty()
            && clause.type_definition_id.as_deref() == Some(condition_type.as_str())
            && clause.attribute_id == Some(AttributeId::NodeId)
        {
            name = "ConditionId".to_string();
        }
        if clause.data_set_field_name.as_deref() != Some(name.as_str()) {
            clause.data_set_field_name = Some(name);
            changed = true;
        }
    }
    changed
}

/// Finds the node a clause path selects, starting at the event type and
/// falling back to its supertypes for each element.
pub async fn find_node_with_browse_path(
    session: &dyn Session,
    browse_path: &[String],
    type_id: &NodeId,
    ct: &CancellationToken,
) -> OpcUaResult<Option<Node>> {
    let mut found = None;
    let mut node_id = type_id.clone();
    for element in browse_path {
        let target_name = QualifiedName::from(element.as_str());
        let mut next = None;
        for _ in 0..MAX_CHAIN {
            let Some(node) = session.fetch_node(&node_id, ct).await? else {
                return Ok(None);
            };
            for reference in node.references.iter().filter(|r| !r.is_inverse) {
                if let Some(target) = session.fetch_node(&reference.target_id, ct).await? {
                    if target.browse_name == target_name {
                        next = Some(target);
                        break;
                    }
                }
            }
            if next.is_some() {
                break;
            }
            match session.find_super_type(&node_id, ct).await? {
                Some(super_type) => node_id = super_type,
                None => return Ok(None),
            }
        }
        let Some(target) = next else {
            return Ok(None);
        };
        node_id = target.node_id.clone();
        found = Some(target);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_change_fields() {
        let fields = model_change_fields();
        let names: Vec<_> = fields
            .iter()
            .filter_map(|f| f.data_set_field_name.as_deref())
            .collect();
        assert_eq!(names, ["EventId", "EventType", "SourceNode", "Time", "Change"]);
        assert!(fields.iter().all(|f| !f.data_set_class_field_id.is_nil()));
        assert_eq!(
            fields[0].meta_data.as_ref().map(|m| m.built_in_type),
            Some(BuiltInType::ByteString.value())
        );
    }

    #[test]
    fn test_update_field_names_keeps_configured_name() {
        let mut clauses = vec![SimpleAttributeOperandModel {
            data_set_field_name: Some("Severity".into()),
            browse_path: Some(vec!["Other".into()]),
            data_set_class_field_id: Uuid::new_v4(),
            ..Default::default()
        }];
        assert!(!update_field_names(&mut clauses));
        assert_eq!(clauses[0].data_set_field_name.as_deref(), Some("Severity"));
    }

    #[test]
    fn test_update_field_names_from_path() {
        let mut clauses = vec![
            SimpleAttributeOperandModel {
                browse_path: Some(vec!["EnabledState".into(), "2:Id".into()]),
                ..Default::default()
            },
            SimpleAttributeOperandModel {
                type_definition_id: Some(NodeId::CONDITION_TYPE.to_opc_string()),
                attribute_id: Some(AttributeId::NodeId),
                ..Default::default()
            },
        ];
        assert!(update_field_names(&mut clauses));
        assert_eq!(clauses[0].data_set_field_name.as_deref(), Some("EnabledState/2:Id"));
        assert_eq!(clauses[1].data_set_field_name.as_deref(), Some("ConditionId"));
        assert!(clauses.iter().all(|c| !c.data_set_class_field_id.is_nil()));
    }

    #[test]
    fn test_needs_filter_update() {
        let mut event = PublishedDataSetEventModel::default();
        assert!(needs_filter_update(&event));
        event.selected_fields = Some(model_change_fields());
        event.filter = Some(ContentFilterModel::default());
        assert!(!needs_filter_update(&event));
    }
}
