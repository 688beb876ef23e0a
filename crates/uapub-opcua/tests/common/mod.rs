// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Session
//!
//! In-memory address space behind the [`Session`] trait.
//!
//! - Browse results are paged with continuation points when a page size is set
//! - Every service call is recorded for round-trip assertions
//! - Services can be made to fail as a whole

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use uapub_opcua::browse::{reference_types, BrowsePath};
use uapub_opcua::client::{
    BrowseDescription, BrowsePathResult, BrowseResult, ContinuationPoint, Node, NodeReference,
    OperationLimits, ReadResult, ReadValueId, ReferenceDescription, RootPathResult, Session,
    TypeSystem,
};
use uapub_opcua::client::{DataTypeDefinition, StructureDefinition, StructureField};
use uapub_opcua::error::{OpcUaError, OpcUaResult, ServiceResult};
use uapub_opcua::types::{
    AttributeId, BrowseDirection, NodeClass, NodeId, QualifiedName, StatusCode, Variant,
};

/// Namespace of test nodes.
pub const NS: u16 = 2;

/// ns=2 numeric id.
pub fn nid(value: u32) -> NodeId {
    NodeId::numeric(NS, value)
}

// =============================================================================
// Address space
// =============================================================================

/// One node of the mock address space.
#[derive(Debug, Clone)]
pub struct MockNode {
    /// Node class.
    pub node_class: NodeClass,
    /// Browse name.
    pub browse_name: QualifiedName,
    /// Display name.
    pub display_name: String,
    /// Event notifier byte for objects.
    pub event_notifier: u8,
    /// Data type of variables.
    pub data_type: Option<NodeId>,
    /// Supertype of type nodes.
    pub super_type: Option<NodeId>,
    /// Definition of data types.
    pub definition: Option<DataTypeDefinition>,
    /// Forward references as (reference type, target).
    pub references: Vec<(NodeId, NodeId)>,
}

impl MockNode {
    fn new(node_class: NodeClass, browse_name: QualifiedName) -> Self {
        Self {
            node_class,
            display_name: browse_name.name.clone(),
            browse_name,
            event_notifier: 0,
            data_type: None,
            super_type: None,
            definition: None,
            references: Vec::new(),
        }
    }

    fn type_definition(&self) -> Option<NodeId> {
        self.references
            .iter()
            .find(|(r, _)| *r == reference_types::has_type_definition())
            .map(|(_, t)| t.clone())
    }
}

/// Builder for a small address space.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    nodes: HashMap<NodeId, MockNode>,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// Root, Objects and Server with its type, plus the base event types.
    pub fn new() -> Self {
        let mut space = Self {
            nodes: HashMap::new(),
        };
        space.insert(
            NodeId::ROOT_FOLDER,
            MockNode::new(NodeClass::Object, QualifiedName::new(0, "Root")),
        );
        space.object_type(NodeId::numeric(0, 58), "BaseObjectType", None);
        space.object_type(NodeId::numeric(0, 61), "FolderType", Some(NodeId::numeric(0, 58)));
        space.object_type(NodeId::numeric(0, 2004), "ServerType", Some(NodeId::numeric(0, 58)));
        space.object_type(NodeId::BASE_EVENT_TYPE, "BaseEventType", Some(NodeId::numeric(0, 58)));
        space.insert(
            NodeId::OBJECTS_FOLDER,
            MockNode::new(NodeClass::Object, QualifiedName::new(0, "Objects")),
        );
        space.reference(&NodeId::ROOT_FOLDER, reference_types::organizes(), &NodeId::OBJECTS_FOLDER);
        space.reference(
            &NodeId::OBJECTS_FOLDER,
            reference_types::has_type_definition(),
            &NodeId::numeric(0, 61),
        );
        space.object(NodeId::SERVER, "Server", &NodeId::OBJECTS_FOLDER, &NodeId::numeric(0, 2004));
        space.event_notifier(&NodeId::SERVER, 1);
        space
    }

    fn insert(&mut self, node_id: NodeId, node: MockNode) {
        self.nodes.insert(node_id, node);
    }

    /// Adds a forward reference.
    pub fn reference(&mut self, source: &NodeId, reference_type: NodeId, target: &NodeId) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(source) {
            node.references.push((reference_type, target.clone()));
        }
        self
    }

    /// Adds an object organized under `parent`.
    pub fn object(&mut self, node_id: NodeId, name: &str, parent: &NodeId, type_id: &NodeId) -> &mut Self {
        let ns = node_id.namespace_index;
        self.insert(
            node_id.clone(),
            MockNode::new(NodeClass::Object, QualifiedName::new(ns, name)),
        );
        self.reference(&node_id, reference_types::has_type_definition(), type_id);
        self.reference(parent, reference_types::organizes(), &node_id)
    }

    /// Adds a variable component of `parent`.
    pub fn variable(&mut self, node_id: NodeId, name: &str, parent: &NodeId, data_type: NodeId) -> &mut Self {
        self.add_variable(node_id, name, parent, data_type, reference_types::has_component())
    }

    /// Adds a property of `parent`.
    pub fn property(&mut self, node_id: NodeId, name: &str, parent: &NodeId, data_type: NodeId) -> &mut Self {
        self.add_variable(node_id, name, parent, data_type, reference_types::has_property())
    }

    fn add_variable(
        &mut self,
        node_id: NodeId,
        name: &str,
        parent: &NodeId,
        data_type: NodeId,
        reference_type: NodeId,
    ) -> &mut Self {
        let ns = node_id.namespace_index;
        let mut node = MockNode::new(NodeClass::Variable, QualifiedName::new(ns, name));
        node.data_type = Some(data_type);
        self.insert(node_id.clone(), node);
        self.reference(parent, reference_type, &node_id)
    }

    /// Adds an object type.
    pub fn object_type(&mut self, node_id: NodeId, name: &str, super_type: Option<NodeId>) -> &mut Self {
        self.add_type(node_id, name, NodeClass::ObjectType, super_type, None)
    }

    /// Adds a data type.
    pub fn data_type(
        &mut self,
        node_id: NodeId,
        name: &str,
        super_type: Option<NodeId>,
        definition: Option<DataTypeDefinition>,
    ) -> &mut Self {
        self.add_type(node_id, name, NodeClass::DataType, super_type, definition)
    }

    fn add_type(
        &mut self,
        node_id: NodeId,
        name: &str,
        node_class: NodeClass,
        super_type: Option<NodeId>,
        definition: Option<DataTypeDefinition>,
    ) -> &mut Self {
        let ns = node_id.namespace_index;
        let mut node = MockNode::new(node_class, QualifiedName::new(ns, name));
        node.super_type = super_type.clone();
        node.definition = definition;
        self.insert(node_id.clone(), node);
        if let Some(super_type) = super_type {
            self.reference(&super_type, reference_types::has_subtype(), &node_id);
        }
        self
    }

    /// Sets the display name of a node.
    pub fn display_name(&mut self, node_id: &NodeId, name: &str) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.display_name = name.to_string();
        }
        self
    }

    /// Sets the event notifier byte of an object.
    pub fn event_notifier(&mut self, node_id: &NodeId, value: u8) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.event_notifier = value;
        }
        self
    }

    /// Looks up a node.
    pub fn get(&self, node_id: &NodeId) -> Option<&MockNode> {
        self.nodes.get(node_id)
    }

    fn is_subtype(&self, candidate: &NodeId, ancestor: &NodeId) -> bool {
        let mut current = Some(candidate.clone());
        let mut depth = 0;
        while let Some(id) = current {
            if id == *ancestor {
                return true;
            }
            depth += 1;
            if depth > 64 {
                break;
            }
            current = self.nodes.get(&id).and_then(|n| n.super_type.clone());
        }
        false
    }
}

/// Standard reference type hierarchy.
pub fn is_reference_subtype(candidate: &NodeId, base: &NodeId) -> bool {
    if candidate == base {
        return true;
    }
    if candidate.namespace_index != 0 {
        return false;
    }
    let parent = match candidate.as_numeric() {
        Some(34) | Some(35) | Some(36) | Some(48) => reference_types::hierarchical_references(),
        Some(44) | Some(45) => reference_types::has_child(),
        Some(46) | Some(47) => reference_types::aggregates(),
        _ => return false,
    };
    is_reference_subtype(&parent, base)
}

// =============================================================================
// MockSession
// =============================================================================

/// Session over an [`AddressSpace`].
pub struct MockSession {
    space: AddressSpace,
    page_size: Option<usize>,
    limits: OperationLimits,
    type_system: Option<Arc<TypeSystem>>,
    continuations: Mutex<HashMap<Vec<u8>, VecDeque<ReferenceDescription>>>,
    next_token: Mutex<u32>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MockSession {
    /// Creates a session without paging or limits.
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space,
            page_size: None,
            limits: OperationLimits::default(),
            type_system: None,
            continuations: Mutex::new(HashMap::new()),
            next_token: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Limits browse pages to `size` references.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets the advertised operation limits.
    pub fn with_limits(mut self, limits: OperationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the type system snapshot.
    pub fn with_type_system(mut self, type_system: TypeSystem) -> Self {
        self.type_system = Some(Arc::new(type_system));
        self
    }

    /// Makes every call of `service` fail.
    pub fn fail(&self, service: &'static str) {
        self.failing.lock().insert(service);
    }

    /// Recorded calls, `"Service(count)"` per call.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls to `service`.
    pub fn call_count(&self, service: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.split('(').next() == Some(service))
            .count()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, service: &'static str, count: usize) -> OpcUaResult<()> {
        self.calls.lock().push(format!("{}({})", service, count));
        if self.failing.lock().contains(service) {
            return Err(OpcUaError::service_failed(service, "injected failure"));
        }
        Ok(())
    }

    fn describe(&self, reference_type: &NodeId, target: &NodeId) -> Option<ReferenceDescription> {
        let node = self.space.get(target)?;
        Some(ReferenceDescription {
            node_id: target.clone(),
            server_index: 0,
            reference_type_id: reference_type.clone(),
            is_forward: true,
            browse_name: node.browse_name.clone(),
            display_name: node.display_name.clone(),
            node_class: node.node_class,
            type_definition: node.type_definition(),
        })
    }

    fn browse_one(&self, request: &BrowseDescription) -> BrowseResult {
        let Some(node) = self.space.get(&request.node_id) else {
            return BrowseResult::failed(ServiceResult::from_status(StatusCode::BAD_NODE_ID_UNKNOWN));
        };
        if request.browse_direction == BrowseDirection::Inverse {
            return BrowseResult::page(Vec::new(), None);
        }
        let mut references: VecDeque<ReferenceDescription> = node
            .references
            .iter()
            .filter(|(r, _)| {
                if request.include_subtypes {
                    is_reference_subtype(r, &request.reference_type_id)
                } else {
                    *r == request.reference_type_id
                }
            })
            .filter_map(|(r, t)| self.describe(r, t))
            .filter(|d| request.node_class_mask == 0 || d.node_class.is_in(request.node_class_mask))
            .collect();
        self.page(&mut references)
    }

    fn page(&self, references: &mut VecDeque<ReferenceDescription>) -> BrowseResult {
        let size = self.page_size.unwrap_or(usize::MAX);
        if references.len() <= size {
            return BrowseResult::page(references.drain(..).collect(), None);
        }
        let page: Vec<_> = references.drain(..size).collect();
        let token = {
            let mut next = self.next_token.lock();
            *next += 1;
            next.to_be_bytes().to_vec()
        };
        self.continuations
            .lock()
            .insert(token.clone(), std::mem::take(references));
        BrowseResult::page(page, Some(ContinuationPoint(token)))
    }

    fn translate_one(&self, path: &BrowsePath) -> BrowsePathResult {
        let mut current = vec![path.start_node.clone()];
        for segment in &path.segments {
            let mut next = Vec::new();
            for node_id in &current {
                let Some(node) = self.space.get(node_id) else {
                    continue;
                };
                for (reference_type, target) in &node.references {
                    let matches_type = if segment.include_subtypes {
                        is_reference_subtype(reference_type, &segment.reference_type_id)
                    } else {
                        *reference_type == segment.reference_type_id
                    };
                    let matches_name = self
                        .space
                        .get(target)
                        .is_some_and(|t| t.browse_name == segment.target_name);
                    if matches_type && matches_name {
                        next.push(target.clone());
                    }
                }
            }
            current = next;
        }
        if current.is_empty() {
            BrowsePathResult {
                targets: Vec::new(),
                error: Some(ServiceResult::from_status(StatusCode::BAD_NO_MATCH)),
            }
        } else {
            BrowsePathResult {
                targets: current,
                error: None,
            }
        }
    }

    fn read_one(&self, request: &ReadValueId) -> ReadResult {
        let Some(node) = self.space.get(&request.node_id) else {
            return ReadResult::failure(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        match request.attribute_id {
            AttributeId::NodeClass => ReadResult::success(Variant::Int32(node.node_class.value() as i32)),
            AttributeId::BrowseName => ReadResult::success(Variant::QualifiedName(node.browse_name.clone())),
            AttributeId::DisplayName if node.display_name.is_empty() => ReadResult {
                value: None,
                status_code: StatusCode::GOOD,
            },
            AttributeId::DisplayName => ReadResult::success(Variant::LocalizedText(node.display_name.clone())),
            AttributeId::EventNotifier if node.node_class == NodeClass::Object => {
                ReadResult::success(Variant::Byte(node.event_notifier))
            }
            _ => ReadResult::failure(StatusCode::BAD_NOT_SUPPORTED),
        }
    }

    fn root_path(&self, node_id: &NodeId) -> RootPathResult {
        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::from([NodeId::ROOT_FOLDER]);
        let mut seen = HashSet::from([NodeId::ROOT_FOLDER]);
        while let Some(current) = queue.pop_front() {
            if current == *node_id {
                let mut path = Vec::new();
                let mut cursor = current;
                while let Some(parent) = parents.get(&cursor) {
                    if let Some(node) = self.space.get(&cursor) {
                        path.push(node.browse_name.clone());
                    }
                    cursor = parent.clone();
                }
                path.reverse();
                return RootPathResult { path, error: None };
            }
            let Some(node) = self.space.get(&current) else {
                continue;
            };
            for (reference_type, target) in &node.references {
                if is_reference_subtype(reference_type, &reference_types::hierarchical_references())
                    && *reference_type != reference_types::has_subtype()
                    && seen.insert(target.clone())
                {
                    parents.insert(target.clone(), current.clone());
                    queue.push_back(target.clone());
                }
            }
        }
        RootPathResult {
            path: Vec::new(),
            error: Some(ServiceResult::from_status(StatusCode::BAD_NOT_FOUND)),
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn browse(
        &self,
        requests: &[BrowseDescription],
        _ct: &CancellationToken,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        self.record("Browse", requests.len())?;
        Ok(requests.iter().map(|r| self.browse_one(r)).collect())
    }

    async fn browse_next(
        &self,
        continuation_points: &[ContinuationPoint],
        _ct: &CancellationToken,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        self.record("BrowseNext", continuation_points.len())?;
        Ok(continuation_points
            .iter()
            .map(|point| {
                let remaining = self.continuations.lock().remove(&point.0);
                match remaining {
                    Some(mut references) => self.page(&mut references),
                    None => BrowseResult::failed(ServiceResult::from_status(
                        StatusCode::BAD_CONTINUATION_POINT_INVALID,
                    )),
                }
            })
            .collect())
    }

    async fn translate_browse_paths(
        &self,
        paths: &[BrowsePath],
        _ct: &CancellationToken,
    ) -> OpcUaResult<Vec<BrowsePathResult>> {
        self.record("TranslateBrowsePaths", paths.len())?;
        Ok(paths.iter().map(|p| self.translate_one(p)).collect())
    }

    async fn read(
        &self,
        requests: &[ReadValueId],
        _ct: &CancellationToken,
    ) -> OpcUaResult<Vec<ReadResult>> {
        self.record("Read", requests.len())?;
        Ok(requests.iter().map(|r| self.read_one(r)).collect())
    }

    async fn is_type_of(
        &self,
        candidate: &NodeId,
        ancestor: &NodeId,
        _ct: &CancellationToken,
    ) -> OpcUaResult<bool> {
        self.record("IsTypeOf", 1)?;
        Ok(self.space.is_subtype(candidate, ancestor))
    }

    async fn find_super_type(
        &self,
        type_id: &NodeId,
        _ct: &CancellationToken,
    ) -> OpcUaResult<Option<NodeId>> {
        self.record("FindSuperType", 1)?;
        Ok(self.space.get(type_id).and_then(|n| n.super_type.clone()))
    }

    async fn operation_limits(&self, _ct: &CancellationToken) -> OpcUaResult<OperationLimits> {
        self.record("OperationLimits", 1)?;
        Ok(self.limits)
    }

    async fn type_system(&self, _ct: &CancellationToken) -> OpcUaResult<Option<Arc<TypeSystem>>> {
        self.record("TypeSystem", 1)?;
        Ok(self.type_system.clone())
    }

    async fn fetch_node(
        &self,
        node_id: &NodeId,
        _ct: &CancellationToken,
    ) -> OpcUaResult<Option<Node>> {
        self.record("FetchNode", 1)?;
        let Some(node) = self.space.get(node_id) else {
            return Ok(None);
        };
        let mut references: Vec<NodeReference> = node
            .references
            .iter()
            .map(|(reference_type_id, target_id)| NodeReference {
                reference_type_id: reference_type_id.clone(),
                is_inverse: false,
                target_id: target_id.clone(),
            })
            .collect();
        if let Some(super_type) = &node.super_type {
            references.push(NodeReference {
                reference_type_id: reference_types::has_subtype(),
                is_inverse: true,
                target_id: super_type.clone(),
            });
        }
        Ok(Some(Node {
            node_id: node_id.clone(),
            node_class: node.node_class,
            browse_name: node.browse_name.clone(),
            display_name: Some(node.display_name.clone()),
            data_type: node.data_type.clone(),
            value_rank: node.data_type.as_ref().map(|_| -1),
            data_type_definition: node.definition.clone(),
            references,
            ..Default::default()
        }))
    }

    async fn browse_paths_from_root(
        &self,
        node_ids: &[NodeId],
        _ct: &CancellationToken,
    ) -> OpcUaResult<Vec<RootPathResult>> {
        self.record("BrowsePathsFromRoot", node_ids.len())?;
        Ok(node_ids.iter().map(|n| self.root_path(n)).collect())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Plant folder with `pumps` instances of a pump type, each with the
/// variables Flow, Pressure and Speed and a Serial property.
///
/// Ids: PumpType ns=2;i=1000, Plant ns=2;i=1, pump `n` ns=2;i=(100 * n),
/// its variables ns=2;i=(100 * n + 1..=3).
pub fn plant(pumps: u32) -> AddressSpace {
    let mut space = AddressSpace::new();
    space.object_type(nid(1000), "PumpType", Some(NodeId::numeric(0, 58)));
    space.object(nid(1), "Plant", &NodeId::OBJECTS_FOLDER, &NodeId::numeric(0, 61));
    for n in 1..=pumps {
        let pump = nid(100 * n);
        space.object(pump.clone(), &format!("Pump{}", n), &nid(1), &nid(1000));
        for (offset, name) in ["Flow", "Pressure", "Speed"].iter().enumerate() {
            space.variable(
                nid(100 * n + offset as u32 + 1),
                name,
                &pump,
                NodeId::numeric(0, 11),
            );
        }
        space.property(nid(100 * n + 50), "Serial", &pump, NodeId::numeric(0, 12));
    }
    space
}

/// A structure data type whose field refers to the type itself.
pub fn recursive_structure(space: &mut AddressSpace, node_id: NodeId) {
    let definition = DataTypeDefinition::Structure(StructureDefinition {
        default_encoding_id: None,
        base_data_type: NodeId::STRUCTURE,
        structure_type: Default::default(),
        fields: vec![
            StructureField {
                name: "Value".into(),
                data_type: NodeId::numeric(0, 11),
                value_rank: -1,
                ..Default::default()
            },
            StructureField {
                name: "Next".into(),
                data_type: node_id.clone(),
                value_rank: -1,
                ..Default::default()
            },
        ],
    });
    space.data_type(node_id, "Chain", Some(NodeId::STRUCTURE), Some(definition));
}
