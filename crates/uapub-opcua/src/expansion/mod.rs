// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration expansion.
//!
//! Turns one published-nodes entry whose nodes point at objects, types or
//! variables into concrete writer entries. The expansion runs as an
//! [`AsyncSequence`]: every object that collected fields is persisted and
//! yielded as soon as its browse completes, and the remaining variables
//! plus error entries follow at the end.
//!
//! # Flow
//!
//! ```text
//! Begin ──► resolve configured nodes (translate + read)
//!   │
//!   ▼
//! next node ──► Object        browse child objects
//!   │           ObjectType    browse Objects folder for instances
//!   │           VariableType  browse Objects folder for instances
//!   │           Variable      browse sub-variables
//!   ▼
//! next object ──► browse variables (and methods) of the object
//!   │
//!   ▼
//! Complete ──► persist object entry ──► next object / next node / End
//! ```

mod nodes;
mod store;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::browse::{
    reference_types, AsyncSequence, BrowseFrame, BrowseHandler, BrowseOptions, BrowsePath,
    BrowseStep, BrowseTraversal, SequenceProgram, WorkStack,
};
use crate::client::{
    browse_all, check_result_count, BrowseDescription, OperationLimits, ReadValueId, Session,
};
use crate::error::{BrowseError, ConfigurationError, OpcUaError, OpcUaResult, ServiceResult};
use crate::models::{
    PublishedNodeExpansionModel, PublishedNodesEntryModel, OpcNodeModel, ServiceResponse,
};
use crate::types::{
    AttributeId, NodeClass, NodeId, StatusCode, EVENT_NOTIFIER_SUBSCRIBE_TO_EVENTS,
};

use nodes::{NodeToExpand, ObjectSlot, ObjectToExpand};

pub use store::{validate_nodes, InMemoryEntryStore, WriterEntryStore};

/// Item yielded by an expansion.
pub type ExpansionResult = ServiceResponse<PublishedNodesEntryModel>;

/// Pending unit of an expansion.
#[derive(Debug)]
pub enum ExpansionStep {
    /// Resolve the configured nodes.
    Begin,
    /// One traversal step.
    Browse(BrowseStep),
    /// The current traversal finished.
    Complete,
}

/// Starts expanding `entry`.
///
/// # Errors
///
/// Returns a configuration error if the entry has no nodes or a node has
/// neither an id nor a browse path.
pub fn expand(
    session: Arc<dyn Session>,
    entry: PublishedNodesEntryModel,
    request: PublishedNodeExpansionModel,
    store: Option<Arc<dyn WriterEntryStore>>,
) -> OpcUaResult<AsyncSequence<ConfigurationExpansion>> {
    let program = ConfigurationExpansion::new(session, entry, request, store)?;
    Ok(AsyncSequence::with_initial(program, ExpansionStep::Begin))
}

// =============================================================================
// ExpansionState
// =============================================================================

/// Nodes being expanded and the position within them.
#[derive(Debug, Default)]
struct ExpansionState {
    nodes: Vec<NodeToExpand>,
    node_index: Option<usize>,
    current_object: Option<(usize, usize)>,
    flatten_type_instance: bool,
}

impl ExpansionState {
    fn current_node_index(&self) -> Option<usize> {
        self.current_object.map(|(node, _)| node).or(self.node_index)
    }
}

impl BrowseHandler for ExpansionState {
    type Item = ExpansionResult;

    fn on_matching(
        &mut self,
        matching: &[Arc<BrowseFrame>],
        references: &mut Vec<Arc<BrowseFrame>>,
    ) -> Vec<ExpansionResult> {
        let Some(node_index) = self.current_node_index() else {
            return Vec::new();
        };
        let flatten = self.flatten_type_instance;
        let node = &mut self.nodes[node_index];
        let original = node.node_class;

        match self.current_object {
            None => node.add_objects_or_variables(matching),
            Some((_, object_index)) => {
                let (objects, fields): (Vec<_>, Vec<_>) = matching
                    .iter()
                    .cloned()
                    .partition(|f| f.node_class == NodeClass::Object);
                if node.objects[object_index].add_nodes(&fields) {
                    debug!(
                        object = %node.objects[object_index].frame,
                        "Dropped duplicate variables or methods"
                    );
                }
                node.add_objects_or_variables(&objects);
                if original == NodeClass::ObjectType && !flatten {
                    references.retain(|r| r.node_class != NodeClass::Object);
                }
            }
        }

        if (original == NodeClass::ObjectType && flatten) || original == NodeClass::VariableType {
            references.retain(|r| !matching.iter().any(|m| m.node_id == r.node_id));
        }
        Vec::new()
    }

    fn on_error(&mut self, frame: &Arc<BrowseFrame>, error: ServiceResult) -> Vec<ExpansionResult> {
        error!(node_id = %frame.node_id, error = %error, "Error expanding node");
        if let Some(node_index) = self.current_node_index() {
            self.nodes[node_index].add_error(error);
        }
        Vec::new()
    }
}

// =============================================================================
// ConfigurationExpansion
// =============================================================================

/// Expansion of one entry, driven as a [`SequenceProgram`].
pub struct ConfigurationExpansion {
    session: Arc<dyn Session>,
    entry: PublishedNodesEntryModel,
    request: PublishedNodeExpansionModel,
    store: Option<Arc<dyn WriterEntryStore>>,
    traversal: BrowseTraversal,
    state: ExpansionState,
    limits: Option<OperationLimits>,
    finished: bool,
}

impl ConfigurationExpansion {
    /// Creates the program. Use [`expand`] to get a runnable sequence.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for entries that cannot be expanded.
    pub fn new(
        session: Arc<dyn Session>,
        entry: PublishedNodesEntryModel,
        request: PublishedNodeExpansionModel,
        store: Option<Arc<dyn WriterEntryStore>>,
    ) -> OpcUaResult<Self> {
        if entry.opc_nodes.is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_entry(
                "Entry contains no nodes to expand",
            )));
        }
        for node in &entry.opc_nodes {
            if node.id.is_none() && node.browse_path().is_none() {
                return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                    "id",
                )));
            }
            if let Some(id) = &node.id {
                id.parse::<NodeId>()?;
            }
        }
        let state = ExpansionState {
            flatten_type_instance: request.flatten_type_instance,
            ..Default::default()
        };
        Ok(Self {
            session,
            entry,
            request,
            store,
            traversal: BrowseTraversal::new(),
            state,
            limits: None,
            finished: false,
        })
    }

    /// The expansion request.
    pub fn request(&self) -> &PublishedNodeExpansionModel {
        &self.request
    }

    async fn begin(
        &mut self,
        stack: &mut WorkStack<ExpansionStep>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<ExpansionResult>> {
        let configured = self.entry.opc_nodes.clone();
        for config in configured {
            let node = match self.resolve_node(&config, ct).await {
                Ok(node) => node,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(node = ?config.id, error = %e, "Failed to resolve node");
                    NodeToExpand::failed(config, ServiceResult::from(&e))
                }
            };
            self.state.nodes.push(node);
        }
        self.advance(stack, ct).await
    }

    async fn advance(
        &mut self,
        stack: &mut WorkStack<ExpansionStep>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<ExpansionResult>> {
        match self.try_move_to_next_node() {
            Some(seed) => {
                stack.push(ExpansionStep::Browse(seed));
                Ok(Vec::new())
            }
            None => self.end(ct).await,
        }
    }

    /// Resolves the configured id and path and probes the node.
    async fn resolve_node(
        &self,
        config: &OpcNodeModel,
        ct: &CancellationToken,
    ) -> OpcUaResult<NodeToExpand> {
        let start = match config.id.as_deref() {
            Some(id) => id.parse::<NodeId>()?,
            None => NodeId::OBJECTS_FOLDER,
        };
        let node_id = match config.browse_path() {
            Some(elements) => {
                let path = BrowsePath::parse(start, elements)?;
                let results = self
                    .session
                    .translate_browse_paths(std::slice::from_ref(&path), ct)
                    .await?;
                check_result_count("TranslateBrowsePathsToNodeIds", 1, &results)?;
                let result = &results[0];
                match result.targets.first() {
                    Some(target) => target.clone(),
                    None => {
                        let error = result.error.clone().unwrap_or_else(|| {
                            ServiceResult::new(
                                StatusCode::BAD_NO_MATCH,
                                format!("Browse path {} not found", path),
                            )
                        });
                        return Ok(NodeToExpand::failed(config.clone(), error));
                    }
                }
            }
            None => start,
        };

        let requests: Vec<ReadValueId> = [
            AttributeId::NodeClass,
            AttributeId::BrowseName,
            AttributeId::DisplayName,
            AttributeId::EventNotifier,
        ]
        .into_iter()
        .map(|attribute| ReadValueId::new(node_id.clone(), attribute))
        .collect();
        let values = self.session.read(&requests, ct).await?;
        check_result_count("Read", requests.len(), &values)?;
        // EventNotifier only exists on objects and views, its status is ignored
        if let Some(error) = values[..3].iter().find_map(|v| v.error()) {
            return Ok(NodeToExpand::failed(config.clone(), error));
        }

        let node_class = values[0]
            .value
            .as_ref()
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .and_then(NodeClass::from_value)
            .unwrap_or_default();
        let type_definition_id = match node_class {
            NodeClass::ObjectType | NodeClass::VariableType => Some(node_id.clone()),
            NodeClass::Object => self.find_type_definition(&node_id, ct).await?,
            _ => None,
        };

        let mut frame = BrowseFrame::root(node_id)
            .with_node_class(node_class)
            .with_type_definition(type_definition_id);
        if let Some(name) = values[1].value.as_ref().and_then(|v| v.as_qualified_name()) {
            frame = frame.with_browse_name(name.clone());
        }
        if let Some(name) = values[2].value.as_ref().and_then(|v| v.as_str()) {
            frame = frame.with_display_name(name);
        }
        Ok(NodeToExpand::resolved(config.clone(), Arc::new(frame)))
    }

    async fn find_type_definition(
        &self,
        node_id: &NodeId,
        ct: &CancellationToken,
    ) -> OpcUaResult<Option<NodeId>> {
        let request = BrowseDescription::forward(node_id.clone(), reference_types::has_type_definition())
            .with_node_class_mask(NodeClass::ObjectType.value() | NodeClass::VariableType.value());
        let items = browse_all(self.session.as_ref(), &[request], ct).await?;
        let Some(item) = items.into_iter().next() else {
            return Ok(None);
        };
        if let Some(error) = item.error {
            return Err(OpcUaError::browse(BrowseError::browse_failed(
                node_id.to_string(),
                error.to_string(),
            )));
        }
        Ok(item.references.into_iter().next().map(|r| r.node_id))
    }

    /// Moves to the next configured node that needs browsing.
    fn try_move_to_next_node(&mut self) -> Option<BrowseStep> {
        let start = self.state.node_index.map_or(0, |i| i + 1);
        for index in start..self.state.nodes.len() {
            self.state.node_index = Some(index);
            self.state.current_object = None;
            let exclude_root = self.request.exclude_root_if_instance_node;
            let node = &mut self.state.nodes[index];
            let frame = Arc::clone(&node.frame);

            match node.node_class {
                NodeClass::Object => {
                    if !exclude_root {
                        node.add_objects_or_variables(std::slice::from_ref(&frame));
                        if self.request.max_depth == Some(0) {
                            return self.try_move_to_next_object();
                        }
                    }
                    let max_depth = match self.request.max_depth {
                        Some(0) => Some(1),
                        depth => depth.map(|d| d as usize),
                    };
                    let options = BrowseOptions::new().with_max_depth(max_depth);
                    return Some(self.traversal.restart(Some(frame), options));
                }
                NodeClass::ObjectType | NodeClass::VariableType => {
                    let instance_class = if node.node_class == NodeClass::ObjectType {
                        NodeClass::Object
                    } else {
                        NodeClass::Variable
                    };
                    let options = BrowseOptions::new()
                        .with_max_depth(self.request.max_depth.map(|d| d as usize))
                        .with_type_definition(Some(frame.node_id.clone()))
                        .with_type_subtypes(!self.request.no_subtypes)
                        .with_match_class(instance_class.value());
                    return Some(self.traversal.restart(None, options));
                }
                NodeClass::Variable => {
                    let levels = self.request.max_levels_to_expand;
                    if !exclude_root {
                        node.add_objects_or_variables(std::slice::from_ref(&frame));
                        if levels == 0 {
                            continue;
                        }
                    }
                    let options = BrowseOptions::new()
                        .with_max_depth(Some(levels.max(1) as usize))
                        .with_reference_type(reference_types::aggregates(), true)
                        .with_node_class_mask(NodeClass::Variable.value());
                    return Some(self.traversal.restart(Some(frame), options));
                }
                NodeClass::Unspecified if node.has_errors() => continue,
                other => {
                    node.add_error(ServiceResult::new(
                        StatusCode::BAD_NOT_SUPPORTED,
                        format!("Node class {} not supported.", other),
                    ));
                }
            }
        }
        self.try_move_to_next_object()
    }

    /// Moves to the next discovered object and browses its fields.
    fn try_move_to_next_object(&mut self) -> Option<BrowseStep> {
        for (node_index, node) in self.state.nodes.iter_mut().enumerate() {
            let Some(object_index) = node.next_object() else {
                continue;
            };
            let frame = Arc::clone(&node.objects[object_index].frame);

            let mut node_class = NodeClass::Variable.value();
            let mut match_class = NodeClass::Variable.value();
            if self.request.include_methods {
                match_class |= NodeClass::Method.value();
            }
            if node.node_class == NodeClass::ObjectType {
                node_class |= NodeClass::Object.value();
                if !self.request.flatten_type_instance {
                    match_class |= NodeClass::Object.value();
                }
            }
            let levels = self.request.max_levels_to_expand;
            let options = BrowseOptions::new()
                .with_max_depth((levels != 0).then_some(levels as usize))
                .with_reference_type(reference_types::aggregates(), true)
                .with_node_class_mask(node_class)
                .with_match_class(match_class);

            self.state.current_object = Some((node_index, object_index));
            return Some(self.traversal.restart(Some(frame), options));
        }
        None
    }

    async fn complete(
        &mut self,
        stack: &mut WorkStack<ExpansionStep>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<ExpansionResult>> {
        let mut results = Vec::new();
        if let Some((node_index, object_index)) = self.state.current_object.take() {
            self.process(node_index, ObjectSlot::Object(object_index), &mut results, ct)
                .await?;
            if let Some(seed) = self.try_move_to_next_object() {
                stack.push(ExpansionStep::Browse(seed));
                return Ok(results);
            }
        } else if let Some(node_index) = self.state.node_index {
            let node = &mut self.state.nodes[node_index];
            if node.variables.contains_variables() {
                self.process(node_index, ObjectSlot::Variables, &mut results, ct)
                    .await?;
            } else if !node.contains_objects() && !node.has_errors() {
                node.add_error(ServiceResult::new(
                    StatusCode::BAD_NOT_FOUND,
                    "No objects resolved.",
                ));
            }
        }
        results.extend(self.advance(stack, ct).await?);
        Ok(results)
    }

    /// Finds generated events and persists the object as its own writer.
    async fn process(
        &mut self,
        node_index: usize,
        slot: ObjectSlot,
        results: &mut Vec<ExpansionResult>,
        ct: &CancellationToken,
    ) -> OpcUaResult<()> {
        self.discover_events(node_index, slot, ct).await?;

        let node = &self.state.nodes[node_index];
        let object = node.object(slot);
        if self.request.create_single_writer || !object.has_fields() || node.has_errors() {
            return Ok(());
        }
        let entry = self.object_entry(node, object);
        let response = self.save(entry, ct).await?;
        self.state.nodes[node_index].object_mut(slot).entries_already_returned = true;
        if !self.request.discard_errors || response.is_ok() {
            results.push(response);
        }
        Ok(())
    }

    fn object_entry(&self, node: &NodeToExpand, object: &ObjectToExpand) -> PublishedNodesEntryModel {
        let root = object.frame.top();
        let base = node
            .config
            .data_set_field_id
            .as_deref()
            .or(self.entry.data_set_writer_id.as_deref());
        PublishedNodesEntryModel {
            data_set_writer_id: Some(object.writer_id(base)),
            data_set_writer_group: self
                .entry
                .data_set_writer_group
                .clone()
                .or_else(|| root.browse_name.as_ref().map(|n| n.name.clone())),
            data_set_name: Some(object.data_set_name()),
            data_set_root_node_id: Some(object.frame.node_id.to_opc_string()),
            data_set_type: object.frame.type_definition_id.as_ref().map(NodeId::to_opc_string),
            writer_group_root_node_id: Some(root.node_id.to_opc_string()),
            writer_group_type: root.type_definition_id.as_ref().map(NodeId::to_opc_string),
            opc_nodes: object.opc_node_models(&node.config, &mut HashSet::new(), false),
            ..self.entry.template()
        }
    }

    /// Inspects type definitions for generated events and finds the
    /// notifier to subscribe to.
    async fn discover_events(
        &mut self,
        node_index: usize,
        slot: ObjectSlot,
        ct: &CancellationToken,
    ) -> OpcUaResult<()> {
        let (sources, object_frames) = {
            let object = self.state.nodes[node_index].object(slot);
            (object.event_sources(), object.frames_to_root())
        };
        if sources.is_empty() {
            return Ok(());
        }
        let limits = self.operation_limits(ct).await?;

        let mut events = Vec::new();
        let mut errors = Vec::new();
        let mut offset = 0;
        'batches: for batch in sources.chunks(limits.browse_batch_size()) {
            let requests: Vec<BrowseDescription> = batch
                .iter()
                .filter_map(|f| f.type_definition_id.clone())
                .map(|type_id| {
                    BrowseDescription::forward(type_id, reference_types::generates_event())
                        .with_node_class_mask(NodeClass::ObjectType.value())
                })
                .collect();
            for item in browse_all(self.session.as_ref(), &requests, ct).await? {
                match (item.origin, item.error) {
                    (None, error) => {
                        errors.extend(error);
                        break 'batches;
                    }
                    (Some(_), Some(error)) => errors.push(error),
                    (Some(index), None) if !item.references.is_empty() => {
                        events.push((Arc::clone(&sources[offset + index]), item.references));
                    }
                    _ => {}
                }
            }
            offset += batch.len();
        }

        let mut notifier = NodeId::SERVER;
        if !events.is_empty() {
            match self.find_event_notifier(&object_frames, &limits, ct).await {
                Ok(Some(found)) => notifier = found,
                Ok(None) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => errors.push(ServiceResult::from(&e)),
            }
        }

        let node = &mut self.state.nodes[node_index];
        for error in errors {
            node.add_error(error);
        }
        let object = node.object_mut(slot);
        object.events = events;
        object.event_notifier = notifier;
        Ok(())
    }

    /// First frame, nearest first, that can be subscribed to for events.
    async fn find_event_notifier(
        &self,
        frames: &[Arc<BrowseFrame>],
        limits: &OperationLimits,
        ct: &CancellationToken,
    ) -> OpcUaResult<Option<NodeId>> {
        for batch in frames.chunks(limits.read_batch_size()) {
            let requests: Vec<ReadValueId> = batch
                .iter()
                .map(|f| ReadValueId::new(f.node_id.clone(), AttributeId::EventNotifier))
                .collect();
            let values = self.session.read(&requests, ct).await?;
            check_result_count("Read", requests.len(), &values)?;
            for (frame, value) in batch.iter().zip(&values) {
                let notifier = value.value.as_ref().and_then(|v| v.as_i64()).unwrap_or(0);
                if notifier & i64::from(EVENT_NOTIFIER_SUBSCRIBE_TO_EVENTS) != 0 {
                    return Ok(Some(frame.node_id.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn operation_limits(&mut self, ct: &CancellationToken) -> OpcUaResult<OperationLimits> {
        if let Some(limits) = self.limits {
            return Ok(limits);
        }
        let limits = self.session.operation_limits(ct).await?;
        self.limits = Some(limits);
        Ok(limits)
    }

    /// Emits the remaining variables and the error entries.
    async fn end(&mut self, ct: &CancellationToken) -> OpcUaResult<Vec<ExpansionResult>> {
        self.finished = true;
        self.state.node_index = None;
        self.state.current_object = None;
        let nodes = std::mem::take(&mut self.state.nodes);

        let mut ids = HashSet::new();
        let mut good = Vec::new();
        for node in nodes.iter().filter(|n| !n.has_errors()) {
            good.extend(node.all_opc_node_models(&mut ids, false));
        }

        let mut results = Vec::new();
        if !good.is_empty() {
            let entry = PublishedNodesEntryModel {
                opc_nodes: good,
                ..self.entry.template()
            };
            let response = self.save(entry, ct).await?;
            if !self.request.discard_errors || response.is_ok() {
                results.push(response);
            }
        }

        if !self.request.discard_errors {
            for node in nodes.iter().filter(|n| n.has_errors()) {
                let models = node.all_opc_node_models(&mut ids, true);
                for error in &node.errors {
                    let entry = PublishedNodesEntryModel {
                        opc_nodes: models.clone(),
                        ..self.entry.template()
                    };
                    results.push(ServiceResponse::failed(entry, error.clone()));
                }
            }
        }

        info!(
            writer_id = ?self.entry.data_set_writer_id,
            nodes = nodes.len(),
            results = results.len(),
            "Expansion completed"
        );
        Ok(results)
    }

    /// Validates and persists an entry, recording failures on it.
    async fn save(
        &self,
        mut entry: PublishedNodesEntryModel,
        ct: &CancellationToken,
    ) -> OpcUaResult<ExpansionResult> {
        if let Err(e) = validate_nodes(&mut entry.opc_nodes) {
            let error = ServiceResult::new(StatusCode::BAD_INVALID_ARGUMENT, e.to_string());
            return Ok(ServiceResponse::failed(entry, error));
        }
        let Some(store) = &self.store else {
            return Ok(ServiceResponse::ok(entry));
        };
        match store.create_or_update(&entry, ct).await {
            Ok(()) => Ok(ServiceResponse::ok(entry)),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                debug!(writer_id = ?entry.data_set_writer_id, error = %e, "Failed to save entry");
                let error = ServiceResult::from(&e);
                Ok(ServiceResponse::failed(entry, error))
            }
        }
    }
}

#[async_trait]
impl SequenceProgram for ConfigurationExpansion {
    type Step = ExpansionStep;
    type Item = ExpansionResult;

    async fn execute(
        &mut self,
        step: ExpansionStep,
        stack: &mut WorkStack<ExpansionStep>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<ExpansionResult>> {
        match step {
            ExpansionStep::Begin => self.begin(stack, ct).await,
            ExpansionStep::Browse(step) => {
                let outcome = self
                    .traversal
                    .execute(step, self.session.as_ref(), &mut self.state, ct)
                    .await?;
                for step in outcome.follow_up {
                    stack.push(ExpansionStep::Browse(step));
                }
                Ok(outcome.items)
            }
            ExpansionStep::Complete => self.complete(stack, ct).await,
        }
    }

    fn on_completion(&mut self, stack: &mut WorkStack<ExpansionStep>) -> Vec<ExpansionResult> {
        if !self.finished {
            stack.push(ExpansionStep::Complete);
        }
        Vec::new()
    }
}
